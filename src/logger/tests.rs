use super::*;

#[test]
fn test_init_twice_keeps_first_subscriber() {
    init();
    init();
    info!("still logging after a second init");
}
