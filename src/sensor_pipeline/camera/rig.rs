use std::sync::Arc;

use crate::sensor_pipeline::camera::extrinsics::ExtrinsicTransform;
use crate::sensor_pipeline::camera::model::CameraModel;
use crate::sensor_pipeline::camera::undistortion::UndistortionTable;

/// Everything needed to project one camera's depth into its color image.
///
/// Built once per camera at setup; the undistortion table is shared by every
/// frame and every projection worker.
#[derive(Debug, Clone)]
pub struct CameraRig {
    pub depth_model: CameraModel,
    pub color_model: CameraModel,
    pub extrinsics: ExtrinsicTransform,
    table: Arc<UndistortionTable>,
}

impl CameraRig {
    pub fn new(
        depth_model: CameraModel,
        color_model: CameraModel,
        extrinsics: ExtrinsicTransform,
    ) -> Self {
        let table = Arc::new(UndistortionTable::build(&depth_model));
        Self {
            depth_model,
            color_model,
            extrinsics,
            table,
        }
    }

    pub fn table(&self) -> &UndistortionTable {
        &self.table
    }

    pub fn shared_table(&self) -> Arc<UndistortionTable> {
        Arc::clone(&self.table)
    }
}
