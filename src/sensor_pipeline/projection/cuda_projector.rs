use cudarc::driver::safe::*;
use cudarc::nvrtc::Ptx;
use glam::Vec3;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::sensor_pipeline::projection::types::{
    PointBuffer, PointSample, ProjectionConfig, ProjectionInput, ProjectionStats,
};

/// Length of the kernel's `params` array; layout is documented in project_depth.cu.
const PARAM_COUNT: usize = 46;
const STAT_COUNT: usize = 5;

/// Depth → colored points on the GPU, one thread per depth pixel.
pub struct CudaProjector {
    stream: Arc<CudaStream>,
    kernel: CudaFunction,
    config: ProjectionConfig,
}

impl CudaProjector {
    /// Initialize CUDA context and load kernel
    pub fn new(config: ProjectionConfig) -> anyhow::Result<Self> {
        // Compiled to PTX by build.rs
        let ptx = include_str!(concat!(env!("OUT_DIR"), "/project_depth.ptx"));

        let ctx = CudaContext::new(0)?;
        let stream = ctx.default_stream();
        let module = ctx.load_module(Ptx::from_src(ptx))?;
        let kernel = module.load_function("project_depth")?;

        Ok(Self {
            stream,
            kernel,
            config,
        })
    }

    pub fn config(&self) -> &ProjectionConfig {
        &self.config
    }

    fn params(&self, input: &ProjectionInput) -> [f32; PARAM_COUNT] {
        let rig = input.rig;
        let depth = rig.depth_model.depth;
        let color = &rig.color_model;
        let d = &color.distortion;

        let mut params = [0.0f32; PARAM_COUNT];
        params[0] = input.depth.width as f32;
        params[1] = input.depth.height as f32;
        params[2] = input.color.width() as f32;
        params[3] = input.color.height() as f32;
        params[4] = depth.scale;
        params[5] = depth.bias;
        params[6] = depth.units_per_meter;
        params[7] = color.intrinsics.fx as f32;
        params[8] = color.intrinsics.fy as f32;
        params[9] = color.intrinsics.cx as f32;
        params[10] = color.intrinsics.cy as f32;
        params[11..19].copy_from_slice(&[d.k1, d.k2, d.k3, d.k4, d.k5, d.k6, d.p1, d.p2].map(|k| k as f32));
        params[19..31].copy_from_slice(&rig.extrinsics.to_row_major());
        params[31] = self.config.black_threshold as f32;
        params[32] = if self.config.flip_color_rows { 1.0 } else { 0.0 };
        if let Some(bounds) = self.config.active_bounds() {
            params[33] = 1.0;
            params[34..46].copy_from_slice(&bounds.to_row_major());
        }
        params
    }

    #[instrument(name = "project_cuda", skip_all, fields(frame = input.frame_index))]
    pub fn project(&self, input: &ProjectionInput) -> anyhow::Result<PointBuffer> {
        input.validate()?;
        let pixel_count = input.depth.samples.len();

        let d_depth = self.stream.clone_htod(&input.depth.samples)?;
        let rays: Vec<f32> = input.rig.table().rays().iter().flatten().copied().collect();
        let d_rays = self.stream.clone_htod(&rays)?;
        let d_color = self.stream.clone_htod(input.color.as_raw())?;
        let d_params = self.stream.clone_htod(&self.params(input))?;

        let mut d_positions = self.stream.alloc_zeros::<f32>(pixel_count * 3)?;
        let mut d_colors = self.stream.alloc_zeros::<u8>(pixel_count * 4)?;
        let mut d_count = self.stream.alloc_zeros::<u32>(1)?;
        let mut d_stats = self.stream.alloc_zeros::<u32>(STAT_COUNT)?;

        let mut launch_args = self.stream.launch_builder(&self.kernel);
        launch_args.arg(&d_depth);
        launch_args.arg(&d_rays);
        launch_args.arg(&d_color);
        launch_args.arg(&d_params);
        launch_args.arg(&mut d_positions);
        launch_args.arg(&mut d_colors);
        launch_args.arg(&mut d_count);
        launch_args.arg(&mut d_stats);

        let threads = (16, 16, 1);
        let cfg = LaunchConfig {
            grid_dim: (
                input.depth.width.div_ceil(16) as u32,
                input.depth.height.div_ceil(16) as u32,
                1,
            ),
            block_dim: threads,
            shared_mem_bytes: 0,
        };
        unsafe { launch_args.launch(cfg)? };

        let count = self.stream.clone_dtoh(&d_count)?[0] as usize;
        let positions = self.stream.clone_dtoh(&d_positions)?;
        let colors = self.stream.clone_dtoh(&d_colors)?;
        let counters = self.stream.clone_dtoh(&d_stats)?;

        let mut buffer = input.empty_buffer();
        buffer.points = positions[..count * 3]
            .chunks_exact(3)
            .zip(colors[..count * 4].chunks_exact(4))
            .map(|(p, c)| PointSample {
                position: Vec3::new(p[0], p[1], p[2]),
                color: [c[0], c[1], c[2], c[3]],
            })
            .collect();
        buffer.stats = ProjectionStats {
            considered: pixel_count,
            accepted: count,
            invalid_depth: counters[0] as usize,
            behind_color_camera: counters[1] as usize,
            out_of_color_image: counters[2] as usize,
            black_color: counters[3] as usize,
            outside_bounds: counters[4] as usize,
        };

        debug!(accepted = buffer.stats.accepted, rejected = buffer.stats.rejected(), "Projected frame");
        Ok(buffer)
    }
}
