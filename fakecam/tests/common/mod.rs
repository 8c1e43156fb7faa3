#![allow(dead_code)]

use anyhow::Result;
use fakecam::prelude::*;
use fakecam_simulation::{RecordingCallbacks, SensorConfig, SimulatedPipeline};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

pub const RESULT_TIMEOUT: Duration = Duration::from_secs(3);

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// 比默认值更短的等待，失败路径不用等几秒
pub fn test_config() -> DeviceConfig {
    DeviceConfig::new()
        .rng_seed(1234)
        .readout_wait(Duration::from_millis(2), 500)
        .sync_wait(Duration::from_millis(10), 100)
        .fence_timeout(Duration::from_millis(500))
}

pub struct Harness {
    pub pipeline: Arc<SimulatedPipeline>,
    pub camera: FakeCamera3,
    pub callbacks: Arc<RecordingCallbacks>,
}

impl Harness {
    /// 构造并走到 Ready
    pub fn open(facing: Facing, config: DeviceConfig) -> Result<Self> {
        init_tracing();
        let pipeline = Arc::new(SimulatedPipeline::new(SensorConfig::default()));
        let camera = FakeCamera3::new(0, facing, config, pipeline.clone());
        camera.init()?;
        camera.connect()?;
        let callbacks = Arc::new(RecordingCallbacks::new());
        camera.initialize(callbacks.clone())?;
        Ok(Self {
            pipeline,
            camera,
            callbacks,
        })
    }

    pub fn back() -> Result<Self> {
        Self::open(Facing::Back, test_config())
    }

    /// 配置 stream 并为每个 stream 注册 `count` 个 buffer
    pub fn setup_streams(
        &self,
        streams: &mut [Camera3Stream],
        count: usize,
    ) -> Result<HashMap<StreamId, Vec<BufferHandle>>> {
        self.camera.configure_streams(streams)?;
        let mapper = self.pipeline.mapper();
        let mut buffers = HashMap::new();
        for s in streams.iter() {
            let handles = mapper.allocate(s, count);
            self.camera.register_stream_buffers(s.id, &handles)?;
            buffers.insert(s.id, handles);
        }
        Ok(buffers)
    }

    pub fn preview_settings(&self) -> Result<CaptureSettings> {
        Ok(self
            .camera
            .construct_default_request_settings(RequestTemplate::Preview)?)
    }

    pub fn next_result(&self) -> Result<CaptureResult> {
        self.callbacks
            .recv_result(RESULT_TIMEOUT)
            .ok_or_else(|| anyhow::anyhow!("no capture result within {:?}", RESULT_TIMEOUT))
    }
}

pub fn preview_stream() -> Camera3Stream {
    Camera3Stream::output(1, 640, 480, PixelFormat::RGBA_8888)
}

pub fn jpeg_stream() -> Camera3Stream {
    Camera3Stream::output(2, 320, 240, PixelFormat::BLOB)
}

pub fn yuv_stream() -> Camera3Stream {
    Camera3Stream::output(3, 320, 240, PixelFormat::YCBCR_420_888)
}
