//! 无硬件环境下驱动 fakecam 的模拟后端
//!
//! `SimulatedPipeline` 实现 `PipelineFactory`：设备 connect 时从这里拿到
//! 传感器、JPEG 压缩器和 buffer mapper。测试可以通过它访问最近创建的
//! 传感器 (例如卡住读出) 和 mapper (注入 lock 失败)。

pub mod callbacks;
pub mod fence;
pub mod jpeg;
pub mod mapper;
pub mod sensor;

pub use callbacks::RecordingCallbacks;
pub use fence::SimFence;
pub use jpeg::SimulatedJpegCompressor;
pub use mapper::SimulatedBufferMapper;
pub use sensor::{SensorConfig, SimulatedSensor};

use fakecam_core::error::Result;
use fakecam_core::traits::{BufferMapper, JpegCompressor, PipelineFactory, Sensor};
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Debug)]
pub struct SimulatedPipeline {
    sensor_config: SensorConfig,
    jpeg_quality: u8,
    mapper: Arc<SimulatedBufferMapper>,
    last_sensor: Mutex<Option<Arc<SimulatedSensor>>>,
    last_jpeg: Mutex<Option<Arc<SimulatedJpegCompressor>>>,
}

impl Default for SimulatedPipeline {
    fn default() -> Self {
        Self::new(SensorConfig::default())
    }
}

impl SimulatedPipeline {
    pub fn new(sensor_config: SensorConfig) -> Self {
        Self {
            sensor_config,
            jpeg_quality: jpeg::DEFAULT_JPEG_QUALITY,
            mapper: Arc::new(SimulatedBufferMapper::new()),
            last_sensor: Mutex::new(None),
            last_jpeg: Mutex::new(None),
        }
    }

    pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality;
        self
    }

    pub fn mapper(&self) -> Arc<SimulatedBufferMapper> {
        self.mapper.clone()
    }

    /// 最近一次 connect 创建的传感器
    pub fn sensor(&self) -> Option<Arc<SimulatedSensor>> {
        self.last_sensor
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn jpeg(&self) -> Option<Arc<SimulatedJpegCompressor>> {
        self.last_jpeg
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl PipelineFactory for SimulatedPipeline {
    fn create_sensor(&self) -> Result<Arc<dyn Sensor>> {
        let sensor = Arc::new(SimulatedSensor::new(self.sensor_config));
        *self.last_sensor.lock().unwrap_or_else(PoisonError::into_inner) = Some(sensor.clone());
        Ok(sensor)
    }

    fn create_jpeg_compressor(&self) -> Result<Arc<dyn JpegCompressor>> {
        let jpeg = Arc::new(SimulatedJpegCompressor::new(self.jpeg_quality));
        *self.last_jpeg.lock().unwrap_or_else(PoisonError::into_inner) = Some(jpeg.clone());
        Ok(jpeg)
    }

    fn buffer_mapper(&self) -> Arc<dyn BufferMapper> {
        self.mapper.clone()
    }
}
