use crate::buffer::{BufferHandle, SensorBuffer, SensorBuffers, YCbCrLayout};
use crate::error::Result;
use crate::metadata::CaptureSettings;
use crate::request::{CaptureRequest, CaptureResult, NotifyMessage, RequestTemplate};
use crate::stream::{BufferUsage, Camera3Stream, StreamId};
use crate::time::Nsecs;
use std::sync::Arc;
use std::time::Duration;

// --- 协作者接口 (由模拟后端或真实硬件实现) ---

/// 传感器事件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorEvent {
    /// 某一帧开始曝光
    ExposureStart,
}

/// 传感器事件回调
pub trait SensorListener: Send + Sync {
    fn on_sensor_event(&self, frame_number: u32, event: SensorEvent, timestamp: Nsecs);
}

/// 1. 图像传感器
///
/// 参数在 VSync 之后写入，对下一帧生效。
pub trait Sensor: Send + Sync {
    fn start_up(&self) -> Result<()>;
    fn shut_down(&self) -> Result<()>;

    fn set_sensor_listener(&self, listener: Arc<dyn SensorListener>);

    fn set_exposure_time(&self, ns: Nsecs);
    fn set_frame_duration(&self, ns: Nsecs);
    fn set_sensitivity(&self, iso: u32);
    /// 下一帧的目标 buffer；传感器持有自己的一份句柄
    fn set_destination_buffers(&self, buffers: SensorBuffers);
    fn set_frame_number(&self, frame_number: u32);

    /// 等待下一个帧边界，超时返回 false
    fn wait_for_vsync(&self, timeout: Duration) -> bool;

    /// 等待一帧像素就绪，返回该帧的曝光时间戳
    fn wait_for_new_frame(&self, timeout: Duration) -> Option<Nsecs>;
}

/// JPEG 压缩完成回调
pub trait JpegListener: Send + Sync {
    fn on_jpeg_done(&self, jpeg_buffer: &SensorBuffer, success: bool);
    fn on_jpeg_input_done(&self, input_buffer: &SensorBuffer);
}

/// 2. 异步 JPEG 压缩器
///
/// 同一时间只处理一组 buffer。`start` 取得 buffer 集合的所有权，
/// 完成后通过 listener 归还 BLOB buffer。
pub trait JpegCompressor: Send + Sync {
    fn start(&self, buffers: SensorBuffers, listener: Arc<dyn JpegListener>) -> Result<()>;

    /// 等待压缩器空闲，超时返回 false
    fn wait_for_done(&self, timeout: Duration) -> bool;
}

/// 3. 图形 buffer 映射 (对应 GraphicBufferMapper)
pub trait BufferMapper: Send + Sync {
    /// 锁定整块 buffer 以供 CPU 访问
    fn lock(&self, handle: &BufferHandle, usage: BufferUsage, width: u32, height: u32) -> Result<()>;

    /// flexible YUV 专用锁定路径，返回平面布局
    fn lock_ycbcr(
        &self,
        handle: &BufferHandle,
        usage: BufferUsage,
        width: u32,
        height: u32,
    ) -> Result<YCbCrLayout>;

    fn unlock(&self, handle: &BufferHandle) -> Result<()>;
}

/// 协作者工厂：connect 时创建传感器和压缩器
pub trait PipelineFactory: Send + Sync {
    fn create_sensor(&self) -> Result<Arc<dyn Sensor>>;
    fn create_jpeg_compressor(&self) -> Result<Arc<dyn JpegCompressor>>;
    fn buffer_mapper(&self) -> Arc<dyn BufferMapper>;
}

/// 4. 框架回调 (对应 `camera3_callback_ops`)
pub trait CallbackOps: Send + Sync {
    fn process_capture_result(&self, result: CaptureResult);
    fn notify(&self, msg: NotifyMessage);
}

// --- 核心 Trait：设备操作表 (对应 `camera3_device_ops`) ---

pub trait Camera3Device: Send + Sync {
    /// 安装框架回调，设备进入 Ready
    fn initialize(&self, callbacks: Arc<dyn CallbackOps>) -> Result<()>;

    /// 配置 stream 集合；HAL 回填 `usage` 与 `max_buffers`
    fn configure_streams(&self, streams: &mut [Camera3Stream]) -> Result<()>;

    /// 每个 stream 只能注册一次
    fn register_stream_buffers(&self, stream: StreamId, buffers: &[BufferHandle]) -> Result<()>;

    fn construct_default_request_settings(&self, template: RequestTemplate) -> Result<CaptureSettings>;

    /// 校验并接受一个拍摄请求；结果通过 `CallbackOps` 异步返回
    fn process_capture_request(&self, request: CaptureRequest) -> Result<()>;

    /// 调试信息
    fn dump(&self) -> String;
}
