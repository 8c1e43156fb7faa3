// 开启一些 Clippy 检查，保证代码质量
#![warn(missing_debug_implementations, rust_2018_idioms, unreachable_pub)]

// 模块定义
pub mod buffer;
pub mod builder;
pub mod controls;
pub mod error;
pub mod metadata;
pub mod pixel_format;
pub mod request;
pub mod stream;
pub mod time;
pub mod traits;

// 方便用户使用的 Prelude
pub mod prelude {
    pub use crate::buffer::{
        BufferHandle, BufferStatus, Fence, SensorBuffer, SensorBuffers, StreamBuffer, YCbCrLayout,
    };
    pub use crate::builder::DeviceConfig;
    pub use crate::error::{CameraError, Result};
    pub use crate::metadata::{CaptureSettings, Entry, Tag};
    pub use crate::pixel_format::PixelFormat;
    pub use crate::request::{CaptureRequest, CaptureResult, NotifyMessage, RequestTemplate};
    pub use crate::stream::{BufferUsage, Camera3Stream, StreamId, StreamType};
    pub use crate::traits::{
        BufferMapper, CallbackOps, Camera3Device, JpegCompressor, JpegListener, PipelineFactory,
        Sensor, SensorEvent, SensorListener,
    };
}

// 版本与构建信息常量
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
