pub mod device;
pub(crate) mod internal;
pub(crate) mod readout; // 内部模块，不对外暴露

// Re-export 核心类型，方便 prelude 使用
pub use device::FakeCamera3;
pub use fakecam_core as core;

/// 预置模块，用户可以通过 `use fakecam::prelude::*;` 导入常用项
pub mod prelude {
    pub use crate::device::fake_3a::State3A;
    pub use crate::device::static_info::{CameraInfo, Facing, HardwareLevel, StaticInfo};
    pub use crate::device::{DeviceStatus, FakeCamera3};
    pub use fakecam_core::prelude::*;
}
