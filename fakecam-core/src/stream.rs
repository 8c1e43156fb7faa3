use bitflags::bitflags;
use std::fmt;

use crate::pixel_format::PixelFormat;

/// 客户端分配的 stream 标识，跨多次 configure 调用保持不变
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct StreamId(pub u32);

impl fmt::Debug for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StreamId({})", self.0)
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Stream 方向 (`CAMERA3_STREAM_*`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum StreamType {
    /// HAL 写入，框架读取
    Output,
    /// 框架写入，HAL 读取 (Reprocess)
    Input,
    /// 双向
    Bidirectional,
}

impl StreamType {
    /// 输入能力的 stream 同一时间最多一个
    pub fn is_input_capable(&self) -> bool {
        matches!(self, Self::Input | Self::Bidirectional)
    }

    /// 根据方向推导 gralloc usage
    pub fn usage(&self) -> BufferUsage {
        match self {
            Self::Output => BufferUsage::HW_CAMERA_WRITE,
            Self::Input => BufferUsage::HW_CAMERA_READ,
            Self::Bidirectional => BufferUsage::HW_CAMERA_READ | BufferUsage::HW_CAMERA_WRITE,
        }
    }
}

bitflags! {
    /// gralloc usage 位 (只保留相机相关的部分)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct BufferUsage: u32 {
        const SW_READ_OFTEN = 0x0000_0003;
        const SW_WRITE_OFTEN = 0x0000_0030;
        const HW_CAMERA_WRITE = 0x0002_0000;
        const HW_CAMERA_READ = 0x0004_0000;
    }
}

/// 一个 stream 的描述 (对应 `camera3_stream_t`)
///
/// `usage` 与 `max_buffers` 由 HAL 在 configure 时回填。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Camera3Stream {
    pub id: StreamId,
    pub stream_type: StreamType,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub usage: BufferUsage,
    /// 同时在途的最大 buffer 数
    pub max_buffers: u32,
}

impl Camera3Stream {
    pub fn new(id: u32, stream_type: StreamType, width: u32, height: u32, format: PixelFormat) -> Self {
        Self {
            id: StreamId(id),
            stream_type,
            width,
            height,
            format,
            usage: BufferUsage::empty(),
            max_buffers: 0,
        }
    }

    pub fn output(id: u32, width: u32, height: u32, format: PixelFormat) -> Self {
        Self::new(id, StreamType::Output, width, height, format)
    }

    pub fn input(id: u32, width: u32, height: u32, format: PixelFormat) -> Self {
        Self::new(id, StreamType::Input, width, height, format)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_follows_direction() {
        assert_eq!(StreamType::Output.usage(), BufferUsage::HW_CAMERA_WRITE);
        assert_eq!(StreamType::Input.usage(), BufferUsage::HW_CAMERA_READ);
        assert!(StreamType::Bidirectional
            .usage()
            .contains(BufferUsage::HW_CAMERA_READ | BufferUsage::HW_CAMERA_WRITE));
    }
}
