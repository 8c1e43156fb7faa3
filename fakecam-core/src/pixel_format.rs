use std::fmt::{self, Display};

/// gralloc / HAL 像素格式 (`HAL_PIXEL_FORMAT_*`)
///
/// 与 FourCC 不同，HAL 格式是一个小整数。这里保持 newtype 形式，
/// 驱动返回的私有格式即使不在常量表里也能原样携带。
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct PixelFormat(pub i32);

/// 常用像素格式定义
impl PixelFormat {
    // --- RGB Formats ---
    pub const RGBA_8888: Self = Self(0x1);
    pub const RGBX_8888: Self = Self(0x2);
    pub const RGB_888: Self = Self(0x3);

    // --- YUV Formats ---
    /// NV21 (YCrCb 4:2:0 semi-planar)，模拟器 flexible YUV 的真实底层布局
    pub const YCRCB_420_SP: Self = Self(0x11);
    /// YV12 4:2:0 (Planar)
    pub const YV12: Self = Self(0x3231_5659);
    /// Flexible YUV，具体布局由 gralloc 决定
    pub const YCBCR_420_888: Self = Self(0x23);

    // --- Camera Formats ---
    /// Raw Bayer 16-bit
    pub const RAW_SENSOR: Self = Self(0x20);
    /// 变长不透明数据，承载 JPEG 压缩结果
    pub const BLOB: Self = Self(0x21);
    /// 由 gralloc 根据 usage 决定实际格式
    pub const IMPLEMENTATION_DEFINED: Self = Self(0x22);

    /// stream 配置允许的格式集合
    pub const SUPPORTED_STREAM_FORMATS: [Self; 5] = [
        Self::RAW_SENSOR,
        Self::BLOB,
        Self::RGBA_8888,
        Self::IMPLEMENTATION_DEFINED,
        // YV12 / NV21 均通过 YCbCr_420_888 暴露
        Self::YCBCR_420_888,
    ];

    pub fn is_supported_stream_format(&self) -> bool {
        Self::SUPPORTED_STREAM_FORMATS.contains(self)
    }

    /// 判断是否为压缩输出 (JPEG)
    pub fn is_blob(&self) -> bool {
        *self == Self::BLOB
    }

    pub fn is_flexible_yuv(&self) -> bool {
        *self == Self::YCBCR_420_888
    }

    /// 估算每像素比特数 (Bits Per Pixel)，用于分配 buffer
    pub fn bpp_estimate(&self) -> u32 {
        match *self {
            Self::RGBA_8888 | Self::RGBX_8888 => 32,
            Self::RGB_888 => 24,
            Self::RAW_SENSOR => 16,
            Self::YCRCB_420_SP | Self::YV12 | Self::YCBCR_420_888 => 12, // 平均 12 bpp
            // BLOB 存放的是传感器输出的 RGB888 原图，压缩后再缩短
            Self::BLOB => 24,
            _ => 0,
        }
    }

    /// 给定尺寸所需的最小字节数
    pub fn buffer_size(&self, width: u32, height: u32) -> usize {
        (width as usize * height as usize * self.bpp_estimate() as usize).div_ceil(8)
    }

    fn name(&self) -> Option<&'static str> {
        Some(match *self {
            Self::RGBA_8888 => "RGBA_8888",
            Self::RGBX_8888 => "RGBX_8888",
            Self::RGB_888 => "RGB_888",
            Self::YCRCB_420_SP => "YCrCb_420_SP",
            Self::YV12 => "YV12",
            Self::YCBCR_420_888 => "YCbCr_420_888",
            Self::RAW_SENSOR => "RAW_SENSOR",
            Self::BLOB => "BLOB",
            Self::IMPLEMENTATION_DEFINED => "IMPLEMENTATION_DEFINED",
            _ => return None,
        })
    }
}

impl Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "0x{:x}", self.0),
        }
    }
}

impl fmt::Debug for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PixelFormat({})", self)
    }
}

impl From<i32> for PixelFormat {
    fn from(val: i32) -> Self {
        Self(val)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn supported_set_excludes_private_yuv() {
        assert!(PixelFormat::BLOB.is_supported_stream_format());
        assert!(PixelFormat::YCBCR_420_888.is_supported_stream_format());
        assert!(!PixelFormat::YCRCB_420_SP.is_supported_stream_format());
        assert!(!PixelFormat::YV12.is_supported_stream_format());
    }

    #[test]
    fn display_falls_back_to_hex() {
        assert_eq!(PixelFormat::BLOB.to_string(), "BLOB");
        assert_eq!(PixelFormat(0x7f).to_string(), "0x7f");
    }

    #[test]
    fn nv21_buffer_size() {
        assert_eq!(PixelFormat::YCRCB_420_SP.buffer_size(640, 480), 640 * 480 * 3 / 2);
    }
}
