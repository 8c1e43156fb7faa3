//! 静态特性 (camera characteristics)
//!
//! 初始化时按朝向构造一次，之后只读。

use fakecam_core::controls::{AeMode, AfMode, AwbMode};
use fakecam_core::pixel_format::PixelFormat;
use fakecam_core::time::Nsecs;

/// 传感器像素阵列尺寸
pub const SENSOR_RESOLUTION: (u32, u32) = (640, 480);
/// 最短帧间隔 (约 1/30 s)
pub const SENSOR_MIN_FRAME_DURATION: Nsecs = 33_331_760;
pub const SENSOR_MAX_FRAME_DURATION: Nsecs = 30_000_000_000;
pub const SENSOR_EXPOSURE_TIME_RANGE: (Nsecs, Nsecs) = (1_000, 30_000_000_000);
pub const SENSOR_SENSITIVITY_RANGE: (i32, i32) = (100, 1600);
pub const JPEG_MAX_SIZE: usize = 300_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub enum Facing {
    Back,
    Front,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub enum HardwareLevel {
    Limited,
    Full,
}

pub type Size = (u32, u32);

#[derive(Debug, Clone, PartialEq)]
pub struct StaticInfo {
    pub facing: Facing,
    pub hardware_level: HardwareLevel,

    // android.lens
    /// 屈光度；前置为定焦 (0)
    pub min_focus_distance: f32,
    pub focal_length: f32,
    pub aperture: f32,

    // android.sensor
    pub pixel_array_size: Size,
    pub physical_size_mm: (f32, f32),
    pub exposure_time_range: (Nsecs, Nsecs),
    pub sensitivity_range: (i32, i32),
    pub max_frame_duration: Nsecs,

    // android.scaler
    pub available_formats: Vec<PixelFormat>,
    pub raw_sizes: Vec<Size>,
    pub processed_sizes: Vec<Size>,
    pub jpeg_sizes: Vec<Size>,
    pub min_frame_duration: Nsecs,
    pub max_digital_zoom: f32,

    // android.jpeg
    pub jpeg_thumbnail_sizes: Vec<Size>,
    pub jpeg_max_size: usize,

    // android.control
    pub ae_modes: Vec<AeMode>,
    pub af_modes: Vec<AfMode>,
    pub awb_modes: Vec<AwbMode>,
    pub ae_compensation_range: (i32, i32),
    pub ae_target_fps_ranges: Vec<(i32, i32)>,
    pub flash_available: bool,
}

impl StaticInfo {
    pub fn new(facing: Facing) -> Self {
        let back = facing == Facing::Back;
        Self {
            facing,
            hardware_level: if back {
                HardwareLevel::Full
            } else {
                HardwareLevel::Limited
            },
            // 后置最近 5 cm；前置定焦
            min_focus_distance: if back { 1.0 / 0.05 } else { 0.0 },
            focal_length: 3.30,
            aperture: 2.8,
            pixel_array_size: SENSOR_RESOLUTION,
            physical_size_mm: (3.20, 2.40),
            exposure_time_range: SENSOR_EXPOSURE_TIME_RANGE,
            sensitivity_range: SENSOR_SENSITIVITY_RANGE,
            max_frame_duration: SENSOR_MAX_FRAME_DURATION,
            available_formats: PixelFormat::SUPPORTED_STREAM_FORMATS.to_vec(),
            raw_sizes: vec![SENSOR_RESOLUTION],
            processed_sizes: if back {
                vec![(640, 480), (320, 240)]
            } else {
                vec![(320, 240), (160, 120)]
            },
            jpeg_sizes: if back { vec![(640, 480)] } else { vec![(320, 240)] },
            min_frame_duration: SENSOR_MIN_FRAME_DURATION,
            max_digital_zoom: 10.0,
            jpeg_thumbnail_sizes: vec![(0, 0), (160, 120), (320, 240)],
            jpeg_max_size: JPEG_MAX_SIZE,
            ae_modes: vec![AeMode::Off, AeMode::On],
            af_modes: if back {
                vec![
                    AfMode::Off,
                    AfMode::Auto,
                    AfMode::Macro,
                    AfMode::ContinuousVideo,
                    AfMode::ContinuousPicture,
                ]
            } else {
                vec![AfMode::Off]
            },
            awb_modes: vec![
                AwbMode::Off,
                AwbMode::Auto,
                AwbMode::Incandescent,
                AwbMode::Fluorescent,
                AwbMode::Daylight,
                AwbMode::Shade,
            ],
            ae_compensation_range: (-9, 9),
            ae_target_fps_ranges: vec![(5, 30), (15, 30)],
            flash_available: false,
        }
    }

    /// 某个格式在给定尺寸下是否有对应的输出配置
    pub fn supports_size(&self, format: PixelFormat, width: u32, height: u32) -> bool {
        let sizes = match format {
            PixelFormat::RAW_SENSOR => &self.raw_sizes,
            PixelFormat::BLOB => &self.jpeg_sizes,
            f if f.is_supported_stream_format() => &self.processed_sizes,
            _ => return false,
        };
        sizes.contains(&(width, height))
    }
}

/// `get_camera_info` 的返回值
#[derive(Debug, Clone, PartialEq)]
pub struct CameraInfo {
    pub facing: Facing,
    /// 传感器安装角度
    pub orientation: i32,
    pub static_info: StaticInfo,
}
