//! 默认请求模板
//!
//! 每种模板只构造一次，由设备缓存，之后返回同一份内容的拷贝。

use super::static_info::SENSOR_RESOLUTION;
use fakecam_core::controls::{
    processing, AeLock, AeMode, AfMode, AwbMode, CaptureIntent, ControlMode, SceneMode,
};
use fakecam_core::metadata::{CaptureSettings, Tag};
use fakecam_core::request::RequestTemplate;
use fakecam_core::time::MSEC;

// android.request.type = CAPTURE, metadataMode = FULL
const REQUEST_TYPE_CAPTURE: u8 = 1;
const METADATA_MODE_FULL: u8 = 1;
const ANTIBANDING_AUTO: u8 = 3;

/// 默认帧间隔 (1/30 s)
pub const DEFAULT_FRAME_DURATION: i64 = 33_333_333;

pub fn default_request_settings(template: RequestTemplate, facing_back: bool) -> CaptureSettings {
    let (width, height) = SENSOR_RESOLUTION;
    let mut s = CaptureSettings::new();

    // android.request
    s.update(Tag::REQUEST_TYPE, REQUEST_TYPE_CAPTURE);
    s.update(Tag::REQUEST_METADATA_MODE, METADATA_MODE_FULL);
    s.update(Tag::REQUEST_ID, 0i32);
    s.update(Tag::REQUEST_FRAME_COUNT, 0i32);

    // android.lens
    s.update(Tag::LENS_FOCUS_DISTANCE, 0f32);
    s.update(Tag::LENS_APERTURE, 2.8f32);
    s.update(Tag::LENS_FOCAL_LENGTH, 5.0f32);
    s.update(Tag::LENS_FILTER_DENSITY, 0f32);
    s.update(Tag::LENS_OPTICAL_STABILIZATION_MODE, 0u8);

    // android.sensor (时间戳只出现在结果里)
    s.update(Tag::SENSOR_EXPOSURE_TIME, 10 * MSEC);
    s.update(Tag::SENSOR_FRAME_DURATION, DEFAULT_FRAME_DURATION);
    s.update(Tag::SENSOR_SENSITIVITY, 100i32);

    // android.flash
    s.update(Tag::FLASH_MODE, 0u8);
    s.update(Tag::FLASH_FIRING_POWER, 10u8);
    s.update(Tag::FLASH_FIRING_TIME, 0i64);

    // 各处理模块：拍照类模板走高质量，其余走快速
    let quality = match template {
        RequestTemplate::StillCapture
        | RequestTemplate::VideoSnapshot
        | RequestTemplate::ZeroShutterLag => processing::HIGH_QUALITY,
        RequestTemplate::Preview | RequestTemplate::VideoRecord => processing::FAST,
    };
    for tag in [
        Tag::HOT_PIXEL_MODE,
        Tag::DEMOSAIC_MODE,
        Tag::NOISE_REDUCTION_MODE,
        Tag::SHADING_MODE,
        Tag::GEOMETRIC_MODE,
        Tag::COLOR_CORRECTION_MODE,
        Tag::TONEMAP_MODE,
        Tag::EDGE_MODE,
    ] {
        s.update(tag, quality);
    }

    s.update(Tag::NOISE_REDUCTION_STRENGTH, 5u8);
    s.update(
        Tag::COLOR_CORRECTION_TRANSFORM,
        vec![1.0f32, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0],
    );
    let linear = [0.0f32, 0.0, 1.0, 1.0];
    s.update(Tag::TONEMAP_CURVE_RED, &linear[..]);
    s.update(Tag::TONEMAP_CURVE_GREEN, &linear[..]);
    s.update(Tag::TONEMAP_CURVE_BLUE, &linear[..]);
    s.update(Tag::EDGE_STRENGTH, 5u8);

    // android.scaler
    s.update(Tag::SCALER_CROP_REGION, vec![0i32, 0, width as i32]);

    // android.jpeg
    s.update(Tag::JPEG_QUALITY, 80u8);
    s.update(Tag::JPEG_THUMBNAIL_SIZE, vec![640i32, 480]);
    s.update(Tag::JPEG_THUMBNAIL_QUALITY, 80u8);
    s.update(Tag::JPEG_GPS_COORDINATES, vec![0f64, 0.0]);
    let mut method = [0u8; 32];
    method[..4].copy_from_slice(b"None");
    s.update(Tag::JPEG_GPS_PROCESSING_METHOD, &method[..]);
    s.update(Tag::JPEG_GPS_TIMESTAMP, 0i64);
    s.update(Tag::JPEG_ORIENTATION, 0i32);

    // android.statistics
    s.update(Tag::STATISTICS_FACE_DETECT_MODE, 0u8);
    s.update(Tag::STATISTICS_HISTOGRAM_MODE, 0u8);
    s.update(Tag::STATISTICS_SHARPNESS_MAP_MODE, 0u8);

    // android.control
    let intent = match template {
        RequestTemplate::Preview => CaptureIntent::Preview,
        RequestTemplate::StillCapture => CaptureIntent::StillCapture,
        RequestTemplate::VideoRecord => CaptureIntent::VideoRecord,
        RequestTemplate::VideoSnapshot => CaptureIntent::VideoSnapshot,
        RequestTemplate::ZeroShutterLag => CaptureIntent::ZeroShutterLag,
    };
    s.update(Tag::CONTROL_CAPTURE_INTENT, u8::from(intent));
    s.update(Tag::CONTROL_MODE, u8::from(ControlMode::Auto));
    s.update(Tag::CONTROL_EFFECT_MODE, 0u8);
    s.update(Tag::CONTROL_SCENE_MODE, u8::from(SceneMode::FacePriority));
    s.update(Tag::CONTROL_AE_MODE, u8::from(AeMode::On));
    s.update(Tag::CONTROL_AE_LOCK, u8::from(AeLock::Off));

    let regions = vec![0i32, 0, width as i32, height as i32, 1000];
    s.update(Tag::CONTROL_AE_REGIONS, regions.clone());
    s.update(Tag::CONTROL_AE_EXPOSURE_COMPENSATION, 0i32);
    s.update(Tag::CONTROL_AE_TARGET_FPS_RANGE, vec![10i32, 30]);
    s.update(Tag::CONTROL_AE_ANTIBANDING_MODE, ANTIBANDING_AUTO);
    s.update(Tag::CONTROL_AWB_MODE, u8::from(AwbMode::Auto));
    s.update(Tag::CONTROL_AWB_LOCK, 0u8);
    s.update(Tag::CONTROL_AWB_REGIONS, regions.clone());

    // 前置摄像头没有对焦马达
    let af_mode = if !facing_back {
        AfMode::Off
    } else {
        match template {
            RequestTemplate::Preview | RequestTemplate::StillCapture => AfMode::Auto,
            RequestTemplate::VideoRecord | RequestTemplate::VideoSnapshot => AfMode::ContinuousVideo,
            RequestTemplate::ZeroShutterLag => AfMode::ContinuousPicture,
        }
    };
    s.update(Tag::CONTROL_AF_MODE, u8::from(af_mode));
    s.update(Tag::CONTROL_AF_REGIONS, regions);
    s.update(Tag::CONTROL_VIDEO_STABILIZATION_MODE, 0u8);

    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use fakecam_core::metadata::Entry;

    #[test]
    fn still_templates_use_high_quality_processing() {
        for t in RequestTemplate::ALL {
            let s = default_request_settings(t, true);
            let expected = match t {
                RequestTemplate::Preview | RequestTemplate::VideoRecord => processing::FAST,
                _ => processing::HIGH_QUALITY,
            };
            assert_eq!(s.find_u8(Tag::NOISE_REDUCTION_MODE), Some(expected), "{:?}", t);
            assert_eq!(s.find_u8(Tag::EDGE_MODE), Some(expected), "{:?}", t);
        }
    }

    #[test]
    fn af_mode_follows_template_and_facing() {
        let af = |t, back| default_request_settings(t, back).find_u8(Tag::CONTROL_AF_MODE);
        assert_eq!(af(RequestTemplate::Preview, true), Some(AfMode::Auto as u8));
        assert_eq!(af(RequestTemplate::VideoRecord, true), Some(AfMode::ContinuousVideo as u8));
        assert_eq!(af(RequestTemplate::ZeroShutterLag, true), Some(AfMode::ContinuousPicture as u8));
        assert_eq!(af(RequestTemplate::StillCapture, false), Some(AfMode::Off as u8));
    }

    #[test]
    fn template_carries_3a_inputs_and_sensor_defaults() {
        let s = default_request_settings(RequestTemplate::Preview, true);
        assert_eq!(s.find_u8(Tag::CONTROL_MODE), Some(ControlMode::Auto as u8));
        assert_eq!(s.find_u8(Tag::CONTROL_SCENE_MODE), Some(SceneMode::FacePriority as u8));
        assert_eq!(s.find_i64(Tag::SENSOR_EXPOSURE_TIME), Some(10 * MSEC));
        assert_eq!(s.find_i64(Tag::SENSOR_FRAME_DURATION), Some(DEFAULT_FRAME_DURATION));
        assert_eq!(s.find_i32(Tag::SENSOR_SENSITIVITY), Some(100));
        assert_eq!(
            s.find(Tag::CONTROL_AE_REGIONS),
            Some(&Entry::Int32(vec![0, 0, 640, 480, 1000]))
        );
        assert_eq!(
            s.find_u8(Tag::CONTROL_CAPTURE_INTENT),
            Some(CaptureIntent::Preview as u8)
        );
    }
}
