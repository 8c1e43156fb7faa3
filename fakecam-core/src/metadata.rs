use std::collections::BTreeMap;
use std::fmt;

/// 元数据标签 (section << 16 | index)
///
/// 标准标签用下面的常量；厂商标签从 `VENDOR_START` 开始，
/// 本库不解释它们，只负责在设置里原样携带。
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct Tag(pub u32);

const fn tag(section: u32, index: u32) -> Tag {
    Tag((section << 16) | index)
}

// section 编号
const COLOR_CORRECTION: u32 = 0;
const CONTROL: u32 = 1;
const DEMOSAIC: u32 = 2;
const EDGE: u32 = 3;
const FLASH: u32 = 4;
const GEOMETRIC: u32 = 6;
const HOT_PIXEL: u32 = 7;
const JPEG: u32 = 8;
const LENS: u32 = 9;
const NOISE_REDUCTION: u32 = 11;
const REQUEST: u32 = 13;
const SCALER: u32 = 14;
const SENSOR: u32 = 15;
const SHADING: u32 = 17;
const STATISTICS: u32 = 18;
const TONEMAP: u32 = 20;

impl Tag {
    pub const VENDOR_START: u32 = 0x8000_0000;

    // --- android.colorCorrection ---
    pub const COLOR_CORRECTION_MODE: Self = tag(COLOR_CORRECTION, 0);
    pub const COLOR_CORRECTION_TRANSFORM: Self = tag(COLOR_CORRECTION, 1);

    // --- android.control ---
    pub const CONTROL_AE_ANTIBANDING_MODE: Self = tag(CONTROL, 0);
    pub const CONTROL_AE_EXPOSURE_COMPENSATION: Self = tag(CONTROL, 1);
    pub const CONTROL_AE_LOCK: Self = tag(CONTROL, 2);
    pub const CONTROL_AE_MODE: Self = tag(CONTROL, 3);
    pub const CONTROL_AE_REGIONS: Self = tag(CONTROL, 4);
    pub const CONTROL_AE_TARGET_FPS_RANGE: Self = tag(CONTROL, 5);
    pub const CONTROL_AE_PRECAPTURE_TRIGGER: Self = tag(CONTROL, 6);
    pub const CONTROL_AF_MODE: Self = tag(CONTROL, 7);
    pub const CONTROL_AF_REGIONS: Self = tag(CONTROL, 8);
    pub const CONTROL_AF_TRIGGER: Self = tag(CONTROL, 9);
    pub const CONTROL_AWB_LOCK: Self = tag(CONTROL, 10);
    pub const CONTROL_AWB_MODE: Self = tag(CONTROL, 11);
    pub const CONTROL_AWB_REGIONS: Self = tag(CONTROL, 12);
    pub const CONTROL_CAPTURE_INTENT: Self = tag(CONTROL, 13);
    pub const CONTROL_EFFECT_MODE: Self = tag(CONTROL, 14);
    pub const CONTROL_MODE: Self = tag(CONTROL, 15);
    pub const CONTROL_SCENE_MODE: Self = tag(CONTROL, 16);
    pub const CONTROL_VIDEO_STABILIZATION_MODE: Self = tag(CONTROL, 17);
    pub const CONTROL_AE_STATE: Self = tag(CONTROL, 31);
    pub const CONTROL_AF_STATE: Self = tag(CONTROL, 32);
    pub const CONTROL_AWB_STATE: Self = tag(CONTROL, 34);
    pub const CONTROL_AE_PRECAPTURE_ID: Self = tag(CONTROL, 35);
    pub const CONTROL_AF_TRIGGER_ID: Self = tag(CONTROL, 36);

    // --- processing blocks ---
    pub const DEMOSAIC_MODE: Self = tag(DEMOSAIC, 0);
    pub const EDGE_MODE: Self = tag(EDGE, 0);
    pub const EDGE_STRENGTH: Self = tag(EDGE, 1);
    pub const GEOMETRIC_MODE: Self = tag(GEOMETRIC, 0);
    pub const HOT_PIXEL_MODE: Self = tag(HOT_PIXEL, 0);
    pub const NOISE_REDUCTION_MODE: Self = tag(NOISE_REDUCTION, 0);
    pub const NOISE_REDUCTION_STRENGTH: Self = tag(NOISE_REDUCTION, 1);
    pub const SHADING_MODE: Self = tag(SHADING, 0);
    pub const TONEMAP_CURVE_BLUE: Self = tag(TONEMAP, 0);
    pub const TONEMAP_CURVE_GREEN: Self = tag(TONEMAP, 1);
    pub const TONEMAP_CURVE_RED: Self = tag(TONEMAP, 2);
    pub const TONEMAP_MODE: Self = tag(TONEMAP, 3);

    // --- android.flash ---
    pub const FLASH_FIRING_POWER: Self = tag(FLASH, 0);
    pub const FLASH_FIRING_TIME: Self = tag(FLASH, 1);
    pub const FLASH_MODE: Self = tag(FLASH, 2);

    // --- android.jpeg ---
    pub const JPEG_GPS_COORDINATES: Self = tag(JPEG, 0);
    pub const JPEG_GPS_PROCESSING_METHOD: Self = tag(JPEG, 1);
    pub const JPEG_GPS_TIMESTAMP: Self = tag(JPEG, 2);
    pub const JPEG_ORIENTATION: Self = tag(JPEG, 3);
    pub const JPEG_QUALITY: Self = tag(JPEG, 4);
    pub const JPEG_THUMBNAIL_QUALITY: Self = tag(JPEG, 5);
    pub const JPEG_THUMBNAIL_SIZE: Self = tag(JPEG, 6);

    // --- android.lens ---
    pub const LENS_APERTURE: Self = tag(LENS, 0);
    pub const LENS_FILTER_DENSITY: Self = tag(LENS, 1);
    pub const LENS_FOCAL_LENGTH: Self = tag(LENS, 2);
    pub const LENS_FOCUS_DISTANCE: Self = tag(LENS, 3);
    pub const LENS_OPTICAL_STABILIZATION_MODE: Self = tag(LENS, 4);

    // --- android.request ---
    pub const REQUEST_FRAME_COUNT: Self = tag(REQUEST, 0);
    pub const REQUEST_ID: Self = tag(REQUEST, 1);
    pub const REQUEST_METADATA_MODE: Self = tag(REQUEST, 3);
    pub const REQUEST_TYPE: Self = tag(REQUEST, 8);

    // --- android.scaler ---
    pub const SCALER_CROP_REGION: Self = tag(SCALER, 0);

    // --- android.sensor ---
    pub const SENSOR_EXPOSURE_TIME: Self = tag(SENSOR, 0);
    pub const SENSOR_FRAME_DURATION: Self = tag(SENSOR, 1);
    pub const SENSOR_SENSITIVITY: Self = tag(SENSOR, 2);
    pub const SENSOR_TIMESTAMP: Self = tag(SENSOR, 16);

    // --- android.statistics ---
    pub const STATISTICS_FACE_DETECT_MODE: Self = tag(STATISTICS, 0);
    pub const STATISTICS_HISTOGRAM_MODE: Self = tag(STATISTICS, 1);
    pub const STATISTICS_SHARPNESS_MAP_MODE: Self = tag(STATISTICS, 2);

    pub const fn vendor(index: u32) -> Self {
        Self(Self::VENDOR_START | index)
    }

    pub fn is_vendor(&self) -> bool {
        self.0 >= Self::VENDOR_START
    }

    pub fn section(&self) -> u32 {
        self.0 >> 16
    }
}

impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_vendor() {
            write!(f, "Tag(vendor:0x{:x})", self.0 & !Self::VENDOR_START)
        } else {
            write!(f, "Tag({}.{})", self.section(), self.0 & 0xffff)
        }
    }
}

/// 一个元数据条目：带类型的定长数组
#[derive(Debug, Clone, PartialEq)]
pub enum Entry {
    Byte(Vec<u8>),
    Int32(Vec<i32>),
    Float(Vec<f32>),
    Int64(Vec<i64>),
    Double(Vec<f64>),
}

impl Entry {
    pub fn count(&self) -> usize {
        match self {
            Self::Byte(v) => v.len(),
            Self::Int32(v) => v.len(),
            Self::Float(v) => v.len(),
            Self::Int64(v) => v.len(),
            Self::Double(v) => v.len(),
        }
    }
}

macro_rules! entry_from {
    ($ty:ty, $variant:ident) => {
        impl From<$ty> for Entry {
            fn from(v: $ty) -> Self {
                Self::$variant(vec![v])
            }
        }

        impl From<Vec<$ty>> for Entry {
            fn from(v: Vec<$ty>) -> Self {
                Self::$variant(v)
            }
        }

        impl From<&[$ty]> for Entry {
            fn from(v: &[$ty]) -> Self {
                Self::$variant(v.to_vec())
            }
        }
    };
}

entry_from!(u8, Byte);
entry_from!(i32, Int32);
entry_from!(f32, Float);
entry_from!(i64, Int64);
entry_from!(f64, Double);

/// 一次拍摄的控制参数 (有序 key → value 映射)
///
/// 相当于 `CameraMetadata`：支持复制 (`clone`) 与转移 (`take`)。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CaptureSettings {
    entries: BTreeMap<Tag, Entry>,
}

impl CaptureSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// 转移全部内容，自身变为空 (对应 `acquire`)
    pub fn take(&mut self) -> Self {
        std::mem::take(self)
    }

    pub fn update<E: Into<Entry>>(&mut self, tag: Tag, value: E) {
        self.entries.insert(tag, value.into());
    }

    /// 链式写入，便于构造模板
    pub fn with<E: Into<Entry>>(mut self, tag: Tag, value: E) -> Self {
        self.update(tag, value);
        self
    }

    pub fn erase(&mut self, tag: Tag) -> Option<Entry> {
        self.entries.remove(&tag)
    }

    pub fn find(&self, tag: Tag) -> Option<&Entry> {
        self.entries.get(&tag)
    }

    pub fn contains(&self, tag: Tag) -> bool {
        self.entries.contains_key(&tag)
    }

    pub fn find_u8(&self, tag: Tag) -> Option<u8> {
        match self.find(tag)? {
            Entry::Byte(v) => v.first().copied(),
            _ => None,
        }
    }

    pub fn find_i32(&self, tag: Tag) -> Option<i32> {
        match self.find(tag)? {
            Entry::Int32(v) => v.first().copied(),
            _ => None,
        }
    }

    pub fn find_i64(&self, tag: Tag) -> Option<i64> {
        match self.find(tag)? {
            Entry::Int64(v) => v.first().copied(),
            _ => None,
        }
    }

    pub fn find_f32(&self, tag: Tag) -> Option<f32> {
        match self.find(tag)? {
            Entry::Float(v) => v.first().copied(),
            _ => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Tag, &Entry)> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_lookup_rejects_wrong_type() {
        let s = CaptureSettings::new().with(Tag::SENSOR_EXPOSURE_TIME, 10_000_000i64);
        assert_eq!(s.find_i64(Tag::SENSOR_EXPOSURE_TIME), Some(10_000_000));
        assert_eq!(s.find_i32(Tag::SENSOR_EXPOSURE_TIME), None);
        assert_eq!(s.find_u8(Tag::CONTROL_MODE), None);
    }

    #[test]
    fn take_leaves_source_empty() {
        let mut s = CaptureSettings::new().with(Tag::CONTROL_MODE, 1u8);
        let moved = s.take();
        assert!(s.is_empty());
        assert_eq!(moved.find_u8(Tag::CONTROL_MODE), Some(1));
    }

    #[test]
    fn vendor_tags_are_carried() {
        let vendor = Tag::vendor(7);
        assert!(vendor.is_vendor());
        assert!(!Tag::CONTROL_AE_MODE.is_vendor());
        let s = CaptureSettings::new().with(vendor, vec![1i32, 2, 3]);
        assert_eq!(s.find(vendor).map(Entry::count), Some(3));
    }

    #[test]
    fn iteration_is_ordered_by_tag() {
        let s = CaptureSettings::new()
            .with(Tag::SENSOR_SENSITIVITY, 100i32)
            .with(Tag::CONTROL_MODE, 1u8);
        let tags: Vec<_> = s.iter().map(|(t, _)| *t).collect();
        assert_eq!(tags, vec![Tag::CONTROL_MODE, Tag::SENSOR_SENSITIVITY]);
    }
}
