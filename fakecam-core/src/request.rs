use crate::buffer::StreamBuffer;
use crate::error::CameraError;
use crate::metadata::CaptureSettings;
use crate::time::Nsecs;

/// 一次拍摄请求 (对应 `camera3_capture_request_t`)
#[derive(Debug, Clone, Default)]
pub struct CaptureRequest {
    pub frame_number: u32,
    /// None 表示沿用上一个被接受的请求的设置
    pub settings: Option<CaptureSettings>,
    pub input_buffer: Option<StreamBuffer>,
    pub output_buffers: Vec<StreamBuffer>,
}

impl CaptureRequest {
    pub fn new(frame_number: u32) -> Self {
        Self {
            frame_number,
            ..Default::default()
        }
    }

    pub fn settings(mut self, settings: CaptureSettings) -> Self {
        self.settings = Some(settings);
        self
    }

    pub fn output(mut self, buffer: StreamBuffer) -> Self {
        self.output_buffers.push(buffer);
        self
    }

    pub fn input(mut self, buffer: StreamBuffer) -> Self {
        self.input_buffer = Some(buffer);
        self
    }
}

/// 拍摄结果 (对应 `camera3_capture_result_t`)
///
/// 一帧可能产生两次结果：主结果 (带元数据) 和延迟的 JPEG 结果
/// (只含一个 BLOB buffer，无元数据)，框架按 frame_number 合并。
#[derive(Debug, Clone)]
pub struct CaptureResult {
    pub frame_number: u32,
    pub result: Option<CaptureSettings>,
    pub output_buffers: Vec<StreamBuffer>,
}

/// 异步通知 (对应 `camera3_notify_msg_t`)
#[derive(Debug, Clone, PartialEq)]
pub enum NotifyMessage {
    /// 传感器开始曝光
    Shutter { frame_number: u32, timestamp: Nsecs },
}

/// 默认请求模板 (`CAMERA3_TEMPLATE_*`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum RequestTemplate {
    Preview = 1,
    StillCapture = 2,
    VideoRecord = 3,
    VideoSnapshot = 4,
    ZeroShutterLag = 5,
}

impl RequestTemplate {
    pub const ALL: [Self; 5] = [
        Self::Preview,
        Self::StillCapture,
        Self::VideoRecord,
        Self::VideoSnapshot,
        Self::ZeroShutterLag,
    ];

    /// 在缓存数组中的位置
    pub fn index(&self) -> usize {
        *self as usize - 1
    }
}

impl TryFrom<i32> for RequestTemplate {
    type Error = CameraError;

    fn try_from(v: i32) -> Result<Self, CameraError> {
        Self::ALL
            .into_iter()
            .find(|t| *t as i32 == v)
            .ok_or_else(|| CameraError::BadValue(format!("Unknown request settings template: {}", v)))
    }
}
