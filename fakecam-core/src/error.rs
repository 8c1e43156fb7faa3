use thiserror::Error;

/// Android `status_t` 数值，插件外壳需要把错误翻译回 HAL 返回码
pub mod status {
    pub const OK: i32 = 0;
    pub const BAD_VALUE: i32 = -22;
    pub const INVALID_OPERATION: i32 = -38;
    pub const NO_INIT: i32 = -19;
    pub const TIMED_OUT: i32 = -110;
    pub const BUSY: i32 = -16;
    pub const UNKNOWN_ERROR: i32 = i32::MIN;
}

#[derive(Error, Debug)]
pub enum CameraError {
    /// 参数/前置条件校验失败，调用方可见，不修改任何状态
    #[error("Bad value: {0}")]
    BadValue(String),

    /// 设备状态不允许该调用
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// 设备或队列未就绪 (也用于 admission 阶段的各类超时)
    #[error("Not initialized: {0}")]
    NoInit(String),

    #[error("Timed out: {0}")]
    TimedOut(String),

    /// JPEG 压缩器同一时间只允许一个任务
    #[error("Device busy: {0}")]
    Busy(String),

    #[error("Simulation backend error: {0}")]
    Simulation(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CameraError {
    /// 对应的 `status_t` 返回码
    pub fn status_code(&self) -> i32 {
        match self {
            Self::BadValue(_) => status::BAD_VALUE,
            Self::InvalidOperation(_) => status::INVALID_OPERATION,
            Self::NoInit(_) => status::NO_INIT,
            Self::TimedOut(_) => status::TIMED_OUT,
            Self::Busy(_) => status::BUSY,
            Self::Simulation(_) | Self::Io(_) => status::UNKNOWN_ERROR,
        }
    }

    pub fn is_bad_value(&self) -> bool {
        matches!(self, Self::BadValue(_))
    }

    pub fn is_no_init(&self) -> bool {
        matches!(self, Self::NoInit(_))
    }
}

pub type Result<T> = std::result::Result<T, CameraError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_match_android() {
        assert_eq!(CameraError::BadValue("x".into()).status_code(), -22);
        assert_eq!(CameraError::NoInit("x".into()).status_code(), -19);
        assert_eq!(CameraError::InvalidOperation("x".into()).status_code(), -38);
        assert_eq!(CameraError::TimedOut("x".into()).status_code(), -110);
    }
}
