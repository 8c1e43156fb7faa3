//! Stream 注册表
//!
//! 记录每个已配置 stream 的 alive / registered 标记。
//! 一次 configure 先整体校验，通过后才修改表，失败时原表保持不变。

use fakecam_core::buffer::{BufferStatus, StreamBuffer};
use fakecam_core::error::{CameraError, Result};
use fakecam_core::stream::{Camera3Stream, StreamId};
use std::collections::HashSet;
use tracing::{debug, error};

/// HAL 附在每个已配置 stream 上的私有记录
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StreamRecord {
    /// 出现在最近一次 configure 的列表里
    pub alive: bool,
    /// 已经注册过 buffer
    pub registered: bool,
}

#[derive(Debug, Clone)]
pub struct TrackedStream {
    pub stream: Camera3Stream,
    pub record: StreamRecord,
}

#[derive(Debug, Default)]
pub struct StreamRegistry {
    streams: Vec<TrackedStream>,
    input_stream: Option<StreamId>,
}

impl StreamRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    pub fn input_stream(&self) -> Option<StreamId> {
        self.input_stream
    }

    pub fn get(&self, id: StreamId) -> Option<&TrackedStream> {
        self.streams.iter().find(|t| t.stream.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TrackedStream> {
        self.streams.iter()
    }

    /// close 时清空
    pub fn clear(&mut self) {
        self.streams.clear();
        self.input_stream = None;
    }

    /// 应用一次新的 stream 配置，并回填 `usage` / `max_buffers`
    pub fn configure(&mut self, list: &mut [Camera3Stream], max_buffers: u32) -> Result<()> {
        if list.is_empty() {
            error!(target: "fakecam::device", "Bad number of streams requested: 0");
            return Err(CameraError::BadValue("empty stream configuration".into()));
        }

        // 1. 校验：格式、输入 stream 数量、重复 id
        let mut input = None;
        let mut seen = HashSet::with_capacity(list.len());
        for (i, s) in list.iter().enumerate() {
            debug!(
                target: "fakecam::device",
                "Stream {}: {} type {:?}, {}x{}, format {}",
                i, s.id, s.stream_type, s.width, s.height, s.format
            );
            if !seen.insert(s.id) {
                error!(target: "fakecam::device", "Stream {} listed twice", s.id);
                return Err(CameraError::BadValue(format!("duplicate stream {}", s.id)));
            }
            if s.stream_type.is_input_capable() {
                if input.is_some() {
                    error!(target: "fakecam::device", "Multiple input streams requested!");
                    return Err(CameraError::BadValue("multiple input streams".into()));
                }
                input = Some(s.id);
            }
            if !s.format.is_supported_stream_format() {
                error!(target: "fakecam::device", "Unsupported stream format {}", s.format);
                return Err(CameraError::BadValue(format!("unsupported stream format {}", s.format)));
            }
        }
        self.input_stream = input;

        // 2. 先全部标为 dead，列表里出现的再标回 alive
        for t in &mut self.streams {
            t.record.alive = false;
        }

        for s in list.iter_mut() {
            match self.streams.iter_mut().find(|t| t.stream.id == s.id) {
                Some(t) => {
                    // 已存在：保持之前回填的 usage / max_buffers
                    s.usage = t.stream.usage;
                    s.max_buffers = t.stream.max_buffers;
                    t.stream = s.clone();
                    t.record.alive = true;
                }
                None => {
                    s.usage = s.stream_type.usage();
                    s.max_buffers = max_buffers;
                    self.streams.push(TrackedStream {
                        stream: s.clone(),
                        record: StreamRecord {
                            alive: true,
                            registered: false,
                        },
                    });
                }
            }
        }

        // 3. 回收不再出现的 stream
        self.streams.retain(|t| {
            if !t.record.alive {
                debug!(target: "fakecam::device", "Reaping stream {}", t.stream.id);
            }
            t.record.alive
        });
        Ok(())
    }

    /// 每个 stream 只能注册一次 buffer
    pub fn register(&mut self, id: StreamId) -> Result<()> {
        let t = self.streams.iter_mut().find(|t| t.stream.id == id).ok_or_else(|| {
            error!(target: "fakecam::device", "Trying to register buffers for a non-configured stream {}", id);
            CameraError::BadValue(format!("stream {} is not configured", id))
        })?;

        if t.record.registered {
            error!(target: "fakecam::device", "Illegal to register buffer more than once for stream {}", id);
            return Err(CameraError::BadValue(format!("stream {} already registered", id)));
        }
        t.record.registered = true;
        Ok(())
    }

    /// admission 对请求里每个 buffer 的检查
    pub fn validate_buffer(&self, frame_number: u32, label: &str, b: &StreamBuffer) -> Result<()> {
        let fail = |why: &str| {
            error!(target: "fakecam::device", "Request {}: {}: {}", frame_number, label, why);
            Err(CameraError::BadValue(format!("{}: {}", label, why)))
        };

        let Some(t) = self.get(b.stream) else {
            return fail("Unconfigured stream!");
        };
        if !t.record.alive || !t.record.registered {
            return fail("Unregistered or dead stream!");
        }
        if b.status != BufferStatus::Ok {
            return fail("Status not OK!");
        }
        if b.release_fence.is_some() {
            return fail("Has a release fence!");
        }
        if b.buffer.is_none() {
            return fail("NULL buffer handle!");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fakecam_core::buffer::BufferHandle;
    use fakecam_core::pixel_format::PixelFormat;
    use fakecam_core::stream::{BufferUsage, StreamType};

    fn preview() -> Camera3Stream {
        Camera3Stream::output(1, 640, 480, PixelFormat::RGBA_8888)
    }

    fn jpeg() -> Camera3Stream {
        Camera3Stream::output(2, 640, 480, PixelFormat::BLOB)
    }

    #[test]
    fn configure_fills_usage_and_max_buffers() {
        let mut reg = StreamRegistry::new();
        let mut list = vec![
            preview(),
            Camera3Stream::new(3, StreamType::Bidirectional, 640, 480, PixelFormat::RAW_SENSOR),
        ];
        reg.configure(&mut list, 4).unwrap();

        assert_eq!(list[0].usage, BufferUsage::HW_CAMERA_WRITE);
        assert_eq!(list[1].usage, BufferUsage::HW_CAMERA_READ | BufferUsage::HW_CAMERA_WRITE);
        assert!(list.iter().all(|s| s.max_buffers == 4));
        assert_eq!(reg.input_stream(), Some(StreamId(3)));
        assert!(reg.iter().all(|t| t.record.alive && !t.record.registered));
    }

    #[test]
    fn reconfigure_keeps_survivors_and_reaps_the_rest() {
        let mut reg = StreamRegistry::new();
        reg.configure(&mut [preview(), jpeg()], 4).unwrap();
        reg.register(StreamId(1)).unwrap();

        reg.configure(&mut [preview()], 4).unwrap();
        assert_eq!(reg.len(), 1);
        let kept = reg.get(StreamId(1)).unwrap();
        assert!(kept.record.alive && kept.record.registered);
        assert!(reg.get(StreamId(2)).is_none());
    }

    #[test]
    fn rejected_configuration_leaves_registry_untouched() {
        let mut reg = StreamRegistry::new();
        reg.configure(&mut [preview()], 4).unwrap();

        let mut bad = [
            Camera3Stream::input(5, 640, 480, PixelFormat::RGBA_8888),
            Camera3Stream::input(6, 640, 480, PixelFormat::RGBA_8888),
        ];
        assert!(reg.configure(&mut bad, 4).unwrap_err().is_bad_value());

        let mut bad = [Camera3Stream::output(7, 640, 480, PixelFormat::YV12)];
        assert!(reg.configure(&mut bad, 4).unwrap_err().is_bad_value());

        assert!(reg.configure(&mut [], 4).unwrap_err().is_bad_value());
        assert!(reg.configure(&mut [preview(), preview()], 4).unwrap_err().is_bad_value());

        assert_eq!(reg.len(), 1);
        assert!(reg.get(StreamId(1)).is_some());
    }

    #[test]
    fn register_once_per_stream() {
        let mut reg = StreamRegistry::new();
        reg.configure(&mut [preview()], 4).unwrap();
        assert!(reg.register(StreamId(9)).unwrap_err().is_bad_value());
        reg.register(StreamId(1)).unwrap();
        assert!(reg.register(StreamId(1)).unwrap_err().is_bad_value());
    }

    #[test]
    fn buffer_validation() {
        let mut reg = StreamRegistry::new();
        reg.configure(&mut [preview()], 4).unwrap();
        let handle = BufferHandle::new(1, 640, 480, PixelFormat::RGBA_8888);
        let good = StreamBuffer::new(StreamId(1), handle.clone());

        // 未注册
        assert!(reg.validate_buffer(0, "out 0", &good).is_err());
        reg.register(StreamId(1)).unwrap();
        reg.validate_buffer(0, "out 0", &good).unwrap();

        let mut b = good.clone();
        b.status = BufferStatus::Error;
        assert!(reg.validate_buffer(0, "out 0", &b).is_err());

        let mut b = good.clone();
        b.buffer = None;
        assert!(reg.validate_buffer(0, "out 0", &b).is_err());

        let unknown = StreamBuffer::new(StreamId(8), handle);
        assert!(reg.validate_buffer(0, "out 0", &unknown).unwrap_err().is_bad_value());
    }
}
