use crate::error::Result;
use crate::pixel_format::PixelFormat;
use crate::stream::StreamId;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// gralloc 分配出来的图形缓冲区
///
/// `format` 是私有 (实际) 格式：例如 flexible YUV stream 背后是 NV21。
/// 像素存储用 Mutex 保护，传感器写入和 JPEG 压缩器读取发生在不同线程。
struct GraphicBuffer {
    id: u64,
    width: u32,
    height: u32,
    format: PixelFormat,
    data: Mutex<Vec<u8>>,
}

/// 引用计数的 buffer 句柄 (对应 `buffer_handle_t`)
///
/// 克隆句柄不复制像素，两个句柄相等当且仅当指向同一块 buffer。
#[derive(Clone)]
pub struct BufferHandle(Arc<GraphicBuffer>);

impl BufferHandle {
    pub fn new(id: u64, width: u32, height: u32, format: PixelFormat) -> Self {
        let size = format.buffer_size(width, height);
        Self(Arc::new(GraphicBuffer {
            id,
            width,
            height,
            format,
            data: Mutex::new(vec![0; size]),
        }))
    }

    pub fn id(&self) -> u64 {
        self.0.id
    }

    pub fn width(&self) -> u32 {
        self.0.width
    }

    pub fn height(&self) -> u32 {
        self.0.height
    }

    /// 私有格式
    pub fn format(&self) -> PixelFormat {
        self.0.format
    }

    /// 获取像素存储的可变访问
    pub fn pixels(&self) -> MutexGuard<'_, Vec<u8>> {
        self.0.data.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl PartialEq for BufferHandle {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for BufferHandle {}

impl fmt::Debug for BufferHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferHandle")
            .field("id", &self.0.id)
            .field("size", &format_args!("{}x{}", self.0.width, self.0.height))
            .field("format", &self.0.format)
            .finish()
    }
}

/// 同步栅栏 (sync fence)
///
/// acquire fence 表示生产者何时写完，HAL 必须等它 signal 才能写 buffer。
pub trait Fence: fmt::Debug + Send + Sync {
    /// 等待 fence signal；超时返回 `TimedOut`
    fn wait(&self, timeout: Duration) -> Result<()>;
}

/// buffer 状态 (`CAMERA3_BUFFER_STATUS_*`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BufferStatus {
    #[default]
    Ok,
    Error,
}

/// 请求/结果中的一个 buffer (对应 `camera3_stream_buffer_t`)
#[derive(Debug, Clone)]
pub struct StreamBuffer {
    pub stream: StreamId,
    /// 为空时请求会被拒绝
    pub buffer: Option<BufferHandle>,
    pub status: BufferStatus,
    pub acquire_fence: Option<Arc<dyn Fence>>,
    /// 请求中必须为空；HAL 归还 buffer 时也不设置
    pub release_fence: Option<Arc<dyn Fence>>,
}

impl StreamBuffer {
    pub fn new(stream: StreamId, buffer: BufferHandle) -> Self {
        Self {
            stream,
            buffer: Some(buffer),
            status: BufferStatus::Ok,
            acquire_fence: None,
            release_fence: None,
        }
    }

    /// 附带 acquire fence
    pub fn with_acquire_fence(mut self, fence: Arc<dyn Fence>) -> Self {
        self.acquire_fence = Some(fence);
        self
    }
}

/// flexible YUV 锁定后返回的平面布局 (字节偏移)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct YCbCrLayout {
    pub y: usize,
    pub cb: usize,
    pub cr: usize,
    pub y_stride: usize,
    pub c_stride: usize,
    /// 相邻色度采样之间的字节距离 (NV21 为 2)
    pub chroma_step: usize,
}

/// 传感器侧的目标 buffer
///
/// admission 阶段锁定 buffer 后构造，交给传感器写像素，
/// 之后由读出线程或 JPEG 压缩器负责解锁。
#[derive(Debug, Clone)]
pub struct SensorBuffer {
    pub stream: StreamId,
    pub width: u32,
    pub height: u32,
    /// 私有格式 (不是 stream 格式)
    pub format: PixelFormat,
    /// 每行像素数
    pub stride: u32,
    pub handle: BufferHandle,
    /// 仅 flexible YUV 有效
    pub ycbcr: Option<YCbCrLayout>,
}

/// 一帧的全部目标 buffer
pub type SensorBuffers = Vec<SensorBuffer>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_compare_by_identity() {
        let a = BufferHandle::new(1, 4, 4, PixelFormat::RGBA_8888);
        let b = BufferHandle::new(1, 4, 4, PixelFormat::RGBA_8888);
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
        assert_eq!(a.pixels().len(), 64);
    }
}
