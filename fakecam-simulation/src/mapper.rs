//! 软件 gralloc：分配 buffer，记录锁定状态

use fakecam_core::buffer::{BufferHandle, YCbCrLayout};
use fakecam_core::error::{CameraError, Result};
use fakecam_core::pixel_format::PixelFormat;
use fakecam_core::stream::{BufferUsage, Camera3Stream};
use fakecam_core::traits::BufferMapper;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, trace};

/// stream 格式到私有格式的映射
pub fn private_format(stream_format: PixelFormat) -> PixelFormat {
    match stream_format {
        PixelFormat::IMPLEMENTATION_DEFINED => PixelFormat::RGBA_8888,
        PixelFormat::YCBCR_420_888 => PixelFormat::YCRCB_420_SP,
        other => other,
    }
}

#[derive(Debug, Default)]
struct MapperState {
    locked: HashSet<u64>,
    /// 这些 buffer 的 lock 会失败
    fail_lock: HashSet<u64>,
}

#[derive(Debug)]
pub struct SimulatedBufferMapper {
    state: Mutex<MapperState>,
    next_id: AtomicU64,
}

impl Default for SimulatedBufferMapper {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedBufferMapper {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MapperState::default()),
            next_id: AtomicU64::new(1),
        }
    }

    fn state(&self) -> MutexGuard<'_, MapperState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 为一个已配置的 stream 分配 `count` 个 buffer
    pub fn allocate(&self, stream: &Camera3Stream, count: usize) -> Vec<BufferHandle> {
        let format = private_format(stream.format);
        (0..count)
            .map(|_| {
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                BufferHandle::new(id, stream.width, stream.height, format)
            })
            .collect()
    }

    pub fn locked_count(&self) -> usize {
        self.state().locked.len()
    }

    pub fn is_locked(&self, handle: &BufferHandle) -> bool {
        self.state().locked.contains(&handle.id())
    }

    /// 让之后对该 buffer 的 lock 失败
    pub fn fail_lock_for(&self, handle: &BufferHandle) {
        self.state().fail_lock.insert(handle.id());
    }

    fn lock_raw(&self, handle: &BufferHandle, width: u32, height: u32) -> Result<()> {
        if width > handle.width() || height > handle.height() {
            return Err(CameraError::BadValue(format!(
                "lock region {}x{} exceeds {:?}",
                width, height, handle
            )));
        }
        let mut state = self.state();
        if state.fail_lock.contains(&handle.id()) {
            debug!(target: "fakecam::sim", "Injected lock failure for {:?}", handle);
            return Err(CameraError::Simulation(format!("lock failed for buffer {}", handle.id())));
        }
        if !state.locked.insert(handle.id()) {
            return Err(CameraError::InvalidOperation(format!(
                "buffer {} is already locked",
                handle.id()
            )));
        }
        trace!(target: "fakecam::sim", "Locked buffer {}", handle.id());
        Ok(())
    }
}

impl BufferMapper for SimulatedBufferMapper {
    fn lock(&self, handle: &BufferHandle, _usage: BufferUsage, width: u32, height: u32) -> Result<()> {
        self.lock_raw(handle, width, height)
    }

    fn lock_ycbcr(
        &self,
        handle: &BufferHandle,
        _usage: BufferUsage,
        width: u32,
        height: u32,
    ) -> Result<YCbCrLayout> {
        if handle.format() != PixelFormat::YCRCB_420_SP {
            return Err(CameraError::BadValue(format!(
                "lock_ycbcr on non-YUV buffer {:?}",
                handle
            )));
        }
        self.lock_raw(handle, width, height)?;

        // NV21：Y 平面后面是交错的 VU
        let w = handle.width() as usize;
        let luma = w * handle.height() as usize;
        Ok(YCbCrLayout {
            y: 0,
            cr: luma,
            cb: luma + 1,
            y_stride: w,
            c_stride: w,
            chroma_step: 2,
        })
    }

    fn unlock(&self, handle: &BufferHandle) -> Result<()> {
        if self.state().locked.remove(&handle.id()) {
            trace!(target: "fakecam::sim", "Unlocked buffer {}", handle.id());
            Ok(())
        } else {
            Err(CameraError::BadValue(format!("buffer {} is not locked", handle.id())))
        }
    }
}
