//! 模拟 JPEG 压缩器
//!
//! 每次 `start` 起一个工作线程：把 BLOB buffer 里的 RGB888 像素编码成 JPEG，
//! 原地写回，然后通过 listener 归还。

use fakecam_core::buffer::{SensorBuffer, SensorBuffers};
use fakecam_core::error::{CameraError, Result};
use fakecam_core::pixel_format::PixelFormat;
use fakecam_core::traits::{JpegCompressor, JpegListener};
use image::codecs::jpeg::JpegEncoder;
use image::ColorType;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, error};

pub const DEFAULT_JPEG_QUALITY: u8 = 80;

#[derive(Debug, Default)]
struct State {
    busy: bool,
    completed: u64,
}

#[derive(Debug, Default)]
struct Shared {
    state: Mutex<State>,
    done: Condvar,
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Debug)]
pub struct SimulatedJpegCompressor {
    quality: u8,
    shared: Arc<Shared>,
}

impl Default for SimulatedJpegCompressor {
    fn default() -> Self {
        Self::new(DEFAULT_JPEG_QUALITY)
    }
}

impl SimulatedJpegCompressor {
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
            shared: Arc::new(Shared::default()),
        }
    }

    pub fn is_busy(&self) -> bool {
        self.shared.state().busy
    }

    /// 已完成的压缩次数
    pub fn completed(&self) -> u64 {
        self.shared.state().completed
    }
}

fn compress(target: &SensorBuffer, quality: u8) -> Result<usize> {
    let (w, h) = (target.width, target.height);
    let rgb_len = (w as usize) * (h as usize) * 3;

    let mut pixels = target.handle.pixels();
    let rgb = pixels.get(..rgb_len).ok_or_else(|| {
        CameraError::Simulation(format!("BLOB buffer too small for {}x{} RGB", w, h))
    })?;

    let mut encoded = Vec::new();
    JpegEncoder::new_with_quality(&mut encoded, quality)
        .encode(rgb, w, h, ColorType::Rgb8)
        .map_err(|e| CameraError::Simulation(format!("JPEG encode failed: {}", e)))?;

    let size = encoded.len();
    *pixels = encoded;
    Ok(size)
}

impl JpegCompressor for SimulatedJpegCompressor {
    fn start(&self, buffers: SensorBuffers, listener: Arc<dyn JpegListener>) -> Result<()> {
        {
            let mut state = self.shared.state();
            if state.busy {
                error!(target: "fakecam::sim", "Already processing a buffer!");
                return Err(CameraError::Busy("JPEG compressor is busy".into()));
            }
            state.busy = true;
        }

        let shared = self.shared.clone();
        let quality = self.quality;
        let spawned = std::thread::Builder::new()
            .name("fakecam-jpeg".into())
            .spawn(move || {
                match buffers.iter().find(|b| b.format == PixelFormat::BLOB) {
                    Some(target) => {
                        let ok = match compress(target, quality) {
                            Ok(size) => {
                                debug!(target: "fakecam::sim", "Compressed {}x{} into {} bytes", target.width, target.height, size);
                                true
                            }
                            Err(e) => {
                                error!(target: "fakecam::sim", "{}", e);
                                false
                            }
                        };
                        listener.on_jpeg_done(target, ok);
                    }
                    None => error!(target: "fakecam::sim", "No BLOB buffer among {} buffers", buffers.len()),
                }

                let mut state = shared.state();
                state.busy = false;
                state.completed += 1;
                shared.done.notify_all();
            });

        if let Err(e) = spawned {
            self.shared.state().busy = false;
            return Err(e.into());
        }
        Ok(())
    }

    fn wait_for_done(&self, timeout: Duration) -> bool {
        let state = self.shared.state();
        let (state, _) = self
            .shared
            .done
            .wait_timeout_while(state, timeout, |s| s.busy)
            .unwrap_or_else(PoisonError::into_inner);
        !state.busy
    }
}
