//! 模拟图像传感器
//!
//! 后台线程按帧周期运行：每个帧边界 (VSync) 取走下一帧的目标 buffer，
//! 通知曝光开始，渲染测试图案，帧结束后把时间戳交给读出侧。

use fakecam_core::buffer::{SensorBuffer, SensorBuffers, YCbCrLayout};
use fakecam_core::error::{CameraError, Result};
use fakecam_core::pixel_format::PixelFormat;
use fakecam_core::time::{monotonic_ns, Nsecs, MSEC};
use fakecam_core::traits::{Sensor, SensorEvent, SensorListener};
use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorConfig {
    /// 固定帧周期；None 时使用请求里的帧间隔
    pub frame_period: Option<Duration>,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            frame_period: Some(Duration::from_millis(5)),
        }
    }
}

struct State {
    running: bool,
    /// 为 true 时仍然产生 VSync，但不再交付帧 (模拟读出卡住)
    readout_stalled: bool,

    exposure_time: Nsecs,
    frame_duration: Nsecs,
    sensitivity: u32,
    next_buffers: Option<SensorBuffers>,
    next_frame_number: u32,

    vsync_count: u64,
    captured: VecDeque<Nsecs>,
}

struct Shared {
    state: Mutex<State>,
    /// VSync 和新帧共用一个条件变量
    cond: Condvar,
    listener: Mutex<Option<Arc<dyn SensorListener>>>,
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

pub struct SimulatedSensor {
    config: SensorConfig,
    shared: Arc<Shared>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for SimulatedSensor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.state();
        f.debug_struct("SimulatedSensor")
            .field("running", &state.running)
            .field("vsync_count", &state.vsync_count)
            .field("pending_frames", &state.captured.len())
            .finish()
    }
}

impl SimulatedSensor {
    pub fn new(config: SensorConfig) -> Self {
        Self {
            config,
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    running: false,
                    readout_stalled: false,
                    exposure_time: 10 * MSEC,
                    frame_duration: 33_333_333,
                    sensitivity: 100,
                    next_buffers: None,
                    next_frame_number: 0,
                    vsync_count: 0,
                    captured: VecDeque::new(),
                }),
                cond: Condvar::new(),
                listener: Mutex::new(None),
            }),
            thread: Mutex::new(None),
        }
    }

    /// 卡住或恢复读出
    pub fn set_readout_stalled(&self, stalled: bool) {
        self.shared.state().readout_stalled = stalled;
        self.shared.cond.notify_all();
    }

    pub fn vsync_count(&self) -> u64 {
        self.shared.state().vsync_count
    }

    pub fn is_running(&self) -> bool {
        self.shared.state().running
    }
}

impl Sensor for SimulatedSensor {
    fn start_up(&self) -> Result<()> {
        let mut thread = self.thread.lock().unwrap_or_else(PoisonError::into_inner);
        if thread.is_some() {
            return Err(CameraError::InvalidOperation("sensor already started".into()));
        }
        self.shared.state().running = true;

        let shared = self.shared.clone();
        let config = self.config;
        let handle = std::thread::Builder::new()
            .name("fakecam-sensor".into())
            .spawn(move || sensor_loop(shared, config))?;
        *thread = Some(handle);
        debug!(target: "fakecam::sim", "Sensor started");
        Ok(())
    }

    fn shut_down(&self) -> Result<()> {
        self.shared.state().running = false;
        self.shared.cond.notify_all();
        let handle = self
            .thread
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle
                .join()
                .map_err(|_| CameraError::Simulation("sensor thread panicked".into()))?;
        }
        debug!(target: "fakecam::sim", "Sensor shut down");
        Ok(())
    }

    fn set_sensor_listener(&self, listener: Arc<dyn SensorListener>) {
        *self
            .shared
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(listener);
    }

    fn set_exposure_time(&self, ns: Nsecs) {
        self.shared.state().exposure_time = ns;
    }

    fn set_frame_duration(&self, ns: Nsecs) {
        self.shared.state().frame_duration = ns;
    }

    fn set_sensitivity(&self, iso: u32) {
        self.shared.state().sensitivity = iso;
    }

    fn set_destination_buffers(&self, buffers: SensorBuffers) {
        self.shared.state().next_buffers = Some(buffers);
    }

    fn set_frame_number(&self, frame_number: u32) {
        self.shared.state().next_frame_number = frame_number;
    }

    fn wait_for_vsync(&self, timeout: Duration) -> bool {
        let state = self.shared.state();
        let seen = state.vsync_count;
        let (state, _) = self
            .shared
            .cond
            .wait_timeout_while(state, timeout, |s| s.running && s.vsync_count == seen)
            .unwrap_or_else(PoisonError::into_inner);
        state.vsync_count != seen
    }

    fn wait_for_new_frame(&self, timeout: Duration) -> Option<Nsecs> {
        let state = self.shared.state();
        let (mut state, _) = self
            .shared
            .cond
            .wait_timeout_while(state, timeout, |s| s.running && s.captured.is_empty())
            .unwrap_or_else(PoisonError::into_inner);
        state.captured.pop_front()
    }
}

impl Drop for SimulatedSensor {
    fn drop(&mut self) {
        if let Err(e) = self.shut_down() {
            warn!(target: "fakecam::sim", "Sensor shutdown failed: {}", e);
        }
    }
}

struct Frame {
    buffers: Option<SensorBuffers>,
    frame_number: u32,
    exposure_time: Nsecs,
    sensitivity: u32,
    period: Duration,
}

fn sensor_loop(shared: Arc<Shared>, config: SensorConfig) {
    loop {
        // 帧边界：取走下一帧的参数
        let frame = {
            let mut state = shared.state();
            if !state.running {
                break;
            }
            state.vsync_count += 1;
            let frame = Frame {
                buffers: state.next_buffers.take(),
                frame_number: state.next_frame_number,
                exposure_time: state.exposure_time,
                sensitivity: state.sensitivity,
                period: config
                    .frame_period
                    .unwrap_or_else(|| Duration::from_nanos(state.frame_duration.max(0) as u64)),
            };
            shared.cond.notify_all();
            frame
        };

        let start = Instant::now();
        let timestamp = monotonic_ns();

        if let Some(buffers) = &frame.buffers {
            let listener = shared
                .listener
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone();
            if let Some(listener) = listener {
                listener.on_sensor_event(frame.frame_number, SensorEvent::ExposureStart, timestamp);
            }
            for b in buffers {
                render(b, frame.frame_number, frame.exposure_time, frame.sensitivity);
            }
            trace!(target: "fakecam::sim", "Frame {}: captured {} buffers", frame.frame_number, buffers.len());
        }

        // 等到本帧结束 (可被 shut_down 打断)
        let state = shared.state();
        let remaining = frame.period.saturating_sub(start.elapsed());
        let (mut state, _) = shared
            .cond
            .wait_timeout_while(state, remaining, |s| s.running)
            .unwrap_or_else(PoisonError::into_inner);

        if frame.buffers.is_some() && !state.readout_stalled {
            state.captured.push_back(timestamp);
            shared.cond.notify_all();
        }
    }
}

/// 亮度随曝光量变化的测试图案
fn render(b: &SensorBuffer, frame_number: u32, exposure_time: Nsecs, sensitivity: u32) {
    let gain = (exposure_time as f64 / (10 * MSEC) as f64) * (sensitivity as f64 / 100.0);
    let level = |v: u32| -> u8 { ((v as f64) * gain).clamp(0.0, 255.0) as u8 };
    let (w, h) = (b.width as usize, b.height as usize);
    let stride = (b.stride as usize).max(w);
    let shift = frame_number as usize;
    let mut pixels = b.handle.pixels();

    match b.format {
        PixelFormat::RGBA_8888 | PixelFormat::RGBX_8888 => {
            for y in 0..h {
                for x in 0..w {
                    let i = (y * stride + x) * 4;
                    if let Some(px) = pixels.get_mut(i..i + 4) {
                        px[0] = level(((x + shift) * 255 / w.max(1)) as u32);
                        px[1] = level((y * 255 / h.max(1)) as u32);
                        px[2] = level(128);
                        px[3] = 255;
                    }
                }
            }
        }
        // BLOB buffer 先装 RGB888，之后由 JPEG 压缩器原地编码
        PixelFormat::RGB_888 | PixelFormat::BLOB => {
            for y in 0..h {
                for x in 0..w {
                    let i = (y * w + x) * 3;
                    if let Some(px) = pixels.get_mut(i..i + 3) {
                        px[0] = level(((x + shift) * 255 / w.max(1)) as u32);
                        px[1] = level((y * 255 / h.max(1)) as u32);
                        px[2] = level(128);
                    }
                }
            }
        }
        PixelFormat::YCRCB_420_SP => {
            let layout = b.ycbcr.unwrap_or(YCbCrLayout {
                y: 0,
                cr: w * h,
                cb: w * h + 1,
                y_stride: w,
                c_stride: w,
                chroma_step: 2,
            });
            for y in 0..h {
                for x in 0..w {
                    if let Some(p) = pixels.get_mut(layout.y + y * layout.y_stride + x) {
                        *p = level((((x + shift) + y) * 255 / (w + h).max(1)) as u32);
                    }
                }
            }
            for y in 0..h / 2 {
                for x in 0..w / 2 {
                    let row = y * layout.c_stride + x * layout.chroma_step;
                    if let Some(p) = pixels.get_mut(layout.cr + row) {
                        *p = 128;
                    }
                    if let Some(p) = pixels.get_mut(layout.cb + row) {
                        *p = 128;
                    }
                }
            }
        }
        PixelFormat::RAW_SENSOR => {
            // 16 位 Bayer，10 位有效
            for y in 0..h {
                for x in 0..w {
                    let i = (y * stride + x) * 2;
                    let v = (level(((x + y + shift) % 256) as u32) as u16) << 2;
                    if let Some(px) = pixels.get_mut(i..i + 2) {
                        px.copy_from_slice(&v.to_le_bytes());
                    }
                }
            }
        }
        other => {
            warn!(target: "fakecam::sim", "Frame {}: don't know how to render format {}", frame_number, other);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fakecam_core::buffer::BufferHandle;
    use fakecam_core::stream::StreamId;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct CountingListener(AtomicU32);

    impl SensorListener for CountingListener {
        fn on_sensor_event(&self, _frame_number: u32, _event: SensorEvent, _timestamp: Nsecs) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn rgba_target(w: u32, h: u32) -> SensorBuffer {
        let handle = BufferHandle::new(1, w, h, PixelFormat::RGBA_8888);
        SensorBuffer {
            stream: StreamId(0),
            width: w,
            height: h,
            format: PixelFormat::RGBA_8888,
            stride: w,
            handle,
            ycbcr: None,
        }
    }

    #[test]
    fn vsync_ticks_while_running() -> anyhow::Result<()> {
        let sensor = SimulatedSensor::new(SensorConfig::default());
        assert!(!sensor.wait_for_vsync(Duration::from_millis(10)));
        sensor.start_up()?;
        assert!(sensor.wait_for_vsync(Duration::from_secs(1)));
        sensor.shut_down()?;
        assert!(!sensor.is_running());
        Ok(())
    }

    #[test]
    fn frame_is_rendered_and_delivered() -> anyhow::Result<()> {
        let sensor = SimulatedSensor::new(SensorConfig::default());
        let listener = Arc::new(CountingListener(AtomicU32::new(0)));
        sensor.set_sensor_listener(listener.clone());
        sensor.start_up()?;

        let target = rgba_target(8, 4);
        assert!(sensor.wait_for_vsync(Duration::from_secs(1)));
        let before = monotonic_ns();
        sensor.set_destination_buffers(vec![target.clone()]);
        sensor.set_frame_number(3);

        let ts = sensor
            .wait_for_new_frame(Duration::from_secs(1))
            .ok_or_else(|| anyhow::anyhow!("no frame delivered"))?;
        assert!(ts >= before);
        assert_eq!(listener.0.load(Ordering::SeqCst), 1);
        assert_eq!(target.handle.pixels()[3], 255);
        sensor.shut_down()?;
        Ok(())
    }

    #[test]
    fn stalled_readout_withholds_frames() -> anyhow::Result<()> {
        let sensor = SimulatedSensor::new(SensorConfig::default());
        sensor.start_up()?;
        sensor.set_readout_stalled(true);
        sensor.set_destination_buffers(vec![rgba_target(4, 4)]);
        assert!(sensor.wait_for_new_frame(Duration::from_millis(30)).is_none());
        assert!(sensor.vsync_count() > 1);
        sensor.shut_down()?;
        Ok(())
    }
}
