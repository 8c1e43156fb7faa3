//! 读出线程
//!
//! admission 把配置好的请求排进一个有界队列；本线程按顺序取出，
//! 等传感器交付像素，再把 buffer 归还给框架。BLOB buffer 交给
//! JPEG 压缩器，由它完成后单独上报。

use crate::internal::notifier::Notifier;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use fakecam_core::buffer::{BufferStatus, SensorBuffer, SensorBuffers, StreamBuffer};
use fakecam_core::error::{CameraError, Result};
use fakecam_core::metadata::{CaptureSettings, Tag};
use fakecam_core::pixel_format::PixelFormat;
use fakecam_core::request::CaptureResult;
use fakecam_core::traits::{BufferMapper, JpegCompressor, JpegListener, Sensor};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, error, trace, warn};

/// 在途请求里的一个 HAL buffer 及其 stream 格式
#[derive(Debug)]
pub(crate) struct HalBuffer {
    pub(crate) buffer: StreamBuffer,
    pub(crate) stream_format: PixelFormat,
}

/// 已经交给传感器、等待读出的请求
#[derive(Debug)]
pub(crate) struct InFlightRequest {
    pub(crate) frame_number: u32,
    /// 3A 处理后的设置，读出时补上时间戳作为结果元数据
    pub(crate) settings: CaptureSettings,
    /// 遇到 BLOB buffer 时整体移交给 JPEG 压缩器
    pub(crate) sensor_buffers: Option<SensorBuffers>,
    pub(crate) buffers: Vec<HalBuffer>,
}

/// 正在压缩的 JPEG
#[derive(Debug, Default)]
struct JpegSlot {
    waiting: bool,
    hal_buffer: Option<StreamBuffer>,
    frame_number: u32,
}

/// 工作线程与 JPEG 回调共享的部分
struct Shared {
    /// 已进队但还没上报结果的请求数；进队前加一，出结果前减一
    in_flight: AtomicUsize,
    jpeg: Mutex<JpegSlot>,
    mapper: Arc<dyn BufferMapper>,
    notifier: Notifier,
}

impl Shared {
    fn lock_jpeg(&self) -> MutexGuard<'_, JpegSlot> {
        self.jpeg.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn unlock(&self, buffer: &StreamBuffer) {
        if let Some(handle) = &buffer.buffer {
            if let Err(e) = self.mapper.unlock(handle) {
                warn!(target: "fakecam::readout", "Failed to unlock {:?}: {}", handle, e);
            }
        }
    }
}

impl JpegListener for Shared {
    fn on_jpeg_done(&self, jpeg_buffer: &SensorBuffer, success: bool) {
        let mut slot = self.lock_jpeg();

        if let Err(e) = self.mapper.unlock(&jpeg_buffer.handle) {
            warn!(target: "fakecam::readout", "Failed to unlock JPEG buffer: {}", e);
        }
        slot.waiting = false;

        let Some(mut buffer) = slot.hal_buffer.take() else {
            error!(target: "fakecam::readout", "JPEG done without a pending buffer");
            return;
        };
        buffer.status = if success {
            BufferStatus::Ok
        } else {
            BufferStatus::Error
        };
        buffer.acquire_fence = None;
        buffer.release_fence = None;

        let frame_number = slot.frame_number;
        drop(slot);

        debug!(target: "fakecam::readout", "Frame {}: JPEG done (success: {})", frame_number, success);
        self.notifier.send_capture_result(CaptureResult {
            frame_number,
            result: None,
            output_buffers: vec![buffer],
        });
    }

    fn on_jpeg_input_done(&self, _input_buffer: &SensorBuffer) {
        // 没有 reprocess 输入，不会走到这里
        error!(target: "fakecam::readout", "Unexpected input buffer from JPEG compressor!");
    }
}

/// 启动读出线程需要的协作者
pub(crate) struct ReadoutParams {
    pub(crate) sensor: Arc<dyn Sensor>,
    pub(crate) jpeg: Arc<dyn JpegCompressor>,
    pub(crate) mapper: Arc<dyn BufferMapper>,
    pub(crate) notifier: Notifier,
    pub(crate) capacity: usize,
    pub(crate) wait_per_loop: Duration,
    pub(crate) max_wait_loops: u32,
    /// 队列排空后调用 (设备据此从 Active 回到 Ready)
    pub(crate) on_idle: Box<dyn Fn() + Send>,
}

/// 读出线程的句柄 (设备侧)
pub(crate) struct ReadoutThread {
    queue_tx: Sender<InFlightRequest>,
    slot_rx: Receiver<()>,
    shared: Arc<Shared>,
    exit: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
    capacity: usize,
    wait_per_loop: Duration,
    max_wait_loops: u32,
}

impl std::fmt::Debug for ReadoutThread {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadoutThread")
            .field("queued", &self.queue_tx.len())
            .field("capacity", &self.capacity)
            .field("in_flight", &self.shared.in_flight.load(Ordering::Acquire))
            .finish()
    }
}

impl ReadoutThread {
    pub(crate) fn spawn(params: ReadoutParams) -> Result<Self> {
        let capacity = params.capacity.max(1);
        let (queue_tx, queue_rx) = bounded::<InFlightRequest>(capacity);
        // 容量 1：只需要知道 "出队过"，多余的信号直接丢弃
        let (slot_tx, slot_rx) = bounded::<()>(1);

        let shared = Arc::new(Shared {
            in_flight: AtomicUsize::new(0),
            jpeg: Mutex::new(JpegSlot::default()),
            mapper: params.mapper,
            notifier: params.notifier,
        });
        let exit = Arc::new(AtomicBool::new(false));

        let worker = Worker {
            queue_rx,
            slot_tx,
            shared: shared.clone(),
            exit: exit.clone(),
            sensor: params.sensor,
            jpeg: params.jpeg,
            on_idle: params.on_idle,
            wait_per_loop: params.wait_per_loop,
            current: None,
        };

        let handle = std::thread::Builder::new()
            .name("fakecam-readout".into())
            .spawn(move || worker.run())?;

        Ok(Self {
            queue_tx,
            slot_rx,
            shared,
            exit,
            handle: Some(handle),
            capacity,
            wait_per_loop: params.wait_per_loop,
            max_wait_loops: params.max_wait_loops,
        })
    }

    /// 等队列有空位；超过 `max_wait_loops` 个周期返回 `TimedOut`
    pub(crate) fn wait_for_readout(&self) -> Result<()> {
        let mut loops = 0;
        while self.queue_tx.len() >= self.capacity {
            match self.slot_rx.recv_timeout(self.wait_per_loop) {
                Ok(()) | Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(CameraError::InvalidOperation("readout thread has exited".into()));
                }
            }
            if loops == self.max_wait_loops {
                error!(target: "fakecam::readout", "Timed out waiting for readout queue to drain");
                return Err(CameraError::TimedOut("readout queue is full".into()));
            }
            loops += 1;
        }
        Ok(())
    }

    /// 失败时请求原样交回，由调用方解锁其中的 buffer
    pub(crate) fn queue(
        &self,
        request: InFlightRequest,
    ) -> std::result::Result<(), (CameraError, InFlightRequest)> {
        // 先计数再进队，工作线程取走请求的瞬间也不会被判成空闲
        self.shared.in_flight.fetch_add(1, Ordering::AcqRel);
        let err = match self.queue_tx.try_send(request) {
            Ok(()) => return Ok(()),
            Err(TrySendError::Full(r)) => (
                CameraError::Busy(format!("readout queue full at frame {}", r.frame_number)),
                r,
            ),
            Err(TrySendError::Disconnected(r)) => (
                CameraError::InvalidOperation(format!(
                    "readout thread gone at frame {}",
                    r.frame_number
                )),
                r,
            ),
        };
        self.shared.in_flight.fetch_sub(1, Ordering::AcqRel);
        Err(err)
    }

    /// 没有已进队但未出结果的请求
    pub(crate) fn is_idle(&self) -> bool {
        self.in_flight() == 0
    }

    pub(crate) fn in_flight(&self) -> usize {
        self.shared.in_flight.load(Ordering::Acquire)
    }

    pub(crate) fn queued(&self) -> usize {
        self.queue_tx.len()
    }

    pub(crate) fn jpeg_pending(&self) -> bool {
        self.shared.lock_jpeg().waiting
    }

    pub(crate) fn request_exit(&self) {
        self.exit.store(true, Ordering::Release);
    }

    /// 必须在不持有设备锁的情况下调用
    pub(crate) fn join(mut self) {
        self.request_exit();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!(target: "fakecam::readout", "Readout thread panicked");
            }
        }
    }
}

struct Worker {
    queue_rx: Receiver<InFlightRequest>,
    slot_tx: Sender<()>,
    shared: Arc<Shared>,
    exit: Arc<AtomicBool>,
    sensor: Arc<dyn Sensor>,
    jpeg: Arc<dyn JpegCompressor>,
    on_idle: Box<dyn Fn() + Send>,
    wait_per_loop: Duration,
    current: Option<InFlightRequest>,
}

impl Worker {
    fn run(mut self) {
        debug!(target: "fakecam::readout", "Readout thread started");
        while !self.exit.load(Ordering::Acquire) {
            if !self.thread_loop() {
                break;
            }
        }

        // 退出时把尚未读出的 buffer 解锁
        let leftover = self.current.take().into_iter().chain(self.queue_rx.try_iter());
        for request in leftover {
            warn!(target: "fakecam::readout", "Dropping frame {} on shutdown", request.frame_number);
            for hal in &request.buffers {
                self.shared.unlock(&hal.buffer);
            }
            self.shared.in_flight.fetch_sub(1, Ordering::AcqRel);
        }
        debug!(target: "fakecam::readout", "Readout thread exiting");
    }

    /// 返回 false 表示通道已断开，线程应退出
    fn thread_loop(&mut self) -> bool {
        if self.current.is_none() {
            match self.queue_rx.recv_timeout(self.wait_per_loop) {
                Ok(request) => {
                    // 通知 admission 队列空出了一个位置
                    let _ = self.slot_tx.try_send(());
                    trace!(target: "fakecam::readout", "Frame {}: dequeued", request.frame_number);
                    self.current = Some(request);
                }
                Err(RecvTimeoutError::Timeout) => return true,
                Err(RecvTimeoutError::Disconnected) => return false,
            }
        }

        let Some(capture_time) = self.sensor.wait_for_new_frame(self.wait_per_loop) else {
            return true;
        };
        let Some(request) = self.current.take() else {
            return true;
        };
        self.deliver(request, capture_time);
        true
    }

    fn deliver(&mut self, mut request: InFlightRequest, capture_time: i64) {
        let frame_number = request.frame_number;
        trace!(target: "fakecam::readout", "Frame {}: readout at {}", frame_number, capture_time);

        let mut output_buffers = Vec::with_capacity(request.buffers.len());
        for hal in request.buffers.drain(..) {
            let mut buffer = hal.buffer;
            let mut good = true;

            if hal.stream_format.is_blob() {
                let mut slot = self.shared.lock_jpeg();
                if slot.waiting {
                    error!(target: "fakecam::readout", "Frame {}: already processing a JPEG!", frame_number);
                    good = false;
                } else if let Some(sensor_buffers) = request.sensor_buffers.take() {
                    let listener: Arc<dyn JpegListener> = self.shared.clone();
                    match self.jpeg.start(sensor_buffers, listener) {
                        Ok(()) => {
                            // 压缩器完成后通过回调单独归还
                            slot.hal_buffer = Some(buffer);
                            slot.frame_number = frame_number;
                            slot.waiting = true;
                            continue;
                        }
                        Err(e) => {
                            error!(target: "fakecam::readout", "Frame {}: error compressing output buffer: {}", frame_number, e);
                            good = false;
                        }
                    }
                } else {
                    error!(target: "fakecam::readout", "Frame {}: second BLOB buffer in one request", frame_number);
                    good = false;
                }
            }

            self.shared.unlock(&buffer);
            buffer.status = if good {
                BufferStatus::Ok
            } else {
                BufferStatus::Error
            };
            buffer.acquire_fence = None;
            buffer.release_fence = None;
            output_buffers.push(buffer);
        }

        request.settings.update(Tag::SENSOR_TIMESTAMP, capture_time);

        // 先回到空闲，再上报结果
        if self.shared.in_flight.fetch_sub(1, Ordering::AcqRel) == 1 {
            (self.on_idle)();
        }

        self.shared.notifier.send_capture_result(CaptureResult {
            frame_number,
            result: Some(request.settings),
            output_buffers,
        });
    }
}
