//! 模拟 camera3 设备
//!
//! 生命周期：`new` → `init` (Closed) → `connect` (Open) →
//! `initialize` (Ready) → 请求处理中 Active ⇄ Ready → `close` (Closed)。

pub mod fake_3a;
pub mod static_info;
pub mod streams;
pub mod templates;

use crate::internal::notifier::{Notifier, ShutterListener};
use crate::readout::{HalBuffer, InFlightRequest, ReadoutParams, ReadoutThread};
use fake_3a::{Fake3A, State3A};
use fakecam_core::buffer::{BufferHandle, SensorBuffer, SensorBuffers, StreamBuffer};
use fakecam_core::builder::DeviceConfig;
use fakecam_core::error::{CameraError, Result};
use fakecam_core::metadata::{CaptureSettings, Tag};
use fakecam_core::pixel_format::PixelFormat;
use fakecam_core::request::{CaptureRequest, RequestTemplate};
use fakecam_core::stream::{BufferUsage, Camera3Stream, StreamId};
use fakecam_core::traits::{
    BufferMapper, CallbackOps, Camera3Device, JpegCompressor, PipelineFactory, Sensor,
};
use static_info::{CameraInfo, Facing, StaticInfo};
use std::fmt::Write as _;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use streams::StreamRegistry;
use tracing::{debug, error, info, trace, warn};

/// 设备状态，按声明顺序可比较
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub enum DeviceStatus {
    /// 尚未初始化
    Error,
    Closed,
    Open,
    Ready,
    Active,
}

/// 受设备锁保护的状态
struct Inner {
    status: DeviceStatus,
    static_info: Option<StaticInfo>,
    templates: [Option<CaptureSettings>; 5],
    streams: StreamRegistry,
    /// 上一个被接受的请求的设置；为空时请求必须自带设置
    prev_settings: CaptureSettings,
    fake3a: Fake3A,
    sensor: Option<Arc<dyn Sensor>>,
    jpeg: Option<Arc<dyn JpegCompressor>>,
    readout: Option<ReadoutThread>,
}

impl Inner {
    /// 出错后若没有在途请求，从 Active 退回 Ready
    fn settle(&mut self) {
        if self.status == DeviceStatus::Active
            && self.readout.as_ref().map_or(true, ReadoutThread::is_idle)
        {
            self.status = DeviceStatus::Ready;
        }
    }
}

/// 读出线程排空后回调：Active → Ready
fn signal_readout_idle(inner: &Weak<Mutex<Inner>>) {
    let Some(inner) = inner.upgrade() else {
        return;
    };
    let mut inner = inner.lock().unwrap_or_else(PoisonError::into_inner);
    // 拿到锁之后再确认一次，期间可能又有请求进队
    if inner.status == DeviceStatus::Active
        && inner.readout.as_ref().is_some_and(ReadoutThread::is_idle)
    {
        debug!(target: "fakecam::device", "Now idle");
        inner.status = DeviceStatus::Ready;
    }
}

/// 一个模拟的 camera3 设备
pub struct FakeCamera3 {
    camera_id: i32,
    facing: Facing,
    config: DeviceConfig,
    factory: Arc<dyn PipelineFactory>,
    mapper: Arc<dyn BufferMapper>,
    notifier: Notifier,
    inner: Arc<Mutex<Inner>>,
}

impl std::fmt::Debug for FakeCamera3 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FakeCamera3")
            .field("camera_id", &self.camera_id)
            .field("facing", &self.facing)
            .field("status", &self.status())
            .finish()
    }
}

impl FakeCamera3 {
    pub fn new(
        camera_id: i32,
        facing: Facing,
        config: DeviceConfig,
        factory: Arc<dyn PipelineFactory>,
    ) -> Self {
        info!(target: "fakecam::device", "Constructing emulated camera 3: camera ID {}", camera_id);
        let mapper = factory.buffer_mapper();
        let inner = Inner {
            status: DeviceStatus::Error,
            static_info: None,
            templates: Default::default(),
            streams: StreamRegistry::new(),
            prev_settings: CaptureSettings::new(),
            fake3a: Fake3A::new(facing == Facing::Back, config.rng_seed),
            sensor: None,
            jpeg: None,
            readout: None,
        };
        Self {
            camera_id,
            facing,
            config,
            factory,
            mapper,
            notifier: Notifier::default(),
            inner: Arc::new(Mutex::new(inner)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn camera_id(&self) -> i32 {
        self.camera_id
    }

    pub fn facing(&self) -> Facing {
        self.facing
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    pub fn status(&self) -> DeviceStatus {
        self.lock().status
    }

    pub fn state_3a(&self) -> State3A {
        self.lock().fake3a.snapshot()
    }

    /// 构造静态特性，设备进入 Closed
    pub fn init(&self) -> Result<()> {
        let mut inner = self.lock();
        if inner.status != DeviceStatus::Error {
            error!(target: "fakecam::device", "Already initialized!");
            return Err(CameraError::InvalidOperation("already initialized".into()));
        }
        inner.static_info = Some(StaticInfo::new(self.facing));
        inner.status = DeviceStatus::Closed;
        Ok(())
    }

    pub fn camera_info(&self) -> Result<CameraInfo> {
        let inner = self.lock();
        let static_info = inner.static_info.clone().ok_or_else(|| {
            CameraError::NoInit("camera info requested before init".into())
        })?;
        Ok(CameraInfo {
            facing: self.facing,
            orientation: self.config.orientation,
            static_info,
        })
    }

    /// 启动传感器、JPEG 压缩器和读出线程，设备进入 Open
    pub fn connect(&self) -> Result<()> {
        let mut inner = self.lock();
        if inner.status != DeviceStatus::Closed {
            error!(target: "fakecam::device", "Can't connect in state {:?}", inner.status);
            return Err(CameraError::InvalidOperation(format!(
                "can't connect in state {:?}",
                inner.status
            )));
        }

        let sensor = self.factory.create_sensor()?;
        let jpeg = self.factory.create_jpeg_compressor()?;
        sensor.set_sensor_listener(Arc::new(ShutterListener::new(self.notifier.clone())));
        sensor.start_up()?;

        let weak = Arc::downgrade(&self.inner);
        let readout = ReadoutThread::spawn(ReadoutParams {
            sensor: sensor.clone(),
            jpeg: jpeg.clone(),
            mapper: self.mapper.clone(),
            notifier: self.notifier.clone(),
            capacity: self.config.max_queue_size,
            wait_per_loop: self.config.wait_per_loop,
            max_wait_loops: self.config.max_wait_loops,
            on_idle: Box::new(move || signal_readout_idle(&weak)),
        });
        let readout = match readout {
            Ok(r) => r,
            Err(e) => {
                error!(target: "fakecam::device", "Unable to start readout thread: {}", e);
                // 读出线程起不来，把传感器也停掉
                if let Err(stop) = sensor.shut_down() {
                    error!(target: "fakecam::device", "Unable to shut down sensor: {}", stop);
                }
                return Err(e);
            }
        };

        inner.fake3a.reset();
        inner.sensor = Some(sensor);
        inner.jpeg = Some(jpeg);
        inner.readout = Some(readout);
        inner.status = DeviceStatus::Open;
        info!(target: "fakecam::device", "Camera {} connected", self.camera_id);
        Ok(())
    }

    /// 停止传感器并等待读出线程退出，设备回到 Closed
    pub fn close(&self) -> Result<()> {
        let readout = {
            let mut inner = self.lock();
            if inner.status <= DeviceStatus::Closed {
                return Ok(());
            }
            if let Some(sensor) = inner.sensor.take() {
                if let Err(e) = sensor.shut_down() {
                    error!(target: "fakecam::device", "Unable to shut down sensor: {}", e);
                    inner.sensor = Some(sensor);
                    return Err(e);
                }
            }
            let readout = inner.readout.take();
            if let Some(r) = &readout {
                r.request_exit();
            }
            readout
        };

        // 读出线程可能正在等设备锁，join 必须在锁外进行
        if let Some(r) = readout {
            r.join();
        }

        let mut inner = self.lock();
        inner.streams.clear();
        inner.jpeg = None;
        inner.status = DeviceStatus::Closed;
        info!(target: "fakecam::device", "Camera {} closed", self.camera_id);
        Ok(())
    }

    /// 导出设备状态 (JSON)
    #[cfg(feature = "serialize")]
    pub fn export_state(&self) -> Result<String> {
        let inner = self.lock();
        let streams: Vec<_> = inner
            .streams
            .iter()
            .map(|t| {
                serde_json::json!({
                    "id": t.stream.id,
                    "type": t.stream.stream_type,
                    "width": t.stream.width,
                    "height": t.stream.height,
                    "format": t.stream.format.0,
                    "registered": t.record.registered,
                })
            })
            .collect();
        let state = serde_json::json!({
            "camera_id": self.camera_id,
            "facing": self.facing,
            "status": inner.status,
            "streams": streams,
            "3a": inner.fake3a.snapshot(),
        });
        serde_json::to_string_pretty(&state)
            .map_err(|e| CameraError::InvalidOperation(format!("state export failed: {}", e)))
    }

    /// 等 fence 后锁定一个输出 buffer，填好布局
    fn lock_output(
        &self,
        frame_number: u32,
        src: &StreamBuffer,
        stream: &Camera3Stream,
        dest: &mut SensorBuffer,
    ) -> Result<()> {
        if let Some(fence) = &src.acquire_fence {
            fence.wait(self.config.fence_timeout).map_err(|e| {
                error!(target: "fakecam::device", "Request {}: fence timed out or errored: {}", frame_number, e);
                e
            })?;
        }

        let usage = BufferUsage::HW_CAMERA_WRITE;
        if stream.format.is_flexible_yuv() {
            if dest.format != PixelFormat::YCRCB_420_SP {
                error!(
                    target: "fakecam::device",
                    "Request {}: unexpected private format {} for flexible YUV",
                    frame_number, dest.format
                );
                return Err(CameraError::InvalidOperation(format!(
                    "unexpected private format {} for flexible YUV",
                    dest.format
                )));
            }
            let layout = self
                .mapper
                .lock_ycbcr(&dest.handle, usage, dest.width, dest.height)?;
            dest.ycbcr = Some(layout);
        } else {
            self.mapper.lock(&dest.handle, usage, dest.width, dest.height)?;
        }
        Ok(())
    }

    fn unlock_all(&self, buffers: &[SensorBuffer]) {
        for b in buffers {
            if let Err(e) = self.mapper.unlock(&b.handle) {
                warn!(target: "fakecam::device", "Failed to unlock {:?}: {}", b.handle, e);
            }
        }
    }
}

impl Camera3Device for FakeCamera3 {
    fn initialize(&self, callbacks: Arc<dyn CallbackOps>) -> Result<()> {
        let mut inner = self.lock();
        if inner.status != DeviceStatus::Open {
            error!(target: "fakecam::device", "Trying to initialize a camera in state {:?}!", inner.status);
            return Err(CameraError::InvalidOperation(format!(
                "can't initialize in state {:?}",
                inner.status
            )));
        }
        self.notifier.install(callbacks);
        inner.status = DeviceStatus::Ready;
        Ok(())
    }

    fn configure_streams(&self, list: &mut [Camera3Stream]) -> Result<()> {
        let mut inner = self.lock();
        debug!(target: "fakecam::device", "Configuring {} streams", list.len());

        if inner.status != DeviceStatus::Open && inner.status != DeviceStatus::Ready {
            error!(target: "fakecam::device", "Cannot configure streams in state {:?}", inner.status);
            return Err(CameraError::NoInit(format!(
                "can't configure streams in state {:?}",
                inner.status
            )));
        }

        inner.streams.configure(list, self.config.max_buffer_count)?;

        // 新配置之后的第一个请求必须带设置
        inner.prev_settings.clear();
        Ok(())
    }

    fn register_stream_buffers(&self, stream: StreamId, buffers: &[BufferHandle]) -> Result<()> {
        let mut inner = self.lock();
        if inner.status < DeviceStatus::Ready {
            error!(target: "fakecam::device", "Cannot register buffers in state {:?}", inner.status);
            return Err(CameraError::NoInit(format!(
                "can't register buffers in state {:?}",
                inner.status
            )));
        }
        inner.streams.register(stream)?;
        debug!(target: "fakecam::device", "Stream {}: registered {} buffers", stream, buffers.len());
        Ok(())
    }

    fn construct_default_request_settings(&self, template: RequestTemplate) -> Result<CaptureSettings> {
        let mut inner = self.lock();
        let slot = &mut inner.templates[template.index()];
        let settings = slot.get_or_insert_with(|| {
            templates::default_request_settings(template, self.facing == Facing::Back)
        });
        Ok(settings.clone())
    }

    fn process_capture_request(&self, request: CaptureRequest) -> Result<()> {
        let mut inner = self.lock();

        // --- 校验 ---
        if inner.status < DeviceStatus::Ready {
            error!(target: "fakecam::device", "Can't submit capture requests in state {:?}", inner.status);
            return Err(CameraError::InvalidOperation(format!(
                "can't submit requests in state {:?}",
                inner.status
            )));
        }

        let frame_number = request.frame_number;

        if request.settings.is_none() && inner.prev_settings.is_empty() {
            error!(
                target: "fakecam::device",
                "Request {}: NULL settings for first request after configure_streams()",
                frame_number
            );
            return Err(CameraError::BadValue("first request after configure needs settings".into()));
        }

        if let Some(input) = &request.input_buffer {
            if Some(input.stream) != inner.streams.input_stream() {
                error!(
                    target: "fakecam::device",
                    "Request {}: input buffer not from input stream!",
                    frame_number
                );
                return Err(CameraError::BadValue("input buffer not from the input stream".into()));
            }
        }

        if request.output_buffers.is_empty() {
            error!(target: "fakecam::device", "Request {}: no output buffers!", frame_number);
            return Err(CameraError::BadValue("no output buffers".into()));
        }

        if let Some(input) = &request.input_buffer {
            inner.streams.validate_buffer(frame_number, "input buffer", input)?;
        }
        for (i, b) in request.output_buffers.iter().enumerate() {
            inner
                .streams
                .validate_buffer(frame_number, &format!("output buffer {}", i), b)?;
        }

        // --- 开始处理 ---
        inner.status = DeviceStatus::Active;

        let mut settings = match request.settings {
            Some(s) => s,
            None => inner.prev_settings.clone(),
        };

        if let Err(e) = inner.fake3a.process(&mut settings) {
            error!(target: "fakecam::device", "Request {}: unable to run 3A: {}", frame_number, e);
            inner.settle();
            return Err(e);
        }

        let (sensor, jpeg) = match (inner.sensor.clone(), inner.jpeg.clone()) {
            (Some(s), Some(j)) => (s, j),
            _ => {
                inner.settle();
                return Err(CameraError::NoInit("pipeline is not connected".into()));
            }
        };

        let exposure_time = settings.find_i64(Tag::SENSOR_EXPOSURE_TIME);
        let frame_duration = settings.find_i64(Tag::SENSOR_FRAME_DURATION);
        let sensitivity = settings.find_i32(Tag::SENSOR_SENSITIVITY);
        let (Some(exposure_time), Some(frame_duration), Some(sensitivity)) =
            (exposure_time, frame_duration, sensitivity)
        else {
            error!(target: "fakecam::device", "Request {}: missing sensor exposure settings", frame_number);
            inner.settle();
            return Err(CameraError::BadValue("missing sensor exposure settings".into()));
        };

        // --- 锁定输出 buffer ---
        let mut need_jpeg = false;
        let mut sensor_buffers: SensorBuffers = Vec::with_capacity(request.output_buffers.len());
        let mut hal_buffers = Vec::with_capacity(request.output_buffers.len());

        for (i, src) in request.output_buffers.into_iter().enumerate() {
            let stream = inner.streams.get(src.stream).map(|t| t.stream.clone());
            let (Some(stream), Some(handle)) = (stream, src.buffer.clone()) else {
                self.unlock_all(&sensor_buffers);
                inner.settle();
                return Err(CameraError::BadValue(format!("output buffer {} vanished", i)));
            };

            let mut dest = SensorBuffer {
                stream: stream.id,
                width: stream.width,
                height: stream.height,
                format: handle.format(),
                stride: stream.width,
                handle,
                ycbcr: None,
            };
            if dest.format.is_blob() {
                need_jpeg = true;
            }

            if let Err(e) = self.lock_output(frame_number, &src, &stream, &mut dest) {
                error!(target: "fakecam::device", "Request {}: buffer {}: unable to lock buffer: {}", frame_number, i, e);
                self.unlock_all(&sensor_buffers);
                inner.settle();
                return Err(CameraError::NoInit(format!("unable to lock output buffer {}: {}", i, e)));
            }

            trace!(target: "fakecam::device", "Request {}: buffer {} locked ({})", frame_number, i, dest.format);
            sensor_buffers.push(dest);
            hal_buffers.push(HalBuffer {
                buffer: src,
                stream_format: stream.format,
            });
        }

        // 压缩器同一时间只能处理一帧
        if need_jpeg && !jpeg.wait_for_done(self.config.fence_timeout) {
            error!(target: "fakecam::device", "Request {}: timed out waiting for JPEG compression", frame_number);
            self.unlock_all(&sensor_buffers);
            inner.settle();
            return Err(CameraError::NoInit("JPEG compressor busy".into()));
        }

        let queue_ready = match inner.readout.as_ref() {
            Some(r) => r.wait_for_readout(),
            None => Err(CameraError::NoInit("readout thread is not running".into())),
        };
        if let Err(e) = queue_ready {
            error!(target: "fakecam::device", "Request {}: waiting for readout thread: {}", frame_number, e);
            self.unlock_all(&sensor_buffers);
            inner.settle();
            return Err(CameraError::NoInit(format!("readout queue unavailable: {}", e)));
        }

        // --- 等下一个帧边界，再下发传感器参数 ---
        let mut sync_timeouts = 0;
        while !sensor.wait_for_vsync(self.config.sync_wait_timeout) {
            if inner.status == DeviceStatus::Error {
                self.unlock_all(&sensor_buffers);
                return Err(CameraError::NoInit("device entered error state".into()));
            }
            if sync_timeouts == self.config.max_sync_timeout_count {
                error!(target: "fakecam::device", "Request {}: sensor sync timed out", frame_number);
                self.unlock_all(&sensor_buffers);
                inner.settle();
                return Err(CameraError::NoInit("sensor sync timed out".into()));
            }
            sync_timeouts += 1;
        }

        // 先进队再下发传感器参数，进队失败时传感器不会拿到这组 buffer
        let accepted = settings.clone();
        let queued = InFlightRequest {
            frame_number,
            settings,
            sensor_buffers: Some(sensor_buffers.clone()),
            buffers: hal_buffers,
        };
        let result = match inner.readout.as_ref() {
            Some(readout) => readout.queue(queued),
            None => Err((CameraError::NoInit("readout thread is not running".into()), queued)),
        };
        if let Err((e, rejected)) = result {
            error!(target: "fakecam::device", "Request {}: unable to queue for readout: {}", frame_number, e);
            if let Some(buffers) = &rejected.sensor_buffers {
                self.unlock_all(buffers);
            }
            inner.settle();
            return Err(CameraError::NoInit(e.to_string()));
        }

        sensor.set_exposure_time(exposure_time);
        sensor.set_frame_duration(frame_duration);
        sensor.set_sensitivity(sensitivity.max(0) as u32);
        sensor.set_destination_buffers(sensor_buffers);
        sensor.set_frame_number(frame_number);

        // 只有真正进队的请求才作为下一次沿用的设置
        inner.prev_settings = accepted;

        trace!(target: "fakecam::device", "Request {}: queued for readout", frame_number);
        Ok(())
    }

    fn dump(&self) -> String {
        let inner = self.lock();
        let mut out = String::new();
        let _ = writeln!(out, "Camera {} ({:?}): {:?}", self.camera_id, self.facing, inner.status);
        let _ = writeln!(out, "  Streams: {}", inner.streams.len());
        for t in inner.streams.iter() {
            let _ = writeln!(
                out,
                "    {} {:?} {}x{} {} registered={}",
                t.stream.id,
                t.stream.stream_type,
                t.stream.width,
                t.stream.height,
                t.stream.format,
                t.record.registered
            );
        }
        let s = inner.fake3a.snapshot();
        let _ = writeln!(
            out,
            "  3A: AE {:?} AF {:?} AWB {:?} exposure {} ns ISO {}",
            s.ae_state, s.af_state, s.awb_state, s.exposure_time, s.sensitivity
        );
        if let Some(r) = &inner.readout {
            let _ = writeln!(
                out,
                "  Readout: {} queued, {} in flight, JPEG pending: {}",
                r.queued(),
                r.in_flight(),
                r.jpeg_pending()
            );
        }
        out
    }
}

impl Drop for FakeCamera3 {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(target: "fakecam::device", "Camera {} failed to close cleanly: {}", self.camera_id, e);
        }
    }
}
