use fakecam_core::request::{CaptureResult, NotifyMessage};
use fakecam_core::time::Nsecs;
use fakecam_core::traits::{CallbackOps, SensorEvent, SensorListener};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{trace, warn};

/// 框架回调的共享槽位
///
/// initialize 之前为空；读出线程、JPEG 压缩器和传感器线程都通过它上报。
#[derive(Clone, Default)]
pub(crate) struct Notifier {
    callbacks: Arc<RwLock<Option<Arc<dyn CallbackOps>>>>,
}

impl std::fmt::Debug for Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier")
            .field("installed", &self.is_installed())
            .finish()
    }
}

impl Notifier {
    pub(crate) fn install(&self, callbacks: Arc<dyn CallbackOps>) {
        *self.callbacks.write().unwrap_or_else(PoisonError::into_inner) = Some(callbacks);
    }

    pub(crate) fn is_installed(&self) -> bool {
        self.current().is_some()
    }

    fn current(&self) -> Option<Arc<dyn CallbackOps>> {
        self.callbacks.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub(crate) fn send_capture_result(&self, result: CaptureResult) {
        match self.current() {
            Some(cb) => cb.process_capture_result(result),
            None => warn!(
                target: "fakecam::device",
                "Dropping result for frame {}: no callbacks installed",
                result.frame_number
            ),
        }
    }

    pub(crate) fn send_notify(&self, msg: NotifyMessage) {
        if let Some(cb) = self.current() {
            cb.notify(msg);
        }
    }
}

/// 把传感器的曝光开始事件转换成快门通知
#[derive(Debug)]
pub(crate) struct ShutterListener {
    notifier: Notifier,
}

impl ShutterListener {
    pub(crate) fn new(notifier: Notifier) -> Self {
        Self { notifier }
    }
}

impl SensorListener for ShutterListener {
    fn on_sensor_event(&self, frame_number: u32, event: SensorEvent, timestamp: Nsecs) {
        match event {
            SensorEvent::ExposureStart => {
                trace!(target: "fakecam::device", "Frame {}: shutter at {}", frame_number, timestamp);
                self.notifier.send_notify(NotifyMessage::Shutter {
                    frame_number,
                    timestamp,
                });
            }
        }
    }
}
