use crossbeam_channel::{unbounded, Receiver, Sender};
use fakecam_core::request::{CaptureResult, NotifyMessage};
use fakecam_core::traits::CallbackOps;
use std::time::Duration;

/// 把设备回调转存到通道里，测试线程按需取
#[derive(Debug)]
pub struct RecordingCallbacks {
    result_tx: Sender<CaptureResult>,
    result_rx: Receiver<CaptureResult>,
    notify_tx: Sender<NotifyMessage>,
    notify_rx: Receiver<NotifyMessage>,
}

impl Default for RecordingCallbacks {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingCallbacks {
    pub fn new() -> Self {
        let (result_tx, result_rx) = unbounded();
        let (notify_tx, notify_rx) = unbounded();
        Self {
            result_tx,
            result_rx,
            notify_tx,
            notify_rx,
        }
    }

    pub fn recv_result(&self, timeout: Duration) -> Option<CaptureResult> {
        self.result_rx.recv_timeout(timeout).ok()
    }

    pub fn recv_notify(&self, timeout: Duration) -> Option<NotifyMessage> {
        self.notify_rx.recv_timeout(timeout).ok()
    }

    /// 取走当前已收到的全部结果
    pub fn drain_results(&self) -> Vec<CaptureResult> {
        self.result_rx.try_iter().collect()
    }

    pub fn drain_notifies(&self) -> Vec<NotifyMessage> {
        self.notify_rx.try_iter().collect()
    }
}

impl CallbackOps for RecordingCallbacks {
    fn process_capture_result(&self, result: CaptureResult) {
        let _ = self.result_tx.send(result);
    }

    fn notify(&self, msg: NotifyMessage) {
        let _ = self.notify_tx.send(msg);
    }
}
