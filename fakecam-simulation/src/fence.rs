use fakecam_core::buffer::Fence;
use fakecam_core::error::{CameraError, Result};
use std::sync::{Condvar, Mutex, PoisonError};
use std::time::Duration;

/// 可手动 signal 的 acquire fence
#[derive(Debug, Default)]
pub struct SimFence {
    signaled: Mutex<bool>,
    cond: Condvar,
}

impl SimFence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signaled() -> Self {
        Self {
            signaled: Mutex::new(true),
            cond: Condvar::new(),
        }
    }

    pub fn signal(&self) {
        *self.signaled.lock().unwrap_or_else(PoisonError::into_inner) = true;
        self.cond.notify_all();
    }
}

impl Fence for SimFence {
    fn wait(&self, timeout: Duration) -> Result<()> {
        let guard = self.signaled.lock().unwrap_or_else(PoisonError::into_inner);
        let (guard, _) = self
            .cond
            .wait_timeout_while(guard, timeout, |signaled| !*signaled)
            .unwrap_or_else(PoisonError::into_inner);
        if *guard {
            Ok(())
        } else {
            Err(CameraError::TimedOut("fence was not signaled".into()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn unsignaled_fence_times_out() {
        let fence = SimFence::new();
        let err = fence.wait(Duration::from_millis(5)).unwrap_err();
        assert!(matches!(err, CameraError::TimedOut(_)));
    }

    #[test]
    fn signal_from_another_thread_wakes_waiter() -> anyhow::Result<()> {
        let fence = Arc::new(SimFence::new());
        let f = fence.clone();
        let t = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(5));
            f.signal();
        });
        fence.wait(Duration::from_secs(2))?;
        t.join().map_err(|_| anyhow::anyhow!("signaler thread panicked"))?;
        SimFence::signaled().wait(Duration::ZERO)?;
        Ok(())
    }
}
