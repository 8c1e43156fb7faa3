use std::sync::OnceLock;
use std::time::Instant;

/// 纳秒时间 (对应 `nsecs_t`)
pub type Nsecs = i64;

pub const USEC: Nsecs = 1_000;
pub const MSEC: Nsecs = USEC * 1_000;
pub const SEC: Nsecs = MSEC * 1_000;

// 进程内单调时钟的锚点。
// OnceLock 保证它只会被初始化一次，且是线程安全的。
static PROCESS_START: OnceLock<Instant> = OnceLock::new();

/// 把 Instant 转为相对进程锚点的纳秒数
///
/// 传感器时间戳、快门通知和 admission 时刻都用同一个锚点，
/// 因此它们之间可以直接比较大小。
pub fn instant_to_ns(t: Instant) -> Nsecs {
    // 第一次调用时会执行 Instant::now()，后续调用直接返回该值
    let anchor = PROCESS_START.get_or_init(Instant::now);

    // 使用 saturating_duration_since 防止 t 早于 anchor 时 panic
    t.saturating_duration_since(*anchor).as_nanos() as Nsecs
}

/// 当前单调时间 (纳秒)
pub fn monotonic_ns() -> Nsecs {
    instant_to_ns(Instant::now())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_is_monotonic() {
        let a = monotonic_ns();
        std::thread::sleep(std::time::Duration::from_millis(1));
        let b = monotonic_ns();
        assert!(b > a);
        assert!(b - a >= MSEC);
    }
}
