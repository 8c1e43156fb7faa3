use std::time::Duration;

/// 设备级配置
///
/// 默认值与模拟器 HAL 头文件中的常量一致。所有超时都是有界的：
/// 单次等待时长 × 最大轮询次数。
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serialize", serde(default))]
pub struct DeviceConfig {
    /// 在途队列容量
    pub max_queue_size: usize,
    /// 读出线程与队列容量等待的单次超时
    pub wait_per_loop: Duration,
    /// 队列容量等待的最大轮询次数
    pub max_wait_loops: u32,
    /// acquire fence 以及 JPEG 压缩器空闲等待的超时
    pub fence_timeout: Duration,
    /// 单次 VSync 等待超时
    pub sync_wait_timeout: Duration,
    /// VSync 最大重试次数
    pub max_sync_timeout_count: u32,
    /// 每个 stream 回填的 max_buffers
    pub max_buffer_count: u32,
    /// 传感器安装角度 (度)
    pub orientation: i32,
    /// 3A 随机数种子；None 表示取系统熵
    pub rng_seed: Option<u64>,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceConfig {
    pub fn new() -> Self {
        Self {
            max_queue_size: 2,
            wait_per_loop: Duration::from_millis(10),
            max_wait_loops: 1000,
            fence_timeout: Duration::from_millis(2000),
            sync_wait_timeout: Duration::from_millis(10),
            max_sync_timeout_count: 1000,
            max_buffer_count: 4,
            orientation: 0,
            rng_seed: None,
        }
    }

    /// 设置在途队列容量 (至少为 1)
    pub fn max_queue_size(mut self, size: usize) -> Self {
        self.max_queue_size = size.max(1);
        self
    }

    /// 设置队列等待参数：单次超时与最大轮询次数
    pub fn readout_wait(mut self, per_loop: Duration, max_loops: u32) -> Self {
        self.wait_per_loop = per_loop;
        self.max_wait_loops = max_loops;
        self
    }

    pub fn fence_timeout(mut self, timeout: Duration) -> Self {
        self.fence_timeout = timeout;
        self
    }

    /// 设置 VSync 等待参数
    pub fn sync_wait(mut self, timeout: Duration, max_count: u32) -> Self {
        self.sync_wait_timeout = timeout;
        self.max_sync_timeout_count = max_count;
        self
    }

    pub fn max_buffer_count(mut self, count: u32) -> Self {
        self.max_buffer_count = count;
        self
    }

    pub fn orientation(mut self, degrees: i32) -> Self {
        self.orientation = degrees;
        self
    }

    /// 固定 3A 随机数种子 (测试用，保证可复现)
    pub fn rng_seed(mut self, seed: u64) -> Self {
        self.rng_seed = Some(seed);
        self
    }

    /// 队列容量等待的总上限
    pub fn readout_timeout(&self) -> Duration {
        self.wait_per_loop * self.max_wait_loops
    }

    #[cfg(feature = "serialize")]
    pub fn from_json(text: &str) -> crate::error::Result<Self> {
        serde_json::from_str(text)
            .map_err(|e| crate::error::CameraError::BadValue(format!("Invalid device config: {}", e)))
    }

    #[cfg(feature = "serialize")]
    pub fn to_json(&self) -> crate::error::Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| crate::error::CameraError::BadValue(format!("Unserializable device config: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_hal_constants() {
        let c = DeviceConfig::default();
        assert_eq!(c.max_queue_size, 2);
        assert_eq!(c.readout_timeout(), Duration::from_secs(10));
        assert_eq!(c.fence_timeout, Duration::from_secs(2));
    }

    #[test]
    fn queue_size_never_zero() {
        assert_eq!(DeviceConfig::new().max_queue_size(0).max_queue_size, 1);
    }

    #[cfg(feature = "serialize")]
    #[test]
    fn json_round_trip_keeps_overrides() -> anyhow::Result<()> {
        let c = DeviceConfig::new().rng_seed(7).orientation(90);
        let back = DeviceConfig::from_json(&c.to_json()?)?;
        assert_eq!(back, c);
        Ok(())
    }

    #[cfg(feature = "serialize")]
    #[test]
    fn partial_json_uses_defaults() -> anyhow::Result<()> {
        let c = DeviceConfig::from_json(r#"{ "max_queue_size": 4 }"#)?;
        assert_eq!(c.max_queue_size, 4);
        assert_eq!(c.max_wait_loops, 1000);
        Ok(())
    }
}
