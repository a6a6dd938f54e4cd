use async_trait::async_trait;
use pulse_types::{CheckResult, Target, TargetKind};
use std::time::Duration;

use crate::{HttpProber, PingProber, Prober};

/// Ping 参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PingOptions {
    pub attempts: u32,
    pub delay: Duration,
    pub timeout: Duration,
}

impl Default for PingOptions {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay: Duration::from_millis(500),
            timeout: Duration::from_secs(2),
        }
    }
}

/// 按目标类型分发到 HTTP 或 ping 探测器
pub struct TargetProber {
    http: Box<dyn Prober>,
    ping: Box<dyn Prober>,
}

impl TargetProber {
    pub fn new(http_timeout: Duration, ping: PingOptions) -> Self {
        Self {
            http: Box::new(HttpProber::new(http_timeout)),
            ping: Box::new(PingProber::new(ping.attempts, ping.delay, ping.timeout)),
        }
    }

    /// 使用自定义探测器（测试或嵌入场景）
    pub fn from_parts(http: Box<dyn Prober>, ping: Box<dyn Prober>) -> Self {
        Self { http, ping }
    }
}

#[async_trait]
impl Prober for TargetProber {
    async fn check(&self, target: &Target) -> CheckResult {
        match target.kind {
            TargetKind::Website => self.http.check(target).await,
            TargetKind::Server => self.ping.check(target).await,
        }
    }

    fn name(&self) -> &str {
        "target"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedProber(&'static str, f64);

    #[async_trait]
    impl Prober for FixedProber {
        async fn check(&self, target: &Target) -> CheckResult {
            CheckResult::up(&target.name, self.1)
        }

        fn name(&self) -> &str {
            self.0
        }
    }

    #[tokio::test]
    async fn test_dispatch_by_kind() {
        let prober = TargetProber::from_parts(
            Box::new(FixedProber("http", 10.0)),
            Box::new(FixedProber("ping", 20.0)),
        );

        let web = prober.check(&Target::website("https://example.com")).await;
        assert_eq!(web.latency_ms, Some(10.0));

        let server = prober.check(&Target::server("db", "10.0.0.5")).await;
        assert_eq!(server.latency_ms, Some(20.0));
    }
}
