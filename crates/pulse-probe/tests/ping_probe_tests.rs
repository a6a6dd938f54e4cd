use async_trait::async_trait;
use pulse_probe::{PingProber, PingTransport, Prober};
use pulse_types::{ProbeErrorKind, Target};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// 按脚本返回结果的 ping 实现
#[derive(Clone, Default)]
struct ScriptedPing {
    replies: Arc<Mutex<VecDeque<Option<f64>>>>,
    calls: Arc<Mutex<u32>>,
}

impl ScriptedPing {
    fn new(replies: Vec<Option<f64>>) -> Self {
        Self {
            replies: Arc::new(Mutex::new(replies.into())),
            calls: Arc::new(Mutex::new(0)),
        }
    }

    fn calls(&self) -> u32 {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl PingTransport for ScriptedPing {
    async fn ping_once(&self, _host: &str, _timeout: Duration) -> Option<f64> {
        *self.calls.lock().unwrap() += 1;
        self.replies.lock().unwrap().pop_front().flatten()
    }
}

fn prober(script: &ScriptedPing, attempts: u32) -> PingProber {
    PingProber::with_transport(
        Box::new(script.clone()),
        attempts,
        Duration::from_millis(500),
        Duration::from_secs(2),
    )
}

#[tokio::test(start_paused = true)]
async fn test_first_success_latency_is_used() {
    let script = ScriptedPing::new(vec![None, Some(42.0), Some(7.0)]);
    let prober = prober(&script, 3);

    let result = prober.check(&Target::server("db", "10.0.0.5")).await;
    assert!(result.success);
    assert_eq!(result.latency_ms, Some(42.0));
    // 成功后不再继续尝试
    assert_eq!(script.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_all_attempts_fail_is_unreachable() {
    let script = ScriptedPing::new(vec![None, None, None]);
    let prober = prober(&script, 3);

    let started = tokio::time::Instant::now();
    let result = prober.check(&Target::server("db", "10.0.0.5")).await;

    assert!(!result.success);
    assert_eq!(result.error, Some(ProbeErrorKind::Unreachable));
    assert_eq!(script.calls(), 3);
    // 两次间隔，最后一次失败后不再等待
    assert_eq!(started.elapsed(), Duration::from_millis(1000));
}

#[tokio::test]
async fn test_invalid_host_does_not_ping() {
    let script = ScriptedPing::new(vec![Some(1.0)]);
    let prober = prober(&script, 3);

    let result = prober.check(&Target::server("bad", "-c 100")).await;
    assert!(!result.success);
    assert!(result.error.unwrap().is_invalid_target());
    assert_eq!(script.calls(), 0);
}
