use async_trait::async_trait;
use pulse_types::{CheckResult, ProbeErrorKind, Target};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

use crate::Prober;

/// 单次 ping 的执行方式
#[async_trait]
pub trait PingTransport: Send + Sync {
    /// 发送一个 echo 请求，成功时返回延迟（毫秒）
    async fn ping_once(&self, host: &str, timeout: Duration) -> Option<f64>;
}

/// 调用系统 `ping` 命令
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemPing;

impl SystemPing {
    fn command(host: &str, timeout: Duration) -> Command {
        let mut command = Command::new("ping");
        if cfg!(windows) {
            let millis = timeout.as_millis().max(1).to_string();
            command.args(["-n", "1", "-w", millis.as_str(), host]);
        } else {
            let secs = timeout.as_secs().max(1).to_string();
            command.args(["-c", "1", "-W", secs.as_str(), host]);
        }
        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        command
    }
}

#[async_trait]
impl PingTransport for SystemPing {
    async fn ping_once(&self, host: &str, timeout: Duration) -> Option<f64> {
        let mut command = Self::command(host, timeout);
        let output = command.output();
        // ping 自身的超时不总是可靠，外层再加一道
        let output = match tokio::time::timeout(timeout + Duration::from_millis(500), output).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                debug!(host = %host, error = %e, "Failed to spawn ping");
                return None;
            }
            Err(_) => {
                debug!(host = %host, "Ping command timed out");
                return None;
            }
        };

        if !output.status.success() {
            return None;
        }
        parse_ping_output(&String::from_utf8_lossy(&output.stdout))
    }
}

/// 从 ping 输出中解析 `time=12.3 ms` / `time<1ms`
pub fn parse_ping_output(output: &str) -> Option<f64> {
    let idx = output.rfind("time=").or_else(|| output.rfind("time<"))?;
    let rest = &output[idx + 5..];
    let end = rest.find("ms")?;
    rest[..end].trim().parse::<f64>().ok()
}

/// 检查主机名是否可以安全地作为命令行参数
fn validate_host(host: &str) -> Result<(), ProbeErrorKind> {
    if host.is_empty() {
        return Err(ProbeErrorKind::InvalidTarget("empty host".to_string()));
    }
    if host.starts_with('-') || host.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(ProbeErrorKind::InvalidTarget(format!("invalid host '{}'", host)));
    }
    Ok(())
}

/// Ping 探测器
///
/// 最多尝试 `attempts` 次，任意一次成功即视为在线，延迟取第一次成功的结果，
/// 之后的尝试不再发送。
pub struct PingProber {
    transport: Box<dyn PingTransport>,
    attempts: u32,
    delay: Duration,
    timeout: Duration,
}

impl PingProber {
    pub fn new(attempts: u32, delay: Duration, timeout: Duration) -> Self {
        Self::with_transport(Box::new(SystemPing), attempts, delay, timeout)
    }

    pub fn with_transport(
        transport: Box<dyn PingTransport>,
        attempts: u32,
        delay: Duration,
        timeout: Duration,
    ) -> Self {
        Self {
            transport,
            attempts: attempts.max(1),
            delay,
            timeout,
        }
    }
}

#[async_trait]
impl Prober for PingProber {
    async fn check(&self, target: &Target) -> CheckResult {
        if let Err(kind) = validate_host(&target.address) {
            return CheckResult::down(&target.name, kind);
        }

        for attempt in 1..=self.attempts {
            if let Some(latency_ms) = self.transport.ping_once(&target.address, self.timeout).await {
                debug!(service = %target.name, attempt, latency_ms, "Ping succeeded");
                return CheckResult::up(&target.name, latency_ms);
            }

            debug!(service = %target.name, attempt, "Ping attempt failed");
            if attempt < self.attempts {
                tokio::time::sleep(self.delay).await;
            }
        }

        CheckResult::down(&target.name, ProbeErrorKind::Unreachable)
    }

    fn name(&self) -> &str {
        "ping"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_linux_output() {
        let output = "PING 1.1.1.1 (1.1.1.1) 56(84) bytes of data.\n\
                      64 bytes from 1.1.1.1: icmp_seq=1 ttl=57 time=12.4 ms\n";
        assert_eq!(parse_ping_output(output), Some(12.4));
    }

    #[test]
    fn test_parse_windows_output() {
        let output = "Reply from 192.0.2.1: bytes=32 time=8ms TTL=118";
        assert_eq!(parse_ping_output(output), Some(8.0));

        let output = "Reply from 127.0.0.1: bytes=32 time<1ms TTL=128";
        assert_eq!(parse_ping_output(output), Some(1.0));
    }

    #[test]
    fn test_parse_garbage() {
        assert_eq!(parse_ping_output("Request timed out."), None);
        assert_eq!(parse_ping_output("time=abc ms"), None);
    }

    #[test]
    fn test_validate_host() {
        assert!(validate_host("192.0.2.50").is_ok());
        assert!(validate_host("db.internal").is_ok());
        assert!(validate_host("").is_err());
        assert!(validate_host("-f").is_err());
        assert!(validate_host("a b").is_err());
    }
}
