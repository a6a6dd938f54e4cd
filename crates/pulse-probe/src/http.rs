use async_trait::async_trait;
use pulse_types::{CheckResult, ProbeErrorKind, Target};
use reqwest::header::USER_AGENT;
use reqwest::Url;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::Prober;

const PROBE_USER_AGENT: &str = concat!("pulse-probe/", env!("CARGO_PKG_VERSION"));

/// HTTP 探测器
///
/// 发起一次 GET。未配置期望状态码时任何 2xx 都算成功，否则要求状态码完全一致。
pub struct HttpProber {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpProber {
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn parse_url(address: &str) -> Result<Url, ProbeErrorKind> {
        let url = Url::parse(address)
            .map_err(|e| ProbeErrorKind::InvalidTarget(format!("{}: {}", address, e)))?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            scheme => Err(ProbeErrorKind::InvalidTarget(format!(
                "unsupported scheme '{}' in {}",
                scheme, address
            ))),
        }
    }

    fn classify(error: &reqwest::Error) -> ProbeErrorKind {
        if error.is_timeout() {
            ProbeErrorKind::Timeout
        } else {
            ProbeErrorKind::ConnectionFailed
        }
    }
}

#[async_trait]
impl Prober for HttpProber {
    async fn check(&self, target: &Target) -> CheckResult {
        let url = match Self::parse_url(&target.address) {
            Ok(url) => url,
            Err(kind) => return CheckResult::down(&target.name, kind),
        };

        let started = Instant::now();
        let response = self
            .client
            .get(url)
            .header(USER_AGENT, PROBE_USER_AGENT)
            .timeout(self.timeout)
            .send()
            .await;
        let latency_ms = started.elapsed().as_secs_f64() * 1000.0;

        match response {
            Ok(response) => {
                let status = response.status();
                let ok = match target.expected_status {
                    Some(expected) => status.as_u16() == expected,
                    None => status.is_success(),
                };

                debug!(
                    service = %target.name,
                    status = status.as_u16(),
                    latency_ms,
                    "HTTP probe finished"
                );

                if ok {
                    CheckResult::up(&target.name, latency_ms)
                } else {
                    CheckResult::down(&target.name, ProbeErrorKind::UnexpectedStatus(status.as_u16()))
                }
            }
            Err(e) => {
                let kind = Self::classify(&e);
                debug!(service = %target.name, error = %e, "HTTP probe failed");
                CheckResult::down(&target.name, kind)
            }
        }
    }

    fn name(&self) -> &str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_url_rejects_non_http() {
        assert!(HttpProber::parse_url("https://example.com/health").is_ok());
        assert!(matches!(
            HttpProber::parse_url("ftp://example.com"),
            Err(ProbeErrorKind::InvalidTarget(_))
        ));
        assert!(matches!(
            HttpProber::parse_url("not a url"),
            Err(ProbeErrorKind::InvalidTarget(_))
        ));
    }

    #[tokio::test]
    async fn test_malformed_target_reported_distinctly() {
        let prober = HttpProber::new(Duration::from_secs(1));
        let target = Target::website("example.com/no-scheme");

        let result = prober.check(&target).await;
        assert!(!result.success);
        assert!(result.error.unwrap().is_invalid_target());
    }
}
