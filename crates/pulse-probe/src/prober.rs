use async_trait::async_trait;
use pulse_types::{CheckResult, Target};

/// 探测器接口
///
/// 网络失败通过 `CheckResult` 返回，实现不应 panic，也不返回错误。
#[async_trait]
pub trait Prober: Send + Sync {
    /// 对目标执行一次检查
    async fn check(&self, target: &Target) -> CheckResult;

    /// 探测器名称
    fn name(&self) -> &str;
}
