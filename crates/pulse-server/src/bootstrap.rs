use anyhow::{Context, Result};
use pulse_config::{AppConfig, ConfigLoader, NotifyConfig, RecipientConfig, RuntimeStore, SettingsHandle};
use pulse_monitor::MonitorEngine;
use pulse_notify::{LogNotifier, NotificationSink, NotifyLevel, NotifyManager, Recipient, WebhookNotifier};
use std::sync::Arc;
use tracing::{info, warn};

/// 构建通知出口
///
/// 始终包含日志出口；配置了 webhook 时追加 webhook 出口。
/// webhook 地址无效或 token 环境变量缺失时启动失败。
pub async fn build_notifier(config: &NotifyConfig) -> Result<Arc<dyn NotificationSink>> {
    let manager = NotifyManager::new(NotifyLevel::Info);
    manager.register(Arc::new(LogNotifier)).await;

    if let Some(url) = &config.webhook_url {
        let token = ConfigLoader::webhook_token(config)?;
        let webhook = WebhookNotifier::new(url, token)
            .with_context(|| format!("Invalid webhook notifier {}", url))?;
        info!(url = %webhook.url(), "Webhook notifier enabled");
        manager.register(Arc::new(webhook)).await;
    }

    Ok(Arc::new(manager))
}

pub fn recipients(config: &NotifyConfig) -> Vec<Recipient> {
    config.recipients.iter().map(recipient).collect()
}

fn recipient(config: &RecipientConfig) -> Recipient {
    let mut recipient = Recipient::new(&config.id);
    if let Some(name) = &config.name {
        recipient = recipient.with_name(name);
    }
    if config.bot {
        recipient = recipient.bot();
    }
    if !config.direct_messages {
        recipient = recipient.without_direct_messages();
    }
    recipient
}

/// 根据配置和运行时状态构建监控引擎
///
/// 运行时状态中保存的目标列表覆盖配置文件中的目标；仪表盘输出优先使用
/// 运行时状态，其次使用配置文件。
pub async fn build_engine(config: &AppConfig, store: RuntimeStore) -> Result<MonitorEngine> {
    let runtime = match store.load().await {
        Ok(state) => state,
        Err(e) => {
            warn!(path = %store.path().display(), error = %e, "Runtime state unreadable, starting from config");
            None
        }
    };

    let (targets, runtime_output) = match runtime {
        Some(state) => {
            info!(targets = state.targets.len(), "Restored runtime state");
            (state.targets, state.dashboard_output)
        }
        None => (config.targets.clone(), None),
    };

    let notifier = build_notifier(&config.notify).await?;
    let settings = SettingsHandle::new(config.monitoring.clone());

    let mut builder = MonitorEngine::builder(settings)
        .targets(targets)
        .notifier(notifier)
        .recipients(recipients(&config.notify))
        .store(store);
    if let Some(output) = runtime_output.or_else(|| config.dashboard.output.clone()) {
        builder = builder.dashboard_output(output);
    }

    Ok(builder.build())
}

/// 重新读取配置文件并应用可热更新的部分（监控参数和接收人）
pub async fn apply_reload(engine: &MonitorEngine, loader: &ConfigLoader) -> Result<()> {
    let config = loader.load()?;
    engine.settings().reload(config.monitoring)?;
    engine.set_recipients(recipients(&config.notify)).await;
    info!(recipients = config.notify.recipients.len(), "Configuration reloaded");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recipient_mapping() {
        let config = NotifyConfig {
            webhook_url: None,
            webhook_token_env: None,
            recipients: vec![
                RecipientConfig {
                    id: "u1".into(),
                    name: Some("Alice".into()),
                    bot: false,
                    direct_messages: true,
                },
                RecipientConfig {
                    id: "b1".into(),
                    name: None,
                    bot: true,
                    direct_messages: true,
                },
                RecipientConfig {
                    id: "u2".into(),
                    name: None,
                    bot: false,
                    direct_messages: false,
                },
            ],
        };

        let mapped = recipients(&config);
        assert_eq!(mapped.len(), 3);
        assert_eq!(mapped[0].display_name(), "Alice");
        assert!(mapped[0].accepts_direct());
        assert!(!mapped[1].accepts_direct());
        assert!(!mapped[2].accepts_direct());
    }

    #[tokio::test]
    async fn test_invalid_webhook_url_is_fatal() {
        let config = NotifyConfig {
            webhook_url: Some("ftp://example.com/hook".into()),
            webhook_token_env: None,
            recipients: Vec::new(),
        };
        assert!(build_notifier(&config).await.is_err());
    }

    #[tokio::test]
    async fn test_missing_token_env_is_fatal() {
        let config = NotifyConfig {
            webhook_url: Some("https://example.com/hook".into()),
            webhook_token_env: Some("PULSE_TEST_TOKEN_THAT_IS_NOT_SET".into()),
            recipients: Vec::new(),
        };
        assert!(build_notifier(&config).await.is_err());
    }
}
