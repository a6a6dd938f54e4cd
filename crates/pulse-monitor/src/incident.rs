use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::info;

use crate::error::IncidentError;

/// 事件关闭原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    Recovered,
    TargetRemoved,
}

/// 故障事件
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Incident {
    pub id: String,
    pub target: String,
    /// 第一次失败检查的时间
    pub opened_at: DateTime<Utc>,
    /// 判定为 DOWN 的时间
    pub detected_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub downtime_ms: Option<i64>,
    pub close_reason: Option<CloseReason>,
    pub cleared: bool,
    /// 被同一目标的新事件取代
    pub superseded: bool,
}

/// `IncidentManager::open` 的结果
#[derive(Debug, Clone, PartialEq)]
pub struct OpenedIncident {
    pub incident: Incident,
    /// 被新事件取代并移出列表的已恢复事件
    pub superseded: Vec<Incident>,
}

impl Incident {
    fn new(target: &str, opened_at: DateTime<Utc>, detected_at: DateTime<Utc>) -> Self {
        Self {
            id: format!("inc_{}", uuid::Uuid::new_v4().simple()),
            target: target.to_string(),
            opened_at,
            detected_at,
            closed_at: None,
            downtime_ms: None,
            close_reason: None,
            cleared: false,
            superseded: false,
        }
    }

    pub fn is_open(&self) -> bool {
        self.closed_at.is_none()
    }

    /// 已清除或已被取代，不再出现在列表中
    pub fn is_retired(&self) -> bool {
        self.cleared || self.superseded
    }

    /// 已关闭事件的停机时长
    pub fn downtime(&self) -> Option<Duration> {
        self.downtime_ms.map(Duration::milliseconds)
    }

    /// 截至 `now` 的持续时间，已关闭时返回停机时长
    pub fn elapsed(&self, now: DateTime<Utc>) -> Duration {
        self.downtime()
            .unwrap_or_else(|| (now - self.opened_at).max(Duration::zero()))
    }
}

/// 格式化为 `H:MM:SS`，超过一天时带天数
pub fn format_duration(duration: Duration) -> String {
    let total = duration.num_seconds().max(0);
    let days = total / 86_400;
    let hours = (total % 86_400) / 3_600;
    let minutes = (total % 3_600) / 60;
    let seconds = total % 60;

    if days > 0 {
        format!("{}d {}:{:02}:{:02}", days, hours, minutes, seconds)
    } else {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    }
}

/// 事件管理器
///
/// 每个目标最多一个未关闭事件。已恢复的事件保留在列表中，
/// 直到被手动清除或被同一目标的新事件取代。
#[derive(Debug, Default)]
pub struct IncidentManager {
    incidents: Vec<Incident>,
}

impl IncidentManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// 打开事件，已有未关闭事件时返回 None
    ///
    /// 同一目标已恢复但未清除的事件被取代，随结果一并返回。
    pub fn open(
        &mut self,
        target: &str,
        opened_at: DateTime<Utc>,
        detected_at: DateTime<Utc>,
    ) -> Option<OpenedIncident> {
        if self.open_for(target).is_some() {
            return None;
        }

        let (previous, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.incidents)
            .into_iter()
            .partition(|i| i.target == target);
        self.incidents = kept;
        let superseded: Vec<Incident> = previous
            .into_iter()
            .map(|mut i| {
                i.superseded = true;
                i
            })
            .collect();

        let incident = Incident::new(target, opened_at, detected_at);
        info!(
            incident_id = %incident.id,
            service = %target,
            opened_at = %opened_at,
            "Incident opened"
        );
        self.incidents.push(incident.clone());
        Some(OpenedIncident {
            incident,
            superseded,
        })
    }

    /// 关闭目标的未关闭事件，没有时返回 None
    pub fn resolve(
        &mut self,
        target: &str,
        now: DateTime<Utc>,
        reason: CloseReason,
    ) -> Option<Incident> {
        let incident = self
            .incidents
            .iter_mut()
            .find(|i| i.target == target && i.is_open())?;

        let closed_at = now.max(incident.opened_at);
        incident.closed_at = Some(closed_at);
        incident.downtime_ms = Some((closed_at - incident.opened_at).num_milliseconds());
        incident.close_reason = Some(reason);

        info!(
            incident_id = %incident.id,
            service = %target,
            downtime = %format_duration(closed_at - incident.opened_at),
            reason = ?reason,
            "Incident resolved"
        );
        Some(incident.clone())
    }

    /// 清除已恢复的事件
    ///
    /// # 错误
    /// * `NotFound` - 事件不存在或已清除
    /// * `StillOpen` - 事件尚未恢复
    pub fn clear(&mut self, id: &str) -> Result<Incident, IncidentError> {
        let index = self
            .incidents
            .iter()
            .position(|i| i.id == id)
            .ok_or_else(|| IncidentError::NotFound(id.to_string()))?;

        if self.incidents[index].is_open() {
            return Err(IncidentError::StillOpen(id.to_string()));
        }

        let mut incident = self.incidents.remove(index);
        incident.cleared = true;
        info!(incident_id = %id, service = %incident.target, "Incident cleared");
        Ok(incident)
    }

    pub fn get(&self, id: &str) -> Option<&Incident> {
        self.incidents.iter().find(|i| i.id == id)
    }

    pub fn open_for(&self, target: &str) -> Option<&Incident> {
        self.incidents
            .iter()
            .find(|i| i.target == target && i.is_open())
    }

    pub fn open_incidents(&self) -> Vec<Incident> {
        self.incidents
            .iter()
            .filter(|i| i.is_open())
            .cloned()
            .collect()
    }

    /// 最近恢复的事件，按关闭时间倒序
    pub fn recently_resolved(&self, limit: usize) -> Vec<Incident> {
        let mut resolved: Vec<_> = self
            .incidents
            .iter()
            .filter(|i| !i.is_open())
            .cloned()
            .collect();
        resolved.sort_by(|a, b| b.closed_at.cmp(&a.closed_at));
        resolved.truncate(limit);
        resolved
    }

    pub fn len(&self) -> usize {
        self.incidents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.incidents.is_empty()
    }
}
