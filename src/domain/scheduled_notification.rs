use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::domain::announcement::Priority;
use crate::domain::audience::TargetGroup;
use crate::domain::notification::NotificationKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, sqlx::Type)]
#[sqlx(type_name = "schedule_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ScheduleStatus {
    Scheduled,
    Dispatched,
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct ScheduleDraft {
    pub scheduled_for: DateTime<Utc>,
    pub target_users: Vec<Uuid>,
    pub target_group: Option<TargetGroup>,
    pub title: String,
    pub message: String,
    pub kind: NotificationKind,
    pub priority: Priority,
    pub send_email: bool,
}

/// A recorded intent to send at a future time. This service only persists
/// the record; an external scheduler picks pending rows up and calls back
/// into the dispatcher.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct ScheduledNotification {
    pub id: Uuid,
    pub scheduled_for: DateTime<Utc>,
    pub target_users: Vec<Uuid>,
    pub target_group: Option<TargetGroup>,
    pub title: String,
    pub message: String,
    pub kind: NotificationKind,
    pub priority: Priority,
    pub send_email: bool,
    pub created_by: Uuid,
    pub status: ScheduleStatus,
    pub created_at: DateTime<Utc>,
}

impl ScheduledNotification {
    pub fn new(created_by: Uuid, draft: ScheduleDraft) -> Self {
        Self {
            id: Uuid::new_v4(),
            scheduled_for: draft.scheduled_for,
            target_users: draft.target_users,
            target_group: draft.target_group,
            title: draft.title,
            message: draft.message,
            kind: draft.kind,
            priority: draft.priority,
            send_email: draft.send_email,
            created_by,
            status: ScheduleStatus::Scheduled,
            created_at: Utc::now(),
        }
    }

    pub fn has_target(&self) -> bool {
        !self.target_users.is_empty() || self.target_group.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn draft(target_users: Vec<Uuid>, target_group: Option<TargetGroup>) -> ScheduleDraft {
        ScheduleDraft {
            scheduled_for: Utc::now() + Duration::hours(4),
            target_users,
            target_group,
            title: "Reminder".to_string(),
            message: "Survey closes soon".to_string(),
            kind: NotificationKind::SystemAnnouncement,
            priority: Priority::Normal,
            send_email: false,
        }
    }

    #[test]
    fn test_new_scheduled_notification() {
        let scheduled = ScheduledNotification::new(Uuid::new_v4(), draft(vec![Uuid::new_v4()], None));

        assert_eq!(scheduled.status, ScheduleStatus::Scheduled);
        assert!(scheduled.has_target());
    }

    #[test]
    fn test_has_target_with_group_only() {
        let scheduled =
            ScheduledNotification::new(Uuid::new_v4(), draft(vec![], Some(TargetGroup::Vas)));
        assert!(scheduled.has_target());
    }

    #[test]
    fn test_has_no_target() {
        let scheduled = ScheduledNotification::new(Uuid::new_v4(), draft(vec![], None));
        assert!(!scheduled.has_target());
    }
}
