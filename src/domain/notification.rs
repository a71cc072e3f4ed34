use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::announcement::Priority;
use crate::domain::audience::TargetGroup;
use crate::domain::user::UserRole;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "notification_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    NewMessage,
    NewConversation,
    ProfileView,
    ProfileReminder,
    VaAdded,
    BusinessAdded,
    AdminNotification,
    SystemAnnouncement,
    ReferralJoined,
    CelebrationPackage,
    HiringInvoice,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::NewMessage => "new_message",
            NotificationKind::NewConversation => "new_conversation",
            NotificationKind::ProfileView => "profile_view",
            NotificationKind::ProfileReminder => "profile_reminder",
            NotificationKind::VaAdded => "va_added",
            NotificationKind::BusinessAdded => "business_added",
            NotificationKind::AdminNotification => "admin_notification",
            NotificationKind::SystemAnnouncement => "system_announcement",
            NotificationKind::ReferralJoined => "referral_joined",
            NotificationKind::CelebrationPackage => "celebration_package",
            NotificationKind::HiringInvoice => "hiring_invoice",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            NotificationKind::NewMessage => "New Message",
            NotificationKind::NewConversation => "New Conversation Started",
            NotificationKind::ProfileView => "Someone Viewed Your Profile",
            NotificationKind::ProfileReminder => "Complete Your Profile",
            NotificationKind::VaAdded => "New VA Joined",
            NotificationKind::BusinessAdded => "New Business Joined",
            NotificationKind::AdminNotification => "Admin Notification",
            NotificationKind::SystemAnnouncement => "System Announcement",
            NotificationKind::ReferralJoined => "Your Referral Joined",
            NotificationKind::CelebrationPackage => "Celebration Package Request",
            NotificationKind::HiringInvoice => "Hiring Invoice Request",
        }
    }
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-kind notification payload. Each kind carries exactly the fields its
/// renderers need; the `kind` column is always derived from the variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NotificationParams {
    NewMessage {
        conversation_id: Uuid,
        message_id: Uuid,
        sender_name: String,
    },
    NewConversation {
        conversation_id: Uuid,
        starter_name: String,
    },
    ProfileView {
        viewer_id: Uuid,
        viewer_role: UserRole,
    },
    ProfileReminder {
        missing_fields: Vec<String>,
    },
    VaAdded {
        va_id: Uuid,
        name: String,
    },
    BusinessAdded {
        business_id: Uuid,
        name: String,
    },
    AdminNotification {
        title: String,
        message: String,
        priority: Priority,
        sent_by: Uuid,
    },
    SystemAnnouncement {
        title: String,
        message: String,
        priority: Priority,
        sent_by: Uuid,
        broadcast: bool,
        target_group: Option<TargetGroup>,
    },
    ReferralJoined {
        referral_id: Uuid,
        referral_email: String,
    },
    CelebrationPackage {
        request_id: Uuid,
        requested_by: Uuid,
    },
    HiringInvoice {
        invoice_id: Uuid,
        business_id: Uuid,
    },
}

impl NotificationParams {
    pub fn kind(&self) -> NotificationKind {
        match self {
            NotificationParams::NewMessage { .. } => NotificationKind::NewMessage,
            NotificationParams::NewConversation { .. } => NotificationKind::NewConversation,
            NotificationParams::ProfileView { .. } => NotificationKind::ProfileView,
            NotificationParams::ProfileReminder { .. } => NotificationKind::ProfileReminder,
            NotificationParams::VaAdded { .. } => NotificationKind::VaAdded,
            NotificationParams::BusinessAdded { .. } => NotificationKind::BusinessAdded,
            NotificationParams::AdminNotification { .. } => NotificationKind::AdminNotification,
            NotificationParams::SystemAnnouncement { .. } => NotificationKind::SystemAnnouncement,
            NotificationParams::ReferralJoined { .. } => NotificationKind::ReferralJoined,
            NotificationParams::CelebrationPackage { .. } => NotificationKind::CelebrationPackage,
            NotificationParams::HiringInvoice { .. } => NotificationKind::HiringInvoice,
        }
    }

    pub fn priority(&self) -> Option<Priority> {
        match self {
            NotificationParams::AdminNotification { priority, .. }
            | NotificationParams::SystemAnnouncement { priority, .. } => Some(*priority),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct Notification {
    pub id: Uuid,
    pub recipient_id: Uuid,
    pub kind: NotificationKind,
    #[sqlx(json)]
    pub params: NotificationParams,
    pub read_at: Option<DateTime<Utc>>,
    pub archived: bool,
    pub archived_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(recipient_id: Uuid, params: NotificationParams) -> Self {
        Self {
            id: Uuid::new_v4(),
            recipient_id,
            kind: params.kind(),
            params,
            read_at: None,
            archived: false,
            archived_at: None,
            created_at: Utc::now(),
        }
    }

    pub fn is_read(&self) -> bool {
        self.read_at.is_some()
    }
}

/// Per-user listing filter. Archived records are hidden unless explicitly
/// requested.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NotificationFilter {
    pub unread_only: bool,
    pub kind: Option<NotificationKind>,
    pub priority: Option<Priority>,
    pub include_archived: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DateRange {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

/// Administrative bulk-archive criteria. At least one of the selective
/// fields must be set before the criteria reach the store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BulkArchiveCriteria {
    pub older_than: Option<DateTime<Utc>>,
    pub kind: Option<NotificationKind>,
    pub read_only: bool,
    pub owner: Option<Uuid>,
}

impl BulkArchiveCriteria {
    pub fn is_empty(&self) -> bool {
        self.older_than.is_none() && self.kind.is_none() && !self.read_only && self.owner.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RestoreCriteria {
    pub archived_after: Option<DateTime<Utc>>,
    pub kind: Option<NotificationKind>,
    pub owner: Option<Uuid>,
}

impl RestoreCriteria {
    pub fn is_empty(&self) -> bool {
        self.archived_after.is_none() && self.kind.is_none() && self.owner.is_none()
    }
}

/// Administrative deletion selector: exactly one way to choose the rows.
#[derive(Debug, Clone, PartialEq)]
pub enum AdminDeleteSelector {
    Ids(Vec<Uuid>),
    All,
    OlderThan(DateTime<Utc>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_derived_from_params() {
        let params = NotificationParams::NewMessage {
            conversation_id: Uuid::new_v4(),
            message_id: Uuid::new_v4(),
            sender_name: "Alice".to_string(),
        };
        let notification = Notification::new(Uuid::new_v4(), params);

        assert_eq!(notification.kind, NotificationKind::NewMessage);
        assert!(!notification.is_read());
        assert!(!notification.archived);
    }

    #[test]
    fn test_priority_only_on_admin_kinds() {
        let admin = NotificationParams::AdminNotification {
            title: "T".to_string(),
            message: "M".to_string(),
            priority: Priority::High,
            sent_by: Uuid::new_v4(),
        };
        assert_eq!(admin.priority(), Some(Priority::High));
        assert_eq!(admin.kind(), NotificationKind::AdminNotification);

        let view = NotificationParams::ProfileView {
            viewer_id: Uuid::new_v4(),
            viewer_role: UserRole::Business,
        };
        assert_eq!(view.priority(), None);
    }

    #[test]
    fn test_params_serialize_with_kind_tag() {
        let params = NotificationParams::SystemAnnouncement {
            title: "Maintenance".to_string(),
            message: "Down at noon".to_string(),
            priority: Priority::Urgent,
            sent_by: Uuid::new_v4(),
            broadcast: true,
            target_group: Some(TargetGroup::All),
        };
        let value = serde_json::to_value(&params).unwrap();

        assert_eq!(value["kind"], "system_announcement");
        assert_eq!(value["priority"], "urgent");
        assert_eq!(value["target_group"], "all");
    }

    #[test]
    fn test_bulk_archive_criteria_empty() {
        assert!(BulkArchiveCriteria::default().is_empty());

        let criteria = BulkArchiveCriteria {
            read_only: true,
            ..Default::default()
        };
        assert!(!criteria.is_empty());
    }
}
