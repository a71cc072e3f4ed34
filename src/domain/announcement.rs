use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::user::{UserRole, Viewer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "target_audience", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TargetAudience {
    Va,
    Business,
    All,
}

impl TargetAudience {
    pub fn matches_role(&self, role: Option<UserRole>) -> bool {
        match self {
            TargetAudience::All => true,
            TargetAudience::Va => role == Some(UserRole::Va),
            TargetAudience::Business => role == Some(UserRole::Business),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TargetAudience::Va => "va",
            TargetAudience::Business => "business",
            TargetAudience::All => "all",
        }
    }
}

impl std::fmt::Display for TargetAudience {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "announcement_priority", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Normal,
    High,
    Urgent,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Normal => "normal",
            Priority::High => "high",
            Priority::Urgent => "urgent",
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "announcement_category", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Category {
    General,
    Update,
    Maintenance,
    Feature,
    Policy,
    Event,
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct Announcement {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub target_audience: TargetAudience,
    pub priority: Priority,
    pub is_active: bool,
    pub created_by: Uuid,
    pub publish_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub total_reads: i64,
    pub category: Category,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct AnnouncementDraft {
    pub title: String,
    pub content: String,
    pub target_audience: TargetAudience,
    pub priority: Priority,
    pub publish_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub category: Category,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct AnnouncementPatch {
    pub title: Option<String>,
    pub content: Option<String>,
    pub target_audience: Option<TargetAudience>,
    pub priority: Option<Priority>,
    pub is_active: Option<bool>,
    pub publish_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub category: Option<Category>,
    pub tags: Option<Vec<String>>,
}

impl Announcement {
    pub fn new(created_by: Uuid, draft: AnnouncementDraft) -> Self {
        let now = Utc::now();
        let mut announcement = Self {
            id: Uuid::new_v4(),
            title: draft.title,
            content: draft.content,
            target_audience: draft.target_audience,
            priority: draft.priority,
            is_active: true,
            created_by,
            publish_at: draft.publish_at.unwrap_or(now),
            expires_at: draft.expires_at,
            total_reads: 0,
            category: draft.category,
            tags: draft.tags,
            created_at: now,
            updated_at: now,
        };
        announcement.enforce_expiry();
        announcement
    }

    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(expires_at) => expires_at <= Utc::now(),
            None => false,
        }
    }

    pub fn is_published(&self) -> bool {
        self.publish_at <= Utc::now()
    }

    pub fn is_viewable(&self) -> bool {
        self.is_active && !self.is_expired() && self.is_published()
    }

    /// Visibility rule for a caller. Admins bypass the audience check for
    /// management purposes; everyone else only sees live, role-matching
    /// announcements.
    pub fn can_be_viewed_by(&self, viewer: &Viewer) -> bool {
        if viewer.admin {
            return true;
        }
        self.is_viewable() && self.target_audience.matches_role(viewer.role)
    }

    /// Deactivates the announcement if its expiry has passed. Invoked on
    /// every save, mirroring the periodic archive sweep.
    pub fn enforce_expiry(&mut self) {
        if self.is_expired() {
            self.is_active = false;
        }
    }

    pub fn apply_patch(&mut self, patch: AnnouncementPatch) {
        if let Some(title) = patch.title {
            self.title = title;
        }
        if let Some(content) = patch.content {
            self.content = content;
        }
        if let Some(target_audience) = patch.target_audience {
            self.target_audience = target_audience;
        }
        if let Some(priority) = patch.priority {
            self.priority = priority;
        }
        if let Some(is_active) = patch.is_active {
            self.is_active = is_active;
        }
        if let Some(publish_at) = patch.publish_at {
            self.publish_at = publish_at;
        }
        if let Some(expires_at) = patch.expires_at {
            self.expires_at = Some(expires_at);
        }
        if let Some(category) = patch.category {
            self.category = category;
        }
        if let Some(tags) = patch.tags {
            self.tags = tags;
        }
        self.updated_at = Utc::now();
        self.enforce_expiry();
    }
}

/// Announcement row annotated with the caller's read state, as returned by
/// the user-facing listing.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct AnnouncementWithReadState {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub announcement: Announcement,
    pub is_read: bool,
    pub user_read_at: Option<DateTime<Utc>>,
}

/// Announcement row with its ledger reader count, for the admin listing.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct AdminAnnouncementRow {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub announcement: Announcement,
    pub unique_readers: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdminStatusFilter {
    All,
    Active,
    Inactive,
    Expired,
}

impl AdminStatusFilter {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdminStatusFilter::All => "all",
            AdminStatusFilter::Active => "active",
            AdminStatusFilter::Inactive => "inactive",
            AdminStatusFilter::Expired => "expired",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct VisibleFilter {
    pub priority: Option<Priority>,
    pub category: Option<Category>,
    pub unread_only: bool,
}

#[derive(Debug, Clone)]
pub struct AdminFilter {
    pub status: AdminStatusFilter,
    pub target_audience: Option<TargetAudience>,
    pub priority: Option<Priority>,
    pub category: Option<Category>,
}

impl Default for AdminFilter {
    fn default() -> Self {
        Self {
            status: AdminStatusFilter::Active,
            target_audience: None,
            priority: None,
            category: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn draft() -> AnnouncementDraft {
        AnnouncementDraft {
            title: "Scheduled maintenance".to_string(),
            content: "The platform will be unavailable tonight.".to_string(),
            target_audience: TargetAudience::All,
            priority: Priority::High,
            publish_at: None,
            expires_at: None,
            category: Category::Maintenance,
            tags: vec!["maintenance".to_string()],
        }
    }

    #[test]
    fn test_new_announcement_is_viewable() {
        let announcement = Announcement::new(Uuid::new_v4(), draft());

        assert!(announcement.is_active);
        assert!(announcement.is_viewable());
        assert_eq!(announcement.total_reads, 0);
    }

    #[test]
    fn test_expired_draft_is_created_inactive() {
        let mut d = draft();
        d.expires_at = Some(Utc::now() - Duration::hours(1));
        let announcement = Announcement::new(Uuid::new_v4(), d);

        assert!(!announcement.is_active);
        assert!(!announcement.is_viewable());
    }

    #[test]
    fn test_future_publish_not_viewable_yet() {
        let mut d = draft();
        d.publish_at = Some(Utc::now() + Duration::hours(2));
        let announcement = Announcement::new(Uuid::new_v4(), d);

        assert!(announcement.is_active);
        assert!(!announcement.is_viewable());
    }

    #[test]
    fn test_audience_visibility_per_role() {
        let mut d = draft();
        d.target_audience = TargetAudience::Va;
        let announcement = Announcement::new(Uuid::new_v4(), d);

        let va = Viewer::new(Uuid::new_v4(), Some(UserRole::Va), false);
        let business = Viewer::new(Uuid::new_v4(), Some(UserRole::Business), false);
        let admin = Viewer::new(Uuid::new_v4(), None, true);

        assert!(announcement.can_be_viewed_by(&va));
        assert!(!announcement.can_be_viewed_by(&business));
        assert!(announcement.can_be_viewed_by(&admin));
    }

    #[test]
    fn test_admin_sees_inactive_announcement() {
        let mut announcement = Announcement::new(Uuid::new_v4(), draft());
        announcement.is_active = false;

        let admin = Viewer::new(Uuid::new_v4(), None, true);
        let va = Viewer::new(Uuid::new_v4(), Some(UserRole::Va), false);

        assert!(announcement.can_be_viewed_by(&admin));
        assert!(!announcement.can_be_viewed_by(&va));
    }

    #[test]
    fn test_patch_with_past_expiry_deactivates() {
        let mut announcement = Announcement::new(Uuid::new_v4(), draft());
        assert!(announcement.is_active);

        announcement.apply_patch(AnnouncementPatch {
            expires_at: Some(Utc::now() - Duration::minutes(5)),
            ..Default::default()
        });

        assert!(!announcement.is_active);
    }

    #[test]
    fn test_patch_keeps_unset_fields() {
        let mut announcement = Announcement::new(Uuid::new_v4(), draft());
        let original_content = announcement.content.clone();

        announcement.apply_patch(AnnouncementPatch {
            title: Some("Rescheduled".to_string()),
            ..Default::default()
        });

        assert_eq!(announcement.title, "Rescheduled");
        assert_eq!(announcement.content, original_content);
    }

    #[test]
    fn test_priority_ordering() {
        assert!(Priority::Urgent > Priority::High);
        assert!(Priority::High > Priority::Normal);
        assert!(Priority::Normal > Priority::Low);
    }
}
