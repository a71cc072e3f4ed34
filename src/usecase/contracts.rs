use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::announcement::{
    AdminAnnouncementRow, AdminFilter, Announcement, AnnouncementWithReadState, TargetAudience,
    VisibleFilter,
};
use crate::domain::announcement_read::{AnnouncementRead, Interaction, ReadStats};
use crate::domain::audience::AudienceSelector;
use crate::domain::notification::{
    AdminDeleteSelector, BulkArchiveCriteria, DateRange, Notification, NotificationFilter,
    RestoreCriteria,
};
use crate::domain::scheduled_notification::ScheduledNotification;
use crate::domain::user::{UserProfile, UserRole};
use crate::repository::errors::RepositoryError;

/// A `(key, count)` row produced by grouped count queries.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct GroupCount {
    pub key: String,
    pub count: i64,
}

#[cfg_attr(test, mockall::automock)]
pub trait NotificationRepository: Send + Sync {
    async fn create(&self, notification: &Notification) -> Result<(), RepositoryError>;
    async fn find_by_recipient(
        &self,
        recipient_id: Uuid,
        filter: &NotificationFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Notification>, RepositoryError>;
    async fn count_by_recipient(
        &self,
        recipient_id: Uuid,
        filter: &NotificationFilter,
    ) -> Result<i64, RepositoryError>;
    async fn mark_read(&self, ids: &[Uuid], recipient_id: Uuid) -> Result<u64, RepositoryError>;
    async fn mark_all_read(&self, recipient_id: Uuid) -> Result<Vec<Uuid>, RepositoryError>;
    async fn delete_owned(&self, id: Uuid, recipient_id: Uuid) -> Result<(), RepositoryError>;
    async fn unread_count(&self, recipient_id: Uuid) -> Result<i64, RepositoryError>;
    async fn archived_count(&self, recipient_id: Uuid) -> Result<i64, RepositoryError>;

    async fn archive_ids(&self, ids: &[Uuid], recipient_id: Uuid) -> Result<u64, RepositoryError>;
    async fn unarchive_ids(&self, ids: &[Uuid], recipient_id: Uuid)
        -> Result<u64, RepositoryError>;
    async fn bulk_archive(&self, criteria: &BulkArchiveCriteria) -> Result<u64, RepositoryError>;
    async fn restore_ids(&self, ids: &[Uuid]) -> Result<u64, RepositoryError>;
    async fn restore_by(&self, criteria: &RestoreCriteria) -> Result<u64, RepositoryError>;
    async fn archive_read_before(&self, cutoff: DateTime<Utc>) -> Result<u64, RepositoryError>;
    async fn delete_archived_for(&self, recipient_id: Uuid) -> Result<u64, RepositoryError>;
    async fn delete_many(&self, selector: &AdminDeleteSelector) -> Result<u64, RepositoryError>;

    async fn count_in_range(&self, range: &DateRange) -> Result<i64, RepositoryError>;
    async fn count_read_in_range(&self, range: &DateRange) -> Result<i64, RepositoryError>;
    async fn count_grouped_by_kind(
        &self,
        range: &DateRange,
    ) -> Result<Vec<GroupCount>, RepositoryError>;
    async fn count_grouped_by_priority(
        &self,
        range: &DateRange,
    ) -> Result<Vec<GroupCount>, RepositoryError>;
    async fn count_archived(
        &self,
        range: &DateRange,
        recipient_id: Option<Uuid>,
    ) -> Result<i64, RepositoryError>;
    async fn count_archived_grouped_by_kind(
        &self,
        range: &DateRange,
        recipient_id: Option<Uuid>,
    ) -> Result<Vec<GroupCount>, RepositoryError>;
}

#[cfg_attr(test, mockall::automock)]
pub trait AnnouncementRepository: Send + Sync {
    async fn create(&self, announcement: &Announcement) -> Result<(), RepositoryError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Announcement>, RepositoryError>;
    async fn update(&self, announcement: &Announcement) -> Result<(), RepositoryError>;
    /// Removes the announcement; ledger rows go with it via the cascade.
    async fn delete(&self, id: Uuid) -> Result<(), RepositoryError>;
    async fn list_visible(
        &self,
        user_id: Uuid,
        role: Option<UserRole>,
        admin: bool,
        filter: &VisibleFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<AnnouncementWithReadState>, RepositoryError>;
    async fn count_visible(
        &self,
        user_id: Uuid,
        role: Option<UserRole>,
        admin: bool,
        filter: &VisibleFilter,
    ) -> Result<i64, RepositoryError>;
    async fn list_admin(
        &self,
        filter: &AdminFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<AdminAnnouncementRow>, RepositoryError>;
    async fn count_admin(&self, filter: &AdminFilter) -> Result<i64, RepositoryError>;
    async fn archive_expired(&self) -> Result<u64, RepositoryError>;
    async fn unread_counts_by_priority(
        &self,
        user_id: Uuid,
        role: Option<UserRole>,
        admin: bool,
    ) -> Result<Vec<GroupCount>, RepositoryError>;
    async fn increment_total_reads(&self, id: Uuid) -> Result<(), RepositoryError>;
}

#[cfg_attr(test, mockall::automock)]
pub trait AnnouncementReadRepository: Send + Sync {
    async fn find(
        &self,
        announcement_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<AnnouncementRead>, RepositoryError>;
    /// Refreshes an existing receipt: bumps `read_at`, optionally overwrites
    /// the interaction, and accumulates time spent.
    async fn touch(
        &self,
        id: Uuid,
        interaction: Option<Interaction>,
        time_spent_secs: i64,
    ) -> Result<AnnouncementRead, RepositoryError>;
    /// Idempotent first-read insert. Returns `false` when a concurrent
    /// request already inserted the row for the same pair; the uniqueness
    /// constraint arbitrates the race.
    async fn insert_if_absent(&self, read: &AnnouncementRead) -> Result<bool, RepositoryError>;
    async fn stats_for(&self, announcement_id: Uuid) -> Result<ReadStats, RepositoryError>;
    async fn unique_readers(&self, announcement_id: Uuid) -> Result<i64, RepositoryError>;
}

#[cfg_attr(test, mockall::automock)]
pub trait UserDirectory: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserProfile>, RepositoryError>;
    async fn resolve_audience(
        &self,
        selector: &AudienceSelector,
    ) -> Result<Vec<UserProfile>, RepositoryError>;
    async fn audience_size(&self, audience: TargetAudience) -> Result<i64, RepositoryError>;
}

#[cfg_attr(test, mockall::automock)]
pub trait ScheduledNotificationRepository: Send + Sync {
    async fn create(&self, scheduled: &ScheduledNotification) -> Result<(), RepositoryError>;
    /// Rows still awaiting dispatch, soonest first. Polled by the external
    /// scheduler and by the admin inspection endpoint.
    async fn list_pending(&self) -> Result<Vec<ScheduledNotification>, RepositoryError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushEvent {
    NewNotification,
    NotificationRead,
    AllNotificationsRead,
    NotificationDeleted,
}

impl PushEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            PushEvent::NewNotification => "new-notification",
            PushEvent::NotificationRead => "notification-read",
            PushEvent::AllNotificationsRead => "all-notifications-read",
            PushEvent::NotificationDeleted => "notification-deleted",
        }
    }
}

impl std::fmt::Display for PushEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Real-time event channel. Emission is fire-and-forget: implementations
/// swallow delivery failures, clients reconcile through unread-count pulls.
#[cfg_attr(test, mockall::automock)]
pub trait PushChannel: Send + Sync {
    async fn emit_to_user(&self, user_id: Uuid, event: PushEvent, payload: serde_json::Value);
    async fn emit_to_room(&self, room: &str, event: PushEvent, payload: serde_json::Value);
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub html: String,
}

#[derive(Debug, Error)]
pub enum MailerError {
    #[error("email delivery failed: {0}")]
    Delivery(String),
}

/// Best-effort email side-channel. Failures are logged and counted by the
/// caller, never surfaced as a delivery failure of the notification itself.
#[cfg_attr(test, mockall::automock)]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), MailerError>;
}
