use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, PgPool};
use uuid::Uuid;

use crate::{
    domain::announcement::{
        AdminAnnouncementRow, AdminFilter, Announcement, AnnouncementWithReadState, TargetAudience,
        VisibleFilter,
    },
    domain::announcement_read::{AnnouncementRead, Interaction, ReadStats},
    domain::audience::AudienceSelector,
    domain::notification::{
        AdminDeleteSelector, BulkArchiveCriteria, DateRange, Notification, NotificationFilter,
        RestoreCriteria,
    },
    domain::scheduled_notification::ScheduledNotification,
    domain::user::{UserProfile, UserRole},
    repository::errors::RepositoryError,
    usecase::contracts::{
        AnnouncementReadRepository, AnnouncementRepository, GroupCount, NotificationRepository,
        ScheduledNotificationRepository, UserDirectory,
    },
};

pub struct PostgresNotificationRepository {
    pool: PgPool,
}

impl PostgresNotificationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl NotificationRepository for PostgresNotificationRepository {
    #[tracing::instrument(skip(self, notification), fields(notification_id = %notification.id, recipient_id = %notification.recipient_id, kind = %notification.kind))]
    async fn create(&self, notification: &Notification) -> Result<(), RepositoryError> {
        tracing::debug!("creating notification");

        sqlx::query(
            r#"
            INSERT INTO notifications (id, recipient_id, kind, params, read_at, archived, archived_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(notification.id)
        .bind(notification.recipient_id)
        .bind(notification.kind)
        .bind(serde_json::to_value(&notification.params).unwrap())
        .bind(notification.read_at)
        .bind(notification.archived)
        .bind(notification.archived_at)
        .bind(notification.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

        tracing::debug!(notification_id = %notification.id, "notification created successfully");
        Ok(())
    }

    #[tracing::instrument(skip(self, filter), fields(recipient_id = %recipient_id, %limit, %offset))]
    async fn find_by_recipient(
        &self,
        recipient_id: Uuid,
        filter: &NotificationFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Notification>, RepositoryError> {
        tracing::debug!("finding notifications by recipient");

        let notifications = sqlx::query_as::<_, Notification>(
            r#"
            SELECT id, recipient_id, kind, params, read_at, archived, archived_at, created_at
            FROM notifications
            WHERE recipient_id = $1
              AND ($2::bool OR NOT archived)
              AND (NOT $3::bool OR read_at IS NULL)
              AND ($4::notification_kind IS NULL OR kind = $4)
              AND ($5::text IS NULL OR params->>'priority' = $5)
            ORDER BY created_at DESC
            LIMIT $6 OFFSET $7
            "#,
        )
        .bind(recipient_id)
        .bind(filter.include_archived)
        .bind(filter.unread_only)
        .bind(filter.kind)
        .bind(filter.priority.map(|p| p.as_str()))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

        tracing::debug!(count = notifications.len(), "found notifications");
        Ok(notifications)
    }

    #[tracing::instrument(skip(self, filter), fields(recipient_id = %recipient_id))]
    async fn count_by_recipient(
        &self,
        recipient_id: Uuid,
        filter: &NotificationFilter,
    ) -> Result<i64, RepositoryError> {
        tracing::debug!("counting notifications by recipient");

        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM notifications
            WHERE recipient_id = $1
              AND ($2::bool OR NOT archived)
              AND (NOT $3::bool OR read_at IS NULL)
              AND ($4::notification_kind IS NULL OR kind = $4)
              AND ($5::text IS NULL OR params->>'priority' = $5)
            "#,
        )
        .bind(recipient_id)
        .bind(filter.include_archived)
        .bind(filter.unread_only)
        .bind(filter.kind)
        .bind(filter.priority.map(|p| p.as_str()))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

        Ok(count)
    }

    #[tracing::instrument(skip(self, ids), fields(recipient_id = %recipient_id, id_count = ids.len()))]
    async fn mark_read(&self, ids: &[Uuid], recipient_id: Uuid) -> Result<u64, RepositoryError> {
        tracing::debug!("marking notifications as read");

        let result = sqlx::query(
            r#"
            UPDATE notifications
            SET read_at = NOW()
            WHERE id = ANY($1) AND recipient_id = $2 AND read_at IS NULL
            "#,
        )
        .bind(ids)
        .bind(recipient_id)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

        tracing::debug!(marked = result.rows_affected(), "notifications marked as read");
        Ok(result.rows_affected())
    }

    #[tracing::instrument(skip(self), fields(recipient_id = %recipient_id))]
    async fn mark_all_read(&self, recipient_id: Uuid) -> Result<Vec<Uuid>, RepositoryError> {
        tracing::debug!("marking all notifications as read");

        let ids: Vec<Uuid> = sqlx::query_scalar(
            r#"
            UPDATE notifications
            SET read_at = NOW()
            WHERE recipient_id = $1 AND read_at IS NULL
            RETURNING id
            "#,
        )
        .bind(recipient_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

        tracing::debug!(marked = ids.len(), "all notifications marked as read");
        Ok(ids)
    }

    #[tracing::instrument(skip(self), fields(notification_id = %id, recipient_id = %recipient_id))]
    async fn delete_owned(&self, id: Uuid, recipient_id: Uuid) -> Result<(), RepositoryError> {
        tracing::debug!("deleting notification");

        let result = sqlx::query(
            r#"
            DELETE FROM notifications
            WHERE id = $1 AND recipient_id = $2
            "#,
        )
        .bind(id)
        .bind(recipient_id)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        tracing::debug!(notification_id = %id, "notification deleted successfully");
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(recipient_id = %recipient_id))]
    async fn unread_count(&self, recipient_id: Uuid) -> Result<i64, RepositoryError> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM notifications
            WHERE recipient_id = $1 AND read_at IS NULL AND NOT archived
            "#,
        )
        .bind(recipient_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

        Ok(count)
    }

    #[tracing::instrument(skip(self), fields(recipient_id = %recipient_id))]
    async fn archived_count(&self, recipient_id: Uuid) -> Result<i64, RepositoryError> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM notifications
            WHERE recipient_id = $1 AND archived
            "#,
        )
        .bind(recipient_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

        Ok(count)
    }

    #[tracing::instrument(skip(self, ids), fields(recipient_id = %recipient_id, id_count = ids.len()))]
    async fn archive_ids(&self, ids: &[Uuid], recipient_id: Uuid) -> Result<u64, RepositoryError> {
        tracing::debug!("archiving notifications");

        let result = sqlx::query(
            r#"
            UPDATE notifications
            SET archived = TRUE, archived_at = NOW()
            WHERE id = ANY($1) AND recipient_id = $2 AND NOT archived
            "#,
        )
        .bind(ids)
        .bind(recipient_id)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

        tracing::debug!(archived = result.rows_affected(), "notifications archived");
        Ok(result.rows_affected())
    }

    #[tracing::instrument(skip(self, ids), fields(recipient_id = %recipient_id, id_count = ids.len()))]
    async fn unarchive_ids(
        &self,
        ids: &[Uuid],
        recipient_id: Uuid,
    ) -> Result<u64, RepositoryError> {
        tracing::debug!("unarchiving notifications");

        let result = sqlx::query(
            r#"
            UPDATE notifications
            SET archived = FALSE, archived_at = NULL
            WHERE id = ANY($1) AND recipient_id = $2 AND archived
            "#,
        )
        .bind(ids)
        .bind(recipient_id)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

        tracing::debug!(restored = result.rows_affected(), "notifications unarchived");
        Ok(result.rows_affected())
    }

    #[tracing::instrument(skip(self, criteria))]
    async fn bulk_archive(&self, criteria: &BulkArchiveCriteria) -> Result<u64, RepositoryError> {
        tracing::debug!(?criteria, "bulk archiving notifications");

        let result = sqlx::query(
            r#"
            UPDATE notifications
            SET archived = TRUE, archived_at = NOW()
            WHERE NOT archived
              AND ($1::timestamptz IS NULL OR created_at < $1)
              AND ($2::notification_kind IS NULL OR kind = $2)
              AND (NOT $3::bool OR read_at IS NOT NULL)
              AND ($4::uuid IS NULL OR recipient_id = $4)
            "#,
        )
        .bind(criteria.older_than)
        .bind(criteria.kind)
        .bind(criteria.read_only)
        .bind(criteria.owner)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

        tracing::debug!(archived = result.rows_affected(), "bulk archive finished");
        Ok(result.rows_affected())
    }

    #[tracing::instrument(skip(self, ids), fields(id_count = ids.len()))]
    async fn restore_ids(&self, ids: &[Uuid]) -> Result<u64, RepositoryError> {
        tracing::debug!("restoring archived notifications by ids");

        let result = sqlx::query(
            r#"
            UPDATE notifications
            SET archived = FALSE, archived_at = NULL
            WHERE id = ANY($1) AND archived
            "#,
        )
        .bind(ids)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

        Ok(result.rows_affected())
    }

    #[tracing::instrument(skip(self, criteria))]
    async fn restore_by(&self, criteria: &RestoreCriteria) -> Result<u64, RepositoryError> {
        tracing::debug!(?criteria, "restoring archived notifications by criteria");

        let result = sqlx::query(
            r#"
            UPDATE notifications
            SET archived = FALSE, archived_at = NULL
            WHERE archived
              AND ($1::timestamptz IS NULL OR archived_at >= $1)
              AND ($2::notification_kind IS NULL OR kind = $2)
              AND ($3::uuid IS NULL OR recipient_id = $3)
            "#,
        )
        .bind(criteria.archived_after)
        .bind(criteria.kind)
        .bind(criteria.owner)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

        Ok(result.rows_affected())
    }

    #[tracing::instrument(skip(self), fields(%cutoff))]
    async fn archive_read_before(&self, cutoff: DateTime<Utc>) -> Result<u64, RepositoryError> {
        tracing::debug!("auto-archiving old read notifications");

        let result = sqlx::query(
            r#"
            UPDATE notifications
            SET archived = TRUE, archived_at = NOW()
            WHERE read_at IS NOT NULL AND read_at < $1 AND NOT archived
            "#,
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

        tracing::debug!(archived = result.rows_affected(), "auto-archive finished");
        Ok(result.rows_affected())
    }

    #[tracing::instrument(skip(self), fields(recipient_id = %recipient_id))]
    async fn delete_archived_for(&self, recipient_id: Uuid) -> Result<u64, RepositoryError> {
        tracing::debug!("clearing archived notifications");

        let result = sqlx::query(
            r#"
            DELETE FROM notifications
            WHERE recipient_id = $1 AND archived
            "#,
        )
        .bind(recipient_id)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

        tracing::debug!(deleted = result.rows_affected(), "archived notifications cleared");
        Ok(result.rows_affected())
    }

    #[tracing::instrument(skip(self, selector))]
    async fn delete_many(&self, selector: &AdminDeleteSelector) -> Result<u64, RepositoryError> {
        tracing::debug!(?selector, "deleting notifications");

        let result = match selector {
            AdminDeleteSelector::Ids(ids) => {
                sqlx::query("DELETE FROM notifications WHERE id = ANY($1)")
                    .bind(ids)
                    .execute(&self.pool)
                    .await
            }
            AdminDeleteSelector::All => {
                sqlx::query("DELETE FROM notifications").execute(&self.pool).await
            }
            AdminDeleteSelector::OlderThan(date) => {
                sqlx::query("DELETE FROM notifications WHERE created_at < $1")
                    .bind(date)
                    .execute(&self.pool)
                    .await
            }
        }
        .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

        tracing::debug!(deleted = result.rows_affected(), "notifications deleted");
        Ok(result.rows_affected())
    }

    #[tracing::instrument(skip(self, range))]
    async fn count_in_range(&self, range: &DateRange) -> Result<i64, RepositoryError> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM notifications
            WHERE ($1::timestamptz IS NULL OR created_at >= $1)
              AND ($2::timestamptz IS NULL OR created_at <= $2)
            "#,
        )
        .bind(range.start)
        .bind(range.end)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

        Ok(count)
    }

    #[tracing::instrument(skip(self, range))]
    async fn count_read_in_range(&self, range: &DateRange) -> Result<i64, RepositoryError> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM notifications
            WHERE read_at IS NOT NULL
              AND ($1::timestamptz IS NULL OR created_at >= $1)
              AND ($2::timestamptz IS NULL OR created_at <= $2)
            "#,
        )
        .bind(range.start)
        .bind(range.end)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

        Ok(count)
    }

    #[tracing::instrument(skip(self, range))]
    async fn count_grouped_by_kind(
        &self,
        range: &DateRange,
    ) -> Result<Vec<GroupCount>, RepositoryError> {
        let rows = sqlx::query_as::<_, GroupCount>(
            r#"
            SELECT kind::text AS key, COUNT(*) AS count
            FROM notifications
            WHERE ($1::timestamptz IS NULL OR created_at >= $1)
              AND ($2::timestamptz IS NULL OR created_at <= $2)
            GROUP BY kind
            "#,
        )
        .bind(range.start)
        .bind(range.end)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

        Ok(rows)
    }

    #[tracing::instrument(skip(self, range))]
    async fn count_grouped_by_priority(
        &self,
        range: &DateRange,
    ) -> Result<Vec<GroupCount>, RepositoryError> {
        let rows = sqlx::query_as::<_, GroupCount>(
            r#"
            SELECT params->>'priority' AS key, COUNT(*) AS count
            FROM notifications
            WHERE params->>'priority' IS NOT NULL
              AND ($1::timestamptz IS NULL OR created_at >= $1)
              AND ($2::timestamptz IS NULL OR created_at <= $2)
            GROUP BY params->>'priority'
            "#,
        )
        .bind(range.start)
        .bind(range.end)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

        Ok(rows)
    }

    #[tracing::instrument(skip(self, range), fields(?recipient_id))]
    async fn count_archived(
        &self,
        range: &DateRange,
        recipient_id: Option<Uuid>,
    ) -> Result<i64, RepositoryError> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM notifications
            WHERE archived
              AND ($1::timestamptz IS NULL OR archived_at >= $1)
              AND ($2::timestamptz IS NULL OR archived_at <= $2)
              AND ($3::uuid IS NULL OR recipient_id = $3)
            "#,
        )
        .bind(range.start)
        .bind(range.end)
        .bind(recipient_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

        Ok(count)
    }

    #[tracing::instrument(skip(self, range), fields(?recipient_id))]
    async fn count_archived_grouped_by_kind(
        &self,
        range: &DateRange,
        recipient_id: Option<Uuid>,
    ) -> Result<Vec<GroupCount>, RepositoryError> {
        let rows = sqlx::query_as::<_, GroupCount>(
            r#"
            SELECT kind::text AS key, COUNT(*) AS count
            FROM notifications
            WHERE archived
              AND ($1::timestamptz IS NULL OR archived_at >= $1)
              AND ($2::timestamptz IS NULL OR archived_at <= $2)
              AND ($3::uuid IS NULL OR recipient_id = $3)
            GROUP BY kind
            "#,
        )
        .bind(range.start)
        .bind(range.end)
        .bind(recipient_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

        Ok(rows)
    }
}

pub struct PostgresAnnouncementRepository {
    pool: PgPool,
}

impl PostgresAnnouncementRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl AnnouncementRepository for PostgresAnnouncementRepository {
    #[tracing::instrument(skip(self, announcement), fields(announcement_id = %announcement.id))]
    async fn create(&self, announcement: &Announcement) -> Result<(), RepositoryError> {
        tracing::debug!("creating announcement");

        sqlx::query(
            r#"
            INSERT INTO announcements
                (id, title, content, target_audience, priority, is_active, created_by,
                 publish_at, expires_at, total_reads, category, tags, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(announcement.id)
        .bind(&announcement.title)
        .bind(&announcement.content)
        .bind(announcement.target_audience)
        .bind(announcement.priority)
        .bind(announcement.is_active)
        .bind(announcement.created_by)
        .bind(announcement.publish_at)
        .bind(announcement.expires_at)
        .bind(announcement.total_reads)
        .bind(announcement.category)
        .bind(&announcement.tags)
        .bind(announcement.created_at)
        .bind(announcement.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

        tracing::debug!(announcement_id = %announcement.id, "announcement created successfully");
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(announcement_id = %id))]
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Announcement>, RepositoryError> {
        let announcement = sqlx::query_as::<_, Announcement>(
            r#"
            SELECT id, title, content, target_audience, priority, is_active, created_by,
                   publish_at, expires_at, total_reads, category, tags, created_at, updated_at
            FROM announcements
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

        Ok(announcement)
    }

    #[tracing::instrument(skip(self, announcement), fields(announcement_id = %announcement.id))]
    async fn update(&self, announcement: &Announcement) -> Result<(), RepositoryError> {
        tracing::debug!("updating announcement");

        let result = sqlx::query(
            r#"
            UPDATE announcements
            SET title = $2, content = $3, target_audience = $4, priority = $5, is_active = $6,
                publish_at = $7, expires_at = $8, category = $9, tags = $10, updated_at = $11
            WHERE id = $1
            "#,
        )
        .bind(announcement.id)
        .bind(&announcement.title)
        .bind(&announcement.content)
        .bind(announcement.target_audience)
        .bind(announcement.priority)
        .bind(announcement.is_active)
        .bind(announcement.publish_at)
        .bind(announcement.expires_at)
        .bind(announcement.category)
        .bind(&announcement.tags)
        .bind(announcement.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        tracing::debug!(announcement_id = %announcement.id, "announcement updated successfully");
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(announcement_id = %id))]
    async fn delete(&self, id: Uuid) -> Result<(), RepositoryError> {
        tracing::debug!("deleting announcement");

        let result = sqlx::query(
            r#"
            DELETE FROM announcements
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        tracing::debug!(announcement_id = %id, "announcement deleted successfully");
        Ok(())
    }

    #[tracing::instrument(skip(self, filter), fields(user_id = %user_id, ?role, %admin, %limit, %offset))]
    async fn list_visible(
        &self,
        user_id: Uuid,
        role: Option<UserRole>,
        admin: bool,
        filter: &VisibleFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<AnnouncementWithReadState>, RepositoryError> {
        tracing::debug!("listing visible announcements");

        let rows = sqlx::query_as::<_, AnnouncementWithReadState>(
            r#"
            SELECT a.*, r.id IS NOT NULL AS is_read, r.read_at AS user_read_at
            FROM announcements a
            LEFT JOIN announcement_reads r
                ON r.announcement_id = a.id AND r.user_id = $1
            WHERE a.is_active
              AND (a.expires_at IS NULL OR a.expires_at > NOW())
              AND a.publish_at <= NOW()
              AND ($2::bool OR a.target_audience = 'all' OR a.target_audience::text = $3::text)
              AND ($4::announcement_priority IS NULL OR a.priority = $4)
              AND ($5::announcement_category IS NULL OR a.category = $5)
              AND (NOT $6::bool OR r.id IS NULL)
            ORDER BY a.priority DESC, a.created_at DESC
            LIMIT $7 OFFSET $8
            "#,
        )
        .bind(user_id)
        .bind(admin)
        .bind(role.map(|r| r.as_str()))
        .bind(filter.priority)
        .bind(filter.category)
        .bind(filter.unread_only)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

        tracing::debug!(count = rows.len(), "visible announcements listed");
        Ok(rows)
    }

    #[tracing::instrument(skip(self, filter), fields(user_id = %user_id, ?role, %admin))]
    async fn count_visible(
        &self,
        user_id: Uuid,
        role: Option<UserRole>,
        admin: bool,
        filter: &VisibleFilter,
    ) -> Result<i64, RepositoryError> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM announcements a
            LEFT JOIN announcement_reads r
                ON r.announcement_id = a.id AND r.user_id = $1
            WHERE a.is_active
              AND (a.expires_at IS NULL OR a.expires_at > NOW())
              AND a.publish_at <= NOW()
              AND ($2::bool OR a.target_audience = 'all' OR a.target_audience::text = $3::text)
              AND ($4::announcement_priority IS NULL OR a.priority = $4)
              AND ($5::announcement_category IS NULL OR a.category = $5)
              AND (NOT $6::bool OR r.id IS NULL)
            "#,
        )
        .bind(user_id)
        .bind(admin)
        .bind(role.map(|r| r.as_str()))
        .bind(filter.priority)
        .bind(filter.category)
        .bind(filter.unread_only)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

        Ok(count)
    }

    #[tracing::instrument(skip(self, filter), fields(%limit, %offset))]
    async fn list_admin(
        &self,
        filter: &AdminFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<AdminAnnouncementRow>, RepositoryError> {
        tracing::debug!(status = filter.status.as_str(), "listing announcements for admin");

        let rows = sqlx::query_as::<_, AdminAnnouncementRow>(
            r#"
            SELECT a.*, COALESCE(rc.readers, 0) AS unique_readers
            FROM announcements a
            LEFT JOIN (
                SELECT announcement_id, COUNT(*) AS readers
                FROM announcement_reads
                GROUP BY announcement_id
            ) rc ON rc.announcement_id = a.id
            WHERE ($1::text = 'all'
                OR ($1 = 'active' AND a.is_active AND (a.expires_at IS NULL OR a.expires_at > NOW()))
                OR ($1 = 'inactive' AND NOT a.is_active)
                OR ($1 = 'expired' AND a.is_active AND a.expires_at <= NOW()))
              AND ($2::target_audience IS NULL OR a.target_audience = $2)
              AND ($3::announcement_priority IS NULL OR a.priority = $3)
              AND ($4::announcement_category IS NULL OR a.category = $4)
            ORDER BY a.created_at DESC
            LIMIT $5 OFFSET $6
            "#,
        )
        .bind(filter.status.as_str())
        .bind(filter.target_audience)
        .bind(filter.priority)
        .bind(filter.category)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

        tracing::debug!(count = rows.len(), "admin announcements listed");
        Ok(rows)
    }

    #[tracing::instrument(skip(self, filter))]
    async fn count_admin(&self, filter: &AdminFilter) -> Result<i64, RepositoryError> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM announcements a
            WHERE ($1::text = 'all'
                OR ($1 = 'active' AND a.is_active AND (a.expires_at IS NULL OR a.expires_at > NOW()))
                OR ($1 = 'inactive' AND NOT a.is_active)
                OR ($1 = 'expired' AND a.is_active AND a.expires_at <= NOW()))
              AND ($2::target_audience IS NULL OR a.target_audience = $2)
              AND ($3::announcement_priority IS NULL OR a.priority = $3)
              AND ($4::announcement_category IS NULL OR a.category = $4)
            "#,
        )
        .bind(filter.status.as_str())
        .bind(filter.target_audience)
        .bind(filter.priority)
        .bind(filter.category)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

        Ok(count)
    }

    #[tracing::instrument(skip(self))]
    async fn archive_expired(&self) -> Result<u64, RepositoryError> {
        tracing::debug!("archiving expired announcements");

        let result = sqlx::query(
            r#"
            UPDATE announcements
            SET is_active = FALSE, updated_at = NOW()
            WHERE is_active AND expires_at <= NOW()
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

        tracing::debug!(archived = result.rows_affected(), "expired announcements archived");
        Ok(result.rows_affected())
    }

    #[tracing::instrument(skip(self), fields(user_id = %user_id, ?role, %admin))]
    async fn unread_counts_by_priority(
        &self,
        user_id: Uuid,
        role: Option<UserRole>,
        admin: bool,
    ) -> Result<Vec<GroupCount>, RepositoryError> {
        let rows = sqlx::query_as::<_, GroupCount>(
            r#"
            SELECT a.priority::text AS key, COUNT(*) AS count
            FROM announcements a
            WHERE a.is_active
              AND (a.expires_at IS NULL OR a.expires_at > NOW())
              AND a.publish_at <= NOW()
              AND ($2::bool OR a.target_audience = 'all' OR a.target_audience::text = $3::text)
              AND NOT EXISTS (
                  SELECT 1 FROM announcement_reads r
                  WHERE r.announcement_id = a.id AND r.user_id = $1
              )
            GROUP BY a.priority
            "#,
        )
        .bind(user_id)
        .bind(admin)
        .bind(role.map(|r| r.as_str()))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

        Ok(rows)
    }

    #[tracing::instrument(skip(self), fields(announcement_id = %id))]
    async fn increment_total_reads(&self, id: Uuid) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE announcements
            SET total_reads = total_reads + 1
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }
}

pub struct PostgresAnnouncementReadRepository {
    pool: PgPool,
}

impl PostgresAnnouncementReadRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl AnnouncementReadRepository for PostgresAnnouncementReadRepository {
    #[tracing::instrument(skip(self), fields(announcement_id = %announcement_id, user_id = %user_id))]
    async fn find(
        &self,
        announcement_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<AnnouncementRead>, RepositoryError> {
        let read = sqlx::query_as::<_, AnnouncementRead>(
            r#"
            SELECT id, announcement_id, user_id, read_at, interaction, time_spent_secs, device, created_at
            FROM announcement_reads
            WHERE announcement_id = $1 AND user_id = $2
            "#,
        )
        .bind(announcement_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

        Ok(read)
    }

    #[tracing::instrument(skip(self), fields(read_id = %id, ?interaction, %time_spent_secs))]
    async fn touch(
        &self,
        id: Uuid,
        interaction: Option<Interaction>,
        time_spent_secs: i64,
    ) -> Result<AnnouncementRead, RepositoryError> {
        tracing::debug!("refreshing read record");

        let read = sqlx::query_as::<_, AnnouncementRead>(
            r#"
            UPDATE announcement_reads
            SET read_at = NOW(),
                interaction = COALESCE($2, interaction),
                time_spent_secs = time_spent_secs + $3
            WHERE id = $1
            RETURNING id, announcement_id, user_id, read_at, interaction, time_spent_secs, device, created_at
            "#,
        )
        .bind(id)
        .bind(interaction)
        .bind(time_spent_secs)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

        read.ok_or(RepositoryError::NotFound)
    }

    #[tracing::instrument(skip(self, read), fields(announcement_id = %read.announcement_id, user_id = %read.user_id))]
    async fn insert_if_absent(&self, read: &AnnouncementRead) -> Result<bool, RepositoryError> {
        tracing::debug!("inserting read record if absent");

        let result = sqlx::query(
            r#"
            INSERT INTO announcement_reads
                (id, announcement_id, user_id, read_at, interaction, time_spent_secs, device, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (announcement_id, user_id) DO NOTHING
            "#,
        )
        .bind(read.id)
        .bind(read.announcement_id)
        .bind(read.user_id)
        .bind(read.read_at)
        .bind(read.interaction)
        .bind(read.time_spent_secs)
        .bind(read.device.as_ref().map(|d| serde_json::to_value(d).unwrap()))
        .bind(read.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

        let inserted = result.rows_affected() == 1;
        tracing::debug!(inserted, "read record insert attempted");
        Ok(inserted)
    }

    #[tracing::instrument(skip(self), fields(announcement_id = %announcement_id))]
    async fn stats_for(&self, announcement_id: Uuid) -> Result<ReadStats, RepositoryError> {
        let stats = sqlx::query_as::<_, ReadStats>(
            r#"
            SELECT COUNT(*) AS total_reads,
                   COALESCE(AVG(time_spent_secs), 0)::float8 AS avg_time_spent,
                   COUNT(*) FILTER (WHERE interaction = 'viewed') AS viewed,
                   COUNT(*) FILTER (WHERE interaction = 'clicked') AS clicked,
                   COUNT(*) FILTER (WHERE interaction = 'dismissed') AS dismissed
            FROM announcement_reads
            WHERE announcement_id = $1
            "#,
        )
        .bind(announcement_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

        Ok(stats)
    }

    #[tracing::instrument(skip(self), fields(announcement_id = %announcement_id))]
    async fn unique_readers(&self, announcement_id: Uuid) -> Result<i64, RepositoryError> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM announcement_reads WHERE announcement_id = $1
            "#,
        )
        .bind(announcement_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

        Ok(count)
    }
}

pub struct PostgresUserDirectory {
    pool: PgPool,
}

impl PostgresUserDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl UserDirectory for PostgresUserDirectory {
    #[tracing::instrument(skip(self), fields(user_id = %id))]
    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserProfile>, RepositoryError> {
        let user = sqlx::query_as::<_, UserProfile>(
            r#"
            SELECT id, email, name, role, admin, suspended, email_system_announcements
            FROM platform_users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

        Ok(user)
    }

    #[tracing::instrument(skip(self, selector), fields(group = %selector.group()))]
    async fn resolve_audience(
        &self,
        selector: &AudienceSelector,
    ) -> Result<Vec<UserProfile>, RepositoryError> {
        tracing::debug!("resolving broadcast audience");

        let users = match selector {
            AudienceSelector::All => {
                sqlx::query_as::<_, UserProfile>(
                    r#"
                    SELECT id, email, name, role, admin, suspended, email_system_announcements
                    FROM platform_users
                    WHERE NOT suspended
                    "#,
                )
                .fetch_all(&self.pool)
                .await
            }
            AudienceSelector::Admins => {
                sqlx::query_as::<_, UserProfile>(
                    r#"
                    SELECT id, email, name, role, admin, suspended, email_system_announcements
                    FROM platform_users
                    WHERE admin AND NOT suspended
                    "#,
                )
                .fetch_all(&self.pool)
                .await
            }
            AudienceSelector::Vas(filters) => {
                sqlx::query_as::<_, UserProfile>(
                    r#"
                    SELECT u.id, u.email, u.name, u.role, u.admin, u.suspended, u.email_system_announcements
                    FROM platform_users u
                    JOIN va_profiles p ON p.user_id = u.id
                    WHERE ($1::text IS NULL OR p.search_status = $1)
                      AND ($2::text IS NULL OR p.status = $2)
                    "#,
                )
                .bind(filters.search_status.as_deref())
                .bind(filters.status.as_deref())
                .fetch_all(&self.pool)
                .await
            }
            AudienceSelector::Businesses(filters) => {
                sqlx::query_as::<_, UserProfile>(
                    r#"
                    SELECT u.id, u.email, u.name, u.role, u.admin, u.suspended, u.email_system_announcements
                    FROM platform_users u
                    JOIN business_profiles p ON p.user_id = u.id
                    WHERE ($1::text IS NULL OR p.industry = $1)
                      AND ($2::text IS NULL OR p.company_size = $2)
                    "#,
                )
                .bind(filters.industry.as_deref())
                .bind(filters.company_size.as_deref())
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

        tracing::debug!(count = users.len(), "audience resolved");
        Ok(users)
    }

    #[tracing::instrument(skip(self), fields(audience = %audience))]
    async fn audience_size(&self, audience: TargetAudience) -> Result<i64, RepositoryError> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM platform_users
            WHERE NOT suspended
              AND ($1::text = 'all' OR role::text = $1)
            "#,
        )
        .bind(audience.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

        Ok(count)
    }
}

pub struct PostgresScheduledNotificationRepository {
    pool: PgPool,
}

impl PostgresScheduledNotificationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl ScheduledNotificationRepository for PostgresScheduledNotificationRepository {
    #[tracing::instrument(skip(self, scheduled), fields(scheduled_id = %scheduled.id, scheduled_for = %scheduled.scheduled_for))]
    async fn create(&self, scheduled: &ScheduledNotification) -> Result<(), RepositoryError> {
        tracing::debug!("recording scheduled notification");

        sqlx::query(
            r#"
            INSERT INTO scheduled_notifications
                (id, scheduled_for, target_users, target_group, title, message, kind,
                 priority, send_email, created_by, status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(scheduled.id)
        .bind(scheduled.scheduled_for)
        .bind(&scheduled.target_users)
        .bind(scheduled.target_group)
        .bind(&scheduled.title)
        .bind(&scheduled.message)
        .bind(scheduled.kind)
        .bind(scheduled.priority)
        .bind(scheduled.send_email)
        .bind(scheduled.created_by)
        .bind(scheduled.status)
        .bind(scheduled.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

        tracing::debug!(scheduled_id = %scheduled.id, "scheduled notification recorded");
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn list_pending(&self) -> Result<Vec<ScheduledNotification>, RepositoryError> {
        let rows = sqlx::query_as::<_, ScheduledNotification>(
            r#"
            SELECT id, scheduled_for, target_users, target_group, title, message, kind,
                   priority, send_email, created_by, status, created_at
            FROM scheduled_notifications
            WHERE status = 'scheduled'
            ORDER BY scheduled_for ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

        Ok(rows)
    }
}

pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
}
