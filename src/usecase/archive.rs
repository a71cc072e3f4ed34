use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::domain::notification::{BulkArchiveCriteria, RestoreCriteria};
use crate::usecase::contracts::NotificationRepository;
use crate::usecase::error::UsecaseError;

pub const DEFAULT_AUTO_ARCHIVE_DAYS: i64 = 30;

/// Archive lifecycle for notifications:
/// `Active(unread) ⇄ Active(read) → Archived → Active(read)`.
/// Archiving never clears `read_at`, so unarchiving restores the record
/// exactly as it was.
pub struct ArchiveManager<N>
where
    N: NotificationRepository,
{
    notification_repository: N,
}

impl<N> ArchiveManager<N>
where
    N: NotificationRepository,
{
    pub fn new(notification_repository: N) -> Self {
        Self {
            notification_repository,
        }
    }

    #[tracing::instrument(skip(self, ids), fields(owner = %owner, id_count = ids.len()))]
    pub async fn archive(&self, ids: Vec<Uuid>, owner: Uuid) -> Result<u64, UsecaseError> {
        if ids.is_empty() {
            return Err(UsecaseError::Validation(
                "No notification ids provided".to_string(),
            ));
        }

        let archived = self.notification_repository.archive_ids(&ids, owner).await?;

        tracing::info!(archived, "notifications archived");
        Ok(archived)
    }

    #[tracing::instrument(skip(self, ids), fields(owner = %owner, id_count = ids.len()))]
    pub async fn unarchive(&self, ids: Vec<Uuid>, owner: Uuid) -> Result<u64, UsecaseError> {
        if ids.is_empty() {
            return Err(UsecaseError::Validation(
                "No notification ids provided".to_string(),
            ));
        }

        let restored = self
            .notification_repository
            .unarchive_ids(&ids, owner)
            .await?;

        tracing::info!(restored, "notifications unarchived");
        Ok(restored)
    }

    #[tracing::instrument(skip(self, criteria))]
    pub async fn bulk_archive(&self, criteria: BulkArchiveCriteria) -> Result<u64, UsecaseError> {
        if criteria.is_empty() {
            return Err(UsecaseError::Validation(
                "Archive criteria required".to_string(),
            ));
        }

        let archived = self.notification_repository.bulk_archive(&criteria).await?;

        tracing::info!(archived, "bulk archive finished");
        Ok(archived)
    }

    #[tracing::instrument(skip(self, ids), fields(id_count = ids.len()))]
    pub async fn restore(&self, ids: Vec<Uuid>) -> Result<u64, UsecaseError> {
        if ids.is_empty() {
            return Err(UsecaseError::Validation(
                "No notification ids provided".to_string(),
            ));
        }

        let restored = self.notification_repository.restore_ids(&ids).await?;

        tracing::info!(restored, "archived notifications restored");
        Ok(restored)
    }

    #[tracing::instrument(skip(self, criteria))]
    pub async fn restore_by(&self, criteria: RestoreCriteria) -> Result<u64, UsecaseError> {
        if criteria.is_empty() {
            return Err(UsecaseError::Validation(
                "Restore criteria required".to_string(),
            ));
        }

        let restored = self.notification_repository.restore_by(&criteria).await?;

        tracing::info!(restored, "archived notifications restored by criteria");
        Ok(restored)
    }

    /// Periodic sweep: archives read notifications older than `days_old`
    /// (default 30). Unread notifications are never touched, no matter how
    /// old they are.
    #[tracing::instrument(skip(self))]
    pub async fn auto_archive_old(&self, days_old: Option<i64>) -> Result<u64, UsecaseError> {
        let days = days_old.unwrap_or(DEFAULT_AUTO_ARCHIVE_DAYS);
        if days <= 0 {
            return Err(UsecaseError::Validation(
                "days_old must be positive".to_string(),
            ));
        }

        let cutoff = Utc::now() - Duration::days(days);
        let archived = self
            .notification_repository
            .archive_read_before(cutoff)
            .await?;

        tracing::info!(archived, days, "auto-archive sweep finished");
        Ok(archived)
    }

    /// Irreversibly deletes every archived notification the user owns.
    #[tracing::instrument(skip(self), fields(user_id = %user_id))]
    pub async fn clear_archived_for_user(&self, user_id: Uuid) -> Result<u64, UsecaseError> {
        let deleted = self
            .notification_repository
            .delete_archived_for(user_id)
            .await?;

        tracing::info!(deleted, "archived notifications cleared");
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usecase::contracts::MockNotificationRepository;

    #[tokio::test]
    async fn test_archive_requires_ids() {
        let manager = ArchiveManager::new(MockNotificationRepository::new());
        let result = manager.archive(vec![], Uuid::new_v4()).await;
        assert!(matches!(result, Err(UsecaseError::Validation(_))));
    }

    #[tokio::test]
    async fn test_archive_scoped_to_owner() {
        let mut repo = MockNotificationRepository::new();
        let owner = Uuid::new_v4();
        repo.expect_archive_ids()
            .withf(move |_, o| *o == owner)
            .times(1)
            .returning(|ids, _| Ok(ids.len() as u64));

        let manager = ArchiveManager::new(repo);
        let archived = manager
            .archive(vec![Uuid::new_v4(), Uuid::new_v4()], owner)
            .await
            .unwrap();

        assert_eq!(archived, 2);
    }

    #[tokio::test]
    async fn test_bulk_archive_rejects_empty_criteria() {
        let manager = ArchiveManager::new(MockNotificationRepository::new());
        let result = manager.bulk_archive(BulkArchiveCriteria::default()).await;
        assert!(matches!(result, Err(UsecaseError::Validation(_))));
    }

    #[tokio::test]
    async fn test_auto_archive_uses_default_window() {
        let mut repo = MockNotificationRepository::new();
        repo.expect_archive_read_before()
            .withf(|cutoff| {
                let expected = Utc::now() - Duration::days(DEFAULT_AUTO_ARCHIVE_DAYS);
                (*cutoff - expected).num_seconds().abs() < 5
            })
            .times(1)
            .returning(|_| Ok(7));

        let manager = ArchiveManager::new(repo);
        let archived = manager.auto_archive_old(None).await.unwrap();

        assert_eq!(archived, 7);
    }

    #[tokio::test]
    async fn test_auto_archive_rejects_non_positive_days() {
        let manager = ArchiveManager::new(MockNotificationRepository::new());
        let result = manager.auto_archive_old(Some(0)).await;
        assert!(matches!(result, Err(UsecaseError::Validation(_))));
    }

    #[tokio::test]
    async fn test_restore_by_criteria() {
        let mut repo = MockNotificationRepository::new();
        repo.expect_restore_by().times(1).returning(|_| Ok(3));

        let manager = ArchiveManager::new(repo);
        let restored = manager
            .restore_by(RestoreCriteria {
                owner: Some(Uuid::new_v4()),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(restored, 3);
    }

    #[tokio::test]
    async fn test_clear_archived_for_user() {
        let mut repo = MockNotificationRepository::new();
        let user_id = Uuid::new_v4();
        repo.expect_delete_archived_for()
            .with(mockall::predicate::eq(user_id))
            .times(1)
            .returning(|_| Ok(4));

        let manager = ArchiveManager::new(repo);
        let deleted = manager.clear_archived_for_user(user_id).await.unwrap();

        assert_eq!(deleted, 4);
    }
}
