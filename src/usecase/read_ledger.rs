use uuid::Uuid;

use crate::domain::announcement_read::{AnnouncementRead, DeviceInfo, Interaction, ReadStats};
use crate::domain::user::Viewer;
use crate::usecase::contracts::{AnnouncementReadRepository, AnnouncementRepository};
use crate::usecase::error::UsecaseError;

pub struct ReadLedgerUseCase<A, R>
where
    A: AnnouncementRepository,
    R: AnnouncementReadRepository,
{
    announcement_repository: A,
    read_repository: R,
}

impl<A, R> ReadLedgerUseCase<A, R>
where
    A: AnnouncementRepository,
    R: AnnouncementReadRepository,
{
    pub fn new(announcement_repository: A, read_repository: R) -> Self {
        Self {
            announcement_repository,
            read_repository,
        }
    }

    /// Records that `viewer` has read an announcement. Safe to call
    /// repeatedly and concurrently: the first call inserts the ledger row,
    /// every later call refreshes it, and a lost insert race is recovered
    /// by re-fetching the winner's row instead of erroring.
    #[tracing::instrument(skip(self, device), fields(announcement_id = %announcement_id, user_id = %viewer.id, ?interaction, %time_spent_secs))]
    pub async fn mark_as_read(
        &self,
        announcement_id: Uuid,
        viewer: &Viewer,
        interaction: Option<Interaction>,
        time_spent_secs: i64,
        device: Option<DeviceInfo>,
    ) -> Result<AnnouncementRead, UsecaseError> {
        if time_spent_secs < 0 {
            return Err(UsecaseError::Validation(
                "time_spent cannot be negative".to_string(),
            ));
        }

        let announcement = self
            .announcement_repository
            .find_by_id(announcement_id)
            .await?
            .ok_or_else(|| UsecaseError::NotFound("Announcement".to_string()))?;

        if !announcement.can_be_viewed_by(viewer) {
            return Err(UsecaseError::Forbidden(
                "You do not have permission to view this announcement".to_string(),
            ));
        }

        if let Some(existing) = self
            .read_repository
            .find(announcement_id, viewer.id)
            .await?
        {
            tracing::debug!(read_id = %existing.id, "revisit, refreshing read record");
            let updated = self
                .read_repository
                .touch(existing.id, interaction, time_spent_secs)
                .await?;
            return Ok(updated);
        }

        let record = AnnouncementRead::new(
            announcement_id,
            viewer.id,
            interaction.unwrap_or(Interaction::Viewed),
            time_spent_secs,
            device,
        );

        let inserted = self.read_repository.insert_if_absent(&record).await?;
        if inserted {
            // Separate write from the insert; on failure the receipt stands
            // and total_reads drifts until recomputed from the ledger.
            if let Err(e) = self
                .announcement_repository
                .increment_total_reads(announcement_id)
                .await
            {
                tracing::warn!(announcement_id = %announcement_id, error = %e, "failed to bump total_reads counter");
            }
            tracing::info!(read_id = %record.id, "first read recorded");
            return Ok(record);
        }

        // A concurrent request won the insert race; return its row.
        tracing::debug!("lost insert race, fetching existing read record");
        self.read_repository
            .find(announcement_id, viewer.id)
            .await?
            .ok_or_else(|| {
                UsecaseError::Internal("read record missing after conflicting insert".to_string())
            })
    }

    #[tracing::instrument(skip(self), fields(announcement_id = %announcement_id, user_id = %user_id))]
    pub async fn has_read(
        &self,
        announcement_id: Uuid,
        user_id: Uuid,
    ) -> Result<bool, UsecaseError> {
        let existing = self.read_repository.find(announcement_id, user_id).await?;
        Ok(existing.is_some())
    }

    #[tracing::instrument(skip(self), fields(announcement_id = %announcement_id))]
    pub async fn stats_for(&self, announcement_id: Uuid) -> Result<ReadStats, UsecaseError> {
        let stats = self.read_repository.stats_for(announcement_id).await?;
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::announcement::{
        Announcement, AnnouncementDraft, Category, Priority, TargetAudience,
    };
    use crate::domain::user::UserRole;
    use crate::usecase::contracts::{
        MockAnnouncementReadRepository, MockAnnouncementRepository,
    };
    use chrono::Utc;

    fn make_announcement(audience: TargetAudience) -> Announcement {
        Announcement::new(
            Uuid::new_v4(),
            AnnouncementDraft {
                title: "Welcome".to_string(),
                content: "Hello".to_string(),
                target_audience: audience,
                priority: Priority::Normal,
                publish_at: None,
                expires_at: None,
                category: Category::General,
                tags: vec![],
            },
        )
    }

    fn va_viewer() -> Viewer {
        Viewer::new(Uuid::new_v4(), Some(UserRole::Va), false)
    }

    #[tokio::test]
    async fn test_first_read_inserts_and_bumps_counter() {
        let mut ann_repo = MockAnnouncementRepository::new();
        let mut read_repo = MockAnnouncementReadRepository::new();
        let announcement = make_announcement(TargetAudience::All);
        let announcement_id = announcement.id;

        ann_repo
            .expect_find_by_id()
            .returning(move |_| Ok(Some(announcement.clone())));
        read_repo.expect_find().times(1).returning(|_, _| Ok(None));
        read_repo
            .expect_insert_if_absent()
            .times(1)
            .returning(|_| Ok(true));
        ann_repo
            .expect_increment_total_reads()
            .with(mockall::predicate::eq(announcement_id))
            .times(1)
            .returning(|_| Ok(()));

        let usecase = ReadLedgerUseCase::new(ann_repo, read_repo);
        let record = usecase
            .mark_as_read(announcement_id, &va_viewer(), Some(Interaction::Viewed), 30, None)
            .await
            .unwrap();

        assert_eq!(record.announcement_id, announcement_id);
        assert_eq!(record.interaction, Interaction::Viewed);
        assert_eq!(record.time_spent_secs, 30);
    }

    #[tokio::test]
    async fn test_revisit_touches_without_counter_bump() {
        let mut ann_repo = MockAnnouncementRepository::new();
        let mut read_repo = MockAnnouncementReadRepository::new();
        let announcement = make_announcement(TargetAudience::All);
        let announcement_id = announcement.id;
        let viewer = va_viewer();
        let existing =
            AnnouncementRead::new(announcement_id, viewer.id, Interaction::Viewed, 30, None);
        let existing_id = existing.id;
        let found = existing.clone();

        ann_repo
            .expect_find_by_id()
            .returning(move |_| Ok(Some(announcement.clone())));
        read_repo
            .expect_find()
            .times(1)
            .returning(move |_, _| Ok(Some(found.clone())));
        read_repo
            .expect_touch()
            .withf(move |id, interaction, secs| {
                *id == existing_id && *interaction == Some(Interaction::Clicked) && *secs == 20
            })
            .times(1)
            .returning(move |id, interaction, secs| {
                let mut updated = existing.clone();
                updated.id = id;
                updated.interaction = interaction.unwrap();
                updated.time_spent_secs += secs;
                updated.read_at = Utc::now();
                Ok(updated)
            });
        // No increment_total_reads expectation: a revisit must not bump it.

        let usecase = ReadLedgerUseCase::new(ann_repo, read_repo);
        let record = usecase
            .mark_as_read(announcement_id, &viewer, Some(Interaction::Clicked), 20, None)
            .await
            .unwrap();

        assert_eq!(record.interaction, Interaction::Clicked);
        assert_eq!(record.time_spent_secs, 50);
    }

    #[tokio::test]
    async fn test_lost_insert_race_returns_existing_row() {
        let mut ann_repo = MockAnnouncementRepository::new();
        let mut read_repo = MockAnnouncementReadRepository::new();
        let announcement = make_announcement(TargetAudience::All);
        let announcement_id = announcement.id;
        let viewer = va_viewer();
        let winner =
            AnnouncementRead::new(announcement_id, viewer.id, Interaction::Viewed, 10, None);
        let winner_clone = winner.clone();

        ann_repo
            .expect_find_by_id()
            .returning(move |_| Ok(Some(announcement.clone())));
        // First lookup sees nothing, insert loses the race, second lookup
        // finds the concurrent winner's row.
        let mut seq = mockall::Sequence::new();
        read_repo
            .expect_find()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(None));
        read_repo
            .expect_insert_if_absent()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(false));
        read_repo
            .expect_find()
            .times(1)
            .in_sequence(&mut seq)
            .returning(move |_, _| Ok(Some(winner_clone.clone())));

        let usecase = ReadLedgerUseCase::new(ann_repo, read_repo);
        let record = usecase
            .mark_as_read(announcement_id, &viewer, None, 0, None)
            .await
            .unwrap();

        assert_eq!(record.id, winner.id);
    }

    #[tokio::test]
    async fn test_mark_as_read_unknown_announcement() {
        let mut ann_repo = MockAnnouncementRepository::new();
        let read_repo = MockAnnouncementReadRepository::new();

        ann_repo.expect_find_by_id().returning(|_| Ok(None));

        let usecase = ReadLedgerUseCase::new(ann_repo, read_repo);
        let result = usecase
            .mark_as_read(Uuid::new_v4(), &va_viewer(), None, 0, None)
            .await;

        assert!(matches!(result, Err(UsecaseError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_mark_as_read_wrong_audience_is_forbidden() {
        let mut ann_repo = MockAnnouncementRepository::new();
        let read_repo = MockAnnouncementReadRepository::new();
        let announcement = make_announcement(TargetAudience::Business);

        ann_repo
            .expect_find_by_id()
            .returning(move |_| Ok(Some(announcement.clone())));

        let usecase = ReadLedgerUseCase::new(ann_repo, read_repo);
        let result = usecase
            .mark_as_read(Uuid::new_v4(), &va_viewer(), None, 0, None)
            .await;

        assert!(matches!(result, Err(UsecaseError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_mark_as_read_rejects_negative_time() {
        let ann_repo = MockAnnouncementRepository::new();
        let read_repo = MockAnnouncementReadRepository::new();

        let usecase = ReadLedgerUseCase::new(ann_repo, read_repo);
        let result = usecase
            .mark_as_read(Uuid::new_v4(), &va_viewer(), None, -5, None)
            .await;

        assert!(matches!(result, Err(UsecaseError::Validation(_))));
    }

    #[tokio::test]
    async fn test_has_read() {
        let ann_repo = MockAnnouncementRepository::new();
        let mut read_repo = MockAnnouncementReadRepository::new();
        let announcement_id = Uuid::new_v4();
        let user_id = Uuid::new_v4();

        read_repo.expect_find().times(2).returning(move |aid, uid| {
            if uid == user_id {
                Ok(Some(AnnouncementRead::new(aid, uid, Interaction::Viewed, 0, None)))
            } else {
                Ok(None)
            }
        });

        let usecase = ReadLedgerUseCase::new(ann_repo, read_repo);
        assert!(usecase.has_read(announcement_id, user_id).await.unwrap());
        assert!(!usecase.has_read(announcement_id, Uuid::new_v4()).await.unwrap());
    }

    #[tokio::test]
    async fn test_stats_for_groups_interactions() {
        let ann_repo = MockAnnouncementRepository::new();
        let mut read_repo = MockAnnouncementReadRepository::new();

        read_repo.expect_stats_for().times(1).returning(|_| {
            Ok(ReadStats {
                total_reads: 10,
                avg_time_spent: 24.5,
                viewed: 7,
                clicked: 2,
                dismissed: 1,
            })
        });

        let usecase = ReadLedgerUseCase::new(ann_repo, read_repo);
        let stats = usecase.stats_for(Uuid::new_v4()).await.unwrap();

        assert_eq!(stats.total_reads, 10);
        assert_eq!(stats.viewed + stats.clicked + stats.dismissed, 10);
    }

    #[tokio::test]
    async fn test_counter_failure_does_not_fail_the_read() {
        let mut ann_repo = MockAnnouncementRepository::new();
        let mut read_repo = MockAnnouncementReadRepository::new();
        let announcement = make_announcement(TargetAudience::All);
        let announcement_id = announcement.id;

        ann_repo
            .expect_find_by_id()
            .returning(move |_| Ok(Some(announcement.clone())));
        read_repo.expect_find().returning(|_, _| Ok(None));
        read_repo.expect_insert_if_absent().returning(|_| Ok(true));
        ann_repo
            .expect_increment_total_reads()
            .returning(|_| Err(crate::repository::errors::RepositoryError::NotFound));

        let usecase = ReadLedgerUseCase::new(ann_repo, read_repo);
        let result = usecase
            .mark_as_read(announcement_id, &va_viewer(), None, 0, None)
            .await;

        assert!(result.is_ok());
    }
}
