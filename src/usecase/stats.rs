use std::collections::BTreeMap;

use serde::Serialize;
use uuid::Uuid;

use crate::domain::announcement::{Priority, TargetAudience};
use crate::domain::announcement_read::ReadStats;
use crate::domain::notification::DateRange;
use crate::usecase::contracts::{
    AnnouncementReadRepository, AnnouncementRepository, NotificationRepository, UserDirectory,
};
use crate::usecase::error::UsecaseError;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationStats {
    pub total: i64,
    pub read: i64,
    pub unread: i64,
    pub read_rate_pct: f64,
    pub by_kind: BTreeMap<String, i64>,
    pub by_priority: BTreeMap<String, i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArchivedStats {
    pub total_archived: i64,
    pub by_kind: BTreeMap<String, i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnnouncementReach {
    pub announcement_id: Uuid,
    pub title: String,
    pub priority: Priority,
    pub target_audience: TargetAudience,
    #[serde(flatten)]
    pub stats: ReadStats,
    pub unique_readers: i64,
    pub target_audience_size: i64,
    pub reach_pct: f64,
}

pub struct StatsAggregator<N, A, R, D>
where
    N: NotificationRepository,
    A: AnnouncementRepository,
    R: AnnouncementReadRepository,
    D: UserDirectory,
{
    notification_repository: N,
    announcement_repository: A,
    read_repository: R,
    user_directory: D,
}

impl<N, A, R, D> StatsAggregator<N, A, R, D>
where
    N: NotificationRepository,
    A: AnnouncementRepository,
    R: AnnouncementReadRepository,
    D: UserDirectory,
{
    pub fn new(
        notification_repository: N,
        announcement_repository: A,
        read_repository: R,
        user_directory: D,
    ) -> Self {
        Self {
            notification_repository,
            announcement_repository,
            read_repository,
            user_directory,
        }
    }

    #[tracing::instrument(skip(self, range))]
    pub async fn notification_stats(
        &self,
        range: DateRange,
    ) -> Result<NotificationStats, UsecaseError> {
        tracing::debug!("computing notification stats");

        let total = self.notification_repository.count_in_range(&range).await?;
        let read = self
            .notification_repository
            .count_read_in_range(&range)
            .await?;
        let by_kind = self
            .notification_repository
            .count_grouped_by_kind(&range)
            .await?;
        let by_priority = self
            .notification_repository
            .count_grouped_by_priority(&range)
            .await?;

        let read_rate_pct = if total > 0 {
            (read as f64 / total as f64 * 10_000.0).round() / 100.0
        } else {
            0.0
        };

        tracing::debug!(total, read, read_rate_pct, "notification stats computed");
        Ok(NotificationStats {
            total,
            read,
            unread: total - read,
            read_rate_pct,
            by_kind: by_kind.into_iter().map(|g| (g.key, g.count)).collect(),
            by_priority: by_priority.into_iter().map(|g| (g.key, g.count)).collect(),
        })
    }

    #[tracing::instrument(skip(self, range), fields(?user_id))]
    pub async fn archived_stats(
        &self,
        range: DateRange,
        user_id: Option<Uuid>,
    ) -> Result<ArchivedStats, UsecaseError> {
        tracing::debug!("computing archived stats");

        let total_archived = self
            .notification_repository
            .count_archived(&range, user_id)
            .await?;
        let by_kind = self
            .notification_repository
            .count_archived_grouped_by_kind(&range, user_id)
            .await?;

        Ok(ArchivedStats {
            total_archived,
            by_kind: by_kind.into_iter().map(|g| (g.key, g.count)).collect(),
        })
    }

    /// Reach of one announcement: ledger stats plus the share of its target
    /// audience that has read it. The audience size comes from the same
    /// role-based resolution the broadcast path uses.
    #[tracing::instrument(skip(self), fields(announcement_id = %announcement_id))]
    pub async fn announcement_reach(
        &self,
        announcement_id: Uuid,
    ) -> Result<AnnouncementReach, UsecaseError> {
        tracing::debug!("computing announcement reach");

        let announcement = self
            .announcement_repository
            .find_by_id(announcement_id)
            .await?
            .ok_or_else(|| UsecaseError::NotFound("Announcement".to_string()))?;

        let stats = self.read_repository.stats_for(announcement_id).await?;
        let unique_readers = self.read_repository.unique_readers(announcement_id).await?;
        let target_audience_size = self
            .user_directory
            .audience_size(announcement.target_audience)
            .await?;

        let reach_pct = if target_audience_size > 0 {
            (unique_readers as f64 / target_audience_size as f64 * 10_000.0).round() / 100.0
        } else {
            0.0
        };

        tracing::debug!(unique_readers, target_audience_size, reach_pct, "reach computed");
        Ok(AnnouncementReach {
            announcement_id: announcement.id,
            title: announcement.title,
            priority: announcement.priority,
            target_audience: announcement.target_audience,
            stats,
            unique_readers,
            target_audience_size,
            reach_pct,
        })
    }
}
