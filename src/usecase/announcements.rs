use serde::Serialize;
use uuid::Uuid;

use crate::domain::announcement::{
    AdminAnnouncementRow, AdminFilter, Announcement, AnnouncementDraft, AnnouncementPatch,
    AnnouncementWithReadState, VisibleFilter,
};
use crate::domain::user::Viewer;
use crate::usecase::contracts::AnnouncementRepository;
use crate::usecase::error::UsecaseError;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UnreadAnnouncements {
    pub total: i64,
    pub urgent: i64,
    pub high: i64,
    pub normal: i64,
    pub low: i64,
}

pub struct AnnouncementsUseCase<A>
where
    A: AnnouncementRepository,
{
    announcement_repository: A,
}

impl<A> AnnouncementsUseCase<A>
where
    A: AnnouncementRepository,
{
    pub fn new(announcement_repository: A) -> Self {
        Self {
            announcement_repository,
        }
    }

    #[tracing::instrument(skip(self, draft), fields(created_by = %created_by))]
    pub async fn create(
        &self,
        created_by: Uuid,
        draft: AnnouncementDraft,
    ) -> Result<Announcement, UsecaseError> {
        if draft.title.trim().is_empty() {
            return Err(UsecaseError::Validation("Title is required".to_string()));
        }
        if draft.content.trim().is_empty() {
            return Err(UsecaseError::Validation("Content is required".to_string()));
        }
        tracing::debug!("creating announcement");

        let announcement = Announcement::new(created_by, draft);
        self.announcement_repository.create(&announcement).await?;

        tracing::info!(announcement_id = %announcement.id, "announcement created");
        Ok(announcement)
    }

    #[tracing::instrument(skip(self, filter), fields(user_id = %viewer.id, %limit, %offset))]
    pub async fn list_visible_for(
        &self,
        viewer: &Viewer,
        filter: VisibleFilter,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<AnnouncementWithReadState>, i64), UsecaseError> {
        tracing::debug!("listing visible announcements");

        let rows = self
            .announcement_repository
            .list_visible(viewer.id, viewer.role, viewer.admin, &filter, limit, offset)
            .await?;
        let total = self
            .announcement_repository
            .count_visible(viewer.id, viewer.role, viewer.admin, &filter)
            .await?;

        tracing::debug!(count = rows.len(), total, "visible announcements listed");
        Ok((rows, total))
    }

    #[tracing::instrument(skip(self, filter), fields(%limit, %offset))]
    pub async fn list_all_for_admin(
        &self,
        filter: AdminFilter,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<AdminAnnouncementRow>, i64), UsecaseError> {
        tracing::debug!("listing announcements for admin");

        let rows = self
            .announcement_repository
            .list_admin(&filter, limit, offset)
            .await?;
        let total = self.announcement_repository.count_admin(&filter).await?;

        tracing::debug!(count = rows.len(), total, "admin announcements listed");
        Ok((rows, total))
    }

    #[tracing::instrument(skip(self, patch), fields(announcement_id = %id))]
    pub async fn update(
        &self,
        id: Uuid,
        patch: AnnouncementPatch,
    ) -> Result<Announcement, UsecaseError> {
        tracing::debug!("updating announcement");

        let mut announcement = self
            .announcement_repository
            .find_by_id(id)
            .await?
            .ok_or_else(|| UsecaseError::NotFound("Announcement".to_string()))?;

        announcement.apply_patch(patch);
        self.announcement_repository.update(&announcement).await?;

        tracing::info!(announcement_id = %id, "announcement updated");
        Ok(announcement)
    }

    #[tracing::instrument(skip(self), fields(announcement_id = %id))]
    pub async fn delete(&self, id: Uuid) -> Result<(), UsecaseError> {
        tracing::debug!("deleting announcement");

        self.announcement_repository
            .find_by_id(id)
            .await?
            .ok_or_else(|| UsecaseError::NotFound("Announcement".to_string()))?;

        self.announcement_repository.delete(id).await?;

        tracing::info!(announcement_id = %id, "announcement deleted with its read records");
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub async fn archive_expired(&self) -> Result<u64, UsecaseError> {
        tracing::debug!("running expired announcement sweep");

        let archived = self.announcement_repository.archive_expired().await?;

        tracing::info!(archived, "expired announcements archived");
        Ok(archived)
    }

    #[tracing::instrument(skip(self), fields(user_id = %viewer.id))]
    pub async fn unread_count(&self, viewer: &Viewer) -> Result<UnreadAnnouncements, UsecaseError> {
        tracing::debug!("counting unread announcements");

        let groups = self
            .announcement_repository
            .unread_counts_by_priority(viewer.id, viewer.role, viewer.admin)
            .await?;

        let mut unread = UnreadAnnouncements::default();
        for group in groups {
            unread.total += group.count;
            match group.key.as_str() {
                "urgent" => unread.urgent = group.count,
                "high" => unread.high = group.count,
                "normal" => unread.normal = group.count,
                "low" => unread.low = group.count,
                other => {
                    tracing::warn!(priority = other, "unexpected priority bucket");
                }
            }
        }

        tracing::debug!(total = unread.total, "unread announcements counted");
        Ok(unread)
    }
}
