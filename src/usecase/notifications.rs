use serde_json::json;
use uuid::Uuid;

use crate::domain::notification::{Notification, NotificationFilter, NotificationParams};
use crate::usecase::contracts::{
    NotificationRepository, PushChannel, PushEvent, UserDirectory,
};
use crate::usecase::error::UsecaseError;

/// Shared admin feed; read/delete events for administrators are mirrored
/// here so every connected admin console stays in sync.
pub const ADMIN_ROOM: &str = "admin-notifications";

pub struct NotificationsUseCase<N, D, P>
where
    N: NotificationRepository,
    D: UserDirectory,
    P: PushChannel,
{
    notification_repository: N,
    user_directory: D,
    push: P,
}

impl<N, D, P> NotificationsUseCase<N, D, P>
where
    N: NotificationRepository,
    D: UserDirectory,
    P: PushChannel,
{
    pub fn new(notification_repository: N, user_directory: D, push: P) -> Self {
        Self {
            notification_repository,
            user_directory,
            push,
        }
    }

    pub fn notification_repository(&self) -> &N {
        &self.notification_repository
    }

    #[tracing::instrument(skip(self, params), fields(recipient_id = %recipient_id))]
    pub async fn create(
        &self,
        recipient_id: Uuid,
        params: NotificationParams,
    ) -> Result<Notification, UsecaseError> {
        tracing::debug!("creating notification");

        let notification = Notification::new(recipient_id, params);
        self.notification_repository.create(&notification).await?;

        tracing::info!(notification_id = %notification.id, recipient_id = %recipient_id, "notification created");
        Ok(notification)
    }

    #[tracing::instrument(skip(self, filter), fields(recipient_id = %recipient_id, %limit, %offset))]
    pub async fn list(
        &self,
        recipient_id: Uuid,
        filter: NotificationFilter,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Notification>, i64), UsecaseError> {
        tracing::debug!("listing notifications");

        let notifications = self
            .notification_repository
            .find_by_recipient(recipient_id, &filter, limit, offset)
            .await?;
        let total = self
            .notification_repository
            .count_by_recipient(recipient_id, &filter)
            .await?;

        tracing::debug!(count = notifications.len(), total, "notifications listed");
        Ok((notifications, total))
    }

    #[tracing::instrument(skip(self, ids), fields(recipient_id = %recipient_id, id_count = ids.len()))]
    pub async fn mark_read(
        &self,
        ids: Vec<Uuid>,
        recipient_id: Uuid,
    ) -> Result<u64, UsecaseError> {
        if ids.is_empty() {
            return Err(UsecaseError::Validation(
                "No notification ids provided".to_string(),
            ));
        }
        tracing::debug!("marking notifications as read");

        let marked = self
            .notification_repository
            .mark_read(&ids, recipient_id)
            .await?;
        let unread_count = self.notification_repository.unread_count(recipient_id).await?;

        let payload = json!({
            "notificationIds": ids,
            "unreadCount": unread_count,
        });
        self.push
            .emit_to_user(recipient_id, PushEvent::NotificationRead, payload.clone())
            .await;
        self.mirror_to_admin_room(recipient_id, PushEvent::NotificationRead, payload)
            .await;

        tracing::info!(marked, unread_count, "notifications marked as read");
        Ok(marked)
    }

    #[tracing::instrument(skip(self), fields(recipient_id = %recipient_id))]
    pub async fn mark_all_read(&self, recipient_id: Uuid) -> Result<Vec<Uuid>, UsecaseError> {
        tracing::debug!("marking all notifications as read");

        let ids = self.notification_repository.mark_all_read(recipient_id).await?;

        let payload = json!({
            "notificationIds": ids,
            "unreadCount": 0,
        });
        self.push
            .emit_to_user(recipient_id, PushEvent::AllNotificationsRead, payload.clone())
            .await;
        self.mirror_to_admin_room(recipient_id, PushEvent::AllNotificationsRead, payload)
            .await;

        tracing::info!(marked = ids.len(), "all notifications marked as read");
        Ok(ids)
    }

    #[tracing::instrument(skip(self), fields(notification_id = %id, recipient_id = %recipient_id))]
    pub async fn delete(&self, id: Uuid, recipient_id: Uuid) -> Result<(), UsecaseError> {
        tracing::debug!("deleting notification");

        self.notification_repository
            .delete_owned(id, recipient_id)
            .await
            .map_err(|e| match e {
                crate::repository::errors::RepositoryError::NotFound => {
                    UsecaseError::NotFound("Notification".to_string())
                }
                other => other.into(),
            })?;

        let unread_count = self.notification_repository.unread_count(recipient_id).await?;

        let payload = json!({
            "notificationId": id,
            "unreadCount": unread_count,
        });
        self.push
            .emit_to_user(recipient_id, PushEvent::NotificationDeleted, payload.clone())
            .await;
        self.mirror_to_admin_room(recipient_id, PushEvent::NotificationDeleted, payload)
            .await;

        tracing::info!(notification_id = %id, "notification deleted");
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(recipient_id = %recipient_id))]
    pub async fn unread_count(&self, recipient_id: Uuid) -> Result<i64, UsecaseError> {
        let count = self.notification_repository.unread_count(recipient_id).await?;
        Ok(count)
    }

    #[tracing::instrument(skip(self), fields(recipient_id = %recipient_id))]
    pub async fn archived_count(&self, recipient_id: Uuid) -> Result<i64, UsecaseError> {
        let count = self.notification_repository.archived_count(recipient_id).await?;
        Ok(count)
    }

    async fn mirror_to_admin_room(
        &self,
        recipient_id: Uuid,
        event: PushEvent,
        payload: serde_json::Value,
    ) {
        match self.user_directory.find_by_id(recipient_id).await {
            Ok(Some(user)) if user.admin => {
                self.push.emit_to_room(ADMIN_ROOM, event, payload).await;
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(recipient_id = %recipient_id, error = %e, "admin lookup failed, skipping admin room event");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::user::{UserProfile, UserRole};
    use crate::usecase::contracts::{
        MockNotificationRepository, MockPushChannel, MockUserDirectory,
    };

    fn make_user(id: Uuid, admin: bool) -> UserProfile {
        UserProfile {
            id,
            email: "user@example.com".to_string(),
            name: None,
            role: UserRole::Va,
            admin,
            suspended: false,
            email_system_announcements: true,
        }
    }

    #[tokio::test]
    async fn test_create_persists_with_derived_kind() {
        let mut repo = MockNotificationRepository::new();
        let directory = MockUserDirectory::new();
        let push = MockPushChannel::new();
        let recipient_id = Uuid::new_v4();

        repo.expect_create()
            .withf(move |n| {
                n.recipient_id == recipient_id
                    && n.kind == crate::domain::notification::NotificationKind::ProfileView
                    && n.read_at.is_none()
            })
            .times(1)
            .returning(|_| Ok(()));

        let usecase = NotificationsUseCase::new(repo, directory, push);
        let notification = usecase
            .create(
                recipient_id,
                NotificationParams::ProfileView {
                    viewer_id: Uuid::new_v4(),
                    viewer_role: UserRole::Business,
                },
            )
            .await
            .unwrap();

        assert!(!notification.archived);
    }

    #[tokio::test]
    async fn test_mark_read_emits_event_with_unread_count() {
        let mut repo = MockNotificationRepository::new();
        let mut directory = MockUserDirectory::new();
        let mut push = MockPushChannel::new();
        let recipient_id = Uuid::new_v4();
        let ids = vec![Uuid::new_v4(), Uuid::new_v4()];

        repo.expect_mark_read().times(1).returning(|_, _| Ok(2));
        repo.expect_unread_count().times(1).returning(|_| Ok(3));
        directory
            .expect_find_by_id()
            .times(1)
            .returning(move |id| Ok(Some(make_user(id, false))));
        push.expect_emit_to_user()
            .withf(move |user_id, event, payload| {
                *user_id == recipient_id
                    && *event == PushEvent::NotificationRead
                    && payload["unreadCount"] == 3
            })
            .times(1)
            .returning(|_, _, _| ());

        let usecase = NotificationsUseCase::new(repo, directory, push);
        let marked = usecase.mark_read(ids, recipient_id).await.unwrap();

        assert_eq!(marked, 2);
    }

    #[tokio::test]
    async fn test_mark_read_rejects_empty_ids() {
        let repo = MockNotificationRepository::new();
        let directory = MockUserDirectory::new();
        let push = MockPushChannel::new();

        let usecase = NotificationsUseCase::new(repo, directory, push);
        let result = usecase.mark_read(vec![], Uuid::new_v4()).await;

        assert!(matches!(result, Err(UsecaseError::Validation(_))));
    }

    #[tokio::test]
    async fn test_mark_all_read_reports_zero_unread() {
        let mut repo = MockNotificationRepository::new();
        let mut directory = MockUserDirectory::new();
        let mut push = MockPushChannel::new();
        let recipient_id = Uuid::new_v4();
        let ids = vec![Uuid::new_v4()];
        let returned = ids.clone();

        repo.expect_mark_all_read()
            .times(1)
            .returning(move |_| Ok(returned.clone()));
        directory
            .expect_find_by_id()
            .returning(move |id| Ok(Some(make_user(id, false))));
        push.expect_emit_to_user()
            .withf(|_, event, payload| {
                *event == PushEvent::AllNotificationsRead && payload["unreadCount"] == 0
            })
            .times(1)
            .returning(|_, _, _| ());

        let usecase = NotificationsUseCase::new(repo, directory, push);
        let marked = usecase.mark_all_read(recipient_id).await.unwrap();

        assert_eq!(marked, ids);
    }

    #[tokio::test]
    async fn test_mark_read_mirrors_to_admin_room_for_admins() {
        let mut repo = MockNotificationRepository::new();
        let mut directory = MockUserDirectory::new();
        let mut push = MockPushChannel::new();
        let recipient_id = Uuid::new_v4();

        repo.expect_mark_read().returning(|_, _| Ok(1));
        repo.expect_unread_count().returning(|_| Ok(0));
        directory
            .expect_find_by_id()
            .returning(move |id| Ok(Some(make_user(id, true))));
        push.expect_emit_to_user().times(1).returning(|_, _, _| ());
        push.expect_emit_to_room()
            .withf(|room, event, _| room == ADMIN_ROOM && *event == PushEvent::NotificationRead)
            .times(1)
            .returning(|_, _, _| ());

        let usecase = NotificationsUseCase::new(repo, directory, push);
        usecase
            .mark_read(vec![Uuid::new_v4()], recipient_id)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_delete_not_owned_is_not_found() {
        let mut repo = MockNotificationRepository::new();
        let directory = MockUserDirectory::new();
        let push = MockPushChannel::new();

        repo.expect_delete_owned()
            .times(1)
            .returning(|_, _| Err(crate::repository::errors::RepositoryError::NotFound));

        let usecase = NotificationsUseCase::new(repo, directory, push);
        let result = usecase.delete(Uuid::new_v4(), Uuid::new_v4()).await;

        assert!(matches!(result, Err(UsecaseError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_emits_deleted_event() {
        let mut repo = MockNotificationRepository::new();
        let mut directory = MockUserDirectory::new();
        let mut push = MockPushChannel::new();
        let notification_id = Uuid::new_v4();

        repo.expect_delete_owned().times(1).returning(|_, _| Ok(()));
        repo.expect_unread_count().times(1).returning(|_| Ok(5));
        directory
            .expect_find_by_id()
            .returning(move |id| Ok(Some(make_user(id, false))));
        push.expect_emit_to_user()
            .withf(move |_, event, payload| {
                *event == PushEvent::NotificationDeleted
                    && payload["notificationId"] == notification_id.to_string()
                    && payload["unreadCount"] == 5
            })
            .times(1)
            .returning(|_, _, _| ());

        let usecase = NotificationsUseCase::new(repo, directory, push);
        usecase.delete(notification_id, Uuid::new_v4()).await.unwrap();
    }
}
