use chrono::Utc;
use futures::future::join_all;
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

use crate::domain::announcement::Priority;
use crate::domain::audience::{AudienceSelector, BroadcastFilters, TargetGroup};
use crate::domain::notification::{Notification, NotificationKind, NotificationParams};
use crate::domain::scheduled_notification::{ScheduleDraft, ScheduledNotification};
use crate::domain::user::UserProfile;
use crate::usecase::contracts::{
    Mailer, NotificationRepository, OutgoingEmail, PushChannel, PushEvent,
    ScheduledNotificationRepository, UserDirectory,
};
use crate::usecase::error::UsecaseError;
use crate::usecase::notifications::ADMIN_ROOM;

/// Broadcast emails go out in fixed-size batches, each awaited as a whole.
const EMAIL_BATCH_SIZE: usize = 50;

#[derive(Debug, Clone)]
pub struct NotificationContent {
    pub title: String,
    pub message: String,
    pub kind: NotificationKind,
    pub priority: Priority,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SendOptions {
    pub send_email: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SendFailure {
    pub user_id: Uuid,
    pub error: String,
}

/// Multi-status result of a targeted send: how many records were written,
/// who they went to, and which recipients failed and why.
#[derive(Debug, Clone, Serialize)]
pub struct TargetedSummary {
    pub notification_count: usize,
    pub recipients: Vec<Uuid>,
    pub failures: Vec<SendFailure>,
    pub emails_sent: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct BroadcastSummary {
    pub total_recipients: usize,
    pub emails_sent: usize,
    pub target_group: TargetGroup,
    pub priority: Priority,
    pub kind: NotificationKind,
}

pub struct FanoutDispatcher<N, D, S, P, M>
where
    N: NotificationRepository,
    D: UserDirectory,
    S: ScheduledNotificationRepository,
    P: PushChannel,
    M: Mailer,
{
    notification_repository: N,
    user_directory: D,
    scheduled_repository: S,
    push: P,
    mailer: M,
}

impl<N, D, S, P, M> FanoutDispatcher<N, D, S, P, M>
where
    N: NotificationRepository,
    D: UserDirectory,
    S: ScheduledNotificationRepository,
    P: PushChannel,
    M: Mailer,
{
    pub fn new(
        notification_repository: N,
        user_directory: D,
        scheduled_repository: S,
        push: P,
        mailer: M,
    ) -> Self {
        Self {
            notification_repository,
            user_directory,
            scheduled_repository,
            push,
            mailer,
        }
    }

    /// Fans an administrative message out to an explicit recipient list.
    /// Duplicate ids produce duplicate notifications; a failing recipient is
    /// recorded and skipped, never aborting the batch.
    #[tracing::instrument(skip(self, content, options), fields(actor = %actor, recipient_count = user_ids.len(), kind = %content.kind))]
    pub async fn send_targeted(
        &self,
        actor: Uuid,
        user_ids: &[Uuid],
        content: &NotificationContent,
        options: SendOptions,
    ) -> Result<TargetedSummary, UsecaseError> {
        if user_ids.is_empty() {
            return Err(UsecaseError::Validation("No users specified".to_string()));
        }
        tracing::info!("sending targeted notification");

        let mut recipients = Vec::new();
        let mut failures = Vec::new();
        let mut emails_sent = 0;

        for &user_id in user_ids {
            let params = build_params(content, actor, false, None)?;
            let notification = Notification::new(user_id, params);

            if let Err(e) = self.notification_repository.create(&notification).await {
                tracing::warn!(user_id = %user_id, error = %e, "skipping recipient, notification create failed");
                failures.push(SendFailure {
                    user_id,
                    error: e.to_string(),
                });
                continue;
            }
            recipients.push(user_id);

            self.push_new_notification(&notification).await;

            let user = match self.user_directory.find_by_id(user_id).await {
                Ok(user) => user,
                Err(e) => {
                    tracing::warn!(user_id = %user_id, error = %e, "recipient lookup failed");
                    None
                }
            };

            if let Some(user) = user {
                if user.admin {
                    self.push_to_admin_room(&notification).await;
                }
                if options.send_email {
                    let email = targeted_email(&user, content);
                    match self.mailer.send(&email).await {
                        Ok(()) => emails_sent += 1,
                        Err(e) => {
                            metrics::counter!("notification_emails_failed_total").increment(1);
                            tracing::warn!(user_id = %user_id, error = %e, "email send failed");
                        }
                    }
                }
            }
        }

        tracing::info!(
            notification_count = recipients.len(),
            failure_count = failures.len(),
            emails_sent,
            "targeted send finished"
        );
        Ok(TargetedSummary {
            notification_count: recipients.len(),
            recipients,
            failures,
            emails_sent,
        })
    }

    /// Resolves an audience from the target group and fans out to every
    /// member. Emails honor the per-user system-announcement preference and
    /// go out in batches of [`EMAIL_BATCH_SIZE`], each batch awaited as a
    /// whole with per-recipient failures swallowed.
    #[tracing::instrument(skip(self, filters, content, options), fields(actor = %actor, group = %target_group, kind = %content.kind))]
    pub async fn send_broadcast(
        &self,
        actor: Uuid,
        target_group: TargetGroup,
        filters: BroadcastFilters,
        content: &NotificationContent,
        options: SendOptions,
    ) -> Result<BroadcastSummary, UsecaseError> {
        let selector = AudienceSelector::build(target_group, filters)?;
        let users = self.user_directory.resolve_audience(&selector).await?;
        tracing::info!(audience_size = users.len(), "broadcasting notification");

        let mut total_recipients = 0;
        let mut email_jobs: Vec<OutgoingEmail> = Vec::new();

        for user in &users {
            let params = build_params(content, actor, true, Some(target_group))?;
            let notification = Notification::new(user.id, params);

            if let Err(e) = self.notification_repository.create(&notification).await {
                tracing::warn!(user_id = %user.id, error = %e, "skipping recipient, notification create failed");
                continue;
            }
            total_recipients += 1;

            self.push_new_notification(&notification).await;
            if user.admin {
                self.push_to_admin_room(&notification).await;
            }

            if options.send_email && user.wants_announcement_email() {
                email_jobs.push(broadcast_email(user, content, target_group));
            }
        }

        let mut emails_sent = 0;
        for batch in email_jobs.chunks(EMAIL_BATCH_SIZE) {
            let outcomes = join_all(batch.iter().map(|email| self.mailer.send(email))).await;
            for (email, outcome) in batch.iter().zip(outcomes) {
                match outcome {
                    Ok(()) => emails_sent += 1,
                    Err(e) => {
                        metrics::counter!("notification_emails_failed_total").increment(1);
                        tracing::warn!(to = %email.to, error = %e, "broadcast email failed");
                    }
                }
            }
        }

        tracing::info!(total_recipients, emails_sent, "broadcast finished");
        Ok(BroadcastSummary {
            total_recipients,
            emails_sent,
            target_group,
            priority: content.priority,
            kind: content.kind,
        })
    }

    /// Records the intent to send later. Dispatch at `scheduled_for` is the
    /// job of an external scheduler that calls back into
    /// [`send_targeted`](Self::send_targeted) / [`send_broadcast`](Self::send_broadcast).
    #[tracing::instrument(skip(self, draft), fields(actor = %actor, scheduled_for = %draft.scheduled_for))]
    pub async fn schedule(
        &self,
        actor: Uuid,
        draft: ScheduleDraft,
    ) -> Result<ScheduledNotification, UsecaseError> {
        if draft.scheduled_for <= Utc::now() {
            return Err(UsecaseError::Validation(
                "Scheduled date must be in the future".to_string(),
            ));
        }

        let scheduled = ScheduledNotification::new(actor, draft);
        if !scheduled.has_target() {
            return Err(UsecaseError::Validation(
                "Either target users or a target group is required".to_string(),
            ));
        }

        self.scheduled_repository.create(&scheduled).await?;

        tracing::info!(scheduled_id = %scheduled.id, "notification scheduled");
        Ok(scheduled)
    }

    #[tracing::instrument(skip(self))]
    pub async fn list_scheduled(&self) -> Result<Vec<ScheduledNotification>, UsecaseError> {
        let pending = self.scheduled_repository.list_pending().await?;
        tracing::debug!(count = pending.len(), "pending scheduled notifications listed");
        Ok(pending)
    }

    async fn push_new_notification(&self, notification: &Notification) {
        metrics::counter!("notifications_created_total").increment(1);
        let unread_count = match self
            .notification_repository
            .unread_count(notification.recipient_id)
            .await
        {
            Ok(count) => count,
            Err(e) => {
                tracing::warn!(recipient_id = %notification.recipient_id, error = %e, "unread count failed, pushing without it");
                0
            }
        };

        self.push
            .emit_to_user(
                notification.recipient_id,
                PushEvent::NewNotification,
                json!({
                    "notification": notification,
                    "title": notification.kind.title(),
                    "unreadCount": unread_count,
                }),
            )
            .await;
    }

    async fn push_to_admin_room(&self, notification: &Notification) {
        self.push
            .emit_to_room(
                ADMIN_ROOM,
                PushEvent::NewNotification,
                json!({
                    "notification": notification,
                    "title": notification.kind.title(),
                }),
            )
            .await;
    }
}

fn build_params(
    content: &NotificationContent,
    actor: Uuid,
    broadcast: bool,
    target_group: Option<TargetGroup>,
) -> Result<NotificationParams, UsecaseError> {
    match content.kind {
        NotificationKind::AdminNotification => Ok(NotificationParams::AdminNotification {
            title: content.title.clone(),
            message: content.message.clone(),
            priority: content.priority,
            sent_by: actor,
        }),
        NotificationKind::SystemAnnouncement => Ok(NotificationParams::SystemAnnouncement {
            title: content.title.clone(),
            message: content.message.clone(),
            priority: content.priority,
            sent_by: actor,
            broadcast,
            target_group,
        }),
        other => Err(UsecaseError::Validation(format!(
            "kind '{other}' cannot be sent administratively"
        ))),
    }
}

fn targeted_email(user: &UserProfile, content: &NotificationContent) -> OutgoingEmail {
    OutgoingEmail {
        to: user.email.clone(),
        subject: content.title.clone(),
        html: format!(
            "<h2>{}</h2>\
             <p>{}</p>\
             <p>Priority: {}</p>\
             <p>Login to your account to view more details.</p>",
            content.title, content.message, content.priority
        ),
    }
}

fn broadcast_email(
    user: &UserProfile,
    content: &NotificationContent,
    target_group: TargetGroup,
) -> OutgoingEmail {
    let scope = match target_group {
        TargetGroup::All => "system-wide".to_string(),
        other => other.to_string(),
    };
    OutgoingEmail {
        to: user.email.clone(),
        subject: content.title.clone(),
        html: format!(
            "<h2>{}</h2>\
             <p>{}</p>\
             <p>Priority: {}</p>\
             <hr>\
             <p>This is a {} notification.</p>\
             <p>Login to your account to manage your notification preferences.</p>",
            content.title, content.message, content.priority, scope
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::user::UserRole;
    use crate::repository::errors::RepositoryError;
    use crate::usecase::contracts::{
        MailerError, MockMailer, MockNotificationRepository, MockPushChannel,
        MockScheduledNotificationRepository, MockUserDirectory,
    };
    use chrono::Duration;

    fn content() -> NotificationContent {
        NotificationContent {
            title: "T".to_string(),
            message: "M".to_string(),
            kind: NotificationKind::SystemAnnouncement,
            priority: Priority::Normal,
        }
    }

    fn make_user(id: Uuid, admin: bool, wants_email: bool) -> UserProfile {
        UserProfile {
            id,
            email: format!("{id}@example.com"),
            name: None,
            role: UserRole::Va,
            admin,
            suspended: false,
            email_system_announcements: wants_email,
        }
    }

    fn dispatcher(
        repo: MockNotificationRepository,
        directory: MockUserDirectory,
        scheduled: MockScheduledNotificationRepository,
        push: MockPushChannel,
        mailer: MockMailer,
    ) -> FanoutDispatcher<
        MockNotificationRepository,
        MockUserDirectory,
        MockScheduledNotificationRepository,
        MockPushChannel,
        MockMailer,
    > {
        FanoutDispatcher::new(repo, directory, scheduled, push, mailer)
    }

    #[tokio::test]
    async fn test_targeted_send_to_two_users() {
        let mut repo = MockNotificationRepository::new();
        let mut directory = MockUserDirectory::new();
        let mut push = MockPushChannel::new();
        let u1 = Uuid::new_v4();
        let u2 = Uuid::new_v4();

        repo.expect_create().times(2).returning(|_| Ok(()));
        repo.expect_unread_count().times(2).returning(|_| Ok(1));
        directory
            .expect_find_by_id()
            .times(2)
            .returning(|id| Ok(Some(make_user(id, false, true))));
        push.expect_emit_to_user()
            .withf(|_, event, payload| {
                *event == PushEvent::NewNotification && payload["unreadCount"] == 1
            })
            .times(2)
            .returning(|_, _, _| ());

        let d = dispatcher(
            repo,
            directory,
            MockScheduledNotificationRepository::new(),
            push,
            MockMailer::new(),
        );
        let summary = d
            .send_targeted(Uuid::new_v4(), &[u1, u2], &content(), SendOptions::default())
            .await
            .unwrap();

        assert_eq!(summary.notification_count, 2);
        assert_eq!(summary.recipients, vec![u1, u2]);
        assert!(summary.failures.is_empty());
    }

    #[tokio::test]
    async fn test_targeted_send_rejects_empty_recipients() {
        let d = dispatcher(
            MockNotificationRepository::new(),
            MockUserDirectory::new(),
            MockScheduledNotificationRepository::new(),
            MockPushChannel::new(),
            MockMailer::new(),
        );
        let result = d
            .send_targeted(Uuid::new_v4(), &[], &content(), SendOptions::default())
            .await;

        assert!(matches!(result, Err(UsecaseError::Validation(_))));
    }

    #[tokio::test]
    async fn test_targeted_duplicate_ids_create_duplicates() {
        let mut repo = MockNotificationRepository::new();
        let mut directory = MockUserDirectory::new();
        let mut push = MockPushChannel::new();
        let user_id = Uuid::new_v4();

        repo.expect_create().times(2).returning(|_| Ok(()));
        repo.expect_unread_count().returning(|_| Ok(2));
        directory
            .expect_find_by_id()
            .returning(|id| Ok(Some(make_user(id, false, true))));
        push.expect_emit_to_user().times(2).returning(|_, _, _| ());

        let d = dispatcher(
            repo,
            directory,
            MockScheduledNotificationRepository::new(),
            push,
            MockMailer::new(),
        );
        let summary = d
            .send_targeted(
                Uuid::new_v4(),
                &[user_id, user_id],
                &content(),
                SendOptions::default(),
            )
            .await
            .unwrap();

        assert_eq!(summary.notification_count, 2);
    }

    #[tokio::test]
    async fn test_targeted_failed_recipient_is_skipped_not_fatal() {
        let mut repo = MockNotificationRepository::new();
        let mut directory = MockUserDirectory::new();
        let mut push = MockPushChannel::new();
        let stale = Uuid::new_v4();
        let ok = Uuid::new_v4();

        repo.expect_create().times(2).returning(move |n| {
            if n.recipient_id == stale {
                Err(RepositoryError::DatabaseError("fk violation".to_string()))
            } else {
                Ok(())
            }
        });
        repo.expect_unread_count().returning(|_| Ok(1));
        directory
            .expect_find_by_id()
            .returning(|id| Ok(Some(make_user(id, false, true))));
        push.expect_emit_to_user().times(1).returning(|_, _, _| ());

        let d = dispatcher(
            repo,
            directory,
            MockScheduledNotificationRepository::new(),
            push,
            MockMailer::new(),
        );
        let summary = d
            .send_targeted(Uuid::new_v4(), &[stale, ok], &content(), SendOptions::default())
            .await
            .unwrap();

        assert_eq!(summary.notification_count, 1);
        assert_eq!(summary.recipients, vec![ok]);
        assert_eq!(summary.failures.len(), 1);
        assert_eq!(summary.failures[0].user_id, stale);
    }

    #[tokio::test]
    async fn test_targeted_email_failure_is_isolated() {
        let mut repo = MockNotificationRepository::new();
        let mut directory = MockUserDirectory::new();
        let mut push = MockPushChannel::new();
        let mut mailer = MockMailer::new();

        repo.expect_create().times(2).returning(|_| Ok(()));
        repo.expect_unread_count().returning(|_| Ok(1));
        directory
            .expect_find_by_id()
            .returning(|id| Ok(Some(make_user(id, false, true))));
        push.expect_emit_to_user().times(2).returning(|_, _, _| ());
        let mut calls = 0;
        mailer.expect_send().times(2).returning(move |_| {
            calls += 1;
            if calls == 1 {
                Err(MailerError::Delivery("smtp 550".to_string()))
            } else {
                Ok(())
            }
        });

        let d = dispatcher(
            repo,
            directory,
            MockScheduledNotificationRepository::new(),
            push,
            mailer,
        );
        let summary = d
            .send_targeted(
                Uuid::new_v4(),
                &[Uuid::new_v4(), Uuid::new_v4()],
                &content(),
                SendOptions { send_email: true },
            )
            .await
            .unwrap();

        assert_eq!(summary.notification_count, 2);
        assert_eq!(summary.emails_sent, 1);
        assert!(summary.failures.is_empty());
    }

    #[tokio::test]
    async fn test_broadcast_creates_one_notification_per_user() {
        let mut repo = MockNotificationRepository::new();
        let mut directory = MockUserDirectory::new();
        let mut push = MockPushChannel::new();
        let users: Vec<UserProfile> = (0..3)
            .map(|i| make_user(Uuid::new_v4(), i == 0, true))
            .collect();
        let audience = users.clone();

        directory
            .expect_resolve_audience()
            .times(1)
            .returning(move |_| Ok(audience.clone()));
        repo.expect_create().times(3).returning(|_| Ok(()));
        repo.expect_unread_count().returning(|_| Ok(1));
        push.expect_emit_to_user().times(3).returning(|_, _, _| ());
        // One of the three is an admin, so the aggregate room sees one event.
        push.expect_emit_to_room()
            .withf(|room, _, _| room == ADMIN_ROOM)
            .times(1)
            .returning(|_, _, _| ());

        let d = dispatcher(
            repo,
            directory,
            MockScheduledNotificationRepository::new(),
            push,
            MockMailer::new(),
        );
        let summary = d
            .send_broadcast(
                Uuid::new_v4(),
                TargetGroup::All,
                BroadcastFilters::default(),
                &content(),
                SendOptions::default(),
            )
            .await
            .unwrap();

        assert_eq!(summary.total_recipients, 3);
        assert_eq!(summary.target_group, TargetGroup::All);
        assert_eq!(summary.emails_sent, 0);
    }

    #[tokio::test]
    async fn test_broadcast_honors_email_preference() {
        let mut repo = MockNotificationRepository::new();
        let mut directory = MockUserDirectory::new();
        let mut push = MockPushChannel::new();
        let mut mailer = MockMailer::new();
        let wants = make_user(Uuid::new_v4(), false, true);
        let opted_out = make_user(Uuid::new_v4(), false, false);
        let wants_email = wants.email.clone();
        let audience = vec![wants, opted_out];

        directory
            .expect_resolve_audience()
            .returning(move |_| Ok(audience.clone()));
        repo.expect_create().times(2).returning(|_| Ok(()));
        repo.expect_unread_count().returning(|_| Ok(1));
        push.expect_emit_to_user().times(2).returning(|_, _, _| ());
        mailer
            .expect_send()
            .withf(move |email| email.to == wants_email)
            .times(1)
            .returning(|_| Ok(()));

        let d = dispatcher(
            repo,
            directory,
            MockScheduledNotificationRepository::new(),
            push,
            mailer,
        );
        let summary = d
            .send_broadcast(
                Uuid::new_v4(),
                TargetGroup::All,
                BroadcastFilters::default(),
                &content(),
                SendOptions { send_email: true },
            )
            .await
            .unwrap();

        assert_eq!(summary.total_recipients, 2);
        assert_eq!(summary.emails_sent, 1);
    }

    #[tokio::test]
    async fn test_broadcast_rejects_mismatched_filters() {
        let d = dispatcher(
            MockNotificationRepository::new(),
            MockUserDirectory::new(),
            MockScheduledNotificationRepository::new(),
            MockPushChannel::new(),
            MockMailer::new(),
        );
        let filters = BroadcastFilters {
            industry: Some("fintech".to_string()),
            ..Default::default()
        };
        let result = d
            .send_broadcast(
                Uuid::new_v4(),
                TargetGroup::Vas,
                filters,
                &content(),
                SendOptions::default(),
            )
            .await;

        assert!(matches!(result, Err(UsecaseError::Validation(_))));
    }

    #[tokio::test]
    async fn test_schedule_rejects_past_date() {
        let d = dispatcher(
            MockNotificationRepository::new(),
            MockUserDirectory::new(),
            MockScheduledNotificationRepository::new(),
            MockPushChannel::new(),
            MockMailer::new(),
        );
        let result = d
            .schedule(
                Uuid::new_v4(),
                ScheduleDraft {
                    scheduled_for: Utc::now() - Duration::minutes(1),
                    target_users: vec![Uuid::new_v4()],
                    target_group: None,
                    title: "T".to_string(),
                    message: "M".to_string(),
                    kind: NotificationKind::SystemAnnouncement,
                    priority: Priority::Normal,
                    send_email: false,
                },
            )
            .await;

        assert!(matches!(result, Err(UsecaseError::Validation(_))));
    }

    #[tokio::test]
    async fn test_schedule_requires_a_target() {
        let d = dispatcher(
            MockNotificationRepository::new(),
            MockUserDirectory::new(),
            MockScheduledNotificationRepository::new(),
            MockPushChannel::new(),
            MockMailer::new(),
        );
        let result = d
            .schedule(
                Uuid::new_v4(),
                ScheduleDraft {
                    scheduled_for: Utc::now() + Duration::hours(1),
                    target_users: vec![],
                    target_group: None,
                    title: "T".to_string(),
                    message: "M".to_string(),
                    kind: NotificationKind::SystemAnnouncement,
                    priority: Priority::Normal,
                    send_email: false,
                },
            )
            .await;

        assert!(matches!(result, Err(UsecaseError::Validation(_))));
    }

    #[tokio::test]
    async fn test_schedule_persists_with_scheduled_status() {
        let mut scheduled_repo = MockScheduledNotificationRepository::new();
        scheduled_repo.expect_create().times(1).returning(|_| Ok(()));

        let d = dispatcher(
            MockNotificationRepository::new(),
            MockUserDirectory::new(),
            scheduled_repo,
            MockPushChannel::new(),
            MockMailer::new(),
        );
        let scheduled = d
            .schedule(
                Uuid::new_v4(),
                ScheduleDraft {
                    scheduled_for: Utc::now() + Duration::hours(1),
                    target_users: vec![],
                    target_group: Some(TargetGroup::Vas),
                    title: "T".to_string(),
                    message: "M".to_string(),
                    kind: NotificationKind::SystemAnnouncement,
                    priority: Priority::High,
                    send_email: true,
                },
            )
            .await
            .unwrap();

        assert_eq!(
            scheduled.status,
            crate::domain::scheduled_notification::ScheduleStatus::Scheduled
        );
    }

    #[tokio::test]
    async fn test_unsupported_kind_is_rejected() {
        let d = dispatcher(
            MockNotificationRepository::new(),
            MockUserDirectory::new(),
            MockScheduledNotificationRepository::new(),
            MockPushChannel::new(),
            MockMailer::new(),
        );
        let mut c = content();
        c.kind = NotificationKind::NewMessage;
        let result = d
            .send_targeted(Uuid::new_v4(), &[Uuid::new_v4()], &c, SendOptions::default())
            .await;

        assert!(matches!(result, Err(UsecaseError::Validation(_))));
    }
}
