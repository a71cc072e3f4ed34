use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::delivery::http::v1::middleware::AuthenticatedUser;
use crate::domain::announcement::Priority;
use crate::domain::audience::{BroadcastFilters, TargetGroup};
use crate::domain::notification::{
    AdminDeleteSelector, BulkArchiveCriteria, DateRange, NotificationKind, RestoreCriteria,
};
use crate::domain::scheduled_notification::ScheduleDraft;
use crate::usecase::contracts::NotificationRepository;
use crate::usecase::error::UsecaseError;
use crate::usecase::fanout::{NotificationContent, SendOptions};
use crate::AppState;

pub(crate) fn require_admin(user: &AuthenticatedUser) -> Result<(), UsecaseError> {
    if !user.admin {
        tracing::warn!(user_id = %user.user_id, "non-admin access attempt to admin endpoint");
        return Err(UsecaseError::Forbidden("Admin access required".to_string()));
    }
    Ok(())
}

#[derive(Debug, Deserialize, Validate)]
pub struct SendTargetedRequest {
    pub user_ids: Vec<Uuid>,
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(min = 1, max = 5000))]
    pub message: String,
    pub kind: Option<NotificationKind>,
    pub priority: Option<Priority>,
    #[serde(default)]
    pub send_email_notification: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SendBroadcastRequest {
    pub target_group: TargetGroup,
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(min = 1, max = 5000))]
    pub message: String,
    pub kind: Option<NotificationKind>,
    pub priority: Option<Priority>,
    #[serde(default)]
    pub send_email_notification: bool,
    #[serde(default)]
    pub filters: BroadcastFilters,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ScheduleNotificationRequest {
    pub scheduled_for: DateTime<Utc>,
    #[serde(default)]
    pub target_users: Vec<Uuid>,
    pub target_group: Option<TargetGroup>,
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(min = 1, max = 5000))]
    pub message: String,
    pub kind: Option<NotificationKind>,
    pub priority: Option<Priority>,
    #[serde(default)]
    pub send_email_notification: bool,
}

#[derive(Debug, Deserialize)]
pub struct StatsParams {
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct ArchivedStatsParams {
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteNotificationsRequest {
    pub notification_ids: Option<Vec<Uuid>>,
    #[serde(default)]
    pub delete_all: bool,
    pub older_than: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct BulkArchiveRequest {
    pub older_than: Option<DateTime<Utc>>,
    pub kind: Option<NotificationKind>,
    #[serde(default)]
    pub read: bool,
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RestoreCriteriaRequest {
    pub archived_after: Option<DateTime<Utc>>,
    pub kind: Option<NotificationKind>,
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct RestoreArchivedRequest {
    pub notification_ids: Option<Vec<Uuid>>,
    pub criteria: Option<RestoreCriteriaRequest>,
}

#[derive(Debug, Deserialize)]
pub struct AutoArchiveRequest {
    pub days_old: Option<i64>,
}

#[derive(serde::Serialize)]
pub struct AffectedResponse {
    pub affected: u64,
}

fn content_from(
    title: String,
    message: String,
    kind: Option<NotificationKind>,
    priority: Option<Priority>,
) -> NotificationContent {
    NotificationContent {
        title,
        message,
        kind: kind.unwrap_or(NotificationKind::SystemAnnouncement),
        priority: priority.unwrap_or(Priority::Normal),
    }
}

#[tracing::instrument(skip(state, body), fields(user_id = %user.user_id))]
pub async fn send_targeted(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(body): Json<SendTargetedRequest>,
) -> Result<impl IntoResponse, UsecaseError> {
    require_admin(&user)?;
    body.validate()
        .map_err(|e| UsecaseError::Validation(e.to_string()))?;

    let content = content_from(body.title, body.message, body.kind, body.priority);
    let summary = state
        .fanout_dispatcher
        .send_targeted(
            user.user_id,
            &body.user_ids,
            &content,
            SendOptions {
                send_email: body.send_email_notification,
            },
        )
        .await?;

    Ok((StatusCode::OK, Json(summary)))
}

#[tracing::instrument(skip(state, body), fields(user_id = %user.user_id))]
pub async fn send_broadcast(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(body): Json<SendBroadcastRequest>,
) -> Result<impl IntoResponse, UsecaseError> {
    require_admin(&user)?;
    body.validate()
        .map_err(|e| UsecaseError::Validation(e.to_string()))?;

    let content = content_from(body.title, body.message, body.kind, body.priority);
    let summary = state
        .fanout_dispatcher
        .send_broadcast(
            user.user_id,
            body.target_group,
            body.filters,
            &content,
            SendOptions {
                send_email: body.send_email_notification,
            },
        )
        .await?;

    Ok((StatusCode::OK, Json(summary)))
}

#[tracing::instrument(skip(state, body), fields(user_id = %user.user_id))]
pub async fn schedule_notification(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(body): Json<ScheduleNotificationRequest>,
) -> Result<impl IntoResponse, UsecaseError> {
    require_admin(&user)?;
    body.validate()
        .map_err(|e| UsecaseError::Validation(e.to_string()))?;

    let scheduled = state
        .fanout_dispatcher
        .schedule(
            user.user_id,
            ScheduleDraft {
                scheduled_for: body.scheduled_for,
                target_users: body.target_users,
                target_group: body.target_group,
                title: body.title,
                message: body.message,
                kind: body.kind.unwrap_or(NotificationKind::SystemAnnouncement),
                priority: body.priority.unwrap_or(Priority::Normal),
                send_email: body.send_email_notification,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(scheduled)))
}

#[tracing::instrument(skip(state), fields(user_id = %user.user_id))]
pub async fn list_scheduled(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<impl IntoResponse, UsecaseError> {
    require_admin(&user)?;

    let scheduled = state.fanout_dispatcher.list_scheduled().await?;
    Ok((StatusCode::OK, Json(scheduled)))
}

#[tracing::instrument(skip(state, params), fields(user_id = %user.user_id))]
pub async fn notification_stats(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Query(params): Query<StatsParams>,
) -> Result<impl IntoResponse, UsecaseError> {
    require_admin(&user)?;

    let stats = state
        .stats_aggregator
        .notification_stats(DateRange {
            start: params.start_date,
            end: params.end_date,
        })
        .await?;

    Ok((StatusCode::OK, Json(stats)))
}

#[tracing::instrument(skip(state, params), fields(user_id = %user.user_id))]
pub async fn archived_stats(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Query(params): Query<ArchivedStatsParams>,
) -> Result<impl IntoResponse, UsecaseError> {
    require_admin(&user)?;

    let stats = state
        .stats_aggregator
        .archived_stats(
            DateRange {
                start: params.start_date,
                end: params.end_date,
            },
            params.user_id,
        )
        .await?;

    Ok((StatusCode::OK, Json(stats)))
}

#[tracing::instrument(skip(state, body), fields(user_id = %user.user_id))]
pub async fn delete_notifications(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(body): Json<DeleteNotificationsRequest>,
) -> Result<impl IntoResponse, UsecaseError> {
    require_admin(&user)?;

    let selector = if body.delete_all {
        AdminDeleteSelector::All
    } else if let Some(older_than) = body.older_than {
        AdminDeleteSelector::OlderThan(older_than)
    } else if let Some(ids) = body.notification_ids.filter(|ids| !ids.is_empty()) {
        AdminDeleteSelector::Ids(ids)
    } else {
        return Err(UsecaseError::Validation(
            "No deletion criteria specified".to_string(),
        ));
    };

    let deleted = state
        .notifications_usecase
        .notification_repository()
        .delete_many(&selector)
        .await?;

    tracing::info!(deleted, "admin deleted notifications");
    Ok((StatusCode::OK, Json(AffectedResponse { affected: deleted })))
}

#[tracing::instrument(skip(state, body), fields(user_id = %user.user_id))]
pub async fn bulk_archive(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(body): Json<BulkArchiveRequest>,
) -> Result<impl IntoResponse, UsecaseError> {
    require_admin(&user)?;

    let archived = state
        .archive_manager
        .bulk_archive(BulkArchiveCriteria {
            older_than: body.older_than,
            kind: body.kind,
            read_only: body.read,
            owner: body.user_id,
        })
        .await?;

    Ok((StatusCode::OK, Json(AffectedResponse { affected: archived })))
}

#[tracing::instrument(skip(state, body), fields(user_id = %user.user_id))]
pub async fn restore_archived(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(body): Json<RestoreArchivedRequest>,
) -> Result<impl IntoResponse, UsecaseError> {
    require_admin(&user)?;

    let restored = if let Some(ids) = body.notification_ids.filter(|ids| !ids.is_empty()) {
        state.archive_manager.restore(ids).await?
    } else if let Some(criteria) = body.criteria {
        state
            .archive_manager
            .restore_by(RestoreCriteria {
                archived_after: criteria.archived_after,
                kind: criteria.kind,
                owner: criteria.user_id,
            })
            .await?
    } else {
        return Err(UsecaseError::Validation(
            "No restoration criteria specified".to_string(),
        ));
    };

    Ok((StatusCode::OK, Json(AffectedResponse { affected: restored })))
}

#[tracing::instrument(skip(state, body), fields(user_id = %user.user_id))]
pub async fn auto_archive(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(body): Json<AutoArchiveRequest>,
) -> Result<impl IntoResponse, UsecaseError> {
    require_admin(&user)?;

    let archived = state.archive_manager.auto_archive_old(body.days_old).await?;
    Ok((StatusCode::OK, Json(AffectedResponse { affected: archived })))
}
