use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::delivery::http::v1::middleware::AuthenticatedUser;
use crate::domain::announcement::Priority;
use crate::domain::notification::{
    Notification, NotificationFilter, NotificationKind, NotificationParams,
};
use crate::usecase::error::UsecaseError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct NotificationListParams {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub unread_only: Option<bool>,
    pub kind: Option<NotificationKind>,
    pub priority: Option<Priority>,
    pub include_archived: Option<bool>,
}

#[derive(Serialize)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub pages: i64,
}

#[derive(Serialize)]
pub struct NotificationResponse {
    pub id: Uuid,
    pub kind: NotificationKind,
    pub title: &'static str,
    pub params: NotificationParams,
    pub is_read: bool,
    pub read_at: Option<DateTime<Utc>>,
    pub archived: bool,
    pub created_at: DateTime<Utc>,
}

impl From<Notification> for NotificationResponse {
    fn from(n: Notification) -> Self {
        Self {
            id: n.id,
            kind: n.kind,
            title: n.kind.title(),
            is_read: n.is_read(),
            params: n.params,
            read_at: n.read_at,
            archived: n.archived,
            created_at: n.created_at,
        }
    }
}

#[derive(Serialize)]
pub struct NotificationsListResponse {
    pub notifications: Vec<NotificationResponse>,
    pub unread_count: i64,
    pub pagination: Pagination,
}

#[derive(Serialize)]
pub struct UnreadCountResponse {
    pub unread_count: i64,
}

#[derive(Serialize)]
pub struct ArchivedCountResponse {
    pub archived_count: i64,
}

#[derive(Debug, Deserialize)]
pub struct NotificationIdsRequest {
    pub notification_ids: Vec<Uuid>,
}

#[derive(Serialize)]
pub struct AffectedResponse {
    pub affected: u64,
}

#[tracing::instrument(skip(state, params), fields(user_id = %user.user_id))]
pub async fn list_notifications(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Query(params): Query<NotificationListParams>,
) -> Result<impl IntoResponse, UsecaseError> {
    let page = params.page.unwrap_or(1).max(1);
    let limit = params.limit.unwrap_or(20).clamp(1, 100);
    let offset = (page - 1) * limit;
    tracing::debug!(page, limit, "listing notifications");

    let filter = NotificationFilter {
        unread_only: params.unread_only.unwrap_or(false),
        kind: params.kind,
        priority: params.priority,
        include_archived: params.include_archived.unwrap_or(false),
    };

    let (notifications, total) = state
        .notifications_usecase
        .list(user.user_id, filter, limit, offset)
        .await?;
    let unread_count = state.notifications_usecase.unread_count(user.user_id).await?;

    tracing::debug!(count = notifications.len(), unread_count, "notifications listed");
    Ok((
        StatusCode::OK,
        Json(NotificationsListResponse {
            notifications: notifications.into_iter().map(Into::into).collect(),
            unread_count,
            pagination: Pagination {
                page,
                limit,
                total,
                pages: (total + limit - 1) / limit,
            },
        }),
    ))
}

#[tracing::instrument(skip(state), fields(user_id = %user.user_id))]
pub async fn get_unread_count(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<impl IntoResponse, UsecaseError> {
    let unread_count = state.notifications_usecase.unread_count(user.user_id).await?;
    Ok((StatusCode::OK, Json(UnreadCountResponse { unread_count })))
}

#[tracing::instrument(skip(state), fields(user_id = %user.user_id))]
pub async fn get_archived_count(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<impl IntoResponse, UsecaseError> {
    let archived_count = state
        .notifications_usecase
        .archived_count(user.user_id)
        .await?;
    Ok((StatusCode::OK, Json(ArchivedCountResponse { archived_count })))
}

#[tracing::instrument(skip(state, body), fields(user_id = %user.user_id))]
pub async fn mark_read(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(body): Json<NotificationIdsRequest>,
) -> Result<impl IntoResponse, UsecaseError> {
    let marked = state
        .notifications_usecase
        .mark_read(body.notification_ids, user.user_id)
        .await?;

    Ok((StatusCode::OK, Json(AffectedResponse { affected: marked })))
}

#[tracing::instrument(skip(state), fields(user_id = %user.user_id))]
pub async fn mark_all_read(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<impl IntoResponse, UsecaseError> {
    let ids = state.notifications_usecase.mark_all_read(user.user_id).await?;

    Ok((
        StatusCode::OK,
        Json(AffectedResponse {
            affected: ids.len() as u64,
        }),
    ))
}

#[tracing::instrument(skip(state), fields(user_id = %user.user_id, notification_id = %id))]
pub async fn delete_notification(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, UsecaseError> {
    state.notifications_usecase.delete(id, user.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[tracing::instrument(skip(state, body), fields(user_id = %user.user_id))]
pub async fn archive_notifications(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(body): Json<NotificationIdsRequest>,
) -> Result<impl IntoResponse, UsecaseError> {
    let archived = state
        .archive_manager
        .archive(body.notification_ids, user.user_id)
        .await?;

    Ok((StatusCode::OK, Json(AffectedResponse { affected: archived })))
}

#[tracing::instrument(skip(state, body), fields(user_id = %user.user_id))]
pub async fn unarchive_notifications(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(body): Json<NotificationIdsRequest>,
) -> Result<impl IntoResponse, UsecaseError> {
    let restored = state
        .archive_manager
        .unarchive(body.notification_ids, user.user_id)
        .await?;

    Ok((StatusCode::OK, Json(AffectedResponse { affected: restored })))
}

#[tracing::instrument(skip(state), fields(user_id = %user.user_id))]
pub async fn clear_archived(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<impl IntoResponse, UsecaseError> {
    let deleted = state
        .archive_manager
        .clear_archived_for_user(user.user_id)
        .await?;

    Ok((StatusCode::OK, Json(AffectedResponse { affected: deleted })))
}
