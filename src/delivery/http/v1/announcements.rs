use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::delivery::http::v1::admin::require_admin;
use crate::delivery::http::v1::middleware::AuthenticatedUser;
use crate::domain::announcement::{
    AdminAnnouncementRow, AdminFilter, AdminStatusFilter, Announcement, AnnouncementDraft,
    AnnouncementPatch, AnnouncementWithReadState, Category, Priority, TargetAudience,
    VisibleFilter,
};
use crate::domain::announcement_read::{AnnouncementRead, DeviceInfo, Interaction};
use crate::usecase::error::UsecaseError;
use crate::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateAnnouncementRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(min = 1, max = 5000))]
    pub content: String,
    pub target_audience: Option<TargetAudience>,
    pub priority: Option<Priority>,
    pub publish_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub category: Option<Category>,
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateAnnouncementRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    #[validate(length(min = 1, max = 5000))]
    pub content: Option<String>,
    pub target_audience: Option<TargetAudience>,
    pub priority: Option<Priority>,
    pub is_active: Option<bool>,
    pub publish_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub category: Option<Category>,
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct AnnouncementListParams {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub priority: Option<Priority>,
    pub category: Option<Category>,
    pub unread_only: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct AdminAnnouncementListParams {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub filter: Option<AdminStatusFilter>,
    pub target_audience: Option<TargetAudience>,
    pub priority: Option<Priority>,
    pub category: Option<Category>,
}

#[derive(Debug, Deserialize)]
pub struct MarkReadRequest {
    pub interaction: Option<Interaction>,
    pub time_spent: Option<i64>,
}

#[derive(Serialize)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub pages: i64,
}

#[derive(Serialize)]
pub struct AnnouncementsListResponse {
    pub announcements: Vec<AnnouncementWithReadState>,
    pub pagination: Pagination,
}

#[derive(Serialize)]
pub struct AdminAnnouncementsListResponse {
    pub announcements: Vec<AdminAnnouncementRow>,
    pub pagination: Pagination,
}

#[derive(Serialize)]
pub struct MarkReadResponse {
    pub read: AnnouncementRead,
}

#[derive(Serialize)]
pub struct ArchiveExpiredResponse {
    pub archived: u64,
}

fn pagination(page: i64, limit: i64, total: i64) -> Pagination {
    Pagination {
        page,
        limit,
        total,
        pages: (total + limit - 1) / limit,
    }
}

#[tracing::instrument(skip(state, body), fields(user_id = %user.user_id))]
pub async fn create_announcement(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(body): Json<CreateAnnouncementRequest>,
) -> Result<impl IntoResponse, UsecaseError> {
    require_admin(&user)?;
    body.validate()
        .map_err(|e| UsecaseError::Validation(e.to_string()))?;

    let draft = AnnouncementDraft {
        title: body.title,
        content: body.content,
        target_audience: body.target_audience.unwrap_or(TargetAudience::All),
        priority: body.priority.unwrap_or(Priority::Normal),
        publish_at: body.publish_at,
        expires_at: body.expires_at,
        category: body.category.unwrap_or(Category::General),
        tags: body.tags.unwrap_or_default(),
    };

    let announcement = state
        .announcements_usecase
        .create(user.user_id, draft)
        .await?;

    Ok((StatusCode::CREATED, Json(announcement)))
}

#[tracing::instrument(skip(state, params), fields(user_id = %user.user_id))]
pub async fn list_announcements(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Query(params): Query<AnnouncementListParams>,
) -> Result<impl IntoResponse, UsecaseError> {
    let page = params.page.unwrap_or(1).max(1);
    let limit = params.limit.unwrap_or(20).clamp(1, 100);
    tracing::debug!(page, limit, "listing announcements");

    let filter = VisibleFilter {
        priority: params.priority,
        category: params.category,
        unread_only: params.unread_only.unwrap_or(false),
    };

    let (announcements, total) = state
        .announcements_usecase
        .list_visible_for(&user.viewer(), filter, limit, (page - 1) * limit)
        .await?;

    Ok((
        StatusCode::OK,
        Json(AnnouncementsListResponse {
            announcements,
            pagination: pagination(page, limit, total),
        }),
    ))
}

#[tracing::instrument(skip(state, params), fields(user_id = %user.user_id))]
pub async fn list_all_announcements(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Query(params): Query<AdminAnnouncementListParams>,
) -> Result<impl IntoResponse, UsecaseError> {
    require_admin(&user)?;

    let page = params.page.unwrap_or(1).max(1);
    let limit = params.limit.unwrap_or(50).clamp(1, 100);
    tracing::debug!(page, limit, "listing all announcements");

    let filter = AdminFilter {
        status: params.filter.unwrap_or(AdminStatusFilter::Active),
        target_audience: params.target_audience,
        priority: params.priority,
        category: params.category,
    };

    let (announcements, total) = state
        .announcements_usecase
        .list_all_for_admin(filter, limit, (page - 1) * limit)
        .await?;

    Ok((
        StatusCode::OK,
        Json(AdminAnnouncementsListResponse {
            announcements,
            pagination: pagination(page, limit, total),
        }),
    ))
}

#[tracing::instrument(skip(state, body), fields(user_id = %user.user_id, announcement_id = %id))]
pub async fn update_announcement(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateAnnouncementRequest>,
) -> Result<impl IntoResponse, UsecaseError> {
    require_admin(&user)?;
    body.validate()
        .map_err(|e| UsecaseError::Validation(e.to_string()))?;

    let patch = AnnouncementPatch {
        title: body.title,
        content: body.content,
        target_audience: body.target_audience,
        priority: body.priority,
        is_active: body.is_active,
        publish_at: body.publish_at,
        expires_at: body.expires_at,
        category: body.category,
        tags: body.tags,
    };

    let announcement: Announcement = state.announcements_usecase.update(id, patch).await?;
    Ok((StatusCode::OK, Json(announcement)))
}

#[tracing::instrument(skip(state), fields(user_id = %user.user_id, announcement_id = %id))]
pub async fn delete_announcement(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, UsecaseError> {
    require_admin(&user)?;

    state.announcements_usecase.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[tracing::instrument(skip(state, headers, body), fields(user_id = %user.user_id, announcement_id = %id))]
pub async fn mark_announcement_read(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(body): Json<MarkReadRequest>,
) -> Result<impl IntoResponse, UsecaseError> {
    let device = device_from_headers(&headers);

    let read = state
        .read_ledger_usecase
        .mark_as_read(
            id,
            &user.viewer(),
            body.interaction,
            body.time_spent.unwrap_or(0),
            device,
        )
        .await?;

    Ok((StatusCode::OK, Json(MarkReadResponse { read })))
}

#[tracing::instrument(skip(state), fields(user_id = %user.user_id))]
pub async fn unread_announcement_count(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<impl IntoResponse, UsecaseError> {
    let unread = state
        .announcements_usecase
        .unread_count(&user.viewer())
        .await?;
    Ok((StatusCode::OK, Json(unread)))
}

#[tracing::instrument(skip(state), fields(user_id = %user.user_id))]
pub async fn archive_expired(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<impl IntoResponse, UsecaseError> {
    require_admin(&user)?;

    let archived = state.announcements_usecase.archive_expired().await?;
    Ok((StatusCode::OK, Json(ArchiveExpiredResponse { archived })))
}

#[tracing::instrument(skip(state), fields(user_id = %user.user_id, announcement_id = %id))]
pub async fn announcement_stats(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, UsecaseError> {
    require_admin(&user)?;

    let reach = state.stats_aggregator.announcement_reach(id).await?;
    Ok((StatusCode::OK, Json(reach)))
}

fn device_from_headers(headers: &HeaderMap) -> Option<DeviceInfo> {
    let user_agent = headers
        .get("user-agent")
        .and_then(|v| v.to_str().ok())
        .map(String::from);
    let platform = headers
        .get("sec-ch-ua-platform")
        .and_then(|v| v.to_str().ok())
        .map(String::from);

    if user_agent.is_none() && platform.is_none() {
        return None;
    }
    Some(DeviceInfo {
        user_agent,
        platform,
    })
}
