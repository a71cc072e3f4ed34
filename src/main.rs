mod config;
mod delivery;
mod domain;
mod repository;
mod telemetry;
mod usecase;

use std::sync::Arc;

use axum::{
    extract::State,
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use crate::delivery::http::v1::admin::{
    archived_stats, auto_archive, bulk_archive, delete_notifications, list_scheduled,
    notification_stats, restore_archived, schedule_notification, send_broadcast, send_targeted,
};
use crate::delivery::http::v1::announcements::{
    announcement_stats, archive_expired, create_announcement, delete_announcement,
    list_all_announcements, list_announcements, mark_announcement_read, unread_announcement_count,
    update_announcement,
};
use crate::delivery::http::v1::middleware::auth_middleware;
use crate::delivery::http::v1::notifications::{
    archive_notifications, clear_archived, delete_notification, get_archived_count,
    get_unread_count, list_notifications, mark_all_read, mark_read, unarchive_notifications,
};
use crate::delivery::http::v1::ws::websocket_handler;
use crate::repository::postgres::{
    create_pool, PostgresAnnouncementReadRepository, PostgresAnnouncementRepository,
    PostgresNotificationRepository, PostgresScheduledNotificationRepository,
    PostgresUserDirectory,
};
use crate::usecase::announcements::AnnouncementsUseCase;
use crate::usecase::archive::ArchiveManager;
use crate::usecase::fanout::FanoutDispatcher;
use crate::usecase::jwt::JwtService;
use crate::usecase::mailer::HttpMailer;
use crate::usecase::notifications::NotificationsUseCase;
use crate::usecase::push::BroadcastPushChannel;
use crate::usecase::read_ledger::ReadLedgerUseCase;
use crate::usecase::stats::StatsAggregator;

pub struct AppState {
    pub notifications_usecase:
        NotificationsUseCase<PostgresNotificationRepository, PostgresUserDirectory, BroadcastPushChannel>,
    pub announcements_usecase: AnnouncementsUseCase<PostgresAnnouncementRepository>,
    pub read_ledger_usecase:
        ReadLedgerUseCase<PostgresAnnouncementRepository, PostgresAnnouncementReadRepository>,
    pub fanout_dispatcher: FanoutDispatcher<
        PostgresNotificationRepository,
        PostgresUserDirectory,
        PostgresScheduledNotificationRepository,
        BroadcastPushChannel,
        HttpMailer,
    >,
    pub archive_manager: ArchiveManager<PostgresNotificationRepository>,
    pub stats_aggregator: StatsAggregator<
        PostgresNotificationRepository,
        PostgresAnnouncementRepository,
        PostgresAnnouncementReadRepository,
        PostgresUserDirectory,
    >,
    pub jwt_service: JwtService,
    pub push: BroadcastPushChannel,
    pub metrics_handle: PrometheusHandle,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = config::AppConfig::from_env();

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    // Initialize tracing subscriber with optional OpenTelemetry layer
    if config.telemetry_enabled {
        let telemetry_config = telemetry::TelemetryConfig {
            service_name: config.telemetry_service_name.clone(),
            service_version: config.telemetry_service_version.clone(),
            environment: config.telemetry_environment.clone(),
            otlp_endpoint: config.telemetry_otlp_endpoint.clone(),
        };

        telemetry::init_telemetry_with_subscriber(&telemetry_config, env_filter)
            .expect("failed to initialize telemetry");
    } else {
        telemetry::init_subscriber_without_telemetry(env_filter);
    }

    tracing::info!("starting the notifications service");

    let metrics_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");
    metrics_process::Collector::default().describe();
    tracing::info!("prometheus metrics initialized");

    let pool = create_pool(&config.database_url, config.database_max_connections)
        .await
        .expect("failed to create database pool");
    tracing::info!("database pool created");

    sqlx::migrate!().run(&pool).await?;
    tracing::info!("database migrations applied");

    let jwt_service = JwtService::new(config.jwt_secret);
    let push = BroadcastPushChannel::new();
    let mailer = HttpMailer::new(
        config.mailer_endpoint,
        config.mailer_api_key,
        config.mailer_sender,
    );

    let notifications_usecase = NotificationsUseCase::new(
        PostgresNotificationRepository::new(pool.clone()),
        PostgresUserDirectory::new(pool.clone()),
        push.clone(),
    );
    let announcements_usecase =
        AnnouncementsUseCase::new(PostgresAnnouncementRepository::new(pool.clone()));
    let read_ledger_usecase = ReadLedgerUseCase::new(
        PostgresAnnouncementRepository::new(pool.clone()),
        PostgresAnnouncementReadRepository::new(pool.clone()),
    );
    let fanout_dispatcher = FanoutDispatcher::new(
        PostgresNotificationRepository::new(pool.clone()),
        PostgresUserDirectory::new(pool.clone()),
        PostgresScheduledNotificationRepository::new(pool.clone()),
        push.clone(),
        mailer,
    );
    let archive_manager = ArchiveManager::new(PostgresNotificationRepository::new(pool.clone()));
    let stats_aggregator = StatsAggregator::new(
        PostgresNotificationRepository::new(pool.clone()),
        PostgresAnnouncementRepository::new(pool.clone()),
        PostgresAnnouncementReadRepository::new(pool.clone()),
        PostgresUserDirectory::new(pool),
    );

    let shared_state = Arc::new(AppState {
        notifications_usecase,
        announcements_usecase,
        read_ledger_usecase,
        fanout_dispatcher,
        archive_manager,
        stats_aggregator,
        jwt_service,
        push,
        metrics_handle,
    });

    // All routes require authentication
    let api = Router::new()
        .route("/api/v1/notifications", get(list_notifications))
        .route("/api/v1/notifications/unread-count", get(get_unread_count))
        .route("/api/v1/notifications/archived-count", get(get_archived_count))
        .route("/api/v1/notifications/read", put(mark_read))
        .route("/api/v1/notifications/read-all", put(mark_all_read))
        .route("/api/v1/notifications/archive", put(archive_notifications))
        .route("/api/v1/notifications/unarchive", put(unarchive_notifications))
        .route("/api/v1/notifications/archived", delete(clear_archived))
        .route("/api/v1/notifications/{id}", delete(delete_notification))
        .route(
            "/api/v1/announcements",
            get(list_announcements).post(create_announcement),
        )
        .route("/api/v1/announcements/admin", get(list_all_announcements))
        .route("/api/v1/announcements/unread-count", get(unread_announcement_count))
        .route("/api/v1/announcements/archive-expired", post(archive_expired))
        .route(
            "/api/v1/announcements/{id}",
            put(update_announcement).delete(delete_announcement),
        )
        .route("/api/v1/announcements/{id}/read", post(mark_announcement_read))
        .route("/api/v1/announcements/{id}/stats", get(announcement_stats))
        .route("/api/v1/admin/notifications/send", post(send_targeted))
        .route("/api/v1/admin/notifications/broadcast", post(send_broadcast))
        .route(
            "/api/v1/admin/notifications/schedule",
            get(list_scheduled).post(schedule_notification),
        )
        .route("/api/v1/admin/notifications/stats", get(notification_stats))
        .route("/api/v1/admin/notifications/archived/stats", get(archived_stats))
        .route("/api/v1/admin/notifications", delete(delete_notifications))
        .route("/api/v1/admin/notifications/bulk-archive", post(bulk_archive))
        .route("/api/v1/admin/notifications/restore-archived", post(restore_archived))
        .route("/api/v1/admin/notifications/auto-archive", post(auto_archive))
        .layer(middleware::from_fn_with_state(
            shared_state.clone(),
            auth_middleware,
        ));

    let router = Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics))
        .route("/api/v1/ws", get(websocket_handler))
        .merge(api)
        .layer(TraceLayer::new_for_http())
        .with_state(shared_state);

    let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
    tracing::info!("notifications service running on 0.0.0.0:8080");
    axum::serve(listener, router).await?;

    // Shutdown telemetry on exit
    if config.telemetry_enabled {
        telemetry::shutdown_telemetry();
    }

    Ok(())
}

async fn metrics(State(state): State<Arc<AppState>>) -> String {
    metrics_process::Collector::default().collect();
    state.metrics_handle.render()
}

#[tracing::instrument]
async fn healthz() -> &'static str {
    "OK"
}
