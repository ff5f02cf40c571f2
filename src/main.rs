use axum::{
    routing::{delete, get, patch, post},
    Router,
};
use hr_crm_backend::{
    config::{get_config, init_config},
    database::pool::create_pool,
    routes, scheduler, AppState,
};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    init_config()?;
    let config = get_config();

    let pool = create_pool()?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let app_state = AppState::new(pool);

    let shutdown = CancellationToken::new();
    {
        let scheduler = app_state.scheduler.clone();
        let token = shutdown.clone();
        tokio::spawn(async move {
            scheduler::run_loop(scheduler, token).await;
        });
    }

    let app = Router::new()
        .route("/health", get(routes::health::health))
        .route(
            "/api/candidates",
            get(routes::candidate_routes::list_candidates)
                .post(routes::candidate_routes::create_candidate),
        )
        .route(
            "/api/candidates/metrics",
            get(routes::candidate_routes::candidate_metrics),
        )
        .route(
            "/api/candidates/snapshots",
            get(routes::candidate_routes::list_snapshots),
        )
        .route(
            "/api/candidates/snapshots/freeze",
            post(routes::candidate_routes::freeze_snapshot),
        )
        .route(
            "/api/candidates/:id",
            patch(routes::candidate_routes::update_candidate)
                .delete(routes::candidate_routes::delete_candidate),
        )
        .route(
            "/api/candidates/:id/status",
            post(routes::candidate_routes::update_candidate_status),
        )
        .route(
            "/api/candidates/:id/meet",
            delete(routes::candidate_routes::remove_head_meet),
        )
        .route("/api/employees", get(routes::employee_routes::list_employees))
        .route(
            "/api/employees/:id",
            patch(routes::employee_routes::update_employee),
        )
        .route("/api/subscribers", get(routes::telegram::list_subscribers))
        .route(
            "/api/subscribers/:chat_id",
            patch(routes::telegram::set_subscriber_enabled),
        )
        .route(
            "/api/telegram/webhook/:token",
            post(routes::telegram::handle_webhook),
        )
        .route("/api/telegram/test", post(routes::telegram::broadcast_test))
        .route("/api/webhooks/jira", post(routes::webhook::handle_jira_interview))
        .route("/api/scheduler/tick", post(routes::scheduler_routes::run_tick))
        .with_state(app_state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = config.server_address.parse()?;
    info!("Server listening on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await?;

    Ok(())
}

async fn shutdown_signal(token: CancellationToken) {
    let _ = tokio::signal::ctrl_c().await;
    info!("Shutdown signal received");
    token.cancel();
}
