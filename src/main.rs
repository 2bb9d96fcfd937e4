mod app;
mod assist;
mod auth;
mod config;
mod db;
mod error;
mod gate;
mod payments;
mod state;
mod subscriptions;
mod users;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "codeassist=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let state = state::AppState::init().await?;

    if state.config.seed_demo_users {
        auth::services::seed_demo_users(state.store.as_ref()).await?;
    }

    let app = app::build_app(state);
    app::serve(app).await
}
