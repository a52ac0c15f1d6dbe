use county_tracker::{app, config::AppConfig, state::AppState, telemetry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    telemetry::init_tracing();

    let config = AppConfig::from_env()?;
    let state = AppState::init(config).await?;
    if let Some(admin) = state.seed_admin().await? {
        tracing::info!(email = %admin.email, "bootstrap administrator created");
    }

    let app = app::build_app(state.clone());
    app::serve(app, &state.config).await
}
