// Volunteer Hub server

use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::EnvFilter;

use volunteer_hub::{api::create_router, app_state::AppState, config::Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("volunteer_hub=info,tower_http=info")),
        )
        .init();

    let config = Config::from_env()?;
    let app_state = AppState::new(config.clone()).await?;

    let app = create_router(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = config.server_address();
    info!(%addr, "Volunteer Hub server starting");
    info!("  GET    /api/v1/organization/context");
    info!("  GET    /api/v1/events                       - Admin event list");
    info!("  GET    /api/v1/public/events/{{slug}}         - Signup page data");
    info!("  POST   /api/v1/shifts/{{id}}/registrations    - Register for a shift");

    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
