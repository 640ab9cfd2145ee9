use konnect_hub::core::{AppState, Config};
use konnect_hub::create_router;
use sqlx::mysql::MySqlPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logging strutturato, livello controllato via RUST_LOG
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Inizializza la configurazione dalle variabili d'ambiente
    let config = Config::from_env()?;
    config.print_info();

    // Pool di connessioni MySQL
    let pool = MySqlPoolOptions::new()
        .max_connections(config.max_connections)
        .max_lifetime(Duration::from_secs(config.connection_lifetime_secs))
        .connect(&config.database_url)
        .await?;

    // Stato applicativo condiviso: repository + registri di presenza e gruppi
    let state = Arc::new(AppState::new(pool, config.jwt_secret.clone()));

    // Crea il router
    let app = create_router(state).layer(CorsLayer::permissive());

    // Definisci l'indirizzo
    let addr: SocketAddr = format!("{}:{}", config.server_host, config.server_port).parse()?;
    info!("Server listening on http://{}", addr);

    // Crea il listener TCP e avvia il server
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
