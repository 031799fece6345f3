use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use sqlx::Executor;
use sqlx::postgres::PgPoolOptions;
use tenant_gate::{
    AppState,
    cache::RedisSessionStore,
    config::Config,
    create_router,
    database::{PgDataStore, PgDirectory},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().expect("Failed to load configuration");

    #[cfg(debug_assertions)]
    tracing::info!("Running in debug mode with CORS enabled");

    #[cfg(not(debug_assertions))]
    tracing::info!("Running in production mode with CORS disabled");

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(config.store_timeout())
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                conn.execute("SET application_name = 'tenant_gate';").await?;
                Ok(())
            })
        })
        .connect(&config.database_url)
        .await
        .expect("Failed to connect to Postgres");

    let redis_client =
        redis::Client::open(config.redis_url.clone()).expect("Failed to create Redis client");

    let directory = Arc::new(PgDirectory::new(pool.clone()));
    let state = AppState::new(
        config.clone(),
        Arc::new(RedisSessionStore::new(Arc::new(redis_client))),
        directory.clone(),
        directory.clone(),
        directory,
        Arc::new(PgDataStore::new(pool)),
    );

    let sweep_interval = config.rate_limit_sweep_interval();
    let auth_sweeper = state.auth_limiter.start_sweeper(sweep_interval);
    let api_sweeper = state.api_limiter.start_sweeper(sweep_interval);

    let router = create_router(state);

    #[cfg(debug_assertions)]
    let router = {
        tracing::debug!("Adding CORS layer for development mode");
        router.layer(tower_http::cors::CorsLayer::permissive())
    };

    let addr = SocketAddr::new(
        config.server_host.parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid server_host, falling back to dual-stack default");
            IpAddr::V6(std::net::Ipv6Addr::UNSPECIFIED)
        }),
        config.server_port,
    );
    tracing::info!("Server listening on {}", addr);
    axum::serve(
        tokio::net::TcpListener::bind(&addr)
            .await
            .expect("Failed to bind"),
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async {
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("Shutdown signal received");
    })
    .await
    .expect("Failed to start server");

    auth_sweeper.stop();
    api_sweeper.stop();
}
