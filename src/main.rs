// src/main.rs

use std::net::SocketAddr;
use std::sync::Arc;

use dotenvy::dotenv;
use quizcore::cache::{QuizCache, QuizReader, local::LocalCache, redis_cache::RedisCache};
use quizcore::config::Config;
use quizcore::routes;
use quizcore::state::AppState;
use quizcore::store::{
    RecordStore,
    backend::Dialer,
    connector::{RetryConnector, RetryPolicy},
    memory::MemoryDialer,
    postgres::PgDialer,
};
use quizcore::utils::cursor::AesCursorCipher;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenv().ok();

    // Load configuration from environment
    let config = Config::from_env();

    let file_appender = tracing_appender::rolling::daily("logs", "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = EnvFilter::new(&config.rust_log);
    let stdout_layer = fmt::layer().with_writer(std::io::stdout).with_target(false);
    let file_layer = fmt::layer().with_writer(non_blocking).with_ansi(false);

    // Initialize Tracing (Logging)
    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    let dialer: Arc<dyn Dialer> = match &config.database_url {
        Some(url) => Arc::new(PgDialer::new(
            url,
            config.db_max_connections,
            config.db_connect_timeout,
        )),
        None => {
            tracing::warn!("DATABASE_URL not set, using the in-memory store");
            Arc::new(MemoryDialer::new())
        }
    };

    let policy = RetryPolicy {
        max_attempts: config.db_connect_attempts,
        attempt_timeout: config.db_connect_timeout,
        ..RetryPolicy::default()
    };
    let store = Arc::new(RecordStore::new(RetryConnector::new(dialer, policy)));

    // Connect with retry; giving up is fatal to startup
    store
        .open()
        .await
        .expect("Failed to connect to the database");

    tracing::info!("Bootstrapping schema...");
    store
        .bootstrap()
        .await
        .expect("Failed to bootstrap database schema");

    let cache: Arc<dyn QuizCache> = match &config.redis_url {
        Some(url) => Arc::new(
            RedisCache::from_url(url, config.cache_ttl).expect("Failed to configure Redis cache"),
        ),
        None => {
            tracing::info!("REDIS_URL not set, using the local cache");
            Arc::new(LocalCache::new(config.cache_ttl))
        }
    };

    let cipher =
        AesCursorCipher::from_key_str(&config.cursor_key).expect("CURSOR_KEY is not a valid key");

    // Create AppState
    let state = AppState {
        store: store.clone(),
        reader: Arc::new(QuizReader::new(store.clone(), cache)),
        cipher: Arc::new(cipher),
        config: config.clone(),
    };

    // Create the Axum application router
    let app = routes::create_router(state);

    // Bind to the listening address
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind listening address");

    // Start the server
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
        })
        .await
        .expect("Server error");

    if let Err(e) = store.close().await {
        tracing::warn!(error = %e, "Failed to close storage session");
    }
    tracing::info!("Shut down");
}
