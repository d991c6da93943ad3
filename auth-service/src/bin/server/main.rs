use std::sync::Arc;
use std::time::Duration;

use auth::Argon2Hasher;
use auth::KeyProvider;
use auth::TokenSigner;
use auth::TotpGenerator;
use auth_service::clock::Clock;
use auth_service::clock::SystemClock;
use auth_service::config::Config;
use auth_service::inbound::scheduler::CleanupScheduler;
use auth_service::mfa::service::MfaEngine;
use auth_service::notifications::LogNotifier;
use auth_service::repositories::PostgresTokenRecordStore;
use auth_service::repositories::PostgresUserDirectory;
use auth_service::session::service::AuthOrchestrator;
use auth_service::token::service::RefreshTokenStore;
use sqlx::postgres::PgPoolOptions;
use tokio::sync::watch;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "auth_service=debug,auth=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        service = "auth-service",
        version = env!("CARGO_PKG_VERSION"),
        "Service starting"
    );

    let config = Config::load()?;

    tracing::info!(
        database_url = %config.database.url,
        issuer = %config.jwt.issuer,
        access_token_ttl_secs = config.jwt.access_token_ttl_secs,
        refresh_token_ttl_secs = config.jwt.refresh_token_ttl_secs,
        mfa_algorithm = %config.mfa.algorithm,
        "Configuration loaded"
    );

    let key_provider = KeyProvider::new(&config.jwt.private_key_path, &config.jwt.public_key_path);
    let key_pair = key_provider.key_pair()?;
    tracing::info!(
        bits = key_pair.bits(),
        ephemeral = key_pair.is_ephemeral(),
        "Signing key ready"
    );

    let pg_pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(&config.database.url)
        .await?;
    tracing::info!(
        max_connections = config.database.max_connections,
        database = "postgresql",
        "Database connection pool created"
    );

    sqlx::migrate!("./migrations").run(&pg_pool).await?;
    tracing::info!(database = "postgresql", "Database migrations completed");

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let signer = Arc::new(TokenSigner::new(key_pair, config.jwt.issuer.clone()));
    let users = Arc::new(PostgresUserDirectory::new(pg_pool.clone()));
    let records = Arc::new(PostgresTokenRecordStore::new(pg_pool));
    let notifier = Arc::new(LogNotifier::new(&config.notifications));

    let tokens = Arc::new(RefreshTokenStore::new(
        records,
        Arc::clone(&users),
        Arc::clone(&signer),
        Arc::clone(&clock),
        config.jwt.access_token_ttl_secs,
    ));
    let mfa = Arc::new(MfaEngine::new(
        Arc::clone(&users),
        notifier,
        TotpGenerator::new(config.mfa.totp())?,
        Arc::clone(&clock),
    ));
    let orchestrator = AuthOrchestrator::new(
        users,
        Arc::clone(&tokens),
        mfa,
        signer,
        Arc::new(Argon2Hasher::new()),
        clock,
        config.jwt.refresh_token_ttl_secs,
    );
    tracing::info!(issuer = %config.jwt.issuer, "Authentication services ready");

    let (shutdown_sender, shutdown_receiver) = watch::channel(false);
    let scheduler = CleanupScheduler::new(
        Arc::clone(orchestrator.tokens()),
        Duration::from_secs(config.refresh_token.cleanup_interval_secs),
        config.refresh_token.retention_days,
    )
    .spawn(shutdown_receiver);

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");

    // Err only if the scheduler already exited
    shutdown_sender.send(true).ok();
    if let Err(e) = scheduler.await {
        tracing::error!(error = %e, "Cleanup scheduler panicked");
    }

    tracing::info!("Service stopped");
    Ok(())
}
