//! Server entry point for LinkHive.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use linkhive::auth::TokenIssuer;
use linkhive::mail::{LogMailer, OtpMailer, SmtpMailer};
use linkhive::preview::build_default_preview_resolver;
use linkhive::signup_cache::{MemorySignupCache, RedisSignupCache, SignupCache};
use linkhive::{AppState, Database, ServerConfig, StateDeps, router};
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{debug, info, warn};

mod cli;

use cli::Args;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Determine log level based on verbose/quiet flags
    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = args.into_config()?;
    debug!(
        port = config.port,
        database = %config.database_path.display(),
        redis = config.redis_url.is_some(),
        smtp = config.smtp.is_some(),
        "Configuration resolved"
    );
    info!("LinkHive starting");

    let state = build_state(&config).await?;
    let app = router(state, &config.cors_origins);

    let address = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind {address}"))?;
    info!(%address, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("LinkHive stopped");
    Ok(())
}

async fn build_state(config: &ServerConfig) -> Result<AppState> {
    let db = Database::new(&config.database_path)
        .await
        .with_context(|| format!("failed to open {}", config.database_path.display()))?;

    let signup_cache: Arc<dyn SignupCache> = match &config.redis_url {
        Some(url) => Arc::new(
            RedisSignupCache::connect(url)
                .await
                .context("failed to connect to Redis")?,
        ),
        None => {
            warn!("REDIS_URL not set; pending signups are kept in process memory");
            Arc::new(MemorySignupCache::new())
        }
    };

    let mailer: Arc<dyn OtpMailer> = match &config.smtp {
        Some(smtp) => Arc::new(SmtpMailer::new(smtp).context("invalid SMTP configuration")?),
        None => {
            warn!("SMTP not configured; verification codes will be logged");
            Arc::new(LogMailer)
        }
    };

    let previews = build_default_preview_resolver(config.video_style, config.fetch_timeouts);
    debug!(providers = previews.provider_count(), "Preview resolver ready");

    Ok(AppState::new(StateDeps {
        db,
        previews: Arc::new(previews),
        signup_cache,
        mailer,
        tokens: Arc::new(TokenIssuer::new(
            config.jwt_secret.as_bytes(),
            config.token_ttl(),
        )),
        otp_ttl: config.otp_ttl(),
    }))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = signal::ctrl_c().await {
            warn!(%error, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(error) => {
                warn!(%error, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
