//! Taytay marketplace REST backend

use clap::Parser;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use taytay_market::{
    auth::SessionIssuer,
    config::Args,
    db::MongoClient,
    repository::Repositories,
    server::{self, AppState},
    services::{BrevoMailer, Mailer, OutboxMailer},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("taytay_market={},info", args.log_level).into());
    let registry = tracing_subscriber::registry().with(filter);
    if args.log_json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    info!("======================================");
    info!("  Taytay Marketplace API");
    info!("======================================");
    info!("Listen: {}", args.listen);
    info!("Mode: {}", if args.dev_mode { "DEVELOPMENT" } else { "PRODUCTION" });
    info!("MongoDB: {} (db {})", args.mongodb_uri, args.mongodb_db);
    info!("CORS origins: {}", args.allowed_origins().join(", "));
    info!("======================================");

    // MongoDB is optional in dev mode
    let (repos, storage) = match MongoClient::new(&args.mongodb_uri, &args.mongodb_db).await {
        Ok(client) => {
            info!("MongoDB connected successfully");
            (Repositories::mongo(&client).await?, "mongodb")
        }
        Err(e) => {
            if args.dev_mode {
                warn!("MongoDB connection failed (dev mode, using in-memory storage): {}", e);
                (Repositories::in_memory(), "memory")
            } else {
                error!("MongoDB connection failed: {}", e);
                std::process::exit(1);
            }
        }
    };

    let mailer: Arc<dyn Mailer> = match args.brevo_api_key.clone().filter(|k| !k.is_empty()) {
        Some(api_key) => Arc::new(BrevoMailer::new(
            api_key,
            args.brevo_sender_email.clone(),
            args.brevo_sender_name.clone(),
        )?),
        None => {
            warn!("BREVO_API_KEY not set - mail is logged instead of sent");
            Arc::new(OutboxMailer::new())
        }
    };

    let sessions = match args.jwt_secret.clone().filter(|_| !args.dev_mode) {
        Some(secret) => SessionIssuer::new(secret)?,
        None => {
            warn!("Using the development session secret");
            SessionIssuer::new_dev()
        }
    };

    let state = Arc::new(AppState::new(args, repos, mailer, sessions, storage));
    server::run(state).await?;

    Ok(())
}
