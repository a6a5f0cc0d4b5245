//! Procura API Server
//!
//! Main entry point for the procurement workflow service.

use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use procura_api::notify::{SmtpEmailSink, SseBroadcaster};
use procura_api::{AppState, create_router};
use procura_core::ProcurementService;
use procura_core::notify::{EmailSink, EventDispatcher, NoopSink};
use procura_core::policy::WorkflowPolicy;
use procura_db::{PgStore, connect_with};
use procura_shared::{AppConfig, EmailService, JwtConfig, JwtService};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "procura=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::load().context("failed to load configuration")?;

    let db = connect_with(&config.database).await?;
    info!("Connected to database");
    let store = Arc::new(PgStore::new(db));

    let jwt_service = JwtService::new(JwtConfig {
        secret: config.jwt.secret.clone(),
        access_token_expires_minutes: i64::try_from(config.jwt.access_token_expiry_secs / 60)
            .context("jwt.access_token_expiry_secs is too large")?,
    });

    let email: Arc<dyn EmailSink> = match &config.email {
        Some(email) => {
            info!(
                smtp_host = %email.smtp_host,
                smtp_port = %email.smtp_port,
                "Email service configured"
            );
            Arc::new(SmtpEmailSink::new(
                EmailService::new(email.clone()),
                store.clone(),
            ))
        }
        None => {
            info!("No SMTP configuration, workflow emails disabled");
            Arc::new(NoopSink)
        }
    };

    let broadcaster = Arc::new(SseBroadcaster::new());
    let dispatcher = EventDispatcher::new(store.clone(), email, broadcaster.clone());
    let policy = WorkflowPolicy::from(&config.workflow);
    info!(
        bid_window_days = config.workflow.bid_window_days,
        purchase_order_requires_approval = config.workflow.purchase_order_requires_approval,
        "Workflow policy loaded"
    );

    let state = AppState {
        service: ProcurementService::new(store, dispatcher, policy),
        jwt_service: Arc::new(jwt_service),
        broadcaster,
    };

    let app = create_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
