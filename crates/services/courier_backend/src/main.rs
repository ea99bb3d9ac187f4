// File: services/courier_backend/src/main.rs
use std::sync::Arc;
use std::time::Duration;

use axum::{routing::get, Router};
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use courier_common::logging;
use courier_config::{load_config, Environment};
use courier_db::{
    DbClient, DeviceTokenRepository, InMemoryDeviceTokenRepository, SqlDeviceTokenRepository,
};
use courier_notify::{
    retry_policy, NotificationService, NotifyState, ProviderRegistry,
};
use courier_templates::manager::TemplateManager;
use courier_templates::seed::seed_defaults;
use courier_templates::store::{InMemoryTemplateStore, TemplateStore};
use courier_templates::usage::{InMemoryUsageLog, UsageLog};
use courier_webhooks::{DeliveryTracker, WebhookState};

#[tokio::main]
async fn main() {
    logging::init();

    let config = load_config().expect("Failed to load config");
    let environment = config.environment;

    // Misconfigured providers stop the process here, not at the first send.
    let registry = ProviderRegistry::from_config(&config).expect("Invalid provider configuration");

    let store: Arc<dyn TemplateStore> = Arc::new(InMemoryTemplateStore::new());
    let manager = TemplateManager::new(Arc::clone(&store));
    if environment != Environment::Production {
        match seed_defaults(&manager).await {
            Ok(count) => info!(count, "Seeded default templates"),
            Err(err) => warn!(error = %err, "Failed to seed default templates"),
        }
    }

    let usage_log: Arc<dyn UsageLog> = Arc::new(InMemoryUsageLog::new());
    let tracker = Arc::new(DeliveryTracker::new(Arc::clone(&usage_log)));

    let tokens: Arc<dyn DeviceTokenRepository> = match &config.database {
        Some(db_config) => {
            let client = DbClient::from_config(db_config)
                .await
                .expect("Failed to connect to database");
            let repo = SqlDeviceTokenRepository::new(client);
            repo.init_schema()
                .await
                .expect("Failed to initialize device token schema");
            info!("Device token registry backed by database");
            Arc::new(repo)
        }
        None => {
            info!("No [database] section; device token registry is in-memory");
            Arc::new(InMemoryDeviceTokenRepository::new())
        }
    };

    if let Some(push) = &config.push {
        spawn_token_cleanup(Arc::clone(&tokens), push.token_max_idle_days);
    }

    let service = NotificationService::new(
        registry,
        retry_policy(&config.retry),
        Arc::clone(&store),
        Arc::clone(&usage_log),
        Arc::clone(&tracker),
        Arc::clone(&tokens),
    );

    let notify_state = Arc::new(NotifyState {
        service: Arc::new(service),
        manager,
        usage_log,
        tokens,
    });

    let webhook_state = Arc::new(WebhookState {
        tracker,
        verify_token: config
            .whatsapp
            .as_ref()
            .map(|w| w.verify_token.clone())
            .unwrap_or_default(),
        app_secret: config.whatsapp.as_ref().and_then(|w| w.app_secret.clone()),
    });

    let api_router = Router::new()
        .route("/", get(|| async { "Courier API" }))
        .merge(courier_notify::routes(notify_state))
        .merge(courier_webhooks::routes(webhook_state));
    let app = Router::new().nest("/api", api_router);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await.expect("Failed to bind address");
    info!("Courier listening on http://{addr}/api");

    axum::serve(listener, app.into_make_service())
        .await
        .expect("Server error");
}

/// Daily sweep removing invalid and long-idle device tokens.
fn spawn_token_cleanup(tokens: Arc<dyn DeviceTokenRepository>, max_idle_days: i64) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(24 * 60 * 60));
        loop {
            interval.tick().await;
            match tokens.cleanup(chrono::Duration::days(max_idle_days)).await {
                Ok(removed) if removed > 0 => info!(removed, "Device token cleanup"),
                Ok(_) => {}
                Err(err) => error!(error = %err, "Device token cleanup failed"),
            }
        }
    });
}
