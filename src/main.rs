use authcore::configuration::get_configuration;
use authcore::store::{PgSessionStore, SessionStore};
use authcore::telemetry::init_telemetry;
use authcore::RequestContext;
use sqlx::postgres::PgPoolOptions;

/// Housekeeping run: deletes expired refresh sessions and exits.
/// Intended to be scheduled externally (cron, k8s CronJob).
#[tokio::main]
async fn main() -> std::io::Result<()> {
    // Structured logging
    init_telemetry();

    tracing::info!("Starting expired session sweep");

    // Load settings
    let configuration = match get_configuration() {
        Ok(config) => {
            tracing::info!("Configuration loaded successfully");
            config
        }
        Err(e) => {
            tracing::error!("Failed to read configuration: {}", e);
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "Configuration error",
            ));
        }
    };

    // Connection pool
    tracing::info!("Attempting to connect to database");
    let pool = PgPoolOptions::new()
        .max_connections(configuration.database.max_connections)
        .connect(&configuration.database.connection_string())
        .await
        .map_err(|e| {
            tracing::error!("Failed to create connection pool: {}", e);
            std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "Database connection error",
            )
        })?;

    let store = PgSessionStore::new(pool);
    let ctx = RequestContext::with_timeout(configuration.auth.store_timeout());

    // Sweep expired sessions
    match store.delete_expired(&ctx).await {
        Ok(deleted) => {
            let remaining = store.count(&ctx).await.unwrap_or_default();
            tracing::info!(deleted, remaining, "Expired session sweep finished");
            Ok(())
        }
        Err(e) => {
            tracing::error!(error = %e, "Expired session sweep failed");
            Err(std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))
        }
    }
}
