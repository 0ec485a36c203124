use std::sync::Arc;

use service_core::error::AppError;
use service_core::observability::init_tracing;
use tokio::signal;

use authz_service::clock::{Clock, SystemClock};
use authz_service::config::AuthzConfig;
use authz_service::crypto::SecretCipher;
use authz_service::delivery::{EmailProvider, HttpSmsProvider, SmsProvider, SmtpEmailProvider};
use authz_service::registry::RoleRegistry;
use authz_service::services::VerificationPolicy;
use authz_service::store::{AuthzStore, PgStore};
use authz_service::AuthzCore;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();

    let config = AuthzConfig::from_env()?;
    init_tracing(&config.service_name, &config.log_level);

    tracing::info!(
        service = %config.service_name,
        environment = ?config.environment,
        "Starting authorization service"
    );

    let store = PgStore::connect(&config.database).await?;
    store.run_migrations().await?;
    store.health_check().await?;
    let store: Arc<dyn AuthzStore> = Arc::new(store);

    let registry = Arc::new(RoleRegistry::load()?);
    registry.initialize(store.as_ref()).await?;

    let cipher = Arc::new(SecretCipher::from_base64(&config.encryption.key_base64)?);

    let email: Arc<dyn EmailProvider> = Arc::new(
        SmtpEmailProvider::new(config.smtp.clone())
            .map_err(|e| AppError::ConfigError(anyhow::anyhow!(e)))?,
    );
    let sms: Arc<dyn SmsProvider> = Arc::new(HttpSmsProvider::new(config.sms.clone()));

    let policy = VerificationPolicy {
        code_ttl: chrono::Duration::seconds(config.verification.code_ttl_seconds),
        max_attempts: config.verification.max_attempts,
        send_limit: config.verification.send_limit,
        send_window: chrono::Duration::seconds(config.verification.send_window_seconds),
    };

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let core = AuthzCore::new(
        store,
        registry,
        cipher,
        email,
        sms,
        clock,
        config.totp.issuer.clone(),
        policy,
    );

    let sweep = core.verification.spawn_cleanup_task(std::time::Duration::from_secs(
        config.verification.sweep_interval_seconds,
    ));

    tracing::info!("Authorization core ready");

    shutdown_signal().await;

    sweep.abort();
    tracing::info!("Service shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, starting graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
