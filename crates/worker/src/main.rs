mod observability;
mod schedule;

use std::sync::Arc;
use std::time::Instant;

use srscs_domain::ports::push::PushTransport;
use srscs_domain::reconcile::TokenReconciler;
use srscs_infra::fcm::FcmTransport;
use srscs_infra::stores::{InMemoryAccountStore, InMemoryPushTransport};
use srscs_infra::{config::AppConfig, logging::init_tracing};
use time::{OffsetDateTime, UtcOffset};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load()?;
    init_tracing(&config)?;
    observability::init_metrics()?;

    let accounts = Arc::new(InMemoryAccountStore::new());
    let transport: Arc<dyn PushTransport> = match config.push_backend.as_str() {
        "fcm" => {
            // The account store has no remote adapter yet; an unseeded
            // memory store means the sweep lists nothing.
            warn!("fcm backend selected but the account store is in-memory; sweeps only see seeded accounts");
            Arc::new(FcmTransport::from_config(&config)?)
        }
        _ => Arc::new(InMemoryPushTransport::new()),
    };
    let reconciler = TokenReconciler::new(accounts, transport);

    let offset = UtcOffset::from_hms(config.sweep_utc_offset_hours, 0, 0)?;
    info!(
        hour = config.sweep_hour,
        offset_hours = config.sweep_utc_offset_hours,
        backend = %config.push_backend,
        "legacy token sweep scheduler started"
    );

    loop {
        let delay = schedule::next_sweep_delay(OffsetDateTime::now_utc(), config.sweep_hour, offset);
        info!(delay_secs = delay.as_secs(), "next sweep scheduled");

        tokio::select! {
            _ = tokio::time::sleep(delay) => {
                let started = Instant::now();
                match reconciler.sweep_legacy_tokens().await {
                    Ok(cleared) => {
                        observability::record_sweep("ok", cleared, started.elapsed());
                    }
                    Err(err) => {
                        error!(error = %err, "legacy token sweep failed");
                        observability::record_sweep("error", 0, started.elapsed());
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown signal received");
                break;
            }
        }
    }

    Ok(())
}
