use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::Mutex;

use salus_config::ServiceConfig;

use crate::audit::AuditState;
use crate::db::{open_db, StoreError};
use crate::listings::ListingState;
use crate::tasks;
use crate::usage::UsageState;

/// Owns the embedded database and every state module over it. Handlers
/// share it behind `Arc<Mutex<..>>`.
#[derive(Clone)]
pub struct DataStore {
    pub config: ServiceConfig,
    pub usage_state: UsageState,
    pub audit_state: AuditState,
    pub listing_state: ListingState,
}

impl DataStore {
    pub fn new(config: ServiceConfig) -> Result<Self, StoreError> {
        let db = open_db(&config.db_path)?;
        Ok(Self {
            usage_state: UsageState::new(db.clone()),
            audit_state: AuditState::new(db.clone()),
            listing_state: ListingState::new(db),
            config,
        })
    }

    /// Serves the HTTP API and drives the periodic retention sweep until
    /// the shutdown signal fires.
    pub async fn run(
        self,
        mut shutdown: tokio::sync::broadcast::Receiver<()>,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let addr = format!("0.0.0.0:{}", self.config.api_port);
        let sweep_interval = Duration::from_secs(self.config.sweep_interval_secs);

        let datastore = Arc::new(Mutex::new(self));
        let router = crate::api::app(datastore.clone());
        let listener = TcpListener::bind(&addr).await?;
        log::info!("Running state server on {addr}...");
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router).await {
                eprintln!("Error serving State API Server: {e}");
            }
        });

        loop {
            tokio::select! {
                _ = tokio::time::sleep(sweep_interval) => {
                    let guard = datastore.lock().await;
                    match tasks::run_sweep(&guard) {
                        Ok(report) => log::info!(
                            "Retention sweep removed {} ledger rows older than {}",
                            report.deleted,
                            report.cutoff_date
                        ),
                        Err(e) => log::error!("Retention sweep failed: {e}"),
                    }
                }
                _ = shutdown.recv() => {
                    break;
                }
            }
        }

        Ok(())
    }
}
