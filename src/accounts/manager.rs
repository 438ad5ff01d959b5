//! AccountManager: per-account lifecycle management
//!
//! Each configured account gets its own API client, coordinator and
//! scheduler, bundled as an `AccountHandle`. The manager is passed to
//! the HTTP layer explicitly.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;

use crate::config::AccountConfig;
use crate::coordinator::{coordinator_name, RefreshCoordinator, Scheduler, WorkerPool};
use crate::error::{ApiError, AppError, SetupError};
use crate::loggamera::{LoggameraClient, TelemetryApi};
use crate::models::DataGapStatus;

/// A running account: client, scheduler and its background task
pub struct AccountHandle {
    pub name: String,
    pub api: Arc<dyn TelemetryApi>,
    pub scheduler: Arc<Scheduler>,
    pool: WorkerPool,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl AccountHandle {
    pub async fn execute_scenario(&self, scenario_id: i64) -> Result<(), AppError> {
        let api = self.api.clone();
        self.pool
            .run(move || api.execute_scenario(scenario_id))
            .await??;
        Ok(())
    }

    pub async fn data_gaps(&self) -> Result<DataGapStatus, AppError> {
        let api = self.api.clone();
        let status = self.pool.run(move || api.get_data_gap_status()).await??;
        Ok(status)
    }

    /// Wait for the in-flight cycle, then stop the refresh loop
    pub async fn unload(&self) {
        tracing::debug!("[AccountManager] Unloading account {}", self.name);
        self.scheduler.shutdown().await;

        if let Some(task) = self.task.lock().await.take() {
            if let Err(e) = task.await {
                tracing::warn!(
                    "[AccountManager] Scheduler task for {} ended abnormally: {}",
                    self.name,
                    e
                );
            }
        }
    }
}

/// Registry of running accounts
pub struct AccountManager {
    accounts: RwLock<BTreeMap<String, Arc<AccountHandle>>>,
    pool: WorkerPool,
}

impl AccountManager {
    pub fn new(pool: WorkerPool) -> Self {
        Self {
            accounts: RwLock::new(BTreeMap::new()),
            pool,
        }
    }

    /// Build the Loggamera client for an account and set it up
    pub async fn setup_account(&self, account: &AccountConfig) -> Result<Arc<AccountHandle>, SetupError> {
        let cfg = account.clone();
        let client = self
            .pool
            .run(move || LoggameraClient::new(&cfg))
            .await
            .map_err(|e| SetupError::NotReady(e.to_string()))?
            .map_err(|e| SetupError::Config(e.to_string()))?;

        self.setup_with_api(
            &account.name,
            Arc::new(client),
            Duration::from_secs(account.scan_interval),
        )
        .await
    }

    /// Connection test, first refresh, then start the scheduler.
    ///
    /// Connectivity failures map to `SetupError::NotReady` so the caller
    /// retries later instead of giving up on the account.
    pub async fn setup_with_api(
        &self,
        name: &str,
        api: Arc<dyn TelemetryApi>,
        scan_interval: Duration,
    ) -> Result<Arc<AccountHandle>, SetupError> {
        tracing::debug!(
            "[AccountManager] Setting up {} with scan interval: {} seconds",
            name,
            scan_interval.as_secs()
        );

        let connection = api.clone();
        self.pool
            .run(move || connection.get_organizations())
            .await
            .map_err(|e| SetupError::NotReady(e.to_string()))?
            .map_err(|e: ApiError| {
                tracing::error!("[AccountManager] Failed to connect to Loggamera API: {}", e);
                SetupError::NotReady(format!("Failed to connect to Loggamera API: {}", e))
            })?;

        let coordinator = RefreshCoordinator::new(
            coordinator_name(api.organization_id()),
            api.clone(),
            self.pool.clone(),
        );
        let scheduler = Arc::new(Scheduler::new(coordinator, scan_interval));

        scheduler
            .refresh_now()
            .await
            .map_err(|e| SetupError::NotReady(format!("Failed to fetch initial data: {}", e)))?;

        let task = tokio::spawn(scheduler.clone().start());

        let handle = Arc::new(AccountHandle {
            name: name.to_string(),
            api,
            scheduler,
            pool: self.pool.clone(),
            task: Mutex::new(Some(task)),
        });

        // Unload outside the lock; it waits for the old in-flight cycle
        let previous = self
            .accounts
            .write()
            .await
            .insert(name.to_string(), handle.clone());
        if let Some(previous) = previous {
            previous.unload().await;
        }

        tracing::info!("[AccountManager] Account {} ready", name);
        Ok(handle)
    }

    /// Retry setup on a fixed delay until the account is ready
    pub async fn setup_until_ready(&self, account: AccountConfig, retry_delay: Duration) {
        loop {
            match self.setup_account(&account).await {
                Ok(_) => return,
                Err(SetupError::NotReady(msg)) => {
                    tracing::warn!(
                        "[AccountManager] Account {} not ready ({}), retrying in {}s",
                        account.name,
                        msg,
                        retry_delay.as_secs()
                    );
                    tokio::time::sleep(retry_delay).await;
                }
                Err(e) => {
                    tracing::error!("[AccountManager] Account {} setup failed: {}", account.name, e);
                    return;
                }
            }
        }
    }

    pub async fn get(&self, name: &str) -> Option<Arc<AccountHandle>> {
        self.accounts.read().await.get(name).cloned()
    }

    pub async fn list(&self) -> Vec<Arc<AccountHandle>> {
        self.accounts.read().await.values().cloned().collect()
    }

    /// Unload one account
    pub async fn remove(&self, name: &str) -> bool {
        let handle = self.accounts.write().await.remove(name);
        match handle {
            Some(handle) => {
                handle.unload().await;
                tracing::info!("[AccountManager] Removed account {}", name);
                true
            }
            None => false,
        }
    }

    pub async fn unload_all(&self) {
        let handles: Vec<_> = {
            let mut map = self.accounts.write().await;
            std::mem::take(&mut *map).into_values().collect()
        };
        for handle in handles {
            handle.unload().await;
        }
    }
}
