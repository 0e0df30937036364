//! Config Entries Manager
//!
//! Drives each entry through setup, retry, reload and unload, and holds the
//! runtime object the integration created for it.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use ha_core::Unsubscribe;
use tracing::{debug, info, warn};

use crate::entry::{ConfigEntry, ConfigEntryState, ConfigEntryUpdate};
use crate::error::{ConfigEntriesError, ConfigEntriesResult, SetupError};
use crate::reauth::ReauthFlows;
use crate::state_machine::calculate_retry_delay;

/// The live side of a loaded config entry.
///
/// A runtime is created for every setup attempt and dropped after unload or
/// failed setup. A failed `setup` must leave nothing registered.
#[async_trait]
pub trait EntryRuntime: Send + Sync {
    /// Bring the entry up
    async fn setup(&self) -> Result<(), SetupError>;

    /// Tear the entry down. Called while `setup` is still pending to
    /// cancel it, so it must be idempotent.
    async fn unload(&self) -> bool;

    /// Whether `entry`, after an update, differs from the configuration
    /// this runtime was created with in a way that needs a reload
    fn reload_required(&self, _entry: &ConfigEntry) -> bool {
        false
    }
}

/// An integration that can create runtimes for its config entries
pub trait Integration: Send + Sync {
    fn domain(&self) -> &str;

    fn create_runtime(&self, entry: &ConfigEntry) -> Result<Arc<dyn EntryRuntime>, SetupError>;
}

/// Config Entries Manager
pub struct ConfigEntries {
    /// Primary index: entry_id -> ConfigEntry
    entries: DashMap<String, ConfigEntry>,

    /// Index: domain -> set of entry_ids
    by_domain: DashMap<String, HashSet<String>>,

    /// Index: (domain, unique_id) -> entry_id
    by_unique_id: DashMap<(String, String), String>,

    /// Integrations by domain
    integrations: DashMap<String, Arc<dyn Integration>>,

    /// Runtime of every entry being set up or loaded
    runtimes: DashMap<String, Arc<dyn EntryRuntime>>,

    /// Scheduled setup retries
    retries: DashMap<String, Unsubscribe>,

    reauth: ReauthFlows,
}

impl ConfigEntries {
    pub fn new() -> Self {
        Self::with_reauth_flows(ReauthFlows::new())
    }

    pub fn with_reauth_flows(reauth: ReauthFlows) -> Self {
        Self {
            entries: DashMap::new(),
            by_domain: DashMap::new(),
            by_unique_id: DashMap::new(),
            integrations: DashMap::new(),
            runtimes: DashMap::new(),
            retries: DashMap::new(),
            reauth,
        }
    }

    /// Handle to the reauth flows started for these entries
    pub fn reauth_flows(&self) -> ReauthFlows {
        self.reauth.clone()
    }

    /// Register the integration that sets up entries of its domain
    pub fn register_integration(&self, integration: Arc<dyn Integration>) {
        debug!(domain = integration.domain(), "Registered integration");
        self.integrations
            .insert(integration.domain().to_string(), integration);
    }

    fn index_entry(&self, entry: &ConfigEntry) {
        let entry_id = entry.entry_id.clone();

        self.entries.insert(entry_id.clone(), entry.clone());

        self.by_domain
            .entry(entry.domain.clone())
            .or_default()
            .insert(entry_id.clone());

        if let Some(ref unique_id) = entry.unique_id {
            self.by_unique_id
                .insert((entry.domain.clone(), unique_id.clone()), entry_id);
        }
    }

    fn unindex_entry(&self, entry: &ConfigEntry) {
        if let Some(mut ids) = self.by_domain.get_mut(&entry.domain) {
            ids.remove(&entry.entry_id);
        }

        if let Some(ref unique_id) = entry.unique_id {
            self.by_unique_id
                .remove(&(entry.domain.clone(), unique_id.clone()));
        }

        self.entries.remove(&entry.entry_id);
    }

    /// Get an entry by ID
    pub fn get(&self, entry_id: &str) -> Option<ConfigEntry> {
        self.entries.get(entry_id).map(|r| r.value().clone())
    }

    /// Get all entries for a domain
    pub fn get_by_domain(&self, domain: &str) -> Vec<ConfigEntry> {
        let ids: Vec<String> = self
            .by_domain
            .get(domain)
            .map(|ids| ids.iter().cloned().collect())
            .unwrap_or_default();
        ids.iter().filter_map(|id| self.get(id)).collect()
    }

    /// Get entry by unique_id
    pub fn get_by_unique_id(&self, domain: &str, unique_id: &str) -> Option<ConfigEntry> {
        let entry_id = self
            .by_unique_id
            .get(&(domain.to_string(), unique_id.to_string()))
            .map(|r| r.value().clone())?;
        self.get(&entry_id)
    }

    /// Current state of an entry
    pub fn state(&self, entry_id: &str) -> Option<ConfigEntryState> {
        self.entries.get(entry_id).map(|r| r.state)
    }

    /// Add a new config entry
    pub fn add(&self, entry: ConfigEntry) -> ConfigEntriesResult<ConfigEntry> {
        if let Some(ref unique_id) = entry.unique_id {
            if self.get_by_unique_id(&entry.domain, unique_id).is_some() {
                return Err(ConfigEntriesError::AlreadyExists {
                    domain: entry.domain.clone(),
                    unique_id: unique_id.clone(),
                });
            }
        }

        self.index_entry(&entry);
        info!(
            entry_id = %entry.entry_id,
            domain = %entry.domain,
            title = %entry.title,
            "Added config entry"
        );
        Ok(entry)
    }

    /// Apply `update` to an entry without reloading it
    fn apply_update(
        &self,
        entry_id: &str,
        update: ConfigEntryUpdate,
    ) -> ConfigEntriesResult<ConfigEntry> {
        let mut entry = self
            .entries
            .get_mut(entry_id)
            .ok_or_else(|| ConfigEntriesError::NotFound(entry_id.to_string()))?;

        if let Some(title) = update.title {
            entry.title = title;
        }
        if let Some(data) = update.data {
            entry.data = data;
        }
        if let Some(options) = update.options {
            entry.options = options;
        }
        entry.modified_at = Utc::now();
        Ok(entry.clone())
    }

    /// Update an entry and reload it if its runtime asks for that.
    ///
    /// Returns whether the entry was reloaded.
    pub async fn update_entry(
        self: &Arc<Self>,
        entry_id: &str,
        update: ConfigEntryUpdate,
    ) -> ConfigEntriesResult<bool> {
        let updated = self.apply_update(entry_id, update)?;
        debug!(entry_id, "Updated config entry");

        let reload = self
            .runtime(entry_id)
            .map(|runtime| runtime.reload_required(&updated))
            .unwrap_or(false);
        if reload {
            info!(entry_id, title = %updated.title, "Configuration changed, reloading entry");
            self.reload(entry_id).await?;
        }
        Ok(reload)
    }

    /// Replace an entry's options, reloading it when needed
    pub async fn update_options(
        self: &Arc<Self>,
        entry_id: &str,
        options: HashMap<String, serde_json::Value>,
    ) -> ConfigEntriesResult<bool> {
        self.update_entry(entry_id, ConfigEntryUpdate::new().options(options))
            .await
    }

    /// Finish a reauth flow with new credentials and reload the entry
    pub async fn complete_reauth(
        self: &Arc<Self>,
        entry_id: &str,
        data: HashMap<String, serde_json::Value>,
    ) -> ConfigEntriesResult<()> {
        self.apply_update(entry_id, ConfigEntryUpdate::new().data(data))?;
        if let Some(flow) = self.reauth.finish(entry_id) {
            info!(entry_id, flow_id = %flow.flow_id, "Reauth flow completed");
        }
        self.reload(entry_id).await
    }

    /// Unload and remove an entry
    pub async fn remove(&self, entry_id: &str) -> ConfigEntriesResult<ConfigEntry> {
        self.unload(entry_id).await?;
        let entry = self
            .get(entry_id)
            .ok_or_else(|| ConfigEntriesError::NotFound(entry_id.to_string()))?;
        self.unindex_entry(&entry);
        self.reauth.finish(entry_id);

        info!(entry_id, domain = %entry.domain, "Removed config entry");
        Ok(entry)
    }

    fn transition(
        &self,
        entry_id: &str,
        state: ConfigEntryState,
        reason: Option<String>,
    ) -> ConfigEntriesResult<()> {
        let mut entry = self
            .entries
            .get_mut(entry_id)
            .ok_or_else(|| ConfigEntriesError::NotFound(entry_id.to_string()))?;
        entry.try_set_state(state, reason)?;
        debug!(entry_id, ?state, "Entry state changed");
        Ok(())
    }

    fn runtime(&self, entry_id: &str) -> Option<Arc<dyn EntryRuntime>> {
        self.runtimes.get(entry_id).map(|r| r.value().clone())
    }

    /// Set up an entry.
    ///
    /// A not-ready device leaves the entry in `SetupRetry` with a retry
    /// scheduled; an authentication failure starts a reauth flow.
    pub async fn setup(self: &Arc<Self>, entry_id: &str) -> ConfigEntriesResult<()> {
        let lock = self
            .get(entry_id)
            .ok_or_else(|| ConfigEntriesError::NotFound(entry_id.to_string()))?
            .setup_lock;
        let _guard = lock.lock().await;
        self.cancel_retry(entry_id);

        let entry = self
            .get(entry_id)
            .ok_or_else(|| ConfigEntriesError::NotFound(entry_id.to_string()))?;

        if entry.is_disabled() {
            debug!(entry_id, "Skipping setup for disabled entry");
            return Ok(());
        }

        let integration = self
            .integrations
            .get(&entry.domain)
            .map(|r| r.value().clone())
            .ok_or_else(|| ConfigEntriesError::UnknownIntegration(entry.domain.clone()))?;

        self.transition(entry_id, ConfigEntryState::SetupInProgress, None)?;

        let result = match integration.create_runtime(&entry) {
            Ok(runtime) => {
                self.runtimes.insert(entry_id.to_string(), runtime.clone());
                runtime.setup().await
            }
            Err(err) => Err(err),
        };

        match result {
            Ok(()) => {
                self.transition(entry_id, ConfigEntryState::Loaded, None)?;
                info!(entry_id, title = %entry.title, "Setup completed");
                Ok(())
            }
            Err(err) => {
                self.runtimes.remove(entry_id);
                self.handle_setup_error(&entry, err)
            }
        }
    }

    fn handle_setup_error(
        self: &Arc<Self>,
        entry: &ConfigEntry,
        err: SetupError,
    ) -> ConfigEntriesResult<()> {
        let entry_id = entry.entry_id.as_str();
        match &err {
            SetupError::NotReady(reason) => {
                self.transition(entry_id, ConfigEntryState::SetupRetry, Some(reason.clone()))?;
                let tries = self
                    .entries
                    .get_mut(entry_id)
                    .map(|mut e| e.increment_tries())
                    .unwrap_or(1);
                let delay = calculate_retry_delay(tries - 1);
                warn!(
                    entry_id,
                    %reason,
                    tries,
                    retry_in = ?delay,
                    "Device not ready, retrying setup"
                );
                self.schedule_retry(entry_id, delay);
            }
            SetupError::AuthFailed(reason) => {
                self.transition(entry_id, ConfigEntryState::SetupError, Some(reason.clone()))?;
                warn!(entry_id, %reason, "Authentication failed during setup");
                self.reauth.start(entry);
            }
            SetupError::Failed(reason) => {
                self.transition(entry_id, ConfigEntryState::SetupError, Some(reason.clone()))?;
                warn!(entry_id, %reason, "Setup failed");
            }
        }
        Err(ConfigEntriesError::Setup(err))
    }

    fn schedule_retry(self: &Arc<Self>, entry_id: &str, delay: Duration) {
        let manager = Arc::downgrade(self);
        let id = entry_id.to_string();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(manager) = manager.upgrade() else {
                return;
            };
            manager.retries.remove(&id);
            if let Err(err) = manager.setup(&id).await {
                debug!(entry_id = %id, %err, "Setup retry did not succeed");
            }
        });

        let cancel = Unsubscribe::new(move || task.abort());
        if let Some(previous) = self.retries.insert(entry_id.to_string(), cancel) {
            previous.call();
        }
    }

    fn cancel_retry(&self, entry_id: &str) {
        if let Some((_, cancel)) = self.retries.remove(entry_id) {
            if cancel.call() {
                debug!(entry_id, "Cancelled scheduled setup retry");
            }
        }
    }

    /// Unload an entry.
    ///
    /// Unloading an entry whose setup is still pending cancels that setup
    /// first, then waits for it to return.
    pub async fn unload(&self, entry_id: &str) -> ConfigEntriesResult<()> {
        let entry = self
            .get(entry_id)
            .ok_or_else(|| ConfigEntriesError::NotFound(entry_id.to_string()))?;
        self.cancel_retry(entry_id);

        if entry.state == ConfigEntryState::SetupInProgress {
            if let Some(runtime) = self.runtime(entry_id) {
                debug!(entry_id, "Cancelling setup in progress");
                runtime.unload().await;
            }
        }

        let _guard = entry.setup_lock.lock().await;

        let state = self
            .state(entry_id)
            .ok_or_else(|| ConfigEntriesError::NotFound(entry_id.to_string()))?;
        if state == ConfigEntryState::NotLoaded {
            return Ok(());
        }
        if !state.is_recoverable() {
            return Err(ConfigEntriesError::CannotUnload(state));
        }

        self.transition(entry_id, ConfigEntryState::UnloadInProgress, None)?;

        let unloaded = match self.runtimes.remove(entry_id) {
            Some((_, runtime)) => runtime.unload().await,
            None => true,
        };

        if unloaded {
            self.transition(entry_id, ConfigEntryState::NotLoaded, None)?;
            info!(entry_id, title = %entry.title, "Unloaded entry");
            Ok(())
        } else {
            self.transition(
                entry_id,
                ConfigEntryState::FailedUnload,
                Some("integration refused to unload".to_string()),
            )?;
            Err(ConfigEntriesError::UnloadFailed(entry_id.to_string()))
        }
    }

    /// Reload an entry (unload + setup)
    pub async fn reload(self: &Arc<Self>, entry_id: &str) -> ConfigEntriesResult<()> {
        self.unload(entry_id).await?;
        self.setup(entry_id).await
    }

    /// Get all entry IDs
    pub fn entry_ids(&self) -> Vec<String> {
        self.entries.iter().map(|r| r.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Set up every entry concurrently
    pub async fn setup_all(self: &Arc<Self>) -> Vec<(String, ConfigEntriesResult<()>)> {
        let entry_ids = self.entry_ids();
        let results = futures::future::join_all(entry_ids.iter().map(|id| self.setup(id))).await;
        entry_ids.into_iter().zip(results).collect()
    }

    /// Unload every entry, cancelling pending setups and retries
    pub async fn shutdown_all(&self) {
        let entry_ids = self.entry_ids();
        let results = futures::future::join_all(entry_ids.iter().map(|id| self.unload(id))).await;
        for (entry_id, result) in entry_ids.iter().zip(results) {
            if let Err(err) = result {
                warn!(entry_id = %entry_id, %err, "Failed to unload entry at shutdown");
            }
        }
        info!(entries = entry_ids.len(), "All config entries shut down");
    }
}

impl Default for ConfigEntries {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::sync::Notify;
    use tokio_test::{assert_err, assert_ok};

    const DOMAIN: &str = "test_lock";

    /// Runtime whose setup result is taken from a script
    struct ScriptedRuntime {
        result: Result<(), SetupError>,
        title: String,
        unloads: Arc<AtomicUsize>,
        gate: Option<Arc<Notify>>,
    }

    #[async_trait]
    impl EntryRuntime for ScriptedRuntime {
        async fn setup(&self) -> Result<(), SetupError> {
            if let Some(gate) = &self.gate {
                gate.notified().await;
                return Err(SetupError::Failed("setup cancelled".to_string()));
            }
            self.result.clone()
        }

        async fn unload(&self) -> bool {
            self.unloads.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.notify_one();
            }
            true
        }

        fn reload_required(&self, entry: &ConfigEntry) -> bool {
            entry.title != self.title
        }
    }

    #[derive(Default)]
    struct ScriptedIntegration {
        results: Mutex<VecDeque<Result<(), SetupError>>>,
        created: AtomicUsize,
        unloads: Arc<AtomicUsize>,
        gate: Option<Arc<Notify>>,
    }

    impl ScriptedIntegration {
        fn with_results(results: Vec<Result<(), SetupError>>) -> Arc<Self> {
            Arc::new(Self {
                results: Mutex::new(results.into()),
                ..Self::default()
            })
        }
    }

    impl Integration for ScriptedIntegration {
        fn domain(&self) -> &str {
            DOMAIN
        }

        fn create_runtime(
            &self,
            entry: &ConfigEntry,
        ) -> Result<Arc<dyn EntryRuntime>, SetupError> {
            self.created.fetch_add(1, Ordering::SeqCst);
            let result = self.results.lock().unwrap().pop_front().unwrap_or(Ok(()));
            Ok(Arc::new(ScriptedRuntime {
                result,
                title: entry.title.clone(),
                unloads: self.unloads.clone(),
                gate: self.gate.clone(),
            }))
        }
    }

    fn manager_with(integration: Arc<ScriptedIntegration>) -> (Arc<ConfigEntries>, String) {
        let manager = Arc::new(ConfigEntries::new());
        manager.register_integration(integration);
        let entry = manager
            .add(ConfigEntry::new(DOMAIN, "Front Door").with_unique_id("AA:BB:CC:DD:EE:FF"))
            .unwrap();
        (manager, entry.entry_id)
    }

    #[tokio::test]
    async fn test_duplicate_unique_id_rejected() {
        let (manager, _) = manager_with(ScriptedIntegration::with_results(vec![]));
        let result = manager
            .add(ConfigEntry::new(DOMAIN, "Other").with_unique_id("AA:BB:CC:DD:EE:FF"));

        assert!(matches!(
            result,
            Err(ConfigEntriesError::AlreadyExists { .. })
        ));
        assert_eq!(manager.get_by_domain(DOMAIN).len(), 1);
    }

    #[tokio::test]
    async fn test_setup_and_unload() {
        let integration = ScriptedIntegration::with_results(vec![Ok(())]);
        let (manager, id) = manager_with(integration.clone());

        assert_ok!(manager.setup(&id).await);
        assert_eq!(manager.state(&id), Some(ConfigEntryState::Loaded));

        assert_ok!(manager.unload(&id).await);
        assert_eq!(manager.state(&id), Some(ConfigEntryState::NotLoaded));
        assert_eq!(integration.unloads.load(Ordering::SeqCst), 1);

        // Unloading again is a no-op
        manager.unload(&id).await.unwrap();
        assert_eq!(integration.unloads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unknown_integration() {
        let manager = Arc::new(ConfigEntries::new());
        let entry = manager.add(ConfigEntry::new("missing", "Nothing")).unwrap();
        let result = manager.setup(&entry.entry_id).await;
        assert!(matches!(
            result,
            Err(ConfigEntriesError::UnknownIntegration(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_ready_schedules_retry() {
        let integration = ScriptedIntegration::with_results(vec![
            Err(SetupError::NotReady("timed out".into())),
            Ok(()),
        ]);
        let (manager, id) = manager_with(integration.clone());

        let result = manager.setup(&id).await;
        assert!(matches!(
            result,
            Err(ConfigEntriesError::Setup(SetupError::NotReady(_)))
        ));
        let entry = manager.get(&id).unwrap();
        assert_eq!(entry.state, ConfigEntryState::SetupRetry);
        assert_eq!(entry.reason.as_deref(), Some("timed out"));
        assert_eq!(entry.tries, 1);

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(manager.state(&id), Some(ConfigEntryState::Loaded));
        assert_eq!(integration.created.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unload_cancels_scheduled_retry() {
        let integration =
            ScriptedIntegration::with_results(vec![Err(SetupError::NotReady("timed out".into()))]);
        let (manager, id) = manager_with(integration.clone());

        assert_err!(manager.setup(&id).await);
        assert_ok!(manager.unload(&id).await);

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(manager.state(&id), Some(ConfigEntryState::NotLoaded));
        assert_eq!(integration.created.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_auth_failure_starts_reauth_without_retry() {
        let integration = ScriptedIntegration::with_results(vec![Err(SetupError::AuthFailed(
            "bad key".into(),
        ))]);
        let (manager, id) = manager_with(integration);

        let result = manager.setup(&id).await;
        assert!(matches!(
            result,
            Err(ConfigEntriesError::Setup(SetupError::AuthFailed(_)))
        ));
        assert_eq!(manager.state(&id), Some(ConfigEntryState::SetupError));
        assert_eq!(manager.reauth_flows().requests(&id), 1);
        assert!(manager.retries.is_empty());
    }

    #[tokio::test]
    async fn test_complete_reauth_reloads() {
        let integration = ScriptedIntegration::with_results(vec![
            Err(SetupError::AuthFailed("bad key".into())),
            Ok(()),
        ]);
        let (manager, id) = manager_with(integration);
        assert_err!(manager.setup(&id).await);

        manager
            .complete_reauth(&id, HashMap::from([("key".to_string(), json!("new"))]))
            .await
            .unwrap();

        assert_eq!(manager.state(&id), Some(ConfigEntryState::Loaded));
        assert_eq!(manager.get(&id).unwrap().data_str("key"), Some("new"));
        assert!(!manager.reauth_flows().in_progress(&id));
    }

    #[tokio::test]
    async fn test_update_reloads_only_when_runtime_asks() {
        let integration = ScriptedIntegration::with_results(vec![]);
        let (manager, id) = manager_with(integration.clone());
        manager.setup(&id).await.unwrap();

        let reloaded = manager
            .update_options(&id, HashMap::from([("flag".to_string(), json!(true))]))
            .await
            .unwrap();
        assert!(!reloaded);
        assert_eq!(integration.created.load(Ordering::SeqCst), 1);

        let reloaded = manager
            .update_entry(&id, ConfigEntryUpdate::new().title("Back Door"))
            .await
            .unwrap();
        assert!(reloaded);
        assert_eq!(integration.created.load(Ordering::SeqCst), 2);
        assert_eq!(manager.state(&id), Some(ConfigEntryState::Loaded));
    }

    #[tokio::test]
    async fn test_unload_during_setup_cancels_it() {
        let integration = Arc::new(ScriptedIntegration {
            gate: Some(Arc::new(Notify::new())),
            ..ScriptedIntegration::default()
        });
        let (manager, id) = manager_with(integration.clone());

        let setup = tokio::spawn({
            let manager = manager.clone();
            let id = id.clone();
            async move { manager.setup(&id).await }
        });
        while manager.state(&id) != Some(ConfigEntryState::SetupInProgress) {
            tokio::task::yield_now().await;
        }

        manager.unload(&id).await.unwrap();
        let result = setup.await.unwrap();

        assert!(matches!(
            result,
            Err(ConfigEntriesError::Setup(SetupError::Failed(_)))
        ));
        assert_eq!(manager.state(&id), Some(ConfigEntryState::NotLoaded));
    }

    #[tokio::test]
    async fn test_remove_and_shutdown_all() {
        let integration = ScriptedIntegration::with_results(vec![]);
        let (manager, id) = manager_with(integration.clone());
        let other = manager.add(ConfigEntry::new(DOMAIN, "Back Door")).unwrap();

        let results = manager.setup_all().await;
        assert!(results.iter().all(|(_, r)| r.is_ok()));

        manager.remove(&id).await.unwrap();
        assert_eq!(manager.len(), 1);
        assert!(manager.get_by_unique_id(DOMAIN, "AA:BB:CC:DD:EE:FF").is_none());

        manager.shutdown_all().await;
        assert_eq!(
            manager.state(&other.entry_id),
            Some(ConfigEntryState::NotLoaded)
        );
        assert_eq!(integration.unloads.load(Ordering::SeqCst), 2);
    }
}
