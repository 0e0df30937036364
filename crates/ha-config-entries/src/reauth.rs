//! Reauthentication flows
//!
//! When a device rejects the stored credentials the integration asks the
//! host to start a reauth flow. At most one flow is open per entry; every
//! further request while it is open is counted against it.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{info, warn};

use crate::entry::ConfigEntry;

/// An open reauthentication flow
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReauthFlow {
    pub flow_id: String,
    pub entry_id: String,
    pub domain: String,
    pub title: String,
    pub started_at: DateTime<Utc>,
    /// Requests received for this entry since the flow opened
    pub requests: u32,
}

/// Shared handle to the host's reauth flows.
///
/// Cloning shares the underlying table, so integrations can hold a handle
/// without referencing the config entry manager.
#[derive(Debug, Clone, Default)]
pub struct ReauthFlows {
    flows: Arc<DashMap<String, ReauthFlow>>,
}

impl ReauthFlows {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request reauthentication for `entry`.
    ///
    /// Returns the id of the flow the request was recorded against.
    pub fn start(&self, entry: &ConfigEntry) -> String {
        let mut flow = self
            .flows
            .entry(entry.entry_id.clone())
            .or_insert_with(|| {
                info!(
                    entry_id = %entry.entry_id,
                    domain = %entry.domain,
                    title = %entry.title,
                    "Starting reauth flow"
                );
                ReauthFlow {
                    flow_id: ulid::Ulid::new().to_string(),
                    entry_id: entry.entry_id.clone(),
                    domain: entry.domain.clone(),
                    title: entry.title.clone(),
                    started_at: Utc::now(),
                    requests: 0,
                }
            });
        flow.requests += 1;
        if flow.requests > 1 {
            warn!(
                entry_id = %entry.entry_id,
                requests = flow.requests,
                "Reauth requested again while a flow is open"
            );
        }
        flow.flow_id.clone()
    }

    /// The open flow for an entry
    pub fn get(&self, entry_id: &str) -> Option<ReauthFlow> {
        self.flows.get(entry_id).map(|f| f.clone())
    }

    pub fn in_progress(&self, entry_id: &str) -> bool {
        self.flows.contains_key(entry_id)
    }

    /// Number of requests recorded for an entry's open flow
    pub fn requests(&self, entry_id: &str) -> u32 {
        self.flows.get(entry_id).map(|f| f.requests).unwrap_or(0)
    }

    /// Close the flow for an entry
    pub fn finish(&self, entry_id: &str) -> Option<ReauthFlow> {
        self.flows.remove(entry_id).map(|(_, flow)| flow)
    }

    /// Every open flow
    pub fn flows(&self) -> Vec<ReauthFlow> {
        self.flows.iter().map(|f| f.value().clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_flow_per_entry() {
        let flows = ReauthFlows::new();
        let entry = ConfigEntry::new("blueconnectha_ble", "Front Door");

        let first = flows.start(&entry);
        let second = flows.start(&entry);

        assert_eq!(first, second);
        assert_eq!(flows.requests(&entry.entry_id), 2);
        assert_eq!(flows.flows().len(), 1);
    }

    #[test]
    fn test_clones_share_flows() {
        let flows = ReauthFlows::new();
        let handle = flows.clone();
        let entry = ConfigEntry::new("blueconnectha_ble", "Front Door");

        handle.start(&entry);
        assert!(flows.in_progress(&entry.entry_id));

        let finished = flows.finish(&entry.entry_id).unwrap();
        assert_eq!(finished.title, "Front Door");
        assert!(!handle.in_progress(&entry.entry_id));
        assert_eq!(handle.requests(&entry.entry_id), 0);
    }
}
