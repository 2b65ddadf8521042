//! Configured backend servers and the least-loaded placement policy.

use std::sync::Arc;

use indexmap::IndexMap;
use ultimate_session::{BackendServer, LoadBalancer, Session};

use crate::config::ServerEntry;

/// Backend servers by name, in configuration order.
pub struct ServerList {
    servers: IndexMap<String, Arc<BackendServer>>,
}

impl ServerList {
    pub fn new(entries: &[ServerEntry]) -> Self {
        let servers = entries
            .iter()
            .map(|e| {
                (
                    e.name.clone(),
                    Arc::new(BackendServer::new(e.name.clone(), e.address.clone())),
                )
            })
            .collect();
        Self { servers }
    }

    pub fn get(&self, name: &str) -> Option<Arc<BackendServer>> {
        self.servers.get(name).cloned()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<BackendServer>> {
        self.servers.values()
    }

    pub fn len(&self) -> usize {
        self.servers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }
}

/// Places new sessions on the server with the fewest players. Ties go to
/// the server listed first.
pub struct LeastLoaded {
    servers: Arc<ServerList>,
}

impl LeastLoaded {
    pub fn new(servers: Arc<ServerList>) -> Self {
        Self { servers }
    }

    fn pick(&self) -> Option<Arc<BackendServer>> {
        self.servers
            .iter()
            .min_by_key(|s| s.player_count())
            .cloned()
    }
}

impl LoadBalancer for LeastLoaded {
    fn find_server(&self, _session: &Session) -> Option<Arc<BackendServer>> {
        self.pick()
    }
}
