use std::sync::Arc;

use crate::server::BackendServer;
use crate::session::Session;

/// Picks the backend a new session joins.
pub trait LoadBalancer: Send + Sync {
    /// Return `None` when no backend can take the session.
    fn find_server(&self, session: &Session) -> Option<Arc<BackendServer>>;
}
