//! Backend server descriptor with a live player count.

use std::sync::atomic::{AtomicI64, Ordering};

/// A backend the proxy can route sessions to.
///
/// Sessions hold an `Arc<BackendServer>` and only ever touch the count
/// through [`increment_player_count`](Self::increment_player_count) and
/// [`decrement_player_count`](Self::decrement_player_count).
#[derive(Debug)]
pub struct BackendServer {
    name: String,
    address: String,
    player_count: AtomicI64,
}

impl BackendServer {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            player_count: AtomicI64::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn player_count(&self) -> i64 {
        self.player_count.load(Ordering::Acquire)
    }

    pub fn increment_player_count(&self) {
        self.player_count.fetch_add(1, Ordering::AcqRel);
    }

    pub fn decrement_player_count(&self) {
        self.player_count.fetch_sub(1, Ordering::AcqRel);
    }
}
