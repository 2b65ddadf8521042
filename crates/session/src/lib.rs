//! Session core of a transparent multi-backend proxy.
//!
//! Each connected client is represented by a [`Session`] that owns the
//! client-facing connection and one backend-facing connection, relays packets
//! between them, and can move the client to another backend without the
//! client ever disconnecting.
//!
//! The wire codec, the load-balancing policy and event handler registration
//! live outside this crate; they are consumed through the traits in [`conn`],
//! [`balancer`] and [`event`].

pub mod balancer;
pub mod conn;
pub mod error;
pub mod event;
pub mod packet;
pub mod registry;
pub mod server;
pub mod session;
pub mod state;
pub mod translator;

pub use balancer::LoadBalancer;
pub use conn::{ClientData, Connection, Dialer, GameData, IdentityData};
pub use error::{ConnError, LoginError, SessionError, TransferError};
pub use event::{Context, Handler, NopHandler};
pub use registry::SessionRegistry;
pub use server::BackendServer;
pub use session::{LoginState, Session, SessionConfig};
pub use state::ClientStateTracker;
pub use translator::Translator;
