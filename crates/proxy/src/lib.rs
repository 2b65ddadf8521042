//! Runnable proxy around the session core: configuration, the least-loaded
//! balancer, a TCP transport and the status dashboard.

pub mod balancer;
pub mod config;
pub mod dashboard;
pub mod net;
pub mod state;
