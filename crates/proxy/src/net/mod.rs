pub mod connection;
pub mod dialer;
pub mod framing;
pub mod listener;
