//! Acceptor of incoming connections

pub mod builder;
mod config;
mod connection;

pub use config::*;
pub use connection::*;
