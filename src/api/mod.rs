//! Peer REST API

pub mod handlers;
pub mod server;

pub use server::{ApiServer, AppState};
