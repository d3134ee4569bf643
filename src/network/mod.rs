//! Outbound replication to peer instances

pub mod mirror;

pub use mirror::{run_url, settings_url, RemoteMirror};
