//! Settings model, option tables and wire form

pub mod keys;
pub mod model;
pub mod options;
pub mod wire;

pub use keys::{ChangeSet, SettingsKey};
pub use model::{FcdProSettings, RemoteMirrorSettings};
pub use options::{option_field, OptionEntry, OptionField, OPTION_FIELDS};
