//! Account session storage.
//!
//! Maps phone numbers onto grammers session files so the console can
//! operate several accounts side by side.

mod registry;

pub use registry::{RegistryError, SessionRecord, SessionRegistry};
