//! Folder watching for autosort.
//!
//! A [`WatchCoordinator`] binds folders to [`WatchProfile`]s. It listens for
//! filesystem events through a debounced watcher, waits until a new file has
//! stopped changing, runs the profile's rules on a blocking worker, and
//! publishes a [`WatchEvent`] for every file it handled.

mod coordinator;
mod error;
mod event;
mod stability;

pub use coordinator::{WatchCoordinator, WatchProfile, WatchSettings};
pub use error::WatchError;
pub use event::WatchEvent;
pub use stability::{Stability, StabilityConfig, wait_until_stable};
