//! Core of pin-comments: pinned page comments with threaded replies.
//!
//! The in-memory [`state::CommentStore`] is the source of truth. It mirrors
//! every change into a [`cache::LocalCache`] and, when a backend is
//! configured, pushes it to the remote table through a
//! [`remote::RemoteStore`]. [`setup::SetupFlow`] chooses the storage mode on
//! first run; [`config::resolve`] decides it on every later one.

pub mod cache;
pub mod config;
pub mod error;
pub mod page;
pub mod remote;
pub mod schema;
pub mod setup;
pub mod state;
pub mod sync;
pub mod types;

pub use error::{CacheError, ConfigError, Rejected, RemoteError, SetupError};
pub use remote::{RemoteStore, RestClient};
pub use state::{Activation, CommentStore};
pub use types::{BackendConfig, Comment, Mode, Reply};
