//! Session and conversation history management.
//!
//! This module provides in-memory storage for per-session conversation
//! history. Sessions are identified by opaque strings (UUIDs when minted
//! here) and hold the ordered list of user and assistant messages.
//!
//! # Architecture
//!
//! - [`Session`]: shared handle to one conversation's history
//! - [`SessionStore`]: thread-safe registry of all live sessions
//!
//! # Example
//!
//! ```rust
//! use session_chat::session::SessionStore;
//!
//! let store = SessionStore::new();
//! let session = store.get_or_create("s1");
//! session.append_turn("Hello!", "Hi.");
//!
//! assert_eq!(store.get_or_create("s1").message_count(), 2);
//! ```

mod thread;

pub use thread::{Session, SessionStore};
