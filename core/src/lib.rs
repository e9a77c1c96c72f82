//! Core library for the LoopAI chat view: stored API keys and the
//! provider/model selection that goes with them.
//!
//! - [`session`] owns both pieces of state for one chat view and applies the
//!   log-and-degrade policy on failures.
//! - [`credentials`] keeps the provider → API key mapping in a persisted slot.
//! - [`selection`] keeps the selected provider and model consistent with the
//!   model catalog and applies asynchronous catalog refreshes.
//! - [`catalog`] holds the built-in providers/models and the refresh sources.
//! - [`storage`] provides cookie-style persisted slots.
//! - [`settings`] stores session configuration and the active selection.
//! - [`db`] initialises the SQLite database and applies migrations.
//! - [`errors`] keeps the central error catalogue with human friendly metadata.
//! - [`logging`] writes structured diagnostics to the event log table.

pub mod catalog;
pub mod credentials;
pub mod db;
pub mod errors;
pub mod logging;
pub mod selection;
pub mod session;
pub mod settings;
pub mod storage;

pub use session::{ChatSession, KeyUpdate};
