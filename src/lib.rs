//! Project and task tracker client.
//!
//! Projects and tasks live on a REST backend; this crate keeps a local copy
//! of both collections, mirrors them into durable key-value slots so a
//! restart sees the last known state, and derives the sorted, filtered and
//! grouped views a board needs.

pub mod api;
pub mod cli;
pub mod context;
pub mod io;
pub mod model;
pub mod ops;

pub use context::AppContext;
