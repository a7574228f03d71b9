//! noxdir core — scanning, analysis, and persistence engine.
//!
//! This crate contains all business logic with zero UI dependencies.
//! Frontends (the bundled CLI, a TUI, anything else) consume the tree,
//! the progress channels, and the navigation state machine.
//!
//! # Modules
//!
//! - [`model`] — Arena-allocated directory tree and supporting types.
//! - [`scanner`] — Synchronous and worker-pool traversal with progress reporting.
//! - [`platform`] — Volume enumeration and directory reading per OS.
//! - [`filter`] — Traversal-time and render-time entry predicates.
//! - [`analysis`] — Post-scan algorithms: top-N heaps and scan diffing.
//! - [`cache`] — Versioned, compressed, file-backed tree cache.
//! - [`nav`] — Cursor/breadcrumb navigation over volumes and the tree.
//! - [`arena`] — Per-worker bump allocator for short-lived name buffers.
//! - [`config`] — Config directory resolution and `settings.json`.

pub mod analysis;
pub mod arena;
pub mod cache;
pub mod config;
pub mod error;
pub mod filter;
pub mod model;
pub mod nav;
pub mod platform;
pub mod scanner;

pub use error::{Error, Result};
