//! # Courier
//!
//! Polls a list of RSS/Atom feeds, works out which entries are new since the
//! previous run and mails a notification about them.
//!
//! ## Architecture
//!
//! ```text
//! Fetcher → Parser → Novelty engine → Dispatcher → Checkpoint store
//! ```
//!
//! Every run starts by loading the checkpoint (last check time plus the ids
//! already notified) and ends by writing it back. A feed that fails to fetch
//! or parse is skipped for that run without holding back the others.
//!
//! ## Quick Start
//!
//! ```bash
//! # Subscribe to a feed
//! courier add https://blog.rust-lang.org/feed.xml
//!
//! # Check once
//! courier check
//!
//! # Check on a schedule and expose /status and /check over HTTP
//! courier serve
//! ```

/// Application context and error handling.
///
/// The [`AppContext`](app::AppContext) struct wires together all components
/// from the loaded configuration.
pub mod app;

/// Run orchestration: the single `run_check` entry point.
pub mod checker;

/// Command-line interface using clap.
pub mod cli;

/// Configuration loaded from `~/.config/courier/config.toml`.
pub mod config;

/// Core domain models.
///
/// - [`CheckpointState`](domain::CheckpointState): last check time and seen ids
/// - [`RawEntry`](domain::RawEntry): one parsed feed item
/// - [`NewEntry`](domain::NewEntry): an entry that passed the novelty test
pub mod domain;

/// Novelty test and per-run accumulation.
pub mod engine;

/// HTTP fetching.
///
/// - [`Fetcher`](fetcher::Fetcher): Async trait for feed fetching
/// - [`HttpFetcher`](fetcher::http_fetcher::HttpFetcher): reqwest-based implementation
/// - [`ParallelFetcher`](fetcher::parallel::ParallelFetcher): Concurrent fetching with semaphore
pub mod fetcher;

/// Notification formatting and transports.
pub mod notify;

/// Feed parsing into [`RawEntry`](domain::RawEntry) values.
pub mod parser;

/// Interval-driven checks and shutdown handling.
pub mod scheduler;

/// HTTP status and manual-trigger endpoints.
pub mod server;

/// SQLite persistence of the checkpoint and the feed list.
pub mod store;
