//! # content-migrate
//!
//! Bulk loader for a tree of Markdown documents with YAML front matter into
//! a Postgres content schema (`posts`, `categories`, `tags` and their link
//! tables).
//!
//! Every write is an idempotent upsert, so a run can be repeated over the
//! same tree as often as needed. A bad document is recorded and skipped; it
//! never stops the run.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────┐   ┌────────────────────────┐   ┌──────────┐
//! │ Walker  │──▶│ Scheduler (batches)    │──▶│  Store   │
//! │  (fs)   │   │ parse → normalize →    │   │ Postgres │
//! └─────────┘   │ taxonomy → upsert      │   └────┬─────┘
//!               └────────────────────────┘        │
//!                                                 ▼
//!                               taxonomy load → link stage → report
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! export DATABASE_URL=postgres://localhost/site
//! content-migrate check                     # validate config + schema
//! content-migrate run --dry-run --verbose   # derive everything, write nothing
//! content-migrate run                       # load content, taxonomy and links
//! content-migrate link                      # re-run the link stage alone
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration and CLI/env overrides |
//! | [`error`] | Library error type |
//! | [`models`] | Core data types |
//! | [`walker`] | Source tree enumeration |
//! | [`parser`] | Header/body splitting |
//! | [`metadata`] | Typed header values |
//! | [`normalize`] | Canonical field derivation |
//! | [`taxonomy`] | Category/tag extraction and accumulation |
//! | [`store`] | Persistence trait, Postgres and in-memory backends |
//! | [`ingest`] | Per-document pipeline |
//! | [`scheduler`] | Batched concurrent loading |
//! | [`orchestrator`] | Stage sequencing |
//! | [`report`] | Run statistics |
//! | [`progress`] | Progress reporting on stderr |
//! | [`db`] | Connection pool |
//! | [`schema`] | Target schema verification |

pub mod config;
pub mod db;
pub mod error;
pub mod ingest;
pub mod metadata;
pub mod models;
pub mod normalize;
pub mod orchestrator;
pub mod parser;
pub mod progress;
pub mod report;
pub mod scheduler;
pub mod schema;
pub mod store;
pub mod taxonomy;
pub mod walker;
