//! # ragmill
//!
//! A document synchronization and retrieval-augmented answering engine.
//!
//! ragmill keeps a persisted similarity-searchable index synchronized
//! with a directory of documents, and answers questions by retrieving
//! the most relevant fragments and handing them, with a fixed
//! instruction, to a text-generation capability.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌─────────────────────┐   ┌───────────────┐
//! │  Loader  │──▶│ Chunk → Ids → Sync   │──▶│ Store (SQLite) │
//! │ PDF/text │   │ deterministic delta │   │ one generation │
//! └──────────┘   └─────────────────────┘   └───────┬───────┘
//!                                                  │
//!                        ┌─────────────────────────┤
//!                        ▼                         ▼
//!                  ┌──────────┐             ┌────────────┐
//!                  │Retrieval │────────────▶│ Generator  │
//!                  │ (top-k)  │   context   │ (LLM HTTP) │
//!                  └──────────┘             └────────────┘
//! ```
//!
//! Fragment ids are derived purely from provenance
//! (`source:page:sequence`), so re-ingesting an unchanged corpus never
//! duplicates entries. The store generation is a long-lived handle,
//! replaced only by a crash-safe full reset with a bounded removal
//! retry policy.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`loader`] | Directory/PDF document source |
//! | [`chunk`] | Overlapping window chunker |
//! | [`ids`] | Stable fragment id assignment |
//! | [`sync`] | Incremental delta synchronization |
//! | [`lifecycle`] | Store generation lifecycle and reset |
//! | [`store`] | Store capability trait and backends |
//! | [`embedding`] | Embedding capability adapters |
//! | [`generate`] | Generation capability adapters |
//! | [`retrieval`] | Query answering facade |
//! | [`context`] | Shared engine context |
//! | [`server`] | HTTP request layer |

pub mod chunk;
pub mod config;
pub mod context;
pub mod embedding;
pub mod error;
pub mod generate;
pub mod ids;
pub mod ingest;
pub mod lifecycle;
pub mod loader;
pub mod models;
pub mod retrieval;
pub mod server;
pub mod store;
pub mod sync;
