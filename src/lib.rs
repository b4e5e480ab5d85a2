//! # Knowledge Assistant
//!
//! A small retrieval-augmented chat backend over uploaded PDF and Word
//! documents.
//!
//! Documents are extracted, cleaned, split into overlapping chunks, embedded,
//! and kept in a flat-file similarity store. Questions are answered by
//! retrieving the nearest chunks and handing them to a hosted language model,
//! or to an extractive fallback when no model is available.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────┐   ┌────────────────┐
//! │ Uploads  │──▶│ Extract+Clean│──▶│ Chunker        │
//! │ PDF/DOCX │   │              │   │ size / overlap │
//! └──────────┘   └──────────────┘   └───────┬────────┘
//!                                           ▼
//!                 ┌──────────┐        ┌──────────────┐
//!                 │ Chat     │◀──────▶│ Knowledge    │
//!                 │ + LLM    │ search │ Store (files)│
//!                 └────┬─────┘        └──────────────┘
//!                      ▼
//!              ┌──────────────┐
//!              │ CLI / HTTP   │
//!              └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! kba ingest ./handbook.pdf
//! kba search "vacation policy"
//! kba ask "How many vacation days do I get?" --no-llm
//! kba serve
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration and setting resolution |
//! | [`error`] | Library error type |
//! | [`models`] | Shared data types |
//! | [`chunk`] | Text cleaning and chunking |
//! | [`extract`] | PDF and Word text extraction |
//! | [`embedding`] | Embedding providers and vector utilities |
//! | [`persist`] | Byte storage media for the store |
//! | [`store`] | Flat-file similarity store |
//! | [`ingest`] | Document and folder processing |
//! | [`llm`] | Hosted language model client |
//! | [`chat`] | Question answering |
//! | [`server`] | HTTP API |

pub mod chat;
pub mod chunk;
pub mod config;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod ingest;
pub mod llm;
pub mod models;
pub mod persist;
pub mod server;
pub mod store;

pub use error::{Error, Result};
