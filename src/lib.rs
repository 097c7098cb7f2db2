//! Local-first retrieval over recorded AI coding sessions.
//!
//! recollect reads a SQLite record store of sessions, turns, checkpoints and
//! agents (written by an external capture path) and answers four questions
//! about it:
//!
//! | Engine | Question |
//! |--------|----------|
//! | **Activation** | Which past turns are related to this one through shared files or commits? |
//! | **Search** | Which turns or sessions match this query, weighed against recency? |
//! | **Graph** | How do sessions, turns, agents, commits and files connect? |
//! | **Consolidation** | Which old turns can drop their full content for a summary? |
//!
//! # Modules
//!
//! - [`config`]: Configuration loading from TOML files and environment variables
//! - [`db`]: SQLite database initialization, schema and migrations
//! - [`error`]: The engine error type
//! - [`memory`]: Record types, write helpers and the four engines

pub mod config;
pub mod db;
pub mod error;
pub mod memory;
