//! Data model for the quote-request workflow.
//!
//! These entities map to SQLite rows via `sqlx::FromRow` (attachment
//! collections as JSON columns) and serialize as JSON via `serde`. The quote
//! is the one semantically dense entity; users are reduced to the
//! `(id, role)` pair the identity provider supplies, and groups are plain
//! tagging records.

pub mod group;
pub mod quote;
pub mod user;
