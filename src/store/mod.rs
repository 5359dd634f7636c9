//! Resource store
//!
//! Persistence for the workspace entities: users, folders, documents,
//! content blobs, version snapshots, shares, notifications, chat and
//! meetings, plus the append-only activity trail.
//!
//! Every function takes a `&PgPool` and returns `Result<_, sqlx::Error>`;
//! services convert to [`crate::error::AppError`] at the boundary. Reads
//! that cross references (document + folder access, message + sender)
//! return denormalized view objects so callers never chase references.

pub mod activity;
pub mod content;
pub mod conversations;
pub mod documents;
pub mod folders;
pub mod meetings;
pub mod notifications;
pub mod shares;
pub mod users;
pub mod versions;
