//! HTTP route handlers

pub mod activity;
pub mod auth;
pub mod chat;
pub mod documents;
pub mod folders;
pub mod meetings;
pub mod notifications;
pub mod router;
pub mod shares;
pub mod versions;

pub use router::create_router;
