// Increase recursion limit for complex async operations
#![recursion_limit = "256"]

//! Collaborative document workspace server core.
//!
//! Real-time multi-user document editing over CRDT rooms, plus the
//! surrounding workspace: folders and access control, a version ledger,
//! share tokens, notifications, chat conversations, and meetings.
//!
//! # Module Structure
//!
//! - **`collab`** - CRDT document rooms, the socket protocol, auto-save,
//!   and trailing-object content recovery
//! - **`realtime`** - the socket hub (rooms, broadcast fan-out) shared
//!   by the docs, chat, and meetings sockets
//! - **`store`** - Postgres persistence, one module per aggregate
//! - **`access`** - the document/folder access model with legacy role
//!   spelling normalization
//! - **`auth`** - token issuance, verification, and request middleware
//! - **`versioning`** - the version ledger: snapshots, restore, pruning
//! - **`shares`** - opaque share tokens and email invitations
//! - **`chat`** - conversations and message delivery
//! - **`meetings`** - meeting lifecycle and live meeting rooms
//! - **`notify`** - notification fan-out with presence dedup
//! - **`routes`** - the HTTP surface

pub mod access;
pub mod auth;
pub mod chat;
pub mod collab;
pub mod config;
pub mod email;
pub mod error;
pub mod meetings;
pub mod notify;
pub mod realtime;
pub mod routes;
pub mod server;
pub mod shares;
pub mod state;
pub mod store;
pub mod versioning;
