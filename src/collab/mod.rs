//! Document collaboration
//!
//! The CRDT-backed room engine and its WebSocket surface.

pub mod engine;
pub mod recovery;
pub mod room;
pub mod socket;

pub use engine::{CollabEngine, JoinOutcome};
pub use room::{Participant, Room};
