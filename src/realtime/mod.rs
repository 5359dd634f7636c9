//! Real-time transport
//!
//! JSON envelopes over WebSocket plus the room-addressed broadcast hub
//! shared by the document, chat, and meeting sockets.

pub mod connection;
pub mod envelope;
pub mod hub;

pub use connection::RoomSubscriptions;
pub use envelope::Envelope;
pub use hub::SocketHub;
