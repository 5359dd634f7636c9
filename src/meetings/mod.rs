//! Meeting rooms

pub mod rooms;
pub mod service;
pub mod socket;

pub use rooms::MeetingRooms;
