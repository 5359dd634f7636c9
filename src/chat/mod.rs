//! Chat rooms

pub mod service;
pub mod socket;
