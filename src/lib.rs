//! Queued AI chatroom backend - Library exports for testing

pub mod api;
pub mod core;
pub mod infrastructure;
