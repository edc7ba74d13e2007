pub mod cache;
pub mod database;
pub mod entities;
pub mod queue;
pub mod repositories;
pub mod traits;
