pub mod generator;
pub mod quota;
pub mod services;
pub mod traits;
pub mod waiter;
pub mod worker;
