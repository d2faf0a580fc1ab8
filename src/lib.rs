pub mod auth;
pub mod compactor;
pub mod config;
pub mod engine;
pub mod limits;
pub mod model;
pub mod observability;
pub mod payment;
pub mod protocol;
pub mod server;
pub mod wal;
