//! Write-back counter service: redis serves every read and increment, mysql
//! keeps the value across restarts via a periodic background flush.

pub mod app;
pub mod cache;
pub mod config;
pub mod counter;
pub mod server;
pub mod store;
pub mod sync;
