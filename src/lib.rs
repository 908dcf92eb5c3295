pub mod admission;
pub mod config;
pub mod error;
pub mod model;
pub mod ranking;
pub mod retro;
pub mod service;
pub mod snapshot;
pub mod sqlite_store;
pub mod store;
