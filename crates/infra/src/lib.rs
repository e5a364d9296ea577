//! Infrastructure layer: event store, command dispatch, read models, the
//! projection worker and the application services built on top of them.

pub mod command_dispatcher;
pub mod config;
pub mod event_store;
pub mod projections;
pub mod read_model;
pub mod services;
pub mod workers;

pub use config::{AppConfig, ConfigError};
pub use services::{PromoStock, ServiceError};
