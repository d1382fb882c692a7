//! Infrastructure layer: persistence, caching, background jobs, configuration
//! and the application services built on them.

pub mod cache;
pub mod config;
pub mod jobs;
pub mod read_model;
pub mod services;
pub mod workers;

pub use config::{AppConfig, ServiceSettings, WorkerSettings};
pub use services::{AppServices, ServiceError, ServiceResult};
