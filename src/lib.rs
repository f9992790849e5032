#![forbid(unsafe_code)]

//! `excels-autobot`: Slack bot that collects weekly self-assessment
//! scores into an Airtable base.

pub mod clock;
pub mod config;
pub mod errors;
pub mod models;
pub mod persistence;
pub mod records;
pub mod routing;
pub mod server;
pub mod slack;
pub mod telemetry;
pub mod week;

pub use config::GlobalConfig;
pub use errors::{AppError, Result};
