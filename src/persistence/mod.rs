//! Persistence layer modules.

pub mod db;
pub mod kv;
pub mod schema;
pub mod user_links;
