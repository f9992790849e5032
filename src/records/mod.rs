//! Record-store access: the transport seam, its HTTP client and the
//! domain-level gateway built on top.

pub mod airtable;
pub mod gateway;
pub mod store;

pub use gateway::RecordGateway;
pub use store::{RecordPage, RecordQuery, RecordStore};
