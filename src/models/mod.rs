//! Domain model module declarations.

pub mod payload;
pub mod record;
pub mod user_link;
