//! Data layer
//!
//! - `models`: entity structs shared across layers
//! - `database`: SQLite access through SQLx

mod database;
mod models;

pub use database::Database;
pub use models::*;
