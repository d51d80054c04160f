//! Persistence layer for horizon: PostgreSQL models, migrations, and query
//! functions.

pub mod config;
pub mod models;
pub mod pool;
pub mod queries;
