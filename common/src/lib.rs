pub mod error;
pub mod config;
pub mod schema;
pub mod llm;
pub mod agent;
pub mod sql;
pub mod db;
pub mod exec;
pub mod pipeline;
pub mod tracing;

pub use error::{Result, SqlaskError};
