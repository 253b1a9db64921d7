pub mod model;
pub mod store;

pub use model::{ColumnInfo, Schema, TableSchema};
pub use store::{SchemaSource, SchemaStore};
