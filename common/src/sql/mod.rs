pub mod repair;
pub mod split;
pub mod value;

pub use repair::{repair_insert, RepairedInsert};
pub use split::{
    classify, extract_table_name, parse_batch, split_statements, Statement, StatementKind,
    UNKNOWN_TABLE,
};
pub use value::SqlValue;
