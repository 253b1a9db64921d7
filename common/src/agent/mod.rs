pub mod prompt;
pub mod parser;
pub mod generate;

pub use prompt::{build_sql_task_prompt, mentioned_tables, sql_system_prompt};
pub use parser::strip_code_fences;
pub use generate::SqlGenerator;
