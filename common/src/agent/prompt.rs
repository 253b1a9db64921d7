use crate::schema::Schema;

/// Fixed instruction block handed to the model ahead of every request.
pub fn sql_system_prompt(dialect: &str) -> String {
    format!(
        "You are an expert {dialect} administrator. Convert the given natural language request \
         into valid {dialect} statements.\n\
         You may create or drop tables, join tables, use aggregate functions and anything else \
         the user asks for.\n\
         Rules:\n\
         1. Always use valid table and column names from the schema.\n\
         2. If the table exists in the schema, use its column names.\n\
         3. Never assume column names, always refer to the schema.\n\
         4. Add LIMIT 100 to SELECT queries unless the user specifies otherwise.\n\
         5. A request to show or display a table's schema means DESCRIBE that table.\n\
         6. Separate multiple statements with semicolons.\n\
         7. Return only the SQL, without any explanation or extra text."
    )
}

/// Tables whose name occurs anywhere in the request, in schema order.
pub fn mentioned_tables<'a>(schema: &'a Schema, request: &str) -> Vec<&'a str> {
    let lowered = request.to_lowercase();
    schema
        .table_names()
        .filter(|table| lowered.contains(&table.to_lowercase()))
        .collect()
}

/// Append column and relationship context for every mentioned table.
pub fn build_sql_task_prompt(schema: &Schema, request: &str) -> String {
    let tables = mentioned_tables(schema, request);
    if tables.is_empty() {
        return request.to_string();
    }

    let mut table_lines = Vec::new();
    let mut relationship_lines = Vec::new();

    for name in tables {
        let Some(table) = schema.table(name) else {
            continue;
        };
        table_lines.push(format!(
            "Table `{}`: Columns → {}",
            name,
            table.column_names().join(", ")
        ));
        for (column, target) in table.foreign_keys() {
            relationship_lines.push(format!(
                "Column `{}` in `{}` links to {}",
                column, name, target
            ));
        }
    }

    let mut prompt = format!("{}\n\nSchema Details:\n{}", request, table_lines.join("\n"));
    if !relationship_lines.is_empty() {
        prompt.push_str("\n\nTable Relationships:\n");
        prompt.push_str(&relationship_lines.join("\n"));
    }
    prompt
}
