use crate::db::ResultSet;
use crate::error::Result;
use crate::exec::report::{BatchReport, StatementOutcome};
use colored::Colorize;
use serde::Serialize;

/// Maximum column width before truncation
const MAX_COLUMN_WIDTH: usize = 32;

fn truncate_value(value: &str, max_width: usize) -> String {
    if value.chars().count() <= max_width {
        value.to_string()
    } else {
        let take = max_width.saturating_sub(3);
        format!("{}...", value.chars().take(take).collect::<String>())
    }
}

/// Render rows as a bordered text table.
pub fn render_table(result: &ResultSet) -> String {
    let header: Vec<String> = result
        .columns
        .iter()
        .map(|c| truncate_value(c, MAX_COLUMN_WIDTH))
        .collect();
    let cells: Vec<Vec<String>> = result
        .rows
        .iter()
        .map(|row| {
            row.iter()
                .map(|v| truncate_value(&v.to_string().replace('\n', " "), MAX_COLUMN_WIDTH))
                .collect()
        })
        .collect();

    let mut widths: Vec<usize> = header.iter().map(|h| h.chars().count()).collect();
    for row in &cells {
        for (i, cell) in row.iter().enumerate() {
            if let Some(w) = widths.get_mut(i) {
                *w = (*w).max(cell.chars().count());
            }
        }
    }

    let border = format!(
        "+{}+",
        widths
            .iter()
            .map(|w| "-".repeat(w + 2))
            .collect::<Vec<_>>()
            .join("+")
    );
    let line = |values: &[String]| {
        let padded: Vec<String> = widths
            .iter()
            .enumerate()
            .map(|(i, w)| {
                let v = values.get(i).map(String::as_str).unwrap_or("");
                format!(" {}{} ", v, " ".repeat(w - v.chars().count().min(*w)))
            })
            .collect();
        format!("|{}|", padded.join("|"))
    };

    let mut out = vec![border.clone(), line(&header), border.clone()];
    for row in &cells {
        out.push(line(row));
    }
    out.push(border);
    out.push(format!(
        "{} row{}",
        result.row_count(),
        if result.row_count() == 1 { "" } else { "s" }
    ));
    out.join("\n")
}

fn paint(text: String, color: bool, style: fn(&str) -> colored::ColoredString) -> String {
    if color {
        style(&text).to_string()
    } else {
        text
    }
}

/// Human readable rendering of a batch report.
pub fn render_report(report: &BatchReport, color: bool) -> String {
    if report.no_statements() {
        return paint("No valid SQL query found.".to_string(), color, |s| s.yellow());
    }

    let mut out = Vec::new();
    for outcome in &report.outcomes {
        match outcome {
            StatementOutcome::Rows { table, result, .. } => {
                if result.columns.is_empty() {
                    out.push(format!("Query executed for `{}`, no result columns.", table));
                } else {
                    out.push(paint(format!("Query Results for `{}`:", table), color, |s| s.bold()));
                    out.push(render_table(result));
                }
            }
            StatementOutcome::Inserted { table, rows, .. } => out.push(paint(
                format!(
                    "Insert query executed successfully for `{}` ({} row{}).",
                    table,
                    rows,
                    if *rows == 1 { "" } else { "s" }
                ),
                color,
                |s| s.green(),
            )),
            StatementOutcome::Executed { table, affected, .. } => out.push(paint(
                format!(
                    "Query executed successfully for `{}` ({} affected).",
                    table, affected
                ),
                color,
                |s| s.green(),
            )),
            StatementOutcome::Skipped { table, reason, .. } => out.push(paint(
                format!("Skipped statement for `{}`: {}", table, reason),
                color,
                |s| s.yellow(),
            )),
            StatementOutcome::Failed { sql, error, .. } => out.push(paint(
                format!("SQL Execution Error: {}\n  in: {}", error, sql),
                color,
                |s| s.red(),
            )),
        }
    }

    if report.aborted {
        out.push(paint(
            "Remaining statements were not executed.".to_string(),
            color,
            |s| s.red(),
        ));
    }
    out.join("\n")
}

pub fn render_json(report: &BatchReport) -> Result<String> {
    to_pretty_json(report)
}

pub fn to_pretty_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}
