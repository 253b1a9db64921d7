use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};
use common::config::{Settings, SettingsOverrides};
use common::exec::{render_json, render_report, to_pretty_json, BatchReport, Executor};
use common::pipeline::{execute_sql, open_database, refresh_schema, Answer, Sqlask};
use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "sqlask")]
#[command(about = "natural language to sql over a local database", long_about = None)]
pub struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct GlobalArgs {
    /// SQLite database file
    #[arg(long, global = true, env = "SQLASK_DATABASE")]
    database: Option<PathBuf>,

    /// Where the introspected schema is persisted
    #[arg(long, global = true, env = "SQLASK_SCHEMA_CACHE")]
    schema_cache: Option<PathBuf>,

    /// Generation model name
    #[arg(long, global = true, env = "SQLASK_MODEL")]
    model: Option<String>,

    /// Generation api base url
    #[arg(long, global = true, env = "SQLASK_API_BASE")]
    api_base: Option<String>,

    /// Generation api key
    #[arg(long, global = true, env = "GOOGLE_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Send the request to the model untranslated
    #[arg(long, global = true, default_value = "false")]
    no_translate: bool,

    /// Output format
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Translate a request into SQL and run it
    Ask {
        /// The request, in any language
        #[arg(required = true, num_args = 1..)]
        request: Vec<String>,

        /// Print the generated SQL without executing it
        #[arg(long, default_value = "false")]
        dry_run: bool,
    },
    /// Run SQL statements directly
    Exec {
        /// Semicolon separated statements
        sql: String,
    },
    /// Inspect the database schema
    Schema {
        #[command(subcommand)]
        subcommand: SchemaCommands,
    },
    /// Interactive prompt
    Shell,
}

#[derive(Subcommand)]
enum SchemaCommands {
    /// Print the cached schema, introspecting if there is none
    Show,
    /// Re-introspect the database and persist the result
    Refresh,
}

impl Cli {
    pub async fn execute(self) -> Result<()> {
        let _guard = common::tracing::init_tracing("sqlask")?;

        let format = self.global.format;
        let settings = Settings::resolve(SettingsOverrides {
            database: self.global.database,
            schema_cache: self.global.schema_cache,
            model: self.global.model,
            api_base: self.global.api_base,
            api_key: self.global.api_key,
            no_translate: self.global.no_translate,
        });
        tracing::debug!(database = %settings.database.display(), "settings resolved");

        match self.command {
            Commands::Ask { request, dry_run } => {
                let app = Sqlask::from_settings(&settings)?;
                ask(&app, &request.join(" "), dry_run, format).await
            }
            Commands::Exec { sql } => {
                let (db, store) = open_database(&settings);
                let executor = Arc::new(Executor::new(db, store));
                let report = execute_sql(executor, sql).await?;
                print_report(&report, format)
            }
            Commands::Schema { subcommand } => {
                let (_db, store) = open_database(&settings);
                let force = matches!(subcommand, SchemaCommands::Refresh);
                let schema = refresh_schema(store, force).await?;
                match format {
                    OutputFormat::Json => println!("{}", to_pretty_json(schema.as_ref())?),
                    OutputFormat::Table => {
                        if schema.is_empty() {
                            println!("no tables found in {}", settings.database.display());
                        }
                        for (name, table) in schema.iter() {
                            println!("{}", name);
                            for column in &table.columns {
                                let mut line = format!("  {} {}", column.name, column.data_type);
                                if column.primary_key {
                                    line.push_str(" primary key");
                                } else if !column.nullable {
                                    line.push_str(" not null");
                                }
                                if let Some(fk) = &column.foreign_key {
                                    line.push_str(&format!(" -> {}", fk));
                                }
                                println!("{}", line);
                            }
                        }
                    }
                }
                Ok(())
            }
            Commands::Shell => {
                let app = Sqlask::from_settings(&settings)?;
                shell(&app, format).await
            }
        }
    }
}

async fn ask(app: &Sqlask, request: &str, dry_run: bool, format: OutputFormat) -> Result<()> {
    tracing::info!("generating sql for request");
    let answer = app.ask(request, dry_run).await?;
    print_answer(&answer, format)
}

fn print_answer(answer: &Answer, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", to_pretty_json(answer)?);
        }
        OutputFormat::Table => {
            println!("Generated SQL:\n{}\n", answer.sql);
            if let Some(report) = &answer.report {
                print_report(report, format)?;
            }
        }
    }
    Ok(())
}

fn print_report(report: &BatchReport, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", render_json(report)?),
        OutputFormat::Table => {
            println!("{}", render_report(report, io::stdout().is_terminal()))
        }
    }
    Ok(())
}

async fn shell(app: &Sqlask, format: OutputFormat) -> Result<()> {
    println!("sqlask shell. Type a request, 'sql <statements>' to run SQL directly, or 'exit'.");

    loop {
        print!("sqlask> ");
        io::stdout().flush()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            break;
        }
        let input = input.trim();

        if input.is_empty() {
            continue;
        }
        if input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit") {
            break;
        }

        let result = match input.split_once(char::is_whitespace) {
            Some((head, sql)) if head.eq_ignore_ascii_case("sql") => {
                match execute_sql(app.executor(), sql.to_string()).await {
                    Ok(report) => print_report(&report, format),
                    Err(e) => Err(e.into()),
                }
            }
            _ => ask(app, input, false, format).await,
        };

        // errors end the request, not the session
        if let Err(e) = result {
            eprintln!("error: {}", e);
        }
    }

    Ok(())
}
