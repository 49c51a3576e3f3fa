//! Twoway CLI (`twoway`)
//!
//! Renders two-way SQL templates against JSON parameters without a database.

use anyhow::Context;
use clap::{Parser, Subcommand};
use comfy_table::{ContentArrangement, Table, presets::UTF8_FULL};
use std::path::{Path, PathBuf};
use twoway_core::EngineConfig;
use twoway_templates::{BoundQuery, Parameters, Template, TwoWayEngine, sqlquote};

mod logging;
mod params;

#[derive(Parser)]
#[command(name = "twoway")]
#[command(author, version, about = "Render two-way SQL templates", long_about = None)]
struct Cli {
    /// Log engine decisions to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Default, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Table,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a template and print the SQL with its bind values
    Render {
        /// Template file
        template: PathBuf,

        /// JSON parameter file
        #[arg(short, long)]
        params: Option<PathBuf>,

        /// Engine configuration (TOML)
        #[arg(short, long, env = "TWOWAY_CONFIG")]
        config: Option<PathBuf>,

        /// Output format
        #[arg(long, default_value = "table")]
        format: OutputFormat,

        /// Print the SQL with bind values inlined instead of placeholders
        #[arg(long)]
        display: bool,
    },

    /// Parse a template and list the arguments it references
    Check {
        /// Template file
        template: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(&logging::LoggingConfig::new(cli.verbose, cli.log_json))?;

    match cli.command {
        Commands::Render {
            template,
            params,
            config,
            format,
            display,
        } => render(&template, params.as_deref(), config.as_deref(), format, display),
        Commands::Check { template } => check(&template),
    }
}

fn read_template(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path)
        .with_context(|| format!("failed to read template {}", path.display()))
}

fn render(
    template_path: &Path,
    params_path: Option<&Path>,
    config_path: Option<&Path>,
    format: OutputFormat,
    display: bool,
) -> anyhow::Result<()> {
    let config = match config_path {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("failed to load configuration {}", path.display()))?,
        None => EngineConfig::default(),
    };
    let params = match params_path {
        Some(path) => params::load_params(path)?,
        None => Parameters::new(),
    };

    let source = read_template(template_path)?;
    let engine = TwoWayEngine::new(config);
    let template = engine.compile(&source)?;
    let query = engine.render(&template, &params)?;

    match format {
        OutputFormat::Table => print_table(&query, display),
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&query_json(&query, display))?)
        }
    }
    Ok(())
}

fn check(template_path: &Path) -> anyhow::Result<()> {
    let source = read_template(template_path)?;
    let template = Template::parse(&source)?;
    let names = template.argument_names();
    if names.is_empty() {
        println!("ok: {} nodes, no arguments", template.nodes().len());
    } else {
        println!(
            "ok: {} nodes, arguments: {}",
            template.nodes().len(),
            names.join(", ")
        );
    }
    Ok(())
}

fn print_table(query: &BoundQuery, display: bool) {
    if display {
        println!("{}", query.display_sql());
    } else {
        println!("{}", query.sql);
    }
    if query.values.is_empty() {
        return;
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["#", "Value", "Type"]);
    for (index, (value, value_type)) in query.values.iter().zip(&query.types).enumerate() {
        let shown = match value.as_str() {
            Some(s) => sqlquote(s),
            None => value.to_string(),
        };
        table.add_row(vec![(index + 1).to_string(), shown, value_type.to_string()]);
    }
    println!("{table}");
}

fn query_json(query: &BoundQuery, display: bool) -> serde_json::Value {
    let mut json = serde_json::json!({
        "sql": query.sql,
        "values": query.values.iter().map(|v| v.to_json()).collect::<Vec<_>>(),
        "types": query.types.iter().map(|t| t.to_string()).collect::<Vec<_>>(),
    });
    if display {
        json["display_sql"] = serde_json::Value::String(query.display_sql());
    }
    json
}
