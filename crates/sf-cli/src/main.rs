//! ShieldForge CLI
//!
//! CLI tool for compiling filter lists and managing the list registry.

mod files;
mod lists;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use sf_compiler::{assemble_rules, FilterParser, ParsedList};
use sf_core::types::{ParseStats, DEFAULT_RULE_ID_START, MAX_DYNAMIC_RULES};
use sf_lists::ToggleTarget;

#[derive(Parser)]
#[command(name = "sf-cli")]
#[command(about = "ShieldForge filter list compiler and tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ConfigArg {
    /// Settings file (TOML); defaults apply when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile filter list files into engine rules
    Compile {
        /// Input filter list files
        #[arg(short, long, required = true)]
        input: Vec<PathBuf>,

        /// Output JSON file (listId -> compiled list)
        #[arg(short, long, default_value = "compiled.json")]
        output: PathBuf,

        /// First rule id
        #[arg(long, default_value_t = DEFAULT_RULE_ID_START)]
        start_id: u32,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Merge compiled lists into one priority-ordered, bounded rule set
    Assemble {
        /// Compiled JSON files from `compile`, or bare rule arrays
        #[arg(short, long, required = true)]
        input: Vec<PathBuf>,

        /// Output rule array
        #[arg(short, long, default_value = "dynamic-rules.json")]
        output: PathBuf,

        /// Rule budget
        #[arg(long, default_value_t = MAX_DYNAMIC_RULES)]
        max_rules: usize,
    },

    /// Fetch enabled lists (or one list) and apply the result
    Refresh {
        #[command(flatten)]
        config: ConfigArg,

        /// Refresh only this list, even if disabled
        #[arg(short, long)]
        list: Option<String>,

        /// Ignore cached validators and download everything
        #[arg(short, long)]
        force: bool,
    },

    /// Show list state and budget usage
    Status {
        #[command(flatten)]
        config: ConfigArg,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Enable or disable a list or a whole category
    Toggle {
        #[command(flatten)]
        config: ConfigArg,

        /// List id
        #[arg(short, long, conflicts_with = "category", required_unless_present = "category")]
        list: Option<String>,

        /// Category id
        #[arg(long)]
        category: Option<String>,

        /// Disable instead of enable
        #[arg(short, long)]
        disable: bool,
    },

    /// Refresh on the configured interval until interrupted
    Watch {
        #[command(flatten)]
        config: ConfigArg,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Compile {
            input,
            output,
            start_id,
            verbose,
        } => {
            init_logging("info");
            cmd_compile(&input, &output, start_id, verbose)
        }
        Commands::Assemble { input, output, max_rules } => {
            init_logging("info");
            cmd_assemble(&input, &output, max_rules)
        }
        Commands::Refresh { config, list, force } => with_settings(config.config, |settings| async move {
            lists::cmd_refresh(&settings, list.as_deref(), force).await
        }),
        Commands::Status { config, json } => {
            with_settings(config.config, |settings| async move { lists::cmd_status(&settings, json).await })
        }
        Commands::Toggle {
            config,
            list,
            category,
            disable,
        } => toggle_target(list, category).and_then(|target| {
            with_settings(config.config, |settings| async move {
                lists::cmd_toggle(&settings, target, !disable).await
            })
        }),
        Commands::Watch { config } => {
            with_settings(config.config, |settings| async move { lists::cmd_watch(&settings).await })
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn toggle_target(list: Option<String>, category: Option<String>) -> Result<ToggleTarget, String> {
    match (list, category) {
        (Some(id), _) => Ok(ToggleTarget::List(id)),
        (None, Some(category)) => Ok(ToggleTarget::Category(category)),
        (None, None) => Err("Specify --list or --category".to_string()),
    }
}

fn init_logging(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_target(false).try_init();
}

/// Load settings, install logging at the configured level and run `command`
/// on a current-thread runtime.
fn with_settings<F, Fut>(config: Option<PathBuf>, command: F) -> Result<(), String>
where
    F: FnOnce(sf_lists::Settings) -> Fut,
    Fut: std::future::Future<Output = Result<(), String>>,
{
    let runtime = lists::runtime()?;
    runtime.block_on(async move {
        let settings = lists::load_settings(config.as_deref()).await?;
        init_logging(&settings.log_level);
        command(settings).await
    })
}

fn cmd_compile(inputs: &[PathBuf], output: &Path, start_id: u32, verbose: bool) -> Result<(), String> {
    if inputs.is_empty() {
        return Err("No input files specified".to_string());
    }

    let start = Instant::now();
    let mut parser = FilterParser::with_start_id(start_id);
    let mut compiled: BTreeMap<String, ParsedList> = BTreeMap::new();
    let mut totals = ParseStats::default();

    for path in inputs {
        let content = files::read_text(path)?;
        let list_id = files::list_id_for(path);
        if compiled.contains_key(&list_id) {
            return Err(format!("Duplicate list id '{}' from '{}'", list_id, path.display()));
        }

        let parsed = parser.parse_filter_list(&content, &list_id);
        if verbose {
            println!("  [{}] {}", list_id, parsed.stats);
        }
        totals.merge(&parsed.stats);
        compiled.insert(list_id, parsed);
    }

    files::write_json(output, &compiled)?;

    println!("Compiled {} filter lists to '{}'", inputs.len(), output.display());
    println!("  Lines:    {} rules, {} comments", totals.total, totals.comments);
    println!("  Network:  {} ({} exceptions)", totals.network_rules + totals.exceptions, totals.exceptions);
    println!("  Cosmetic: {}", totals.cosmetic_rules);
    println!("  Scripts:  {}", totals.scriptlets);
    println!("  Invalid:  {}", totals.invalid);
    println!("  Next id:  {}", parser.ids().peek());
    println!("  Time:     {:.1}ms", start.elapsed().as_secs_f64() * 1000.0);

    Ok(())
}

fn cmd_assemble(inputs: &[PathBuf], output: &Path, max_rules: usize) -> Result<(), String> {
    let mut compiled = Vec::new();
    for path in inputs {
        compiled.extend(files::read_compiled_rules(path)?);
    }

    let (rules, stats) = assemble_rules(compiled.iter().map(|(_, rules)| rules.as_slice()), max_rules);
    files::write_json(output, &rules)?;

    println!("Assembled {} lists to '{}'", compiled.len(), output.display());
    println!("  Rules:    {} -> {} (budget {})", stats.before, stats.after, max_rules);
    println!("  Dropped:  {} over budget, {} duplicate ids", stats.over_budget, stats.duplicate_ids);

    Ok(())
}
