use clap::{Parser, Subcommand, builder::styling};
use eyre::Result;
use owo_colors::OwoColorize;
use simple_etl::{Stage, cli};
use std::path::PathBuf;

// CLI Styling
const STYLES: styling::Styles = styling::Styles::styled()
    .header(styling::AnsiColor::BrightWhite.on_default())
    .usage(styling::AnsiColor::BrightWhite.on_default())
    .literal(styling::AnsiColor::Green.on_default())
    .placeholder(styling::AnsiColor::Cyan.on_default());

/// Simple ETL: extract a CSV file, title-case its text and load it into MongoDB, handing off through Redis
#[derive(Parser)]
#[command(name = "setl", version, styles = STYLES)]
struct Cli {
    /// The dotenv file to source connection settings from
    #[arg(short, long, global = true, default_value = ".env")]
    env: String,

    /// Optional YAML configuration file, overridden by environment variables
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Namespace buffer keys with this run identifier
    #[arg(long, global = true)]
    run_id: Option<String>,

    /// More verbose logging
    #[arg(long, global = true)]
    debug: bool,

    /// Command to execute
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run extract, transform and load once, in order
    Run,

    /// Read the source file into the buffer under extracted_data
    Extract,

    /// Title-case extracted_data into transformed_data
    Transform,

    /// Insert transformed_data into the document store
    Load,

    /// Print the task declaration for an external scheduler
    Dag,

    /// Test connectivity to the buffer and the document store
    Ping,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let env_loaded = dotenvy::from_filename(&cli.env).is_ok();

    let log_level = match cli.debug {
        true => "debug",
        false => "info",
    };
    let env = env_logger::Env::default().filter_or("LOG_LEVEL", log_level);
    env_logger::Builder::from_env(env)
        .format_timestamp_millis()
        .init();

    if !env_loaded {
        log::debug!("No dotenv file loaded from {}", cli.env.bright_black());
    }

    let config = cli::load_config(cli.config.as_deref())?;
    let run_id = cli.run_id.as_deref();

    match cli.command {
        Commands::Run => {
            log::info!(
                "Running pipeline from {} into {}.{}",
                config.source.path.display().bright_black(),
                config.store.database.cyan(),
                config.store.collection.cyan()
            );
            cli::run_pipeline(&config, run_id).await?;
        }
        Commands::Extract => {
            log::info!(
                "Extracting {}",
                config.source.path.display().bright_black()
            );
            cli::run_stage(&config, Stage::Extract, run_id).await?;
        }
        Commands::Transform => {
            log::info!("Transforming buffered table");
            cli::run_stage(&config, Stage::Transform, run_id).await?;
        }
        Commands::Load => {
            log::info!(
                "Loading into {}.{}",
                config.store.database.cyan(),
                config.store.collection.cyan()
            );
            cli::run_stage(&config, Stage::Load, run_id).await?;
        }
        Commands::Dag => {
            print!("{}", cli::render_dag(&config)?);
        }
        Commands::Ping => {
            log::info!("Testing connectivity");
            cli::ping(&config).await?;
        }
    }

    Ok(())
}
