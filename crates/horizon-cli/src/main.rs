mod config;
mod roadmap_cmds;
mod serve_cmd;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use uuid::Uuid;

use horizon_core::generate::Generator;
use horizon_db::pool;

use config::HorizonConfig;

#[derive(Parser)]
#[command(
    name = "horizon",
    about = "Retirement readiness diagnosis and 12-month roadmap service"
)]
struct Cli {
    /// Database URL (overrides HORIZON_DATABASE_URL env var)
    #[arg(long, global = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a horizon config file (no database required)
    Init {
        /// PostgreSQL connection URL
        #[arg(long, default_value = "postgresql://localhost:5432/horizon")]
        db_url: String,
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
    /// Initialize the horizon database (create + migrate)
    DbInit,
    /// Print the diagnosis question catalog
    Questions,
    /// Submit diagnosis answers from a JSON file
    Submit {
        /// User the submission belongs to
        #[arg(long)]
        user: Uuid,
        /// Path to a JSON answer map: {"question_id": "selected option", ...}
        answers_file: PathBuf,
    },
    /// Show the rule-based interim result for the latest diagnosis
    Result {
        #[arg(long)]
        user: Uuid,
    },
    /// Generate the 12-month roadmap for the latest diagnosis
    Generate {
        #[arg(long)]
        user: Uuid,
        /// Replace the current roadmap (pro tier only)
        #[arg(long)]
        regenerate: bool,
        /// Override the generation model
        #[arg(long)]
        model: Option<String>,
    },
    /// Show the current roadmap, checklist, and progress
    Show {
        #[arg(long)]
        user: Uuid,
    },
    /// Check off one roadmap task
    Check {
        #[arg(long)]
        user: Uuid,
        /// Month number (1-12)
        month: u8,
        /// Task index within the month (0-2)
        task_index: u8,
        /// Uncheck instead of check
        #[arg(long)]
        undo: bool,
    },
    /// Show completion progress for the current roadmap
    Progress {
        #[arg(long)]
        user: Uuid,
    },
    /// Set a user's entitlement tier (billing stand-in)
    Tier {
        #[arg(long)]
        user: Uuid,
        /// Tier: free or pro
        tier: String,
    },
    /// Run the HTTP API server
    Serve {
        /// Address to bind
        #[arg(long, default_value = "127.0.0.1")]
        bind: String,
        /// Port to listen on
        #[arg(long, default_value_t = 8080)]
        port: u16,
    },
}

/// Execute the `horizon init` command: write config file.
fn cmd_init(db_url: &str, force: bool) -> anyhow::Result<()> {
    let path = config::config_path();

    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}\nUse --force to overwrite.",
            path.display()
        );
    }

    let cfg = config::ConfigFile {
        database: config::DatabaseSection {
            url: db_url.to_string(),
        },
        generation: config::GenerationSection::default(),
    };

    config::save_config(&cfg)?;

    println!("Config written to {}", path.display());
    println!("  database.url = {db_url}");
    println!();
    println!("Set OPENAI_API_KEY (or [generation].api_key) to enable roadmap generation.");
    println!("Next: run `horizon db-init` to create and migrate the database.");

    Ok(())
}

/// Execute the `horizon db-init` command: create database and run migrations.
async fn cmd_db_init(cli_db_url: Option<&str>) -> anyhow::Result<()> {
    let resolved = HorizonConfig::resolve(cli_db_url)?;

    println!("Initializing horizon database...");

    pool::ensure_database_exists(&resolved.db_config).await?;
    let db_pool = pool::create_pool(&resolved.db_config).await?;
    pool::run_migrations(&db_pool).await?;
    db_pool.close().await;

    println!("horizon db-init complete.");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init { db_url, force } => {
            cmd_init(&db_url, force)?;
        }
        Commands::DbInit => {
            cmd_db_init(cli.database_url.as_deref()).await?;
        }
        Commands::Questions => {
            roadmap_cmds::run_questions();
        }
        Commands::Submit { user, answers_file } => {
            let resolved = HorizonConfig::resolve(cli.database_url.as_deref())?;
            let db_pool = pool::create_pool(&resolved.db_config).await?;
            let result = roadmap_cmds::run_submit(&db_pool, user, &answers_file).await;
            db_pool.close().await;
            result?;
        }
        Commands::Result { user } => {
            let resolved = HorizonConfig::resolve(cli.database_url.as_deref())?;
            let db_pool = pool::create_pool(&resolved.db_config).await?;
            let result = roadmap_cmds::run_result(&db_pool, user).await;
            db_pool.close().await;
            result?;
        }
        Commands::Generate {
            user,
            regenerate,
            model,
        } => {
            let resolved = HorizonConfig::resolve(cli.database_url.as_deref())?;
            let generator = resolved.generator(model.as_deref())?;
            let db_pool = pool::create_pool(&resolved.db_config).await?;
            let result = roadmap_cmds::run_generate(&db_pool, generator, user, regenerate).await;
            db_pool.close().await;
            result?;
        }
        Commands::Show { user } => {
            let resolved = HorizonConfig::resolve(cli.database_url.as_deref())?;
            let db_pool = pool::create_pool(&resolved.db_config).await?;
            let result = roadmap_cmds::run_show(&db_pool, user).await;
            db_pool.close().await;
            result?;
        }
        Commands::Check {
            user,
            month,
            task_index,
            undo,
        } => {
            let resolved = HorizonConfig::resolve(cli.database_url.as_deref())?;
            let db_pool = pool::create_pool(&resolved.db_config).await?;
            let result = roadmap_cmds::run_check(&db_pool, user, month, task_index, undo).await;
            db_pool.close().await;
            result?;
        }
        Commands::Progress { user } => {
            let resolved = HorizonConfig::resolve(cli.database_url.as_deref())?;
            let db_pool = pool::create_pool(&resolved.db_config).await?;
            let result = roadmap_cmds::run_progress(&db_pool, user).await;
            db_pool.close().await;
            result?;
        }
        Commands::Tier { user, tier } => {
            let resolved = HorizonConfig::resolve(cli.database_url.as_deref())?;
            let db_pool = pool::create_pool(&resolved.db_config).await?;
            let result = roadmap_cmds::run_tier(&db_pool, user, &tier).await;
            db_pool.close().await;
            result?;
        }
        Commands::Serve { bind, port } => {
            let resolved = HorizonConfig::resolve(cli.database_url.as_deref())?;
            // Boot without credentials; generation requests then surface the
            // missing key as a configuration error at call time.
            let generator: Arc<dyn Generator> = match resolved.generator(None) {
                Ok(generator) => generator,
                Err(err) => {
                    tracing::warn!(error = %err, "generation backend not configured");
                    Arc::new(serve_cmd::UnconfiguredGenerator)
                }
            };
            let db_pool = pool::create_pool(&resolved.db_config).await?;
            let result = serve_cmd::run_serve(db_pool.clone(), generator, &bind, port).await;
            db_pool.close().await;
            result?;
        }
    }

    Ok(())
}
