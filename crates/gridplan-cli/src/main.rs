mod config;
mod grid_cmd;
mod post_cmds;
mod session;

use std::path::{Path, PathBuf};

use chrono::NaiveTime;
use clap::{Args, Parser, Subcommand};

use gridplan_core::{DateKey, MonthKey};
use gridplan_db::pool;

use config::GridplanConfig;
use post_cmds::ListTarget;
use session::Session;

#[derive(Parser)]
#[command(name = "gridplan", about = "Content calendar and feed grid planner")]
struct Cli {
    /// Database URL; selects PostgreSQL storage (overrides GRIDPLAN_DATABASE_URL)
    #[arg(long, global = true)]
    database_url: Option<String>,

    /// Directory for file storage (overrides GRIDPLAN_DATA_DIR)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a gridplan config file
    Init {
        /// Feed grid slot count
        #[arg(long)]
        capacity: Option<usize>,
        /// Directory for uploaded media
        #[arg(long)]
        media_dir: Option<PathBuf>,
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
    /// Create and migrate the PostgreSQL database
    DbInit,
    /// Schedule a new post
    Add(AddArgs),
    /// Move a post to another day of the same month
    Move {
        post_id: String,
        /// Current date (YYYY-MM-DD)
        from: DateKey,
        /// New date (YYYY-MM-DD)
        to: DateKey,
        /// Also change the time of day (HH:MM)
        #[arg(long, value_parser = parse_time)]
        time: Option<NaiveTime>,
    },
    /// Edit a post's fields
    Update(UpdateArgs),
    /// Delete a post
    Delete {
        post_id: String,
        /// Date the post is scheduled on (YYYY-MM-DD)
        date: DateKey,
    },
    /// List posts for a day (YYYY-MM-DD) or a month (YEAR-MONTHINDEX, e.g. 2025-0)
    List {
        target: ListTarget,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// List months that have a stored plan
    Months {
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Preview the feed grid for a month (YEAR-MONTHINDEX)
    Grid {
        month: MonthKey,
        /// Override the slot count
        #[arg(long)]
        capacity: Option<usize>,
        /// Swap two slots in the preview (repeatable, display only)
        #[arg(long, num_args = 2, value_names = ["I", "J"])]
        swap: Vec<usize>,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
}

/// Free-text post fields shared by `add` and `update`.
#[derive(Args, Debug, Default)]
pub struct PostFields {
    #[arg(long)]
    pub category: Option<String>,
    #[arg(long)]
    pub pillar: Option<String>,
    #[arg(long)]
    pub topic: Option<String>,
    #[arg(long)]
    pub caption: Option<String>,
    #[arg(long)]
    pub notes: Option<String>,
    #[arg(long)]
    pub audio_link: Option<String>,
}

#[derive(Args, Debug)]
pub struct AddArgs {
    /// Date to schedule on (YYYY-MM-DD)
    pub date: DateKey,
    /// Post, Reel, Carousel or Story
    #[arg(long = "type", default_value = "Post")]
    pub post_type: String,
    #[command(flatten)]
    pub fields: PostFields,
    /// Time of day (HH:MM); the feed orders untimed posts at 09:00
    #[arg(long, value_parser = parse_time)]
    pub time: Option<NaiveTime>,
    /// URL of already hosted media
    #[arg(long, conflicts_with = "upload")]
    pub media: Option<String>,
    /// URL of an already hosted cover image
    #[arg(long, conflicts_with = "upload_cover")]
    pub cover: Option<String>,
    /// File to upload as the post's media
    #[arg(long)]
    pub upload: Option<PathBuf>,
    /// File to upload as the cover image
    #[arg(long)]
    pub upload_cover: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct UpdateArgs {
    pub post_id: String,
    /// Date the post is scheduled on (YYYY-MM-DD)
    pub date: DateKey,
    /// New type: Post, Reel, Carousel or Story
    #[arg(long = "type")]
    pub post_type: Option<String>,
    /// Text fields; pass an empty string to clear one
    #[command(flatten)]
    pub fields: PostFields,
    /// New time of day (HH:MM)
    #[arg(long, value_parser = parse_time)]
    pub time: Option<NaiveTime>,
    /// Replace the media URL
    #[arg(long)]
    pub media: Option<String>,
    /// Replace the cover URL
    #[arg(long)]
    pub cover: Option<String>,
    /// Remove the media (and delete an uploaded file)
    #[arg(long)]
    pub clear_media: bool,
    /// Remove the cover (and delete an uploaded file)
    #[arg(long)]
    pub clear_cover: bool,
}

fn parse_time(raw: &str) -> Result<NaiveTime, String> {
    NaiveTime::parse_from_str(raw, "%H:%M").map_err(|_| format!("expected HH:MM, got {raw:?}"))
}

/// Execute the `gridplan init` command: write config file.
fn cmd_init(
    cli_db_url: Option<&str>,
    cli_data_dir: Option<&Path>,
    capacity: Option<usize>,
    media_dir: Option<PathBuf>,
    force: bool,
) -> anyhow::Result<()> {
    let path = config::config_path();

    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}\nUse --force to overwrite.",
            path.display()
        );
    }

    let data_dir = cli_data_dir
        .map(Path::to_path_buf)
        .unwrap_or_else(config::default_data_dir);
    let mut cfg = config::ConfigFile::default();
    cfg.storage.data_dir = Some(data_dir.clone());
    cfg.storage.database_url = cli_db_url.map(str::to_string);
    if let Some(capacity) = capacity {
        if capacity == 0 {
            anyhow::bail!("--capacity must be at least 1");
        }
        cfg.grid.capacity = capacity;
    }
    cfg.media.dir = media_dir;

    config::save_config(&cfg)?;

    println!("Config written to {}", path.display());
    println!("  storage.data_dir = {}", data_dir.display());
    if let Some(url) = &cfg.storage.database_url {
        println!(
            "  storage.database_url = {}",
            gridplan_db::config::DbConfig::new(url.as_str()).redacted_url()
        );
    }
    println!("  grid.capacity = {}", cfg.grid.capacity);
    if cfg.storage.database_url.is_some() {
        println!();
        println!("Next: run `gridplan db-init` to create and migrate the database.");
    }

    Ok(())
}

/// Execute the `gridplan db-init` command: create database and run migrations.
async fn cmd_db_init(cli_db_url: Option<&str>) -> anyhow::Result<()> {
    let db_config = GridplanConfig::db_config(cli_db_url)?;

    println!("Initializing gridplan database...");

    pool::ensure_database_exists(&db_config).await?;
    let db_pool = pool::create_pool(&db_config).await?;
    let result = pool::run_migrations(&db_pool).await;
    db_pool.close().await;
    result?;

    println!("gridplan db-init complete.");
    Ok(())
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Init {
            capacity,
            media_dir,
            force,
        } => cmd_init(
            cli.database_url.as_deref(),
            cli.data_dir.as_deref(),
            capacity,
            media_dir,
            force,
        ),
        Commands::DbInit => cmd_db_init(cli.database_url.as_deref()).await,
        command => {
            let capacity = match &command {
                Commands::Grid { capacity, .. } => *capacity,
                _ => None,
            };
            let resolved = GridplanConfig::resolve(
                cli.database_url.as_deref(),
                cli.data_dir.as_deref(),
                capacity,
            )?;
            let session = Session::connect(&resolved).await?;
            let result = run_with_session(&session, command).await;
            session.close().await;
            result
        }
    }
}

async fn run_with_session(session: &Session, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Add(args) => post_cmds::run_add(session, args).await,
        Commands::Move {
            post_id,
            from,
            to,
            time,
        } => post_cmds::run_move(session, &post_id, from, to, time).await,
        Commands::Update(args) => post_cmds::run_update(session, args).await,
        Commands::Delete { post_id, date } => post_cmds::run_delete(session, &post_id, date).await,
        Commands::List { target, json } => post_cmds::run_list(session, target, json).await,
        Commands::Months { json } => post_cmds::run_months(session, json).await,
        Commands::Grid {
            month, swap, json, ..
        } => grid_cmd::run_grid(session, month, &swap, json).await,
        Commands::Init { .. } | Commands::DbInit => Ok(()),
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod test_util {
    use std::sync::{Mutex, MutexGuard};

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    /// Serialize tests that mutate process environment variables.
    pub fn lock_env() -> MutexGuard<'static, ()> {
        ENV_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn grid_swaps_are_collected_in_pairs() {
        let cli = Cli::try_parse_from([
            "gridplan", "grid", "2025-0", "--swap", "0", "1", "--swap", "3", "4",
        ])
        .unwrap();
        match cli.command {
            Commands::Grid { month, swap, .. } => {
                assert_eq!(month, MonthKey::new(2025, 0).unwrap());
                assert_eq!(swap, [0, 1, 3, 4]);
            }
            _ => panic!("expected grid command"),
        }
    }

    #[test]
    fn add_rejects_bad_date_and_time() {
        assert!(Cli::try_parse_from(["gridplan", "add", "2025-13-01"]).is_err());
        assert!(Cli::try_parse_from(["gridplan", "add", "2025-01-01", "--time", "9am"]).is_err());
        let cli = Cli::try_parse_from([
            "gridplan", "add", "2025-01-01", "--type", "Reel", "--time", "18:30", "--topic", "Tour",
        ])
        .unwrap();
        match cli.command {
            Commands::Add(args) => {
                assert_eq!(args.post_type, "Reel");
                assert_eq!(args.time, NaiveTime::from_hms_opt(18, 30, 0));
                assert_eq!(args.fields.topic.as_deref(), Some("Tour"));
            }
            _ => panic!("expected add command"),
        }
    }
}
