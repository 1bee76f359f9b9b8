use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use commands::{config, daemon, library, lookup, migrate, sync, updates};

mod commands;
mod logging;
mod output;

#[derive(Parser)]
#[command(name = "watchdeck")]
#[command(about = "WatchDeck - Keep your anime and series list in step with what has aired")]
#[command(version)]
struct Cli {
    /// Enable verbose output (use multiple times for more verbosity: -v, -vv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Output format
    #[arg(long, global = true, default_value = "human", value_enum)]
    output: output::OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum TitleKind {
    Anime,
    Series,
}

impl TitleKind {
    pub fn category(self) -> &'static str {
        match self {
            TitleKind::Anime => "ANIME",
            TitleKind::Series => "SERIES",
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Add a title to the library
    Add {
        title: String,

        #[arg(long, value_enum, default_value = "anime")]
        kind: TitleKind,

        /// Episodes watched or known so far
        #[arg(long, default_value_t = 0)]
        episodes: u32,

        /// Rating from 0 to 5
        #[arg(long, default_value_t = 0)]
        rating: u8,

        /// Tag to attach (repeatable)
        #[arg(long = "tag", value_name = "TAG")]
        tags: Vec<String>,

        /// Cover image to copy into the library
        #[arg(long, value_name = "PATH")]
        image: Option<std::path::PathBuf>,

        #[arg(long, action = ArgAction::SetTrue)]
        favorite: bool,
    },
    /// List tracked titles
    List {
        /// Only show titles carrying this tag
        #[arg(long)]
        tag: Option<String>,

        #[arg(long, action = ArgAction::SetTrue)]
        favorites: bool,
    },
    /// Remove a title (id or unique id prefix)
    Remove { id: String },
    /// Set the episode count of a title by hand
    SetEpisodes { id: String, episodes: u32 },
    /// Look up the current episode count for any title
    #[command(long_about = "Run the provider chain for a single title without touching the library. Anime goes through AniList, Shikimori and Jikan in that order; series use TMDB.")]
    Lookup {
        title: String,

        #[arg(long, value_enum, default_value = "anime")]
        kind: TitleKind,
    },
    /// Check every title for new episodes and refresh the pending update list
    CheckUpdates,
    /// Review pending episode updates
    Updates {
        #[command(subcommand)]
        cmd: Option<UpdatesCommands>,
    },
    /// Synchronize the library folder with Dropbox (one pass)
    Sync {
        /// Show what a pass would transfer without doing it
        #[arg(long, action = ArgAction::SetTrue)]
        status: bool,
    },
    /// Run in the foreground with the update check and sync on a schedule
    #[command(long_about = "Run WatchDeck as a long-lived process. Update checks and Dropbox syncs run on their cron schedules; a sync is also triggered a few seconds after a check finds new updates.")]
    Daemon {
        /// Cron schedule for update checks (6 fields, seconds first)
        #[arg(long, value_name = "SCHEDULE")]
        check_schedule: Option<String>,

        /// Cron schedule for Dropbox syncs
        #[arg(long, value_name = "SCHEDULE")]
        sync_schedule: Option<String>,

        /// Skip the initial check and sync on startup
        #[arg(long, action = ArgAction::SetTrue)]
        no_startup_run: bool,
    },
    /// Import the legacy anime_list.json into the library
    Migrate,
    /// Manage configuration and credentials
    Config {
        #[command(subcommand)]
        cmd: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum UpdatesCommands {
    /// Show pending updates
    List,
    /// Apply the proposed episode count
    Accept { id: String },
    /// Hide this proposed count until a different one shows up
    Dismiss { id: String },
    /// Accept every pending update
    AcceptAll,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show current configuration (masks secrets)
    Show {
        #[arg(long, action = ArgAction::SetTrue)]
        full: bool,
    },
    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long, action = ArgAction::SetTrue)]
        force: bool,
    },
    /// Store the TMDB API key
    Tmdb {
        #[arg(long)]
        api_key: Option<String>,
    },
    /// Store Dropbox credentials
    #[command(long_about = "Store Dropbox credentials. Either a refresh token together with the app key (recommended, tokens are renewed automatically) or a long-lived access token.")]
    Dropbox {
        #[arg(long)]
        app_key: Option<String>,

        #[arg(long)]
        refresh_token: Option<String>,

        #[arg(long, conflicts_with_all = ["app_key", "refresh_token"])]
        access_token: Option<String>,

        /// Remote folder to mirror the library into
        #[arg(long)]
        remote_root: Option<String>,

        /// Remove stored Dropbox credentials
        #[arg(long, action = ArgAction::SetTrue)]
        clear: bool,
    },
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();

    // The daemon logs to a file; everything else to stderr
    let log_file = match cli.command {
        Commands::Daemon { .. } => Some(watchdeck_config::PathManager::default().daemon_log_file()),
        _ => None,
    };
    logging::init_logging(cli.verbose, cli.quiet, log_file).map_err(|e| color_eyre::eyre::eyre!("{}", e))?;

    let output = output::Output::new(cli.output, cli.quiet);

    match cli.command {
        Commands::Add { title, kind, episodes, rating, tags, image, favorite } => {
            let new_title = library::NewTitle { title, kind, episodes, rating, tags, image, favorite };
            library::run_add(new_title, &output).await
        }
        Commands::List { tag, favorites } => library::run_list(tag, favorites, &output).await,
        Commands::Remove { id } => library::run_remove(&id, &output).await,
        Commands::SetEpisodes { id, episodes } => library::run_set_episodes(&id, episodes, &output).await,
        Commands::Lookup { title, kind } => lookup::run_lookup(&title, kind, &output).await,
        Commands::CheckUpdates => updates::run_check(&output).await,
        Commands::Updates { cmd } => updates::run_updates(cmd.unwrap_or(UpdatesCommands::List), &output).await,
        Commands::Sync { status } => sync::run_sync(status, &output).await,
        Commands::Daemon { check_schedule, sync_schedule, no_startup_run } => {
            daemon::run_daemon(check_schedule, sync_schedule, no_startup_run, &output).await
        }
        Commands::Migrate => migrate::run_migrate(&output).await,
        Commands::Config { cmd } => config::run_config(cmd, &output).await,
    }
}
