use clap::{Parser, Subcommand};
use std::path::PathBuf;

use cursekit::client::MINECRAFT_GAME_ID;
use cursekit::records::{DEFAULT_PAGE_SIZE, SortField};

#[derive(Parser, Debug)]
#[command(name = "cursekit")]
#[command(about = "Query the CurseForge API", long_about = None)]
pub struct Cli {
    /// Configuration file (defaults to $CURSEKIT_CONFIG or config/cursekit.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List every game available to the API key
    Games,
    /// Show one game
    Game { game_id: u32 },
    /// List the categories of a game, or the sub-categories of one class
    Categories {
        game_id: u32,
        #[arg(long)]
        class: Option<u32>,
    },
    /// Show one addon
    Addon { addon_id: u32 },
    /// Search addons
    Search(SearchArgs),
    /// List the files of an addon
    Files { addon_id: u32 },
    /// Show one file of an addon
    File { addon_id: u32, file_id: u32 },
    /// Download one file of an addon
    Download {
        addon_id: u32,
        file_id: u32,
        /// Target file or directory
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
    /// Print the description of an addon
    Describe { addon_id: u32 },
    /// Print the changelog of an addon file
    Changelog { addon_id: u32, file_id: u32 },
    /// Print the effective configuration as TOML
    Config,
}

#[derive(clap::Args, Debug)]
pub struct SearchArgs {
    /// Free text filter
    pub filter: Option<String>,

    #[arg(long, default_value_t = MINECRAFT_GAME_ID)]
    pub game: u32,

    /// Root category, e.g. 6 for Minecraft mods
    #[arg(long, default_value_t = 6)]
    pub class: u32,

    #[arg(long)]
    pub game_version: Option<String>,

    /// Sort field id (1 featured .. 8 game version)
    #[arg(long, value_parser = parse_sort_field)]
    pub sort: Option<SortField>,

    #[arg(long, default_value_t = 0)]
    pub page: u32,

    #[arg(long, default_value_t = DEFAULT_PAGE_SIZE, value_parser = clap::value_parser!(u32).range(1..))]
    pub page_size: u32,
}

fn parse_sort_field(value: &str) -> Result<SortField, String> {
    let id: u8 = value
        .parse()
        .map_err(|e| format!("sort field must be a number: {e}"))?;
    SortField::try_from(id)
}
