mod cli;

use clap::Parser;
use cli::{Cli, Commands, SearchArgs};
use serde::Serialize;

use cursekit::client::CurseClient;
use cursekit::config::Config;
use cursekit::observability::init_tracing;
use cursekit::records::{Description, SearchParam};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let cli = Cli::parse();

    let config = match cli.config {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load()?,
    };
    init_tracing(&config.logging.filter);

    if matches!(cli.command, Commands::Config) {
        print!("{}", config.to_toml()?);
        return Ok(());
    }

    let client = CurseClient::new(&config)?;

    match cli.command {
        Commands::Games => print_json(&client.games().await?)?,
        Commands::Game { game_id } => print_json(&client.game(game_id).await?)?,
        Commands::Categories {
            game_id,
            class: Some(class),
        } => print_json(&client.sub_categories(game_id, class).await?)?,
        Commands::Categories { game_id, class: None } => {
            print_json(&client.categories(game_id).await?)?
        }
        Commands::Addon { addon_id } => print_json(&client.addon(addon_id).await?)?,
        Commands::Search(args) => {
            let (game, class) = (args.game, args.class);
            let addons = client.search(game, class, search_param(args)).await?;
            print_json(&addons)?
        }
        Commands::Files { addon_id } => print_json(&client.addon_files(addon_id).await?)?,
        Commands::File { addon_id, file_id } => {
            print_json(&client.addon_file(addon_id, file_id).await?)?
        }
        Commands::Download {
            addon_id,
            file_id,
            out,
        } => match client.addon_file(addon_id, file_id).await? {
            Some(file) => {
                let written = file.download_to(&out).await?;
                println!("{written} bytes -> {}", out.display());
            }
            None => tracing::warn!(addon_id, file_id, "No handler answered the file lookup"),
        },
        Commands::Describe { addon_id } => {
            print_description(client.addon_description(addon_id).await?)
        }
        Commands::Changelog { addon_id, file_id } => {
            print_description(client.file_description(addon_id, file_id).await?)
        }
        Commands::Config => {}
    }

    tracing::debug!(metrics = ?client.registry().metrics().snapshot(), "Done");
    Ok(())
}

fn search_param(args: SearchArgs) -> SearchParam {
    let mut param = SearchParam::builder()
        .maybe_search_filter(args.filter)
        .maybe_game_version(args.game_version)
        .maybe_sort_field(args.sort)
        .page_size(args.page_size)
        .build();
    param.set_page(args.page);
    param
}

fn print_json<T: Serialize>(value: &T) -> Result<(), BoxError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_description(description: Option<Description>) {
    if let Some(description) = description {
        println!("{description}");
    }
}
