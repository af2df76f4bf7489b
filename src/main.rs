use std::path::PathBuf;

use clap::{Parser, Subcommand};

use foodgram::{
    config::Config,
    loader::{load_ingredients, load_tags},
    state::State,
};

#[derive(Parser, Debug)]
#[command(name = "foodgram", version, about = "Recipe sharing backend")]
struct Cli {
    #[command(flatten)]
    config: Config,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
enum Command {
    /// Apply migrations and start the HTTP server (default)
    Serve,
    /// Apply pending database migrations and exit
    Migrate,
    /// Insert ingredients and tags from CSV files, skipping existing ones
    LoadData {
        #[arg(long, default_value = "data/ingredients.csv")]
        ingredients: PathBuf,

        #[arg(long, default_value = "data/tags.csv")]
        tags: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let state = State::new(cli.config).await?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            state.migrate().await?;
            foodgram::serve(state).await?;
        }
        Command::Migrate => state.migrate().await?,
        Command::LoadData { ingredients, tags } => {
            load_ingredients(&ingredients, &state.pool).await?;
            load_tags(&tags, &state.pool).await?;
        }
    }

    Ok(())
}
