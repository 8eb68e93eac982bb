use clap::{Parser, Subcommand};
use gitea_migrator::{apps, logging, ActionsConfig, MigrationConfig};
use tracing::error;

#[derive(Parser)]
#[command(name = "gitea_migrator", version, about = "Migrate a GitLab instance to Gitea")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Migrate users, groups, repositories, labels, milestones and issues.
    Migrate,
    /// Insert a `git log` dump into Gitea's activity feed.
    ImportActions,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    logging::init_tracing()?;
    let cli = Cli::parse();
    let result = match cli.command {
        Command::Migrate => match MigrationConfig::from_env() {
            Ok(config) => apps::run_migration(config).await.map(|_| ()),
            Err(e) => Err(e),
        },
        Command::ImportActions => match ActionsConfig::from_env() {
            Ok(config) => apps::import_actions(config).await.map(|_| ()),
            Err(e) => Err(e),
        },
    };
    if let Err(e) = &result {
        error!("{e}");
    }
    Ok(result?)
}
