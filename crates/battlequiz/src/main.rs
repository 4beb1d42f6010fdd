use std::path::PathBuf;
use std::sync::Arc;

use battlequiz::prelude::*;
use clap::Parser;

/// BattleQuiz Server - HP quiz battles for two or three players
#[derive(Parser, Debug)]
#[command(name = "battlequiz-server", version, about)]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to bind the server to (overrides the config file)
    #[arg(short, long)]
    bind: Option<String>,

    /// Question catalog JSON file (overrides the config file)
    #[arg(short, long)]
    questions: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), BattleQuizError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "battlequiz=info,battlequiz_room=info".into()),
        )
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => ServerConfig::load(path)?,
        None => ServerConfig::default(),
    };
    if let Some(bind) = args.bind {
        config.listen_addr = bind;
    }
    if let Some(questions) = args.questions {
        config.questions_path = questions;
    }
    config.validate()?;

    let catalog = Arc::new(QuestionCatalog::load(&config.questions_path)?);

    let server = BattleQuizServerBuilder::from_config(&config)
        .build(catalog)
        .await?;
    tracing::info!(addr = %config.listen_addr, "starting battlequiz server");
    server.run().await
}
