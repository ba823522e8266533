use std::path::PathBuf;

use salus_config::ServiceConfig;
use salus_state::datastore::DataStore;
use clap::Parser;

#[derive(Clone, Debug, Parser)]
pub struct Cli {
    #[clap(alias="config", default_value_os_t=PathBuf::from("/etc/salus/config.json"))]
    config_path: PathBuf,
    #[clap(long, short)]
    api_port: Option<u16>,
    #[clap(long, short)]
    db_path: Option<PathBuf>,
    #[clap(long, short, default_value="info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let parser = Cli::parse();

    dotenv::dotenv().ok();
    let level = parser.log_level.parse().unwrap_or(log::LevelFilter::Info);
    simple_logger::SimpleLogger::new().with_level(level).init()?;

    let mut config = if parser.config_path.exists() {
        ServiceConfig::from_file(&parser.config_path)?
    } else {
        log::warn!(
            "No config file at {}, falling back to defaults",
            parser.config_path.display()
        );
        ServiceConfig::default()
    };
    config.apply_env_overrides();
    if let Some(port) = parser.api_port {
        config.api_port = port;
    }
    if let Some(path) = parser.db_path {
        config.db_path = path;
    }

    let datastore = DataStore::new(config)?;

    let (shutdown_tx, shutdown_rx) = tokio::sync::broadcast::channel(1);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown_tx.send(());
        }
    });

    datastore.run(shutdown_rx).await?;

    Ok(())
}
