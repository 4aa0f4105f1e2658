//! Hazard game server binary

use clap::Parser;
use hazard::{
    api::HazardServer,
    config::{HazardConfig, StorageBackend},
};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "hazard")]
#[command(about = "Roulette, loot case and case battle server", long_about = None)]
struct Args {
    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the listen host
    #[arg(long)]
    host: Option<String>,

    /// Override the listen port
    #[arg(long)]
    port: Option<u16>,

    /// Override the RocksDB data directory
    #[arg(long)]
    db_path: Option<String>,

    /// Keep all state in memory
    #[arg(long)]
    memory: bool,
}

impl Args {
    fn into_config(self) -> Result<HazardConfig, Box<dyn std::error::Error>> {
        let mut config = match &self.config {
            Some(path) => HazardConfig::load(path)?,
            None => HazardConfig::default(),
        };

        if let Some(host) = self.host {
            config.server.host = host;
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(db_path) = self.db_path {
            config.storage.backend = StorageBackend::Rocksdb;
            config.storage.data_directory = db_path;
        }
        if self.memory {
            config.storage.backend = StorageBackend::Memory;
        }

        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Args::parse().into_config()?;

    HazardServer::new(config).run().await?;

    Ok(())
}
