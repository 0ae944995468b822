mod codec;
mod config;
mod controller;
mod error;
mod picture;
mod repository;
mod routes;
mod storage;


#[macro_use]
extern crate tracing;

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use mimalloc::MiMalloc;
use poem::listener::TcpListener;
use poem::Server;
use tracing_subscriber::EnvFilter;

use crate::config::{ServerConfig, StorageSettings};
use crate::controller::PictureController;
use crate::repository::MemoryPictureRepository;
use crate::storage::backends::select_backend;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> Result<()> {
    let args: ServerConfig = ServerConfig::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)),
        )
        .init();

    let settings = StorageSettings::load(args.config.as_deref())?;
    debug!("Loaded storage settings {:?}", &settings);

    let storage = select_backend(&settings).map_err(|e| {
        error!("Refusing to start: {}", e);
        e
    })?;

    let controller = Arc::new(PictureController::new(
        storage,
        Arc::new(MemoryPictureRepository::new()),
    ));

    let bind = format!("{}:{}", args.host, args.port);
    info!("Gallery serving on http://{}, API docs at /docs", &bind);

    Server::new(TcpListener::bind(bind))
        .run(routes::app(controller))
        .await?;

    Ok(())
}
