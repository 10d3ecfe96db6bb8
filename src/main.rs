use std::sync::Arc;

use doctalk::index::VectorIndex;
use doctalk::{config, server, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let config = config::load()?;
    let index = VectorIndex::open(&config.data_dir)?;
    match &index {
        Some(_) => log::info!(
            "opened existing vector index at {}",
            config.data_dir.display()
        ),
        None => log::info!(
            "no vector index at {} yet; it will be created on first upload",
            config.data_dir.display()
        ),
    }

    let state = Arc::new(AppState::new(config, index)?);
    server::run(state).await
}
