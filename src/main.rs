//! Facestream server binary.
//!
//! Trains the k-NN identity classifier at startup, then serves streaming
//! face recognition over websockets. Deployments with real detector assets
//! swap the extraction backend here; the default is the deterministic stub.

use std::sync::Arc;

use facestream::extract::StubExtractor;
use facestream::ServerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Load configuration
    let config = ServerConfig::load()?;

    // Start server (trains before accepting connections)
    facestream::server::start_server(config, Arc::new(StubExtractor)).await?;

    Ok(())
}
