//! Gantry Gateway Server
//!
//! Main entry point for the Gantry load balancing gateway

use gantry_api::start_server;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    start_server().await?;
    Ok(())
}
