mod bridge;
mod config;
mod error;
mod hass;
mod logging;
mod mpris;
mod runtime;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    runtime::run().await
}
