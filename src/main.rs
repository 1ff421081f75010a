use anyhow::Result;
use aria::cli;

#[tokio::main]
async fn main() -> Result<()> {
    cli::run().await
}
