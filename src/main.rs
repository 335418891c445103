use anyhow::Result;
use mailprobe::cli;

#[tokio::main]
async fn main() -> Result<()> {
    cli::run().await
}
