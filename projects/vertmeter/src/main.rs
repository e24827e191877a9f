use anyhow::Result;
use vertmeter::app::run;
use vertmeter::cli::Args;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt::init();

    let args = Args::parse_args();

    run(args).await?;

    Ok(())
}
