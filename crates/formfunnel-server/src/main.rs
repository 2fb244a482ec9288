mod config;
mod flows;
mod server;

use clap::Parser;
use config::Config;
use tracing_subscriber::FmtSubscriber;

#[derive(Debug, Parser)]
#[command(name = "formfunnel", about = "Form submission backend")]
struct Args {
    #[arg(long, default_value = "config.example.toml")]
    config: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let subscriber = FmtSubscriber::new();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();
    let config = Config::from_path(&args.config)?;
    server::run(config).await?;
    Ok(())
}
