mod api_client;
mod batch_loader;
mod config;
mod data;
mod error;
mod impute;
mod runner;

use api_client::ApiClient;
use batch_loader::NdJsonBatchLoader;
use clap::{Parser, Subcommand};
use config::Config;
use error::Error;
use log::error;

#[derive(Parser)]
struct Args {
    #[command(flatten)]
    config: Config,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Pull the current campaign snapshot from the API and land it as a raw
    /// NDJSON batch
    Fetch,

    /// Clean one landed batch and append it to the partitioned store
    Transform {
        #[arg(help = "Raw batch path of the form <root>/<date>/<time>/<file>")]
        file_path: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let args = Args::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let result = match &args.command {
        Command::Fetch => {
            let api_client = ApiClient::new(&args.config);
            runner::fetch_and_land(&api_client, &args.config).await
        }
        Command::Transform { file_path } => {
            runner::transform_batch(&NdJsonBatchLoader, &args.config, file_path).await
        }
    };

    if let Err(err) = result {
        error!("failed to process campaign data: {}", err);
        std::process::exit(1);
    }

    Ok(())
}
