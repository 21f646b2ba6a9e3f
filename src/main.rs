use clap::Parser;
use repo_metrics::api::Error;
use repo_metrics_app::Args;

/// Computes repository metrics and prints the batch summary.
#[tokio::main]
async fn main() -> Result<(), Error> {
    dotenv::dotenv().ok();
    env_logger::init();
    let args = Args::parse();

    let summary = repo_metrics_app::collect_metrics(args).await?;
    println!("{}", summary);

    Ok(())
}
