use ledger_quickstart::utils::HederaNetwork;
use ledger_quickstart::{run_quickstart, ConsoleObserver, RawConfig};
use std::env;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn init_logging() {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr);

    if env::var("RUST_LOG_FORMAT").is_ok_and(|format| format == "json") {
        builder.json().flatten_event(true).init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    dotenvy::dotenv().ok();
    init_logging();

    let report = run_quickstart(
        RawConfig::figment(),
        |config| HederaNetwork::for_testnet(&config.operator),
        &mut ConsoleObserver,
    )
    .await?;
    info!(
        run_id = %report.run_id,
        new_account_id = %report.new_account_id,
        "Done"
    );

    Ok(())
}
