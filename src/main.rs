use futures::stream::{Stream, TryStreamExt};
use prosper_client::analysis::{sorted_by_month, total_payments_by_month};
use prosper_client::config::Config;
use prosper_client::ProsperClient;
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const COMMANDS: [&str; 5] = ["monthly", "account", "notes", "listings", "payments"];
const USAGE: &str = "usage: prosper-client [monthly|account|notes|listings|payments]";

/// Prints every record of a stream as one JSON document per line.
async fn print_json_lines<S, T>(records: S) -> anyhow::Result<()>
where
    S: Stream<Item = prosper_client::Result<T>>,
    T: Serialize,
{
    let count = records
        .map_err(anyhow::Error::from)
        .try_fold(0usize, |count, record| async move {
            println!("{}", serde_json::to_string(&record)?);
            Ok::<_, anyhow::Error>(count + 1)
        })
        .await?;

    tracing::info!("Printed {} records", count);
    Ok(())
}

/// Entry point for the reporting binary.
///
/// Reads credentials from the environment, authenticates against Prosper and
/// prints the requested report. Defaults to the monthly payment totals.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "prosper_client=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let command = std::env::args().nth(1).unwrap_or_else(|| "monthly".to_string());
    if !COMMANDS.contains(&command.as_str()) {
        anyhow::bail!("unknown command {:?}\n{}", command, USAGE);
    }

    let config = Config::from_env()?;
    let client = ProsperClient::connect(&config).await?;
    tracing::info!("✓ Connected to {}", client.base_address());

    match command.as_str() {
        "monthly" => {
            let totals = total_payments_by_month(&client).await?;
            for (month, total) in sorted_by_month(&totals) {
                println!("{}  {:>12.2}", month.format("%Y-%m"), total);
            }
        }
        "account" => {
            let account = client.account().await?;
            println!("{}", serde_json::to_string_pretty(&account)?);
        }
        "notes" => print_json_lines(client.notes()).await?,
        "listings" => print_json_lines(client.biddable_listings()).await?,
        "payments" => print_json_lines(client.payments()).await?,
        other => anyhow::bail!("unknown command {:?}\n{}", other, USAGE),
    }

    Ok(())
}
