use clap::Parser;
use fmp_income_relay::client::RelayClient;
use fmp_income_relay::config::ClientConfig;
use fmp_income_relay::data_structures::{IncomeStatementRecord, Ticker};
use fmp_income_relay::query::{RawIncomeQuery, run_query};
use fmp_income_relay::source::IncomeStatementSource;

/// Fetch a company's annual income statements through the relay and filter
/// or sort them locally.
#[derive(Debug, Parser)]
#[command(name = "income-cli", version)]
struct Cli {
    /// Ticker symbol, e.g. AAPL
    symbol: String,

    /// Earliest fiscal period end, YYYY or YYYY-MM-DD
    #[arg(long)]
    date_from: Option<String>,

    /// Latest fiscal period end, YYYY or YYYY-MM-DD
    #[arg(long)]
    date_to: Option<String>,

    #[arg(long, allow_negative_numbers = true)]
    min_revenue: Option<f64>,

    #[arg(long, allow_negative_numbers = true)]
    max_revenue: Option<f64>,

    #[arg(long, allow_negative_numbers = true)]
    min_net_income: Option<f64>,

    #[arg(long, allow_negative_numbers = true)]
    max_net_income: Option<f64>,

    /// One of date, revenue, netIncome
    #[arg(long)]
    sort: Option<String>,

    #[arg(long)]
    descending: bool,

    /// Override USE_LOCAL_RELAY from the environment
    #[arg(long, conflicts_with = "deployed")]
    local: bool,

    #[arg(long)]
    deployed: bool,
}

impl Cli {
    fn raw_query(&self) -> RawIncomeQuery {
        RawIncomeQuery {
            date_from: self.date_from.clone(),
            date_to: self.date_to.clone(),
            min_revenue: self.min_revenue,
            max_revenue: self.max_revenue,
            min_net_income: self.min_net_income,
            max_net_income: self.max_net_income,
            sort_field: self.sort.clone(),
            ascending: Some(!self.descending),
        }
    }
}

fn print_records(records: &[IncomeStatementRecord]) {
    println!("{:<8} {:<12} {:>20} {:>20} {:>10}", "SYMBOL", "DATE", "REVENUE", "NET INCOME", "EPS");
    for record in records {
        println!(
            "{:<8} {:<12} {:>20.0} {:>20.0} {:>10.2}",
            record.symbol, record.date.to_string(), record.revenue, record.net_income, record.eps
        );
    }
    println!("{} record(s)", records.len());
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let mut config = ClientConfig::from_env()?;
    if cli.local {
        config.use_local_relay = true;
    } else if cli.deployed {
        anyhow::ensure!(
            config.deployed_relay_url.is_some(),
            "DEPLOYED_RELAY_URL must be set to use --deployed"
        );
        config.use_local_relay = false;
    }

    let ticker = Ticker::parse(&cli.symbol)?;
    // Reject bad criteria before the network call
    let query = cli.raw_query().into_query()?;

    let client = RelayClient::new(&config)?;
    tracing::info!(relay = client.base_url(), %ticker, "Fetching income statements");

    let records = match client.annual_income_statements(&ticker).await {
        Ok(records) => records,
        Err(err) => {
            tracing::error!(error = %err, "Could not load data");
            anyhow::bail!("could not load data for {ticker}: {err}");
        }
    };

    print_records(&run_query(&records, &query));
    Ok(())
}
