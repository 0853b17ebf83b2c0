use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::{json, Value};
use url::Url;

use proxy_mgmt::records::{Record, RecordType, RecordValue};

#[derive(Parser)]
#[command(name = "mgmt-cli")]
#[command(about = "Command-line client for the proxy management API", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8081")]
    url: String,

    #[arg(short, long, env = "MGMT_API_KEY", default_value = "CHANGE_ME_IN_PRODUCTION")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show daemon status and file versions
    Status,
    /// Print the rules of one configuration file (e.g. `remap.config`)
    Rules { file: String },
    /// Read one or more records
    Get {
        #[arg(required = true)]
        names: Vec<String>,
    },
    /// Set one record
    Set {
        name: String,
        /// int, counter, float or string
        #[arg(value_name = "TYPE")]
        rtype: RecordType,
        value: String,
    },
    /// List records under a prefix
    Match { prefix: String },
    /// Reset process and node statistics to their defaults
    ResetStats,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", cli.key))?,
    );

    let base: Url = cli.url.parse()?;
    let request = match cli.command {
        Commands::Status => client.get(base.join("/mgmt/status")?),
        Commands::Rules { file } => client.get(base.join(&format!("/mgmt/config/{}", file))?),
        Commands::Get { names } => client
            .post(base.join("/mgmt/records/get")?)
            .json(&json!({ "names": names })),
        Commands::Set { name, rtype, value } => {
            let value = RecordValue::parse_as(rtype, &value)?;
            client
                .post(base.join("/mgmt/records/set")?)
                .json(&json!({ "records": [Record::new(name, value)] }))
        }
        Commands::Match { prefix } => {
            client.get(base.join(&format!("/mgmt/records/match/{}", prefix))?)
        }
        Commands::ResetStats => client.post(base.join("/mgmt/stats/reset")?),
    };

    tracing::debug!("Sending admin request");
    let res = request.headers(headers).send().await?;
    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: Admin API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        std::process::exit(1);
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
