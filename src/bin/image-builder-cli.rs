use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::StatusCode;
use serde_json::Value;

use image_builder_gateway::http::HttpErrorList;
use image_builder_gateway::security::identity::{encode_identity_header, Identity, IDENTITY_HEADER};

#[derive(Parser)]
#[command(name = "image-builder-cli")]
#[command(about = "Client for the image builder API", long_about = None)]
struct Cli {
    /// Base URL including the versioned prefix.
    #[arg(short, long, default_value = "http://localhost:8086/api/image-builder/v1")]
    url: String,

    /// Organization id placed in the identity header.
    #[arg(long, default_value = "000000")]
    org_id: String,

    #[arg(long)]
    account_number: Option<String>,

    /// Value of the `rhel` entitlement; omitted when not given.
    #[arg(long)]
    entitled: Option<bool>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the encoded identity header and exit
    Identity,
    /// Show the API version
    Version,
    /// List distributions available to the organization
    Distributions,
    /// List architectures and image types of a distribution
    Architectures { distribution: String },
    /// Submit a compose request read from a JSON file
    Compose { file: std::path::PathBuf },
    /// List previous composes
    Composes {
        #[arg(long, default_value_t = 100)]
        limit: u32,
        #[arg(long, default_value_t = 0)]
        offset: u32,
    },
    /// Show the status of one compose
    Status { id: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut identity = Identity::new(cli.org_id.clone(), cli.account_number.as_deref());
    if let Some(entitled) = cli.entitled {
        identity = identity.with_entitlement("rhel", entitled);
    }
    let encoded = encode_identity_header(&identity)?;

    if let Commands::Identity = cli.command {
        println!("{encoded}");
        return Ok(());
    }

    let client = reqwest::Client::new();
    let mut headers = HeaderMap::new();
    headers.insert(IDENTITY_HEADER, HeaderValue::from_str(&encoded)?);

    let base = cli.url.trim_end_matches('/');
    let res = match cli.command {
        Commands::Identity => return Ok(()),
        Commands::Version => client.get(format!("{base}/version")),
        Commands::Distributions => client.get(format!("{base}/distributions")),
        Commands::Architectures { distribution } => {
            client.get(format!("{base}/architectures/{}", urlencoding::encode(&distribution)))
        }
        Commands::Compose { file } => {
            let body = std::fs::read_to_string(file)?;
            client
                .post(format!("{base}/compose"))
                .header(CONTENT_TYPE, "application/json")
                .body(body)
        }
        Commands::Composes { limit, offset } => {
            client.get(format!("{base}/composes?limit={limit}&offset={offset}"))
        }
        Commands::Status { id } => client.get(format!("{base}/composes/{}", urlencoding::encode(&id))),
    }
    .headers(headers)
    .send()
    .await?;

    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;
    check_status(status, &text)?;

    match serde_json::from_str::<Value>(&text) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{text}"),
    }
    Ok(())
}

/// Fail on any non-2xx answer, carrying the error envelope when there is one.
fn check_status(status: StatusCode, text: &str) -> Result<(), String> {
    if status.is_success() {
        return Ok(());
    }
    let detail = serde_json::from_str::<HttpErrorList>(text)
        .ok()
        .and_then(|list| list.errors.into_iter().next())
        .map(|e| e.detail)
        .unwrap_or_else(|| text.to_string());
    Err(format!("API returned status {status}: {detail}"))
}
