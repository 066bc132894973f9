use std::path::PathBuf;

use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Client, RequestBuilder};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "routectl")]
#[command(about = "Operator CLI for the gateway control plane", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:5000")]
    url: String,

    /// Operator bearer token.
    #[arg(short, long, env = "ROUTECTL_TOKEN", default_value = "")]
    token: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List your routes
    List,
    /// Show one route with its targets
    Get { id: i64 },
    /// Create a route from a JSON definition file
    Create {
        #[arg(short, long)]
        file: PathBuf,
    },
    /// Replace a route from a JSON definition file
    Update {
        id: i64,
        #[arg(short, long)]
        file: PathBuf,
    },
    /// Delete a route
    Delete { id: i64 },
    /// List connected gateways
    Gateways,
    /// Print the snapshot gateways see
    Snapshot,
    /// Check control plane health
    Health,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = Client::new();
    let base = cli.url.trim_end_matches('/');

    let mut headers = HeaderMap::new();
    if !cli.token.is_empty() {
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", cli.token))?,
        );
    }
    let routes = format!("{base}/api/routes");

    let request: RequestBuilder = match cli.command {
        Commands::List => client.get(&routes).headers(headers),
        Commands::Get { id } => client.get(format!("{routes}/{id}")).headers(headers),
        Commands::Create { file } => client.post(&routes).headers(headers).json(&read_definition(&file)?),
        Commands::Update { id, file } => client
            .put(format!("{routes}/{id}"))
            .headers(headers)
            .json(&read_definition(&file)?),
        Commands::Delete { id } => client.delete(format!("{routes}/{id}")).headers(headers),
        Commands::Gateways => client.get(format!("{base}/api/gateways")).headers(headers),
        Commands::Snapshot => client.get(format!("{base}/gateway/config")),
        Commands::Health => client.get(format!("{base}/health")),
    };

    print_response(request.send().await?).await
}

fn read_definition(path: &PathBuf) -> Result<Value, Box<dyn std::error::Error>> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;
    let rendered = match serde_json::from_str::<Value>(&text) {
        Ok(json) => serde_json::to_string_pretty(&json)?,
        Err(_) => text,
    };

    if !status.is_success() {
        eprintln!("Error: control plane returned status {status}");
        eprintln!("{rendered}");
        std::process::exit(1);
    }

    println!("{rendered}");
    Ok(())
}
