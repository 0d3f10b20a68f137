//! CLI for cluster operations

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use minifs::common::format_bytes;
use minifs::coordinator::{FileMetadata, FileSummary, HttpNodeClient, StorageNodeClient};
use reqwest::multipart::{Form, Part};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "minifs")]
#[command(about = "minifs distributed file store CLI")]
#[command(version)]
struct Cli {
    /// Coordinator URL
    #[arg(long, default_value = "http://localhost:5000")]
    coordinator: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload a file
    Upload {
        /// Local file
        file: PathBuf,

        /// Stored name (defaults to the local file name)
        #[arg(long)]
        name: Option<String>,
    },

    /// Download a file
    Download {
        /// Stored name
        name: String,

        /// Output file
        #[arg(long)]
        output: PathBuf,
    },

    /// List active storage nodes
    Nodes,

    /// List stored files
    Files,

    /// Show the chunk layout of a file
    Info {
        /// Stored name
        name: String,
    },

    /// List the files a storage node holds chunks for
    NodeList {
        /// Node address (host:port)
        node: String,
    },
}

async fn check(response: reqwest::Response) -> anyhow::Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    bail!("request failed ({}): {}", status, body)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let base = cli.coordinator.trim_end_matches('/').to_string();
    let client = reqwest::Client::new();

    match cli.command {
        Commands::Upload { file, name } => {
            let name = match name {
                Some(name) => name,
                None => file
                    .file_name()
                    .and_then(|n| n.to_str())
                    .map(str::to_string)
                    .context("cannot derive a file name; pass --name")?,
            };
            let data = tokio::fs::read(&file)
                .await
                .with_context(|| format!("reading {}", file.display()))?;
            let size = data.len() as u64;

            let form = Form::new().part("file", Part::bytes(data).file_name(name.clone()));
            let response = check(
                client
                    .post(format!("{}/upload", base))
                    .multipart(form)
                    .send()
                    .await?,
            )
            .await?;
            let body: serde_json::Value = response.json().await?;

            println!("Uploaded {} ({})", name, format_bytes(size));
            println!("  Chunks: {}", body["chunks"]);
            let failed = body["failed_chunks"].as_u64().unwrap_or(0);
            if failed > 0 {
                println!("  Failed chunks: {} (file is incomplete)", failed);
            }
        }

        Commands::Download { name, output } => {
            let response = check(
                client
                    .get(format!("{}/download/{}", base, urlencode(&name)))
                    .send()
                    .await?,
            )
            .await?;
            let data = response.bytes().await?;
            tokio::fs::write(&output, &data)
                .await
                .with_context(|| format!("writing {}", output.display()))?;
            println!(
                "Downloaded {} ({}) to {}",
                name,
                format_bytes(data.len() as u64),
                output.display()
            );
        }

        Commands::Nodes => {
            let response = check(client.get(format!("{}/nodes", base)).send().await?).await?;
            let nodes: Vec<String> = response.json().await?;
            println!("Active nodes: {}", nodes.len());
            for node in nodes {
                println!("  {}", node);
            }
        }

        Commands::Files => {
            let response = check(client.get(format!("{}/files", base)).send().await?).await?;
            let files: Vec<FileSummary> = response.json().await?;
            println!("Files: {}", files.len());
            for file in files {
                println!(
                    "  {:<40} {:>12} {:>6} chunks{}",
                    file.name,
                    format_bytes(file.total_size),
                    file.chunks,
                    if file.complete { "" } else { "  (incomplete)" }
                );
            }
        }

        Commands::Info { name } => {
            let response = check(
                client
                    .get(format!("{}/files/{}", base, urlencode(&name)))
                    .send()
                    .await?,
            )
            .await?;
            let meta: FileMetadata = response.json().await?;
            println!("{} ({})", meta.name, format_bytes(meta.total_size));
            for (i, chunk) in meta.chunks.iter().enumerate() {
                println!("  [{}] {} {} bytes on {}", i, chunk.chunk_id, chunk.size, chunk.node);
            }
        }

        Commands::NodeList { node } => {
            let files = HttpNodeClient::new(Duration::from_secs(10))?
                .list_files(&node)
                .await?;
            println!("{} holds chunks for {} files", node, files.len());
            for file in files {
                println!("  {}", file);
            }
        }
    }

    Ok(())
}

/// Encode a file name for use as one URL path segment
fn urlencode(name: &str) -> String {
    percent_encoding::utf8_percent_encode(name, percent_encoding::NON_ALPHANUMERIC).to_string()
}
