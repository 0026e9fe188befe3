//! hostvars CLI
//!
//! Ansible dynamic-inventory script and small admin tool for the hostvars
//! daemon. `--list` and `--host <name>` follow the dynamic-inventory
//! contract; subcommands manage the inventory.

use clap::{ArgGroup, Parser, Subcommand};
use color_eyre::Result;
use hostvars_api::requests::SetFactsRequest;
use hostvars_client::HttpClient;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "hostvars-cli", version)]
#[command(about = "Ansible dynamic inventory backed by the hostvars daemon", long_about = None)]
#[command(group(ArgGroup::new("mode").args(["list", "host"])))]
struct Cli {
    /// Daemon base URL
    #[arg(long, env = "HOSTVARS_SERVER", default_value = "http://localhost:8250")]
    server: String,

    /// Print the whole inventory
    #[arg(long)]
    list: bool,

    /// Print the variables of a single host
    #[arg(long, value_name = "HOSTNAME")]
    host: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that the daemon answers
    Ping,
    /// Create a hostgroup
    AddGroup { hostgroup: String },
    /// Create a host, and its hostgroup if needed
    AddHost { hostgroup: String, hostname: String },
    /// Set facts on a host, given as NAME=VALUE pairs
    SetFact {
        hostgroup: String,
        hostname: String,
        #[arg(required = true, value_parser = parse_fact)]
        facts: Vec<(String, String)>,
    },
}

fn parse_fact(raw: &str) -> std::result::Result<(String, String), String> {
    raw.split_once('=')
        .filter(|(name, _)| !name.is_empty())
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .ok_or_else(|| format!("expected NAME=VALUE, got {raw:?}"))
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    // Stdout carries inventory JSON, so logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let client = HttpClient::new(&cli.server)?;

    if cli.list {
        let inventory = client.inventory().await?;
        println!("{}", serde_json::to_string(&inventory)?);
        return Ok(());
    }

    if let Some(hostname) = cli.host {
        let inventory = client.inventory().await?;
        let vars = inventory.hostvars(&hostname).cloned().unwrap_or_default();
        println!("{}", serde_json::to_string(&vars)?);
        return Ok(());
    }

    match cli.command {
        Some(Commands::Ping) => {
            println!("{}", client.ping().await?);
        }
        Some(Commands::AddGroup { hostgroup }) => {
            client.create_hostgroup(&hostgroup).await?;
        }
        Some(Commands::AddHost {
            hostgroup,
            hostname,
        }) => {
            client.create_host(&hostgroup, &hostname).await?;
        }
        Some(Commands::SetFact {
            hostgroup,
            hostname,
            facts,
        }) => {
            let request = facts
                .into_iter()
                .fold(SetFactsRequest::new(hostgroup, hostname), |req, (name, value)| {
                    req.fact(name, value)
                });
            client.set_facts(request).await?;
        }
        None => {
            // Ansible calls without a mode only by mistake; an empty listing
            // keeps it from failing on invalid JSON.
            println!("{{}}");
        }
    }

    Ok(())
}
