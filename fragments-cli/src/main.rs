/*!
Fragments CLI - command-line interface for the fragment store.

Creates, reads, converts, lists and deletes fragments through the same
service a request handler would use. The backend comes from
`FRAGMENTS_BACKEND` and the `AWS_*` variables, overridden by flags.
*/

use anyhow::Context;
use bytes::Bytes;
use clap::{Parser, Subcommand, ValueEnum};
use fragments_core::observability::{gather_metrics, init_observability_with};
use fragments_core::{
    convert, create_stores, FragmentList, FragmentMetadata, FragmentService, MediaKind,
    StoreBackend, StoreConfig,
};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tabled::{Table, Tabled};
use tracing::info;

#[derive(Parser)]
#[command(name = "fragments")]
#[command(about = "CLI for the fragment store")]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    /// Store backend (defaults to FRAGMENTS_BACKEND, then memory)
    #[arg(short, long, global = true, value_enum)]
    backend: Option<BackendType>,

    /// S3 bucket for fragment data
    #[arg(long, global = true)]
    bucket: Option<String>,

    /// DynamoDB table for fragment metadata
    #[arg(long, global = true)]
    table: Option<String>,

    /// AWS region
    #[arg(long, global = true)]
    region: Option<String>,

    /// Endpoint override (LocalStack, DynamoDB Local, MinIO)
    #[arg(long, global = true)]
    endpoint: Option<String>,

    /// Owner the command acts on behalf of
    #[arg(short, long, global = true, env = "FRAGMENTS_OWNER", default_value = "local")]
    owner: String,

    /// Print Prometheus metrics to stderr after the command
    #[arg(long, global = true)]
    metrics: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum BackendType {
    Memory,
    Aws,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a fragment from a file (or stdin with `-`)
    Create {
        /// Media type of the data
        #[arg(short = 't', long = "type")]
        media_type: String,
        /// Input file, `-` for stdin
        #[arg(short, long, default_value = "-")]
        file: PathBuf,
    },
    /// Write a fragment's data, optionally converted
    Get {
        /// Fragment id, or `id.ext` to convert by extension
        id: String,
        /// Target media type
        #[arg(long)]
        to: Option<String>,
        /// Output file (stdout when omitted)
        #[arg(short = 'O', long)]
        output: Option<PathBuf>,
    },
    /// Show a fragment's metadata
    Info {
        id: String,
    },
    /// List the owner's fragments
    List {
        /// Show full metadata
        #[arg(short, long)]
        expand: bool,
    },
    /// Replace a fragment's data; the type must match the stored type
    Replace {
        id: String,
        #[arg(short = 't', long = "type")]
        media_type: String,
        #[arg(short, long, default_value = "-")]
        file: PathBuf,
    },
    /// Delete a fragment
    Delete {
        id: String,
    },
    /// Show the conversion targets for a media type
    Formats {
        media_type: String,
    },
    /// Create the metadata table if it does not exist
    Provision,
}

#[derive(Tabled)]
struct FragmentRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Type")]
    media_type: String,
    #[tabled(rename = "Size")]
    size: String,
    #[tabled(rename = "Created")]
    created: String,
    #[tabled(rename = "Updated")]
    updated: String,
}

impl From<&FragmentMetadata> for FragmentRow {
    fn from(metadata: &FragmentMetadata) -> Self {
        Self {
            id: metadata.id.clone(),
            media_type: metadata.media_type.clone(),
            size: format_size(metadata.size),
            created: format_timestamp(&metadata.created),
            updated: format_timestamp(&metadata.updated),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();

    let directive = if cli.verbose {
        "fragments=debug"
    } else {
        "fragments=info"
    };
    init_observability_with(cli.json_logs, directive)?;

    let result = run(&cli).await;
    if cli.metrics {
        eprintln!("{}", gather_metrics()?);
    }
    result
}

async fn run(cli: &Cli) -> Result<(), anyhow::Error> {
    if let Commands::Formats { media_type } = &cli.command {
        return show_formats(media_type);
    }

    let config = create_store_config(cli)?;
    if let Commands::Provision = cli.command {
        return provision(config).await;
    }

    let service = FragmentService::new(create_stores(&config).await?);
    let owner = cli.owner.as_str();

    match &cli.command {
        Commands::Create { media_type, file } => {
            let data = read_input(file)?;
            let fragment = service.create(owner, media_type, data).await?;
            println!("{}", serde_json::to_string_pretty(fragment.metadata())?);
        }
        Commands::Get { id, to, output } => {
            let data = match to {
                Some(target) => service.get_representation(owner, id, target).await?,
                None => service.get_by_path(owner, id).await?.data,
            };
            write_output(output.as_ref(), &data)?;
        }
        Commands::Info { id } => {
            let metadata = service.get_info(owner, id).await?;
            println!("{}", serde_json::to_string_pretty(&metadata)?);
        }
        Commands::List { expand } => list_fragments(&service, owner, *expand).await?,
        Commands::Replace {
            id,
            media_type,
            file,
        } => {
            let data = read_input(file)?;
            let fragment = service.replace_data(owner, id, media_type, data).await?;
            println!("{}", serde_json::to_string_pretty(fragment.metadata())?);
        }
        Commands::Delete { id } => {
            service.delete(owner, id).await?;
            println!("✓ Fragment {id} deleted");
        }
        Commands::Formats { .. } | Commands::Provision => {}
    }

    Ok(())
}

fn create_store_config(cli: &Cli) -> Result<StoreConfig, anyhow::Error> {
    let mut config = StoreConfig::from_env()?;

    if let Some(backend) = cli.backend {
        config.backend = match backend {
            BackendType::Memory => StoreBackend::Memory,
            BackendType::Aws => StoreBackend::Aws,
        };
    }
    if let Some(bucket) = &cli.bucket {
        config.s3_bucket = Some(bucket.clone());
    }
    if let Some(table) = &cli.table {
        config.dynamodb_table = Some(table.clone());
    }
    if let Some(region) = &cli.region {
        config.region = Some(region.clone());
    }
    if let Some(endpoint) = &cli.endpoint {
        config.endpoint_url = Some(endpoint.clone());
    }

    config.validate()?;
    Ok(config)
}

async fn provision(config: StoreConfig) -> Result<(), anyhow::Error> {
    if config.backend == StoreBackend::Memory {
        println!("Memory backend needs no provisioning");
        return Ok(());
    }

    let table = config.dynamodb_table.clone().unwrap_or_default();
    info!(table = %table, "Provisioning metadata table");
    create_stores(&config.with_provisioning(true)).await?;
    println!("✓ Table {table} is ready");
    Ok(())
}

async fn list_fragments(
    service: &FragmentService,
    owner: &str,
    expand: bool,
) -> Result<(), anyhow::Error> {
    match service.list_by_owner(owner, expand).await? {
        FragmentList::Ids(ids) if ids.is_empty() => println!("No fragments found"),
        FragmentList::Metadata(records) if records.is_empty() => println!("No fragments found"),
        FragmentList::Ids(ids) => {
            for id in ids {
                println!("{id}");
            }
        }
        FragmentList::Metadata(records) => {
            let rows: Vec<FragmentRow> = records.iter().map(FragmentRow::from).collect();
            println!("{}", Table::new(rows));
        }
    }
    Ok(())
}

fn show_formats(media_type: &str) -> Result<(), anyhow::Error> {
    let kind = MediaKind::parse(media_type)
        .with_context(|| format!("unsupported media type: {media_type}"))?;

    for target in convert::allowed_targets(kind) {
        let marker = if *target == kind { " (native)" } else { "" };
        println!("{}\t.{}{marker}", target.media_type(), target.extension());
    }
    Ok(())
}

fn write_output(output: Option<&PathBuf>, data: &[u8]) -> Result<(), anyhow::Error> {
    match output {
        Some(path) => std::fs::write(path, data)
            .with_context(|| format!("failed to write {}", path.display()))?,
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(data)?;
            stdout.flush()?;
        }
    }
    Ok(())
}

/// Read a whole file, or stdin for `-`
fn read_input(path: &Path) -> Result<Bytes, anyhow::Error> {
    if path.as_os_str() == "-" {
        let mut buffer = Vec::new();
        std::io::stdin()
            .read_to_end(&mut buffer)
            .context("failed to read stdin")?;
        return Ok(Bytes::from(buffer));
    }
    std::fs::read(path)
        .map(Bytes::from)
        .with_context(|| format!("failed to read {}", path.display()))
}

fn format_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.1} {}", size, UNITS[unit_index])
    }
}

fn format_timestamp(timestamp: &chrono::DateTime<chrono::Utc>) -> String {
    timestamp
        .with_timezone(&chrono::Local)
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}
