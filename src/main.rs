//! multisearch CLI - multi-source web search from the command line.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use multisearch::{
    engines, HttpFetcher, PageFetcher, Preference, Record, SearchConfig, SearchOptions,
    SearchResponse, SearchService, ServiceConfig, WeightedPreset,
};

/// multisearch - aggregate results from several search engines
#[derive(Parser)]
#[command(name = "multisearch")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Rotate requests through the proxy list [env: ENABLE_PROXY]
    #[arg(long, global = true)]
    enable_proxy: bool,

    /// Proxy list file, one proxy URL per line [env: PROXY_FILE]
    #[arg(long, global = true)]
    proxy_file: Option<PathBuf>,

    /// Page fetch timeout in seconds [env: FETCH_TIMEOUT_SECS]
    #[arg(short, long, global = true)]
    timeout: Option<u64>,

    /// OpenAI-compatible embeddings base URL, local hashing when unset [env: EMBED_URL]
    #[arg(long, global = true)]
    embed_url: Option<String>,

    /// Embedding model name [env: EMBED_MODEL]
    #[arg(long, global = true)]
    embed_model: Option<String>,

    /// Embeddings API key [env: EMBED_API_KEY]
    #[arg(long, global = true)]
    embed_api_key: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Search through a preset or an explicit engine list
    Search(SearchArgs),

    /// Fetch one page and print its main text
    Fetch(FetchArgs),

    /// List presets and built-in engines
    Engines,
}

#[derive(Parser)]
struct SearchArgs {
    /// Search query
    query: String,

    /// Preset name
    #[arg(short, long, default_value = "default")]
    preset: String,

    /// balance, latest or more_results
    #[arg(long, default_value = "balance", value_parser = parse_preference)]
    preference: Preference,

    /// Search engines to use instead of the preset (comma-separated)
    #[arg(short, long, value_delimiter = ',')]
    engines: Option<Vec<String>>,

    /// Restrict results to one site
    #[arg(long)]
    site: Option<String>,

    /// Maximum number of results to display
    #[arg(short, long)]
    limit: Option<usize>,

    /// Output format
    #[arg(short, long, default_value = "text")]
    format: OutputFormat,
}

#[derive(Parser)]
struct FetchArgs {
    /// Page URL
    url: String,

    /// Output format
    #[arg(short, long, default_value = "text")]
    format: OutputFormat,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output
    Json,
    /// Compact single-line output
    Compact,
}

fn parse_preference(value: &str) -> std::result::Result<Preference, String> {
    value.parse().map_err(|e: multisearch::SearchError| e.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "multisearch=debug"
    } else {
        "multisearch=warn"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = apply_cli(&cli, ServiceConfig::from_env());
    let service = config.build()?;

    match cli.command {
        Commands::Search(args) => run_search(&service, &config, args).await,
        Commands::Fetch(args) => run_fetch(&service, args).await,
        Commands::Engines => list_engines(&service),
    }
}

/// Layers command-line flags over the environment-derived config.
fn apply_cli(cli: &Cli, mut config: ServiceConfig) -> ServiceConfig {
    if cli.enable_proxy {
        config.enable_proxy = true;
    }
    if let Some(path) = &cli.proxy_file {
        config.proxy_file = path.clone();
    }
    if let Some(secs) = cli.timeout {
        config.fetch_timeout_secs = secs;
    }
    if let Some(url) = cli.embed_url.clone().filter(|s| !s.is_empty()) {
        config.embed_url = Some(url);
    }
    if let Some(model) = cli.embed_model.clone().filter(|s| !s.is_empty()) {
        config.embed_model = model;
    }
    if let Some(key) = cli.embed_api_key.clone().filter(|s| !s.is_empty()) {
        config.embed_api_key = Some(key);
    }
    config
}

fn list_engines(service: &SearchService) -> Result<()> {
    println!("Presets:\n");
    for (name, description) in service.list_available_engines() {
        println!("    {:<12} - {}", name, description);
    }
    println!();
    println!("Engines:\n");
    for engine in engines::all() {
        let descriptor = engine.descriptor();
        println!(
            "    {:<12} - {}",
            descriptor.name,
            descriptor.description.unwrap_or("")
        );
    }
    println!();
    println!("Usage: multisearch search \"query\" -e duckduckgo,bing");
    Ok(())
}

async fn run_search(service: &SearchService, config: &ServiceConfig, args: SearchArgs) -> Result<()> {
    let mut options = SearchOptions::default();
    if let Some(site) = &args.site {
        options = options.with_site(site.as_str());
    }

    let response = match &args.engines {
        Some(names) => {
            let mut selected = Vec::new();
            for name in names {
                match engines::by_name(name.trim()) {
                    Some(engine) if engine.descriptor().base_url.is_some() => selected.push(engine),
                    _ => eprintln!("Warning: Unknown search engine '{}', skipping", name),
                }
            }
            if selected.is_empty() {
                anyhow::bail!("No valid engines specified");
            }

            let fetcher: Arc<dyn PageFetcher> = Arc::new(HttpFetcher::with_options(
                &config.user_agent,
                config.fetch_timeout(),
            )?);
            let preset = WeightedPreset::uniform(
                "command-line",
                "Engines named on the command line.",
                selected,
                fetcher,
            );
            service
                .search_with(&preset, args.preference, &args.query, options)
                .await?
        }
        None => {
            let request = SearchConfig::new(args.query.as_str())
                .with_preset(args.preset.as_str())
                .with_preference(args.preference)
                .with_extra_params(serde_json::to_value(&options)?);
            service.search(request).await?
        }
    };

    let limit = args.limit.unwrap_or(response.records.len());
    print_response(&response, limit, args.format)
}

async fn run_fetch(service: &SearchService, args: FetchArgs) -> Result<()> {
    let response = service.fetch(&args.url).await?;
    match args.format {
        OutputFormat::Text => {
            println!("{}\n", response.title);
            for record in &response.records {
                println!("{}", record.get("content").unwrap_or_default());
            }
            Ok(())
        }
        format => print_response(&response, response.records.len(), format),
    }
}

/// First descriptive field of a record.
fn snippet(record: &Record) -> Option<&str> {
    ["abstract", "description", "content", "snippet", "tweet_content"]
        .iter()
        .find_map(|field| record.get(field))
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        format!("{}...", text.chars().take(max_chars).collect::<String>())
    } else {
        text.to_string()
    }
}

fn print_response(response: &SearchResponse, limit: usize, format: OutputFormat) -> Result<()> {
    let records = response.records.iter().take(limit);
    match format {
        OutputFormat::Text => {
            println!(
                "\nResults for \"{}\" ({} records):\n",
                response.title,
                response.records.len()
            );
            for (i, record) in records.enumerate() {
                println!("{}. {}", i + 1, record.get("title").unwrap_or("(untitled)"));
                if let Some(url) = record.url() {
                    println!("   URL: {}", url);
                }
                if let Some(text) = snippet(record) {
                    println!("   {}", truncate(text, 150));
                }
                println!();
            }
        }
        OutputFormat::Json => {
            let output = SearchResponse {
                title: response.title.clone(),
                records: records.cloned().collect(),
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Compact => {
            for record in records {
                println!(
                    "{}\t{}",
                    record.get("title").unwrap_or_default(),
                    record.url().unwrap_or_default()
                );
            }
        }
    }
    Ok(())
}
