//! AgriAid CLI
//!
//! Command-line front end for:
//! - Interactive farming conversations (`chat`, the default)
//! - One-shot questions (`ask`)
//! - Inspecting the context block a message would produce (`context`, `classify`)
//! - Calling a single upstream provider and dumping its payload (`probe`)

use anyhow::{anyhow, Context as _, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use std::io::{self, Write};
use tracing_subscriber::EnvFilter;

use agriaid_chat::{BackendConfig, ConversationSession, Dispatch, OllamaBackend};
use agriaid_context::{classify, crop_hint, prepare_context, ProviderRegistry};
use agriaid_providers::http::http_timeout;
use agriaid_providers::{Coordinates, Crop, FetchRequest, Location, ProviderSettings, Region};

mod probe;
mod repl;

#[derive(Parser)]
#[command(name = "agriaid")]
#[command(author, version, about = "AgriAid: farming assistant for Philippine farmers")]
struct Cli {
    /// Raise log verbosity (-v info, -vv debug). `RUST_LOG` wins when set.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Provider HTTP timeout in seconds (0 disables).
    #[arg(long, global = true)]
    http_timeout_secs: Option<u64>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive conversation (default when no command is given).
    Chat {
        #[command(flatten)]
        location: LocationArgs,
        #[command(flatten)]
        backend: BackendArgs,
        /// Wait for the whole reply instead of printing it as it arrives.
        #[arg(long)]
        no_stream: bool,
    },

    /// Ask one question and print the reply.
    Ask {
        /// The question.
        text: Vec<String>,
        #[command(flatten)]
        location: LocationArgs,
        #[command(flatten)]
        backend: BackendArgs,
        /// Also print which providers answered.
        #[arg(long)]
        report: bool,
    },

    /// Classify, gather and print the context block a message would get.
    Context {
        text: Vec<String>,
        #[command(flatten)]
        location: LocationArgs,
        /// Crop hint (defaults to one detected in the text).
        #[arg(long)]
        crop: Option<Crop>,
    },

    /// Print the topic tags detected in a message.
    Classify { text: Vec<String> },

    /// Run one provider and print its payload as JSON.
    ///
    /// TARGET is a context source (pagasa-forecast, regional-weather,
    /// typhoon-alert, detailed-weather, soil, pest-database,
    /// pest-observations, crop-calendar, market-prices, advisories, news)
    /// or one of: openweather-current, openweather-forecast, soilgrids,
    /// taxon, farm-feeds, ndvi, create-polygon.
    Probe {
        target: String,
        /// City for OpenWeatherMap, taxon name for `taxon`, polygon id for
        /// `ndvi`, field name for `create-polygon`.
        #[arg(long)]
        name: Option<String>,
        /// Field corner for `create-polygon`; repeat at least three times.
        #[arg(long = "corner", value_name = "LAT,LON", allow_hyphen_values = true)]
        corners: Vec<Coordinates>,
        #[command(flatten)]
        location: LocationArgs,
        #[arg(long)]
        crop: Option<Crop>,
    },
}

#[derive(Args, Clone, Default)]
struct LocationArgs {
    /// City or municipality name.
    #[arg(long)]
    location: Option<String>,
    /// Region code or name (NCR, CAR, I .. XIII, IV-A, IV-B, BARMM).
    #[arg(long)]
    region: Option<Region>,
    #[arg(long, requires = "lon", allow_hyphen_values = true)]
    lat: Option<f64>,
    #[arg(long, requires = "lat", allow_hyphen_values = true)]
    lon: Option<f64>,
}

impl LocationArgs {
    fn is_given(&self) -> bool {
        self.location.is_some() || self.region.is_some() || self.lat.is_some()
    }

    fn resolve(&self) -> Location {
        let mut location = Location::named(self.location.as_deref().unwrap_or("Manila"));
        if let (Some(lat), Some(lon)) = (self.lat, self.lon) {
            location = location.with_coordinates(Coordinates::new(lat, lon));
        }
        if let Some(region) = self.region {
            location = location.with_region(region);
        }
        location
    }
}

#[derive(Args, Clone, Default)]
struct BackendArgs {
    /// Ollama host (overrides `OLLAMA_HOST`).
    #[arg(long)]
    ollama_host: Option<String>,
    /// Model name (overrides `OLLAMA_MODEL`).
    #[arg(long)]
    model: Option<String>,
    /// Generation timeout in seconds, 0 disables (overrides `AGRIAID_LLM_TIMEOUT_SECS`).
    #[arg(long)]
    timeout_secs: Option<u64>,
}

impl BackendArgs {
    fn backend(&self) -> Result<OllamaBackend> {
        let config = BackendConfig::from_env(
            self.ollama_host.as_deref(),
            self.model.as_deref(),
            self.timeout_secs,
        )?;
        Ok(OllamaBackend::new(config)?)
    }
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

/// Provider settings from the environment, with the `--http-timeout-secs` flag on top.
fn provider_settings(http_timeout_secs: Option<u64>) -> Result<ProviderSettings> {
    let mut settings = ProviderSettings::from_env()?;
    if http_timeout_secs.is_some() {
        settings.timeout = http_timeout(http_timeout_secs)?;
    }
    Ok(settings)
}

fn registry(http_timeout_secs: Option<u64>) -> Result<ProviderRegistry> {
    let settings = provider_settings(http_timeout_secs)?;
    ProviderRegistry::standard(&settings).context("failed to set up context providers")
}

fn joined(words: &[String]) -> Result<String> {
    let text = words.join(" ");
    if text.trim().is_empty() {
        return Err(anyhow!("expected some text"));
    }
    Ok(text)
}

fn cmd_ask(
    text: &str,
    location: &LocationArgs,
    backend: &BackendArgs,
    report: bool,
    http_timeout_secs: Option<u64>,
) -> Result<()> {
    let mut session = ConversationSession::new(
        Box::new(backend.backend()?),
        registry(http_timeout_secs)?,
    );
    let reply = session.chat(text, &location.resolve(), Dispatch::SingleShot)?;
    println!("{}", reply.text);

    if report {
        eprintln!("{} {}", "topics:".cyan().bold(), reply.topics);
        for (source, outcome) in reply.report.iter() {
            eprintln!("  {:<18} {outcome}", source.key());
        }
    }
    Ok(())
}

fn cmd_context(
    text: &str,
    location: &LocationArgs,
    crop: Option<Crop>,
    http_timeout_secs: Option<u64>,
) -> Result<()> {
    let registry = registry(http_timeout_secs)?;
    let crop = crop.or_else(|| crop_hint(None, text));
    let request = FetchRequest::for_location(&location.resolve()).with_crop(crop);
    let prepared = prepare_context(&registry, text, &request);

    println!("{}", prepared.text);
    eprintln!("{} {}", "topics:".cyan().bold(), prepared.topics);
    for (source, outcome) in prepared.report.iter() {
        eprintln!("  {:<18} {outcome}", source.key());
    }
    Ok(())
}

fn main() -> Result<()> {
    // A missing .env is fine; the environment may already be set.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_logging(cli.verbose);

    let command = cli.command.unwrap_or(Commands::Chat {
        location: LocationArgs::default(),
        backend: BackendArgs::default(),
        no_stream: false,
    });

    match command {
        Commands::Chat {
            location,
            backend,
            no_stream,
        } => {
            let session =
                ConversationSession::new(Box::new(backend.backend()?), registry(cli.http_timeout_secs)?);
            let given = location.is_given().then(|| location.resolve());
            repl::run(session, given, !no_stream)?;
        }
        Commands::Ask {
            text,
            location,
            backend,
            report,
        } => cmd_ask(&joined(&text)?, &location, &backend, report, cli.http_timeout_secs)?,
        Commands::Context {
            text,
            location,
            crop,
        } => cmd_context(&joined(&text)?, &location, crop, cli.http_timeout_secs)?,
        Commands::Classify { text } => {
            println!("{}", classify(&joined(&text)?));
        }
        Commands::Probe {
            target,
            name,
            corners,
            location,
            crop,
        } => {
            let value = probe::run(
                &target,
                name.as_deref(),
                &corners,
                &location.resolve(),
                crop,
                cli.http_timeout_secs,
            )?;
            let out = serde_json::to_string_pretty(&value)?;
            let mut stdout = io::stdout().lock();
            writeln!(stdout, "{out}")?;
        }
    }

    Ok(())
}
