use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tabula_api::{MemorySource, Settings};
use tabula_core::{ModelListConfig, RetrieveConfig};
use tabula_query::{ListQueryController, ViewMode};
use tabula_view::{DetailStatus, DetailView, ListBody, ListPhase, ListScreen, DetailScreen, ListView};
use tokio::signal;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "tabulactl", version, about = "Render Tabula list and detail views")]
struct Cli {
    /// Output format
    #[arg(short = 'o', long = "output", value_enum, global = true, default_value_t = Output::Human)]
    output: Output,

    /// JSON fixture keyed by list url: { "/api/tracks/": [ ... ] }
    #[arg(long = "data", global = true)]
    data: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum Output { Human, Json }

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum View { Cards, Table }

impl From<View> for ViewMode {
    fn from(v: View) -> Self {
        match v {
            View::Cards => ViewMode::Cards,
            View::Table => ViewMode::Table,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Render one page of a list view
    List {
        /// List view configuration (JSON or YAML)
        #[arg(long = "config")]
        config: PathBuf,
        /// List url; defaults to the config's api.listUrl
        #[arg(long = "resource")]
        resource: Option<String>,
        #[arg(long = "view", value_enum, default_value_t = View::Cards)]
        view: View,
        #[arg(long = "page", default_value_t = 1)]
        page: u32,
        /// Rows per page (table view only)
        #[arg(long = "page-size")]
        page_size: Option<u32>,
        /// Filter as key=value; repeatable. Values parse as JSON when possible.
        #[arg(long = "filter", action = ArgAction::Append)]
        filters: Vec<String>,
    },
    /// Render a single record
    Detail {
        /// Detail view configuration (JSON or YAML)
        #[arg(long = "config")]
        config: PathBuf,
        /// Record id
        id: String,
        /// Identity field of records in the fixture
        #[arg(long = "id-field", default_value = "pk")]
        id_field: String,
        /// Active chapter index
        #[arg(long = "chapter", default_value_t = 0)]
        chapter: usize,
    },
}

fn init_tracing() {
    let env = std::env::var("TABULA_LOG").unwrap_or_else(|_| "info".to_string());
    let filter = tracing_subscriber::EnvFilter::from_str(&env).unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).with_writer(std::io::stderr).init();
}

fn init_metrics() {
    if let Ok(addr) = std::env::var("TABULA_METRICS_ADDR") {
        if let Ok(sock) = addr.parse::<std::net::SocketAddr>() {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            match builder.with_http_listener(sock).install() {
                Ok(_) => tracing::info!(addr = %addr, "Prometheus metrics exporter listening"),
                Err(e) => tracing::warn!(error = %e, "failed to install metrics exporter"),
            }
        } else {
            tracing::warn!(addr = %addr, "invalid TABULA_METRICS_ADDR; expected host:port");
        }
    }
}

fn load<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let yaml = matches!(path.extension().and_then(|e| e.to_str()), Some("yaml" | "yml"));
    let parsed = if yaml {
        serde_yaml::from_str(&text).with_context(|| format!("parsing YAML {}", path.display()))?
    } else {
        serde_json::from_str(&text).with_context(|| format!("parsing JSON {}", path.display()))?
    };
    Ok(parsed)
}

fn load_source(data: Option<&Path>, id_field: &str, settings: &Settings) -> Result<MemorySource> {
    let Some(path) = data else { bail!("--data <fixture.json> is required") };
    let fixture: Value = load(path)?;
    MemorySource::from_fixture(fixture, id_field, settings.page_size).with_context(|| format!("fixture {}", path.display()))
}

fn parse_filter(raw: &str) -> Result<(String, Value)> {
    let (k, v) = raw.split_once('=').with_context(|| format!("filter {raw:?}: expected key=value"))?;
    let value = serde_json::from_str(v).unwrap_or_else(|_| Value::String(v.to_string()));
    Ok((k.trim().to_string(), value))
}

/// Query state for one `list` invocation, settled before the first fetch.
fn list_controller(resource: String, view: View, page: u32, page_size: Option<u32>, filters: &[String]) -> Result<ListQueryController> {
    let mut controller = ListQueryController::new(resource);
    controller.set_view_mode(view.into());
    for f in filters {
        let (k, v) = parse_filter(f)?;
        controller.update_param(k, v);
    }
    if !filters.is_empty() {
        controller.search();
    }
    controller.set_page_size(page_size);
    controller.set_page(page);
    Ok(controller)
}

/// Wait for pending fetches unless interrupted.
async fn until_settled<F: std::future::Future<Output = ()>>(fut: F) -> bool {
    tokio::select! {
        _ = fut => true,
        _ = signal::ctrl_c() => {
            warn!("interrupted");
            false
        }
    }
}

fn print_list(screen: &ListScreen) {
    println!("{}", screen.title);
    if let Some(d) = &screen.description {
        println!("{}", d);
    }
    match &screen.phase {
        ListPhase::Failed { title, message } => {
            println!("{title}: {message}");
            return;
        }
        ListPhase::Empty { message } => {
            println!("No results. {message}");
            return;
        }
        ListPhase::Loading { .. } => println!("Collecting data…"),
        ListPhase::Ready => {}
    }
    match &screen.body {
        Some(ListBody::Cards(cards)) => {
            for c in cards {
                let badges: Vec<String> = c.properties.iter().chain(c.sub_properties.iter()).map(|b| format!("{}: {}", b.label, b.value)).collect();
                println!("• {:<28} {}  → {}", c.title, badges.join(" | "), c.href);
                if let Some(d) = &c.description {
                    println!("    {}{}", d.preview, if d.truncated { " …" } else { "" });
                }
            }
        }
        Some(ListBody::Table(t)) => {
            let header: Vec<String> = t.headers.iter().map(|h| format!("{:<20}", h.label)).collect();
            println!("{}", header.join(" "));
            for r in &t.rows {
                let cells: Vec<String> = r.cells.iter().map(|c| format!("{:<20}", c)).collect();
                println!("{}", cells.join(" "));
            }
        }
        None => {}
    }
    println!("page {} of {}", screen.page, screen.page_count);
}

fn print_detail(screen: &DetailScreen) {
    println!("{}", screen.title);
    for img in &screen.gallery {
        println!("  [image] {} {}", img.name.as_deref().unwrap_or("-"), img.src.as_deref().unwrap_or("-"));
    }
    for p in &screen.properties {
        println!("{:<20} {}", p.label, p.value);
    }
    let tabs: Vec<String> = screen.chapters.iter().map(|c| if c.active { format!("[{}]", c.title) } else { c.title.clone() }).collect();
    if !tabs.is_empty() {
        println!("{}", tabs.join("  "));
        for p in &screen.chapter_rows {
            println!("  {:<18} {}", p.label, p.value);
        }
    }
    if let Some(edit) = &screen.edit_href {
        println!("edit: {}", edit);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    init_metrics();
    let cli = Cli::parse();
    let settings = Settings::from_env();

    match cli.command {
        Commands::List { config, resource, view, page, page_size, filters } => {
            let cfg: ModelListConfig = load(&config)?;
            let resource = resource
                .or_else(|| cfg.api.as_ref().map(|a| a.list_url.clone()))
                .context("no list url: pass --resource or set api.listUrl")?;
            let source = load_source(cli.data.as_deref(), &cfg.base_model_data.id, &settings)?;
            info!(resource = %resource, filters = filters.len(), "list invoked");

            let controller = list_controller(resource, view, page, page_size, &filters)?;
            let mut lv = ListView::with_controller(Arc::new(cfg), controller, Arc::new(source), &settings);
            if !until_settled(lv.settle()).await {
                return Ok(());
            }
            let screen = lv.screen();
            match cli.output {
                Output::Human => print_list(&screen),
                Output::Json => println!("{}", serde_json::to_string_pretty(&screen)?),
            }
            if let ListPhase::Failed { message, .. } = &screen.phase {
                bail!("list failed: {message}");
            }
        }
        Commands::Detail { config, id, id_field, chapter } => {
            let cfg: RetrieveConfig = load(&config)?;
            let source = load_source(cli.data.as_deref(), &id_field, &settings)?;
            info!(id = %id, "detail invoked");

            let mut dv = DetailView::new(Arc::new(cfg), Arc::new(source));
            dv.open(id);
            if !until_settled(dv.settle()).await {
                return Ok(());
            }
            if let DetailStatus::Failed { error } = dv.status() {
                bail!("detail failed: {error}");
            }
            if let Some(r) = dv.renderer_mut() {
                r.select_chapter(chapter);
            }
            let screen = dv.screen().context("record not loaded")?;
            match cli.output {
                Output::Human => print_detail(&screen),
                Output::Json => println!("{}", serde_json::to_string_pretty(&screen)?),
            }
        }
    }
    Ok(())
}
