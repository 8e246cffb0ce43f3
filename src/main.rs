//! TidyMind search: interactive search over your notes
//!
//! Each line read from stdin is treated as the current contents of the
//! search box. Results are printed whenever they change.

use anyhow::{bail, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tidymind_search::{
    autocomplete::TitleSuggestions,
    config,
    embedding::{EmbeddingService, LifecycleState},
    network::BackendClient,
    results::{highlight::Segment, model_banner, GroupStatus, ResultGroups, SourceKind},
    sources::{RpcLexicalSource, RpcSemanticSource},
    Search, SearchFilters,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let Some(config_path) = parse_args()? else {
        return Ok(());
    };

    let settings = config::load(config_path.as_deref())?;

    // Results go to stdout, logs to stderr
    let default_level = if settings.general.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    info!("Starting TidyMind search v{}", tidymind_search::VERSION);
    info!("Loaded configuration for instance: {}", settings.general.instance_name);

    let client = BackendClient::with_settings(&settings.backend)?;
    info!("Backend client initialized for {}", settings.backend.url);

    let embedder = Arc::new(EmbeddingService::from_settings(&settings.embedding));
    let search = Search::new(
        Arc::new(RpcLexicalSource::new(
            client.clone(),
            settings.search.page_size as usize,
        )),
        Arc::new(RpcSemanticSource::new(client.clone())),
        embedder.clone(),
        &settings,
    );
    let suggestions = TitleSuggestions::new(client);

    let _results = search.on_results_changed(print_groups);
    let status_task = {
        let mut status = embedder.subscribe();
        tokio::spawn(async move {
            let mut last = LifecycleState::Idle;
            while status.changed().await.is_ok() {
                let current = *status.borrow_and_update();
                if current.state != last || current.state == LifecycleState::Loading {
                    if let Some(banner) = model_banner(&current) {
                        eprintln!("{}", banner);
                    }
                    last = current.state;
                }
            }
        })
    };

    println!(
        "{} search v{}. Type to search, :help for commands.",
        settings.general.instance_name,
        tidymind_search::VERSION
    );

    let mut filters = SearchFilters::new();
    let mut text = String::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim_end();

        if let Some(fragment) = line.strip_prefix("[[") {
            match suggestions.suggest(fragment).await {
                Ok(found) if found.is_empty() => println!("  (no matching notes)"),
                Ok(found) => {
                    for note in found {
                        println!("  [[{}]]  {}", note.title, note.folder_name);
                    }
                }
                Err(e) => println!("  suggestions failed: {}", e),
            }
            continue;
        }

        let mut parts = line.splitn(2, ' ');
        match parts.next().unwrap_or_default() {
            ":quit" | ":q" => break,
            ":help" => print_commands(),
            ":folder" => {
                filters.folder_id = parts
                    .next()
                    .map(str::trim)
                    .filter(|id| !id.is_empty())
                    .map(String::from);
                search.dispatch_query(&text, filters.clone());
            }
            ":tags" => {
                filters = filters.with_tags(SearchFilters::parse_tags(parts.next().unwrap_or("")));
                search.dispatch_query(&text, filters.clone());
            }
            ":clear" => {
                filters = SearchFilters::new();
                text.clear();
                search.dispatch_query(&text, filters.clone());
            }
            ":stats" => print_stats(&search),
            _ => {
                text = line.to_string();
                search.dispatch_query(&text, filters.clone());
            }
        }
    }

    search.shutdown();
    embedder.shutdown();
    status_task.abort();
    info!("Bye");

    Ok(())
}

/// Returns `None` when the process should exit without searching
fn parse_args() -> Result<Option<Option<PathBuf>>> {
    let mut config_path = None;
    let mut args = std::env::args().skip(1);

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-c" | "--config" => match args.next() {
                Some(path) => config_path = Some(PathBuf::from(path)),
                None => bail!("{} requires a file argument", arg),
            },
            "-h" | "--help" => {
                print_usage();
                return Ok(None);
            }
            "-V" | "--version" => {
                println!("tidymind-search {}", tidymind_search::VERSION);
                return Ok(None);
            }
            other => bail!("Unknown argument: {}", other),
        }
    }

    Ok(Some(config_path))
}

fn print_groups(groups: &ResultGroups) {
    if groups.query.is_empty() {
        return;
    }
    println!();
    println!("== \"{}\" ==", groups.query);

    if groups.is_empty() {
        println!("No notes found.");
        return;
    }

    let lexical = &groups.lexical;
    println!("{} ({})", lexical.kind.label(), lexical.len());
    match &lexical.status {
        GroupStatus::Loading => println!("  searching..."),
        GroupStatus::Failed(e) => println!("  {} search failed: {}", SourceKind::Lexical, e),
        _ => {
            for hit in &lexical.hits {
                println!("  - {}", render(&hit.display_title()));
                let snippet = hit.display_snippet();
                if !snippet.is_empty() {
                    println!("      {}", render(&snippet));
                }
            }
        }
    }

    let semantic = &groups.semantic;
    match &semantic.status {
        GroupStatus::Idle => {}
        GroupStatus::Loading => println!("{}\n  searching...", semantic.kind.label()),
        GroupStatus::Unavailable => {
            println!("{}\n  semantic search unavailable", semantic.kind.label())
        }
        GroupStatus::Failed(e) => {
            println!("{}\n  semantic search unavailable: {}", semantic.kind.label(), e)
        }
        GroupStatus::Ready => {
            println!("{} ({})", semantic.kind.label(), semantic.len());
            for hit in &semantic.hits {
                println!("  - {} ({}% match)", hit.title, hit.percent());
            }
        }
    }
}

fn render(segments: &[Segment]) -> String {
    segments
        .iter()
        .map(|s| {
            if s.emphasized {
                format!("*{}*", s.text)
            } else {
                s.text.clone()
            }
        })
        .collect()
}

fn print_stats(search: &Search) {
    let metrics = search.metrics();
    println!("Searches: {}", metrics.get_total_searches());
    for source in [SourceKind::Lexical, SourceKind::Semantic] {
        let stats = metrics.get_source_stats(source);
        println!(
            "  {}: {} calls, {} cache hits, {} stale, {:.0}% reliable, avg {}",
            source,
            stats.dispatched,
            stats.cache_hits,
            stats.stale_discarded,
            stats.reliability,
            stats
                .avg_response_time
                .map(|ms| format!("{}ms", ms))
                .unwrap_or_else(|| "-".to_string())
        );
    }
}

fn print_commands() {
    println!(
        r#"  <text>          search for text
  :folder [ID]    restrict to a folder (no ID clears)
  :tags a,b       require tags (empty clears)
  :clear          clear query and filters
  [[fragment      suggest note titles
  :stats          show source statistics
  :quit           exit"#
    );
}

/// Print usage information
fn print_usage() {
    println!(
        r#"
TidyMind search v{}
Keyword and semantic search over your notes

USAGE:
    tidymind-search [OPTIONS]

OPTIONS:
    -c, --config <FILE>    Path to configuration file
    -h, --help             Print help information
    -V, --version          Print version information

ENVIRONMENT VARIABLES:
    TIDYMIND_SETTINGS_PATH       Path to settings.yml
    TIDYMIND_DEBUG               Enable debug mode (true/false)
    TIDYMIND_BACKEND_URL         Hosted backend base URL
    TIDYMIND_API_KEY             Backend API key
    TIDYMIND_EMBEDDING_BACKEND   fastembed or hash
    TIDYMIND_MODEL_CACHE_DIR     Where embedding models are stored
    RUST_LOG                     Log filter (default: info, debug with TIDYMIND_DEBUG)
"#,
        tidymind_search::VERSION
    );
}
