use clap::Parser;
use colored::*;
use drawing_search::cache::{CacheKey, CacheService};
use drawing_search::cli::{Cli, Commands};
use drawing_search::config::Config;
use drawing_search::error::{DrawingSearchError, Result as DrawingSearchResult};
use drawing_search::host::{HostResultSelector, SnapshotHost};
use drawing_search::metrics::Metrics;
use drawing_search::model::{DrawingObject, SharedObject};
use drawing_search::search::executors::ExecutorContext;
use drawing_search::search::observer::CachingObserver;
use drawing_search::search::service::DrawingSearchService;
use drawing_search::search::strategies::RegexCache;
use drawing_search::search::SearchOutcome;
use env_logger::{Builder, Env, Target};
use indicatif::{ProgressBar, ProgressStyle};
use log::info;
use std::fs;
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> DrawingSearchResult<()> {
    let cli = Cli::parse();
    setup_logging(&cli)?;
    info!("Application started with command: {:?}", cli.command);

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    let host = Arc::new(SnapshotHost::load(&cli.snapshot)?);
    if let Some(drawing) = &cli.drawing {
        host.set_active_drawing(Some(drawing.clone()));
    }
    let metrics = Arc::new(Metrics::new());
    let cache = Arc::new(
        CacheService::new(host.clone(), metrics.clone())
            .with_refresh_retries(config.cache.refresh_retries),
    );
    let drawing_id = cache.active_drawing_id()?;

    let pb = ProgressBar::new_spinner().with_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .map_err(|e| DrawingSearchError::Other(e.to_string()))?
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
    );
    let (observer, status) = CachingObserver::new();
    cache.subscribe_caching(Arc::new(observer));
    let spinner = pb.clone();
    std::thread::spawn(move || {
        for message in status.iter() {
            spinner.set_message(message);
        }
    });

    pb.enable_steady_tick(Duration::from_millis(100));
    let report = cache.on_drawing_loaded(&drawing_id)?;
    pb.finish_and_clear();
    if config.display.show_summary {
        println!(
            "{} {} {} {}",
            "Cached".green(),
            report.objects,
            "objects from drawing".green(),
            drawing_id.bold()
        );
        if report.links_skipped > 0 {
            println!(
                "{}",
                format!("{} part(s) without a resolvable assembly", report.links_skipped).yellow()
            );
        }
    }

    match &cli.command {
        Commands::Search {
            term,
            domain,
            wildcard,
            case_sensitive,
            show_all_parts,
            strategies,
            metrics: print_metrics,
        } => {
            let mut builder = config
                .search_builder()
                .with_query(term.as_str());
            if let Some(domain) = domain {
                builder = builder.with_domain(*domain);
            }
            if *wildcard {
                builder = builder.with_wildcard(true);
            }
            if *case_sensitive {
                builder = builder.with_case_sensitivity(true);
            }
            if *show_all_parts {
                builder = builder.show_all_assembly_parts(true);
            }
            for strategy in strategies {
                builder = builder.add_strategy(*strategy);
            }
            let search_config = builder.build();

            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(config.worker_threads())
                .build()
                .map_err(|e| DrawingSearchError::Other(e.to_string()))?;
            let context = ExecutorContext::new(
                cache.clone(),
                Arc::new(HostResultSelector::new(host.clone())),
            )
            .with_chunk_size(config.search.chunk_size)
            .with_thread_pool(Arc::new(pool))
            .with_regex_cache(Arc::new(RegexCache::new(config.cache.regex_cache_size)));
            let service = DrawingSearchService::new(context);

            match service.execute_search(search_config).await? {
                SearchOutcome::CacheBusy => {
                    println!("{}", SearchOutcome::CacheBusy.status_message().yellow());
                }
                SearchOutcome::Completed(result) => {
                    if result.match_count == 0 {
                        println!("{}", "No matches found".yellow());
                    } else {
                        println!(
                            "\n{} {} {}",
                            "Found".green(),
                            result.match_count,
                            "matches:".green()
                        );
                        let mut selected = host.selected();
                        selected.sort();
                        for id in selected {
                            if let Some(object) = cache.get_drawing_object(&drawing_id, id.as_str()) {
                                println!("{}", describe(&object));
                            }
                        }
                    }
                    if config.display.show_timing {
                        println!(
                            "{} {} ms ({})",
                            "Search took".dimmed(),
                            result.elapsed.as_millis(),
                            result.domain
                        );
                    }
                }
            }

            if *print_metrics {
                print!("{}", metrics.gather());
            }
        }
        Commands::Keys { relationships } => {
            let main_key = CacheKey::drawing(drawing_id.as_str());
            for key in cache.cache().dump_keys(Some(&main_key)) {
                println!("{key}");
            }
            if *relationships {
                for relationship in cache.cache().dump_relationships(Some(&main_key)) {
                    println!("{}", relationship.cyan());
                }
            }
        }
        Commands::Positions => {
            let positions = cache.assembly_positions(&drawing_id);
            if positions.is_empty() {
                println!("{}", "No assembly positions cached".yellow());
            }
            for position in positions {
                let count = cache.assembly_objects(&drawing_id, &position, true).len();
                println!("{} ({count})", position.green());
            }
        }
    }

    Ok(())
}

fn describe(object: &SharedObject) -> String {
    let content = match object.as_ref() {
        DrawingObject::Mark(mark) => mark.searchable_content().replace('\n', " "),
        DrawingObject::Text(text) => text.text.clone(),
        DrawingObject::Part(part) => format!("model {}", part.model_id),
        DrawingObject::Model(model) => model.id.to_string(),
        DrawingObject::Other { type_name, .. } => type_name.clone(),
    };
    format!(
        "{} {} {}",
        object.id().to_string().bold(),
        format!("[{}]", object.kind()).dimmed(),
        content
    )
}

fn setup_logging(cli: &Cli) -> DrawingSearchResult<()> {
    let default_level = if cli.verbose { "debug" } else { "warn" };
    let mut builder = Builder::from_env(Env::default().default_filter_or(default_level));

    builder.format(|buf, record| {
        use std::io::Write;
        writeln!(
            buf,
            "{} [{}] [{}] {}",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
            record.level(),
            record.module_path().unwrap_or("unknown"),
            record.args()
        )
    });

    if let Some(log_path) = &cli.log {
        if let Some(parent_dir) = log_path.parent() {
            if !parent_dir.as_os_str().is_empty() && !parent_dir.exists() {
                fs::create_dir_all(parent_dir)?;
            }
        }
        let log_file = fs::File::create(log_path)?;
        builder.target(Target::Pipe(Box::new(log_file)));
    } else {
        builder.target(Target::Stderr);
    }

    builder
        .try_init()
        .map_err(|e| DrawingSearchError::Other(e.to_string()))?;
    Ok(())
}
