use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use dotenvy::dotenv;
use tokio::time::interval;
use tracing::{info, warn};

use jh_common::config::{ConfigError, CrawlConfig};
use jh_common::db::{
    create_pool_from_url, run_migrations, DbPoolError, MigrationError, PgJobStore, PgMatchStore,
    PgPreferenceStore,
};
use jh_common::logging;
use jh_common::pipeline::{Pipeline, PipelineError};
use jh_common::source::{FeedAdapter, FeedAdapterConfig, SourceAdapter, SourceError};
use jh_common::store::{
    JobStore, MatchStore, MemoryJobStore, MemoryMatchStore, MemoryPreferenceStore, PreferenceStore,
};

#[derive(Debug, Parser)]
#[command(
    name = "jh-pipeline",
    about = "Crawl job boards, deduplicate listings and rank matches per user"
)]
struct Cli {
    /// PostgreSQL connection string. 未指定ならインメモリストアで動かす
    #[arg(long, env = "DATABASE_URL")]
    db_url: Option<String>,

    /// JSON 設定ファイルのパス
    #[arg(long, env = "JH_CONFIG")]
    config: Option<PathBuf>,

    /// 実行間隔（秒）。0 なら 1 回実行して終了
    #[arg(long, env = "JH_RUN_INTERVAL_SECONDS", default_value_t = 0)]
    run_interval: u64,

    /// グローバルキーワードを上書きする
    #[arg(long)]
    keywords: Vec<String>,

    /// グローバル勤務地を上書きする
    #[arg(long)]
    location: Option<String>,

    /// ソースあたりの最大ページ数を上書きする
    #[arg(long)]
    max_pages: Option<u32>,

    /// 指定したソースのみ実行する
    #[arg(long)]
    only: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
enum RunnerError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("database pool error: {0}")]
    DbPool(#[from] DbPoolError),
    #[error("migration error: {0}")]
    Migration(#[from] MigrationError),
    #[error("adapter setup error: {0}")]
    Source(#[from] SourceError),
    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),
}

fn load_config(cli: &Cli) -> Result<CrawlConfig, RunnerError> {
    let mut config = match &cli.config {
        Some(path) => CrawlConfig::from_json_file(path)?,
        None => CrawlConfig::default(),
    };
    apply_cli_overrides(cli, &mut config);
    Ok(config)
}

fn apply_cli_overrides(cli: &Cli, config: &mut CrawlConfig) {
    if !cli.keywords.is_empty() {
        config.global.keywords = cli.keywords.clone();
    }
    if let Some(location) = &cli.location {
        config.global.location = Some(location.clone());
    }
    if let Some(max_pages) = cli.max_pages {
        config.global.max_pages = max_pages;
    }
    if !cli.only.is_empty() {
        for (name, source) in config.sources.iter_mut() {
            source.enabled = cli.only.iter().any(|only| only == name);
        }
    }
}

fn build_adapters(config: &CrawlConfig) -> Result<Vec<Arc<dyn SourceAdapter>>, RunnerError> {
    let mut adapters: Vec<Arc<dyn SourceAdapter>> = Vec::new();

    for (name, source) in &config.sources {
        if !source.enabled {
            continue;
        }
        match &source.endpoint {
            Some(endpoint) => {
                let adapter = FeedAdapter::new(FeedAdapterConfig {
                    name: name.clone(),
                    endpoint: endpoint.clone(),
                    delay: config.global.delay,
                    time_budget: Some(Duration::from_secs(config.global.adapter_timeout_secs)),
                })?;
                adapters.push(Arc::new(adapter));
            }
            None => warn!(
                source = %name,
                "no feed endpoint configured, skipping (HTML adapters plug in externally)"
            ),
        }
    }

    Ok(adapters)
}

async fn run() -> Result<(), RunnerError> {
    dotenv().ok();
    logging::init("jh-pipeline");

    let cli = Cli::parse();
    let config = load_config(&cli)?;
    let adapters = build_adapters(&config)?;
    if adapters.is_empty() {
        warn!("no source adapters configured, only matching will run");
    }

    let (jobs, preferences, matches): (
        Arc<dyn JobStore>,
        Arc<dyn PreferenceStore>,
        Arc<dyn MatchStore>,
    ) = match &cli.db_url {
        Some(db_url) => {
            let pool = create_pool_from_url(db_url)?;
            run_migrations(&pool).await?;
            (
                Arc::new(PgJobStore::new(pool.clone())),
                Arc::new(PgPreferenceStore::new(pool.clone())),
                Arc::new(PgMatchStore::new(pool)),
            )
        }
        None => {
            info!("DATABASE_URL not set, using in-memory stores");
            (
                Arc::new(MemoryJobStore::new()),
                Arc::new(MemoryPreferenceStore::new(Vec::new())),
                Arc::new(MemoryMatchStore::new()),
            )
        }
    };

    let pipeline = Pipeline::new(adapters, jobs, preferences, matches, config);

    if cli.run_interval == 0 {
        let report = pipeline.run().await?;
        info!(
            run_id = %report.run_id,
            inserted = report.inserted,
            merged = report.merged,
            dropped = report.dropped_unparseable,
            failed_sources = report.failed_sources(),
            matches_written = report.matches_written,
            "single run complete"
        );
        return Ok(());
    }

    info!(run_interval = cli.run_interval, "starting interval runner");
    let mut ticker = interval(Duration::from_secs(cli.run_interval));

    loop {
        ticker.tick().await;

        match pipeline.run().await {
            Ok(report) => info!(
                run_id = %report.run_id,
                inserted = report.inserted,
                merged = report.merged,
                matches_written = report.matches_written,
                "run complete"
            ),
            Err(err) => warn!(error = %err, "run failed"),
        }
    }
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("jh-pipeline failed: {err}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_overrides_replace_global_settings() {
        let cli = Cli::parse_from([
            "jh-pipeline",
            "--keywords",
            "エンジニア",
            "--location",
            "大阪",
            "--max-pages",
            "5",
        ]);

        let config = load_config(&cli).unwrap();
        assert_eq!(config.global.keywords, vec!["エンジニア".to_string()]);
        assert_eq!(config.global.location.as_deref(), Some("大阪"));
        assert_eq!(config.global.max_pages, 5);
    }

    #[test]
    fn only_flag_disables_other_sources() {
        let cli = Cli::parse_from(["jh-pipeline", "--only", "doda"]);
        let mut config = CrawlConfig::default();
        config.sources.insert("doda".into(), Default::default());
        config.sources.insert("green".into(), Default::default());

        apply_cli_overrides(&cli, &mut config);

        assert!(config.sources["doda"].enabled);
        assert!(!config.sources["green"].enabled);
    }

    #[test]
    fn sources_without_endpoints_produce_no_adapters() {
        let mut config = CrawlConfig::default();
        config.sources.insert("doda".into(), Default::default());

        let adapters = build_adapters(&config).unwrap();
        assert!(adapters.is_empty());
    }
}
