//! caching-demo CLI — run lookups and load tests against the simulated backend.

use caching_demo::Error;
use caching_demo::config::{Config, EngineConfig};
use caching_demo::engine::QueryEngine;
use caching_demo::service::ContentService;
use caching_demo::telemetry::{TelemetryConfig, init_telemetry};
use clap::{Parser, Subcommand};
use futures::future::join_all;
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Parser)]
#[command(name = "caching-demo", about = "Request caching over a simulated slow backend")]
struct Cli {
    /// TOML file with engine settings (overrides ENGINE_* variables)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch one piece of content
    Query {
        /// Content id
        id: i64,
        /// Body size in characters
        #[arg(long, default_value_t = 10)]
        size: i32,
        /// Nominal query duration in milliseconds
        #[arg(long, default_value_t = 1000)]
        duration: i64,
        /// Number of times to repeat the lookup (repeats hit the cache)
        #[arg(long, default_value_t = 1)]
        repeat: u32,
    },
    /// Fire many concurrent lookups and report how many finished in time
    Load {
        /// Number of concurrent calls per round
        #[arg(long, default_value_t = 100)]
        calls: u32,
        /// Nominal query duration in milliseconds
        #[arg(long, default_value_t = 2000)]
        duration: i64,
        /// Body size in characters
        #[arg(long, default_value_t = 5)]
        size: i32,
        /// Client-side deadline per call in milliseconds
        #[arg(long, default_value_t = 10_000)]
        client_timeout: u64,
        /// Number of rounds; later rounds are served from the cache
        #[arg(long, default_value_t = 1)]
        rounds: u32,
        /// Evict every id between rounds
        #[arg(long)]
        evict: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let mut config = Config::from_env()?;
    if let Some(path) = &cli.config {
        config.engine = EngineConfig::load(path)?;
    }

    let guard = init_telemetry(TelemetryConfig {
        endpoint: config.otel_endpoint.clone(),
        service_name: "caching-demo".to_string(),
        log_level: config.log_level.clone(),
    })?;

    let service = ContentService::new(QueryEngine::new(config.engine.clone())?);

    let outcome = match cli.command {
        Command::Query {
            id,
            size,
            duration,
            repeat,
        } => cmd_query(&service, id, size, duration, repeat).await,
        Command::Load {
            calls,
            duration,
            size,
            client_timeout,
            rounds,
            evict,
        } => {
            let plan = LoadPlan {
                calls,
                duration,
                size,
                client_timeout: Duration::from_millis(client_timeout),
            };
            cmd_load(&service, &plan, rounds, evict).await
        }
    };

    if guard.is_exporting() {
        guard.force_flush();
    }
    outcome
}

async fn cmd_query(
    service: &ContentService,
    id: i64,
    size: i32,
    duration: i64,
    repeat: u32,
) -> anyhow::Result<()> {
    for attempt in 1..=repeat.max(1) {
        let started = Instant::now();
        let content = service.find_content(id, size, duration).await?;
        println!(
            "#{attempt} ({} ms): {}",
            started.elapsed().as_millis(),
            serde_json::to_string(&content)?
        );
    }

    let cache = service.cache().stats();
    println!(
        "cache {:?}: {} hit(s), {} miss(es)",
        service.cache_names(),
        cache.hits,
        cache.misses
    );
    Ok(())
}

struct LoadPlan {
    calls: u32,
    duration: i64,
    size: i32,
    client_timeout: Duration,
}

#[derive(Default)]
struct RoundReport {
    successful: u32,
    cancelled: u32,
    timed_out: u32,
    failed: u32,
    success_time: Duration,
}

async fn cmd_load(
    service: &ContentService,
    plan: &LoadPlan,
    rounds: u32,
    evict: bool,
) -> anyhow::Result<()> {
    println!(
        "{:<6}  {:>10}  {:>10}  {:>10}  {:>8}  {:>12}",
        "ROUND", "SUCCESSFUL", "CANCELLED", "TIMED_OUT", "FAILED", "AVG_MS"
    );
    println!("{}", "-".repeat(66));

    for round in 1..=rounds.max(1) {
        service.reset();
        let report = run_round(service, plan).await?;

        let avg_ms = if report.successful == 0 {
            "-".to_string()
        } else {
            (report.success_time.as_millis() / u128::from(report.successful)).to_string()
        };
        println!(
            "{:<6}  {:>10}  {:>10}  {:>10}  {:>8}  {:>12}",
            round, report.successful, report.cancelled, report.timed_out, report.failed, avg_ms
        );

        if evict {
            for id in 0..i64::from(plan.calls) {
                service.evict(id).await;
            }
        }
    }

    let stats = service.stats();
    println!(
        "\nquery duration {} ms, last round served {} request(s), avg {} ms, contention now {}",
        plan.duration,
        stats.count,
        stats.average().map(|d| d.as_millis()).unwrap_or(0),
        service.engine().contention()
    );
    Ok(())
}

async fn run_round(service: &ContentService, plan: &LoadPlan) -> anyhow::Result<RoundReport> {
    let calls = (0..plan.calls).map(|call_id| async move {
        let id = i64::from(call_id);
        let started = Instant::now();
        let outcome = tokio::time::timeout(
            plan.client_timeout,
            service.find_content(id, plan.size, plan.duration),
        )
        .await;
        (id, started.elapsed(), outcome)
    });

    let mut report = RoundReport::default();
    for (id, elapsed, outcome) in join_all(calls).await {
        match outcome {
            Ok(Ok(content)) => {
                anyhow::ensure!(
                    content.id == id && content.size == plan.size,
                    "call {id} received content for id {} with size {}",
                    content.id,
                    content.size
                );
                report.successful += 1;
                report.success_time += elapsed;
            }
            Ok(Err(Error::Timeout { .. })) => report.timed_out += 1,
            Ok(Err(_)) => report.failed += 1,
            Err(_) => report.cancelled += 1,
        }
    }
    Ok(report)
}
