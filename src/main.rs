//! tiercache - Tiered Cache Workload Driver
//!
//! Builds a tier chain from flags or a YAML file, drives a skewed read
//! workload through it from several threads and prints the resulting
//! statistics.
//!
//! ```text
//! ┌────────────┐    ┌──────────────┐    ┌─────────────┐    ┌─────────┐
//! │  workers   │───▶│  StatsCache  │───▶│ tier chain  │───▶│ loader  │
//! │ (threads)  │    │              │    │ L1 → L2 → L3│    │ (slow)  │
//! └────────────┘    └──────────────┘    └─────────────┘    └─────────┘
//! ```

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use clap::Parser;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use tiercache::cache::{loader, Cache};
use tiercache::config::ToolkitConfig;
use tiercache::decorator::StatsCache;
use tiercache::error::{Error, Result};
use tiercache::factory;
use tiercache::registry::CacheRegistry;

/// Name the workload cache is registered under
const WORKLOAD_CACHE: &str = "workload";

/// Share of reads aimed at the hot key set
const HOT_READ_RATIO: f64 = 0.8;

/// Hot key set as a share of all keys, in percent
const HOT_KEY_PERCENT: u64 = 20;

// =============================================================================
// CLI Arguments
// =============================================================================

/// Tiered cache workload driver
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// YAML configuration file
    #[arg(long, env = "TIERCACHE_CONFIG")]
    config: Option<PathBuf>,

    /// Comma-separated tier configuration strings, L1 first (e.g. lru:100,concurrent)
    #[arg(long, env = "TIERCACHE_TIERS", value_delimiter = ',')]
    tiers: Option<Vec<String>>,

    /// Use the segment-locked two-level cache
    #[arg(long, env = "TIERCACHE_SEGMENTED")]
    segmented: bool,

    /// Number of distinct keys
    #[arg(long, env = "TIERCACHE_KEYS", default_value = "1000")]
    keys: u64,

    /// Total reads across all threads
    #[arg(long, env = "TIERCACHE_READS", default_value = "100000")]
    reads: u64,

    /// Worker threads
    #[arg(long, env = "TIERCACHE_THREADS", default_value = "4")]
    threads: usize,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(long, env = "LOG_LEVEL")]
    log_level: Option<String>,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,

    /// Print Prometheus text exposition
    #[arg(long, env = "TIERCACHE_METRICS")]
    metrics: bool,

    /// Print the statistics snapshot as JSON
    #[arg(long, env = "TIERCACHE_JSON")]
    json: bool,
}

// =============================================================================
// Main
// =============================================================================

fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;

    init_logging(&config.log.level, config.log.json);

    if args.keys == 0 || args.threads == 0 {
        return Err(Error::InvalidArgument(
            "--keys and --threads must be greater than 0".to_string(),
        ));
    }

    info!("Starting tiercache workload");
    info!("  Tiers: {}", config.tiers.join(" -> "));
    info!("  Segmented: {}", config.segmented);
    info!("  Keys: {}, reads: {}, threads: {}", args.keys, args.reads, args.threads);

    let loads = Arc::new(AtomicU64::new(0));
    let load_counter = Arc::clone(&loads);
    let source = loader(move |key: &u64| {
        load_counter.fetch_add(1, Ordering::Relaxed);
        Ok(Some(format!("value-{}", key)))
    });

    let chain = factory::build_tiered(&config, Some(source))?;
    let cache = Arc::new(StatsCache::new(chain));

    let registry = CacheRegistry::new();
    registry.register::<u64, String>(WORKLOAD_CACHE, cache.clone())?;
    if config.monitor_interval_secs > 0 {
        registry.start_monitoring(Duration::from_secs(config.monitor_interval_secs))?;
    }

    let started = Instant::now();
    run_workload(&cache, &args)?;
    let elapsed = started.elapsed();

    info!(
        "Workload finished in {:?} ({} loader calls)",
        elapsed,
        loads.load(Ordering::Relaxed)
    );

    println!("{}", registry.report());
    println!("{}", cache.stats_summary());
    println!(
        "Elapsed: {:.3}s, throughput: {:.0} reads/s, loader calls: {}",
        elapsed.as_secs_f64(),
        args.reads as f64 / elapsed.as_secs_f64().max(f64::EPSILON),
        loads.load(Ordering::Relaxed)
    );

    if args.json {
        let output = serde_json::json!({
            "stats": cache.snapshot(),
            "report": registry.report(),
            "loader_calls": loads.load(Ordering::Relaxed),
            "elapsed_secs": elapsed.as_secs_f64(),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    }

    if args.metrics {
        print!("{}", registry.render_prometheus()?);
    }

    registry.shutdown()?;
    info!("Shutdown complete");
    Ok(())
}

fn load_config(args: &Args) -> Result<ToolkitConfig> {
    let mut config = match &args.config {
        Some(path) => ToolkitConfig::from_file(path)?,
        None => ToolkitConfig::default(),
    };

    if let Some(tiers) = &args.tiers {
        config.tiers = tiers.iter().map(|tier| tier.trim().to_string()).collect();
    }
    if args.segmented {
        config.segmented = true;
    }
    if let Some(level) = &args.log_level {
        config.log.level = level.clone();
    }
    if args.log_json {
        config.log.json = true;
    }

    config.validate()?;
    Ok(config)
}

// =============================================================================
// Workload
// =============================================================================

fn run_workload<C>(cache: &C, args: &Args) -> Result<()>
where
    C: Cache<u64, String> + Sync,
{
    let per_thread = args.reads / args.threads as u64;
    let remainder = args.reads % args.threads as u64;

    thread::scope(|scope| {
        let handles: Vec<_> = (0..args.threads as u64)
            .map(|worker| {
                let reads = per_thread + u64::from(worker < remainder);
                scope.spawn(move || {
                    let mut keys = KeyStream::new(worker, args.keys);
                    for _ in 0..reads {
                        cache.get(&keys.next_key())?;
                    }
                    Ok::<(), Error>(())
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|handle| {
                handle
                    .join()
                    .unwrap_or_else(|payload| std::panic::resume_unwind(payload))
            })
            .collect::<Result<()>>()
    })
}

/// Skewed key sequence: most reads land on a small hot set
struct KeyStream {
    rng: StdRng,
    keys: u64,
    hot_keys: u64,
}

impl KeyStream {
    fn new(seed: u64, keys: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            keys,
            hot_keys: (keys * HOT_KEY_PERCENT / 100).max(1),
        }
    }

    fn next_key(&mut self) -> u64 {
        if self.rng.gen_bool(HOT_READ_RATIO) {
            self.rng.gen_range(0..self.hot_keys)
        } else {
            self.rng.gen_range(0..self.keys)
        }
    }
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(level: &str, json: bool) {
    let level = level.parse::<Level>().unwrap_or(Level::INFO);
    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .init();
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_stream_stays_in_range() {
        let mut stream = KeyStream::new(3, 50);
        assert!((0..10_000).all(|_| stream.next_key() < 50));

        let mut tiny = KeyStream::new(0, 1);
        assert!((0..100).all(|_| tiny.next_key() == 0));
    }

    #[test]
    fn test_key_stream_favors_hot_keys() {
        let mut stream = KeyStream::new(7, 1000);
        let hot = (0..10_000).filter(|_| stream.next_key() < 200).count();
        // 80% targeted plus 20% of the uniform share
        assert!((8_000..9_000).contains(&hot), "hot reads: {}", hot);
    }

    #[test]
    fn test_key_stream_is_seeded_per_worker() {
        let take = |seed| {
            let mut stream = KeyStream::new(seed, 1000);
            (0..32).map(|_| stream.next_key()).collect::<Vec<_>>()
        };
        assert_eq!(take(1), take(1));
        assert_ne!(take(1), take(2));
    }
}
