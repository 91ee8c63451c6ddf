mod config;
mod engine;
mod extractor;
mod limiter;
mod matcher;
mod model;
mod normalizer;
mod session;
mod source;
mod storage;
mod utils;

use std::time::Duration;

use config::{AppConfig, load_config};
use engine::ReconEngine;
use limiter::RateLimiter;
use source::{CandidateSource, JsonFileSource, RateLimited};
use storage::SqliteStorage;
use tracing::{error, info};

fn main() {
    // Initialize logging
    tracing_subscriber::fmt::init();

    // Load configuration from file
    let config: AppConfig = match load_config("config.json") {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Config load error: {}", e);
            return;
        }
    };

    // Initialize storage (SQLite)
    let storage = match SqliteStorage::new(&config.db_path) {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to initialize storage: {:?}", e);
            return;
        }
    };

    // Passive liveness heartbeat; reads nothing mutable.
    spawn_heartbeat(config.heartbeat_interval_seconds);

    info!("🚀 PromoRecon started");

    // Upstream extraction output, gated by the per-batch rate limiter
    let limiter = RateLimiter::new(
        config.rate_limit.max_calls_per_window,
        Duration::from_secs(config.rate_limit.cooldown_seconds),
    );
    let mut candidate_source = RateLimited::new(JsonFileSource::new(&config.input_path), limiter);

    let candidates = match candidate_source.fetch() {
        Ok(c) => c,
        Err(e) => {
            error!("Candidate source error: {}", e);
            return;
        }
    };
    info!("Candidates to reconcile: {}", candidates.len());

    // Reconcile sequentially, in arrival order
    let mut engine = ReconEngine::new(storage, config.matching.clone());
    let summary = engine.run_batch(&candidates);

    match engine.storage().count_offers() {
        Ok(total) => info!(
            "🏁 Done: {} candidates processed, {} offers now stored",
            summary.total(),
            total
        ),
        Err(e) => error!("Failed to read final offer count: {}", e),
    }
}

/// Logs liveness every `interval_seconds` so long batches are visibly alive.
fn spawn_heartbeat(interval_seconds: u64) {
    std::thread::spawn(move || {
        loop {
            std::thread::sleep(Duration::from_secs(interval_seconds.max(1)));
            info!("⏳ Still processing...");
        }
    });
}
