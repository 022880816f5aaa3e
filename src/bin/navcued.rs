//! navcued - navigation cue daemon
//!
//! This daemon:
//! 1. Loads configuration and the category table (fatal on configuration errors)
//! 2. Pulls frames from the configured source at the capture rate
//! 3. Hands them to the navigation worker (latest frame wins)
//! 4. Presents alerts on a separate thread, as log lines or JSON
//! 5. Logs worker and source health every 5 seconds

use anyhow::{anyhow, Result};
use clap::Parser;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use navcue::category::COCO_LABELS;
use navcue::config::{BackendKind, NavcueConfig};
use navcue::ingest::{FileConfig, FileSource, FrameSource};
use navcue::pipeline::{self, ChannelSink, LogSink, Navigator};
use navcue::{InferenceBackend, StubBackend};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Stop after this many seconds (0 runs until Ctrl-C or the source ends).
    #[arg(long, default_value_t = 0)]
    seconds: u64,
    /// Emit alerts as JSON lines on stdout instead of log lines.
    #[arg(long, env = "NAVCUE_JSON")]
    json: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let cfg = NavcueConfig::load()?;
    let table = Arc::new(cfg.load_table()?);
    for tier in table.tiers() {
        log::info!(
            "tier {} ({}): {} labels, cooldown {}ms",
            tier.tier,
            tier.name,
            tier.labels,
            tier.cooldown_ms
        );
    }

    let backend = build_backend(&cfg, table.len())?;
    let navigator = Navigator::new(table, cfg.navigator.clone(), backend)?;

    let mut source = FileSource::new(FileConfig {
        path: cfg.source.path.clone(),
        width: cfg.source.width,
        height: cfg.source.height,
        looping: cfg.source.looping,
    })?;
    source.connect()?;

    let presenter = LogSink::new(args.json || cfg.json_output);
    let (sink, events) = ChannelSink::new();
    let presentation = std::thread::Builder::new()
        .name("navcue-present".into())
        .spawn(move || {
            for event in events {
                presenter.present(&event);
            }
        })?;

    let worker = pipeline::spawn(navigator, Box::new(sink))?;

    let shutdown = Arc::new(AtomicBool::new(false));
    let handler_shutdown = shutdown.clone();
    ctrlc::set_handler(move || {
        handler_shutdown.store(true, Ordering::SeqCst);
    })
    .map_err(|e| anyhow!("error setting Ctrl-C handler: {}", e))?;

    let capture_interval = Duration::from_millis(1000 / cfg.source.capture_fps.max(1) as u64);
    let deadline = (args.seconds > 0).then(|| Instant::now() + Duration::from_secs(args.seconds));
    let mut last_health_log = Instant::now();
    let mut source_errors = 0u64;

    log::info!(
        "navcued running. source={} capture_fps={}",
        cfg.source.path,
        cfg.source.capture_fps
    );

    loop {
        if shutdown.load(Ordering::SeqCst) {
            log::info!("shutdown signal received, stopping worker...");
            break;
        }
        if deadline.is_some_and(|d| Instant::now() >= d) {
            break;
        }

        let started = Instant::now();
        match source.next_frame() {
            Ok(Some(frame)) => {
                worker.submit(frame);
            }
            Ok(None) => {
                log::info!("source exhausted");
                worker.wait_idle(Duration::from_secs(10));
                break;
            }
            Err(e) => {
                source_errors += 1;
                log::warn!("frame capture failed: {:#}", e);
            }
        }

        if last_health_log.elapsed() >= Duration::from_secs(5) {
            let stats = worker.stats();
            let src = source.stats();
            log::info!(
                "worker processed={} superseded={} rate_limited={} failed={} alerts={} consecutive_failures={}",
                stats.processed,
                stats.superseded,
                stats.rate_limited,
                stats.failed,
                stats.alerts,
                stats.consecutive_failures
            );
            log::info!(
                "source health={} frames={} errors={} source={}",
                source.is_healthy(),
                src.frames_captured,
                source_errors,
                src.source
            );
            if stats.consecutive_failures > 0 {
                log::warn!(
                    "inference degraded: {} consecutive failures",
                    stats.consecutive_failures
                );
            }
            last_health_log = Instant::now();
        }

        if let Some(remaining) = capture_interval.checked_sub(started.elapsed()) {
            std::thread::sleep(remaining);
        }
    }

    let stats = worker.stop();
    if presentation.join().is_err() {
        log::error!("presentation thread panicked");
    }
    log::info!(
        "navcued stopped. submitted={} processed={} superseded={} alerts={}",
        stats.submitted,
        stats.processed,
        stats.superseded,
        stats.alerts
    );
    Ok(())
}

fn build_backend(cfg: &NavcueConfig, num_classes: usize) -> Result<Box<dyn InferenceBackend>> {
    match cfg.backend {
        BackendKind::Stub => {
            if num_classes == COCO_LABELS.len() {
                log::info!("using stub backend with the demo street scene");
                Ok(Box::new(StubBackend::demo_scene()))
            } else {
                log::info!("using empty stub backend ({} classes)", num_classes);
                Ok(Box::new(StubBackend::new(num_classes)))
            }
        }
        BackendKind::Tract => tract_backend(cfg, num_classes),
    }
}

#[cfg(feature = "backend-tract")]
fn tract_backend(cfg: &NavcueConfig, num_classes: usize) -> Result<Box<dyn InferenceBackend>> {
    let path = cfg
        .model_path
        .as_ref()
        .ok_or_else(|| anyhow!("the tract backend requires model_path"))?;
    log::info!("loading ONNX model {}", path.display());
    let backend = navcue::detect::TractBackend::new(path, cfg.navigator.input_size, num_classes)?;
    Ok(Box::new(backend))
}

#[cfg(not(feature = "backend-tract"))]
fn tract_backend(_cfg: &NavcueConfig, _num_classes: usize) -> Result<Box<dyn InferenceBackend>> {
    Err(anyhow!(
        "the tract backend requires building with the backend-tract feature"
    ))
}
