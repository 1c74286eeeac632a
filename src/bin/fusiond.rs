//! fusiond - two-detector fusion daemon
//!
//! This daemon:
//! 1. Pulls frames from the configured source
//! 2. Runs the general and trusted detectors on every frame
//! 3. Fuses their boxes with Weighted Boxes Fusion
//! 4. Tags each fused box as pickable or not
//! 5. Streams fused box centers to the consumer over TCP

use anyhow::{anyhow, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::Ordering;

use fusion_relay::{
    open_source, FusionEngine, FusiondConfig, LogDisplay, Pipeline, Tagger, TcpSender,
};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Fuse two object detectors and stream box centers to a consumer"
)]
struct Args {
    /// Config file (.toml, otherwise JSON).
    #[arg(long, env = "FUSION_CONFIG")]
    config: Option<PathBuf>,

    /// Consumer address, overrides stream.addr.
    #[arg(long)]
    addr: Option<String>,

    /// Frame source URL (stub://name or an image directory), overrides source.url.
    #[arg(long)]
    source: Option<String>,

    /// Stop after this many frames.
    #[arg(long)]
    max_frames: Option<u64>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut cfg = FusiondConfig::load(args.config.as_deref())?;
    if let Some(addr) = args.addr {
        cfg.stream.addr = addr;
    }
    if let Some(url) = args.source {
        cfg.source.url = url;
    }
    if args.max_frames.is_some() {
        cfg.source.max_frames = args.max_frames;
    }
    cfg.validate()?;

    log::info!(
        "fusiond {} iou_thr={} skip_box_thr={} penalize_missing_sources={}",
        env!("CARGO_PKG_VERSION"),
        cfg.fusion.iou_thr,
        cfg.fusion.skip_box_thr,
        cfg.fusion.penalize_missing_sources
    );

    let mut detectors = cfg.build_sources()?;
    for line in detectors.list() {
        log::info!("source: {}", line);
    }
    detectors.warm_up()?;

    let mut source = open_source(cfg.source.clone())?;
    source.connect()?;

    let sender = TcpSender::connect(cfg.stream.clone())?;

    let display = LogDisplay::new();
    let stop = display.stop_flag();
    ctrlc::set_handler(move || {
        stop.store(true, Ordering::SeqCst);
    })
    .expect("error setting Ctrl-C handler");

    let mut pipeline = Pipeline::new(
        source,
        detectors,
        FusionEngine::new(cfg.fusion),
        Tagger::new(cfg.pick_category()),
        sender,
        display,
    );

    log::info!(
        "fusiond running: {} -> {} (policy {:?})",
        cfg.source.url,
        cfg.stream.addr,
        cfg.stream.policy
    );
    let result = pipeline.run();
    pipeline.sink_mut().shutdown();

    match result {
        Ok(stats) => {
            log::info!(
                "fusiond stopped after {} frames ({} skipped)",
                stats.frames_processed + stats.frames_skipped,
                stats.frames_skipped
            );
            Ok(())
        }
        Err(e) => {
            log::error!("{}", e);
            Err(anyhow!(e))
        }
    }
}
