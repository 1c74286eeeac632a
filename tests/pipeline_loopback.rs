use std::io::Read;
use std::net::TcpListener;
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Result};

use fusion_relay::detect::StubSource;
use fusion_relay::transport::decode_stream;
use fusion_relay::{
    DetectionSource, Frame, FrameSource, FusionEngine, LabelTable, LogDisplay, Pipeline,
    RawDetection, SourceConfig, SourceRole, SourceSet, StreamConfig, StreamMessage,
    SyntheticSource, Tagger, TcpSender,
};

/// Accepts one connection and collects everything written to it.
fn consumer() -> Result<(String, thread::JoinHandle<Vec<u8>>)> {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    let addr = listener.local_addr()?.to_string();
    let handle = thread::spawn(move || {
        let mut bytes = Vec::new();
        if let Ok((mut peer, _)) = listener.accept() {
            let _ = peer.read_to_end(&mut bytes);
        }
        bytes
    });
    Ok((addr, handle))
}

fn frames(count: u64) -> Result<SyntheticSource> {
    let mut source = SyntheticSource::new(SourceConfig {
        url: "stub://loopback".to_string(),
        width: 320,
        height: 240,
        max_frames: Some(count),
    });
    source.connect()?;
    Ok(source)
}

fn stream_config(addr: String) -> StreamConfig {
    StreamConfig {
        addr,
        send_timeout: Duration::from_millis(500),
        ..StreamConfig::default()
    }
}

fn stub_detectors() -> Result<SourceSet> {
    let mut set = SourceSet::new();
    set.register(StubSource::general(), 1.0)?;
    set.register(StubSource::trusted(), 1.0)?;
    Ok(set)
}

/// Fails on frame 2, otherwise sees one box.
struct FailsOnSecondFrame;

impl DetectionSource for FailsOnSecondFrame {
    fn name(&self) -> &str {
        "fails-on-second"
    }

    fn role(&self) -> SourceRole {
        SourceRole::General
    }

    fn labels(&self) -> &LabelTable {
        static COCO: std::sync::OnceLock<LabelTable> = std::sync::OnceLock::new();
        COCO.get_or_init(LabelTable::coco)
    }

    fn detect(&mut self, frame: &Frame) -> Result<Vec<RawDetection>> {
        if frame.index == 2 {
            return Err(anyhow!("model crashed"));
        }
        Ok(vec![RawDetection::new(32.0, 24.0, 96.0, 72.0, 0.9, 39)])
    }
}

#[test]
fn streams_every_fused_center_to_the_consumer() -> Result<()> {
    let (addr, handle) = consumer()?;
    let sender = TcpSender::connect(stream_config(addr))?;
    let mut pipeline = Pipeline::new(
        frames(3)?,
        stub_detectors()?,
        FusionEngine::default(),
        Tagger::default(),
        sender,
        LogDisplay::new(),
    );

    let stats = pipeline.run()?;
    assert_eq!(pipeline.display().frames_rendered(), 3);
    assert_eq!(stats.frames_processed, 3);
    assert!(stats.boxes_fused > 0);
    assert_eq!(stats.sends.sent, stats.boxes_fused);
    assert_eq!(stats.sends.dropped, 0);
    drop(pipeline);

    let bytes = handle.join().map_err(|_| anyhow!("consumer panicked"))?;
    let (messages, tail) = decode_stream(&bytes);
    assert_eq!(tail, 0);
    assert_eq!(messages.len() as u64, stats.boxes_fused);
    for StreamMessage { x, y } in messages {
        assert!((0.0..=1.0).contains(&x), "x {}", x);
        assert!((0.0..=1.0).contains(&y), "y {}", y);
    }
    Ok(())
}

#[test]
fn failed_detector_frame_sends_nothing_and_loop_continues() -> Result<()> {
    let (addr, handle) = consumer()?;
    let sender = TcpSender::connect(stream_config(addr))?;
    let mut detectors = SourceSet::new();
    detectors.register(FailsOnSecondFrame, 1.0)?;
    let mut pipeline = Pipeline::new(
        frames(3)?,
        detectors,
        FusionEngine::default(),
        Tagger::default(),
        sender,
        LogDisplay::new(),
    );

    let stats = pipeline.run()?;
    assert_eq!(stats.frames_processed, 2);
    assert_eq!(stats.frames_skipped, 1);
    assert_eq!(pipeline.display().frames_rendered(), 3);
    drop(pipeline);

    let bytes = handle.join().map_err(|_| anyhow!("consumer panicked"))?;
    let (messages, _) = decode_stream(&bytes);
    assert_eq!(messages.len(), 2);
    // 32..96 of 320 wide, 24..72 of 240 high
    assert!((messages[0].x - 0.2).abs() < 1e-5);
    assert!((messages[0].y - 0.2).abs() < 1e-5);
    Ok(())
}

#[test]
fn consumer_going_away_does_not_stop_the_loop() -> Result<()> {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    let addr = listener.local_addr()?.to_string();
    let sender = TcpSender::connect(StreamConfig {
        reconnect_backoff: Duration::from_secs(3600),
        ..stream_config(addr)
    })?;
    let (peer, _) = listener.accept()?;
    drop(peer);
    drop(listener);

    let mut pipeline = Pipeline::new(
        frames(20)?,
        stub_detectors()?,
        FusionEngine::default(),
        Tagger::default(),
        sender,
        LogDisplay::new(),
    );
    let stats = pipeline.run()?;
    assert_eq!(stats.frames_processed, 20);
    let sends = stats.sends;
    assert_eq!(sends.sent + sends.reconnected + sends.dropped, stats.boxes_fused);
    assert!(sends.dropped > 0);
    Ok(())
}

#[test]
fn stop_flag_ends_the_run_between_frames() -> Result<()> {
    let (addr, handle) = consumer()?;
    let sender = TcpSender::connect(stream_config(addr))?;
    let display = LogDisplay::new();
    display
        .stop_flag()
        .store(true, std::sync::atomic::Ordering::SeqCst);
    let mut pipeline = Pipeline::new(
        frames(100)?,
        stub_detectors()?,
        FusionEngine::default(),
        Tagger::default(),
        sender,
        display,
    );

    let stats = pipeline.run()?;
    assert_eq!(stats.frames_processed, 1);
    drop(pipeline);
    handle.join().map_err(|_| anyhow!("consumer panicked"))?;
    Ok(())
}
