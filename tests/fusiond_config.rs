use std::sync::Mutex;
use std::time::Duration;

use tempfile::NamedTempFile;

use fusion_relay::config::{DetectorKind, FusiondConfig};
use fusion_relay::SendPolicy;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "FUSION_CONFIG",
        "FUSION_STREAM_ADDR",
        "FUSION_IOU_THR",
        "FUSION_SKIP_BOX_THR",
        "FUSION_SOURCE_URL",
        "FUSION_PICK_CLASSES",
        "FUSION_SEND_POLICY",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn loads_json_config_from_env_path_with_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let replay = file.path().with_extension("jsonl");
    let json = format!(
        r#"{{
            "fusion": {{
                "iou_thr": 0.55,
                "skip_box_thr": 0.05,
                "penalize_missing_sources": false
            }},
            "stream": {{
                "addr": "10.0.0.5:6000",
                "send_timeout_ms": 20,
                "policy": "drop"
            }},
            "pick": {{
                "classes": ["can", "tire"]
            }},
            "source": {{
                "url": "stub://bench",
                "width": 800,
                "height": 600,
                "max_frames": 25
            }},
            "detectors": {{
                "trusted": {{
                    "kind": "replay",
                    "path": "{}",
                    "weight": 2.0
                }}
            }}
        }}"#,
        replay.display()
    );
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");

    std::env::set_var("FUSION_CONFIG", file.path());
    std::env::set_var("FUSION_IOU_THR", "0.6");
    std::env::set_var("FUSION_PICK_CLASSES", "pbottle, glove");

    let cfg = FusiondConfig::load(None).expect("load config");

    assert_eq!(cfg.fusion.iou_thr, 0.6);
    assert_eq!(cfg.fusion.skip_box_thr, 0.05);
    assert!(!cfg.fusion.penalize_missing_sources);
    assert!(!cfg.fusion.same_label_only);
    assert_eq!(cfg.stream.addr, "10.0.0.5:6000");
    assert_eq!(cfg.stream.send_timeout, Duration::from_millis(20));
    assert_eq!(cfg.stream.connect_timeout, Duration::from_millis(2000));
    assert_eq!(cfg.stream.policy, SendPolicy::Drop);
    assert_eq!(cfg.pick_classes, vec!["pbottle", "glove"]);
    assert!(cfg.pick_category().contains("glove"));
    assert!(!cfg.pick_category().contains("can"));
    assert_eq!(cfg.source.url, "stub://bench");
    assert_eq!(cfg.source.width, 800);
    assert_eq!(cfg.source.max_frames, Some(25));
    assert_eq!(cfg.general.kind, DetectorKind::Stub);
    assert_eq!(cfg.trusted.kind, DetectorKind::Replay);
    assert_eq!(cfg.trusted.path.as_deref(), Some(replay.as_path()));
    assert_eq!(cfg.trusted.weight, 2.0);

    clear_env();
}

#[test]
fn loads_toml_config_from_explicit_path() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("temp config");
    let toml = r#"
[fusion]
iou_thr = 0.4
same_label_only = true

[stream]
addr = "127.0.0.1:7000"
policy = "reconnect_once"
reconnect_backoff_ms = 250

[detectors.general]
weight = 1.5
confidence = 0.3
"#;
    std::io::Write::write_all(&mut file, toml.as_bytes()).expect("write config");
    std::env::set_var("FUSION_STREAM_ADDR", "127.0.0.1:7001");

    let cfg = FusiondConfig::load(Some(file.path())).expect("load config");

    assert_eq!(cfg.fusion.iou_thr, 0.4);
    assert_eq!(cfg.fusion.skip_box_thr, 0.01);
    assert!(cfg.fusion.same_label_only);
    assert_eq!(cfg.stream.addr, "127.0.0.1:7001");
    assert_eq!(cfg.stream.policy, SendPolicy::ReconnectOnce);
    assert_eq!(cfg.stream.reconnect_backoff, Duration::from_millis(250));
    assert_eq!(cfg.general.weight, 1.5);
    assert_eq!(cfg.general.confidence, 0.3);
    assert_eq!(cfg.pick_classes.len(), 15);

    clear_env();
}

#[test]
fn defaults_apply_without_a_config_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = FusiondConfig::load(None).expect("load defaults");
    assert_eq!(cfg.fusion.iou_thr, 0.5);
    assert_eq!(cfg.fusion.skip_box_thr, 0.01);
    assert_eq!(cfg.stream.addr, "127.0.0.1:5005");
    assert_eq!(cfg.source.url, "stub://camera");
    assert_eq!((cfg.source.width, cfg.source.height), (640, 480));

    let sources = cfg.build_sources().expect("build stub detectors");
    assert_eq!(sources.len(), 2);
    assert_eq!(sources.trusted(), Some(1));
}

#[test]
fn rejects_invalid_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("FUSION_IOU_THR", "half");
    assert!(FusiondConfig::load(None).is_err());
    clear_env();

    std::env::set_var("FUSION_SKIP_BOX_THR", "1.5");
    assert!(FusiondConfig::load(None).is_err());
    clear_env();

    std::env::set_var("FUSION_SEND_POLICY", "retry_forever");
    assert!(FusiondConfig::load(None).is_err());
    clear_env();
}

#[test]
fn missing_config_file_is_an_error() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let dir = tempfile::tempdir().expect("temp dir");
    let missing = dir.path().join("absent.json");
    assert!(FusiondConfig::load(Some(missing.as_path())).is_err());
}
