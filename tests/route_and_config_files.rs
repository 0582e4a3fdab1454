//! Route documents, segment files and configuration on disk

use std::fs;
use std::time::Duration;

use nsmbw_autosplitter::config::OracleConfig;
use nsmbw_autosplitter::route::Component;
use nsmbw_autosplitter::{
    AutosplitterConfig, AutosplitterError, EndCondition, LoadType, Route, Split, SplitAction,
    StartCondition,
};

const ROUTE_DOCUMENT: &str = r#"{
    "version": "0.1.0",
    "name": "Any% No Warps",
    "start_detector": "first_split",
    "ending_detector": "switch",
    "splits": [
        {
            "name": "1-1",
            "type": "level",
            "components": [{"name": "flagpole"}, {"name": "coins", "activations": 3}],
            "expected_loads": 2,
            "load_type": "regular_fade"
        },
        {
            "name": "1-Tower",
            "split": false,
            "reset_load_count": false,
            "expected_loads": 3,
            "load_type": "tower_castle",
            "split_action": "skip_split"
        },
        {"name": "1-Castle"}
    ]
}"#;

#[test]
fn test_route_document_fields() {
    let route = Route::from_json(ROUTE_DOCUMENT).unwrap();
    assert_eq!(route.name, "Any% No Warps");
    assert_eq!(route.start_condition, StartCondition::FirstSplit);
    assert_eq!(route.end_condition, EndCondition::Switch);
    assert_eq!(route.len(), 3);
    assert_eq!(route.total_expected_loads(), 5);

    let first = route.split(0).unwrap();
    assert_eq!(first.kind, "level");
    assert_eq!(
        first.components,
        vec![
            Component {
                name: "flagpole".to_string(),
                activations: 1
            },
            Component {
                name: "coins".to_string(),
                activations: 3
            }
        ]
    );

    let tower = route.split(1).unwrap();
    assert!(!tower.split);
    assert!(!tower.reset_load_count);
    assert_eq!(tower.load_type, LoadType::TowerCastle);
    assert_eq!(tower.split_action, SplitAction::SkipSplit);

    let castle = route.split(2).unwrap();
    assert_eq!(castle.kind, "");
    assert!(castle.split);
    assert!(castle.reset_load_count);
    assert_eq!(castle.expected_loads, 0);
    assert_eq!(castle.load_type, LoadType::RegularFade);
    assert_eq!(castle.split_action, SplitAction::Split);
}

#[test]
fn test_round_trip_keeps_substituted_defaults() {
    let route = Route::from_json(r#"{"name": "short", "splits": [{"name": "1-1", "expected_loads": 1}]}"#)
        .unwrap();
    let reparsed = Route::from_json(&route.to_json().unwrap()).unwrap();
    assert_eq!(reparsed, route);
    assert_eq!(reparsed.start_condition, StartCondition::Manual);
    assert_eq!(reparsed.splits[0].load_type, LoadType::RegularFade);
}

#[test]
fn test_save_and_load_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("any.nsmbw");

    let route = Route::new("any%")
        .with_start(StartCondition::TimerSignal)
        .with_split(Split::new("1-1", 2))
        .with_split(Split::new("1-2", 1).with_load_type(LoadType::GhostHouse));
    route.save(&path).unwrap();

    let text = fs::read_to_string(&path).unwrap();
    assert!(text.contains("\"start_detector\": \"timer_signal\""));
    assert!(!text.contains("actual_loads"));
    assert_eq!(Route::from_file(&path).unwrap(), route);
    assert!(!dir.path().join("any.nsmbw.tmp").exists());
}

#[test]
fn test_lss_file_conversion() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("World 1.lss");
    fs::write(
        &path,
        r#"<?xml version="1.0" encoding="UTF-8"?>
<Run version="1.7.0">
  <Segments>
    <Segment><Name>-1-1</Name></Segment>
    <Segment><Name>{World 1}1-2</Name></Segment>
    <Segment><Name><![CDATA[Bowser Jr.]]></Name></Segment>
  </Segments>
</Run>"#,
    )
    .unwrap();

    let route = Route::from_file(&path).unwrap();
    assert_eq!(route.name, "World 1");
    let names: Vec<&str> = route.splits.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["World 1 1-1", "World 1 1-2", "Bowser Jr."]);
    assert!(route
        .splits
        .iter()
        .all(|s| s.expected_loads == 0 && s.reset_load_count && s.split));
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = Route::from_file(&dir.path().join("missing.nsmbw")).unwrap_err();
    assert!(matches!(err, AutosplitterError::Io(_)));
}

#[test]
fn test_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("autosplitter.toml");
    fs::write(
        &path,
        r#"
[capture]
device = "/dev/video2"

[livesplit]
port = 16835
io_timeout_ms = 60000

[detection]
cooldown_ms = 1500

[classifiers.ghost_house]
oracle = "disabled"

[classifiers.banner_load]
oracle = "dark_frame"
max_mean_luma = 15.0
"#,
    )
    .unwrap();

    let config = AutosplitterConfig::from_file(&path).unwrap();
    assert_eq!(config.capture.device, "/dev/video2");
    assert_eq!(config.livesplit.port, 16835);
    assert_eq!(config.livesplit.host, "127.0.0.1");
    assert_eq!(config.livesplit.io_timeout(), Duration::from_secs(10));
    assert_eq!(config.detection.cooldown(), Duration::from_millis(1500));
    assert_eq!(config.detection.hysteresis_threshold, 5);
    assert_eq!(config.classifiers.ghost_house, OracleConfig::Disabled);
    assert_eq!(
        config.classifiers.banner_load,
        OracleConfig::DarkFrame { max_mean_luma: 15.0 }
    );
}

#[test]
fn test_bad_config_is_error() {
    let err = AutosplitterConfig::from_toml("[livesplit]\nport = \"x\"").unwrap_err();
    assert!(matches!(err, AutosplitterError::ConfigParse(_)));
}
