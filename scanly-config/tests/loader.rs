use std::collections::HashMap;
use std::path::{Path, PathBuf};

use scanly_config::{ConfigLoadError, ConfigLoader, EnvConfig};

fn env(pairs: &[(&str, &str)]) -> EnvConfig {
    let vars: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    EnvConfig::from_lookup(|name| vars.get(name).cloned()).unwrap()
}

fn write_config(dir: &Path, body: &str) -> PathBuf {
    let path = dir.join("scanly.toml");
    std::fs::write(&path, body).unwrap();
    path
}

const SAMPLE: &str = r#"
state_file = "/var/lib/scanly/state.json"
origin_directory = "/downloads"

[reference]
directory = "/var/lib/scanly/lists"
freshness_hours = 12

[[reference.remote]]
list = "movies"
url = "https://lists.example.com/movies.json"

[watch]
debounce_window_ms = 2500
excluded_names = ["@eaDir"]

[matching]
workers = 2

[processing]
directory_workers = 6
auto_process = false

[links]
destination = "/library"
relative = true

[repair]
enabled = true
interval_secs = 600
"#;

#[test]
fn file_values_are_loaded() {
    let tmp = tempfile::tempdir().unwrap();
    let path = write_config(tmp.path(), SAMPLE);

    let load = ConfigLoader::new()
        .with_config_path(&path)
        .load_with_env(EnvConfig::default())
        .unwrap();
    let config = load.config;

    assert!(load.warnings.is_empty(), "{:?}", load.warnings);
    assert_eq!(load.metadata.config_path, Some(path));
    assert_eq!(config.state_file, PathBuf::from("/var/lib/scanly/state.json"));
    assert_eq!(config.reference.remote.len(), 1);
    assert_eq!(config.reference.remote[0].list.as_str(), "movies");
    assert_eq!(config.watch.debounce_window_ms, 2_500);
    assert_eq!(config.watch.excluded_names, vec!["@eaDir".to_string()]);
    assert_eq!(config.matching.workers, 2);
    assert_eq!(config.processing.directory_workers, 6);
    assert!(!config.processing.auto_process);

    let repair = config.repair_config().unwrap();
    assert_eq!(repair.destination, PathBuf::from("/library"));
    assert_eq!(repair.search_roots, vec![PathBuf::from("/downloads")]);
    assert!(repair.relative_links);
    assert_eq!(repair.interval_secs, 600);
}

#[test]
fn environment_overrides_file() {
    let tmp = tempfile::tempdir().unwrap();
    let path = write_config(tmp.path(), SAMPLE);

    let load = ConfigLoader::new()
        .with_config_path(&path)
        .load_with_env(env(&[
            ("DESTINATION_DIRECTORY", "/mnt/library"),
            ("RELATIVE_SYMLINK", "false"),
            ("SCANLY_DIRECTORY_WORKERS", "2"),
            ("SCANLY_AUTO_PROCESS", "on"),
        ]))
        .unwrap();

    assert_eq!(
        load.config.links.destination,
        Some(PathBuf::from("/mnt/library"))
    );
    assert!(!load.config.links.relative);
    assert_eq!(load.config.processing.directory_workers, 2);
    assert!(load.config.processing.auto_process);
    // Untouched by the environment.
    assert_eq!(load.config.matching.workers, 2);
}

#[test]
fn config_path_from_environment_is_used() {
    let tmp = tempfile::tempdir().unwrap();
    let path = write_config(tmp.path(), "[matching]\nworkers = 9\n");
    let raw = path.to_string_lossy().into_owned();

    let load = ConfigLoader::new()
        .load_with_env(env(&[("SCANLY_CONFIG_PATH", &raw)]))
        .unwrap();
    assert_eq!(load.config.matching.workers, 9);
}

#[test]
fn explicit_missing_file_is_an_error() {
    let tmp = tempfile::tempdir().unwrap();
    let missing = tmp.path().join("nope.toml");

    let err = ConfigLoader::new()
        .with_config_path(&missing)
        .load_with_env(EnvConfig::default())
        .unwrap_err();
    assert!(matches!(err, ConfigLoadError::MissingConfig { path } if path == missing));
}

#[test]
fn malformed_file_reports_parse_error() {
    let tmp = tempfile::tempdir().unwrap();
    let path = write_config(tmp.path(), "[watch]\ndebounce_window_ms = \"soon\"\n");

    let err = ConfigLoader::new()
        .with_config_path(&path)
        .load_with_env(EnvConfig::default())
        .unwrap_err();
    assert!(matches!(err, ConfigLoadError::Parse { .. }));
}

#[test]
fn guard_rails_fix_unusable_values() {
    let tmp = tempfile::tempdir().unwrap();
    let path = write_config(
        tmp.path(),
        "[watch]\ndebounce_window_ms = 0\npoll_interval_secs = 0\n\n[repair]\nenabled = true\n",
    );

    let load = ConfigLoader::new()
        .with_config_path(&path)
        .load_with_env(EnvConfig::default())
        .unwrap();

    assert_eq!(load.warnings.len(), 3);
    assert_eq!(load.config.watch.debounce_window_ms, 100);
    assert_eq!(load.config.watch.poll_interval_secs, 1);
    assert!(!load.config.repair.enabled);
    assert!(load.config.repair_config().is_none());
}

#[test]
fn no_file_yields_defaults_and_a_hint() {
    let load = ConfigLoader::new()
        .load_with_env(EnvConfig::default())
        .unwrap();

    assert_eq!(load.metadata.config_path, None);
    assert_eq!(load.warnings.len(), 1);
    assert!(load.warnings.items[0].hint.is_some());
    assert_eq!(load.config.processing.directory_workers, 4);
}
