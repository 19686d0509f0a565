use std::sync::Mutex;

use tempfile::NamedTempFile;

use detect_overlay::config::{AppConfig, DEFAULT_API_BASE_URL};

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in ["DETECT_CONFIG", "DETECT_API_URL"] {
        std::env::remove_var(key);
    }
}

fn config_file(json: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp config");
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");
    file
}

#[test]
fn defaults_without_file_or_env() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = AppConfig::load().expect("load config");
    assert_eq!(cfg.api_base_url, DEFAULT_API_BASE_URL);
}

#[test]
fn loads_file_then_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = config_file(r#"{ "api": { "base_url": "http://detector.lan:9000/" } }"#);
    std::env::set_var("DETECT_CONFIG", file.path());

    let cfg = AppConfig::load().expect("load config");
    assert_eq!(cfg.api_base_url, "http://detector.lan:9000");

    std::env::set_var("DETECT_API_URL", "https://gpu-box:8443");
    let cfg = AppConfig::load().expect("load config");
    assert_eq!(cfg.api_base_url, "https://gpu-box:8443");

    clear_env();
}

#[test]
fn rejects_bad_urls_and_files() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("DETECT_API_URL", "ftp://detector");
    assert!(AppConfig::load().is_err());
    std::env::set_var("DETECT_API_URL", "not a url");
    assert!(AppConfig::load().is_err());
    std::env::remove_var("DETECT_API_URL");

    let file = config_file("{ not json");
    std::env::set_var("DETECT_CONFIG", file.path());
    assert!(AppConfig::load().is_err());

    std::env::set_var("DETECT_CONFIG", "/nonexistent/detect.json");
    assert!(AppConfig::load().is_err());

    clear_env();
}
