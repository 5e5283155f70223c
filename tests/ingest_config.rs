// tests/ingest_config.rs
use hazard_ingest::config::AppConfig;
use hazard_ingest::ingest::config::{
    load_sources_default, load_sources_from, FileSourceRegistry, SourceRegistry,
};
use hazard_ingest::model::SourceKind;
use hazard_ingest::MatchStrategy;
use std::{env, fs};

#[test]
fn registry_files_in_both_formats() {
    let dir = tempfile::tempdir().unwrap();

    let p_toml = dir.path().join("sources.toml");
    fs::write(
        &p_toml,
        r#"
[[sources]]
id = "usgs"
kind = "structured-api"
base_url = "https://quake.test/all_hour.geojson"
enabled = true

[[sources]]
id = "broker"
kind = "html"
base_url = "https://broker.test/news"
enabled = false
"#,
    )
    .unwrap();
    let v = load_sources_from(&p_toml).unwrap();
    assert_eq!(v.len(), 2);
    assert_eq!(v[0].kind, SourceKind::StructuredApi);
    assert_eq!(v[1].kind, SourceKind::HtmlScrape);

    let p_json = dir.path().join("sources.json");
    fs::write(
        &p_json,
        r#"[{"id":"wire","kind":"rss","baseUrl":"https://wire.test/rss","enabled":true}]"#,
    )
    .unwrap();
    let vj = load_sources_from(&p_json).unwrap();
    assert_eq!(vj[0].kind, SourceKind::Feed);
    assert_eq!(vj[0].base_url, "https://wire.test/rss");
}

#[tokio::test]
async fn file_registry_returns_only_enabled_sources_and_rereads() {
    let dir = tempfile::tempdir().unwrap();
    let p = dir.path().join("sources.toml");
    fs::write(
        &p,
        r#"
[[sources]]
id = "a"
kind = "feed"
base_url = "https://a.test"
enabled = true

[[sources]]
id = "b"
kind = "feed"
base_url = "https://b.test"
"#,
    )
    .unwrap();

    let reg = FileSourceRegistry::new(Some(p.clone()));
    let first = reg.enabled_sources().await.unwrap();
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].id, "a");

    fs::write(
        &p,
        r#"
[[sources]]
id = "b"
kind = "feed"
base_url = "https://b.test"
enabled = true
"#,
    )
    .unwrap();
    let second = reg.enabled_sources().await.unwrap();
    assert_eq!(second[0].id, "b");
}

#[tokio::test]
async fn missing_or_broken_registry_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let missing = FileSourceRegistry::new(Some(dir.path().join("nope.toml")));
    assert!(missing.enabled_sources().await.is_err());

    let broken = dir.path().join("sources.json");
    fs::write(&broken, "{ not json").unwrap();
    assert!(FileSourceRegistry::new(Some(broken))
        .enabled_sources()
        .await
        .is_err());
}

#[serial_test::serial]
#[test]
fn default_registry_uses_env_then_fallbacks() {
    // isolate CWD so the repo's own config/ is not picked up
    let old = env::current_dir().unwrap();
    let tmp = tempfile::tempdir().unwrap();
    env::set_current_dir(tmp.path()).unwrap();
    env::remove_var("INGEST_SOURCES_PATH");

    // 1) nothing configured
    assert!(load_sources_default().is_err());

    // 2) ./config/sources.json
    let cfg_dir = tmp.path().join("config");
    fs::create_dir_all(&cfg_dir).unwrap();
    fs::write(
        cfg_dir.join("sources.json"),
        r#"{"sources":[{"id":"j","kind":"feed","base_url":"https://j.test"}]}"#,
    )
    .unwrap();
    assert_eq!(load_sources_default().unwrap()[0].id, "j");

    // 3) ./config/sources.toml wins over json
    fs::write(
        cfg_dir.join("sources.toml"),
        "[[sources]]\nid = \"t\"\nkind = \"feed\"\nbase_url = \"https://t.test\"\n",
    )
    .unwrap();
    assert_eq!(load_sources_default().unwrap()[0].id, "t");

    // 4) env wins over everything
    let p_env = tmp.path().join("elsewhere.json");
    fs::write(&p_env, r#"[{"id":"e","kind":"feed","base_url":"https://e.test"}]"#).unwrap();
    env::set_var("INGEST_SOURCES_PATH", p_env.display().to_string());
    assert_eq!(load_sources_default().unwrap()[0].id, "e");

    // 5) env pointing nowhere is an error, not a silent fallback
    env::set_var("INGEST_SOURCES_PATH", tmp.path().join("gone.json"));
    assert!(load_sources_default().is_err());
    env::remove_var("INGEST_SOURCES_PATH");

    env::set_current_dir(&old).unwrap();
}

#[serial_test::serial]
#[test]
fn app_config_file_then_env_overrides() {
    let old = env::current_dir().unwrap();
    let tmp = tempfile::tempdir().unwrap();
    env::set_current_dir(tmp.path()).unwrap();
    env::remove_var("INGEST_CONFIG_PATH");
    env::remove_var("INGEST_INTERVAL_SECS");
    env::remove_var("INGEST_METRICS_ADDR");

    // defaults when nothing is present
    let d = AppConfig::load_default().unwrap();
    assert_eq!(d.interval_secs, 3600);
    assert_eq!(d.user_agent, "Bot/1.0");
    assert_eq!(d.match_strategy, MatchStrategy::First);

    let p = tmp.path().join("ingest.toml");
    fs::write(
        &p,
        r#"
interval_secs = 600
match_strategy = "best"
window_days = 3
"#,
    )
    .unwrap();
    env::set_var("INGEST_CONFIG_PATH", p.display().to_string());
    env::set_var("INGEST_INTERVAL_SECS", "120");
    env::set_var("INGEST_METRICS_ADDR", "0.0.0.0:9100");

    let c = AppConfig::load_default().unwrap();
    assert_eq!(c.interval_secs, 120);
    assert_eq!(c.window_days, 3);
    assert_eq!(c.match_strategy, MatchStrategy::Best);
    assert_eq!(c.metrics_addr, "0.0.0.0:9100");

    env::remove_var("INGEST_CONFIG_PATH");
    env::remove_var("INGEST_INTERVAL_SECS");
    env::remove_var("INGEST_METRICS_ADDR");
    env::set_current_dir(&old).unwrap();
}
