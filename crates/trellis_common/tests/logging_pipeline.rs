//! End-to-end tests for the logger -> router -> route pipeline.

use serde_json::json;
use std::fs;
use tempfile::TempDir;
use trellis_common::logging::{FileLogRoute, LogRouter};
use trellis_common::{
    AppConfig, Application, ComponentConfig, ComponentSpec, Framework, LogFilter, LogLevel, Logger,
};

fn file_route_app(dir: &TempDir, extra: serde_json::Value) -> Application {
    let logs = dir.path().join("logs");
    fs::create_dir_all(&logs).unwrap();

    let mut route = json!({
        "class": "FileLogRoute",
        "logPath": logs.display().to_string(),
        "levels": "error, warning",
    });
    if let (Some(route), Some(extra)) = (route.as_object_mut(), extra.as_object()) {
        for (key, value) in extra {
            route.insert(key.clone(), value.clone());
        }
    }

    let mut config = AppConfig::default()
        .with_base_path(dir.path())
        .with_component("log", ComponentConfig::new("LogRouter").with("routes", json!([route])));
    config.preload = vec!["log".to_string()];
    Application::new(Framework::new(), config).unwrap()
}

#[test]
fn test_unfiltered_logs_between_flushes() {
    let logger = Logger::new();
    logger.log("one", LogLevel::Info, "app");
    logger.log("two", LogLevel::Trace, "app.db");
    logger.log("three", LogLevel::Error, "system");

    let messages: Vec<String> = logger
        .get_logs(&LogFilter::new())
        .into_iter()
        .map(|e| e.message)
        .collect();
    assert_eq!(messages, vec!["one", "two", "three"]);

    logger.flush(false);
    assert_eq!(logger.log_count(), 0);
    assert!(logger.get_logs(&LogFilter::new()).is_empty());
}

#[test]
fn test_level_filter_keeps_order() {
    let logger = Logger::new();
    logger.log("fail", LogLevel::Error, "db");
    logger.log("ok", LogLevel::Info, "db");
    logger.log("trace1", LogLevel::Trace, "sys");

    let logs = logger.get_logs(&LogFilter::new().levels("error,info"));
    let messages: Vec<&str> = logs.iter().map(|e| e.message.as_str()).collect();
    assert_eq!(messages, vec!["fail", "ok"]);
}

#[test]
fn test_category_wildcard_is_prefix() {
    let logger = Logger::new();
    for category in ["system", "system.web", "systemx", "app"] {
        logger.log(category, LogLevel::Info, category);
    }
    let logs = logger.get_logs(&LogFilter::new().categories("system.*"));
    let categories: Vec<&str> = logs.iter().map(|e| e.category.as_str()).collect();
    assert_eq!(categories, vec!["system", "system.web", "systemx"]);
}

#[test]
fn test_end_of_application_writes_file() {
    let dir = TempDir::new().unwrap();
    let mut app = file_route_app(&dir, json!({}));

    app.log("disk almost full", LogLevel::Warning, "storage");
    app.log("just chatting", LogLevel::Info, "storage");
    app.log("write failed", LogLevel::Error, "storage.db");
    app.end(0);

    let text = fs::read_to_string(dir.path().join("logs").join("application.log")).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].ends_with("[warning] [storage] disk almost full"));
    assert!(lines[1].ends_with("[error] [storage.db] write failed"));
}

#[test]
fn test_auto_flush_without_dump_defers_output() {
    let dir = TempDir::new().unwrap();
    let mut app = file_route_app(&dir, json!({}));
    app.logger().set_auto_flush(2);

    app.log("first", LogLevel::Error, "app");
    app.log("second", LogLevel::Error, "app");
    assert_eq!(app.logger().log_count(), 0);

    let log_file = dir.path().join("logs").join("application.log");
    assert!(!log_file.exists());

    let pending = app
        .component::<LogRouter>("log")
        .unwrap()
        .unwrap()
        .with_route::<FileLogRoute, _>(0, |route| {
            use trellis_common::logging::LogRoute;
            route.state().logs.len()
        });
    assert_eq!(pending, Some(2));

    app.end(0);
    assert_eq!(fs::read_to_string(&log_file).unwrap().lines().count(), 2);
}

#[test]
fn test_auto_dump_writes_on_threshold() {
    let dir = TempDir::new().unwrap();
    let app = file_route_app(&dir, json!({}));
    app.logger().set_auto_flush(1);
    app.logger().set_auto_dump(true);

    app.log("immediate", LogLevel::Error, "app");
    let text = fs::read_to_string(dir.path().join("logs").join("application.log")).unwrap();
    assert!(text.contains("immediate"));
}

#[test]
fn test_disabled_route_is_skipped() {
    let dir = TempDir::new().unwrap();
    let mut app = file_route_app(&dir, json!({"enabled": false}));
    app.log("nobody hears this", LogLevel::Error, "app");
    app.end(0);
    assert!(!dir.path().join("logs").join("application.log").exists());
}

#[test]
fn test_rotation_shifts_backups() {
    let dir = TempDir::new().unwrap();
    let logs = dir.path().join("logs");
    fs::create_dir_all(&logs).unwrap();
    let live = logs.join("application.log");
    fs::write(&live, "live").unwrap();
    for index in 1..=3 {
        fs::write(logs.join(format!("application.log.{}", index)), index.to_string()).unwrap();
    }

    let mut app = file_route_app(&dir, json!({"maxLogFiles": 3, "maxFileSize": 1}));
    fs::write(&live, "x".repeat(2048)).unwrap();

    app.log("after rotation", LogLevel::Error, "app");
    app.end(0);

    assert_eq!(fs::read_to_string(logs.join("application.log.3")).unwrap(), "2");
    assert_eq!(fs::read_to_string(logs.join("application.log.2")).unwrap(), "1");
    assert_eq!(
        fs::read_to_string(logs.join("application.log.1")).unwrap().len(),
        2048
    );
    let fresh = fs::read_to_string(&live).unwrap();
    assert!(fresh.contains("after rotation"));
    assert_eq!(fresh.lines().count(), 1);
}

#[test]
fn test_router_rejects_non_route_class() {
    let dir = TempDir::new().unwrap();
    let mut config = AppConfig::default().with_base_path(dir.path()).with_component(
        "log",
        ComponentConfig::new("LogRouter").with("routes", json!([{"class": "MemoryCache"}])),
    );
    config.preload = vec!["log".to_string()];
    assert!(Application::new(Framework::new(), config).is_err());
}

#[test]
fn test_replaced_router_stops_writing() {
    let dir = TempDir::new().unwrap();
    let mut app = file_route_app(&dir, json!({}));
    let log_file = dir.path().join("logs").join("application.log");

    app.set_component(
        "log",
        Some(ComponentSpec::Config(ComponentConfig::new("MemoryCache"))),
        true,
    )
    .unwrap();
    assert_eq!(app.logger().observer_count(), 0);

    app.log("after the router is gone", LogLevel::Error, "app");
    app.logger().flush(true);
    app.end(0);
    assert!(!log_file.exists());
}
