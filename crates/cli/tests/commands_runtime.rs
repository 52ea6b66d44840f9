use std::env;
use std::sync::{Mutex, OnceLock};

use serde_json::Value;
use storefront_cli::commands::recommend::RecommendArgs;
use storefront_cli::commands::{config, doctor, migrate, recommend, seed};
use tempfile::TempDir;

#[test]
fn migrate_returns_success_with_valid_env() {
    with_env(&[("STOREFRONT_DATABASE_URL", "sqlite::memory:")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 0, "expected successful migrate run");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "ok");
    });
}

#[test]
fn migrate_returns_config_failure_for_non_sqlite_url() {
    with_env(&[("STOREFRONT_DATABASE_URL", "postgres://localhost/storefront")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn seed_loads_sample_catalog() {
    with_env(&[("STOREFRONT_DATABASE_URL", "sqlite::memory:")], || {
        let result = seed::run();
        assert_eq!(result.exit_code, 0, "expected seed success");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "seed");
        assert_eq!(
            payload["message"],
            "sample catalog loaded: 5 categories and 15 products inserted"
        );
    });
}

#[test]
fn seed_is_idempotent_across_runs() {
    let dir = TempDir::new().expect("temp dir");
    let url = database_url(&dir);

    with_env(&[("STOREFRONT_DATABASE_URL", url.as_str())], || {
        assert_eq!(seed::run().exit_code, 0, "expected first seed invocation success");

        let second = seed::run();
        assert_eq!(second.exit_code, 0, "expected second seed invocation success");
        let payload = parse_payload(&second.output);
        assert_eq!(payload["message"], "sample catalog already present; nothing inserted");
    });
}

#[test]
fn recommend_ranks_same_category_first_on_sample_catalog() {
    let dir = TempDir::new().expect("temp dir");
    let url = database_url(&dir);

    with_env(&[("STOREFRONT_DATABASE_URL", url.as_str())], || {
        assert_eq!(seed::run().exit_code, 0, "expected seed success");

        let result = recommend::run(RecommendArgs {
            product_slug: "smart-watch".to_string(),
            user_id: None,
            limit: Some(3),
            seed: Some(7),
        });
        assert_eq!(result.exit_code, 0, "expected recommend success: {}", result.output);

        let payload = parse_payload(&result.output);
        let items = payload["data"]["recommendations"].as_array().cloned().unwrap_or_default();
        assert_eq!(items.len(), 3);
        assert_eq!(items[0]["slug"], "smartphone-pro-x");
        assert_eq!(items[0]["stage"], "same_category");
        assert_eq!(items[1]["slug"], "wireless-earbuds");
        assert_eq!(items[2]["stage"], "random");
        assert!(items.iter().all(|item| item["slug"] != "smart-watch"));
    });
}

#[test]
fn recommend_clamps_limit_to_configured_maximum() {
    let dir = TempDir::new().expect("temp dir");
    let url = database_url(&dir);

    with_env(
        &[
            ("STOREFRONT_DATABASE_URL", url.as_str()),
            ("STOREFRONT_RECOMMENDATIONS_MAX_LIMIT", "6"),
        ],
        || {
            assert_eq!(seed::run().exit_code, 0, "expected seed success");

            let result = recommend::run(RecommendArgs {
                product_slug: "yoga-mat".to_string(),
                user_id: Some(1),
                limit: Some(50),
                seed: Some(1),
            });
            let payload = parse_payload(&result.output);
            assert_eq!(payload["data"]["limit"], 6);
            assert_eq!(payload["data"]["recommendations"].as_array().map(Vec::len), Some(6));
        },
    );
}

#[test]
fn recommend_reports_unknown_product() {
    with_env(&[("STOREFRONT_DATABASE_URL", "sqlite::memory:")], || {
        let result = recommend::run(RecommendArgs {
            product_slug: "does-not-exist".to_string(),
            user_id: None,
            limit: None,
            seed: None,
        });
        assert_eq!(result.exit_code, 7);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["error_class"], "product_not_found");
    });
}

#[test]
fn doctor_flags_unmigrated_database() {
    with_env(&[("STOREFRONT_DATABASE_URL", "sqlite::memory:")], || {
        let result = doctor::run(true);
        assert_eq!(result.exit_code, 6);

        let report = parse_payload(&result.output);
        assert_eq!(report["overall_status"], "fail");
        let checks = report["checks"].as_array().cloned().unwrap_or_default();
        let schema = checks.iter().find(|check| check["name"] == "schema_readiness");
        assert_eq!(schema.map(|check| check["status"].clone()), Some(Value::from("fail")));
    });
}

#[test]
fn doctor_passes_after_migrate() {
    let dir = TempDir::new().expect("temp dir");
    let url = database_url(&dir);

    with_env(&[("STOREFRONT_DATABASE_URL", url.as_str())], || {
        assert_eq!(migrate::run().exit_code, 0);

        let result = doctor::run(false);
        assert_eq!(result.exit_code, 0, "doctor output: {}", result.output);
        assert!(result.output.starts_with("doctor: all readiness checks passed"));
    });
}

#[test]
fn config_attributes_env_sources() {
    with_env(
        &[("STOREFRONT_DATABASE_URL", "sqlite::memory:"), ("STOREFRONT_LOG_LEVEL", "debug")],
        || {
            let output = config::run();

            assert!(output.contains(
                "- database.url = sqlite::memory: (source: env (STOREFRONT_DATABASE_URL))"
            ));
            assert!(
                output.contains("- logging.level = debug (source: env (STOREFRONT_LOG_LEVEL))")
            );
            assert!(output.contains("- recommendations.default_limit = 5 (source: default)"));
        },
    );
}

fn database_url(dir: &TempDir) -> String {
    format!("sqlite://{}", dir.path().join("storefront.db").display())
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).unwrap_or_else(|error| {
        panic!("command output should be JSON ({error}): {output}");
    })
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "STOREFRONT_DATABASE_URL",
        "STOREFRONT_DATABASE_MAX_CONNECTIONS",
        "STOREFRONT_DATABASE_TIMEOUT_SECS",
        "STOREFRONT_SERVER_BIND_ADDRESS",
        "STOREFRONT_SERVER_PORT",
        "STOREFRONT_SERVER_GRACEFUL_SHUTDOWN_SECS",
        "STOREFRONT_RECOMMENDATIONS_DEFAULT_LIMIT",
        "STOREFRONT_RECOMMENDATIONS_MAX_LIMIT",
        "STOREFRONT_LOGGING_LEVEL",
        "STOREFRONT_LOGGING_FORMAT",
        "STOREFRONT_LOG_LEVEL",
        "STOREFRONT_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
