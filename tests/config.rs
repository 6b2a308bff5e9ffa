// ABOUTME: Integration tests for configuration parsing and validation.
// ABOUTME: Tests YAML parsing, env var interpolation, file discovery, and BLUEGREEN_* overrides.

use bluegreen::config::*;
use bluegreen::error::Error;
use std::collections::HashMap;
use std::time::Duration;
use tempfile::TempDir;

fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key| vars.get(key).cloned()
}

mod parsing {
    use super::*;

    #[test]
    fn parse_minimal_config() {
        let yaml = r#"
app: shop
image: ghcr.io/acme/shop
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.app.as_str(), "shop");
        assert_eq!(config.image.repository(), "ghcr.io/acme/shop");
        assert_eq!(config.namespace, "default");
        assert_eq!(config.replicas, 2);
        assert_eq!(config.port, 8080);
        assert_eq!(config.policy, DeployPolicy::default());
    }

    #[test]
    fn parse_full_config() {
        let yaml = r#"
app: shop
namespace: payments
image: ghcr.io/acme/shop
replicas: 4
port: 3000
service_port: 443

resources:
  cpu: "1"
  memory: 1Gi

env:
  RUST_LOG: info

labels:
  team: checkout

probes:
  liveness:
    path: /livez
    initial_delay: 15s
    period: 5s

health_command: ["wget", "-qO-", "http://localhost:3000/health"]

policy:
  readiness_timeout: 10m
  settle_delay: 5s
  soak: 1m
  error_threshold: 2
  log_lines: 500

lock:
  ttl: 30m
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.namespace, "payments");
        assert_eq!(config.replicas, 4);
        assert_eq!(config.service_port, 443);
        assert_eq!(config.resources.memory.as_deref(), Some("1Gi"));
        assert_eq!(config.labels.get("team").map(String::as_str), Some("checkout"));
        assert_eq!(config.probes.liveness.path, "/livez");
        assert_eq!(config.probes.readiness.path, "/ready");
        assert_eq!(config.health_command()[0], "wget");
        assert_eq!(config.policy.readiness_timeout, Duration::from_secs(600));
        assert_eq!(config.policy.soak, Duration::from_secs(60));
        assert_eq!(config.policy.error_threshold, 2);
        assert_eq!(config.policy.log_lines, 500);
        assert_eq!(config.lock.ttl, Duration::from_secs(1800));
    }

    #[test]
    fn default_health_command_hits_liveness_path() {
        let config = Config::from_yaml("app: shop\nimage: shop\nport: 9000\n").unwrap();
        assert_eq!(
            config.health_command(),
            vec!["curl", "-fsS", "http://localhost:9000/health"]
        );
    }

    #[test]
    fn missing_app_returns_error() {
        let result = Config::from_yaml("image: nginx\n");
        assert!(result.is_err());
    }

    #[test]
    fn invalid_app_name_returns_error() {
        let result = Config::from_yaml("app: Shop_App\nimage: nginx\n");
        assert!(result.is_err());
    }

    #[test]
    fn invalid_image_returns_error() {
        let result = Config::from_yaml("app: shop\nimage: \"bad image!\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn zero_replicas_rejected() {
        let result = Config::from_yaml("app: shop\nimage: nginx\nreplicas: 0\n");
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn managed_labels_rejected() {
        let yaml = "app: shop\nimage: nginx\nlabels:\n  color: red\n";
        let result = Config::from_yaml(yaml);
        assert!(matches!(result, Err(Error::InvalidConfig(msg)) if msg.contains("color")));
    }

    #[test]
    fn empty_health_command_rejected() {
        let yaml = "app: shop\nimage: nginx\nhealth_command: []\n";
        assert!(matches!(Config::from_yaml(yaml), Err(Error::InvalidConfig(_))));
    }
}

mod policy {
    use super::*;

    fn with_policy(policy: &str) -> Result<Config, Error> {
        Config::from_yaml(&format!(
            "app: shop\nimage: ghcr.io/acme/shop\npolicy:\n{policy}"
        ))
    }

    fn rejected(policy: &str, field: &str) {
        match with_policy(policy) {
            Err(Error::InvalidConfig(msg)) => assert!(msg.contains(field), "{msg}"),
            other => panic!("expected InvalidConfig for {field}, got {other:?}"),
        }
    }

    #[test]
    fn all_zero_policy_rejected() {
        let result = with_policy("  log_lines: 0\n  poll_interval: 0s\n  deadline: 0s\n  call_timeout: 0s\n");
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn zero_durations_rejected() {
        rejected("  deadline: 0s\n  readiness_timeout: 0s\n", "deadline");
        rejected("  call_timeout: 0s\n", "call_timeout");
        rejected("  poll_interval: 0s\n", "poll_interval");
    }

    #[test]
    fn zero_log_lines_rejected() {
        rejected("  log_lines: 0\n", "log_lines");
    }

    #[test]
    fn readiness_longer_than_deadline_rejected() {
        rejected("  readiness_timeout: 40m\n  deadline: 30m\n", "readiness_timeout");
    }

    #[test]
    fn zero_soak_and_settle_are_allowed() {
        let config = with_policy("  soak: 0s\n  settle_delay: 0s\n").unwrap();
        assert!(config.policy.soak.is_zero());
    }
}

mod env_vars {
    use super::*;

    #[test]
    fn literal_value() {
        let yaml = r#"
app: shop
image: nginx
env:
  KEY: "value"
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(
            config.env.get("KEY"),
            Some(&EnvValue::Literal("value".to_string()))
        );
    }

    #[test]
    fn env_reference_with_default() {
        let yaml = r#"
app: shop
image: nginx
env:
  OPTIONAL:
    env: OPTIONAL_VAR
    default: "fallback"
"#;
        let config = Config::from_yaml(yaml).unwrap();
        match config.env.get("OPTIONAL") {
            Some(EnvValue::FromEnv {
                var,
                default: Some(def),
            }) => {
                assert_eq!(var, "OPTIONAL_VAR");
                assert_eq!(def, "fallback");
            }
            _ => panic!("Expected FromEnv with default"),
        }
    }

    #[test]
    fn resolve_env_values() {
        let mut env_map = HashMap::new();
        env_map.insert("KEY".to_string(), EnvValue::Literal("literal".to_string()));
        env_map.insert(
            "FROM_ENV".to_string(),
            EnvValue::FromEnv {
                var: "BLUEGREEN_TEST_VAR".to_string(),
                default: None,
            },
        );
        env_map.insert(
            "WITH_DEFAULT".to_string(),
            EnvValue::FromEnv {
                var: "BLUEGREEN_MISSING_VAR".to_string(),
                default: Some("default_value".to_string()),
            },
        );

        temp_env::with_vars(
            [
                ("BLUEGREEN_TEST_VAR", Some("from_environment")),
                ("BLUEGREEN_MISSING_VAR", None),
            ],
            || {
                let resolved = resolve_env_map(&env_map).unwrap();

                assert_eq!(resolved.get("KEY").map(String::as_str), Some("literal"));
                assert_eq!(
                    resolved.get("FROM_ENV").map(String::as_str),
                    Some("from_environment")
                );
                assert_eq!(
                    resolved.get("WITH_DEFAULT").map(String::as_str),
                    Some("default_value")
                );
            },
        );
    }

    #[test]
    fn unresolved_reference_fails_workload_template() {
        let yaml = r#"
app: shop
image: nginx
env:
  DATABASE_URL:
    env: BLUEGREEN_TEST_DATABASE_URL
"#;
        let config = Config::from_yaml(yaml).unwrap();
        temp_env::with_var_unset("BLUEGREEN_TEST_DATABASE_URL", || {
            let result = config.workload_template();
            assert!(matches!(result, Err(Error::MissingEnvVar(var)) if var == "BLUEGREEN_TEST_DATABASE_URL"));
        });
    }
}

mod overrides {
    use super::*;

    #[test]
    fn env_overrides_file_values() {
        let config = Config::from_yaml("app: shop\nimage: nginx\n").unwrap();
        let lookup = lookup_from(&[
            (ENV_NAMESPACE, "staging"),
            (ENV_IMAGE, "ghcr.io/acme/shop"),
            (ENV_REPLICAS, "3"),
        ]);

        let config = config.with_env_overrides(&lookup).unwrap();
        assert_eq!(config.app.as_str(), "shop");
        assert_eq!(config.namespace, "staging");
        assert_eq!(config.image.repository(), "ghcr.io/acme/shop");
        assert_eq!(config.replicas, 3);
    }

    #[test]
    fn non_numeric_replicas_rejected() {
        let config = Config::from_yaml("app: shop\nimage: nginx\n").unwrap();
        let lookup = lookup_from(&[(ENV_REPLICAS, "many")]);
        assert!(matches!(
            config.with_env_overrides(&lookup),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn env_alone_builds_config() {
        let lookup = lookup_from(&[(ENV_APP, "billing"), (ENV_IMAGE, "billing")]);
        let config = Config::from_env_with(&lookup).unwrap().unwrap();
        assert_eq!(config.app.as_str(), "billing");
        assert_eq!(config.namespace, "default");
    }

    #[test]
    fn env_without_image_builds_nothing() {
        let lookup = lookup_from(&[(ENV_APP, "billing")]);
        assert!(Config::from_env_with(&lookup).is_none());
    }
}

mod discovery {
    use super::*;

    const CLEARED: [(&str, Option<&str>); 4] = [
        (ENV_APP, None),
        (ENV_NAMESPACE, None),
        (ENV_IMAGE, None),
        (ENV_REPLICAS, None),
    ];

    #[test]
    fn finds_primary_file() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILENAME), "app: shop\nimage: nginx\n").unwrap();

        let config = Config::discover(dir.path()).unwrap();
        assert_eq!(config.app.as_str(), "shop");
    }

    #[test]
    fn finds_config_in_dot_directory() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join(".bluegreen")).unwrap();
        std::fs::write(dir.path().join(CONFIG_FILENAME_DIR), "app: shop\nimage: nginx\n").unwrap();

        assert!(Config::find(dir.path()).is_some());
    }

    #[test]
    fn resolve_without_file_or_env_fails() {
        let dir = TempDir::new().unwrap();
        temp_env::with_vars(CLEARED, || {
            let result = Config::resolve(dir.path(), None);
            assert!(matches!(result, Err(Error::ConfigNotFound(_))));
        });
    }

    #[test]
    fn explicit_path_wins_over_discovery() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILENAME), "app: shop\nimage: nginx\n").unwrap();
        let explicit = dir.path().join("other.yml");
        std::fs::write(&explicit, "app: billing\nimage: nginx\n").unwrap();

        temp_env::with_vars(CLEARED, || {
            let config = Config::resolve(dir.path(), Some(&explicit)).unwrap();
            assert_eq!(config.app.as_str(), "billing");
        });
    }
}

mod init {
    use super::*;

    #[test]
    fn init_writes_loadable_template() {
        let dir = TempDir::new().unwrap();
        init_config(dir.path(), Some("shop"), Some("ghcr.io/acme/shop"), false).unwrap();

        let config = Config::discover(dir.path()).unwrap();
        assert_eq!(config.app.as_str(), "shop");
        assert_eq!(config.image.repository(), "ghcr.io/acme/shop");
        assert_eq!(config.policy.error_threshold, 5);
    }

    #[test]
    fn init_refuses_to_overwrite() {
        let dir = TempDir::new().unwrap();
        init_config(dir.path(), None, None, false).unwrap();

        let result = init_config(dir.path(), None, None, false);
        assert!(matches!(result, Err(Error::AlreadyExists(_))));
        init_config(dir.path(), None, None, true).unwrap();
    }
}
