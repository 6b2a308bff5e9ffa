// ABOUTME: Test support utilities.
// ABOUTME: Provides an in-memory cluster, test clocks, and shared fixtures.

use std::sync::Once;

// Each test binary only uses some of these modules, so allow dead_code.
#[allow(dead_code)]
pub mod clock;
#[allow(dead_code)]
pub mod fake_cluster;

use bluegreen::config::{DeployPolicy, ProbeConfig};
use bluegreen::deploy::DeploySettings;
use bluegreen::types::{AppName, ImageRef, Version};

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for tests. Safe to call multiple times.
#[allow(dead_code)]
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::EnvFilter;
        let filter = EnvFilter::from_default_env()
            .add_directive("bluegreen=debug".parse().unwrap());
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

#[allow(dead_code)]
pub fn app() -> AppName {
    AppName::new("shop").unwrap()
}

#[allow(dead_code)]
pub fn version(v: &str) -> Version {
    Version::new(v).unwrap()
}

/// Settings with the default policy for the `shop` app.
#[allow(dead_code)]
pub fn settings() -> DeploySettings {
    DeploySettings {
        app: app(),
        image: ImageRef::parse("ghcr.io/acme/shop").unwrap(),
        replicas: 2,
        probes: ProbeConfig::default(),
        policy: DeployPolicy::default(),
    }
}
