//! Shared test utilities for the s3clean library crate.

use crate::config::Config;
use crate::types::{ObjectIdentifier, ObjectIdentifierSet};

/// Initialise a dummy tracing subscriber for tests.
///
/// Uses `try_init` so that only the first call in a process actually
/// installs the subscriber; subsequent calls are silently ignored.
pub(crate) fn init_dummy_tracing_subscriber() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("dummy=trace")
        .try_init();
}

/// Create a [`Config`] suitable for most unit tests.
///
/// Key defaults: `worker_size=4`, `batch_size=1000`, a single-attempt retry
/// policy, no client config.
pub(crate) fn make_test_config() -> Config {
    let mut config = Config::default();
    config.worker_size = 4;
    config.retry_policy_config.max_attempts = 1;
    config.retry_policy_config.max_delay_secs = 1;
    config
}

/// Build an identifier set of `count` unversioned keys `key-00000`, ...
pub(crate) fn make_identifier_set(count: usize) -> ObjectIdentifierSet {
    let mut set = ObjectIdentifierSet::new();
    for i in 0..count {
        set.add(ObjectIdentifier::new(format!("key-{i:05}")))
            .expect("generated keys are never empty");
    }
    set
}
