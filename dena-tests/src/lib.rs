/// Test utilities and helpers for Dena client testing
///
/// This crate provides an in-memory mock of the Base HTTP service plus
/// fixtures shared by the integration tests.

pub mod matcher;
pub mod mock;

pub use mock::{MockServer, MockServerBuilder, RecordedRequest};

use dena_client::Record;
use serde_json::Value;
use tracing_subscriber::EnvFilter;

/// Project id used by the fixtures
pub const TEST_PROJECT: &str = "testproj";

/// Project key for [`TEST_PROJECT`]
pub const TEST_KEY: &str = "testproj_s3cr3tValue";

/// Install a test-friendly tracing subscriber once. Honors `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Convert a `json!` object literal into a [`Record`]
///
/// Panics when `value` is not an object.
pub fn record(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {}", other),
    }
}

/// Mock data generator for testing
pub struct MockDataGenerator {
    counter: u64,
}

impl MockDataGenerator {
    /// Create a new mock data generator
    pub fn new() -> Self {
        Self { counter: 0 }
    }

    /// Generate a keyed user record and advance the counter
    pub fn next_user(&mut self) -> Record {
        self.counter += 1;
        let idx = self.counter;
        record(serde_json::json!({
            "key": format!("user{:04}", idx),
            "name": format!("user-{}", idx),
            "age": 20 + (idx % 50),
            "tags": ["generated"],
        }))
    }

    /// Generate `count` keyed user records
    pub fn users(&mut self, count: usize) -> Vec<Record> {
        (0..count).map(|_| self.next_user()).collect()
    }
}

impl Default for MockDataGenerator {
    fn default() -> Self {
        Self::new()
    }
}
