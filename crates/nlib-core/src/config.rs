// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Plain key→value fetch boundary consumed by the core.
//!
//! The layered configuration manager (merge-by-priority, hot reload,
//! file formats) lives outside this crate. Components here that want
//! a tunable read through this trait instead of depending on any
//! concrete configuration crate.

use std::collections::HashMap;

/// Read-only key→value lookup. Implemented by the external
/// configuration manager; [`StaticConfigSource`] is the only concrete
/// implementation this crate ships, for embedding and tests.
pub trait ConfigSource: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    fn get_usize(&self, key: &str) -> Option<usize> {
        self.get(key)?.parse().ok()
    }

    fn get_u64(&self, key: &str) -> Option<u64> {
        self.get(key)?.parse().ok()
    }

    fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key)?.parse().ok()
    }
}

/// A fixed, in-memory [`ConfigSource`].
#[derive(Debug, Default, Clone)]
pub struct StaticConfigSource {
    values: HashMap<String, String>,
}

impl StaticConfigSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }
}

impl ConfigSource for StaticConfigSource {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_typed_values() {
        let cfg = StaticConfigSource::new()
            .with("scheduler.workers", "4")
            .with("io.poll_timeout_ms", "250")
            .with("events.batch_mode", "true");

        assert_eq!(cfg.get_usize("scheduler.workers"), Some(4));
        assert_eq!(cfg.get_u64("io.poll_timeout_ms"), Some(250));
        assert_eq!(cfg.get_bool("events.batch_mode"), Some(true));
        assert_eq!(cfg.get("missing"), None);
    }
}
