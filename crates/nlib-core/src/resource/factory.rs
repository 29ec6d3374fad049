// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Pluggable resource-type factory registry (§6).
//!
//! This crate ships the trait object and registry only; concrete
//! factories (file system, archive format, codec, ...) are the
//! embedding application's job.

use std::any::Any;
use std::sync::Arc;

use crate::error::ResourceError;
use crate::sync::Mutex;

/// Answers "can you create a resource from this path?" and, if so,
/// instantiates one as a type-erased value.
pub trait ResourceFactory: Send + Sync {
    fn type_name(&self) -> &str;
    fn supports(&self, path: &str) -> bool;
    fn create(&self, path: &str) -> Result<Box<dyn Any + Send + Sync>, ResourceError>;
}

/// Ordered list of registered factories, queried first-match-wins.
pub struct FactoryRegistry {
    factories: Mutex<Vec<Arc<dyn ResourceFactory>>>,
}

impl FactoryRegistry {
    pub fn new() -> Self {
        Self {
            factories: Mutex::new(Vec::new()),
        }
    }

    pub fn register(&self, factory: Arc<dyn ResourceFactory>) {
        self.factories.lock().push(factory);
    }

    pub fn unregister(&self, type_name: &str) -> bool {
        let mut factories = self.factories.lock();
        let before = factories.len();
        factories.retain(|f| f.type_name() != type_name);
        factories.len() != before
    }

    pub fn find(&self, path: &str) -> Option<Arc<dyn ResourceFactory>> {
        self.factories.lock().iter().find(|f| f.supports(path)).cloned()
    }

    pub fn create(&self, path: &str) -> Result<Box<dyn Any + Send + Sync>, ResourceError> {
        match self.find(path) {
            Some(factory) => factory.create(path),
            None => Err(ResourceError::NoFactory(path.to_string())),
        }
    }
}

impl Default for FactoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}
