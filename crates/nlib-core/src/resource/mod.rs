// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Dependency-gated resource load/unload state machine (§4.8).
//!
//! Grounded in the same clone-out-then-call registry pattern as
//! [`crate::events::handler`]: each multicast delegate list lives
//! behind one `Mutex`, cloned out before invocation so a delegate that
//! re-registers or triggers a nested load doesn't deadlock.

mod factory;

pub use factory::{FactoryRegistry, ResourceFactory};

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::error::ResourceError;
use crate::scheduler::{Scheduler, TaskPriority};
use crate::sync::Mutex;
use crate::task::{Future, Task};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceState {
    Unloaded,
    Loading,
    Loaded,
    Unloading,
    Failed,
}

/// Load priority, mirroring the original's `EResourcePriority`. Purely
/// informational at this layer — the resource manager doesn't itself
/// schedule by priority; an embedder wiring loads onto a
/// [`Scheduler`](crate::scheduler::Scheduler) maps this to a
/// [`TaskPriority`](crate::scheduler::TaskPriority).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum ResourcePriority {
    Low,
    #[default]
    Normal,
    High,
    Critical,
}

static NEXT_RESOURCE_ID: AtomicU64 = AtomicU64::new(1);

type Delegate = Arc<dyn Fn(&Resource) + Send + Sync>;

struct DelegateSet {
    next_token: AtomicU64,
    entries: Mutex<Vec<(u64, Delegate)>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelegateToken(u64);

impl DelegateSet {
    fn new() -> Self {
        Self {
            next_token: AtomicU64::new(1),
            entries: Mutex::new(Vec::new()),
        }
    }

    fn register(&self, delegate: impl Fn(&Resource) + Send + Sync + 'static) -> DelegateToken {
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        self.entries.lock().push((token, Arc::new(delegate)));
        DelegateToken(token)
    }

    fn unregister(&self, token: DelegateToken) -> bool {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|(t, _)| *t != token.0);
        entries.len() != before
    }

    fn invoke(&self, resource: &Resource) {
        let delegates: Vec<Delegate> = self.entries.lock().iter().map(|(_, d)| d.clone()).collect();
        for delegate in delegates {
            delegate(resource);
        }
    }
}

type Loader = Box<dyn FnMut() -> Result<(), String> + Send>;
type Unloader = Box<dyn FnMut() -> Result<(), String> + Send>;

/// A single loadable resource: its identity, path, type tag, priority,
/// reported footprint, tags/metadata, dependency set, and the
/// load/unload closures that perform the actual work.
pub struct Resource {
    id: u64,
    path: String,
    name: String,
    type_tag: &'static str,
    dependencies: Vec<Arc<Resource>>,
    state: Mutex<ResourceState>,
    priority: Mutex<ResourcePriority>,
    memory_usage: Mutex<usize>,
    disk_size: Mutex<usize>,
    last_error: Mutex<Option<String>>,
    last_access: Mutex<Instant>,
    tags: Mutex<Vec<String>>,
    metadata: Mutex<std::collections::HashMap<String, String>>,
    loader: Mutex<Loader>,
    unloader: Mutex<Unloader>,
    on_loaded: DelegateSet,
    on_unloaded: DelegateSet,
    on_load_failed: DelegateSet,
    on_reloaded: DelegateSet,
}

impl Resource {
    pub fn new(
        path: impl Into<String>,
        dependencies: Vec<Arc<Resource>>,
        loader: impl FnMut() -> Result<(), String> + Send + 'static,
        unloader: impl FnMut() -> Result<(), String> + Send + 'static,
    ) -> Arc<Self> {
        Self::with_type(path, "Unknown", dependencies, loader, unloader)
    }

    /// Like [`Resource::new`], additionally stamping a type tag (the
    /// original's `GetResourceTypeName`) at construction instead of
    /// through a virtual override.
    pub fn with_type(
        path: impl Into<String>,
        type_tag: &'static str,
        dependencies: Vec<Arc<Resource>>,
        loader: impl FnMut() -> Result<(), String> + Send + 'static,
        unloader: impl FnMut() -> Result<(), String> + Send + 'static,
    ) -> Arc<Self> {
        let path = path.into();
        let name = path.rsplit('/').next().unwrap_or(&path).to_string();
        Arc::new(Self {
            id: NEXT_RESOURCE_ID.fetch_add(1, Ordering::Relaxed),
            path,
            name,
            type_tag,
            dependencies,
            state: Mutex::new(ResourceState::Unloaded),
            priority: Mutex::new(ResourcePriority::Normal),
            memory_usage: Mutex::new(0),
            disk_size: Mutex::new(0),
            last_error: Mutex::new(None),
            last_access: Mutex::new(Instant::now()),
            tags: Mutex::new(Vec::new()),
            metadata: Mutex::new(std::collections::HashMap::new()),
            loader: Mutex::new(Box::new(loader)),
            unloader: Mutex::new(Box::new(unloader)),
            on_loaded: DelegateSet::new(),
            on_unloaded: DelegateSet::new(),
            on_load_failed: DelegateSet::new(),
            on_reloaded: DelegateSet::new(),
        })
    }

    /// Process-wide unique identity, assigned at construction.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_tag(&self) -> &'static str {
        self.type_tag
    }

    pub fn state(&self) -> ResourceState {
        *self.state.lock()
    }

    pub fn priority(&self) -> ResourcePriority {
        *self.priority.lock()
    }

    pub fn set_priority(&self, priority: ResourcePriority) {
        *self.priority.lock() = priority;
    }

    /// Reported memory footprint in bytes, as last set by the loader
    /// via [`Resource::set_memory_usage`]. Not measured automatically.
    pub fn memory_usage(&self) -> usize {
        *self.memory_usage.lock()
    }

    pub fn set_memory_usage(&self, bytes: usize) {
        *self.memory_usage.lock() = bytes;
    }

    /// Reported on-disk size in bytes, as last set by the loader via
    /// [`Resource::set_disk_size`]. Not measured automatically.
    pub fn disk_size(&self) -> usize {
        *self.disk_size.lock()
    }

    pub fn set_disk_size(&self, bytes: usize) {
        *self.disk_size.lock() = bytes;
    }

    /// Number of live external handles to this resource. Backed by
    /// `Arc::strong_count` rather than a stored field, so it reflects
    /// only references external to the resource's own internal state
    /// (dependency edges hold their targets by `Arc` too, but those
    /// come from the dependent's `dependencies` list, which is itself
    /// external from this resource's point of view).
    pub fn reference_count(self: &Arc<Self>) -> usize {
        Arc::strong_count(self)
    }

    pub fn dependencies(&self) -> &[Arc<Resource>] {
        &self.dependencies
    }

    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().clone()
    }

    pub fn last_access(&self) -> Instant {
        *self.last_access.lock()
    }

    pub fn tags(&self) -> Vec<String> {
        self.tags.lock().clone()
    }

    pub fn add_tag(&self, tag: impl Into<String>) {
        let tag = tag.into();
        let mut tags = self.tags.lock();
        if !tags.contains(&tag) {
            tags.push(tag);
        }
    }

    pub fn remove_tag(&self, tag: &str) -> bool {
        let mut tags = self.tags.lock();
        let before = tags.len();
        tags.retain(|t| t != tag);
        tags.len() != before
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.lock().iter().any(|t| t == tag)
    }

    pub fn metadata(&self, key: &str) -> Option<String> {
        self.metadata.lock().get(key).cloned()
    }

    pub fn set_metadata(&self, key: impl Into<String>, value: impl Into<String>) {
        self.metadata.lock().insert(key.into(), value.into());
    }

    pub fn remove_metadata(&self, key: &str) -> Option<String> {
        self.metadata.lock().remove(key)
    }

    pub fn all_metadata(&self) -> std::collections::HashMap<String, String> {
        self.metadata.lock().clone()
    }

    fn touch(&self) {
        *self.last_access.lock() = Instant::now();
    }

    pub fn on_loaded(&self, delegate: impl Fn(&Resource) + Send + Sync + 'static) -> DelegateToken {
        self.on_loaded.register(delegate)
    }

    pub fn on_unloaded(&self, delegate: impl Fn(&Resource) + Send + Sync + 'static) -> DelegateToken {
        self.on_unloaded.register(delegate)
    }

    pub fn on_load_failed(&self, delegate: impl Fn(&Resource) + Send + Sync + 'static) -> DelegateToken {
        self.on_load_failed.register(delegate)
    }

    pub fn on_reloaded(&self, delegate: impl Fn(&Resource) + Send + Sync + 'static) -> DelegateToken {
        self.on_reloaded.register(delegate)
    }

    pub fn unregister(&self, token: DelegateToken) -> bool {
        self.on_loaded.unregister(token)
            || self.on_unloaded.unregister(token)
            || self.on_load_failed.unregister(token)
            || self.on_reloaded.unregister(token)
    }

    /// Idempotent load: already-`Loaded` returns `Ok(true)` and bumps
    /// last-access; `Loading` elsewhere returns `Ok(false)` with a
    /// warning; a missing dependency or a failing loader transitions to
    /// `Failed` and returns `Err`.
    pub fn load(&self) -> Result<bool, ResourceError> {
        {
            let mut state = self.state.lock();
            match *state {
                ResourceState::Loaded => {
                    drop(state);
                    self.touch();
                    return Ok(true);
                }
                ResourceState::Loading => {
                    tracing::warn!(resource = %self.name, "load already in progress on another thread");
                    return Ok(false);
                }
                _ => *state = ResourceState::Loading,
            }
        }

        for dep in &self.dependencies {
            if dep.state() != ResourceState::Loaded {
                let err = ResourceError::DependencyNotLoaded(dep.name.clone());
                *self.last_error.lock() = Some(err.to_string());
                *self.state.lock() = ResourceState::Failed;
                self.on_load_failed.invoke(self);
                return Err(err);
            }
        }

        let outcome = (self.loader.lock())();
        match outcome {
            Ok(()) => {
                *self.state.lock() = ResourceState::Loaded;
                self.touch();
                self.on_loaded.invoke(self);
                Ok(true)
            }
            Err(message) => {
                *self.last_error.lock() = Some(message.clone());
                *self.state.lock() = ResourceState::Failed;
                self.on_load_failed.invoke(self);
                Err(ResourceError::LoadFailed(message))
            }
        }
    }

    pub fn unload(&self) -> Result<bool, ResourceError> {
        {
            let mut state = self.state.lock();
            match *state {
                ResourceState::Unloaded => return Ok(true),
                ResourceState::Unloading => {
                    tracing::warn!(resource = %self.name, "unload already in progress on another thread");
                    return Ok(false);
                }
                _ => *state = ResourceState::Unloading,
            }
        }

        match (self.unloader.lock())() {
            Ok(()) => {
                *self.state.lock() = ResourceState::Unloaded;
                self.on_unloaded.invoke(self);
                Ok(true)
            }
            Err(message) => {
                *self.last_error.lock() = Some(message.clone());
                *self.state.lock() = ResourceState::Failed;
                Err(ResourceError::LoadFailed(message))
            }
        }
    }

    pub fn reload(&self) -> Result<bool, ResourceError> {
        self.unload()?;
        let result = self.load();
        if result.is_ok() {
            self.on_reloaded.invoke(self);
        }
        result
    }
}

/// Schedule [`Resource::load`]/[`unload`](Resource::unload)/
/// [`reload`](Resource::reload) on a [`Scheduler`], returning a future
/// of the outcome instead of blocking the caller.
pub struct AsyncResourceOps {
    scheduler: Arc<Scheduler>,
}

impl AsyncResourceOps {
    pub fn new(scheduler: Arc<Scheduler>) -> Self {
        Self { scheduler }
    }

    pub fn load(&self, resource: Arc<Resource>) -> Result<Future<Result<bool, ResourceError>>, crate::error::ScheduleError> {
        let task = Arc::new(Task::new(move |_token| resource.load()));
        let future = task.future();
        self.scheduler.schedule(task, TaskPriority::Normal)?;
        Ok(future)
    }

    pub fn unload(&self, resource: Arc<Resource>) -> Result<Future<Result<bool, ResourceError>>, crate::error::ScheduleError> {
        let task = Arc::new(Task::new(move |_token| resource.unload()));
        let future = task.future();
        self.scheduler.schedule(task, TaskPriority::Normal)?;
        Ok(future)
    }

    pub fn reload(&self, resource: Arc<Resource>) -> Result<Future<Result<bool, ResourceError>>, crate::error::ScheduleError> {
        let task = Arc::new(Task::new(move |_token| resource.reload()));
        let future = task.future();
        self.scheduler.schedule(task, TaskPriority::Normal)?;
        Ok(future)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::Outcome;

    #[test]
    fn load_is_idempotent_and_bumps_last_access() {
        let calls = Arc::new(AtomicU64::new(0));
        let calls2 = calls.clone();
        let resource = Resource::new(
            "db",
            vec![],
            move || {
                calls2.fetch_add(1, Ordering::SeqCst);
                Ok(())
            },
            || Ok(()),
        );
        assert_eq!(resource.load().unwrap(), true);
        assert_eq!(resource.load().unwrap(), true);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(resource.state(), ResourceState::Loaded);
    }

    #[test]
    fn load_fails_when_dependency_not_loaded() {
        let dep = Resource::new("config", vec![], || Ok(()), || Ok(()));
        let resource = Resource::new("db", vec![dep], || Ok(()), || Ok(()));
        let err = resource.load().unwrap_err();
        assert!(matches!(err, ResourceError::DependencyNotLoaded(_)));
        assert_eq!(resource.state(), ResourceState::Failed);
    }

    #[test]
    fn load_succeeds_once_dependency_is_loaded() {
        let dep = Resource::new("config", vec![], || Ok(()), || Ok(()));
        dep.load().unwrap();
        let resource = Resource::new("db", vec![dep], || Ok(()), || Ok(()));
        assert_eq!(resource.load().unwrap(), true);
    }

    #[test]
    fn failing_loader_transitions_to_failed_and_invokes_delegate() {
        let failed = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let failed2 = failed.clone();
        let resource = Resource::new("asset", vec![], || Err("disk error".into()), || Ok(()));
        resource.on_load_failed(move |_r| failed2.store(true, Ordering::SeqCst));
        assert!(resource.load().is_err());
        assert_eq!(resource.state(), ResourceState::Failed);
        assert!(failed.load(Ordering::SeqCst));
    }

    #[test]
    fn reload_runs_unload_then_load_and_fires_on_reloaded() {
        let reloaded = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let reloaded2 = reloaded.clone();
        let resource = Resource::new("asset", vec![], || Ok(()), || Ok(()));
        resource.on_reloaded(move |_r| reloaded2.store(true, Ordering::SeqCst));
        resource.load().unwrap();
        assert!(resource.reload().unwrap());
        assert!(reloaded.load(Ordering::SeqCst));
    }

    #[test]
    fn async_load_resolves_via_scheduler() {
        let scheduler = Arc::new(Scheduler::new(1));
        let ops = AsyncResourceOps::new(scheduler);
        let resource = Resource::new("asset", vec![], || Ok(()), || Ok(()));
        let future = ops.load(resource).unwrap();
        match future.result() {
            Outcome::Completed(result) => assert!(matches!(*result, Ok(true))),
            _ => panic!("expected Completed"),
        }
    }

    #[test]
    fn identity_path_and_type_tag_are_set_at_construction() {
        let resource = Resource::with_type("textures/rock.png", "Texture", vec![], || Ok(()), || Ok(()));
        assert_eq!(resource.path(), "textures/rock.png");
        assert_eq!(resource.name(), "rock.png");
        assert_eq!(resource.type_tag(), "Texture");
        assert_eq!(resource.priority(), ResourcePriority::Normal);
    }

    #[test]
    fn each_resource_gets_a_distinct_id() {
        let a = Resource::new("a", vec![], || Ok(()), || Ok(()));
        let b = Resource::new("b", vec![], || Ok(()), || Ok(()));
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn tags_and_metadata_round_trip() {
        let resource = Resource::new("asset", vec![], || Ok(()), || Ok(()));
        resource.add_tag("ui");
        resource.add_tag("ui");
        assert_eq!(resource.tags(), vec!["ui".to_string()]);
        assert!(resource.has_tag("ui"));
        assert!(resource.remove_tag("ui"));
        assert!(!resource.has_tag("ui"));

        resource.set_metadata("author", "alice");
        assert_eq!(resource.metadata("author").as_deref(), Some("alice"));
        assert_eq!(resource.remove_metadata("author").as_deref(), Some("alice"));
        assert!(resource.metadata("author").is_none());
    }

    #[test]
    fn priority_and_reported_footprint_are_mutable() {
        let resource = Resource::new("asset", vec![], || Ok(()), || Ok(()));
        resource.set_priority(ResourcePriority::Critical);
        assert_eq!(resource.priority(), ResourcePriority::Critical);
        resource.set_memory_usage(4096);
        resource.set_disk_size(8192);
        assert_eq!(resource.memory_usage(), 4096);
        assert_eq!(resource.disk_size(), 8192);
    }

    #[test]
    fn reference_count_reflects_external_arc_clones() {
        let resource = Resource::new("asset", vec![], || Ok(()), || Ok(()));
        assert_eq!(resource.reference_count(), 1);
        let other = resource.clone();
        assert_eq!(resource.reference_count(), 2);
        drop(other);
        assert_eq!(resource.reference_count(), 1);
    }
}
