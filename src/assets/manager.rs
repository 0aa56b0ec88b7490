//! Async load orchestrator
//!
//! `AssetManager` is owned by one thread. Workers only ever touch the
//! request they were handed and the [`CompletionQueue`]; everything else
//! (registry, loaded table, in-flight set) is mutated from `tick` and the
//! other `&mut self` entry points.

use crate::assets::importer::{ImporterTable, LoadContext};
use crate::assets::registry::AssetRegistry;
use crate::assets::request::{AsyncLoadRequest, LoadPriority};
use crate::assets::{Asset, AssetHandle, AssetMetadata, AssetState, SharedAsset};
use crate::config::PipelineConfig;
use crate::error::{AssetError, Result};
use crate::scheduler::{TaskId, TaskScheduler};
use crate::utils::{modified_time, to_relative_posix};
use crate::watcher::{AssetChangeInfo, AssetFileWatcher, AssetWatchEvent};
use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use walkdir::WalkDir;

/// Worker -> owner handoff. The lock only covers a push or a buffer swap.
#[derive(Debug, Default)]
pub struct CompletionQueue {
    queue: Mutex<Vec<AsyncLoadRequest>>,
}

impl CompletionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, request: AsyncLoadRequest) {
        self.queue.lock().push(request);
    }

    /// Move every queued request into `out`
    pub fn drain_into(&self, out: &mut Vec<AsyncLoadRequest>) {
        let mut queue = self.queue.lock();
        if out.is_empty() {
            std::mem::swap(&mut *queue, out);
        } else {
            out.append(&mut queue);
        }
    }

    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }
}

/// What one `tick` did
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    pub published: usize,
    pub failed: usize,
    pub dependencies_scheduled: usize,
    /// Completed loads whose asset was removed while in flight
    pub discarded: usize,
    pub registry_persisted: bool,
}

impl TickReport {
    pub fn is_empty(&self) -> bool {
        self.published == 0 && self.failed == 0 && self.discarded == 0
    }
}

/// Result of [`AssetManager::synchronize_registry`]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RegistrySync {
    pub added: usize,
    pub updated: usize,
    pub removed: usize,
}

#[derive(Debug)]
struct InFlightLoad {
    task: Option<TaskId>,
    priority: LoadPriority,
    submitted_at: Instant,
}

/// Registry, loaded-asset table and in-flight set behind one owner
pub struct AssetManager {
    config: PipelineConfig,
    registry: AssetRegistry,
    importers: ImporterTable,
    scheduler: Arc<dyn TaskScheduler>,
    loaded: FxHashMap<AssetHandle, SharedAsset>,
    in_flight: FxHashMap<AssetHandle, InFlightLoad>,
    completions: Arc<CompletionQueue>,
    drained: Vec<AsyncLoadRequest>,
    pending_removals: FxHashSet<AssetHandle>,
    /// In-flight handles whose source changed after the worker read it
    pending_reloads: FxHashSet<AssetHandle>,
}

impl AssetManager {
    /// Manager over `config.content_root`, reloading the persisted registry if any
    pub fn new(
        config: PipelineConfig,
        importers: ImporterTable,
        scheduler: Arc<dyn TaskScheduler>,
    ) -> Self {
        let registry = match config.registry_path() {
            Some(path) => AssetRegistry::load(&path),
            None => AssetRegistry::new(),
        };

        tracing::info!(
            root = %config.content_root.display(),
            assets = registry.len(),
            ?importers,
            "asset manager created"
        );

        Self {
            config,
            registry,
            importers,
            scheduler,
            loaded: FxHashMap::default(),
            in_flight: FxHashMap::default(),
            completions: Arc::new(CompletionQueue::new()),
            drained: Vec::new(),
            pending_removals: FxHashSet::default(),
            pending_reloads: FxHashSet::default(),
        }
    }

    /// Manager with the built-in importers on a rayon worker pool
    #[cfg(feature = "parallel")]
    pub fn with_worker_pool(
        config: PipelineConfig,
        compiler: Arc<dyn crate::assets::importers::ShaderCompiler>,
    ) -> Result<Self> {
        let scheduler = crate::scheduler::RayonTaskScheduler::new(config.worker_threads)?;
        let importers = ImporterTable::with_defaults(&config, compiler);
        Ok(Self::new(config, importers, Arc::new(scheduler)))
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn registry(&self) -> &AssetRegistry {
        &self.registry
    }

    pub fn importers(&self) -> &ImporterTable {
        &self.importers
    }

    pub fn register_importer<I: crate::assets::AssetImporter + 'static>(&mut self, importer: I) {
        self.importers.register(importer);
    }

    pub fn content_root(&self) -> &Path {
        &self.config.content_root
    }

    /// On-disk location of a content-relative path
    pub fn full_path(&self, relative: &Path) -> PathBuf {
        self.config.content_root.join(relative)
    }

    /// Content-relative posix form of `path`, `None` outside the content root
    pub fn relative_path(&self, path: &Path) -> Option<PathBuf> {
        let root = &self.config.content_root;
        if let Ok(stripped) = path.strip_prefix(root) {
            return to_relative_posix(root, stripped);
        }
        if path.is_absolute() && root.is_relative() {
            let absolute_root = std::env::current_dir().ok()?.join(root);
            let stripped = path.strip_prefix(&absolute_root).ok()?;
            return to_relative_posix(&absolute_root, stripped);
        }
        to_relative_posix(root, path)
    }

    pub fn metadata(&self, handle: AssetHandle) -> Option<&AssetMetadata> {
        self.registry.lookup(handle)
    }

    pub fn is_asset_loaded(&self, handle: AssetHandle) -> bool {
        self.loaded.contains_key(&handle)
    }

    pub fn is_in_flight(&self, handle: AssetHandle) -> bool {
        self.in_flight.contains_key(&handle)
    }

    pub fn loaded_count(&self) -> usize {
        self.loaded.len()
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    /// Published resource, if any
    pub fn get_asset(&self, handle: AssetHandle) -> Option<SharedAsset> {
        self.loaded.get(&handle).cloned()
    }

    /// Published resource downcast to its concrete type
    pub fn get<T: Asset>(&self, handle: AssetHandle) -> Option<Arc<T>> {
        self.get_asset(handle)?.into_any().downcast::<T>().ok()
    }

    /// Loaded resource, or `None` after making sure a load is underway.
    ///
    /// Repeated calls while a load is in flight never submit another task.
    pub fn request_load(&mut self, handle: AssetHandle) -> Option<SharedAsset> {
        if let Some(asset) = self.loaded.get(&handle) {
            return Some(Arc::clone(asset));
        }
        if self.in_flight.contains_key(&handle) {
            return None;
        }
        if !self.registry.is_handle_valid(handle) {
            tracing::warn!(%handle, "load requested for an unknown asset handle");
            return None;
        }

        self.schedule(handle, LoadPriority::Normal);
        None
    }

    /// Register `path` and queue a load at normal priority.
    ///
    /// A loaded asset is reloaded; its current resource stays published until
    /// the new one replaces it. Unrecognized files are registered but not loaded.
    pub fn import(&mut self, path: impl AsRef<Path>) -> Result<AssetHandle> {
        let path = path.as_ref();
        let relative = self
            .relative_path(path)
            .ok_or_else(|| AssetError::OutsideContentRoot(path.to_path_buf()))?;
        let full_path = self.full_path(&relative);
        let last_modified =
            modified_time(&full_path).map_err(|e| AssetError::import_failed(&full_path, e))?;

        let handle = self.registry.register_or_update(&relative, last_modified);
        self.pending_removals.remove(&handle);

        let asset_type = self.registry.asset_type(handle);
        if asset_type.is_none() {
            tracing::info!(path = %relative.display(), "not a recognized asset, registered without loading");
            return Ok(handle);
        }

        tracing::info!(%handle, %asset_type, path = %relative.display(), "importing asset");
        if self.in_flight.contains_key(&handle) {
            tracing::debug!(%handle, "load already in flight, reload queued");
            self.pending_reloads.insert(handle);
        } else {
            self.schedule(handle, LoadPriority::Normal);
        }
        Ok(handle)
    }

    fn schedule(&mut self, handle: AssetHandle, priority: LoadPriority) -> bool {
        let Some(metadata) = self.registry.lookup(handle) else {
            return false;
        };
        let Some(importer) = self.importers.get(metadata.asset_type).cloned() else {
            tracing::error!(
                %handle,
                asset_type = %metadata.asset_type,
                "No importer found for asset type"
            );
            return false;
        };

        let ctx = LoadContext {
            handle,
            asset_type: metadata.asset_type,
            relative_path: metadata.file_path.clone(),
            full_path: self.config.content_root.join(&metadata.file_path),
        };
        let mut request =
            AsyncLoadRequest::new(handle, ctx.asset_type, ctx.relative_path.clone(), priority);
        request.state = AssetState::Loading;

        // Present before submit so a synchronous scheduler still sees the load as in flight
        self.in_flight.insert(
            handle,
            InFlightLoad {
                task: None,
                priority,
                submitted_at: Instant::now(),
            },
        );

        let completions = Arc::clone(&self.completions);
        let task = self.scheduler.submit(
            priority,
            Box::new(move || {
                let result = panic::catch_unwind(AssertUnwindSafe(|| importer.load_cpu(&ctx)));
                match result {
                    Ok(Ok(data)) => request.complete(data),
                    Ok(Err(e)) => request.fail(e),
                    Err(payload) => request.fail(AssetError::WorkerPanic(panic_message(&*payload))),
                }
                completions.push(request);
            }),
        );

        if let Some(entry) = self.in_flight.get_mut(&handle) {
            entry.task = Some(task);
        }
        tracing::debug!(%handle, ?priority, task = task.raw(), "load scheduled");
        true
    }

    /// Finalize everything the workers have completed since the last tick.
    ///
    /// Never blocks on outstanding loads. The registry is persisted at most
    /// once, and only when something was published.
    pub fn tick(&mut self) -> TickReport {
        let span = tracing::info_span!("asset_tick");
        let _enter = span.enter();

        let mut report = TickReport::default();
        let mut drained = std::mem::take(&mut self.drained);
        self.completions.drain_into(&mut drained);

        for mut request in drained.drain(..) {
            let handle = request.handle;
            if let Some(entry) = self.in_flight.get(&handle) {
                request.task = entry.task;
            }

            if self.pending_removals.remove(&handle) {
                self.pending_reloads.remove(&handle);
                self.in_flight.remove(&handle);
                self.loaded.remove(&handle);
                self.registry.remove(handle);
                tracing::info!(%handle, path = %request.file_path.display(), "discarded load of removed asset");
                report.discarded += 1;
                continue;
            }

            match request.state {
                AssetState::ReadyForGpu => {
                    if self.finalize(&mut request, &mut report) {
                        report.published += 1;
                    } else {
                        report.failed += 1;
                    }
                }
                AssetState::Failed => {
                    let reason = request
                        .error
                        .as_ref()
                        .map(ToString::to_string)
                        .unwrap_or_else(|| "unknown error".to_string());
                    tracing::error!(
                        %handle,
                        path = %request.file_path.display(),
                        error = %reason,
                        "failed to load asset"
                    );
                    report.failed += 1;
                }
                state => {
                    tracing::warn!(%handle, ?state, "completed request in unexpected state");
                    report.failed += 1;
                }
            }

            self.in_flight.remove(&handle);

            // One more load picks up edits made while this one was running
            if self.pending_reloads.remove(&handle) && self.registry.is_handle_valid(handle) {
                tracing::info!(%handle, "reloading asset changed during its load");
                self.schedule(handle, request.priority);
            }
        }
        self.drained = drained;

        if report.published > 0 {
            report.registry_persisted = self.save_registry();
        }
        if !report.is_empty() {
            tracing::debug!(?report, in_flight = self.in_flight.len(), "asset tick");
        }
        report
    }

    fn finalize(&mut self, request: &mut AsyncLoadRequest, report: &mut TickReport) -> bool {
        let handle = request.handle;

        // Dependencies go out before this asset is published or the registry saved
        for dependency in request.cpu_data.dependencies() {
            if self.loaded.contains_key(&dependency) || self.in_flight.contains_key(&dependency) {
                continue;
            }
            if !self.registry.is_handle_valid(dependency) {
                tracing::warn!(%handle, %dependency, "dependency is not a registered asset");
                continue;
            }
            if self.schedule(dependency, LoadPriority::High) {
                report.dependencies_scheduled += 1;
            }
        }

        let Some(metadata) = self.registry.lookup(handle).cloned() else {
            tracing::error!(%handle, "finalized asset has no registry entry");
            return false;
        };

        match self.importers.finalize(handle, &metadata, request.take_cpu_data()) {
            Some(asset) => {
                let reloaded = self.loaded.insert(handle, asset).is_some();
                self.registry.mark_dirty();
                request.state = AssetState::Loaded;
                let elapsed = self.in_flight.get(&handle).map(|e| e.submitted_at.elapsed());
                tracing::info!(
                    %handle,
                    asset_type = %metadata.asset_type,
                    path = %metadata.file_path.display(),
                    priority = ?self.in_flight.get(&handle).map(|e| e.priority),
                    ?elapsed,
                    reloaded,
                    "asset loaded"
                );
                true
            }
            None => {
                request.state = AssetState::Failed;
                tracing::error!(
                    %handle,
                    path = %metadata.file_path.display(),
                    "importer produced no resource"
                );
                false
            }
        }
    }

    /// Drop every published resource.
    ///
    /// Callers must make sure nothing (e.g. in-flight GPU work) still uses them.
    pub fn clear_loaded_assets(&mut self) -> usize {
        let count = self.loaded.len();
        self.loaded.clear();
        tracing::info!(count, "cleared loaded assets");
        count
    }

    /// Persist the registry document; `false` when disabled or on failure
    pub fn save_registry(&mut self) -> bool {
        match self.config.registry_path() {
            Some(path) => self.registry.persist(&path),
            None => false,
        }
    }

    /// Feed one watcher change into the registry.
    ///
    /// Returns the affected handle.
    pub fn apply_change(&mut self, change: &AssetChangeInfo) -> Option<AssetHandle> {
        let Some(relative) = self.relative_path(&change.file_path) else {
            tracing::warn!(path = %change.file_path.display(), "change outside the content root ignored");
            return None;
        };

        match change.event {
            AssetWatchEvent::Added | AssetWatchEvent::Modified => {
                let full_path = self.full_path(&relative);
                let last_modified = match modified_time(&full_path) {
                    Ok(time) => time,
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                        // A later removal was debounced away behind this change
                        tracing::debug!(path = %relative.display(), "changed file no longer exists");
                        return self.remove_path(&relative);
                    }
                    Err(e) => {
                        tracing::debug!(path = %relative.display(), error = %e, "changed file could not be read");
                        return None;
                    }
                };
                let handle = self.registry.register_or_update(&relative, last_modified);
                self.pending_removals.remove(&handle);

                if change.event == AssetWatchEvent::Modified {
                    if self.in_flight.contains_key(&handle) {
                        tracing::debug!(%handle, "modified during load, reload queued");
                        self.pending_reloads.insert(handle);
                    } else if self.loaded.contains_key(&handle) {
                        tracing::info!(%handle, path = %relative.display(), "reloading modified asset");
                        self.schedule(handle, LoadPriority::Normal);
                    }
                }
                Some(handle)
            }
            AssetWatchEvent::Removed => self.remove_path(&relative),
        }
    }

    fn remove_path(&mut self, relative: &Path) -> Option<AssetHandle> {
        let handle = self.registry.handle_for_path(relative)?;
        self.pending_reloads.remove(&handle);
        if self.in_flight.contains_key(&handle) {
            self.pending_removals.insert(handle);
        } else {
            self.loaded.remove(&handle);
            self.registry.remove(handle);
        }
        tracing::info!(%handle, path = %relative.display(), "asset removed");
        Some(handle)
    }

    /// Watcher over the content root using the configured extension filter
    pub fn create_watcher(&self) -> Result<AssetFileWatcher> {
        let watcher = AssetFileWatcher::new();
        if let Some(filter) = self.config.normalized_watch_filter() {
            watcher.set_file_filter(filter);
        }
        watcher.start(self.config.content_root.clone())?;
        Ok(watcher)
    }

    /// Apply every change in order; returns how many touched an asset
    pub fn apply_changes<'a>(
        &mut self,
        changes: impl IntoIterator<Item = &'a AssetChangeInfo>,
    ) -> usize {
        changes
            .into_iter()
            .filter_map(|change| self.apply_change(change))
            .count()
    }

    /// Bring the registry in line with the files under the content root
    pub fn synchronize_registry(&mut self) -> Result<RegistrySync> {
        let root = self.config.content_root.clone();
        if !root.is_dir() {
            return Err(AssetError::IoError(format!(
                "content root is not a directory: {}",
                root.display()
            )));
        }

        let mut sync = RegistrySync::default();
        let mut present = FxHashSet::default();

        for entry in WalkDir::new(&root).into_iter().filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() || !AssetFileWatcher::is_asset_file(entry.path()) {
                continue;
            }
            let Some(relative) = self.relative_path(entry.path()) else {
                continue;
            };
            let Ok(last_modified) = modified_time(entry.path()) else {
                continue;
            };

            match self.registry.handle_for_path(&relative) {
                Some(handle) => {
                    let changed = self
                        .registry
                        .lookup(handle)
                        .is_some_and(|meta| meta.last_modified != last_modified);
                    if changed {
                        self.registry.register_or_update(&relative, last_modified);
                        sync.updated += 1;
                    }
                    present.insert(handle);
                }
                None => {
                    present.insert(self.registry.register_or_update(&relative, last_modified));
                    sync.added += 1;
                }
            }
        }

        let vanished: Vec<AssetHandle> = self
            .registry
            .iter()
            .filter(|(handle, meta)| {
                !present.contains(handle)
                    && !self.loaded.contains_key(handle)
                    && !self.in_flight.contains_key(handle)
                    && !root.join(&meta.file_path).is_file()
            })
            .map(|(handle, _)| handle)
            .collect();
        for handle in vanished {
            self.registry.remove(handle);
            sync.removed += 1;
        }

        tracing::info!(
            added = sync.added,
            updated = sync.updated,
            removed = sync.removed,
            total = self.registry.len(),
            "asset registry synchronized"
        );
        Ok(sync)
    }
}

impl std::fmt::Debug for AssetManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetManager")
            .field("content_root", &self.config.content_root)
            .field("registered", &self.registry.len())
            .field("loaded", &self.loaded.len())
            .field("in_flight", &self.in_flight.len())
            .finish()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "worker panicked".to_string()
    }
}
