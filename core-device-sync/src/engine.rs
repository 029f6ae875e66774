//! # Device Sync Engine
//!
//! Mirrors a library selection onto a device and reports progress on the
//! event bus.
//!
//! ## Overview
//!
//! A session runs through these steps:
//! 1. Load the device ledger (best effort) and stamp the session's encode profile on it
//! 2. Enumerate the device, build the plan, decide final destinations
//! 3. Delete stale files and prune directories they leave empty
//! 4. Transfer each planned item unless the ledger says it is current
//! 5. Create the reserved directory, save the ledger, emit the summary
//!
//! Per-file failures are counted and the session carries on. Only an
//! unreachable device root ends a session early, and even then the ledger is
//! saved.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_device_sync::{DeviceSyncConfig, DeviceSyncEngine, FfmpegPipelineFactory, SyncTarget};
//! use core_runtime::events::EventBus;
//! use std::sync::Arc;
//!
//! let engine = DeviceSyncEngine::new(
//!     DeviceSyncConfig::default(),
//!     storage,
//!     Arc::new(FfmpegPipelineFactory::default()),
//!     Arc::new(EventBus::default()),
//! );
//!
//! let job_id = engine.sync(SyncTarget::new("walkman", "/media/walkman/Music"), selection).await?;
//! ```

use bridge_traits::{Clock, DeviceStorage, SystemClock};
use core_runtime::events::{CoreEvent, DeviceSyncEvent, EventBus};
use core_runtime::logging::strip_path;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::config::DeviceSyncConfig;
use crate::differ::{compute_stale, PlanItem, TreeDiffer};
use crate::job::{SyncJobId, SyncPhase, SyncReport, SyncSession};
use crate::ledger::SyncMetadataLedger;
use crate::pipeline::PipelineFactory;
use crate::profile::Encoder;
use crate::selection::{DeviceId, SelectionProvider, SyncSelection, SyncTarget};
use crate::transcode::{TranscodeOrchestrator, TransferDecision, TransferOutcome};
use crate::{DeviceSyncError, Result};

/// Active session tracking
#[derive(Clone)]
struct ActiveSync {
    job_id: SyncJobId,
    cancellation_token: CancellationToken,
}

enum ItemOutcome {
    Transferred,
    Skipped,
    Cancelled,
}

pub struct DeviceSyncEngine {
    config: DeviceSyncConfig,

    /// Access to the device and to library sources
    storage: Arc<dyn DeviceStorage>,

    /// Builds encode pipelines
    pipelines: Arc<dyn PipelineFactory>,

    event_bus: Arc<EventBus>,

    clock: Arc<dyn Clock>,

    differ: TreeDiffer,

    /// Sessions in flight, by device
    active_syncs: Arc<Mutex<HashMap<DeviceId, ActiveSync>>>,
}

impl DeviceSyncEngine {
    pub fn new(
        config: DeviceSyncConfig,
        storage: Arc<dyn DeviceStorage>,
        pipelines: Arc<dyn PipelineFactory>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        let differ = TreeDiffer::new(
            config.path_mapper(),
            config.reserved_dir_name.clone(),
            config.ledger_file_name.clone(),
        );

        Self {
            config,
            storage,
            pipelines,
            event_bus,
            clock: Arc::new(SystemClock),
            differ,
            active_syncs: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &DeviceSyncConfig {
        &self.config
    }

    /// Start a session in the background.
    ///
    /// # Errors
    ///
    /// `SyncInProgress` if the device already has a session running.
    pub async fn sync(&self, target: SyncTarget, selection: SyncSelection) -> Result<SyncJobId> {
        let cancellation_token = CancellationToken::new();
        let job_id = self
            .register(&target.device_id, cancellation_token.clone())
            .await?;

        info!("Started device sync {} for {}", job_id, target.device_id);

        let engine = Arc::new(self.clone_for_task());
        tokio::spawn(async move {
            let device_id = target.device_id.clone();

            // Nested so a panicking session still releases the device
            let session = {
                let engine = Arc::clone(&engine);
                tokio::spawn(async move {
                    engine
                        .execute_session(job_id, &target, &selection, cancellation_token)
                        .await
                })
            };
            let outcome = session.await;
            engine.unregister(&device_id, job_id).await;

            match outcome {
                Ok(report) if report.errors > 0 => warn!(
                    "Device sync {} for {} finished with {} errors",
                    job_id, device_id, report.errors
                ),
                Ok(_) => {}
                Err(e) => error!(
                    error = %e,
                    "Device sync {} for {} terminated abnormally",
                    job_id, device_id
                ),
            }
        });

        Ok(job_id)
    }

    /// Ask `provider` what the device should hold, then start a session.
    pub async fn sync_from_provider(
        &self,
        target: SyncTarget,
        provider: &dyn SelectionProvider,
    ) -> Result<SyncJobId> {
        if self.is_syncing(&target.device_id).await {
            return Err(DeviceSyncError::SyncInProgress {
                device_id: target.device_id.to_string(),
            });
        }
        let selection = provider.selection_for(&target.device_id).await?;
        self.sync(target, selection).await
    }

    /// Run a session on the current task and return its report.
    ///
    /// `cancellation_token` is also what `cancel` triggers for this device.
    pub async fn run(
        &self,
        target: &SyncTarget,
        selection: &SyncSelection,
        cancellation_token: CancellationToken,
    ) -> Result<SyncReport> {
        let job_id = self
            .register(&target.device_id, cancellation_token.clone())
            .await?;
        let report = self
            .execute_session(job_id, target, selection, cancellation_token)
            .await;
        self.unregister(&target.device_id, job_id).await;
        Ok(report)
    }

    /// Cancel the session running for `device_id`.
    pub async fn cancel(&self, device_id: &DeviceId) -> Result<()> {
        let active = {
            let active_syncs = self.active_syncs.lock().await;
            active_syncs.get(device_id).cloned()
        };

        let Some(active) = active else {
            return Err(DeviceSyncError::NotSyncing {
                device_id: device_id.to_string(),
            });
        };

        active.cancellation_token.cancel();
        info!("Cancelling device sync {} for {}", active.job_id, device_id);
        Ok(())
    }

    pub async fn is_syncing(&self, device_id: &DeviceId) -> bool {
        let active_syncs = self.active_syncs.lock().await;
        active_syncs.contains_key(device_id)
    }

    pub async fn active_job(&self, device_id: &DeviceId) -> Option<SyncJobId> {
        let active_syncs = self.active_syncs.lock().await;
        active_syncs.get(device_id).map(|active| active.job_id)
    }

    /// Whether the pipeline backend can produce `encoder` output.
    pub async fn is_encoder_available(&self, encoder: Encoder) -> bool {
        self.pipelines.is_encoder_available(encoder).await
    }

    /// Current on-device ledger for `root`.
    pub async fn load_ledger(&self, root: &Path) -> SyncMetadataLedger {
        SyncMetadataLedger::load_named(self.storage.as_ref(), root, &self.config.ledger_file_name)
            .await
    }

    // ========================================================================
    // Session Tracking
    // ========================================================================

    async fn register(
        &self,
        device_id: &DeviceId,
        cancellation_token: CancellationToken,
    ) -> Result<SyncJobId> {
        let mut active_syncs = self.active_syncs.lock().await;
        if active_syncs.contains_key(device_id) {
            return Err(DeviceSyncError::SyncInProgress {
                device_id: device_id.to_string(),
            });
        }

        let job_id = SyncJobId::new();
        active_syncs.insert(
            device_id.clone(),
            ActiveSync {
                job_id,
                cancellation_token,
            },
        );
        Ok(job_id)
    }

    async fn unregister(&self, device_id: &DeviceId, job_id: SyncJobId) {
        let mut active_syncs = self.active_syncs.lock().await;
        if active_syncs
            .get(device_id)
            .is_some_and(|active| active.job_id == job_id)
        {
            active_syncs.remove(device_id);
        }
    }

    /// Owned copy sharing every handle, for the spawned session task
    fn clone_for_task(&self) -> Self {
        Self {
            config: self.config.clone(),
            storage: Arc::clone(&self.storage),
            pipelines: Arc::clone(&self.pipelines),
            event_bus: Arc::clone(&self.event_bus),
            clock: Arc::clone(&self.clock),
            differ: self.differ.clone(),
            active_syncs: Arc::clone(&self.active_syncs),
        }
    }

    // ========================================================================
    // Session
    // ========================================================================

    #[instrument(skip(self, target, selection, cancel), fields(job_id = %job_id, device = %target.device_id))]
    async fn execute_session(
        &self,
        job_id: SyncJobId,
        target: &SyncTarget,
        selection: &SyncSelection,
        cancel: CancellationToken,
    ) -> SyncReport {
        let started_at = self.clock.now();
        let mut session = SyncSession::new(job_id, target.device_id.clone());

        self.event_bus
            .emit(CoreEvent::DeviceSync(DeviceSyncEvent::Started {
                job_id: job_id.to_string(),
                device_id: target.device_id.to_string(),
                root: target.root.display().to_string(),
            }))
            .ok();

        let mut ledger = self.load_ledger(&target.root).await;
        ledger.set_profile(&self.config.profile);

        let orchestrator = TranscodeOrchestrator::new(
            self.config.profile,
            Arc::clone(&self.pipelines),
            Arc::clone(&self.storage),
            self.config.temp_dir.clone(),
            self.config.transcode_poll_interval,
        );
        if self.config.profile.encoder != Encoder::None && !orchestrator.encoder_available().await {
            warn!(
                encoder = %self.config.profile.encoder,
                "Encoder unavailable, conversions will fail"
            );
        }

        match self
            .sync_tree(&mut session, &mut ledger, &orchestrator, target, selection, &cancel)
            .await
        {
            Ok(()) => {}
            Err(DeviceSyncError::Cancelled) => {
                info!("Device sync cancelled");
                session.cancelled = true;
            }
            Err(e) => {
                error!(error = %e, "Device sync aborted");
                session.record_error(&e);
            }
        }

        self.finalize(&mut session, &ledger, &target.root).await;

        let duration_secs = (self.clock.now() - started_at).num_seconds().max(0) as u64;
        let report = session.report(duration_secs);
        self.emit_summary(&session, &report);

        info!(
            planned = report.planned,
            transferred = report.transferred,
            skipped = report.skipped,
            deleted = report.deleted,
            errors = report.errors,
            cancelled = report.cancelled,
            "Device sync finished"
        );
        report
    }

    async fn sync_tree(
        &self,
        session: &mut SyncSession,
        ledger: &mut SyncMetadataLedger,
        orchestrator: &TranscodeOrchestrator,
        target: &SyncTarget,
        selection: &SyncSelection,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let root = target.root.as_path();

        session.transition(SyncPhase::Planning)?;
        let tree = self
            .differ
            .enumerate_existing(self.storage.as_ref(), root, cancel)
            .await?;
        for failure in &tree.failures {
            session.record_error(failure);
        }

        let plan = self.differ.compute_plan(root, selection);
        let work = decide_unique(plan.iter(), orchestrator);
        let stale = compute_stale(
            &tree.files,
            work.iter().map(|(_, decision)| decision.destination.as_path()),
        );
        session.planned = work.len() as u64;
        debug!(
            existing = tree.files.len(),
            planned = work.len(),
            stale = stale.len(),
            "Computed sync plan"
        );

        session.transition(SyncPhase::Deleting)?;
        self.delete_stale(session, ledger, root, &stale, cancel)
            .await?;

        session.transition(SyncPhase::Transferring)?;
        for (item, decision) in &work {
            if cancel.is_cancelled() {
                return Err(DeviceSyncError::Cancelled);
            }

            match self
                .transfer_item(ledger, orchestrator, item, decision, cancel)
                .await
            {
                Ok(ItemOutcome::Transferred) => session.transferred += 1,
                Ok(ItemOutcome::Skipped) => session.skipped += 1,
                Ok(ItemOutcome::Cancelled) => return Err(DeviceSyncError::Cancelled),
                Err(e) => {
                    warn!(
                        file = strip_path(&decision.destination.to_string_lossy()),
                        error = %e,
                        "Failed to transfer file"
                    );
                    session.record_error(&e);
                }
            }

            session.completed += 1;
            self.event_bus
                .emit(CoreEvent::DeviceSync(DeviceSyncEvent::Progress {
                    job_id: session.job_id.to_string(),
                    device_id: session.device_id.to_string(),
                    completed: session.completed,
                    total: session.planned,
                    fraction: session.progress(),
                }))
                .ok();
        }

        Ok(())
    }

    async fn delete_stale(
        &self,
        session: &mut SyncSession,
        ledger: &mut SyncMetadataLedger,
        root: &Path,
        stale: &[PathBuf],
        cancel: &CancellationToken,
    ) -> Result<()> {
        for path in stale {
            if cancel.is_cancelled() {
                return Err(DeviceSyncError::Cancelled);
            }

            match self.storage.delete_file(path).await {
                Ok(()) => {
                    debug!(file = strip_path(&path.to_string_lossy()), "Deleted stale file");
                    session.deleted += 1;
                }
                Err(e) if e.is_not_found() => {}
                Err(e) => {
                    let err = DeviceSyncError::io(path, e);
                    warn!(error = %err, "Failed to delete stale file");
                    session.record_error(&err);
                    continue;
                }
            }

            ledger.remove(path);
            self.prune_empty_parents(root, path).await;
        }

        Ok(())
    }

    /// Remove directories emptied by a deletion, up to (not including) the root.
    async fn prune_empty_parents(&self, root: &Path, file: &Path) {
        let mut dir = file.parent();
        while let Some(current) = dir {
            if current == root || !current.starts_with(root) {
                break;
            }

            match self.storage.is_dir_empty(current).await {
                Ok(true) => {}
                Ok(false) => break,
                Err(e) => {
                    debug!(dir = ?current, error = %e, "Could not inspect directory");
                    break;
                }
            }

            if let Err(e) = self.storage.delete_dir(current).await {
                warn!(dir = ?current, error = %e, "Failed to remove empty directory");
                break;
            }
            debug!(dir = ?current, "Removed empty directory");
            dir = current.parent();
        }
    }

    async fn transfer_item(
        &self,
        ledger: &mut SyncMetadataLedger,
        orchestrator: &TranscodeOrchestrator,
        item: &PlanItem,
        decision: &TransferDecision,
        cancel: &CancellationToken,
    ) -> Result<ItemOutcome> {
        let source = item.source.path();
        let source_mtime = self
            .storage
            .metadata(source)
            .await
            .map_err(|e| DeviceSyncError::io(source, e))?
            .modified_at
            .unwrap_or(0);

        let destination = &decision.destination;
        let exists = self
            .storage
            .exists(destination)
            .await
            .map_err(|e| DeviceSyncError::io(destination, e))?;
        if exists && ledger.mtime(destination) >= source_mtime {
            return Ok(ItemOutcome::Skipped);
        }

        match orchestrator.transfer(&item.source, decision, cancel).await? {
            TransferOutcome::Cancelled => Ok(ItemOutcome::Cancelled),
            TransferOutcome::Copied | TransferOutcome::Transcoded => {
                ledger.set_mtime(destination, source_mtime);
                Ok(ItemOutcome::Transferred)
            }
        }
    }

    async fn finalize(&self, session: &mut SyncSession, ledger: &SyncMetadataLedger, root: &Path) {
        if let Err(e) = session.transition(SyncPhase::Finalizing) {
            warn!(error = %e, "Unexpected phase at finalize");
        }

        if !session.fatal {
            if let Err(e) = self.ensure_reserved_dir(root).await {
                warn!(error = %e, "Failed to create reserved directory");
                session.record_error(&e);
            }
        }

        if let Err(e) = ledger.save(self.storage.as_ref()).await {
            error!(error = %e, "Failed to save device ledger");
            session.record_error(&e);
        }

        let terminal = if session.errors > 0 {
            SyncPhase::Errored
        } else {
            SyncPhase::Idle
        };
        if let Err(e) = session.transition(terminal) {
            warn!(error = %e, "Unexpected phase at session end");
        }
    }

    async fn ensure_reserved_dir(&self, root: &Path) -> Result<()> {
        let reserved = root.join(&self.config.reserved_dir_name);
        if !self.storage.exists(&reserved).await? {
            self.storage
                .create_dir_all(&reserved)
                .await
                .map_err(|e| DeviceSyncError::io(&reserved, e))?;
        }
        Ok(())
    }

    fn emit_summary(&self, session: &SyncSession, report: &SyncReport) {
        let job_id = session.job_id.to_string();
        let device_id = session.device_id.to_string();

        if let Some(message) = report.last_error.clone().filter(|_| report.errors > 0) {
            self.event_bus
                .emit(CoreEvent::DeviceSync(DeviceSyncEvent::Errors {
                    job_id: job_id.clone(),
                    device_id: device_id.clone(),
                    error_count: report.errors,
                    message,
                }))
                .ok();
        }

        self.event_bus
            .emit(CoreEvent::DeviceSync(DeviceSyncEvent::Finished {
                job_id,
                device_id,
                transferred: report.transferred,
                skipped: report.skipped,
                deleted: report.deleted,
                errors: report.errors,
                cancelled: report.cancelled,
                duration_secs: report.duration_secs,
            }))
            .ok();
    }
}

/// Transfer decisions in plan order, keeping only the first item for each
/// final destination. Extension rewrites can map distinct sources (`01.flac`,
/// `01.ogg`) onto the same file.
fn decide_unique<'a>(
    items: impl Iterator<Item = &'a PlanItem>,
    orchestrator: &TranscodeOrchestrator,
) -> Vec<(&'a PlanItem, TransferDecision)> {
    let mut seen = HashSet::new();
    let mut work = Vec::new();

    for item in items {
        let decision = orchestrator.decide(item);
        if !seen.insert(decision.destination.clone()) {
            debug!(
                source = ?item.source.path(),
                destination = ?decision.destination,
                "Destination already planned, dropping item"
            );
            continue;
        }
        work.push((item, decision));
    }

    work
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::FfmpegPipelineFactory;
    use crate::selection::{AlbumRef, TrackRef, TrackSource};
    use async_trait::async_trait;
    use bridge_desktop::TokioDeviceStorage;
    use mockall::mock;
    use tempfile::TempDir;

    mock! {
        Provider {}

        #[async_trait]
        impl SelectionProvider for Provider {
            async fn selection_for(&self, device: &DeviceId) -> Result<SyncSelection>;
        }
    }

    struct Fixture {
        _dir: TempDir,
        library: PathBuf,
        device: PathBuf,
        engine: DeviceSyncEngine,
        bus: Arc<EventBus>,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let library = dir.path().join("library");
        let device = dir.path().join("device");
        std::fs::create_dir_all(&library).unwrap();
        let bus = Arc::new(EventBus::new(64));
        let config = DeviceSyncConfig::builder()
            .temp_dir(dir.path())
            .build()
            .unwrap();
        let engine = DeviceSyncEngine::new(
            config,
            Arc::new(TokioDeviceStorage::new()),
            Arc::new(FfmpegPipelineFactory::new("/nonexistent/ffmpeg")),
            Arc::clone(&bus),
        );
        Fixture {
            _dir: dir,
            library,
            device,
            engine,
            bus,
        }
    }

    fn selection(library: &Path, names: &[&str]) -> SyncSelection {
        let album = AlbumRef::new("1", "Blue").with_artist("Joni Mitchell");
        SyncSelection::new(
            names
                .iter()
                .map(|name| {
                    let path = library.join(name);
                    std::fs::write(&path, name.as_bytes()).unwrap();
                    TrackRef::new(*name, TrackSource::Local(path), album.clone())
                })
                .collect(),
        )
    }

    #[tokio::test]
    async fn test_run_copies_and_records_ledger() {
        let f = fixture();
        let target = SyncTarget::new("walkman", &f.device);
        let selection = selection(&f.library, &["01.mp3", "02.mp3"]);

        let report = f
            .engine
            .run(&target, &selection, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.transferred, 2);
        assert_eq!(report.phase, SyncPhase::Idle);
        assert!(f.device.join("joni mitchell_blue/01.mp3").exists());
        assert!(f.device.join("unsync").is_dir());

        let ledger = f.engine.load_ledger(&f.device).await;
        assert_eq!(ledger.len(), 2);
        assert!(ledger.mtime("joni mitchell_blue/02.mp3") > 0);
        assert!(!f.engine.is_syncing(&target.device_id).await);
    }

    #[tokio::test]
    async fn test_second_concurrent_session_rejected() {
        let f = fixture();
        let device = DeviceId::new("walkman");
        let token = CancellationToken::new();
        f.engine.register(&device, token).await.unwrap();

        let result = f
            .engine
            .sync(SyncTarget::new("walkman", &f.device), SyncSelection::default())
            .await;

        assert!(matches!(result, Err(DeviceSyncError::SyncInProgress { .. })));
    }

    #[tokio::test]
    async fn test_cancel_without_session() {
        let f = fixture();
        let result = f.engine.cancel(&DeviceId::new("walkman")).await;
        assert!(matches!(result, Err(DeviceSyncError::NotSyncing { .. })));
    }

    #[tokio::test]
    async fn test_background_sync_from_provider_finishes() {
        let f = fixture();
        let selection = selection(&f.library, &["01.mp3"]);
        let mut provider = MockProvider::new();
        provider
            .expect_selection_for()
            .withf(|device| device.as_str() == "walkman")
            .times(1)
            .returning(move |_| Ok(selection.clone()));

        let mut events = f.bus.subscribe();
        let job_id = f
            .engine
            .sync_from_provider(SyncTarget::new("walkman", &f.device), &provider)
            .await
            .unwrap();

        loop {
            let event = events.recv().await.unwrap();
            if let CoreEvent::DeviceSync(DeviceSyncEvent::Finished {
                job_id: finished,
                transferred,
                ..
            }) = event
            {
                assert_eq!(finished, job_id.to_string());
                assert_eq!(transferred, 1);
                break;
            }
        }
        assert!(f.device.join("joni mitchell_blue/01.mp3").exists());
    }

    #[tokio::test]
    async fn test_provider_error_is_returned() {
        let f = fixture();
        let mut provider = MockProvider::new();
        provider
            .expect_selection_for()
            .returning(|_| Err(DeviceSyncError::Selection("library locked".to_string())));

        let result = f
            .engine
            .sync_from_provider(SyncTarget::new("walkman", &f.device), &provider)
            .await;

        assert!(matches!(result, Err(DeviceSyncError::Selection(_))));
        assert!(!f.engine.is_syncing(&DeviceId::new("walkman")).await);
    }

    #[tokio::test]
    async fn test_missing_source_counts_error_and_emits_errors_event() {
        let f = fixture();
        let album = AlbumRef::new("1", "Blue").with_artist("Joni Mitchell");
        let selection = SyncSelection::new(vec![TrackRef::new(
            "gone",
            TrackSource::Local(f.library.join("gone.mp3")),
            album,
        )]);
        let mut events = f.bus.subscribe();

        let report = f
            .engine
            .run(
                &SyncTarget::new("walkman", &f.device),
                &selection,
                CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(report.errors, 1);
        assert_eq!(report.phase, SyncPhase::Errored);

        let mut saw_errors = false;
        while let Ok(event) = events.try_recv() {
            if let CoreEvent::DeviceSync(DeviceSyncEvent::Errors { error_count, .. }) = event {
                assert_eq!(error_count, 1);
                saw_errors = true;
            }
        }
        assert!(saw_errors);
    }

    #[tokio::test]
    async fn test_stale_delete_prunes_empty_directories() {
        let f = fixture();
        let old_album = f.device.join("old_album/disc 1");
        std::fs::create_dir_all(&old_album).unwrap();
        std::fs::write(old_album.join("01.mp3"), b"x").unwrap();
        std::fs::create_dir_all(f.device.join("unsync")).unwrap();
        std::fs::write(f.device.join("unsync/mine.mp3"), b"x").unwrap();

        let report = f
            .engine
            .run(
                &SyncTarget::new("walkman", &f.device),
                &SyncSelection::default(),
                CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(report.deleted, 1);
        assert!(!f.device.join("old_album").exists());
        assert!(f.device.join("unsync/mine.mp3").exists());
        assert!(f.device.is_dir());
    }
}
