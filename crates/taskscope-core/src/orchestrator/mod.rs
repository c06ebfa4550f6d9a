//! Workshop lifecycle and the analysis run loop.
//!
//! ## Run loop
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                     WorkshopOrchestrator                         │
//! │  for each file (sequential):                                     │
//! │  ┌────────────┐   ┌──────────────┐   ┌──────────────────────┐   │
//! │  │ extractor  │→→│ AnalysisEngine│→→│ append tasks + emit   │   │
//! │  │ (text)     │   │ (cache + LLM) │   │ TaskFound events     │   │
//! │  └────────────┘   └──────────────┘   └──────────────────────┘   │
//! │        │ failure: mark file `error`, report 0 tasks, continue    │
//! │                          │                                       │
//! │                    WorkshopStore                                 │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! One run per workshop at a time; independent workshops run concurrently.

mod events;

pub use events::*;

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::analysis::AnalysisEngine;
use crate::error::{Error, Result};
use crate::extractor;
use crate::store::WorkshopStore;
use crate::types::{
    FileStatus, NewWorkshop, Task, Workshop, WorkshopFile, WorkshopStatus, normalize_domains,
};
use crate::upload::{StoredUpload, remove_quietly};

/// Per-run options
#[derive(Debug, Clone, Default)]
pub struct AnalysisOptions {
    /// Restrict the run to these files. Empty means every file.
    pub file_ids: Vec<String>,
    /// Replace the workshop's domain labels for this and later runs.
    /// Empty keeps the current labels.
    pub domains: Vec<String>,
    pub cancel: Option<CancelFlag>,
}

/// Outcome of a successful run
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisSummary {
    pub workshop_id: String,
    pub total_tasks: usize,
    pub total_files: usize,
    pub failed_files: usize,
}

/// Removes the workshop from the running set when dropped
struct RunGuard<'a> {
    running: &'a Mutex<HashSet<String>>,
    workshop_id: String,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut running) = self.running.lock() {
            running.remove(&self.workshop_id);
        }
    }
}

pub struct WorkshopOrchestrator {
    store: Arc<dyn WorkshopStore>,
    engine: Arc<AnalysisEngine>,
    running: Mutex<HashSet<String>>,
}

impl WorkshopOrchestrator {
    pub fn new(store: Arc<dyn WorkshopStore>, engine: Arc<AnalysisEngine>) -> Self {
        Self {
            store,
            engine,
            running: Mutex::new(HashSet::new()),
        }
    }

    pub fn engine(&self) -> &Arc<AnalysisEngine> {
        &self.engine
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────────────────────

    pub fn create_workshop(&self, input: NewWorkshop) -> Result<Workshop> {
        let domains = normalize_domains(&input.domains)?;
        let now = Utc::now();
        let name = input.name.trim();
        let workshop = Workshop {
            id: uuid::Uuid::new_v4().to_string(),
            name: if name.is_empty() {
                format!("Workshop {}", now.format("%Y-%m-%d %H:%M"))
            } else {
                name.to_string()
            },
            domains,
            participant_count: input.participant_count.unwrap_or(1).max(1),
            status: WorkshopStatus::DomainDefined,
            file_ids: Vec::new(),
            tasks: Vec::new(),
            created_at: now,
            updated_at: now,
            analyzed_at: None,
        };
        self.store.put_workshop(workshop.clone())?;
        info!(workshop_id = %workshop.id, domains = workshop.domains.len(), "Workshop created");
        Ok(workshop)
    }

    pub fn get_workshop(&self, id: &str) -> Result<Workshop> {
        self.store
            .get_workshop(id)?
            .ok_or_else(|| Error::WorkshopNotFound(id.to_string()))
    }

    pub fn list_workshops(&self) -> Result<Vec<Workshop>> {
        self.store.list_workshops()
    }

    pub fn get_file(&self, id: &str) -> Result<WorkshopFile> {
        self.store
            .get_file(id)?
            .ok_or_else(|| Error::FileNotFound(id.to_string()))
    }

    /// Files of a workshop, in upload order
    pub fn workshop_files(&self, workshop_id: &str) -> Result<Vec<WorkshopFile>> {
        let workshop = self.get_workshop(workshop_id)?;
        let mut files = Vec::with_capacity(workshop.file_ids.len());
        for id in &workshop.file_ids {
            if let Some(file) = self.store.get_file(id)? {
                files.push(file);
            }
        }
        Ok(files)
    }

    pub fn workshop_tasks(&self, workshop_id: &str) -> Result<Vec<Task>> {
        Ok(self.get_workshop(workshop_id)?.tasks)
    }

    pub fn is_running(&self, workshop_id: &str) -> bool {
        self.running
            .lock()
            .map(|r| r.contains(workshop_id))
            .unwrap_or(false)
    }

    /// Run `update` with the running set locked, so no run can start while a
    /// workshop is being read and rewritten. Fails if a run is in progress.
    fn while_idle<T>(&self, workshop_id: &str, update: impl FnOnce() -> Result<T>) -> Result<T> {
        let running = self.running.lock().map_err(|_| Error::LockPoisoned)?;
        if running.contains(workshop_id) {
            return Err(Error::AnalysisInProgress(workshop_id.to_string()));
        }
        update()
    }

    /// Record stored uploads as files of the workshop
    pub fn attach_files(&self, workshop_id: &str, uploads: Vec<StoredUpload>) -> Result<Vec<WorkshopFile>> {
        self.while_idle(workshop_id, || self.attach_locked(workshop_id, uploads))
    }

    fn attach_locked(&self, workshop_id: &str, uploads: Vec<StoredUpload>) -> Result<Vec<WorkshopFile>> {
        let mut workshop = self.get_workshop(workshop_id)?;
        if !workshop.status.accepts_files() {
            return Err(Error::transition(workshop.status, WorkshopStatus::FilesUploaded));
        }

        let mut files = Vec::with_capacity(uploads.len());
        for upload in uploads {
            let file = WorkshopFile {
                id: uuid::Uuid::new_v4().to_string(),
                workshop_id: workshop_id.to_string(),
                original_name: upload.original_name,
                stored_path: upload.stored_path,
                media_type: upload.media_type,
                size: upload.size,
                status: FileStatus::Uploaded,
                uploaded_at: Utc::now(),
                content: None,
            };
            self.store.put_file(file.clone())?;
            workshop.file_ids.push(file.id.clone());
            files.push(file);
        }

        workshop.transition(WorkshopStatus::FilesUploaded)?;
        self.store.put_workshop(workshop)?;
        info!(workshop_id, files = files.len(), "Files attached");
        Ok(files)
    }

    /// Record one stored upload as a file of the workshop
    pub fn register_file(&self, workshop_id: &str, upload: StoredUpload) -> Result<WorkshopFile> {
        let mut files = self.attach_files(workshop_id, vec![upload])?;
        files
            .pop()
            .ok_or_else(|| Error::Other("attach_files returned no file".into()))
    }

    fn set_status(&self, workshop_id: &str, next: WorkshopStatus) -> Result<Workshop> {
        self.while_idle(workshop_id, || {
            let mut workshop = self.get_workshop(workshop_id)?;
            workshop.transition(next)?;
            self.store.put_workshop(workshop.clone())?;
            info!(workshop_id, status = %next, "Workshop status changed");
            Ok(workshop)
        })
    }

    /// Downstream template generation finished
    pub fn mark_tools_generated(&self, workshop_id: &str) -> Result<Workshop> {
        self.set_status(workshop_id, WorkshopStatus::ToolsGenerated)
    }

    pub fn complete_workshop(&self, workshop_id: &str) -> Result<Workshop> {
        self.set_status(workshop_id, WorkshopStatus::Completed)
    }

    /// Delete a workshop, its file records and the stored documents.
    /// Returns false if the workshop didn't exist.
    pub async fn cleanup(&self, workshop_id: &str) -> Result<bool> {
        // Records go under the lock; stored documents are removed after it
        let removed = self.while_idle(workshop_id, || {
            let Some(workshop) = self.store.get_workshop(workshop_id)? else {
                return Ok(None);
            };
            let mut paths = Vec::with_capacity(workshop.file_ids.len());
            for file_id in &workshop.file_ids {
                if let Some(file) = self.store.get_file(file_id)? {
                    paths.push(file.stored_path);
                }
                self.store.delete_file(file_id)?;
            }
            self.store.delete_workshop(workshop_id)?;
            Ok(Some(paths))
        })?;

        let Some(paths) = removed else {
            return Ok(false);
        };
        for path in &paths {
            remove_quietly(path).await;
        }
        info!(workshop_id, files = paths.len(), "Workshop cleaned up");
        Ok(true)
    }

    /// Clean up workshops untouched for longer than `idle_ttl`. Workshops
    /// with a run in progress are skipped. Returns the removed IDs.
    pub async fn reap_idle(&self, idle_ttl: Duration) -> Result<Vec<String>> {
        let ttl = chrono::Duration::from_std(idle_ttl)
            .map_err(|e| Error::Config(format!("idle ttl out of range: {}", e)))?;
        let cutoff = Utc::now() - ttl;

        let mut reaped = Vec::new();
        for workshop in self.store.list_workshops()? {
            if workshop.updated_at > cutoff || self.is_running(&workshop.id) {
                continue;
            }
            match self.cleanup(&workshop.id).await {
                Ok(true) => reaped.push(workshop.id),
                Ok(false) => {}
                Err(e) => warn!(workshop_id = %workshop.id, error = %e, "Failed to reap idle workshop"),
            }
        }
        if !reaped.is_empty() {
            info!(count = reaped.len(), "Reaped idle workshops");
        }
        Ok(reaped)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Analysis
    // ─────────────────────────────────────────────────────────────────────────

    fn begin_run(&self, workshop_id: &str) -> Result<RunGuard<'_>> {
        let mut running = self.running.lock().map_err(|_| Error::LockPoisoned)?;
        if !running.insert(workshop_id.to_string()) {
            return Err(Error::AnalysisInProgress(workshop_id.to_string()));
        }
        Ok(RunGuard {
            running: &self.running,
            workshop_id: workshop_id.to_string(),
        })
    }

    /// Move the workshop to `error` after a failed run, if it still exists
    fn mark_failed(&self, workshop_id: &str) {
        let result = self.store.get_workshop(workshop_id).and_then(|w| match w {
            Some(mut w) if w.status.can_transition_to(WorkshopStatus::Error) => {
                w.transition(WorkshopStatus::Error)?;
                self.store.put_workshop(w)
            }
            _ => Ok(()),
        });
        if let Err(e) = result {
            warn!(workshop_id, error = %e, "Failed to mark workshop as errored");
        }
    }

    /// Run the analysis pipeline over a workshop's files.
    ///
    /// Files are processed one at a time. A file that fails extraction or
    /// analysis is marked `error` and reported with zero tasks; the run goes
    /// on. The run itself fails (and the workshop moves to `error`) when
    /// there are no files, no file yields text, the provider rejects our
    /// credentials, or the run is cancelled.
    pub async fn analyze_workshop(
        &self,
        workshop_id: &str,
        options: &AnalysisOptions,
        sink: &dyn EventSink,
    ) -> Result<AnalysisSummary> {
        // Surface "not found" and malformed options before touching the
        // running set or the workshop's status
        self.get_workshop(workshop_id)?;
        if !options.domains.is_empty() {
            normalize_domains(&options.domains)?;
        }
        let _guard = self.begin_run(workshop_id)?;

        let result = self.run(workshop_id, options, sink).await;
        if let Err(e) = &result {
            warn!(workshop_id, error = %e, "Analysis failed");
            if !e.is_not_found() && !matches!(e, Error::InvalidStateTransition { .. }) {
                self.mark_failed(workshop_id);
            }
        }
        result
    }

    async fn run(
        &self,
        workshop_id: &str,
        options: &AnalysisOptions,
        sink: &dyn EventSink,
    ) -> Result<AnalysisSummary> {
        let mut workshop = self.get_workshop(workshop_id)?;

        if workshop.file_ids.is_empty() {
            return Err(Error::NoFiles(workshop_id.to_string()));
        }
        if !workshop.status.can_start_analysis() {
            return Err(Error::transition(workshop.status, WorkshopStatus::Analyzing));
        }

        let file_ids = if options.file_ids.is_empty() {
            workshop.file_ids.clone()
        } else {
            let mut selected: Vec<String> = Vec::new();
            for id in &options.file_ids {
                if !workshop.file_ids.contains(id) {
                    return Err(Error::FileNotFound(id.clone()));
                }
                if !selected.contains(id) {
                    selected.push(id.clone());
                }
            }
            selected
        };

        if !options.domains.is_empty() {
            workshop.domains = normalize_domains(&options.domains)?;
        }

        workshop.transition(WorkshopStatus::Analyzing)?;
        workshop.tasks.clear();
        self.store.put_workshop(workshop.clone())?;

        let total = file_ids.len();
        info!(workshop_id, files = total, provider = self.engine.provider_name(), "Analysis started");
        sink.emit(AnalysisEvent::Progress {
            percent: 0,
            message: format!("Starting analysis of {} file(s)", total),
        });

        let mut files_with_text = 0usize;
        let mut failed_files = 0usize;

        for (index, file_id) in file_ids.iter().enumerate() {
            if options.cancel.as_ref().is_some_and(|c| c.is_cancelled()) {
                info!(workshop_id, processed = index, "Analysis cancelled");
                self.clear_contents(&file_ids[..index]);
                return Err(Error::Cancelled(workshop_id.to_string()));
            }

            let mut file = self.get_file(file_id)?;
            sink.emit(AnalysisEvent::FileStarted {
                file_id: file.id.clone(),
                filename: file.original_name.clone(),
            });

            let outcome = self
                .process_file(&mut workshop, &mut file, index, total, sink)
                .await;

            let task_count = match outcome {
                Ok((had_text, count)) => {
                    if had_text {
                        files_with_text += 1;
                    }
                    count
                }
                Err(e) => {
                    if matches!(e, Error::ProviderAuth(_)) {
                        self.clear_contents(&file_ids[..=index]);
                        return Err(e);
                    }
                    if e.is_provider_error() {
                        // Text was extracted; only the analysis failed
                        files_with_text += 1;
                    }
                    failed_files += 1;
                    warn!(
                        workshop_id,
                        file_id = %file.id,
                        filename = %file.original_name,
                        error = %e,
                        "File analysis failed"
                    );
                    file.set_status(FileStatus::Error);
                    self.store.put_file(file.clone())?;
                    0
                }
            };

            sink.emit(AnalysisEvent::FileCompleted {
                file_id: file.id.clone(),
                filename: file.original_name.clone(),
                task_count,
            });
        }

        self.clear_contents(&file_ids);

        if files_with_text == 0 {
            return Err(Error::NoExtractableText(workshop_id.to_string()));
        }

        workshop.transition(WorkshopStatus::Analyzed)?;
        workshop.analyzed_at = Some(Utc::now());
        self.store.put_workshop(workshop.clone())?;

        sink.emit(AnalysisEvent::Progress {
            percent: 100,
            message: "Analysis complete".to_string(),
        });

        let summary = AnalysisSummary {
            workshop_id: workshop_id.to_string(),
            total_tasks: workshop.tasks.len(),
            total_files: total,
            failed_files,
        };
        info!(
            workshop_id,
            tasks = summary.total_tasks,
            files = summary.total_files,
            failed = summary.failed_files,
            "Analysis finished"
        );
        Ok(summary)
    }

    /// Extract and analyze one file. Returns (text extracted, tasks found).
    async fn process_file(
        &self,
        workshop: &mut Workshop,
        file: &mut WorkshopFile,
        index: usize,
        total: usize,
        sink: &dyn EventSink,
    ) -> Result<(bool, usize)> {
        let text =
            extractor::extract_as(&file.stored_path, &file.media_type, &file.original_name).await?;
        file.content = Some(text.clone());
        file.set_status(FileStatus::Parsed);
        self.store.put_file(file.clone())?;

        sink.emit(AnalysisEvent::Progress {
            percent: (index * 100 / total) as u8,
            message: format!("Analyzing {} ({}/{})", file.original_name, index + 1, total),
        });

        let drafts = self.engine.analyze_tasks(&text, &workshop.domains).await?;
        let count = drafts.len();

        for draft in drafts {
            let task = draft.into_task(&workshop.id, file);
            workshop.tasks.push(task.clone());
            workshop.updated_at = Utc::now();
            self.store.put_workshop(workshop.clone())?;
            sink.emit(AnalysisEvent::TaskFound { task });
        }

        file.set_status(FileStatus::Analyzed);
        self.store.put_file(file.clone())?;
        debug!(file_id = %file.id, tasks = count, "File analyzed");
        Ok((true, count))
    }

    /// Drop extracted text held for the run
    fn clear_contents(&self, file_ids: &[String]) {
        for id in file_ids {
            match self.store.get_file(id) {
                Ok(Some(mut file)) if file.content.is_some() => {
                    file.content = None;
                    if let Err(e) = self.store.put_file(file) {
                        warn!(file_id = %id, error = %e, "Failed to clear extracted text");
                    }
                }
                Ok(_) => {}
                Err(e) => warn!(file_id = %id, error = %e, "Failed to clear extracted text"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::LlmProvider;
    use crate::analysis::testing::{ONE_TASK, ScriptedProvider};
    use crate::cache::ResponseCache;
    use crate::config::{AnalysisConfig, CacheConfig, UploadPolicy};
    use crate::store::InMemoryWorkshopStore;
    use crate::upload::{FileIntake, UploadMeta};
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        intake: FileIntake,
        orchestrator: Arc<WorkshopOrchestrator>,
    }

    fn fixture(provider: Option<Arc<dyn LlmProvider>>) -> Fixture {
        let dir = TempDir::new().unwrap();
        let intake = FileIntake::new(dir.path().join("uploads"), UploadPolicy::default()).unwrap();
        let engine = AnalysisEngine::new(
            provider,
            Arc::new(ResponseCache::in_memory(CacheConfig::default())),
            AnalysisConfig::default(),
        );
        let orchestrator = Arc::new(WorkshopOrchestrator::new(
            Arc::new(InMemoryWorkshopStore::new()),
            Arc::new(engine),
        ));
        Fixture {
            _dir: dir,
            intake,
            orchestrator,
        }
    }

    fn new_workshop(domains: &[&str]) -> NewWorkshop {
        NewWorkshop {
            name: "Q3 ops review".into(),
            domains: domains.iter().map(|d| d.to_string()).collect(),
            participant_count: None,
        }
    }

    async fn upload(fx: &Fixture, name: &str, media_type: &str, bytes: &[u8]) -> StoredUpload {
        fx.intake
            .accept_bytes(&UploadMeta::new(name, media_type), bytes)
            .await
            .unwrap()
    }

    fn percents(events: &[AnalysisEvent]) -> Vec<u8> {
        events
            .iter()
            .filter_map(|e| match e {
                AnalysisEvent::Progress { percent, .. } => Some(*percent),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_heuristic_scenario_end_to_end() {
        let fx = fixture(None);
        let workshop = fx.orchestrator.create_workshop(new_workshop(&["Sales", "Finance"])).unwrap();
        assert_eq!(workshop.status, WorkshopStatus::DomainDefined);
        assert_eq!(workshop.participant_count, 1);

        let stored = upload(
            &fx,
            "notes.txt",
            "text/plain",
            "1. Weekly report\n- takes 30 minutes\n매주 작성".as_bytes(),
        )
        .await;
        let file = fx.orchestrator.register_file(&workshop.id, stored).unwrap();

        let sink = RecordingSink::new();
        let summary = fx
            .orchestrator
            .analyze_workshop(&workshop.id, &AnalysisOptions::default(), &sink)
            .await
            .unwrap();

        assert_eq!(summary.total_tasks, 1);
        assert_eq!(summary.total_files, 1);

        let tasks = fx.orchestrator.workshop_tasks(&workshop.id).unwrap();
        assert_eq!(tasks[0].time_spent, 0.5);
        assert_eq!(tasks[0].source_file_id, file.id);
        assert_eq!(tasks[0].source_filename, "notes.txt");
        assert!(["Sales", "Finance"].contains(&tasks[0].category.as_str()));

        let analyzed = fx.orchestrator.get_workshop(&workshop.id).unwrap();
        assert_eq!(analyzed.status, WorkshopStatus::Analyzed);
        assert!(analyzed.analyzed_at.is_some());

        let file = fx.orchestrator.get_file(&file.id).unwrap();
        assert_eq!(file.status, FileStatus::Analyzed);
        assert!(file.content.is_none());
    }

    #[tokio::test]
    async fn test_event_order() {
        let fx = fixture(None);
        let workshop = fx.orchestrator.create_workshop(new_workshop(&["Ops"])).unwrap();
        let a = upload(&fx, "a.txt", "text/plain", b"1. Daily backup check\n2. Weekly inventory").await;
        let b = upload(&fx, "b.txt", "text/plain", b"1. Monthly payroll").await;
        fx.orchestrator.attach_files(&workshop.id, vec![a, b]).unwrap();

        let sink = RecordingSink::new();
        fx.orchestrator
            .analyze_workshop(&workshop.id, &AnalysisOptions::default(), &sink)
            .await
            .unwrap();

        let kinds: Vec<&str> = sink
            .events()
            .iter()
            .map(|e| match e {
                AnalysisEvent::Progress { .. } => "progress",
                AnalysisEvent::FileStarted { .. } => "start",
                AnalysisEvent::TaskFound { .. } => "task",
                AnalysisEvent::FileCompleted { .. } => "complete",
            })
            .collect();
        assert_eq!(
            kinds,
            vec![
                "progress", "start", "progress", "task", "task", "complete", "start", "progress",
                "task", "complete", "progress"
            ]
        );

        let p = percents(&sink.events());
        assert!(p.windows(2).all(|w| w[0] <= w[1]), "{p:?}");
        assert_eq!(p.last(), Some(&100));
        assert_eq!(p, vec![0, 0, 50, 100]);
    }

    #[tokio::test]
    async fn test_corrupt_file_does_not_abort_run() {
        let fx = fixture(None);
        let workshop = fx.orchestrator.create_workshop(new_workshop(&["Ops"])).unwrap();
        let good1 = upload(&fx, "a.txt", "text/plain", b"1. Daily backup check").await;
        let bad = upload(&fx, "broken.docx", "application/octet-stream", b"not a zip").await;
        let good2 = upload(&fx, "c.txt", "text/plain", b"1. Monthly payroll").await;
        let files = fx.orchestrator.attach_files(&workshop.id, vec![good1, bad, good2]).unwrap();

        let sink = RecordingSink::new();
        let summary = fx
            .orchestrator
            .analyze_workshop(&workshop.id, &AnalysisOptions::default(), &sink)
            .await
            .unwrap();

        assert_eq!(summary.total_files, 3);
        assert_eq!(summary.failed_files, 1);

        let tasks = fx.orchestrator.workshop_tasks(&workshop.id).unwrap();
        let sources: HashSet<_> = tasks.iter().map(|t| t.source_file_id.clone()).collect();
        assert_eq!(sources.len(), 2);
        assert!(!sources.contains(&files[1].id));

        let bad_complete = sink.events().into_iter().find_map(|e| match e {
            AnalysisEvent::FileCompleted { file_id, task_count, .. } if file_id == files[1].id => {
                Some(task_count)
            }
            _ => None,
        });
        assert_eq!(bad_complete, Some(0));
        assert_eq!(fx.orchestrator.get_file(&files[1].id).unwrap().status, FileStatus::Error);
        assert_eq!(percents(&sink.events()).last(), Some(&100));
    }

    #[tokio::test]
    async fn test_no_files_is_an_error() {
        let fx = fixture(None);
        let workshop = fx.orchestrator.create_workshop(new_workshop(&["Ops"])).unwrap();

        let err = fx
            .orchestrator
            .analyze_workshop(&workshop.id, &AnalysisOptions::default(), &NullSink)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NoFiles(_)));
        assert_eq!(
            fx.orchestrator.get_workshop(&workshop.id).unwrap().status,
            WorkshopStatus::Error
        );
    }

    #[tokio::test]
    async fn test_all_files_unreadable_is_an_error() {
        let fx = fixture(None);
        let workshop = fx.orchestrator.create_workshop(new_workshop(&["Ops"])).unwrap();
        let bad = upload(&fx, "broken.docx", "application/octet-stream", b"not a zip").await;
        fx.orchestrator.register_file(&workshop.id, bad).unwrap();

        let sink = RecordingSink::new();
        let err = fx
            .orchestrator
            .analyze_workshop(&workshop.id, &AnalysisOptions::default(), &sink)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NoExtractableText(_)));
        assert_eq!(
            fx.orchestrator.get_workshop(&workshop.id).unwrap().status,
            WorkshopStatus::Error
        );
        assert!(!percents(&sink.events()).contains(&100));
    }

    #[tokio::test]
    async fn test_unknown_workshop() {
        let fx = fixture(None);
        let err = fx
            .orchestrator
            .analyze_workshop("missing", &AnalysisOptions::default(), &NullSink)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::WorkshopNotFound(_)));
    }

    #[tokio::test]
    async fn test_file_subset_and_domain_override() {
        let fx = fixture(None);
        let workshop = fx.orchestrator.create_workshop(new_workshop(&["Ops"])).unwrap();
        let a = upload(&fx, "a.txt", "text/plain", b"1. Payroll for Finance").await;
        let b = upload(&fx, "b.txt", "text/plain", b"1. Shipping").await;
        let files = fx.orchestrator.attach_files(&workshop.id, vec![a, b]).unwrap();

        let options = AnalysisOptions {
            file_ids: vec![files[0].id.clone()],
            domains: vec!["Finance".into(), "HR".into()],
            cancel: None,
        };
        let summary = fx
            .orchestrator
            .analyze_workshop(&workshop.id, &options, &NullSink)
            .await
            .unwrap();
        assert_eq!(summary.total_files, 1);

        let analyzed = fx.orchestrator.get_workshop(&workshop.id).unwrap();
        assert_eq!(analyzed.domains, vec!["Finance", "HR"]);
        assert_eq!(analyzed.tasks[0].category, "Finance");

        let bogus = AnalysisOptions {
            file_ids: vec!["nope".into()],
            ..Default::default()
        };
        let err = fx
            .orchestrator
            .analyze_workshop(&workshop.id, &bogus, &NullSink)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::FileNotFound(_)));
    }

    #[tokio::test]
    async fn test_malformed_domain_override_leaves_workshop_untouched() {
        let fx = fixture(None);
        let workshop = fx.orchestrator.create_workshop(new_workshop(&["Ops"])).unwrap();
        let a = upload(&fx, "a.txt", "text/plain", b"1. Daily backup check").await;
        fx.orchestrator.register_file(&workshop.id, a).unwrap();
        fx.orchestrator
            .analyze_workshop(&workshop.id, &AnalysisOptions::default(), &NullSink)
            .await
            .unwrap();

        let options = AnalysisOptions {
            domains: vec!["  ".into()],
            ..Default::default()
        };
        let err = fx
            .orchestrator
            .analyze_workshop(&workshop.id, &options, &NullSink)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let after = fx.orchestrator.get_workshop(&workshop.id).unwrap();
        assert_eq!(after.status, WorkshopStatus::Analyzed);
        assert_eq!(after.domains, vec!["Ops"]);
        assert_eq!(after.tasks.len(), 1);
        assert!(!fx.orchestrator.is_running(&workshop.id));
    }

    #[tokio::test]
    async fn test_reanalysis_replaces_tasks() {
        let fx = fixture(None);
        let workshop = fx.orchestrator.create_workshop(new_workshop(&["Ops"])).unwrap();
        let a = upload(&fx, "a.txt", "text/plain", b"1. Daily backup check").await;
        fx.orchestrator.register_file(&workshop.id, a).unwrap();

        for _ in 0..2 {
            fx.orchestrator
                .analyze_workshop(&workshop.id, &AnalysisOptions::default(), &NullSink)
                .await
                .unwrap();
        }
        assert_eq!(fx.orchestrator.workshop_tasks(&workshop.id).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_cancellation_between_files() {
        let fx = fixture(None);
        let workshop = fx.orchestrator.create_workshop(new_workshop(&["Ops"])).unwrap();
        let a = upload(&fx, "a.txt", "text/plain", b"1. Daily backup check").await;
        fx.orchestrator.register_file(&workshop.id, a).unwrap();

        let cancel = CancelFlag::new();
        cancel.cancel();
        let options = AnalysisOptions {
            cancel: Some(cancel),
            ..Default::default()
        };
        let err = fx
            .orchestrator
            .analyze_workshop(&workshop.id, &options, &NullSink)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Cancelled(_)));
        assert!(!fx.orchestrator.is_running(&workshop.id));
    }

    #[tokio::test]
    async fn test_provider_auth_aborts_run() {
        let provider = Arc::new(ScriptedProvider::sequence(
            vec![Err(Error::ProviderAuth("bad key".into()))],
            ONE_TASK,
        ));
        let fx = fixture(Some(provider as Arc<dyn LlmProvider>));
        let workshop = fx.orchestrator.create_workshop(new_workshop(&["Finance"])).unwrap();
        let a = upload(&fx, "a.txt", "text/plain", b"weekly KPI report").await;
        fx.orchestrator.register_file(&workshop.id, a).unwrap();

        let err = fx
            .orchestrator
            .analyze_workshop(&workshop.id, &AnalysisOptions::default(), &NullSink)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ProviderAuth(_)));

        // Error state allows a retry, which now succeeds
        let summary = fx
            .orchestrator
            .analyze_workshop(&workshop.id, &AnalysisOptions::default(), &NullSink)
            .await
            .unwrap();
        assert_eq!(summary.total_tasks, 1);
    }

    #[tokio::test]
    async fn test_rate_limited_file_is_skipped() {
        let provider = Arc::new(ScriptedProvider::sequence(
            vec![Err(Error::ProviderRateLimited)],
            ONE_TASK,
        ));
        let fx = fixture(Some(provider as Arc<dyn LlmProvider>));
        let workshop = fx.orchestrator.create_workshop(new_workshop(&["Finance"])).unwrap();
        let a = upload(&fx, "a.txt", "text/plain", b"first doc").await;
        let b = upload(&fx, "b.txt", "text/plain", b"second doc").await;
        fx.orchestrator.attach_files(&workshop.id, vec![a, b]).unwrap();

        let summary = fx
            .orchestrator
            .analyze_workshop(&workshop.id, &AnalysisOptions::default(), &NullSink)
            .await
            .unwrap();
        assert_eq!(summary.failed_files, 1);
        assert_eq!(summary.total_tasks, 1);
    }

    #[tokio::test]
    async fn test_concurrent_run_rejected() {
        let fx = fixture(None);
        let workshop = fx.orchestrator.create_workshop(new_workshop(&["Ops"])).unwrap();
        let a = upload(&fx, "a.txt", "text/plain", b"1. Daily backup check").await;
        fx.orchestrator.register_file(&workshop.id, a).unwrap();

        let guard = fx.orchestrator.begin_run(&workshop.id).unwrap();
        let err = fx
            .orchestrator
            .analyze_workshop(&workshop.id, &AnalysisOptions::default(), &NullSink)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AnalysisInProgress(_)));
        assert!(fx.orchestrator.cleanup(&workshop.id).await.is_err());
        drop(guard);
        assert!(!fx.orchestrator.is_running(&workshop.id));
    }

    #[test]
    fn test_attach_is_serialized_with_run_start() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let fx = fixture(None);
        let workshop = fx.orchestrator.create_workshop(new_workshop(&["Ops"])).unwrap();
        let orchestrator = fx.orchestrator.as_ref();
        let id = workshop.id.as_str();
        let attached = AtomicUsize::new(0);

        std::thread::scope(|scope| {
            for t in 0..4 {
                let attached = &attached;
                scope.spawn(move || {
                    for i in 0..50 {
                        let upload = StoredUpload {
                            original_name: format!("{}-{}.txt", t, i),
                            stored_path: std::path::PathBuf::from(format!("/nonexistent/{}-{}.txt", t, i)),
                            media_type: "text/plain".into(),
                            size: 1,
                        };
                        match orchestrator.attach_files(id, vec![upload]) {
                            Ok(_) => {
                                attached.fetch_add(1, Ordering::SeqCst);
                            }
                            Err(Error::AnalysisInProgress(_)) => {}
                            Err(e) => panic!("unexpected error: {}", e),
                        }
                    }
                });
            }
            scope.spawn(move || {
                for _ in 0..200 {
                    if let Ok(guard) = orchestrator.begin_run(id) {
                        drop(guard);
                    }
                }
            });
        });

        let after = orchestrator.get_workshop(id).unwrap();
        assert_eq!(after.file_ids.len(), attached.load(Ordering::SeqCst));
        assert_eq!(after.status, WorkshopStatus::FilesUploaded);
        assert!(!orchestrator.is_running(id));
    }

    #[tokio::test]
    async fn test_lifecycle_and_cleanup() {
        let fx = fixture(None);
        let workshop = fx.orchestrator.create_workshop(new_workshop(&["Ops"])).unwrap();

        // Nothing to complete yet
        assert!(fx.orchestrator.complete_workshop(&workshop.id).is_err());

        let a = upload(&fx, "a.txt", "text/plain", b"1. Daily backup check").await;
        let path = a.stored_path.clone();
        let file = fx.orchestrator.register_file(&workshop.id, a).unwrap();
        fx.orchestrator
            .analyze_workshop(&workshop.id, &AnalysisOptions::default(), &NullSink)
            .await
            .unwrap();

        let w = fx.orchestrator.mark_tools_generated(&workshop.id).unwrap();
        assert_eq!(w.status, WorkshopStatus::ToolsGenerated);
        let w = fx.orchestrator.complete_workshop(&workshop.id).unwrap();
        assert_eq!(w.status, WorkshopStatus::Completed);

        // Completed workshops take no more files
        let more = upload(&fx, "b.txt", "text/plain", b"x").await;
        assert!(fx.orchestrator.attach_files(&workshop.id, vec![more]).is_err());

        assert!(path.exists());
        assert!(fx.orchestrator.cleanup(&workshop.id).await.unwrap());
        assert!(!path.exists());
        assert!(fx.orchestrator.get_file(&file.id).is_err());
        assert!(!fx.orchestrator.cleanup(&workshop.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_reap_idle() {
        let fx = fixture(None);
        let workshop = fx.orchestrator.create_workshop(new_workshop(&["Ops"])).unwrap();

        assert!(fx.orchestrator.reap_idle(Duration::from_secs(3600)).await.unwrap().is_empty());

        tokio::time::sleep(Duration::from_millis(20)).await;
        let reaped = fx.orchestrator.reap_idle(Duration::from_millis(10)).await.unwrap();
        assert_eq!(reaped, vec![workshop.id.clone()]);
        assert!(fx.orchestrator.get_workshop(&workshop.id).is_err());
    }

    #[test]
    fn test_create_workshop_validates_domains() {
        let fx = fixture(None);
        assert!(fx.orchestrator.create_workshop(new_workshop(&[])).is_err());
        let w = fx.orchestrator.create_workshop(new_workshop(&[" Sales ", "Sales"])).unwrap();
        assert_eq!(w.domains, vec!["Sales"]);
    }
}
