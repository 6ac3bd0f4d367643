//! One upload, end to end: bytes in, [`ImportResult`] out.
//!
//! The session owns an [`ImportWorkflow`] and moves it forward as each
//! stage completes. Structural problems and store failures move the
//! workflow to its error step; validation findings stop at the preview.

use std::collections::HashSet;
use std::sync::Arc;

use orgimport_core::classifier::ImportPreview;
use orgimport_core::error::CoreError;
use orgimport_core::summary::ImportResult;
use orgimport_core::validation::finding::ErrorCategory;
use orgimport_core::workflow::{ImportStep, ImportWorkflow};
use uuid::Uuid;

use crate::config::SessionConfig;
use crate::controller::{BatchImportController, BatchImportResult, ControllerHandle};
use crate::error::PipelineError;
use crate::source::decode_workbook;
use crate::store::{fetch_existing_keys, RecordStore, StoreProcessor};

pub struct ImportSession {
    id: Uuid,
    store: Arc<dyn RecordStore>,
    config: SessionConfig,
    workflow: ImportWorkflow,
    handle: Option<ControllerHandle>,
}

impl ImportSession {
    pub fn new(store: Arc<dyn RecordStore>, config: SessionConfig) -> Self {
        let workflow = ImportWorkflow::new(config.zero_applied);
        Self {
            id: Uuid::now_v7(),
            store,
            config,
            workflow,
            handle: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn step(&self) -> &ImportStep {
        self.workflow.step()
    }

    pub fn preview(&self) -> Option<&ImportPreview> {
        self.workflow.preview()
    }

    /// Handle of the controller of the current run, if one was started.
    pub fn handle(&self) -> Option<&ControllerHandle> {
        self.handle.as_ref()
    }

    /// Accept an uploaded file and build its preview.
    ///
    /// Decoding and parsing errors are structural and end the session in
    /// the error step. Validation findings do not fail this call; they are
    /// part of the preview and block [`confirm`](Self::confirm).
    pub async fn upload(
        &mut self,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<&ImportPreview, PipelineError> {
        tracing::info!(session_id = %self.id, file_name, size = bytes.len(), "Upload received");
        self.workflow.start_upload(file_name)?;
        if let Err(e) = self.workflow.upload_complete(bytes) {
            return Err(self.fail(ErrorCategory::Structural, e.into()));
        }

        let decoded = match self.workflow.buffer() {
            Some(bytes) => decode_workbook(bytes).and_then(|raw| raw.parse()),
            None => Err(invalid(self.workflow.step(), "parse")),
        };
        let workbook = match decoded {
            Ok(workbook) => workbook,
            Err(e) => return Err(self.fail(ErrorCategory::Structural, e.into())),
        };

        let existing = match fetch_existing_keys(self.store.as_ref()).await {
            Ok(existing) => existing,
            Err(e) => return Err(self.fail(ErrorCategory::Execution, e)),
        };

        let preview = ImportPreview::build(&workbook, &existing);
        tracing::info!(
            session_id = %self.id,
            rows = preview.summary.total_rows,
            creates = preview.summary.departments.create + preview.summary.positions.create,
            updates = preview.summary.departments.update + preview.summary.positions.update,
            blocking = preview.blocking_count(),
            findings = preview.findings.len(),
            "Preview ready",
        );

        self.workflow.parsed(preview)?;
        self.workflow
            .preview()
            .ok_or_else(|| invalid(self.workflow.step(), "show a preview").into())
    }

    /// Accept the preview. Fails while blocking findings remain.
    pub fn confirm(&mut self) -> Result<&ImportStep, PipelineError> {
        self.workflow.confirm()?;
        tracing::info!(session_id = %self.id, "Import confirmed");
        Ok(self.workflow.step())
    }

    /// Build the controller for the confirmed preview without running it,
    /// so the caller can subscribe or keep a handle first.
    pub fn controller(&mut self) -> Result<BatchImportController, PipelineError> {
        let Some(preview) = self.workflow.preview().filter(|_| {
            matches!(self.workflow.step(), ImportStep::Confirming { .. })
        }) else {
            return Err(invalid(self.workflow.step(), "start the import").into());
        };

        let items = preview.to_batch_items();
        let processor = Arc::new(StoreProcessor::new(Arc::clone(&self.store)));
        let controller = BatchImportController::new(items, processor, self.config.batch.clone())?;
        self.handle = Some(controller.handle());
        Ok(controller)
    }

    /// Run `controller` to the end and record its result.
    ///
    /// A cancelled run returns the session to idle. Otherwise the result
    /// is counted against the preview and the workflow completes.
    pub async fn execute(
        &mut self,
        controller: BatchImportController,
    ) -> Result<&ImportStep, PipelineError> {
        tracing::info!(
            session_id = %self.id,
            items = controller.status().total,
            batches = controller.status().total_batches,
            "Import started",
        );
        let run = controller.run().await;
        self.record(run)
    }

    /// [`controller`](Self::controller) followed by
    /// [`execute`](Self::execute).
    pub async fn run(&mut self) -> Result<&ImportStep, PipelineError> {
        let controller = self.controller()?;
        self.execute(controller).await
    }

    fn record(&mut self, run: BatchImportResult) -> Result<&ImportStep, PipelineError> {
        if run.status.is_cancelled {
            tracing::info!(
                session_id = %self.id,
                processed = run.status.processed,
                "Import cancelled",
            );
            return Ok(self.workflow.cancel());
        }

        let Some(preview) = self.workflow.preview() else {
            return Err(invalid(self.workflow.step(), "record a result").into());
        };

        let state = run.status.state;
        let succeeded: HashSet<String> = run.succeeded_ids.into_iter().collect();
        let result = ImportResult::from_outcome(preview, &succeeded, run.status.errors);
        tracing::info!(
            session_id = %self.id,
            applied = result.applied(),
            failed = result.failed,
            state = %state,
            "Import finished",
        );

        Ok(self.workflow.complete(result)?)
    }

    /// Stop any run in progress and return to idle.
    pub fn cancel(&mut self) -> &ImportStep {
        if let Some(handle) = self.handle.take() {
            handle.cancel();
        }
        tracing::info!(session_id = %self.id, "Session cancelled");
        self.workflow.cancel()
    }

    /// Return to idle for another upload.
    pub fn reset(&mut self) -> &ImportStep {
        self.handle = None;
        self.workflow.reset()
    }

    fn fail(&mut self, category: ErrorCategory, error: PipelineError) -> PipelineError {
        tracing::warn!(
            session_id = %self.id,
            category = category.as_str(),
            error = %error,
            "Import failed",
        );
        if let Err(e) = self.workflow.fail(category, error.to_string()) {
            tracing::debug!(session_id = %self.id, error = %e, "Workflow not moved to error");
        }
        error
    }
}

fn invalid(step: &ImportStep, action: &'static str) -> CoreError {
    CoreError::InvalidTransition {
        from: step.name(),
        action,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use orgimport_core::types::{EntityKind, ExistingKeys};
    use orgimport_core::workflow::ZeroAppliedPolicy;
    use std::time::Duration;

    use crate::config::BatchImportConfig;
    use crate::store::InMemoryStore;

    fn config(zero_applied: ZeroAppliedPolicy) -> SessionConfig {
        SessionConfig {
            batch: BatchImportConfig {
                delay_between_batches: Duration::ZERO,
                retry_attempts: 0,
                ..Default::default()
            },
            zero_applied,
        }
    }

    const WORKBOOK: &[u8] = br#"{
        "departments": [
            {"dept_code": "ENG", "name": "Engineering", "parent_dept_code": "HQ"},
            {"dept_code": "HQ", "name": "Head Office"}
        ],
        "positions": [
            {"pos_code": "CTO", "title": "CTO", "dept_code": "ENG", "is_manager": "yes"},
            {"pos_code": "DEV", "title": "Developer", "dept_code": "ENG", "reports_to_pos_code": "CTO"}
        ]
    }"#;

    #[tokio::test]
    async fn imports_a_clean_workbook() {
        let store = Arc::new(InMemoryStore::new());
        let mut session = ImportSession::new(store.clone(), config(ZeroAppliedPolicy::Error));

        let preview = session.upload("org.json", WORKBOOK.to_vec()).await.unwrap();
        assert!(preview.is_submittable());
        assert_eq!(preview.summary.total_rows, 4);

        session.confirm().unwrap();
        let step = session.run().await.unwrap();
        assert_matches!(step, ImportStep::Success { result, .. } if result.departments_created == 2 && result.positions_created == 2);

        assert_eq!(store.count(EntityKind::Department).await, 2);
        assert_eq!(store.count(EntityKind::Position).await, 2);
    }

    #[tokio::test]
    async fn existing_codes_become_updates() {
        let existing = ExistingKeys::new(["HQ".to_string()].into_iter().collect(), Default::default());
        let store = Arc::new(InMemoryStore::with_existing(&existing));
        let mut session = ImportSession::new(store, config(ZeroAppliedPolicy::Error));

        let preview = session.upload("org.json", WORKBOOK.to_vec()).await.unwrap();
        assert_eq!(preview.summary.departments.update, 1);
        assert_eq!(preview.summary.departments.create, 1);

        session.confirm().unwrap();
        let step = session.run().await.unwrap();
        assert_matches!(step, ImportStep::Success { result, .. } if result.departments_updated == 1);
    }

    #[tokio::test]
    async fn blocking_findings_stop_at_preview() {
        let store = Arc::new(InMemoryStore::new());
        let mut session = ImportSession::new(store, config(ZeroAppliedPolicy::Error));
        let bytes = br#"{"departments": [
            {"dept_code": "A", "name": "A", "parent_dept_code": "B"},
            {"dept_code": "B", "name": "B", "parent_dept_code": "A"}
        ]}"#;

        let preview = session.upload("loop.json", bytes.to_vec()).await.unwrap();
        assert!(!preview.is_submittable());

        assert_matches!(
            session.confirm(),
            Err(PipelineError::Core(CoreError::Validation(_)))
        );
        assert_eq!(session.step().name(), "preview");
        assert!(session.controller().is_err());
    }

    #[tokio::test]
    async fn structural_errors_end_in_error_step() {
        let store = Arc::new(InMemoryStore::new());
        let mut session = ImportSession::new(store, config(ZeroAppliedPolicy::Error));
        let bytes = br#"{"departments": [{"name": "No code column"}]}"#;

        let err = session.upload("bad.json", bytes.to_vec()).await.unwrap_err();
        assert_matches!(err, PipelineError::Core(CoreError::Structural(_)));
        assert_matches!(
            session.step(),
            ImportStep::Error { category: ErrorCategory::Structural, .. }
        );

        session.reset();
        assert_matches!(session.step(), ImportStep::Idle);
    }

    #[tokio::test]
    async fn nothing_applied_follows_the_policy() {
        // Every create collides with a code the store already has, but the
        // preview was built against an empty key set.
        let store = Arc::new(InMemoryStore::new());
        let mut session = ImportSession::new(store.clone(), config(ZeroAppliedPolicy::NoChanges));
        session
            .upload("org.json", br#"{"departments": [{"dept_code": "HQ", "name": "HQ"}]}"#.to_vec())
            .await
            .unwrap();
        session.confirm().unwrap();
        store
            .apply(&[orgimport_core::batching::BatchImportItem::new(
                "seed",
                "department.create",
                serde_json::json!({ "code": "HQ" }),
            )])
            .await
            .unwrap();

        let step = session.run().await.unwrap();
        assert_matches!(step, ImportStep::NoChanges { .. });
    }

    #[test]
    fn failing_outside_a_run_keeps_the_step() {
        let store = Arc::new(InMemoryStore::new());
        let mut session = ImportSession::new(store, config(ZeroAppliedPolicy::Error));

        let err = session.fail(
            ErrorCategory::Execution,
            PipelineError::Store("connection reset".to_string()),
        );
        assert_matches!(err, PipelineError::Store(msg) if msg == "connection reset");
        assert_matches!(session.step(), ImportStep::Idle);
    }

    #[tokio::test]
    async fn cancelled_run_returns_to_idle() {
        let store = Arc::new(InMemoryStore::new());
        let mut session = ImportSession::new(store, config(ZeroAppliedPolicy::Error));
        session.upload("org.json", WORKBOOK.to_vec()).await.unwrap();
        session.confirm().unwrap();

        let controller = session.controller().unwrap();
        controller.handle().cancel();
        let step = session.execute(controller).await.unwrap();
        assert_matches!(step, ImportStep::Idle);
    }
}
