//! # Ingestion Orchestrator
//!
//! Root actor of the ingestion workflow. It owns the [`OrchestratorContext`],
//! hosts the file-selection child while files are being chosen, and runs the
//! submission and polling steps itself.
//!
//! ## Architecture
//!
//! The actor is a single tokio task fed by three channels, drained in this
//! priority order:
//!
//! 1. messages from the file-selection child, in emission order
//! 2. completions of service invocations and of the polling timer
//! 3. commands from [`OrchestratorHandle`] (bounded)
//!
//! Service calls run as spawned tasks tagged with the epoch of the state
//! that started them. Leaving a state aborts its invocation and bumps the
//! epoch, so a completion that was already queued is recognised as stale
//! and dropped without touching the context.
//!
//! ## Observing the workflow
//!
//! Every processed message publishes a fresh [`OrchestratorSnapshot`] on a
//! `watch` channel and every transition is broadcast as a
//! [`TransitionEvent`].

use super::actor::WorkflowActor;
use super::events::{ChildMessage, OrchestratorEvent};
use super::file_selection::{FileSelectionActor, FileSelectionHandle, FileSelectionInput};
use super::merge::apply_file_set;
use super::selectors;
use super::states::{FileSelectionState, RootState};
use crate::config::IngestionConfig;
use crate::constants::error_codes;
use crate::error::{IngestionError, Result};
use crate::events::{EventPublisher, TransitionEvent};
use crate::logging::{log_error, log_service_call, log_transition};
use crate::models::{
    ErrorEntry, FileSet, FlowKind, JobHandle, JobProgress, MergePolicy, OrchestratorContext,
    SelectionMode,
};
use crate::services::{
    DirectoryEntry, IngestionServices, RestoredJob, ServiceError, ServiceResult,
    SubmissionReceipt, SubmissionRequest,
};
use futures::future::{BoxFuture, FutureExt};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

/// Point-in-time view of the orchestrator
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrchestratorSnapshot {
    pub state: RootState,
    /// State of the file-selection child, while one is running
    pub child_state: Option<FileSelectionState>,
    pub context: OrchestratorContext,
}

impl OrchestratorSnapshot {
    pub fn is_loading(&self) -> bool {
        selectors::is_loading(self.state, self.child_state)
    }

    pub fn files_selected(&self) -> bool {
        selectors::files_selected(&self.context)
    }
}

/// Commands accepted by the actor loop
#[derive(Debug)]
enum OrchestratorCommand {
    Dispatch(OrchestratorEvent),
    Shutdown { resp: oneshot::Sender<()> },
}

/// Outcome of an invocation or timer started by a state
#[derive(Debug)]
enum Completion {
    ActiveJobFetched(ServiceResult<Option<String>>),
    Submitted(ServiceResult<SubmissionReceipt>),
    Polled(ServiceResult<JobProgress>),
    Restored(ServiceResult<RestoredJob>),
    PollIntervalElapsed,
}

impl Completion {
    fn kind(&self) -> &'static str {
        match self {
            Self::ActiveJobFetched(_) => "active_job_fetched",
            Self::Submitted(_) => "job_submitted",
            Self::Polled(_) => "job_polled",
            Self::Restored(_) => "job_restored",
            Self::PollIntervalElapsed => "poll_interval_elapsed",
        }
    }
}

#[derive(Debug)]
struct TaggedCompletion {
    epoch: u64,
    completion: Completion,
}

/// Running file-selection child and the receiving end of its messages.
///
/// Both halves are dropped together, so messages of a stopped child are
/// never applied.
struct ChildLink {
    handle: FileSelectionHandle,
    messages: mpsc::UnboundedReceiver<ChildMessage>,
}

/// Whether the actor loop should keep running after a message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

pub struct IngestionOrchestrator {
    services: Arc<dyn IngestionServices>,
    config: IngestionConfig,
    state: RootState,
    context: OrchestratorContext,
    epoch: u64,
    invocation: Option<JoinHandle<()>>,
    child: Option<ChildLink>,
    child_state: Option<FileSelectionState>,
    completions_tx: mpsc::UnboundedSender<TaggedCompletion>,
    completions_rx: mpsc::UnboundedReceiver<TaggedCompletion>,
    snapshots: watch::Sender<OrchestratorSnapshot>,
    publisher: EventPublisher,
}

impl WorkflowActor for IngestionOrchestrator {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn started(&mut self) -> Result<()> {
        info!(
            actor = %self.name(),
            poll_interval_ms = self.config.polling.interval_ms,
            default_mode = %self.config.selection.default_mode,
            "Ingestion orchestrator started"
        );
        Ok(())
    }

    fn stopped(&mut self) -> Result<()> {
        self.cancel_invocation();
        self.stop_child();
        info!(actor = %self.name(), state = %self.state, "Ingestion orchestrator stopped");
        Ok(())
    }
}

impl IngestionOrchestrator {
    pub const NAME: &'static str = "IngestionOrchestrator";

    pub fn new(services: Arc<dyn IngestionServices>, config: IngestionConfig) -> Self {
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        let context = OrchestratorContext::new(
            FlowKind::New,
            config.selection.default_mode,
            FileSet::missing(&config.selection.labels),
        );
        let (snapshots, _) = watch::channel(OrchestratorSnapshot {
            state: RootState::Idle,
            child_state: None,
            context: context.clone(),
        });
        let publisher = EventPublisher::new(config.channels.transition_event_capacity);

        Self {
            services,
            config,
            state: RootState::Idle,
            context,
            epoch: 0,
            invocation: None,
            child: None,
            child_state: None,
            completions_tx,
            completions_rx,
            snapshots,
            publisher,
        }
    }

    /// Start the actor loop and return the handle that drives it
    pub fn spawn(self) -> OrchestratorHandle {
        let (commands, inbox) = mpsc::channel(self.config.channels.event_buffer_size);
        let snapshots = self.snapshots.subscribe();
        let publisher = self.publisher.clone();
        let services = self.services.clone();
        let task = tokio::spawn(self.run(inbox));

        OrchestratorHandle {
            commands,
            snapshots,
            publisher,
            services,
            task: Some(task),
        }
    }

    async fn run(mut self, mut inbox: mpsc::Receiver<OrchestratorCommand>) {
        if let Err(e) = self.started() {
            log_error(self.name(), "start", &e.to_string(), None);
            return;
        }

        loop {
            let flow = tokio::select! {
                biased;

                message = recv_child(&mut self.child) => match message {
                    Some(message) => self.handle_child_message(message),
                    None => {
                        warn!(actor = %self.name(), "File selection actor ended unexpectedly");
                        self.child = None;
                        self.child_state = None;
                        Flow::Continue
                    }
                },
                Some(tagged) = self.completions_rx.recv() => self.handle_completion(tagged),
                command = inbox.recv() => match command {
                    Some(OrchestratorCommand::Dispatch(event)) => self.handle_event(event),
                    Some(OrchestratorCommand::Shutdown { resp }) => {
                        // The receiver may have given up waiting
                        let _ = resp.send(());
                        Flow::Stop
                    }
                    None => Flow::Stop,
                },
            };

            if flow == Flow::Stop {
                // Senders must see the inbox closed once the final snapshot is visible
                inbox.close();
                self.publish_snapshot();
                break;
            }
            self.publish_snapshot();
        }

        if let Err(e) = self.stopped() {
            log_error(self.name(), "stop", &e.to_string(), None);
        }
    }

    fn handle_event(&mut self, event: OrchestratorEvent) -> Flow {
        debug!(
            actor = %self.name(),
            state = %self.state,
            event = event.event_type(),
            "Handling orchestrator event"
        );

        if matches!(event, OrchestratorEvent::Retry) && !self.state.is_terminal() {
            self.stop_child();
            self.context.clear_errors();
            return self.transition(RootState::Idle, "RETRY");
        }

        match (self.state, event) {
            (RootState::Idle, OrchestratorEvent::StartNew) => {
                self.reset_context(FlowKind::New, None);
                self.transition(RootState::FileSelection, "START_NEW")
            }
            (RootState::Idle, OrchestratorEvent::StartUpdate { product_id }) => {
                self.reset_context(FlowKind::Update, Some(product_id));
                self.transition(RootState::StartUpdate, "START_UPDATE")
            }
            (RootState::Idle, OrchestratorEvent::Restore { job_id }) => {
                self.context.job = Some(JobHandle::for_job(job_id));
                self.transition(RootState::RestoreJob, "RESTORE")
            }
            (
                RootState::Idle,
                OrchestratorEvent::Submit {
                    form_data,
                    resolution_value,
                },
            ) => {
                // Completeness is gated by the caller; see selectors::can_submit
                self.context.form_data = Some(form_data);
                self.context.resolution_value = resolution_value;
                self.transition(RootState::JobSubmission, "SUBMIT")
            }
            (RootState::Idle | RootState::FileSelection, event)
                if event.as_file_selection().is_some() =>
            {
                let trigger = event.event_type();
                if self.state == RootState::Idle {
                    self.transition(RootState::FileSelection, trigger);
                }
                self.forward_to_child(&event);
                Flow::Continue
            }
            (state, event) => {
                debug!(
                    actor = %self.name(),
                    state = %state,
                    event = event.event_type(),
                    "Event not accepted in current state, ignoring"
                );
                Flow::Continue
            }
        }
    }

    fn handle_child_message(&mut self, message: ChildMessage) -> Flow {
        match message {
            ChildMessage::SetSelectionMode(mode) => {
                self.context.selection_mode = mode;
            }
            ChildMessage::SetFiles { files, policy } => {
                self.context.file_set = apply_file_set(&self.context.file_set, &files, policy);
            }
            ChildMessage::FilesSelected => {
                if self.state == RootState::FileSelection {
                    return self.transition(RootState::Idle, "files_selected");
                }
            }
            ChildMessage::ReportError(entry) => {
                self.context.record_error(entry);
            }
            ChildMessage::ClearErrors => {
                self.context.clear_errors();
            }
            ChildMessage::StateChanged(state) => {
                self.child_state = Some(state);
                self.publish(TransitionEvent::file_selection(state));
            }
        }
        Flow::Continue
    }

    fn handle_completion(&mut self, tagged: TaggedCompletion) -> Flow {
        let TaggedCompletion { epoch, completion } = tagged;
        if epoch != self.epoch {
            debug!(
                actor = %self.name(),
                completion = completion.kind(),
                completion_epoch = epoch,
                current_epoch = self.epoch,
                "Discarding stale completion"
            );
            return Flow::Continue;
        }
        // The invocation has finished on its own
        self.invocation = None;

        match (self.state, completion) {
            (RootState::StartUpdate, Completion::ActiveJobFetched(result)) => match result {
                Ok(Some(job_id)) => {
                    self.context.job = Some(JobHandle::for_job(job_id));
                    self.transition(RootState::RestoreJob, "active_job_found")
                }
                Ok(None) => {
                    self.context.flow_kind = FlowKind::Update;
                    self.context.selection_mode = self.config.selection.default_mode;
                    self.transition(RootState::FileSelection, "no_active_job")
                }
                Err(e) => self.fail(e, error_codes::ACTIVE_JOB_LOOKUP),
            },
            (RootState::JobSubmission, Completion::Submitted(result)) => match result {
                Ok(receipt) => {
                    info!(actor = %self.name(), job_id = %receipt.job_id, "Ingestion job submitted");
                    self.context.job = Some(JobHandle::for_job(receipt.job_id));
                    self.transition(RootState::JobPolling, "job_submitted")
                }
                Err(e) => self.fail(e, error_codes::JOB_SUBMISSION),
            },
            (RootState::JobPolling, Completion::Polled(result)) => match result {
                Ok(progress) => {
                    let job = self.context.job.take().unwrap_or_default().advanced(progress);
                    let terminal = job.is_terminal();
                    debug!(
                        actor = %self.name(),
                        job_id = job.job_id.as_deref(),
                        status = ?job.status,
                        percentage = job.percentage,
                        "Job progress"
                    );
                    self.context.job = Some(job);
                    if terminal {
                        self.transition(RootState::Done, "terminal_status")
                    } else {
                        self.transition(RootState::JobPollingWait, "transient_status")
                    }
                }
                Err(e) => self.fail(e, error_codes::JOB_POLLING),
            },
            (RootState::RestoreJob, Completion::Restored(result)) => match result {
                Ok(restored) => {
                    self.apply_restored(restored);
                    self.transition(RootState::JobPolling, "job_restored")
                }
                Err(e) => self.fail(e, error_codes::JOB_RESTORE),
            },
            (RootState::JobPollingWait, Completion::PollIntervalElapsed) => {
                self.transition(RootState::JobPolling, "poll_interval_elapsed")
            }
            (state, completion) => {
                warn!(
                    actor = %self.name(),
                    state = %state,
                    completion = completion.kind(),
                    "Completion does not belong to current state, ignoring"
                );
                Flow::Continue
            }
        }
    }

    /// Exit the current state, enter `to` and run its entry action
    fn transition(&mut self, to: RootState, trigger: &str) -> Flow {
        self.cancel_invocation();
        let from = self.state;
        log_transition(self.name(), &from.to_string(), &to.to_string(), trigger);
        self.state = to;
        self.publish(TransitionEvent::root(from, to, trigger));

        match to {
            RootState::Idle => Flow::Continue,
            RootState::StartUpdate => {
                let product_id = self.context.product_id.clone().unwrap_or_default();
                let services = self.services.clone();
                self.invoke("fetch_active_job_for_product", Some(product_id.clone()), async move {
                    Completion::ActiveJobFetched(
                        services.fetch_active_job_for_product(&product_id).await,
                    )
                });
                Flow::Continue
            }
            RootState::FileSelection => {
                self.ensure_child();
                Flow::Continue
            }
            RootState::JobSubmission => {
                self.stop_child();
                let request = SubmissionRequest {
                    file_set: self.context.file_set.clone(),
                    resolution_value: self.context.resolution_value,
                    form_data: self.context.form_data.clone().unwrap_or_default(),
                    flow_kind: self.context.flow_kind,
                };
                let services = self.services.clone();
                self.invoke("submit_ingestion_job", None, async move {
                    Completion::Submitted(services.submit_ingestion_job(request).await)
                });
                Flow::Continue
            }
            RootState::JobPolling => {
                let Some(job_id) = self.context.job_id().map(str::to_owned) else {
                    let entry = ErrorEntry::logic(error_codes::JOB_POLLING, "No job to poll")
                        .with_policy(MergePolicy::Override);
                    self.context.record_error(entry);
                    return self.transition(RootState::Idle, "missing_job_id");
                };
                let services = self.services.clone();
                self.invoke("poll_job_once", Some(job_id.clone()), async move {
                    Completion::Polled(services.poll_job_once(&job_id).await)
                });
                Flow::Continue
            }
            RootState::JobPollingWait => {
                let interval = self.config.polling.interval();
                self.invoke("poll_interval", None, async move {
                    tokio::time::sleep(interval).await;
                    Completion::PollIntervalElapsed
                });
                Flow::Continue
            }
            RootState::RestoreJob => {
                self.stop_child();
                let job_id = self.context.job_id().map(str::to_owned).unwrap_or_default();
                let services = self.services.clone();
                self.invoke("restore_job_by_id", Some(job_id.clone()), async move {
                    Completion::Restored(services.restore_job_by_id(&job_id).await)
                });
                Flow::Continue
            }
            RootState::Done => {
                self.stop_child();
                info!(
                    actor = %self.name(),
                    job_id = self.context.job_id(),
                    "Ingestion job reached a terminal status"
                );
                Flow::Stop
            }
        }
    }

    /// Record a failed invocation and return to `idle`.
    ///
    /// Job-level failures replace earlier errors.
    fn fail(&mut self, error: ServiceError, operation_code: &str) -> Flow {
        log_error(
            self.name(),
            operation_code,
            &error.to_string(),
            Some(self.state.to_string().as_str()),
        );
        let entry = error
            .to_error_entry(operation_code)
            .with_policy(MergePolicy::Override);
        self.context.record_error(entry);
        self.transition(RootState::Idle, "error")
    }

    fn invoke<F>(&mut self, operation: &str, target: Option<String>, future: F)
    where
        F: std::future::Future<Output = Completion> + Send + 'static,
    {
        let future: BoxFuture<'static, Completion> = future.boxed();
        let epoch = self.epoch;
        let completions = self.completions_tx.clone();
        log_service_call(self.name(), operation, target.as_deref(), Some(epoch));

        self.invocation = Some(tokio::spawn(async move {
            let completion = future.await;
            // The actor stops listening once it shuts down
            let _ = completions.send(TaggedCompletion { epoch, completion });
        }));
    }

    fn cancel_invocation(&mut self) {
        if let Some(invocation) = self.invocation.take() {
            invocation.abort();
            debug!(actor = %self.name(), epoch = self.epoch, "Cancelled in-flight invocation");
        }
        self.epoch += 1;
    }

    fn ensure_child(&mut self) {
        if self.child.is_some() {
            return;
        }
        let (outbox, messages) = mpsc::unbounded_channel();
        let input = FileSelectionInput {
            selection_mode: self.context.selection_mode,
            file_set: self.context.file_set.clone(),
        };
        debug!(actor = %self.name(), mode = %input.selection_mode, "Starting file selection actor");
        let handle = FileSelectionActor::start(
            self.services.clone(),
            self.config.selection.clone(),
            input,
            outbox,
        );
        self.child = Some(ChildLink { handle, messages });
    }

    fn stop_child(&mut self) {
        if self.child.take().is_some() {
            debug!(actor = %self.name(), "Stopped file selection actor");
        }
        self.child_state = None;
    }

    fn forward_to_child(&mut self, event: &OrchestratorEvent) {
        let Some(child_event) = event.as_file_selection() else {
            return;
        };
        self.ensure_child();
        if let Some(link) = &self.child {
            if let Err(e) = link.handle.send(child_event) {
                log_error(self.name(), "forward_to_child", &e.to_string(), Some(event.event_type()));
                self.child = None;
                self.child_state = None;
            }
        }
    }

    fn reset_context(&mut self, flow_kind: FlowKind, product_id: Option<String>) {
        self.stop_child();
        self.context = OrchestratorContext::new(
            flow_kind,
            self.config.selection.default_mode,
            FileSet::missing(&self.config.selection.labels),
        );
        self.context.product_id = product_id;
    }

    fn apply_restored(&mut self, restored: RestoredJob) {
        let requested = self.context.job_id().map(str::to_owned);
        let mut job = restored.job;
        if job.job_id.is_none() {
            job.job_id = requested;
        }
        self.context = OrchestratorContext {
            flow_kind: restored.flow_kind,
            selection_mode: SelectionMode::Restore,
            file_set: restored.file_set,
            product_id: self.context.product_id.take(),
            resolution_value: restored.resolution_value,
            form_data: Some(restored.form_data),
            job: Some(job),
            errors: Vec::new(),
        };
    }

    fn publish(&self, event: TransitionEvent) {
        let delivered = self.publisher.publish(event);
        trace!(actor = %self.name(), delivered, "Transition published");
    }

    fn publish_snapshot(&self) {
        self.snapshots.send_replace(OrchestratorSnapshot {
            state: self.state,
            child_state: self.child_state,
            context: self.context.clone(),
        });
    }
}

async fn recv_child(child: &mut Option<ChildLink>) -> Option<ChildMessage> {
    match child {
        Some(link) => link.messages.recv().await,
        None => std::future::pending().await,
    }
}

/// Handle to a running [`IngestionOrchestrator`].
///
/// Dropping the handle closes the event inbox, which stops the actor.
pub struct OrchestratorHandle {
    commands: mpsc::Sender<OrchestratorCommand>,
    snapshots: watch::Receiver<OrchestratorSnapshot>,
    publisher: EventPublisher,
    services: Arc<dyn IngestionServices>,
    task: Option<JoinHandle<()>>,
}

impl OrchestratorHandle {
    /// Dispatch an event; waits for inbox capacity
    pub async fn send(&self, event: OrchestratorEvent) -> Result<()> {
        self.commands
            .send(OrchestratorCommand::Dispatch(event))
            .await
            .map_err(|_| IngestionError::channel_closed(IngestionOrchestrator::NAME))
    }

    pub fn snapshot(&self) -> OrchestratorSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn state(&self) -> RootState {
        self.snapshots.borrow().state
    }

    pub fn is_loading(&self) -> bool {
        self.snapshots.borrow().is_loading()
    }

    /// Receiver of every snapshot published from now on
    pub fn watch(&self) -> watch::Receiver<OrchestratorSnapshot> {
        self.snapshots.clone()
    }

    pub fn subscribe_transitions(&self) -> broadcast::Receiver<TransitionEvent> {
        self.publisher.subscribe()
    }

    /// Wait until a snapshot satisfies `predicate`.
    ///
    /// The current snapshot is checked first. Fails with
    /// [`IngestionError::Timeout`] after `timeout`, or with
    /// [`IngestionError::ChannelClosed`] if the actor stops first.
    pub async fn wait_for<F>(&self, mut predicate: F, timeout: Duration) -> Result<OrchestratorSnapshot>
    where
        F: FnMut(&OrchestratorSnapshot) -> bool,
    {
        let mut snapshots = self.snapshots.clone();
        // the watch guard must drop before `snapshots`
        let outcome = match tokio::time::timeout(timeout, snapshots.wait_for(|s| predicate(s))).await {
            Ok(Ok(snapshot)) => Ok(snapshot.clone()),
            Ok(Err(_)) => Err(IngestionError::channel_closed(IngestionOrchestrator::NAME)),
            Err(_) => Err(IngestionError::Timeout { waited: timeout }),
        };
        outcome
    }

    /// Wait until the root machine is in `state`
    pub async fn wait_for_state(&self, state: RootState, timeout: Duration) -> Result<OrchestratorSnapshot> {
        self.wait_for(|s| s.state == state, timeout).await
    }

    /// List a directory for a file picker
    pub async fn browse(&self, directory: &str) -> Result<Vec<DirectoryEntry>> {
        log_service_call(IngestionOrchestrator::NAME, "fetch_directory_listing", Some(directory), None);
        Ok(self.services.fetch_directory_listing(directory).await?)
    }

    /// Stop the actor and wait for its loop to exit
    pub async fn shutdown(mut self) -> Result<()> {
        let (resp, ack) = oneshot::channel();
        if self
            .commands
            .send(OrchestratorCommand::Shutdown { resp })
            .await
            .is_ok()
        {
            // The actor may stop on its own before acknowledging
            let _ = ack.await;
        }

        match self.task.take() {
            Some(task) => task
                .await
                .map_err(|e| IngestionError::StateTransition(format!("orchestrator task failed: {e}"))),
            None => Ok(()),
        }
    }
}
