//! Per-view coordination state machine.
//!
//! One coordinator task exists per view identity; the
//! [`crate::manager::ViewManager`] creates it on first reference and it
//! lives for the rest of the process. The coordinator consumes its mailbox
//! one message at a time, so all state is owned exclusively and never
//! locked.
//!
//! ```text
//!              Materialize                    deps answered,
//!  ┌─────────┐ (has deps)  ┌─────────┐       stale or drifted   ┌──────────────┐
//!  │ INITIAL │────────────►│ WAITING │─────────────────────────►│ TRANSFORMING │
//!  └─────────┘             └─────────┘                          └──────────────┘
//!       ▲                       │ no dep had data                  │         │
//!       │                       ▼                          success │         │ failure
//!       │                  (NoData reply)                          ▼         ▼
//!       │                       │                        ┌──────────────┐ ┌──────────┐
//!       └───────────────────────┘                        │ MATERIALIZED │ │ RETRYING │
//!                                                        └──────────────┘ └──────────┘
//!                                                                │ backoff expired: │
//!                                                                │ re-transform, or │
//!                                                                ▼ exhausted        ▼
//!                                                          (reload on         ┌────────┐
//!                                                           new data)         │ FAILED │
//!                                                                             └────────┘
//! ```
//!
//! A round's partial-failure flags (`incomplete`, `with_errors`) are sticky
//! within the round, carried into every `Materialized` reply, and dropped
//! either when a no-data round ends or on `Invalidate`.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tracing::{debug, info, warn, Instrument};

use strata_core::observability::coordinator_span;
use strata_core::{success_marker_path, RequestId, ViewId};

use crate::manager::ViewManager;
use crate::messages::{Message, Outcome, Reply, StatusReport};
use crate::runner::ActionResult;
use crate::schema::VersionCheck;
use crate::view::ViewSpec;

/// The coordinator states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Never materialized (or reset); the next `Materialize` starts a round.
    Initial,
    /// A round is collecting dependency answers.
    Waiting,
    /// A transformation attempt is running, `retries` of them already spent.
    Transforming {
        /// Retry count of the running attempt (`0` = first attempt).
        retries: u32,
    },
    /// An attempt failed; a backoff timer is pending.
    Retrying {
        /// Retry count of the attempt that failed.
        retries: u32,
    },
    /// Data is present and fresh; requests are answered from memo.
    Materialized,
    /// Retries are exhausted; only `Invalidate` or new upstream data recover.
    Failed,
}

impl Phase {
    /// Returns a lowercase label suitable for metrics and logs.
    #[must_use]
    pub const fn as_label(&self) -> &'static str {
        match self {
            Self::Initial => "initial",
            Self::Waiting => "waiting",
            Self::Transforming { .. } => "transforming",
            Self::Retrying { .. } => "retrying",
            Self::Materialized => "materialized",
            Self::Failed => "failed",
        }
    }
}

/// Bounds an external call; a missed deadline is an error outcome, not a
/// panic or an unbounded stall.
async fn bounded<T>(
    operation: &'static str,
    limit: Duration,
    call: impl Future<Output = strata_core::Result<T>>,
) -> strata_core::Result<T> {
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(strata_core::Error::timeout(
            operation,
            format!("exceeded {}ms", limit.as_millis()),
        )),
    }
}

/// The per-view state machine task.
pub(crate) struct ViewCoordinator {
    view: Arc<ViewSpec>,
    manager: ViewManager,
    /// Own mailbox sender, for timers, runner verdicts, and reload posts.
    mailbox: mpsc::UnboundedSender<Message>,
    phase: Phase,
    /// Static upstream set; `NewDataAvailable` notifications are filtered
    /// against it.
    dependency_ids: HashSet<ViewId>,

    // Round state.
    waiters: Vec<Reply>,
    pending_deps: HashSet<ViewId>,
    one_dependency_returned_data: bool,
    round_request: Option<RequestId>,
    round_started: Option<Instant>,

    // Sticky across a round; carried in Materialized replies.
    incomplete: bool,
    with_errors: bool,
    deps_freshness: u64,

    /// Timestamp of the most recent successful transformation
    /// (milliseconds since epoch; 0 = never).
    last_transformed_ts: u64,
}

/// Spawns the coordinator task for a view.
pub(crate) fn spawn(
    view: Arc<ViewSpec>,
    manager: ViewManager,
    mailbox: mpsc::UnboundedSender<Message>,
    inbox: mpsc::UnboundedReceiver<Message>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        ViewCoordinator::new(view, manager, mailbox).run(inbox).await;
    })
}

impl ViewCoordinator {
    fn new(
        view: Arc<ViewSpec>,
        manager: ViewManager,
        mailbox: mpsc::UnboundedSender<Message>,
    ) -> Self {
        let dependency_ids = view.dependency_ids().into_iter().collect();
        Self {
            view,
            manager,
            mailbox,
            phase: Phase::Initial,
            dependency_ids,
            waiters: Vec::new(),
            pending_deps: HashSet::new(),
            one_dependency_returned_data: false,
            round_request: None,
            round_started: None,
            incomplete: false,
            with_errors: false,
            deps_freshness: 0,
            last_transformed_ts: 0,
        }
    }

    async fn run(mut self, mut inbox: mpsc::UnboundedReceiver<Message>) {
        self.recover_freshness().await;
        while let Some(message) = inbox.recv().await {
            let span = coordinator_span(message.as_label(), &self.view.name);
            self.handle(message).instrument(span).await;
        }
        debug!(view = %self.view.name, "coordinator mailbox closed");
    }

    /// The scheduler holds no durable state; freshness is re-derived lazily
    /// from the schema service when a coordinator comes up.
    async fn recover_freshness(&mut self) {
        let schema = self.manager.schema();
        let limit = self.manager.config().schema_action_timeout;
        match bounded(
            "get_transformation_timestamp",
            limit,
            schema.get_transformation_timestamp(self.view.as_ref()),
        )
        .await
        {
            Ok(ts) => {
                if ts > 0 {
                    debug!(view = %self.view.name, ts, "recovered transformation timestamp");
                }
                self.last_transformed_ts = ts;
            }
            Err(e) => {
                warn!(view = %self.view.name, error = %e, "could not recover transformation timestamp");
            }
        }
    }

    fn id(&self) -> ViewId {
        self.view.id()
    }

    fn set_phase(&mut self, next: Phase) {
        if self.phase != next {
            debug!(
                view = %self.view.name,
                from = self.phase.as_label(),
                to = next.as_label(),
                "state transition"
            );
            self.manager
                .metrics()
                .record_transition(self.phase.as_label(), next.as_label());
        }
        self.phase = next;
    }

    async fn handle(&mut self, message: Message) {
        match message {
            Message::Materialize { request, reply } => self.on_materialize(request, reply).await,
            Message::Invalidate => self.on_invalidate(),
            Message::NewDataAvailable { view } => self.on_new_data(view).await,
            Message::GetStatus { reply } => self.on_get_status(reply),
            Message::ActionFinished { result } => self.on_action_finished(result).await,
            Message::Retry => self.on_retry().await,
            Message::DependencyAnswered { outcome } => self.on_dependency_answered(outcome).await,
        }
    }

    // ------------------------------------------------------------------
    // Message handlers
    // ------------------------------------------------------------------

    async fn on_materialize(&mut self, request: RequestId, reply: Reply) {
        self.manager.metrics().record_request(self.phase.as_label());
        match self.phase {
            Phase::Initial => self.start_round(request, reply).await,
            Phase::Waiting | Phase::Transforming { .. } | Phase::Retrying { .. } => {
                debug!(view = %self.view.name, %request, "joining in-flight round");
                self.waiters.push(reply);
            }
            Phase::Materialized => {
                reply.send(Outcome::Materialized {
                    view: self.id(),
                    incomplete: self.incomplete,
                    transformed_at: self.last_transformed_ts,
                    with_errors: self.with_errors,
                });
            }
            Phase::Failed => {
                reply.send(Outcome::Failed { view: self.id() });
            }
        }
    }

    fn on_invalidate(&mut self) {
        match self.phase {
            Phase::Initial => debug!(view = %self.view.name, "nothing memoized to invalidate"),
            Phase::Materialized | Phase::Failed => {
                info!(view = %self.view.name, "invalidated; memoized state dropped");
                self.last_transformed_ts = 0;
                self.reset_flags();
                self.set_phase(Phase::Initial);
            }
            Phase::Waiting | Phase::Transforming { .. } | Phase::Retrying { .. } => {
                warn!(
                    view = %self.view.name,
                    state = self.phase.as_label(),
                    "invalidate ignored while a round is in flight"
                );
            }
        }
    }

    async fn on_new_data(&mut self, upstream: ViewId) {
        match self.phase {
            Phase::Materialized | Phase::Failed => {
                if self.dependency_ids.contains(&upstream) {
                    info!(
                        view = %self.view.name,
                        upstream = %upstream.short(),
                        "upstream has new data; reloading"
                    );
                    self.reload().await;
                } else {
                    debug!(view = %self.view.name, upstream = %upstream.short(), "not an upstream");
                }
            }
            // An in-flight round already supersedes the notification.
            _ => debug!(
                view = %self.view.name,
                state = self.phase.as_label(),
                "new-data notification ignored in flight"
            ),
        }
    }

    fn on_get_status(&self, reply: tokio::sync::oneshot::Sender<StatusReport>) {
        let report = StatusReport {
            view: self.id(),
            name: self.view.name.clone(),
            state: self.phase.as_label().to_string(),
            waiters: self.waiters.len(),
            pending_dependencies: self.pending_deps.len(),
        };
        if reply.send(report).is_err() {
            debug!(view = %self.view.name, "status requester gone");
        }
    }

    async fn on_action_finished(&mut self, result: ActionResult) {
        match self.phase {
            Phase::Transforming { retries } => {
                self.manager.metrics().record_transformation(result.as_label());
                match result {
                    ActionResult::Success => self.complete_transformation(retries).await,
                    ActionResult::Failure { message } => {
                        warn!(
                            view = %self.view.name,
                            attempt = retries,
                            error = %message,
                            "transformation attempt failed"
                        );
                        self.schedule_retry(retries);
                    }
                }
            }
            Phase::Failed => self.unexpected_in_failed("action verdict"),
            _ => debug!(
                view = %self.view.name,
                state = self.phase.as_label(),
                "stale action verdict"
            ),
        }
    }

    async fn on_retry(&mut self) {
        match self.phase {
            Phase::Retrying { retries } => {
                if retries <= self.manager.config().max_retries {
                    self.transform(retries + 1).await;
                } else {
                    warn!(view = %self.view.name, retries, "retries exhausted");
                    self.drain_waiters(Outcome::Failed { view: self.id() });
                    self.finish_round("failed");
                    self.set_phase(Phase::Failed);
                }
            }
            Phase::Failed => self.unexpected_in_failed("retry timer"),
            _ => debug!(
                view = %self.view.name,
                state = self.phase.as_label(),
                "stale retry timer"
            ),
        }
    }

    async fn on_dependency_answered(&mut self, outcome: Outcome) {
        if self.phase != Phase::Waiting {
            if self.phase == Phase::Failed {
                self.unexpected_in_failed("dependency answer");
            } else {
                debug!(
                    view = %self.view.name,
                    state = self.phase.as_label(),
                    dep = %outcome.view().short(),
                    "dependency answer outside a waiting round"
                );
            }
            return;
        }

        let dep = outcome.view();
        match outcome {
            Outcome::Materialized {
                incomplete,
                transformed_at,
                with_errors,
                ..
            } => {
                self.one_dependency_returned_data = true;
                self.incomplete |= incomplete;
                self.with_errors |= with_errors;
                self.deps_freshness = self.deps_freshness.max(transformed_at);
            }
            Outcome::NoData { .. } => {
                self.incomplete = true;
            }
            Outcome::Failed { .. } | Outcome::Fatal { .. } => {
                self.incomplete = true;
                self.with_errors = true;
            }
        }
        self.dependency_answered(dep).await;
    }

    // ------------------------------------------------------------------
    // Round logic
    // ------------------------------------------------------------------

    /// Starts a fresh round from `Initial`. The view's shape picks the path:
    /// marker check for `NoOp`, direct transformation for leaves, dependency
    /// fan-out otherwise.
    async fn start_round(&mut self, request: RequestId, reply: Reply) {
        self.begin_round(request);
        if self.view.transformation.is_noop() {
            self.materialize_noop(reply).await;
        } else if self.view.dependencies.is_empty() {
            self.waiters.push(reply);
            self.transform(0).await;
        } else {
            self.waiters.push(reply);
            self.query_dependencies(request);
            if self.pending_deps.is_empty() {
                // Every dependency coordinator was unreachable.
                self.complete_waiting_round().await;
            } else {
                self.set_phase(Phase::Waiting);
            }
        }
    }

    /// A `NoOp` view has no transformation to run: either its data is
    /// already complete (success marker present) or there is nothing to
    /// offer.
    async fn materialize_noop(&mut self, reply: Reply) {
        let store = self.manager.store();
        let marker = success_marker_path(&self.view.full_path);
        let limit = self.manager.config().file_action_timeout;

        match bounded("marker_check", limit, store.exists(&marker)).await {
            Ok(true) => match self.register_external_data().await {
                Ok(ts) => {
                    self.last_transformed_ts = ts;
                    reply.send(Outcome::Materialized {
                        view: self.id(),
                        incomplete: false,
                        transformed_at: ts,
                        with_errors: false,
                    });
                    self.finish_round("materialized");
                    self.set_phase(Phase::Materialized);
                }
                Err(e) => {
                    warn!(
                        view = %self.view.name,
                        error = %e,
                        "metadata registration failed; answering no data"
                    );
                    reply.send(Outcome::NoData { view: self.id() });
                    self.finish_round("no_data");
                }
            },
            Ok(false) => {
                debug!(view = %self.view.name, "no success marker; no data available");
                reply.send(Outcome::NoData { view: self.id() });
                self.finish_round("no_data");
            }
            Err(e) => {
                warn!(view = %self.view.name, error = %e, "marker check failed");
                reply.send(Outcome::NoData { view: self.id() });
                self.finish_round("no_data");
            }
        }
    }

    /// Registers partition and version for externally-managed data, then
    /// resolves the transformation timestamp.
    async fn register_external_data(&mut self) -> strata_core::Result<u64> {
        let schema = self.manager.schema();
        let limit = self.manager.config().schema_action_timeout;
        bounded("add_partition", limit, schema.add_partition(self.view.as_ref())).await?;
        bounded("set_view_version", limit, schema.set_view_version(self.view.as_ref())).await?;
        self.get_or_log_ts().await
    }

    /// Returns the cached transformation timestamp, or records "now" in the
    /// schema service, reads it back, and caches it.
    async fn get_or_log_ts(&mut self) -> strata_core::Result<u64> {
        if self.last_transformed_ts > 0 {
            return Ok(self.last_transformed_ts);
        }
        let schema = self.manager.schema();
        let limit = self.manager.config().schema_action_timeout;
        bounded(
            "log_transformation_timestamp",
            limit,
            schema.log_transformation_timestamp(self.view.as_ref()),
        )
        .await?;
        let ts = bounded(
            "get_transformation_timestamp",
            limit,
            schema.get_transformation_timestamp(self.view.as_ref()),
        )
        .await?;
        self.last_transformed_ts = ts;
        Ok(ts)
    }

    /// Sends `Materialize` to every dependency's coordinator.
    ///
    /// An unreachable dependency coordinator is folded in as a failed
    /// dependency rather than wedging the round.
    fn query_dependencies(&mut self, request: RequestId) {
        let dependencies: Vec<Arc<ViewSpec>> = self.view.dependencies.clone();
        for dep in dependencies {
            let dep_id = dep.id();
            if !self.pending_deps.insert(dep_id) {
                continue; // declared twice; one answer is enough
            }
            let send_result = self.manager.coordinator_for(&dep).and_then(|handle| {
                handle.send(Message::Materialize {
                    request,
                    reply: Reply::Downstream {
                        mailbox: self.mailbox.clone(),
                    },
                })
            });
            if let Err(e) = send_result {
                warn!(
                    view = %self.view.name,
                    dep = %dep.name,
                    error = %e,
                    "dependency coordinator unreachable; treating as failed"
                );
                self.pending_deps.remove(&dep_id);
                self.incomplete = true;
                self.with_errors = true;
            }
        }
    }

    async fn dependency_answered(&mut self, dep: ViewId) {
        if !self.pending_deps.remove(&dep) {
            debug!(
                view = %self.view.name,
                dep = %dep.short(),
                "answer from a dependency that was not pending"
            );
        }
        if self.pending_deps.is_empty() {
            self.complete_waiting_round().await;
        }
    }

    /// All dependencies have answered; decide between transforming,
    /// answering from memo, and reporting no data.
    async fn complete_waiting_round(&mut self) {
        if self.one_dependency_returned_data {
            if self.last_transformed_ts <= self.deps_freshness || self.has_version_mismatch().await
            {
                self.transform(0).await;
            } else {
                debug!(
                    view = %self.view.name,
                    ts = self.last_transformed_ts,
                    deps_freshness = self.deps_freshness,
                    "at least as fresh as dependencies; answering from memo"
                );
                let outcome = Outcome::Materialized {
                    view: self.id(),
                    incomplete: self.incomplete,
                    transformed_at: self.last_transformed_ts,
                    with_errors: self.with_errors,
                };
                self.drain_waiters(outcome);
                self.finish_round("materialized");
                self.set_phase(Phase::Materialized);
            }
        } else {
            debug!(view = %self.view.name, "no dependency returned data");
            self.drain_waiters(Outcome::NoData { view: self.id() });
            self.finish_round("no_data");
            self.reset_flags();
            self.set_phase(Phase::Initial);
        }
    }

    /// True when the stored version digest differs from the view's current
    /// one. Any schema-service failure conservatively counts as a mismatch.
    async fn has_version_mismatch(&self) -> bool {
        let schema = self.manager.schema();
        let limit = self.manager.config().schema_action_timeout;
        match bounded(
            "check_view_version",
            limit,
            schema.check_view_version(self.view.as_ref()),
        )
        .await
        {
            Ok(VersionCheck::Ok) => false,
            Ok(VersionCheck::Mismatch { stored }) => {
                debug!(view = %self.view.name, stored = %stored, "version digest drifted");
                true
            }
            Err(e) => {
                warn!(view = %self.view.name, error = %e, "version check failed; assuming mismatch");
                true
            }
        }
    }

    // ------------------------------------------------------------------
    // Transformation
    // ------------------------------------------------------------------

    /// Runs the transformation preconditions and submits to the action
    /// runner. The verdict re-enters the mailbox as `ActionFinished`; a
    /// precondition failure takes the same path so retry policy applies
    /// uniformly.
    async fn transform(&mut self, retries: u32) {
        self.set_phase(Phase::Transforming { retries });

        if let Err(e) = self.prepare_partition().await {
            warn!(view = %self.view.name, error = %e, "transformation preconditions failed");
            let _ = self.mailbox.send(Message::ActionFinished {
                result: ActionResult::failure(e.to_string()),
            });
            return;
        }

        info!(
            view = %self.view.name,
            attempt = retries,
            transformation = self.view.transformation.name(),
            "submitting transformation"
        );
        let runner = self.manager.runner();
        let view = Arc::clone(&self.view);
        let mailbox = self.mailbox.clone();
        tokio::spawn(async move {
            let result = runner
                .run_transformation(view.as_ref(), &view.transformation)
                .await;
            let _ = mailbox.send(Message::ActionFinished { result });
        });
    }

    /// Registers the partition and version digest, and clears stale
    /// partition data unless the transformation owns the target layout.
    async fn prepare_partition(&self) -> strata_core::Result<()> {
        let schema = self.manager.schema();
        let config = self.manager.config();
        bounded(
            "add_partition",
            config.schema_action_timeout,
            schema.add_partition(self.view.as_ref()),
        )
        .await?;
        bounded(
            "set_view_version",
            config.schema_action_timeout,
            schema.set_view_version(self.view.as_ref()),
        )
        .await?;
        if !self.view.transformation.is_filesystem() {
            let runner = self.manager.runner();
            bounded(
                "delete_partition_data",
                config.file_action_timeout,
                runner.delete(&self.view.full_path, true),
            )
            .await?;
        }
        Ok(())
    }

    /// The runner reported success: write the marker, record freshness,
    /// answer every waiter.
    async fn complete_transformation(&mut self, retries: u32) {
        match self.finalize_partition().await {
            Ok(ts) => {
                self.last_transformed_ts = ts;
                info!(view = %self.view.name, ts, "view materialized");
                let outcome = Outcome::Materialized {
                    view: self.id(),
                    incomplete: self.incomplete,
                    transformed_at: ts,
                    with_errors: self.with_errors,
                };
                self.drain_waiters(outcome);
                self.finish_round("materialized");
                self.set_phase(Phase::Materialized);
            }
            Err(e) => {
                warn!(view = %self.view.name, error = %e, "finalization failed; retrying");
                self.schedule_retry(retries);
            }
        }
    }

    async fn finalize_partition(&mut self) -> strata_core::Result<u64> {
        let config = self.manager.config();
        let runner = self.manager.runner();
        let marker = success_marker_path(&self.view.full_path);
        bounded("touch_marker", config.file_action_timeout, runner.touch(&marker)).await?;

        let schema = self.manager.schema();
        bounded(
            "log_transformation_timestamp",
            config.schema_action_timeout,
            schema.log_transformation_timestamp(self.view.as_ref()),
        )
        .await?;
        bounded(
            "get_transformation_timestamp",
            config.schema_action_timeout,
            schema.get_transformation_timestamp(self.view.as_ref()),
        )
        .await
    }

    /// Schedules the next attempt: the retry about to run is `retries + 1`
    /// and its backoff is `2^(retries + 1)` seconds, so the first retry
    /// waits 2 s, the second 4 s.
    fn schedule_retry(&mut self, retries: u32) {
        let attempt = retries + 1;
        let delay = Duration::from_secs(2u64.saturating_pow(attempt));
        self.manager.metrics().record_retry(attempt);
        debug!(
            view = %self.view.name,
            attempt,
            delay_secs = delay.as_secs(),
            "scheduling retry"
        );
        let mailbox = self.mailbox.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = mailbox.send(Message::Retry);
        });
        self.set_phase(Phase::Retrying { retries });
    }

    /// Recomputes this view because an upstream changed underneath it.
    ///
    /// The rebuild is charged as one retry already spent (`transform(1)`),
    /// slightly reducing the retry budget of a reload; see DESIGN.md.
    async fn reload(&mut self) {
        self.set_phase(Phase::Waiting);
        self.round_started = Some(Instant::now());

        let runner = self.manager.runner();
        let marker = success_marker_path(&self.view.full_path);
        let limit = self.manager.config().file_action_timeout;
        if let Err(e) = bounded("delete_marker", limit, runner.delete(&marker, false)).await {
            warn!(view = %self.view.name, error = %e, "could not delete success marker for reload");
        }

        self.transform(1).await;
        self.manager.broadcast_new_data(self.id());
    }

    // ------------------------------------------------------------------
    // Bookkeeping
    // ------------------------------------------------------------------

    fn begin_round(&mut self, request: RequestId) {
        debug!(view = %self.view.name, %request, "starting materialization round");
        self.round_request = Some(request);
        self.round_started = Some(Instant::now());
        self.waiters.clear();
        self.pending_deps.clear();
        self.one_dependency_returned_data = false;
        self.reset_flags();
    }

    fn reset_flags(&mut self) {
        self.incomplete = false;
        self.with_errors = false;
        self.deps_freshness = 0;
    }

    fn finish_round(&mut self, outcome: &str) {
        if let Some(request) = self.round_request.take() {
            debug!(view = %self.view.name, %request, outcome, "materialization round finished");
        }
        if let Some(started) = self.round_started.take() {
            self.manager
                .metrics()
                .observe_round_duration(outcome, started.elapsed());
        }
        self.waiters.clear();
        self.pending_deps.clear();
        self.one_dependency_returned_data = false;
    }

    /// Answers every waiter exactly once and empties the set.
    fn drain_waiters(&mut self, outcome: Outcome) {
        for waiter in self.waiters.drain(..) {
            waiter.send(outcome.clone());
        }
    }

    fn unexpected_in_failed(&self, what: &str) {
        // The failed state only accepts Materialize, Invalidate, GetStatus,
        // and NewDataAvailable; anything else would get a Fatal reply if it
        // carried a reply handle.
        warn!(view = %self.view.name, message = what, "not recoverable");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_labels() {
        assert_eq!(Phase::Initial.as_label(), "initial");
        assert_eq!(Phase::Waiting.as_label(), "waiting");
        assert_eq!(Phase::Transforming { retries: 2 }.as_label(), "transforming");
        assert_eq!(Phase::Retrying { retries: 0 }.as_label(), "retrying");
        assert_eq!(Phase::Materialized.as_label(), "materialized");
        assert_eq!(Phase::Failed.as_label(), "failed");
    }

    #[test]
    fn retry_counts_are_part_of_phase_identity() {
        assert_ne!(
            Phase::Transforming { retries: 0 },
            Phase::Transforming { retries: 1 }
        );
        assert_eq!(Phase::Retrying { retries: 3 }, Phase::Retrying { retries: 3 });
    }

    #[tokio::test]
    async fn bounded_call_times_out() {
        tokio::time::pause();
        let slow = async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            strata_core::Result::Ok(())
        };
        let result = bounded("slow_call", Duration::from_secs(1), slow).await;
        match result {
            Err(e) => assert!(e.is_timeout()),
            Ok(()) => panic!("expected timeout"),
        }
    }

    #[tokio::test]
    async fn bounded_call_passes_through() {
        let fast = async { strata_core::Result::Ok(7u64) };
        let result = bounded("fast_call", Duration::from_secs(1), fast).await;
        assert_eq!(result.unwrap(), 7);
    }
}
