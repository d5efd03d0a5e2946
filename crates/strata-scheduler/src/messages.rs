//! Typed envelopes for the coordination protocol.
//!
//! Every interaction with a view coordinator is a [`Message`] posted to its
//! mailbox. Replies travel as [`Outcome`] values through a [`Reply`] handle,
//! which either resolves an external requester's oneshot or re-enters a
//! downstream coordinator's mailbox as [`Message::DependencyAnswered`].

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};

use strata_core::{RequestId, ViewId};

use crate::runner::ActionResult;

/// Terminal answer to one materialization request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Outcome {
    /// The view's data is present and fresh.
    #[serde(rename_all = "camelCase")]
    Materialized {
        /// The answering view.
        view: ViewId,
        /// At least one upstream lacked data this round.
        incomplete: bool,
        /// Timestamp of the view's last successful transformation
        /// (milliseconds since epoch; never `0` in this variant).
        transformed_at: u64,
        /// At least one upstream's transformation failed this round.
        with_errors: bool,
    },
    /// The view has no data and could not be produced.
    #[serde(rename_all = "camelCase")]
    NoData {
        /// The answering view.
        view: ViewId,
    },
    /// The view's transformation failed after exhausting retries.
    #[serde(rename_all = "camelCase")]
    Failed {
        /// The answering view.
        view: ViewId,
    },
    /// The coordinator cannot serve requests in its current state.
    ///
    /// Only emitted from the failed state when a message outside the
    /// accepted set arrives with a reply handle attached.
    #[serde(rename_all = "camelCase")]
    Fatal {
        /// The answering view.
        view: ViewId,
        /// Why the coordinator considers itself unrecoverable.
        reason: String,
    },
}

impl Outcome {
    /// Returns the view that produced this outcome.
    #[must_use]
    pub const fn view(&self) -> ViewId {
        match self {
            Self::Materialized { view, .. }
            | Self::NoData { view }
            | Self::Failed { view }
            | Self::Fatal { view, .. } => *view,
        }
    }

    /// Returns true for [`Outcome::Materialized`].
    #[must_use]
    pub const fn is_materialized(&self) -> bool {
        matches!(self, Self::Materialized { .. })
    }

    /// Returns a lowercase label suitable for metrics and logs.
    #[must_use]
    pub const fn as_label(&self) -> &'static str {
        match self {
            Self::Materialized { .. } => "materialized",
            Self::NoData { .. } => "no_data",
            Self::Failed { .. } => "failed",
            Self::Fatal { .. } => "fatal",
        }
    }
}

/// Where an [`Outcome`] is delivered.
#[derive(Debug)]
pub enum Reply {
    /// An external requester awaiting a oneshot.
    Client(oneshot::Sender<Outcome>),
    /// A downstream coordinator; the outcome re-enters its mailbox as
    /// [`Message::DependencyAnswered`].
    Downstream {
        /// The downstream coordinator's mailbox.
        mailbox: mpsc::UnboundedSender<Message>,
    },
}

impl Reply {
    /// Delivers the outcome, consuming the handle.
    ///
    /// A requester that has gone away (dropped receiver, stopped
    /// coordinator) is logged at debug level; the protocol guarantees one
    /// reply per request, not that anyone is still listening.
    pub fn send(self, outcome: Outcome) {
        match self {
            Self::Client(tx) => {
                if let Err(unsent) = tx.send(outcome) {
                    tracing::debug!(view = %unsent.view(), "requester gone before reply");
                }
            }
            Self::Downstream { mailbox } => {
                if mailbox
                    .send(Message::DependencyAnswered { outcome })
                    .is_err()
                {
                    tracing::debug!("downstream coordinator gone before reply");
                }
            }
        }
    }
}

/// Diagnostic snapshot of a coordinator, answered to `GetStatus`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    /// The coordinator's view identity.
    pub view: ViewId,
    /// The view's human-readable name.
    pub name: String,
    /// Current state label (`initial`, `waiting`, ...).
    pub state: String,
    /// Requesters awaiting the current round.
    pub waiters: usize,
    /// Dependencies not yet answered in the current round.
    pub pending_dependencies: usize,
}

/// A message in a coordinator's mailbox.
#[derive(Debug)]
pub enum Message {
    /// Bring the view up to date; exactly one [`Outcome`] is delivered to
    /// `reply`.
    Materialize {
        /// Correlates the request through log lines across coordinators.
        request: RequestId,
        /// Where the outcome goes.
        reply: Reply,
    },
    /// Drop memoized materialized state; the next `Materialize`
    /// re-evaluates from scratch.
    Invalidate,
    /// An upstream view has newer data than when it last answered us.
    NewDataAvailable {
        /// The upstream view.
        view: ViewId,
    },
    /// Diagnostic; answered with a [`StatusReport`], never changes state.
    GetStatus {
        /// Where the report goes.
        reply: oneshot::Sender<StatusReport>,
    },
    /// Terminal verdict of a submitted transformation.
    ActionFinished {
        /// The action runner's verdict.
        result: ActionResult,
    },
    /// Self-delivered after the retry backoff expires.
    Retry,
    /// A dependency coordinator answered our `Materialize`.
    DependencyAnswered {
        /// The dependency's outcome.
        outcome: Outcome,
    },
}

impl Message {
    /// Returns a lowercase label suitable for metrics and logs.
    #[must_use]
    pub const fn as_label(&self) -> &'static str {
        match self {
            Self::Materialize { .. } => "materialize",
            Self::Invalidate => "invalidate",
            Self::NewDataAvailable { .. } => "new_data_available",
            Self::GetStatus { .. } => "get_status",
            Self::ActionFinished { .. } => "action_finished",
            Self::Retry => "retry",
            Self::DependencyAnswered { .. } => "dependency_answered",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn some_view() -> ViewId {
        ViewId::derive("(id int)", "/warehouse/events")
    }

    #[test]
    fn outcome_view_accessor() {
        let view = some_view();
        assert_eq!(Outcome::NoData { view }.view(), view);
        assert_eq!(
            Outcome::Materialized {
                view,
                incomplete: false,
                transformed_at: 42,
                with_errors: false,
            }
            .view(),
            view
        );
    }

    #[test]
    fn outcome_labels() {
        let view = some_view();
        assert_eq!(Outcome::NoData { view }.as_label(), "no_data");
        assert_eq!(Outcome::Failed { view }.as_label(), "failed");
        assert_eq!(
            Outcome::Fatal {
                view,
                reason: "not recoverable".into()
            }
            .as_label(),
            "fatal"
        );
    }

    #[test]
    fn outcome_serializes_camel_case() {
        let outcome = Outcome::Materialized {
            view: some_view(),
            incomplete: true,
            transformed_at: 42,
            with_errors: false,
        };
        let json = serde_json::to_string(&outcome).unwrap();
        assert!(json.contains("\"transformedAt\":42"));
        assert!(json.contains("\"withErrors\":false"));

        let back: Outcome = serde_json::from_str(&json).unwrap();
        assert_eq!(back, outcome);
    }

    #[tokio::test]
    async fn client_reply_resolves_oneshot() {
        let (tx, rx) = oneshot::channel();
        let view = some_view();
        Reply::Client(tx).send(Outcome::NoData { view });
        assert_eq!(rx.await.unwrap(), Outcome::NoData { view });
    }

    #[tokio::test]
    async fn downstream_reply_enters_mailbox() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let view = some_view();
        Reply::Downstream { mailbox: tx }.send(Outcome::Failed { view });

        match rx.recv().await {
            Some(Message::DependencyAnswered { outcome }) => {
                assert_eq!(outcome, Outcome::Failed { view });
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn dropped_client_is_tolerated() {
        let (tx, rx) = oneshot::channel();
        drop(rx);
        // Must not panic.
        Reply::Client(tx).send(Outcome::NoData { view: some_view() });
    }
}
