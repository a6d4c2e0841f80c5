//! Reconciliation results
//!
//! Shared by every resource kind: the result record handed back to the
//! caller and the single place mutating calls go through, so dry-run is
//! honored uniformly.

use super::classify::{classify, CallKind, Outcome};
use super::model::ResourceModel;
use crate::error::Result;
use crate::truenas::connection::{Connection, TransportResult};
use reqwest::Method;
use serde::Serialize;
use serde_json::Value;

/// Mutation a reconciler decided on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Create,
    Update,
    Delete,
}

/// Outcome of one lifecycle operation.
///
/// At most one of `created`, `changed` and `deleted` is true, and only when
/// the API confirmed the mutation. All three false means nothing was changed
/// (no-op, fetch, rejected mutation, or dry-run).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconciliationResult {
    pub created: bool,
    pub changed: bool,
    pub deleted: bool,
    pub failed: bool,
    pub response: TransportResult,
    pub submitted_model: ResourceModel,
    /// Mutation suppressed by dry-run mode
    #[serde(skip_serializing_if = "Option::is_none")]
    pub planned: Option<Action>,
}

impl ReconciliationResult {
    /// Nothing needed doing
    pub fn unchanged(response: TransportResult, submitted_model: ResourceModel) -> Self {
        Self {
            created: false,
            changed: false,
            deleted: false,
            failed: false,
            response,
            submitted_model,
            planned: None,
        }
    }

    /// Result of a read-only fetch
    pub fn fetched(response: TransportResult, submitted_model: ResourceModel) -> Self {
        let failed = !response.is_ok();
        Self {
            failed,
            ..Self::unchanged(response, submitted_model)
        }
    }

    pub(crate) fn from_mutation(
        action: Action,
        mutation: Mutation,
        submitted_model: ResourceModel,
    ) -> Self {
        let confirmed = mutation.accepted && mutation.planned.is_none();
        Self {
            created: confirmed && action == Action::Create,
            changed: confirmed && action == Action::Update,
            deleted: confirmed && action == Action::Delete,
            failed: !mutation.accepted,
            response: mutation.response,
            submitted_model,
            planned: mutation.planned,
        }
    }

    /// Whether any of created/changed/deleted is set
    pub fn modified(&self) -> bool {
        self.created || self.changed || self.deleted
    }
}

/// Response of a mutating call and whether the API accepted it
#[derive(Debug, Clone)]
pub(crate) struct Mutation {
    pub response: TransportResult,
    pub accepted: bool,
    pub planned: Option<Action>,
}

/// Send a mutating request, or synthesize its response in dry-run mode.
///
/// The synthesized response is a `200` whose body is the payload that would
/// have been sent.
pub(crate) async fn send_mutation<C: Connection + ?Sized>(
    conn: &C,
    dry_run: bool,
    action: Action,
    method: Method,
    path: &str,
    payload: Option<&Value>,
) -> Result<Mutation> {
    if dry_run {
        tracing::info!("dry run: skipping {} {} ({:?})", method, path, action);
        return Ok(Mutation {
            response: TransportResult::ok(payload.cloned().unwrap_or(Value::Null)),
            accepted: true,
            planned: Some(action),
        });
    }

    let response = conn.send_request(method, path, payload).await?;
    let accepted = classify(&response, CallKind::Mutation)? == Outcome::Success;

    Ok(Mutation {
        response,
        accepted,
        planned: None,
    })
}
