//! Jail fstab entries
//!
//! Fstab entries have no identifier of their own; the API exposes a single
//! `jail/fstab` endpoint driven by an `action` (`LIST`, `ADD`, `REPLACE`,
//! `REMOVE`) and addresses entries by their position in the listing. Only
//! `USER` entries are ever matched or modified.

use super::classify::{classify, CallKind, Outcome};
use super::model::{FstabParams, LifecycleState, ResourceModel};
use super::registry::{require_resource, ResourceDef};
use super::result::{send_mutation, Action, Mutation, ReconciliationResult};
use crate::error::{Error, Result};
use crate::filter::{structure_truenas_api_jail_fstab_entry_response, FstabEntry};
use crate::truenas::connection::{Connection, TransportResult};
use reqwest::Method;
use serde_json::{json, Value};

const FSTYPE: &str = "nullfs";
const DUMP: &str = "0";
const PASS: &str = "0";

/// Manager for the fstab of a jail
pub struct JailFstab<'a, C: Connection + ?Sized> {
    conn: &'a C,
    def: &'static ResourceDef,
    dry_run: bool,
}

impl<'a, C: Connection + ?Sized> JailFstab<'a, C> {
    pub fn new(conn: &'a C, dry_run: bool) -> Result<Self> {
        Ok(Self {
            conn,
            def: require_resource("jail-fstab")?,
            dry_run,
        })
    }

    /// Run one lifecycle operation
    pub async fn apply(
        &self,
        state: LifecycleState,
        params: &FstabParams,
    ) -> Result<ReconciliationResult> {
        match state {
            LifecycleState::Present => self.ensure_present(params).await,
            LifecycleState::Absent => self.ensure_absent(params).await,
            LifecycleState::Fetch => {
                let response = self.fetch(&params.jail).await?;
                Ok(ReconciliationResult::fetched(response, params.to_model()))
            }
        }
    }

    /// Raw LIST response for a jail
    pub async fn fetch(&self, jail: &str) -> Result<TransportResult> {
        let (response, _) = self.list(jail).await?;
        Ok(response)
    }

    /// Current entries of a jail, in listing order
    pub async fn entries(&self, jail: &str) -> Result<Vec<FstabEntry>> {
        let (response, outcome) = self.list(jail).await?;
        if outcome == Outcome::NotFound {
            return Err(Error::model(format!("jail '{}' does not exist", jail)));
        }
        structure_truenas_api_jail_fstab_entry_response(&response.body)
    }

    async fn list(&self, jail: &str) -> Result<(TransportResult, Outcome)> {
        if jail.is_empty() {
            return Err(Error::model("jail is required"));
        }

        let payload = json!({"jail": jail, "options": {"action": "LIST"}});
        let response = self
            .conn
            .send_request(Method::POST, &self.def.api_path, Some(&payload))
            .await?;
        let outcome = classify(&response, CallKind::Lookup)?;
        Ok((response, outcome))
    }

    /// Make sure `source` is mounted at `destination`.
    ///
    /// An entry at the same destination is replaced when its source or
    /// options differ. With `force`, an entry mounting the same source
    /// elsewhere is moved instead of adding a second mount.
    pub async fn ensure_present(&self, params: &FstabParams) -> Result<ReconciliationResult> {
        let model = params.to_model();
        model.require(&self.def.required_present)?;
        let (source, destination) = match (&params.source, &params.destination) {
            (Some(source), Some(destination)) => (source.as_str(), destination.as_str()),
            _ => return Err(Error::model("source and destination are required")),
        };
        let fsoptions = params.fsoptions.as_str();

        let entries = self.entries(&params.jail).await?;

        if let Some(existing) = entries
            .iter()
            .find(|e| e.is_user() && e.destination == destination)
        {
            if existing.source == source && existing.fsoptions == fsoptions {
                tracing::info!("fstab entry {} already up to date", destination);
                return Ok(ReconciliationResult::unchanged(entry_response(existing)?, model));
            }
            tracing::info!("replacing fstab entry {} at index {}", destination, existing.index);
            return self.replace(&params.jail, existing, source, destination, fsoptions, model).await;
        }

        if let Some(existing) = entries.iter().find(|e| e.is_user() && e.source == source) {
            if params.force {
                tracing::info!(
                    "moving mount of {} from {} to {}",
                    source,
                    existing.destination,
                    destination
                );
                return self.replace(&params.jail, existing, source, destination, fsoptions, model).await;
            }
            tracing::info!(
                "{} is already mounted at {}, adding another entry",
                source,
                existing.destination
            );
        }

        let options = json!({
            "action": "ADD",
            "source": source,
            "destination": destination,
            "fstype": FSTYPE,
            "fsoptions": fsoptions,
            "dump": DUMP,
            "pass": PASS,
        });
        let mutation = self.send_action(Action::Create, &params.jail, options).await?;
        Ok(ReconciliationResult::from_mutation(Action::Create, mutation, model))
    }

    /// Remove the entry mounted at `destination` (and from `source`, when given).
    pub async fn ensure_absent(&self, params: &FstabParams) -> Result<ReconciliationResult> {
        let model = params.to_model();
        model.require(&self.def.required_absent)?;
        let Some(destination) = params.destination.as_deref() else {
            return Err(Error::model("destination is required"));
        };

        let entries = self.entries(&params.jail).await?;
        let Some(existing) = entries.iter().find(|e| {
            e.is_user()
                && e.destination == destination
                && params.source.as_deref().map_or(true, |s| e.source == s)
        }) else {
            tracing::info!("fstab entry {} already absent", destination);
            return Ok(ReconciliationResult::unchanged(TransportResult::not_found(), model));
        };

        let options = json!({
            "action": "REMOVE",
            "source": existing.source,
            "destination": existing.destination,
            "fstype": existing.fstype,
            "fsoptions": existing.fsoptions,
            "dump": existing.dump,
            "pass": existing.pass,
            "index": parse_index(existing)?,
        });
        let mutation = self.send_action(Action::Delete, &params.jail, options).await?;
        Ok(ReconciliationResult::from_mutation(Action::Delete, mutation, model))
    }

    async fn replace(
        &self,
        jail: &str,
        existing: &FstabEntry,
        source: &str,
        destination: &str,
        fsoptions: &str,
        model: ResourceModel,
    ) -> Result<ReconciliationResult> {
        let options = json!({
            "action": "REPLACE",
            "source": source,
            "destination": destination,
            "fstype": FSTYPE,
            "fsoptions": fsoptions,
            "dump": DUMP,
            "pass": PASS,
            "index": parse_index(existing)?,
        });
        let mutation = self.send_action(Action::Update, jail, options).await?;
        Ok(ReconciliationResult::from_mutation(Action::Update, mutation, model))
    }

    async fn send_action(
        &self,
        action: Action,
        jail: &str,
        options: Value,
    ) -> Result<Mutation> {
        let payload = json!({"jail": jail, "options": options});
        send_mutation(
            self.conn,
            self.dry_run,
            action,
            Method::POST,
            &self.def.api_path,
            Some(&payload),
        )
        .await
    }
}

fn parse_index(entry: &FstabEntry) -> Result<u64> {
    entry.index.parse().map_err(|_| {
        Error::unexpected(format!("fstab entry index is not a number: {}", entry.index))
    })
}

fn entry_response(entry: &FstabEntry) -> Result<TransportResult> {
    let body = serde_json::to_value(entry)
        .map_err(|e| Error::unexpected(format!("failed to encode fstab entry: {}", e)))?;
    Ok(TransportResult::ok(body))
}
