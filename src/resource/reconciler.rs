//! Resource Reconciler
//!
//! Drives id-addressable kinds (collections with a `{kind}/id/{id}` item
//! path, such as users) to a requested lifecycle state with at most one
//! lookup and one mutation.
//!
//! An existing resource always receives an update call; fields are not
//! diffed against the current record.

use super::classify::{classify, extract_id, CallKind, Outcome};
use super::model::{LifecycleState, ResourceModel};
use super::registry::{require_resource, ApiStyle, ResourceDef};
use super::result::{send_mutation, Action, ReconciliationResult};
use crate::error::{Error, Result};
use crate::truenas::connection::{Connection, TransportResult};
use reqwest::Method;
use serde_json::Value;

/// Reconciler for one resource kind, bound to a connection
pub struct Reconciler<'a, C: Connection + ?Sized> {
    conn: &'a C,
    def: &'static ResourceDef,
    dry_run: bool,
}

impl<'a, C: Connection + ?Sized> Reconciler<'a, C> {
    pub fn new(conn: &'a C, def: &'static ResourceDef, dry_run: bool) -> Self {
        Self { conn, def, dry_run }
    }

    /// Bind a reconciler to a collection-style kind from the registry
    pub fn for_kind(conn: &'a C, kind: &str, dry_run: bool) -> Result<Self> {
        let def = require_resource(kind)?;
        if def.style != ApiStyle::Collection {
            return Err(Error::model(format!(
                "{} is not managed through a collection endpoint",
                def.display_name
            )));
        }
        Ok(Self::new(conn, def, dry_run))
    }

    /// Run one lifecycle operation
    pub async fn apply(
        &self,
        state: LifecycleState,
        model: ResourceModel,
    ) -> Result<ReconciliationResult> {
        tracing::debug!("{}: applying state {}", self.def.display_name, state.as_str());

        match state {
            LifecycleState::Present => self.ensure_present(model).await,
            LifecycleState::Absent => self.ensure_absent(model).await,
            LifecycleState::Fetch => {
                let response = self.fetch(&model).await?;
                Ok(ReconciliationResult::fetched(response, model))
            }
        }
    }

    /// Read the collection filtered by whichever identity fields are set.
    pub async fn fetch(&self, identity: &ResourceModel) -> Result<TransportResult> {
        let path = self.lookup_path(identity, false)?;
        let response = self.conn.send_request(Method::GET, &path, None).await?;
        classify(&response, CallKind::Lookup)?;
        Ok(response)
    }

    /// Look up one instance by its identity fields.
    ///
    /// Returns a `404` result when nothing matches and a `200` result whose
    /// body is the matching record otherwise.
    pub async fn find_item(&self, model: &ResourceModel) -> Result<TransportResult> {
        let path = self.lookup_path(model, true)?;
        let response = self.conn.send_request(Method::GET, &path, None).await?;

        if classify(&response, CallKind::Lookup)? == Outcome::NotFound {
            return Ok(TransportResult::not_found());
        }

        match response.body {
            Value::Array(mut items) => {
                if items.len() > 1 {
                    tracing::warn!(
                        "{}: lookup matched {} records, using the first",
                        self.def.display_name,
                        items.len()
                    );
                }
                if items.is_empty() {
                    Ok(TransportResult::not_found())
                } else {
                    Ok(TransportResult::ok(items.swap_remove(0)))
                }
            }
            body @ Value::Object(_) => Ok(TransportResult::ok(body)),
            other => Err(Error::unexpected(format!(
                "{} lookup returned neither a list nor a record: {}",
                self.def.display_name, other
            ))),
        }
    }

    pub async fn create(&self, model: &ResourceModel) -> Result<ReconciliationResult> {
        let payload = model.to_value();
        let mutation = send_mutation(
            self.conn,
            self.dry_run,
            Action::Create,
            Method::POST,
            &self.def.api_path,
            Some(&payload),
        )
        .await?;
        Ok(ReconciliationResult::from_mutation(Action::Create, mutation, model.clone()))
    }

    pub async fn update_item(&self, id: &str, model: &ResourceModel) -> Result<ReconciliationResult> {
        let payload = model.to_value();
        let mutation = send_mutation(
            self.conn,
            self.dry_run,
            Action::Update,
            Method::PUT,
            &self.def.item_path_for(id),
            Some(&payload),
        )
        .await?;
        Ok(ReconciliationResult::from_mutation(Action::Update, mutation, model.clone()))
    }

    pub async fn delete_item(&self, id: &str, model: &ResourceModel) -> Result<ReconciliationResult> {
        let mutation = send_mutation(
            self.conn,
            self.dry_run,
            Action::Delete,
            Method::DELETE,
            &self.def.item_path_for(id),
            None,
        )
        .await?;
        Ok(ReconciliationResult::from_mutation(Action::Delete, mutation, model.clone()))
    }

    /// Create the resource, or update it when it already exists.
    pub async fn ensure_present(&self, mut model: ResourceModel) -> Result<ReconciliationResult> {
        model.require(&self.def.required_present)?;

        let found = self.find_item(&model).await?;
        if !found.is_ok() {
            tracing::info!("{} not found, creating", self.def.display_name);
            return self.create(&model).await;
        }

        for field in &self.def.create_only_fields {
            if model.remove(field).is_some() {
                tracing::debug!("dropping create-only field '{}' before update", field);
            }
        }

        let id = extract_id(&found.body, &self.def.id_field)?;
        tracing::info!("{} {} exists, updating", self.def.display_name, id);
        self.update_item(&id, &model).await
    }

    /// Delete the resource if it exists.
    pub async fn ensure_absent(&self, model: ResourceModel) -> Result<ReconciliationResult> {
        model.require(&self.def.required_absent)?;

        let found = self.find_item(&model).await?;
        if !found.is_ok() {
            tracing::info!("{} already absent", self.def.display_name);
            return Ok(ReconciliationResult::unchanged(found, model));
        }

        let id = extract_id(&found.body, &self.def.id_field)?;
        tracing::info!("{} {} exists, deleting", self.def.display_name, id);
        self.delete_item(&id, &model).await
    }

    /// Collection path with identity fields as query filters.
    ///
    /// With `strict` every identity field must be present.
    fn lookup_path(&self, model: &ResourceModel, strict: bool) -> Result<String> {
        let mut filters = Vec::new();

        for field in &self.def.identity_fields {
            let value = match model.get(field) {
                Some(Value::String(s)) if !s.is_empty() => s.clone(),
                Some(Value::Number(n)) => n.to_string(),
                Some(Value::Bool(b)) => b.to_string(),
                _ if strict => {
                    return Err(Error::model(format!(
                        "identity field '{}' is required to look up a {}",
                        field, self.def.display_name
                    )))
                }
                _ => continue,
            };
            filters.push(format!("{}={}", field, urlencoding::encode(&value)));
        }

        if filters.is_empty() {
            Ok(self.def.api_path.clone())
        } else {
            Ok(format!("{}?{}", self.def.api_path, filters.join("&")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::model::UserModel;
    use crate::truenas::testing::ScriptedConnection;
    use serde_json::json;

    fn user_model(value: Value) -> ResourceModel {
        ResourceModel::from_value(value).unwrap()
    }

    #[test]
    fn test_for_kind_rejects_action_style_kinds() {
        let conn = ScriptedConnection::default();
        assert!(matches!(
            Reconciler::for_kind(&conn, "jail-fstab", false),
            Err(Error::Model(_))
        ));
    }

    #[tokio::test]
    async fn test_present_without_username_makes_no_calls() {
        let conn = ScriptedConnection::default();
        let users = Reconciler::for_kind(&conn, "user", false).unwrap();

        let err = users
            .ensure_present(user_model(json!({"full_name": "Nobody"})))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Model(_)));
        assert_eq!(conn.call_count(), 0);
    }

    #[tokio::test]
    async fn test_absent_without_username_makes_no_calls() {
        let conn = ScriptedConnection::default();
        let users = Reconciler::for_kind(&conn, "user", false).unwrap();

        let err = users
            .ensure_absent(user_model(json!({"uid": 1001})))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Model(_)));
        assert_eq!(conn.call_count(), 0);
    }

    #[tokio::test]
    async fn test_present_creates_when_not_found() {
        let conn = ScriptedConnection::new(vec![
            TransportResult::ok(json!([])),
            TransportResult::ok(json!(41)),
        ]);
        let users = Reconciler::for_kind(&conn, "user", false).unwrap();
        let model = UserModel {
            username: Some("alice".into()),
            group_create: Some(true),
            ..Default::default()
        }
        .into_model()
        .unwrap();

        let result = users.ensure_present(model).await.unwrap();

        assert!(result.created);
        assert!(!result.changed && !result.deleted && !result.failed);

        let calls = conn.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].method, Method::GET);
        assert_eq!(calls[0].path, "user?username=alice");
        assert_eq!(calls[1].method, Method::POST);
        assert_eq!(calls[1].path, "user");
        assert_eq!(
            calls[1].payload,
            Some(json!({"username": "alice", "group_create": true}))
        );
    }

    #[tokio::test]
    async fn test_present_updates_without_create_only_fields() {
        let conn = ScriptedConnection::new(vec![
            TransportResult::ok(json!([{"id": 35, "username": "alice"}])),
            TransportResult::ok(json!(35)),
        ]);
        let users = Reconciler::for_kind(&conn, "user", false).unwrap();

        let result = users
            .ensure_present(user_model(json!({
                "username": "alice",
                "group_create": true,
                "shell": "/usr/local/bin/zsh"
            })))
            .await
            .unwrap();

        assert!(result.changed);
        assert!(!result.created && !result.deleted);
        assert!(!result.submitted_model.contains("group_create"));

        let calls = conn.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1].method, Method::PUT);
        assert_eq!(calls[1].path, "user/id/35");
        assert_eq!(
            calls[1].payload,
            Some(json!({"username": "alice", "shell": "/usr/local/bin/zsh"}))
        );
    }

    #[tokio::test]
    async fn test_found_record_without_id_is_unexpected() {
        let conn = ScriptedConnection::new(vec![TransportResult::ok(json!([{"username": "alice"}]))]);
        let users = Reconciler::for_kind(&conn, "user", false).unwrap();

        let err = users
            .ensure_present(user_model(json!({"username": "alice"})))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::UnexpectedResponse(_)));
        assert_eq!(conn.call_count(), 1);
    }

    #[tokio::test]
    async fn test_rejected_update_reports_failed_not_changed() {
        let conn = ScriptedConnection::new(vec![
            TransportResult::ok(json!([{"id": 35}])),
            TransportResult::new(422, json!({"user_update.shell": "invalid"})),
        ]);
        let users = Reconciler::for_kind(&conn, "user", false).unwrap();

        let result = users
            .ensure_present(user_model(json!({"username": "alice", "shell": "/bad"})))
            .await
            .unwrap();

        assert!(result.failed);
        assert!(!result.modified());
        assert_eq!(result.response.status_code, 422);
    }

    #[tokio::test]
    async fn test_rejected_create_reports_failed_not_created() {
        let conn = ScriptedConnection::new(vec![
            TransportResult::not_found(),
            TransportResult::new(422, json!({"user_create.password": "required"})),
        ]);
        let users = Reconciler::for_kind(&conn, "user", false).unwrap();

        let result = users
            .ensure_present(user_model(json!({"username": "alice"})))
            .await
            .unwrap();

        assert!(result.failed);
        assert!(!result.created);
    }

    #[tokio::test]
    async fn test_server_error_on_create_is_raised() {
        let conn = ScriptedConnection::new(vec![
            TransportResult::ok(json!([])),
            TransportResult::new(500, json!("Traceback")),
        ]);
        let users = Reconciler::for_kind(&conn, "user", false).unwrap();

        let err = users
            .ensure_present(user_model(json!({"username": "alice"})))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Server { code: 500, .. }));
    }

    #[tokio::test]
    async fn test_absent_deletes_found_user() {
        let conn = ScriptedConnection::new(vec![
            TransportResult::ok(json!([{"id": 7, "username": "bob"}])),
            TransportResult::ok(json!(true)),
        ]);
        let users = Reconciler::for_kind(&conn, "user", false).unwrap();

        let result = users
            .ensure_absent(user_model(json!({"username": "bob"})))
            .await
            .unwrap();

        assert!(result.deleted);
        assert!(!result.created && !result.changed);

        let calls = conn.calls();
        assert_eq!(calls[1].method, Method::DELETE);
        assert_eq!(calls[1].path, "user/id/7");
    }

    #[tokio::test]
    async fn test_absent_when_missing_is_noop() {
        let conn = ScriptedConnection::new(vec![TransportResult::ok(json!([]))]);
        let users = Reconciler::for_kind(&conn, "user", false).unwrap();

        let result = users
            .ensure_absent(user_model(json!({"username": "ghost"})))
            .await
            .unwrap();

        assert!(!result.modified());
        assert!(!result.failed);
        assert_eq!(conn.call_count(), 1);
    }

    #[tokio::test]
    async fn test_dry_run_never_mutates() {
        for state in [LifecycleState::Present, LifecycleState::Absent] {
            let conn = ScriptedConnection::new(vec![TransportResult::ok(json!([{"id": 3}]))]);
            let users = Reconciler::for_kind(&conn, "user", true).unwrap();

            let result = users
                .apply(state, user_model(json!({"username": "carol"})))
                .await
                .unwrap();

            assert_eq!(conn.call_count(), 1);
            assert_eq!(conn.calls()[0].method, Method::GET);
            assert!(!result.modified());
            assert!(!result.failed);
            assert!(result.planned.is_some());
        }
    }

    #[tokio::test]
    async fn test_dry_run_create_echoes_payload() {
        let conn = ScriptedConnection::new(vec![TransportResult::ok(json!([]))]);
        let users = Reconciler::for_kind(&conn, "user", true).unwrap();

        let result = users
            .ensure_present(user_model(json!({"username": "dave"})))
            .await
            .unwrap();

        assert_eq!(result.planned, Some(Action::Create));
        assert_eq!(result.response, TransportResult::ok(json!({"username": "dave"})));
    }

    #[tokio::test]
    async fn test_fetch_is_read_only() {
        let conn = ScriptedConnection::new(vec![TransportResult::ok(json!([{"id": 1}]))]);
        let users = Reconciler::for_kind(&conn, "user", false).unwrap();

        let result = users
            .apply(LifecycleState::Fetch, ResourceModel::new())
            .await
            .unwrap();

        assert!(!result.modified());
        assert!(!result.failed);
        assert_eq!(conn.calls()[0].path, "user");
    }

    #[tokio::test]
    async fn test_lookup_escapes_identity_values() {
        let conn = ScriptedConnection::new(vec![TransportResult::ok(json!([]))]);
        let users = Reconciler::for_kind(&conn, "user", false).unwrap();

        users
            .find_item(&user_model(json!({"username": "a b&c"})))
            .await
            .unwrap();

        assert_eq!(conn.calls()[0].path, "user?username=a%20b%26c");
    }

    #[tokio::test]
    async fn test_find_item_normalizes_list_results() {
        let conn = ScriptedConnection::new(vec![
            TransportResult::ok(json!([])),
            TransportResult::ok(json!([{"id": 7, "username": "alice"}])),
        ]);
        let users = Reconciler::for_kind(&conn, "user", false).unwrap();
        let model = user_model(json!({"username": "alice"}));

        let missing = users.find_item(&model).await.unwrap();
        assert_eq!(missing.status_code, 404);

        let found = users.find_item(&model).await.unwrap();
        assert_eq!(found.status_code, 200);
        assert_eq!(found.body["id"], 7);
    }

    #[tokio::test]
    async fn test_find_item_rejects_unexpected_body() {
        let conn = ScriptedConnection::new(vec![TransportResult::ok(json!("not a list"))]);
        let users = Reconciler::for_kind(&conn, "user", false).unwrap();

        let err = users
            .find_item(&user_model(json!({"username": "alice"})))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::UnexpectedResponse(_)));
    }

    #[tokio::test]
    async fn test_lookup_with_other_success_status_updates() {
        let conn = ScriptedConnection::new(vec![
            TransportResult::new(206, json!([{"id": 35, "username": "alice"}])),
            TransportResult::ok(json!(35)),
        ]);
        let users = Reconciler::for_kind(&conn, "user", false).unwrap();

        let result = users
            .ensure_present(user_model(json!({"username": "alice"})))
            .await
            .unwrap();

        assert!(result.changed);
        assert!(!result.created);
        let calls = conn.calls();
        assert_eq!(calls[1].method, Method::PUT);
        assert_eq!(calls[1].path, "user/id/35");
    }

    #[tokio::test]
    async fn test_absent_with_other_success_status_deletes() {
        let conn = ScriptedConnection::new(vec![
            TransportResult::new(206, json!([{"id": 35, "username": "alice"}])),
            TransportResult::ok(json!(true)),
        ]);
        let users = Reconciler::for_kind(&conn, "user", false).unwrap();

        let result = users
            .ensure_absent(user_model(json!({"username": "alice"})))
            .await
            .unwrap();

        assert!(result.deleted);
        assert_eq!(conn.calls()[1].method, Method::DELETE);
    }
}
