//! Pass-through operations on the ST Manager backend.

use model::{
    Acknowledgement, BackendStats, BackupId, BackupInfo, BackupOptions, BackupResult,
    BackupSchedule, ClientResult, ResourceKind, SyncOutcome, Timestamp,
};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::instrument;
use transport::{Method, RequestClient, Target};

const STATS_PATH: &str = "/api/v2/stats";
const CONFIG_PATH: &str = "/api/v2/config";
const BACKUP_TRIGGER_PATH: &str = "/api/v2/backup/trigger";
const BACKUP_LIST_PATH: &str = "/api/v2/backup/list";
const BACKUP_RESTORE_PATH: &str = "/api/v2/backup/restore";
const BACKUP_DELETE_PATH: &str = "/api/v2/backup/delete";
const BACKUP_SCHEDULE_PATH: &str = "/api/v2/backup/schedule";
const SYNC_TO_ST_PATH: &str = "/api/v2/sync/to-st";
const SYNC_FROM_ST_PATH: &str = "/api/v2/sync/from-st";
const TRACK_CHANGE_PATH: &str = "/api/v2/track-change";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BackupRef<'a> {
    backup_id: &'a str,
}

#[derive(Serialize)]
struct SyncRequest<'a> {
    #[serde(rename = "type")]
    kind: ResourceKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<&'a str>,
}

#[derive(Serialize)]
struct ChangeRecord<'a> {
    #[serde(rename = "type")]
    kind: ResourceKind,
    id: &'a str,
    timestamp: i64,
}

/// Backup, schedule, stats, config and sync calls. Every call is routed
/// through the resolver's current mode; no payload is translated.
#[derive(Clone)]
pub struct BackupClient {
    client: RequestClient,
}

impl BackupClient {
    pub fn new(client: RequestClient) -> Self {
        Self { client }
    }

    // -----------------------------------------------------------------------
    // Backups
    // -----------------------------------------------------------------------

    /// Starts a manual backup. `None` lets the backend pick every default.
    #[instrument(skip(self, options))]
    pub async fn trigger(&self, options: Option<&BackupOptions>) -> ClientResult<BackupResult> {
        let defaults = BackupOptions::default();
        let options = options.unwrap_or(&defaults);
        self.client
            .send_json(Target::Backend, Method::Post, BACKUP_TRIGGER_PATH, options)
            .await
    }

    #[instrument(skip(self))]
    pub async fn list(&self) -> ClientResult<Vec<BackupInfo>> {
        self.client.get_json(Target::Backend, BACKUP_LIST_PATH).await
    }

    #[instrument(skip(self), fields(backup = %id))]
    pub async fn restore(&self, id: &BackupId) -> ClientResult<Acknowledgement> {
        let body = BackupRef {
            backup_id: id.as_str(),
        };
        self.client
            .send_json(Target::Backend, Method::Post, BACKUP_RESTORE_PATH, &body)
            .await
    }

    #[instrument(skip(self), fields(backup = %id))]
    pub async fn delete(&self, id: &BackupId) -> ClientResult<Acknowledgement> {
        let body = BackupRef {
            backup_id: id.as_str(),
        };
        self.client
            .send_json(Target::Backend, Method::Delete, BACKUP_DELETE_PATH, &body)
            .await
    }

    #[instrument(skip(self))]
    pub async fn get_schedule(&self) -> ClientResult<BackupSchedule> {
        self.client.get_json(Target::Backend, BACKUP_SCHEDULE_PATH).await
    }

    #[instrument(skip(self, schedule), fields(kind = ?schedule.kind))]
    pub async fn set_schedule(&self, schedule: &BackupSchedule) -> ClientResult<Acknowledgement> {
        self.client
            .send_json(Target::Backend, Method::Post, BACKUP_SCHEDULE_PATH, schedule)
            .await
    }

    // -----------------------------------------------------------------------
    // Stats and config
    // -----------------------------------------------------------------------

    #[instrument(skip(self))]
    pub async fn stats(&self) -> ClientResult<BackendStats> {
        self.client.get_json(Target::Backend, STATS_PATH).await
    }

    #[instrument(skip(self))]
    pub async fn get_config(&self) -> ClientResult<Map<String, Value>> {
        self.client.get_json(Target::Backend, CONFIG_PATH).await
    }

    #[instrument(skip(self, config))]
    pub async fn update_config(
        &self,
        config: &Map<String, Value>,
    ) -> ClientResult<Acknowledgement> {
        self.client
            .send_json(Target::Backend, Method::Post, CONFIG_PATH, config)
            .await
    }

    // -----------------------------------------------------------------------
    // Sync
    // -----------------------------------------------------------------------

    /// Pushes one resource from the backend into the host.
    #[instrument(skip(self))]
    pub async fn sync_to_st(&self, kind: ResourceKind, id: &str) -> ClientResult<SyncOutcome> {
        let body = SyncRequest { kind, id: Some(id) };
        self.client
            .send_json(Target::Backend, Method::Post, SYNC_TO_ST_PATH, &body)
            .await
    }

    /// Pulls every resource of `kind` from the host into the backend.
    #[instrument(skip(self))]
    pub async fn sync_from_st(&self, kind: ResourceKind) -> ClientResult<SyncOutcome> {
        let body = SyncRequest { kind, id: None };
        self.client
            .send_json(Target::Backend, Method::Post, SYNC_FROM_ST_PATH, &body)
            .await
    }

    /// Records a host-side edit for incremental backups. Failures are returned;
    /// callers that treat this as fire-and-forget discard them themselves.
    #[instrument(skip(self))]
    pub async fn track_change(&self, kind: ResourceKind, id: &str) -> ClientResult<()> {
        let body = ChangeRecord {
            kind,
            id,
            timestamp: Timestamp::now().as_millis(),
        };
        self.client
            .send_unit(Target::Backend, Method::Post, TRACK_CHANGE_PATH, &body)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use model::{ClientError, NoHeaders, ScheduleKind};
    use serde_json::json;
    use transport::testing::{unreachable, ScriptedTransport};
    use transport::{
        ConnectionMode, HttpRequest, HttpResponse, TransportResolver, TransportSettings,
    };

    const PLUGIN: &str = "http://localhost:8000/api/plugins/st-manager";
    const STANDALONE: &str = "http://localhost:5000";

    fn healthy() -> ClientResult<HttpResponse> {
        Ok(HttpResponse::json(200, &json!({"status": "ok", "version": "2.0.0"})))
    }

    /// A backend client whose transport answers health probes per `mode` and
    /// hands every other request to `handler`.
    fn backend(
        mode: ConnectionMode,
        handler: impl Fn(&HttpRequest) -> ClientResult<HttpResponse> + Send + Sync + 'static,
    ) -> (BackupClient, Arc<ScriptedTransport>) {
        let transport = Arc::new(ScriptedTransport::new(move |request| {
            match request.url.as_str() {
                url if url == format!("{PLUGIN}/health") => match mode {
                    ConnectionMode::HostPlugin => healthy(),
                    _ => Ok(HttpResponse::text(404, "Not Found")),
                },
                url if url == format!("{STANDALONE}/api/v2/health") => match mode {
                    ConnectionMode::Standalone => healthy(),
                    _ => Err(unreachable(url)),
                },
                _ => handler(request),
            }
        }));
        let settings = TransportSettings::default();
        let resolver = Arc::new(
            TransportResolver::new(&settings, transport.clone(), Arc::new(NoHeaders)).unwrap(),
        );
        let client =
            RequestClient::new(&settings, transport.clone(), resolver, Arc::new(NoHeaders)).unwrap();
        (BackupClient::new(client), transport)
    }

    #[tokio::test]
    async fn test_list_in_plugin_mode_strips_version_prefix() {
        let (backups, transport) = backend(ConnectionMode::HostPlugin, |_| {
            Ok(HttpResponse::json(
                200,
                &json!([{"id": "b-1", "timestamp": "2026-01-01T00:00:00Z", "path": "/data/b-1", "fileCount": 12, "sizeMb": 1.5}]),
            ))
        });
        let list = backups.list().await.unwrap();
        assert_eq!(list[0].id.as_str(), "b-1");
        assert_eq!(list[0].file_count, 12);
        assert!(list[0].resources.is_empty());
        assert_eq!(transport.hits(&format!("{PLUGIN}/backup/list")), 1);
    }

    #[tokio::test]
    async fn test_trigger_in_standalone_mode_uses_full_path() {
        let (backups, transport) = backend(ConnectionMode::Standalone, |_| {
            Ok(HttpResponse::json(
                200,
                &json!({"success": true, "backupId": "b-2", "path": "/data/b-2", "timestamp": "t", "fileCount": 3, "sizeMb": 0.25}),
            ))
        });
        let result = backups.trigger(None).await.unwrap();
        assert_eq!(result.backup_id.as_str(), "b-2");
        let sent = transport
            .last_request(&format!("{STANDALONE}/api/v2/backup/trigger"))
            .unwrap();
        assert_eq!(sent.json_body(), Some(json!({})));
    }

    #[tokio::test]
    async fn test_delete_uses_delete_method_with_backup_id() {
        let (backups, transport) = backend(ConnectionMode::Standalone, |_| {
            Ok(HttpResponse::json(200, &json!({"success": true})))
        });
        let ack = backups
            .delete(&BackupId::new("b-3").unwrap())
            .await
            .unwrap();
        assert!(ack.success);
        let sent = transport
            .last_request(&format!("{STANDALONE}/api/v2/backup/delete"))
            .unwrap();
        assert_eq!(sent.method, Method::Delete);
        assert_eq!(sent.json_body(), Some(json!({"backupId": "b-3"})));
    }

    #[tokio::test]
    async fn test_schedule_round_trips_wire_names() {
        let (backups, transport) = backend(ConnectionMode::HostPlugin, |request| {
            if request.method == Method::Get {
                Ok(HttpResponse::json(
                    200,
                    &json!({"enabled": true, "type": "weekly", "hour": 3, "dayOfWeek": 0}),
                ))
            } else {
                Ok(HttpResponse::json(200, &json!({"success": true})))
            }
        });
        let mut schedule = backups.get_schedule().await.unwrap();
        assert_eq!(schedule.kind, ScheduleKind::Weekly);
        assert_eq!(schedule.day_of_week, Some(0));

        schedule.retention_days = Some(30);
        backups.set_schedule(&schedule).await.unwrap();
        let sent = transport
            .last_request(&format!("{PLUGIN}/backup/schedule"))
            .unwrap();
        assert_eq!(
            sent.json_body(),
            Some(json!({"enabled": true, "type": "weekly", "hour": 3, "dayOfWeek": 0, "retentionDays": 30}))
        );
    }

    #[tokio::test]
    async fn test_sync_bodies_carry_resource_type() {
        let (backups, transport) = backend(ConnectionMode::Standalone, |_| {
            Ok(HttpResponse::json(200, &json!({"success": true, "count": 4})))
        });
        let outcome = backups.sync_from_st(ResourceKind::Worldbook).await.unwrap();
        assert_eq!(outcome.count, 4);
        backups
            .sync_to_st(ResourceKind::Character, "Seraphina.png")
            .await
            .unwrap();

        let from = transport
            .last_request(&format!("{STANDALONE}/api/v2/sync/from-st"))
            .unwrap();
        assert_eq!(from.json_body(), Some(json!({"type": "worldbook"})));
        let to = transport
            .last_request(&format!("{STANDALONE}/api/v2/sync/to-st"))
            .unwrap();
        assert_eq!(
            to.json_body(),
            Some(json!({"type": "character", "id": "Seraphina.png"}))
        );
    }

    #[tokio::test]
    async fn test_track_change_stamps_and_propagates_failure() {
        let (backups, transport) = backend(ConnectionMode::Standalone, |_| {
            Ok(HttpResponse::json(500, &json!({"message": "journal full"})))
        });
        let err = backups
            .track_change(ResourceKind::Regex, "r-1")
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ClientError::HttpApplicationError {
                status: 500,
                message: "journal full".to_string()
            }
        );
        let body = transport
            .last_request(&format!("{STANDALONE}/api/v2/track-change"))
            .unwrap()
            .json_body()
            .unwrap();
        assert_eq!(body["type"], "regex");
        assert_eq!(body["id"], "r-1");
        assert!(body["timestamp"].as_i64().unwrap() > 0);
    }

    #[tokio::test]
    async fn test_stats_and_config_pass_through() {
        let (backups, _) = backend(ConnectionMode::HostPlugin, |request| {
            if request.url.ends_with("/stats") {
                Ok(HttpResponse::json(200, &json!({"characters": 12, "worldbooks": 3})))
            } else {
                Ok(HttpResponse::json(200, &json!({"autoBackup": true})))
            }
        });
        let stats = backups.stats().await.unwrap();
        assert_eq!(stats.count("characters"), Some(12));
        let config = backups.get_config().await.unwrap();
        assert_eq!(config["autoBackup"], json!(true));
    }

    #[tokio::test]
    async fn test_unavailable_backend_fails_with_unreachable() {
        let (backups, _) = backend(ConnectionMode::Unavailable, |request| {
            panic!("no backend request expected, got {}", request.url)
        });
        let err = backups.list().await.unwrap_err();
        assert!(matches!(err, ClientError::NetworkUnreachable { .. }), "{err}");
    }
}
