//! The client context handed to every command.
//!
//! Built once from settings and the host's capabilities; owns the single
//! resolver, request client, resource facade and backup client for the run.

use std::sync::Arc;

use model::{BackupId, BackupSchedule, ClientResult, HeaderSource, HostCapabilities};
use resources::ResourceFacade;
use tracing::debug;
use transport::{
    ConnectionStatus, HostSession, HttpTransport, ReqwestTransport, RequestClient,
    TransportResolver, TransportSettings,
};

use backend::BackupClient;

pub struct ClientContext {
    session: Arc<HostSession>,
    resolver: Arc<TransportResolver>,
    client: RequestClient,
    resources: ResourceFacade,
    backups: BackupClient,
}

impl ClientContext {
    /// Wires the production `reqwest` transport.
    pub fn new(
        settings: &TransportSettings,
        capabilities: &HostCapabilities,
    ) -> ClientResult<Self> {
        let transport = Arc::new(ReqwestTransport::new(settings.health_timeout())?);
        Self::with_transport(settings, transport, capabilities)
    }

    pub fn with_transport(
        settings: &TransportSettings,
        transport: Arc<dyn HttpTransport>,
        capabilities: &HostCapabilities,
    ) -> ClientResult<Self> {
        let session = Arc::new(HostSession::new(settings, transport.clone())?);
        let headers: Arc<dyn HeaderSource> = session.clone();
        let resolver = Arc::new(TransportResolver::new(
            settings,
            transport.clone(),
            headers.clone(),
        )?);
        let client = RequestClient::new(settings, transport, resolver.clone(), headers)?;
        Ok(Self {
            session,
            resolver,
            resources: ResourceFacade::new(capabilities, client.clone()),
            backups: BackupClient::new(client.clone()),
            client,
        })
    }

    pub fn session(&self) -> &HostSession {
        &self.session
    }

    pub fn resources(&self) -> &ResourceFacade {
        &self.resources
    }

    pub fn backups(&self) -> &BackupClient {
        &self.backups
    }

    pub fn status(&self) -> ConnectionStatus {
        self.resolver.status()
    }

    pub async fn check_connection(&self) -> bool {
        self.resolver.check_connection().await
    }

    pub fn is_connected(&self) -> bool {
        self.resolver.is_connected()
    }

    pub fn set_base_url(&self, url: &str) -> ClientResult<()> {
        self.resolver.set_base_url(url)
    }

    /// Picks up a host session when one is available, then re-detects. The
    /// plugin probe is more likely to pass with the host's headers attached.
    pub async fn connect(&self) -> bool {
        if let Err(e) = self.session.refresh().await {
            debug!(error = %e, "No host session; detecting without it");
        }
        self.check_connection().await
    }

    /// Fetches a host session unless one is already held. Backend calls routed
    /// through the host plugin are rejected without it; a standalone backend
    /// does not need it, so a failure is only logged.
    pub async fn ensure_session(&self) {
        if self.session.is_ready() {
            return;
        }
        if let Err(e) = self.session.refresh().await {
            debug!(error = %e, "No host session; backend calls go without host headers");
        }
    }

    /// Restores a backup and reports whether the backend accepted it.
    pub async fn restore_backup(&self, id: &BackupId) -> ClientResult<bool> {
        Ok(self.backups.restore(id).await?.success)
    }

    /// Replaces the backup schedule and reports whether the backend accepted it.
    pub async fn set_schedule(&self, schedule: &BackupSchedule) -> ClientResult<bool> {
        Ok(self.backups.set_schedule(schedule).await?.success)
    }

    /// Cancels whatever requests are still in flight.
    pub fn abort_pending(&self) {
        self.client.abort_pending();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::{ClientError, ScheduleKind};
    use resources::StrategyKind;
    use serde_json::json;
    use transport::testing::{unreachable, ScriptedTransport};
    use transport::{ConnectionMode, HttpResponse};

    const PLUGIN: &str = "http://localhost:8000/api/plugins/st-manager";

    /// Host with the plugin mounted. The plugin health check demands the CSRF
    /// token, as a host with CSRF protection on plugin routes would.
    fn plugin_host() -> Arc<ScriptedTransport> {
        Arc::new(ScriptedTransport::new(|request| {
            let url = request.url.as_str();
            if url == "http://localhost:8000/csrf-token" {
                return Ok(HttpResponse::json(200, &json!({"token": "abc"})));
            }
            if url == format!("{PLUGIN}/health") {
                if request.header("x-csrf-token") != Some("abc") {
                    return Ok(HttpResponse::text(403, "Forbidden"));
                }
                return Ok(HttpResponse::json(200, &json!({"status": "ok", "version": "1.4.0"})));
            }
            if url == format!("{PLUGIN}/backup/restore") || url == format!("{PLUGIN}/backup/schedule") {
                return Ok(HttpResponse::json(200, &json!({"success": false, "message": "busy"})));
            }
            Err(unreachable(url))
        }))
    }

    fn context(transport: Arc<ScriptedTransport>) -> ClientContext {
        ClientContext::with_transport(
            &TransportSettings::default(),
            transport,
            &HostCapabilities::default(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_connect_uses_host_session_for_plugin_probe() {
        let ctx = context(plugin_host());
        assert!(!ctx.is_connected());
        assert!(ctx.connect().await);
        assert_eq!(ctx.status().mode, ConnectionMode::HostPlugin);
        assert_eq!(ctx.status().backend_version.as_deref(), Some("1.4.0"));
        assert_eq!(ctx.resources().capabilities().character, StrategyKind::Rest);
    }

    #[tokio::test]
    async fn test_check_without_session_falls_through() {
        let ctx = context(plugin_host());
        assert!(!ctx.check_connection().await);
        assert_eq!(ctx.status().mode, ConnectionMode::Unavailable);
    }

    #[tokio::test]
    async fn test_acknowledgements_become_booleans() {
        let ctx = context(plugin_host());
        ctx.connect().await;
        let accepted = ctx
            .restore_backup(&BackupId::new("b-1").unwrap())
            .await
            .unwrap();
        assert!(!accepted);

        let schedule = BackupSchedule {
            enabled: true,
            kind: ScheduleKind::Daily,
            hour: Some(4),
            day_of_week: None,
            retention_days: Some(7),
        };
        assert!(!ctx.set_schedule(&schedule).await.unwrap());
    }

    #[tokio::test]
    async fn test_set_base_url_resets_mode_and_rejects_garbage() {
        let ctx = context(plugin_host());
        ctx.connect().await;
        assert!(ctx.is_connected());

        ctx.set_base_url("http://192.168.1.20:5000/").unwrap();
        assert_eq!(ctx.status().mode, ConnectionMode::Unknown);
        assert_eq!(ctx.status().base_url, "http://192.168.1.20:5000");

        let err = ctx.set_base_url("not a url").unwrap_err();
        assert!(matches!(err, ClientError::InvalidConfiguration { .. }));
        assert_eq!(ctx.status().base_url, "http://192.168.1.20:5000");
    }
}
