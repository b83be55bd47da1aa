//! Typed client for the admin interface.

use paperz_core::hash::{AgentPubKey, CellId, DnaHash};
use tracing::info;

use crate::error::ConductorError;
use crate::socket::Connection;
use crate::wire::{AdminRequest, AdminResponse, DnaSpec, InstalledApp, Payload};

/// Client for the conductor's admin websocket.
///
/// Each method issues one request and insists on the matching response
/// variant; anything else is a [`ConductorError::UnexpectedResponse`].
#[derive(Clone)]
pub struct AdminWebsocket {
    conn: Connection,
}

impl AdminWebsocket {
    /// Connect to the admin interface, e.g. `ws://localhost:9000`.
    pub async fn connect(url: &str) -> Result<Self, ConductorError> {
        Ok(Self {
            conn: Connection::connect(url, "admin").await?,
        })
    }

    async fn call(&self, req: AdminRequest) -> Result<AdminResponse, ConductorError> {
        let resp = self.conn.request(Payload::encode(&req)?).await?;
        match resp.decode::<AdminResponse>()? {
            AdminResponse::Error(err) => Err(ConductorError::Remote {
                kind: err.kind,
                message: err.message,
            }),
            resp => Ok(resp),
        }
    }

    /// Register a DNA bundle from a conductor-local path.
    pub async fn register_dna(&self, path: &str) -> Result<DnaHash, ConductorError> {
        let req = AdminRequest::RegisterDna {
            path: path.to_string(),
        };
        match self.call(req).await? {
            AdminResponse::DnaRegistered(hash) => {
                info!(path, %hash, "registered dna");
                Ok(hash)
            }
            resp => Err(ConductorError::unexpected("register_dna", &resp)),
        }
    }

    /// Install an app from registered DNAs under the given agent key.
    pub async fn install_app(
        &self,
        installed_app_id: &str,
        agent_key: AgentPubKey,
        dnas: Vec<DnaSpec>,
    ) -> Result<InstalledApp, ConductorError> {
        let req = AdminRequest::InstallApp {
            installed_app_id: installed_app_id.to_string(),
            agent_key,
            dnas,
        };
        match self.call(req).await? {
            AdminResponse::AppInstalled(app) => {
                info!(app_id = %app.installed_app_id, cells = app.cell_data.len(), "installed app");
                Ok(app)
            }
            resp => Err(ConductorError::unexpected("install_app", &resp)),
        }
    }

    pub async fn enable_app(&self, installed_app_id: &str) -> Result<(), ConductorError> {
        let req = AdminRequest::EnableApp {
            installed_app_id: installed_app_id.to_string(),
        };
        match self.call(req).await? {
            AdminResponse::AppEnabled => Ok(()),
            resp => Err(ConductorError::unexpected("enable_app", &resp)),
        }
    }

    pub async fn disable_app(&self, installed_app_id: &str) -> Result<(), ConductorError> {
        let req = AdminRequest::DisableApp {
            installed_app_id: installed_app_id.to_string(),
        };
        match self.call(req).await? {
            AdminResponse::AppDisabled => Ok(()),
            resp => Err(ConductorError::unexpected("disable_app", &resp)),
        }
    }

    pub async fn uninstall_app(&self, installed_app_id: &str) -> Result<(), ConductorError> {
        let req = AdminRequest::UninstallApp {
            installed_app_id: installed_app_id.to_string(),
        };
        match self.call(req).await? {
            AdminResponse::AppUninstalled => Ok(()),
            resp => Err(ConductorError::unexpected("uninstall_app", &resp)),
        }
    }

    pub async fn generate_agent_pub_key(&self) -> Result<AgentPubKey, ConductorError> {
        match self.call(AdminRequest::GenerateAgentPubKey).await? {
            AdminResponse::AgentPubKeyGenerated(key) => Ok(key),
            resp => Err(ConductorError::unexpected("generate_agent_pub_key", &resp)),
        }
    }

    pub async fn list_dnas(&self) -> Result<Vec<DnaHash>, ConductorError> {
        match self.call(AdminRequest::ListDnas).await? {
            AdminResponse::DnasListed(dnas) => Ok(dnas),
            resp => Err(ConductorError::unexpected("list_dnas", &resp)),
        }
    }

    /// Every cell the conductor is running, across all apps.
    pub async fn list_cell_ids(&self) -> Result<Vec<CellId>, ConductorError> {
        match self.call(AdminRequest::ListCellIds).await? {
            AdminResponse::CellIdsListed(cells) => Ok(cells),
            resp => Err(ConductorError::unexpected("list_cell_ids", &resp)),
        }
    }

    pub async fn list_active_apps(&self) -> Result<Vec<String>, ConductorError> {
        match self.call(AdminRequest::ListActiveApps).await? {
            AdminResponse::ActiveAppsListed(apps) => Ok(apps),
            resp => Err(ConductorError::unexpected("list_active_apps", &resp)),
        }
    }

    /// Ask the conductor to open an app interface on `port`; returns the
    /// port actually bound.
    pub async fn attach_app_interface(&self, port: u16) -> Result<u16, ConductorError> {
        match self.call(AdminRequest::AttachAppInterface { port }).await? {
            AdminResponse::AppInterfaceAttached { port } => Ok(port),
            resp => Err(ConductorError::unexpected("attach_app_interface", &resp)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StubConductor;

    #[tokio::test]
    async fn register_and_list_dnas() {
        let stub = StubConductor::start().await;
        let admin = AdminWebsocket::connect(&stub.admin_url()).await.unwrap();

        let hash = admin.register_dna("./happs/hub/hub.dna").await.unwrap();
        let dnas = admin.list_dnas().await.unwrap();
        assert_eq!(dnas, vec![hash]);
    }

    #[tokio::test]
    async fn install_enable_and_list() {
        let stub = StubConductor::start().await;
        let admin = AdminWebsocket::connect(&stub.admin_url()).await.unwrap();

        let dna = admin.register_dna("./happs/hub/hub.dna").await.unwrap();
        let agent = admin.generate_agent_pub_key().await.unwrap();
        let app = admin
            .install_app(
                "hub",
                agent.clone(),
                vec![DnaSpec {
                    hash: dna,
                    role_id: "thedna".into(),
                }],
            )
            .await
            .unwrap();
        assert_eq!(app.installed_app_id, "hub");
        assert_eq!(app.cell_data.len(), 1);
        assert_eq!(app.cell_data[0].role_id, "thedna");
        assert_eq!(app.cell_data[0].cell_id.agent(), &agent);

        admin.enable_app("hub").await.unwrap();
        assert_eq!(admin.list_active_apps().await.unwrap(), vec!["hub"]);

        let cells = admin.list_cell_ids().await.unwrap();
        assert_eq!(cells, vec![app.cell_data[0].cell_id.clone()]);
    }

    #[tokio::test]
    async fn enable_unknown_app_is_a_remote_error() {
        let stub = StubConductor::start().await;
        let admin = AdminWebsocket::connect(&stub.admin_url()).await.unwrap();

        let err = admin.enable_app("nope").await.unwrap_err();
        match err {
            ConductorError::Remote { kind, .. } => assert_eq!(kind, "app_not_installed"),
            other => panic!("expected remote error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn disable_then_uninstall() {
        let stub = StubConductor::start().await;
        let admin = AdminWebsocket::connect(&stub.admin_url()).await.unwrap();

        stub.install_paperz_app("test-app");
        admin.disable_app("test-app").await.unwrap();
        assert!(admin.list_active_apps().await.unwrap().is_empty());

        admin.uninstall_app("test-app").await.unwrap();
        assert!(admin.list_cell_ids().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn attach_app_interface_echoes_port() {
        let stub = StubConductor::start().await;
        let admin = AdminWebsocket::connect(&stub.admin_url()).await.unwrap();
        assert_eq!(admin.attach_app_interface(4444).await.unwrap(), 4444);
    }
}
