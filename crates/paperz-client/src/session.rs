//! Connected interface pair plus the resolved app cell.

use tracing::info;

use paperz_conductor::{AdminWebsocket, AppWebsocket};
use paperz_core::config::ConductorConfig;
use paperz_core::hash::CellId;

use crate::error::ClientError;
use crate::memez::MemezClient;
use crate::paperz::PaperzClient;

/// Both conductor interfaces, with the app's cell already looked up.
///
/// The cell is `cell_data[0]` of the configured app id. Zome clients
/// share the app connection, so one session serves any number of them.
pub struct Session {
    pub admin: AdminWebsocket,
    pub app: AppWebsocket,
    config: ConductorConfig,
    cell: CellId,
}

impl Session {
    /// Connect both interfaces and resolve the app's cell.
    pub async fn connect(config: ConductorConfig) -> Result<Self, ClientError> {
        let admin = AdminWebsocket::connect(&config.admin_url()).await?;
        let app = AppWebsocket::connect(&config.app_url()).await?;

        let info = app
            .app_info(&config.app_id)
            .await?
            .ok_or_else(|| ClientError::AppNotInstalled(config.app_id.clone()))?;
        let cell = info
            .cell_data
            .first()
            .ok_or_else(|| ClientError::NoCells(config.app_id.clone()))?
            .cell_id
            .clone();
        info!(app_id = %config.app_id, cell = %cell, "session established");

        Ok(Self {
            admin,
            app,
            config,
            cell,
        })
    }

    pub fn cell(&self) -> &CellId {
        &self.cell
    }

    pub fn config(&self) -> &ConductorConfig {
        &self.config
    }

    /// Whether the sense-maker bridge is usable, read as the configured
    /// app id showing up in the conductor's active list.
    pub async fn sensemaker_present(&self) -> Result<bool, ClientError> {
        let apps = self.admin.list_active_apps().await?;
        Ok(apps.contains(&self.config.app_id))
    }

    pub fn paperz(&self) -> PaperzClient {
        PaperzClient::new(
            self.app.clone(),
            self.cell.clone(),
            self.config.paperz_zome.clone(),
        )
    }

    pub fn memez(&self) -> MemezClient {
        MemezClient::new(
            self.app.clone(),
            self.cell.clone(),
            self.config.memez_zome.clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use paperz_conductor::testing::StubConductor;

    #[tokio::test]
    async fn connect_resolves_the_app_cell() {
        let stub = StubConductor::start().await;
        let cell = stub.install_paperz_app("test-app");

        let session = Session::connect(stub.config()).await.unwrap();
        assert_eq!(session.cell(), &cell);
        assert!(session.sensemaker_present().await.unwrap());
    }

    #[tokio::test]
    async fn connect_fails_when_app_missing() {
        let stub = StubConductor::start().await;

        let res = Session::connect(stub.config()).await;
        assert!(matches!(res, Err(ClientError::AppNotInstalled(id)) if id == "test-app"));
    }
}
