//! Typed client for the app interface.

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use paperz_core::hash::CellId;

use crate::error::ConductorError;
use crate::socket::Connection;
use crate::wire::{AppRequest, AppResponse, InstalledApp, Payload, ZomeCall};

/// Client for the conductor's app websocket.
#[derive(Clone)]
pub struct AppWebsocket {
    conn: Connection,
}

impl AppWebsocket {
    /// Connect to the app interface, e.g. `ws://localhost:9999`.
    pub async fn connect(url: &str) -> Result<Self, ConductorError> {
        Ok(Self {
            conn: Connection::connect(url, "app").await?,
        })
    }

    async fn call(&self, req: AppRequest) -> Result<AppResponse, ConductorError> {
        let resp = self.conn.request(Payload::encode(&req)?).await?;
        match resp.decode::<AppResponse>()? {
            AppResponse::Error(err) => Err(ConductorError::Remote {
                kind: err.kind,
                message: err.message,
            }),
            resp => Ok(resp),
        }
    }

    /// Look up an installed app; `None` when the id is unknown.
    pub async fn app_info(
        &self,
        installed_app_id: &str,
    ) -> Result<Option<InstalledApp>, ConductorError> {
        let req = AppRequest::AppInfo {
            installed_app_id: installed_app_id.to_string(),
        };
        match self.call(req).await? {
            AppResponse::AppInfo(info) => Ok(info),
            resp => Err(ConductorError::unexpected("app_info", &resp)),
        }
    }

    /// Invoke a zome function: encode `input`, call, decode the output.
    ///
    /// Provenance is always the cell's own agent, and the cap string is
    /// empty; the conductor accepts such self-calls without a grant.
    pub async fn call_zome<I, O>(
        &self,
        cell_id: &CellId,
        zome_name: &str,
        fn_name: &str,
        input: &I,
    ) -> Result<O, ConductorError>
    where
        I: Serialize,
        O: DeserializeOwned,
    {
        let call = ZomeCall {
            cell_id: cell_id.clone(),
            zome_name: zome_name.to_string(),
            fn_name: fn_name.to_string(),
            payload: Payload::encode(input)?,
            provenance: cell_id.agent().clone(),
            cap: String::new(),
        };
        debug!(zome = zome_name, func = fn_name, "zome call");
        match self.call(AppRequest::CallZome(call)).await? {
            AppResponse::ZomeCalled(out) => Ok(out.decode()?),
            resp => Err(ConductorError::unexpected(fn_name, &resp)),
        }
    }
}
