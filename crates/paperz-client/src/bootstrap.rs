//! First-run hub provisioning and the opening reads.
//!
//! A conductor running exactly one cell is a fresh install whose hub still
//! needs setting up. The hub DNA gets registered, installed under the hub
//! app id, enabled, and its cell id pushed into the app zome so remote
//! sense-maker calls know where to go. Any other cell count leaves the
//! conductor untouched. [`boot`] runs that check, then pulls the stored
//! definitions for the known paths and the current board.

use tracing::{debug, info};

use paperz_conductor::DnaSpec;
use paperz_core::hash::CellId;
use paperz_core::sensemaker::{ANNOTATIONZ_PATH, MEMEZ_PATH};

use crate::error::ClientError;
use crate::paperz::{Board, SmDefinition};
use crate::session::Session;

/// Outcome of [`ensure_hub`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HubStatus {
    /// Hub installed and announced during this call.
    Provisioned(CellId),
    /// Cell count was not exactly one; nothing was changed.
    Untouched { cells: usize },
}

/// Provision the hub iff the conductor runs exactly one cell.
pub async fn ensure_hub(session: &Session) -> Result<HubStatus, ClientError> {
    let cells = session.admin.list_cell_ids().await?;
    if cells.len() != 1 {
        debug!(cells = cells.len(), "skipping hub provisioning");
        return Ok(HubStatus::Untouched { cells: cells.len() });
    }

    let config = session.config();
    let dna = session.admin.register_dna(&config.hub_dna_path).await?;
    let app = session
        .admin
        .install_app(
            &config.hub_app_id,
            session.cell().agent().clone(),
            vec![DnaSpec {
                hash: dna,
                role_id: config.hub_role_id.clone(),
            }],
        )
        .await?;
    session.admin.enable_app(&config.hub_app_id).await?;

    let hub_cell = app
        .cell_data
        .first()
        .ok_or_else(|| ClientError::NoCells(config.hub_app_id.clone()))?
        .cell_id
        .clone();
    session.paperz().set_hub_cell_id(&hub_cell).await?;
    info!(hub = %hub_cell, "hub provisioned");

    Ok(HubStatus::Provisioned(hub_cell))
}

/// Everything [`boot`] gathers on startup.
#[derive(Debug, Clone)]
pub struct BootReport {
    pub hub: HubStatus,
    /// Stored init/comp definitions for the annotationz and memez paths.
    pub definitions: Vec<(String, SmDefinition)>,
    pub board: Board,
}

/// Full startup pass: provision the hub if the conductor is fresh, then
/// read the stored sense-maker definitions and the current board.
pub async fn boot(session: &Session) -> Result<BootReport, ClientError> {
    let hub = ensure_hub(session).await?;
    let paperz = session.paperz();
    let definitions = paperz.sm_overview(&[ANNOTATIONZ_PATH, MEMEZ_PATH]).await?;
    let board = paperz.fetch_board().await?;
    debug!(
        definitions = definitions.len(),
        papers = board.papers.len(),
        "startup reads done"
    );
    Ok(BootReport {
        hub,
        definitions,
        board,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use paperz_conductor::testing::StubConductor;
    use paperz_core::sensemaker::SmValue;
    use paperz_core::types::Paper;

    #[tokio::test]
    async fn single_cell_conductor_gets_a_hub() {
        let stub = StubConductor::start().await;
        stub.install_paperz_app("test-app");
        let session = Session::connect(stub.config()).await.unwrap();

        let status = ensure_hub(&session).await.unwrap();
        let HubStatus::Provisioned(hub_cell) = status else {
            panic!("expected provisioning, got {status:?}");
        };

        // registered + installed + enabled, and announced to the app zome
        assert_eq!(stub.registered_dnas().len(), 1);
        assert!(stub.active_apps().contains(&"hub".to_string()));
        assert_eq!(stub.hub_cell(), Some(hub_cell.clone()));
        // the hub runs under the same agent as the app cell
        assert_eq!(hub_cell.agent(), session.cell().agent());
    }

    #[tokio::test]
    async fn provisioned_conductor_is_left_alone() {
        let stub = StubConductor::start().await;
        stub.install_paperz_app("test-app");
        stub.add_cell();
        let session = Session::connect(stub.config()).await.unwrap();

        let status = ensure_hub(&session).await.unwrap();
        assert_eq!(status, HubStatus::Untouched { cells: 2 });
        assert!(stub.registered_dnas().is_empty());
        assert_eq!(stub.hub_cell(), None);
    }

    #[tokio::test]
    async fn empty_conductor_is_left_alone() {
        let stub = StubConductor::start().await;
        stub.install_paperz_app("test-app");
        let session = Session::connect(stub.config()).await.unwrap();

        // the app cell is gone by the time we provision
        session.admin.uninstall_app("test-app").await.unwrap();
        let status = ensure_hub(&session).await.unwrap();
        assert_eq!(status, HubStatus::Untouched { cells: 0 });
    }

    #[tokio::test]
    async fn boot_reads_definitions_and_board() {
        let stub = StubConductor::start().await;
        stub.install_paperz_app("test-app");
        stub.seed_sm_init(ANNOTATIONZ_PATH, "0", SmValue::Int(0));
        stub.seed_paper(Paper::from_bytes("intro.pdf", b"%PDF"));
        let session = Session::connect(stub.config()).await.unwrap();

        let report = boot(&session).await.unwrap();
        assert!(matches!(report.hub, HubStatus::Provisioned(_)));

        // one entry per known path, seeded or not
        let paths: Vec<&str> = report.definitions.iter().map(|(p, _)| p.as_str()).collect();
        assert_eq!(paths, [ANNOTATIONZ_PATH, MEMEZ_PATH]);
        assert!(report.definitions[0].1.init.is_some());
        assert!(report.definitions[1].1.init.is_none());
        assert_eq!(report.board.papers.len(), 1);
    }

    #[tokio::test]
    async fn boot_surfaces_read_failures() {
        let stub = StubConductor::start().await;
        stub.install_paperz_app("test-app");
        stub.add_cell();
        let session = Session::connect(stub.config()).await.unwrap();

        // two cells skip provisioning, so the armed failure hits the reads
        stub.fail_next_zome_call("hub down");
        let err = boot(&session).await.unwrap_err();
        assert!(err.to_string().contains("hub down"));
    }
}
