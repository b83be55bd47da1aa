//! Typed calls into the paperz zome, and the aggregated board model.

use tracing::debug;

use paperz_conductor::AppWebsocket;
use paperz_core::hash::{ActionHash, AgentPubKey, CellId, EntryHash};
use paperz_core::sensemaker::SensemakerEntry;
use paperz_core::types::{Annotation, Paper};

use crate::error::ClientError;

/// Client for the paperz zome of the app cell.
#[derive(Clone)]
pub struct PaperzClient {
    app: AppWebsocket,
    cell: CellId,
    zome: String,
}

/// One annotation with its attached review state, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotationCard {
    pub hash: EntryHash,
    pub annotation: Annotation,
    pub sm_data: Option<(EntryHash, SensemakerEntry)>,
}

/// One paper with everything hanging off it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaperCard {
    pub hash: EntryHash,
    pub paper: Paper,
    pub annotationz: Vec<AnnotationCard>,
}

/// Every paper, its annotations, and their review state.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Board {
    pub papers: Vec<PaperCard>,
}

/// Current init and comp expressions stored for one path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmDefinition {
    pub init: Option<(EntryHash, SensemakerEntry)>,
    pub comp: Option<(EntryHash, SensemakerEntry)>,
}

impl PaperzClient {
    pub(crate) fn new(app: AppWebsocket, cell: CellId, zome: String) -> Self {
        Self { app, cell, zome }
    }

    async fn call<I, O>(&self, fn_name: &str, input: &I) -> Result<O, ClientError>
    where
        I: serde::Serialize,
        O: serde::de::DeserializeOwned,
    {
        Ok(self
            .app
            .call_zome(&self.cell, &self.zome, fn_name, input)
            .await?)
    }

    /// The agent all calls run as.
    pub fn agent(&self) -> &AgentPubKey {
        self.cell.agent()
    }

    // ── Papers and annotations ──

    /// Store a paper; the zome also bumps the uploader's per-agent machine.
    pub async fn upload_paper(
        &self,
        paper: &Paper,
    ) -> Result<(EntryHash, ActionHash), ClientError> {
        self.call("upload_paper", &(paper, self.cell.agent())).await
    }

    pub async fn get_all_paperz(&self) -> Result<Vec<(EntryHash, Paper)>, ClientError> {
        self.call("get_all_paperz", &()).await
    }

    pub async fn get_annotations_for_paper(
        &self,
        paper: &EntryHash,
    ) -> Result<Vec<(EntryHash, Annotation)>, ClientError> {
        self.call("get_annotations_for_paper", paper).await
    }

    pub async fn create_annotation(
        &self,
        annotation: &Annotation,
    ) -> Result<(EntryHash, ActionHash), ClientError> {
        self.call("create_annotation", annotation).await
    }

    // ── Sense-maker ──

    /// Review state attached to an annotation, if one exists yet.
    pub async fn get_sm_data_for_eh(
        &self,
        target: &EntryHash,
    ) -> Result<Option<(EntryHash, SensemakerEntry)>, ClientError> {
        self.call("get_sm_data", target).await
    }

    pub async fn get_sm_init(
        &self,
        path: &str,
    ) -> Result<Option<(EntryHash, SensemakerEntry)>, ClientError> {
        self.call("get_sm_init", &path.to_string()).await
    }

    pub async fn get_sm_comp(
        &self,
        path: &str,
    ) -> Result<Option<(EntryHash, SensemakerEntry)>, ClientError> {
        self.call("get_sm_comp", &path.to_string()).await
    }

    /// Returns whether the hub accepted the expression.
    pub async fn set_sm_init(&self, path: &str, expr: &str) -> Result<bool, ClientError> {
        self.call("set_sm_init", &(path.to_string(), expr.to_string()))
            .await
    }

    pub async fn set_sm_comp(&self, path: &str, expr: &str) -> Result<bool, ClientError> {
        self.call("set_sm_comp", &(path.to_string(), expr.to_string()))
            .await
    }

    /// Create this agent's machine state under `path` from the path's init.
    pub async fn init_agent_sm_data(&self, path: &str) -> Result<(), ClientError> {
        let input = (path.to_string(), self.cell.agent().to_base64());
        self.call("init_agent_sm_data", &input).await
    }

    /// Advance the machine attached to `target` with an action.
    pub async fn step_sm(
        &self,
        path: &str,
        target: &EntryHash,
        act: &str,
    ) -> Result<(), ClientError> {
        let input = (path.to_string(), target, act.to_string());
        self.call("step_sm_remote", &input).await
    }

    /// Advance a machine addressed by path component instead of entry hash.
    pub async fn step_sm_path(
        &self,
        path: &str,
        component: &str,
        act: &str,
    ) -> Result<(), ClientError> {
        let input = (path.to_string(), component.to_string(), act.to_string());
        self.call("step_sm_path_remote", &input).await
    }

    /// Tell the app zome where the hub cell lives.
    pub async fn set_hub_cell_id(&self, hub: &CellId) -> Result<(), ClientError> {
        self.call("set_sensemaker_cell_id", hub).await
    }

    /// The hub cell the app zome currently delegates to, if any.
    pub async fn get_hub_cell_id(&self) -> Result<Option<CellId>, ClientError> {
        self.call("get_sensemaker_cell_id", &()).await
    }

    // ── Aggregation ──

    /// Fetch the full [`Board`]: papers, their annotations, and each
    /// annotation's review state, gathered serially.
    pub async fn fetch_board(&self) -> Result<Board, ClientError> {
        let mut papers = Vec::new();
        for (paper_hash, paper) in self.get_all_paperz().await? {
            let mut annotationz = Vec::new();
            for (hash, annotation) in self.get_annotations_for_paper(&paper_hash).await? {
                let sm_data = self.get_sm_data_for_eh(&hash).await?;
                annotationz.push(AnnotationCard {
                    hash,
                    annotation,
                    sm_data,
                });
            }
            papers.push(PaperCard {
                hash: paper_hash,
                paper,
                annotationz,
            });
        }
        debug!(papers = papers.len(), "fetched board");
        Ok(Board { papers })
    }

    /// Both stored expressions for a path, fetched together.
    pub async fn sm_definition(&self, path: &str) -> Result<SmDefinition, ClientError> {
        Ok(SmDefinition {
            init: self.get_sm_init(path).await?,
            comp: self.get_sm_comp(path).await?,
        })
    }

    /// Store an init expression, then re-read both stored definitions so
    /// the caller renders what the hub actually holds.
    pub async fn submit_sm_init(
        &self,
        path: &str,
        expr: &str,
    ) -> Result<(bool, SmDefinition), ClientError> {
        let accepted = self.set_sm_init(path, expr).await?;
        Ok((accepted, self.sm_definition(path).await?))
    }

    /// Store a comp expression, then re-read both stored definitions.
    pub async fn submit_sm_comp(
        &self,
        path: &str,
        expr: &str,
    ) -> Result<(bool, SmDefinition), ClientError> {
        let accepted = self.set_sm_comp(path, expr).await?;
        Ok((accepted, self.sm_definition(path).await?))
    }

    /// Stored definitions for several paths at once.
    pub async fn sm_overview(
        &self,
        paths: &[&str],
    ) -> Result<Vec<(String, SmDefinition)>, ClientError> {
        let mut overview = Vec::with_capacity(paths.len());
        for path in paths {
            overview.push((path.to_string(), self.sm_definition(path).await?));
        }
        Ok(overview)
    }
}
