//! Typed calls into the memez zome.

use paperz_conductor::AppWebsocket;
use paperz_core::hash::{ActionHash, CellId, EntryHash};
use paperz_core::sensemaker::{MEMEZ_PATH, SensemakerEntry};
use paperz_core::types::Meme;

use crate::error::ClientError;

/// Client for the memez zome of the app cell.
///
/// Meme machines all live under the `memez` path, so unlike
/// [`crate::paperz::PaperzClient`] the path never varies here.
#[derive(Clone)]
pub struct MemezClient {
    app: AppWebsocket,
    cell: CellId,
    zome: String,
}

impl MemezClient {
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

    pub async fn upload_meme(&self, meme: &Meme) -> Result<(EntryHash, ActionHash), ClientError> {
        self.call("upload_meme", meme).await
    }

    /// The scored feed: every meme with its score under `score_comp`, which
    /// the hub applies to the meme's clap count and the uploader's agent
    /// score.
    pub async fn fetch_feed(
        &self,
        score_comp: &str,
    ) -> Result<Vec<(EntryHash, Meme, i64)>, ClientError> {
        let input = (score_comp.to_string(), self.cell.agent().clone());
        self.call("get_all_memez", &input).await
    }

    /// One clap: steps the meme's machine with action "1".
    pub async fn clap_for_meme(&self, meme: &EntryHash) -> Result<(), ClientError> {
        self.call("clap_for_meme", meme).await
    }

    /// Accumulated claps, when the meme's machine holds an integer.
    pub async fn clap_count(&self, meme: &EntryHash) -> Result<Option<i64>, ClientError> {
        self.call("meme_clap_count", meme).await
    }

    pub async fn set_sm_init(&self, expr: &str) -> Result<bool, ClientError> {
        self.call("set_sm_init", &(MEMEZ_PATH.to_string(), expr.to_string()))
            .await
    }

    pub async fn set_sm_comp(&self, expr: &str) -> Result<bool, ClientError> {
        self.call("set_sm_comp", &(MEMEZ_PATH.to_string(), expr.to_string()))
            .await
    }

    pub async fn get_sm_init(&self) -> Result<Option<(EntryHash, SensemakerEntry)>, ClientError> {
        self.call("get_sm_init", &MEMEZ_PATH.to_string()).await
    }

    pub async fn get_sm_comp(&self) -> Result<Option<(EntryHash, SensemakerEntry)>, ClientError> {
        self.call("get_sm_comp", &MEMEZ_PATH.to_string()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Session;
    use paperz_conductor::testing::{StepTarget, StubConductor};
    use paperz_core::sensemaker::SmValue;

    async fn session_with_app() -> (StubConductor, Session) {
        let stub = StubConductor::start().await;
        stub.install_paperz_app("test-app");
        let session = Session::connect(stub.config()).await.unwrap();
        (stub, session)
    }

    #[tokio::test]
    async fn feed_scores_come_from_machine_state() {
        let (stub, session) = session_with_app().await;
        let memez = session.memez();

        let loud = stub.seed_meme(Meme::from_bytes("loud.png", b"a"));
        let quiet = stub.seed_meme(Meme::from_bytes("quiet.png", b"b"));
        stub.seed_sm_data(MEMEZ_PATH, &loud, "0", SmValue::Int(41));

        let feed = memez.fetch_feed("+").await.unwrap();
        assert_eq!(feed.len(), 2);
        assert_eq!(feed[0], (loud, Meme::from_bytes("loud.png", b"a"), 41));
        assert_eq!(feed[1].0, quiet);
        assert_eq!(feed[1].2, 0);
    }

    #[tokio::test]
    async fn clapping_steps_the_meme_machine() {
        let (stub, session) = session_with_app().await;
        let memez = session.memez();

        let (eh, _) = memez
            .upload_meme(&Meme::from_bytes("cat.png", b"img"))
            .await
            .unwrap();
        memez.clap_for_meme(&eh).await.unwrap();

        let steps = stub.steps();
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].path, "memez");
        assert_eq!(steps[0].target, StepTarget::Entry(eh));
        assert_eq!(steps[0].act, "1");
    }

    #[tokio::test]
    async fn clap_count_reads_machine_integers() {
        let (stub, session) = session_with_app().await;
        let memez = session.memez();

        let meme = stub.seed_meme(Meme::from_bytes("cat.png", b"img"));
        assert_eq!(memez.clap_count(&meme).await.unwrap(), None);

        stub.seed_sm_data(MEMEZ_PATH, &meme, "0", SmValue::Int(3));
        assert_eq!(memez.clap_count(&meme).await.unwrap(), Some(3));
    }

    #[tokio::test]
    async fn new_meme_inherits_init_state() {
        let (stub, session) = session_with_app().await;
        let memez = session.memez();

        stub.seed_sm_init(MEMEZ_PATH, "5", SmValue::Int(5));
        let (eh, _) = memez
            .upload_meme(&Meme::from_bytes("cat.png", b"img"))
            .await
            .unwrap();

        assert_eq!(memez.clap_count(&eh).await.unwrap(), Some(5));
        let feed = memez.fetch_feed("+").await.unwrap();
        assert_eq!(feed[0].2, 5);

        // the data link hangs off the entry, so the paperz lookup sees it too
        let data = session.paperz().get_sm_data_for_eh(&eh).await.unwrap();
        assert_eq!(data.unwrap().1.output_flat_value, SmValue::Int(5));
    }
}
