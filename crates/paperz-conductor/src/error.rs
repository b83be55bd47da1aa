use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConductorError {
    #[error("connect to {url}: {source}")]
    Connect {
        url: String,
        #[source]
        source: tokio_tungstenite::tungstenite::Error,
    },

    #[error("transport: {0}")]
    Transport(String),

    #[error("encode: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    #[error("decode: {0}")]
    Decode(#[from] rmp_serde::decode::Error),

    #[error("conductor error ({kind}): {message}")]
    Remote { kind: String, message: String },

    #[error("unexpected response for {0}")]
    UnexpectedResponse(String),
}

impl ConductorError {
    pub(crate) fn unexpected(call: &str, resp: &impl std::fmt::Debug) -> Self {
        Self::UnexpectedResponse(format!("{call}: {resp:?}"))
    }
}
