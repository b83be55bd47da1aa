//! Wire framing: MessagePack envelopes and the typed request/response unions.
//!
//! Every frame is an envelope of `{ id, type, data }` where `data` is itself
//! a MessagePack document, so bodies are encoded twice: the typed union into
//! payload bytes, then the envelope around them. Zome call inputs and outputs
//! nest one level further, as payloads inside the app-interface bodies.

use std::fmt;

use serde::de::{self, DeserializeOwned, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use paperz_core::hash::{AgentPubKey, CellId, DnaHash};

// ── Envelope ──

/// One frame on either interface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireMessage {
    /// Request/response correlation id, scoped to one connection.
    pub id: u64,
    #[serde(rename = "type")]
    pub kind: WireKind,
    pub data: Payload,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WireKind {
    Request,
    Response,
    /// Unsolicited conductor emission; carries no correlation.
    Signal,
}

impl WireMessage {
    pub fn request(id: u64, data: Payload) -> Self {
        Self {
            id,
            kind: WireKind::Request,
            data,
        }
    }

    pub fn response(id: u64, data: Payload) -> Self {
        Self {
            id,
            kind: WireKind::Response,
            data,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, rmp_serde::encode::Error> {
        rmp_serde::to_vec_named(self)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, rmp_serde::decode::Error> {
        rmp_serde::from_slice(bytes)
    }
}

// ── Nested payloads ──

/// A MessagePack document carried as raw bytes inside an outer document.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Payload(Vec<u8>);

impl Payload {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    /// Encode a typed body into payload bytes.
    pub fn encode<T: Serialize>(value: &T) -> Result<Self, rmp_serde::encode::Error> {
        Ok(Self(rmp_serde::to_vec_named(value)?))
    }

    /// Decode the payload bytes into a typed body.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, rmp_serde::decode::Error> {
        rmp_serde::from_slice(&self.0)
    }
}

impl Serialize for Payload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bytes(&self.0)
    }
}

impl<'de> Deserialize<'de> for Payload {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct PayloadVisitor;

        impl<'de> Visitor<'de> for PayloadVisitor {
            type Value = Payload;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("nested payload bytes")
            }

            fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<Self::Value, E> {
                Ok(Payload(v.to_vec()))
            }

            fn visit_byte_buf<E: de::Error>(self, v: Vec<u8>) -> Result<Self::Value, E> {
                Ok(Payload(v))
            }

            fn visit_seq<A: de::SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
                let mut bytes = Vec::with_capacity(seq.size_hint().unwrap_or(0));
                while let Some(b) = seq.next_element::<u8>()? {
                    bytes.push(b);
                }
                Ok(Payload(bytes))
            }
        }

        deserializer.deserialize_bytes(PayloadVisitor)
    }
}

// ── Admin interface bodies ──

/// One DNA to install, by registered hash and role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnaSpec {
    pub hash: DnaHash,
    pub role_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum AdminRequest {
    RegisterDna {
        /// Conductor-local path to the DNA bundle.
        path: String,
    },
    InstallApp {
        installed_app_id: String,
        agent_key: AgentPubKey,
        dnas: Vec<DnaSpec>,
    },
    EnableApp {
        installed_app_id: String,
    },
    DisableApp {
        installed_app_id: String,
    },
    UninstallApp {
        installed_app_id: String,
    },
    GenerateAgentPubKey,
    ListDnas,
    ListCellIds,
    ListActiveApps,
    AttachAppInterface {
        port: u16,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum AdminResponse {
    DnaRegistered(DnaHash),
    AppInstalled(InstalledApp),
    AppEnabled,
    AppDisabled,
    AppUninstalled,
    AgentPubKeyGenerated(AgentPubKey),
    DnasListed(Vec<DnaHash>),
    CellIdsListed(Vec<CellId>),
    ActiveAppsListed(Vec<String>),
    AppInterfaceAttached { port: u16 },
    Error(RemoteError),
}

/// An error the conductor sent instead of a result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteError {
    pub kind: String,
    pub message: String,
}

// ── App interface bodies ──

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum AppRequest {
    AppInfo { installed_app_id: String },
    CallZome(ZomeCall),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum AppResponse {
    /// `None` when no app with the requested id is installed.
    AppInfo(Option<InstalledApp>),
    ZomeCalled(Payload),
    Error(RemoteError),
}

/// A zome invocation routed through the app interface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZomeCall {
    pub cell_id: CellId,
    pub zome_name: String,
    pub fn_name: String,
    /// Nested encoding of the zome function's input.
    pub payload: Payload,
    /// Agent the call is made as; always the cell's own agent here.
    pub provenance: AgentPubKey,
    pub cap: String,
}

/// App description returned by install and app-info calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledApp {
    pub installed_app_id: String,
    pub cell_data: Vec<InstalledCell>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledCell {
    pub cell_id: CellId,
    pub role_id: String,
}
