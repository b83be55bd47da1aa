//! Opaque conductor identifiers.
//!
//! Hashes and agent keys are byte strings minted by the conductor. Clients
//! never inspect or fabricate them; they are carried verbatim from one call
//! into the next, and rendered as base64 for display and CLI round-trips.
//! On the wire each identifier travels as a raw MessagePack `bin` value.

use std::fmt;
use std::str::FromStr;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

macro_rules! hash_newtype {
    ($(#[$attr:meta])* $name:ident) => {
        $(#[$attr])*
        #[derive(Clone, PartialEq, Eq, Hash)]
        pub struct $name(Vec<u8>);

        impl $name {
            /// Wrap raw bytes received from the conductor.
            pub fn from_raw(bytes: Vec<u8>) -> Self {
                Self(bytes)
            }

            pub fn as_bytes(&self) -> &[u8] {
                &self.0
            }

            pub fn into_bytes(self) -> Vec<u8> {
                self.0
            }

            /// Base64 rendering, also used for per-agent path components.
            pub fn to_base64(&self) -> String {
                STANDARD.encode(&self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.to_base64())
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.to_base64())
            }
        }

        impl FromStr for $name {
            type Err = base64::DecodeError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(STANDARD.decode(s)?))
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_bytes(&self.0)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                deserializer.deserialize_bytes(RawBytesVisitor).map(Self)
            }
        }
    };
}

hash_newtype! {
    /// Content address of an entry.
    EntryHash
}

hash_newtype! {
    /// Address of the action that committed an entry.
    ActionHash
}

hash_newtype! {
    /// Hash of a DNA bundle registered with the conductor.
    DnaHash
}

hash_newtype! {
    /// Public key identifying an agent.
    AgentPubKey
}

/// Accepts `bin` payloads, but also integer sequences for decoders that
/// surface MessagePack arrays of bytes.
struct RawBytesVisitor;

impl<'de> Visitor<'de> for RawBytesVisitor {
    type Value = Vec<u8>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("raw identifier bytes")
    }

    fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<Self::Value, E> {
        Ok(v.to_vec())
    }

    fn visit_byte_buf<E: de::Error>(self, v: Vec<u8>) -> Result<Self::Value, E> {
        Ok(v)
    }

    fn visit_seq<A: de::SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
        let mut bytes = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(b) = seq.next_element::<u8>()? {
            bytes.push(b);
        }
        Ok(bytes)
    }
}

/// A cell address: the DNA it runs plus the agent key it runs under.
///
/// Serialises as a two-element sequence, the conductor's `[dna, agent]`
/// wire shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellId(pub DnaHash, pub AgentPubKey);

impl CellId {
    pub fn new(dna: DnaHash, agent: AgentPubKey) -> Self {
        Self(dna, agent)
    }

    pub fn dna(&self) -> &DnaHash {
        &self.0
    }

    /// The agent key, used as zome-call provenance.
    pub fn agent(&self) -> &AgentPubKey {
        &self.1
    }
}

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.0, self.1)
    }
}
