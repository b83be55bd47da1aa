pub mod config;
pub mod hash;
pub mod sensemaker;
pub mod types;

pub use config::{ConductorConfig, ConfigError};
pub use hash::{ActionHash, AgentPubKey, CellId, DnaHash, EntryHash};
pub use sensemaker::{SensemakerEntry, SmValue};
pub use types::{Annotation, Meme, Paper};
