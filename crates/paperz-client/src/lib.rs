//! Typed app flows over the conductor clients.
//!
//! `Session` connects the admin/app interface pair and resolves the app's
//! cell; `PaperzClient` and `MemezClient` wrap the two zomes; `bootstrap`
//! provisions the hub on first run; `upload` reports progress while a
//! file is read, encoded, and committed.

pub mod bootstrap;
pub mod error;
pub mod memez;
pub mod paperz;
pub mod session;
pub mod upload;

pub use bootstrap::{BootReport, HubStatus, boot, ensure_hub};
pub use error::ClientError;
pub use memez::MemezClient;
pub use paperz::{AnnotationCard, Board, PaperCard, PaperzClient, SmDefinition};
pub use session::Session;
pub use upload::{UploadStatus, UploadTracker};
