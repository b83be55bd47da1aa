//! Websocket clients for the conductor's admin and app interfaces.
//!
//! The conductor exposes two MessagePack-over-websocket endpoints: the admin
//! interface manages DNAs, apps, and cells; the app interface carries zome
//! calls. Both share one framing scheme (`wire`) and one connection type with
//! request/response correlation (`socket`).

pub mod admin;
pub mod app;
pub mod error;
mod socket;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod wire;

pub use admin::AdminWebsocket;
pub use app::AppWebsocket;
pub use error::ConductorError;
pub use wire::{DnaSpec, InstalledApp, InstalledCell, Payload, RemoteError, ZomeCall};
