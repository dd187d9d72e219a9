//! Collaborators supplied by the host application.
//!
//! - `VaultFs` - folder listing, file lookup and display URLs
//! - `HttpClient` - GET transport for remote sources
//! - `LinkedBridge` - server entries published by the linked-server plugin

pub mod bridge;
pub mod http;
pub mod vault;

pub use bridge::{checked_bridge, linked_context, LinkedBridge, StaticBridge, Subscription};
pub use http::{auth_headers, HttpClient, HttpResponse, ReqwestClient};
pub use vault::{LocalVault, VaultChild, VaultFs};
