//! `stockdesk-client`
//!
//! **Responsibility:** session and transport layer for StockDesk front ends.
//!
//! This crate provides:
//! - A durable token slot (`TokenStore`) that survives restarts
//! - An authenticated HTTP transport with one-shot refresh-and-retry
//! - The session store: restore, login, register, logout, profile update
//! - Typed access to the user-management and catalog endpoints
//!
//! The client is a **thin shell** around the StockDesk REST API; the API stays
//! the authority for every decision.

pub mod api;
pub mod catalog;
pub mod config;
pub mod error;
pub mod session;
pub mod token_store;
pub mod transport;
pub mod types;

pub use api::{AuthApi, UsersApi};
pub use catalog::{CatalogApi, Resource};
pub use config::ClientConfig;
pub use error::{ClientError, ClientResult};
pub use session::{Session, SessionStore};
pub use token_store::{FileTokenStore, MemoryTokenStore, TokenStore, TokenStoreError};
pub use transport::{ApiRequest, Auth, Transport, TransportEvent};
