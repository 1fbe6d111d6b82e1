//! `stockdesk-core` — shared building blocks for the StockDesk client.
//!
//! This crate contains **pure** primitives (no HTTP, no storage).

pub mod entity;
pub mod error;
pub mod id;

pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{CategoryId, ProductId, SaleId, StockId, StoreId, UserId};
