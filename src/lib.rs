//! Bakery storefront core.
//!
//! Local SQLite catalog, REST client for the bakery API, product
//! synchronization between the two, and the session shopping cart.

pub mod api;
pub mod cart;
pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod files;
pub mod logging;
pub mod models;
pub mod sync;

pub use api::ApiClient;
pub use cart::{Cart, CartEvent, Customer, Session, SubscriptionId};
pub use config::Config;
pub use db::DbState;
pub use error::{CheckoutError, FileError, RemoteError, StoreError, SyncError};
pub use files::ImageStore;
pub use models::{CartItem, Category, Order, OrderItem, OrderStatus, Product};
pub use sync::{CatalogRemote, SyncReport, SyncService};
