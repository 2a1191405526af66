//! Catalog, order and cart records.
//!
//! Every persisted record carries a local `id` (0 until the store inserts it),
//! an optional `remote_id` assigned by the catalog API, a `synced` flag and a
//! `last_sync_at` timestamp that is only set when a sync confirms the record.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Field length hints. Not enforced on save.
pub mod limits {
    pub const CATEGORY_NAME_MAX: usize = 50;
    pub const CATEGORY_DESCRIPTION_MAX: usize = 200;
    pub const PRODUCT_NAME_MAX: usize = 100;
    pub const PRODUCT_DESCRIPTION_MAX: usize = 500;
    pub const CUSTOMER_NAME_MAX: usize = 100;
    pub const CUSTOMER_PHONE_MAX: usize = 15;
    pub const DELIVERY_ADDRESS_MAX: usize = 200;
    pub const ORDER_NOTES_MAX: usize = 500;
}

// ---------------------------------------------------------------------------
// Category
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub icon_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub remote_id: Option<i64>,
    pub synced: bool,
    pub last_sync_at: Option<DateTime<Utc>>,
}

impl Category {
    pub fn new(name: &str, description: &str, icon_name: &str) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            name: name.to_string(),
            description: description.to_string(),
            icon_name: icon_name.to_string(),
            created_at: now,
            updated_at: now,
            remote_id: None,
            synced: false,
            last_sync_at: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Product
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub price: Decimal,
    /// Local file path or remote URL.
    pub image_url: String,
    pub category_id: i64,
    pub is_available: bool,
    pub stock_quantity: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub remote_id: Option<i64>,
    pub synced: bool,
    pub last_sync_at: Option<DateTime<Utc>>,
    /// Resolved on read; `None` when `category_id` dangles.
    #[serde(skip)]
    pub category: Option<Category>,
}

impl Product {
    pub fn new(name: &str, price: Decimal, category_id: i64) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            name: name.to_string(),
            description: String::new(),
            price,
            image_url: String::new(),
            category_id,
            is_available: true,
            stock_quantity: 0,
            created_at: now,
            updated_at: now,
            remote_id: None,
            synced: false,
            last_sync_at: None,
            category: None,
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn with_stock(mut self, stock_quantity: i64) -> Self {
        self.stock_quantity = stock_quantity;
        self
    }

    pub fn with_image(mut self, image_url: &str) -> Self {
        self.image_url = image_url.to_string();
        self
    }

    pub fn is_linked(&self) -> bool {
        self.remote_id.is_some()
    }

    /// Unlinked records and linked records edited since their last push.
    pub fn needs_push(&self) -> bool {
        !self.synced || !self.is_linked()
    }
}

// ---------------------------------------------------------------------------
// Order
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OrderStatus {
    #[default]
    Pending,
    Confirmed,
    InPreparation,
    Ready,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn as_i64(self) -> i64 {
        match self {
            OrderStatus::Pending => 0,
            OrderStatus::Confirmed => 1,
            OrderStatus::InPreparation => 2,
            OrderStatus::Ready => 3,
            OrderStatus::Delivered => 4,
            OrderStatus::Cancelled => 5,
        }
    }

    pub fn from_i64(value: i64) -> Option<Self> {
        match value {
            0 => Some(OrderStatus::Pending),
            1 => Some(OrderStatus::Confirmed),
            2 => Some(OrderStatus::InPreparation),
            3 => Some(OrderStatus::Ready),
            4 => Some(OrderStatus::Delivered),
            5 => Some(OrderStatus::Cancelled),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub customer_name: String,
    pub customer_phone: String,
    pub delivery_address: String,
    pub total_amount: Decimal,
    pub status: OrderStatus,
    pub order_date: DateTime<Utc>,
    pub delivery_date: Option<DateTime<Utc>>,
    pub notes: String,
    pub updated_at: DateTime<Utc>,
    pub remote_id: Option<i64>,
    pub synced: bool,
    pub last_sync_at: Option<DateTime<Utc>>,
}

impl Order {
    pub fn new(customer_name: &str, customer_phone: &str, total_amount: Decimal) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            customer_name: customer_name.to_string(),
            customer_phone: customer_phone.to_string(),
            delivery_address: String::new(),
            total_amount,
            status: OrderStatus::Pending,
            order_date: now,
            delivery_date: None,
            notes: String::new(),
            updated_at: now,
            remote_id: None,
            synced: false,
            last_sync_at: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: i64,
    pub order_id: i64,
    pub product_id: i64,
    pub quantity: i64,
    pub unit_price: Decimal,
    #[serde(skip)]
    pub product: Option<Product>,
    #[serde(skip)]
    pub order: Option<Order>,
}

impl OrderItem {
    pub fn new(order_id: i64, product_id: i64, quantity: i64, unit_price: Decimal) -> Self {
        Self {
            id: 0,
            order_id,
            product_id,
            quantity,
            unit_price,
            product: None,
            order: None,
        }
    }

    pub fn total_price(&self) -> Decimal {
        Decimal::from(self.quantity) * self.unit_price
    }
}

// ---------------------------------------------------------------------------
// Cart
// ---------------------------------------------------------------------------

/// In-memory cart line. Never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct CartItem {
    pub product: Product,
    pub quantity: i64,
}

impl CartItem {
    pub fn total_price(&self) -> Decimal {
        self.product.price * Decimal::from(self.quantity)
    }
}
