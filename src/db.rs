//! Local SQLite store for the bakery catalog.
//!
//! Uses rusqlite with WAL mode. Tables are created idempotently on every
//! startup and a fixed default catalog is seeded only when the categories
//! table is empty. Saves follow id semantics: `id == 0` inserts and assigns a
//! fresh id, anything else updates the row in place.

use chrono::Utc;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use rust_decimal::Decimal;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::models::{Category, Order, OrderItem, OrderStatus, Product};

pub const DB_FILE_NAME: &str = "bakery.db";
pub const PLACEHOLDER_IMAGE: &str = "/images/placeholder.png";

/// Shared handle to the local store. The mutex serializes all access.
pub struct DbState {
    pub conn: Mutex<Connection>,
    pub db_path: PathBuf,
}

/// Open (or create) `{data_dir}/bakery.db`, create tables and seed defaults.
pub fn init(data_dir: &Path) -> Result<DbState, StoreError> {
    fs::create_dir_all(data_dir).map_err(|source| StoreError::Io {
        path: data_dir.to_path_buf(),
        source,
    })?;

    let db_path = data_dir.join(DB_FILE_NAME);
    info!("Opening database at {}", db_path.display());

    let conn = Connection::open(&db_path)?;
    configure(&conn, true)?;

    let state = DbState {
        conn: Mutex::new(conn),
        db_path,
    };
    state.initialize()?;
    Ok(state)
}

/// In-memory store with tables created but nothing seeded.
pub fn open_in_memory() -> Result<DbState, StoreError> {
    let conn = Connection::open_in_memory()?;
    configure(&conn, false)?;
    create_tables(&conn)?;
    Ok(DbState {
        conn: Mutex::new(conn),
        db_path: PathBuf::from(":memory:"),
    })
}

fn configure(conn: &Connection, wal: bool) -> Result<(), StoreError> {
    if wal {
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
    }
    conn.execute_batch(
        "PRAGMA busy_timeout = 5000;
         PRAGMA synchronous = NORMAL;",
    )?;
    Ok(())
}

/// Product references to categories are not declared as foreign keys:
/// dangling `category_id` values are tolerated and resolve to no category.
fn create_tables(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS categories (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            icon_name TEXT NOT NULL DEFAULT '',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            remote_id INTEGER,
            is_synced INTEGER NOT NULL DEFAULT 0,
            last_sync_at TEXT
        );

        CREATE TABLE IF NOT EXISTS products (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            price TEXT NOT NULL,
            image_url TEXT NOT NULL DEFAULT '',
            category_id INTEGER NOT NULL,
            is_available INTEGER NOT NULL DEFAULT 1,
            stock_quantity INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            remote_id INTEGER,
            is_synced INTEGER NOT NULL DEFAULT 0,
            last_sync_at TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_products_category ON products(category_id);
        CREATE INDEX IF NOT EXISTS idx_products_remote_id ON products(remote_id);

        CREATE TABLE IF NOT EXISTS orders (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            customer_name TEXT NOT NULL,
            customer_phone TEXT NOT NULL,
            delivery_address TEXT NOT NULL DEFAULT '',
            total_amount TEXT NOT NULL DEFAULT '0',
            status INTEGER NOT NULL DEFAULT 0,
            order_date TEXT NOT NULL,
            delivery_date TEXT,
            notes TEXT NOT NULL DEFAULT '',
            updated_at TEXT NOT NULL,
            remote_id INTEGER,
            is_synced INTEGER NOT NULL DEFAULT 0,
            last_sync_at TEXT
        );

        CREATE TABLE IF NOT EXISTS order_items (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            order_id INTEGER NOT NULL,
            product_id INTEGER NOT NULL,
            quantity INTEGER NOT NULL,
            unit_price TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_order_items_order ON order_items(order_id);

        CREATE TABLE IF NOT EXISTS local_settings (
            setting_category TEXT NOT NULL,
            setting_key TEXT NOT NULL,
            setting_value TEXT NOT NULL,
            updated_at TEXT DEFAULT (datetime('now')),
            PRIMARY KEY (setting_category, setting_key)
        );
        ",
    )?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Seed data
// ---------------------------------------------------------------------------

const SEED_CATEGORIES: [(&str, &str, &str); 5] = [
    ("Panadería", "Panes artesanales y de molde", "🍞"),
    ("Pastelería Fina", "Pasteles, tartas y postres elaborados", "🎂"),
    ("Bollería", "Croissants, donuts y hojaldre", "🥐"),
    ("Cupcakes y Muffins", "Variedad de cupcakes y muffins", "🧁"),
    ("Galletas y Bizcochos", "Galletas caseras y bizcochos", "🍪"),
];

/// (name, description, price, category position 1..=5, stock)
const SEED_PRODUCTS: [(&str, &str, &str, usize, i64); 5] = [
    ("Pan Integral", "Pan integral con semillas", "3.50", 1, 20),
    ("Croissant", "Croissant de mantequilla", "2.00", 3, 15),
    ("Torta de Chocolate", "Torta húmeda de chocolate", "25.00", 2, 5),
    ("Muffin de Arándanos", "Muffin con arándanos frescos", "2.75", 4, 12),
    ("Galletas de Avena", "Galletas caseras de avena", "1.50", 5, 30),
];

fn seed_if_empty(conn: &Connection) -> Result<bool, StoreError> {
    let category_count: i64 =
        conn.query_row("SELECT COUNT(*) FROM categories", [], |row| row.get(0))?;
    if category_count > 0 {
        debug!("Categories already exist ({category_count} found), skipping seed");
        return Ok(false);
    }

    let mut category_ids = Vec::with_capacity(SEED_CATEGORIES.len());
    for (name, description, icon) in SEED_CATEGORIES {
        let mut category = Category::new(name, description, icon);
        insert_category(conn, &mut category)?;
        category_ids.push(category.id);
    }

    for (name, description, price, position, stock) in SEED_PRODUCTS {
        let price = Decimal::from_str(price).unwrap_or_default();
        let mut product = Product::new(name, price, category_ids[position - 1])
            .with_description(description)
            .with_stock(stock)
            .with_image(PLACEHOLDER_IMAGE);
        insert_product(conn, &mut product)?;
    }

    info!(
        categories = SEED_CATEGORIES.len(),
        products = SEED_PRODUCTS.len(),
        "Seeded default catalog"
    );
    Ok(true)
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

const CATEGORY_COLUMNS: &str =
    "id, name, description, icon_name, created_at, updated_at, remote_id, is_synced, last_sync_at";
const PRODUCT_COLUMNS: &str = "id, name, description, price, image_url, category_id, is_available, \
     stock_quantity, created_at, updated_at, remote_id, is_synced, last_sync_at";
const ORDER_COLUMNS: &str = "id, customer_name, customer_phone, delivery_address, total_amount, \
     status, order_date, delivery_date, notes, updated_at, remote_id, is_synced, last_sync_at";
const ORDER_ITEM_COLUMNS: &str = "id, order_id, product_id, quantity, unit_price";

fn decimal_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Decimal> {
    let raw: String = row.get(idx)?;
    Decimal::from_str(raw.trim())
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn status_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<OrderStatus> {
    let code: i64 = row.get(idx)?;
    OrderStatus::from_i64(code).ok_or(rusqlite::Error::IntegralValueOutOfRange(idx, code))
}

fn category_from_row(row: &Row<'_>) -> rusqlite::Result<Category> {
    Ok(Category {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        icon_name: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
        remote_id: row.get(6)?,
        synced: row.get(7)?,
        last_sync_at: row.get(8)?,
    })
}

fn product_from_row(row: &Row<'_>) -> rusqlite::Result<Product> {
    Ok(Product {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        price: decimal_at(row, 3)?,
        image_url: row.get(4)?,
        category_id: row.get(5)?,
        is_available: row.get(6)?,
        stock_quantity: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
        remote_id: row.get(10)?,
        synced: row.get(11)?,
        last_sync_at: row.get(12)?,
        category: None,
    })
}

fn order_from_row(row: &Row<'_>) -> rusqlite::Result<Order> {
    Ok(Order {
        id: row.get(0)?,
        customer_name: row.get(1)?,
        customer_phone: row.get(2)?,
        delivery_address: row.get(3)?,
        total_amount: decimal_at(row, 4)?,
        status: status_at(row, 5)?,
        order_date: row.get(6)?,
        delivery_date: row.get(7)?,
        notes: row.get(8)?,
        updated_at: row.get(9)?,
        remote_id: row.get(10)?,
        synced: row.get(11)?,
        last_sync_at: row.get(12)?,
    })
}

fn order_item_from_row(row: &Row<'_>) -> rusqlite::Result<OrderItem> {
    Ok(OrderItem {
        id: row.get(0)?,
        order_id: row.get(1)?,
        product_id: row.get(2)?,
        quantity: row.get(3)?,
        unit_price: decimal_at(row, 4)?,
        product: None,
        order: None,
    })
}

// ---------------------------------------------------------------------------
// Connection-level helpers
// ---------------------------------------------------------------------------

fn load_category(conn: &Connection, id: i64) -> Result<Option<Category>, StoreError> {
    let category = conn
        .query_row(
            &format!("SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = ?1"),
            params![id],
            category_from_row,
        )
        .optional()?;
    Ok(category)
}

fn load_product(conn: &Connection, id: i64) -> Result<Option<Product>, StoreError> {
    let product = conn
        .query_row(
            &format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1"),
            params![id],
            product_from_row,
        )
        .optional()?;
    match product {
        Some(mut p) => {
            p.category = load_category(conn, p.category_id)?;
            Ok(Some(p))
        }
        None => Ok(None),
    }
}

/// Run a product query and resolve each row's category with its own lookup.
fn query_products(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> Result<Vec<Product>, StoreError> {
    let mut stmt = conn.prepare(sql)?;
    let mut products = stmt
        .query_map(params, product_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    for product in &mut products {
        product.category = load_category(conn, product.category_id)?;
    }
    Ok(products)
}

fn insert_category(conn: &Connection, category: &mut Category) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO categories (name, description, icon_name, created_at, updated_at,
                                 remote_id, is_synced, last_sync_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            category.name,
            category.description,
            category.icon_name,
            category.created_at,
            category.updated_at,
            category.remote_id,
            category.synced,
            category.last_sync_at,
        ],
    )?;
    category.id = conn.last_insert_rowid();
    Ok(())
}

fn insert_product(conn: &Connection, product: &mut Product) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO products (name, description, price, image_url, category_id, is_available,
                               stock_quantity, created_at, updated_at, remote_id, is_synced,
                               last_sync_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            product.name,
            product.description,
            product.price.to_string(),
            product.image_url,
            product.category_id,
            product.is_available,
            product.stock_quantity,
            product.created_at,
            product.updated_at,
            product.remote_id,
            product.synced,
            product.last_sync_at,
        ],
    )?;
    product.id = conn.last_insert_rowid();
    Ok(())
}

fn insert_order(conn: &Connection, order: &Order) -> Result<i64, StoreError> {
    conn.execute(
        "INSERT INTO orders (customer_name, customer_phone, delivery_address,
                             total_amount, status, order_date, delivery_date, notes,
                             updated_at, remote_id, is_synced, last_sync_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            order.customer_name,
            order.customer_phone,
            order.delivery_address,
            order.total_amount.to_string(),
            order.status.as_i64(),
            order.order_date,
            order.delivery_date,
            order.notes,
            order.updated_at,
            order.remote_id,
            order.synced,
            order.last_sync_at,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

fn insert_order_item(conn: &Connection, order_id: i64, item: &OrderItem) -> Result<i64, StoreError> {
    conn.execute(
        "INSERT INTO order_items (order_id, product_id, quantity, unit_price)
         VALUES (?1, ?2, ?3, ?4)",
        params![order_id, item.product_id, item.quantity, item.unit_price.to_string()],
    )?;
    Ok(conn.last_insert_rowid())
}

fn warn_if_missing(kind: &str, id: i64, affected: usize) {
    if affected == 0 {
        warn!(kind, id, "update matched no row");
    }
}

// ---------------------------------------------------------------------------
// Store operations
// ---------------------------------------------------------------------------

impl DbState {
    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Lock)
    }

    /// Create tables (idempotent) and seed the default catalog when empty.
    /// Returns `true` when the seed ran.
    pub fn initialize(&self) -> Result<bool, StoreError> {
        let conn = self.lock()?;
        create_tables(&conn)?;
        let seeded = seed_if_empty(&conn)?;
        info!(seeded, "Database initialized");
        Ok(seeded)
    }

    // -- categories ---------------------------------------------------------

    pub fn get_categories(&self) -> Result<Vec<Category>, StoreError> {
        let conn = self.lock()?;
        let mut stmt =
            conn.prepare(&format!("SELECT {CATEGORY_COLUMNS} FROM categories ORDER BY id"))?;
        let categories = stmt
            .query_map([], category_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        debug!("Retrieved {} categories", categories.len());
        Ok(categories)
    }

    pub fn get_category(&self, id: i64) -> Result<Option<Category>, StoreError> {
        let conn = self.lock()?;
        load_category(&conn, id)
    }

    /// Insert when `id == 0` (assigning the new id), otherwise update by id.
    pub fn save_category(&self, category: &mut Category) -> Result<i64, StoreError> {
        let conn = self.lock()?;
        category.updated_at = Utc::now();

        if category.id != 0 {
            debug!(id = category.id, name = %category.name, "Updating category");
            let affected = conn.execute(
                "UPDATE categories SET name = ?1, description = ?2, icon_name = ?3,
                        created_at = ?4, updated_at = ?5, remote_id = ?6, is_synced = ?7,
                        last_sync_at = ?8
                 WHERE id = ?9",
                params![
                    category.name,
                    category.description,
                    category.icon_name,
                    category.created_at,
                    category.updated_at,
                    category.remote_id,
                    category.synced,
                    category.last_sync_at,
                    category.id,
                ],
            )?;
            warn_if_missing("category", category.id, affected);
        } else {
            debug!(name = %category.name, "Inserting category");
            insert_category(&conn, category)?;
        }
        Ok(category.id)
    }

    pub fn delete_category(&self, category: &Category) -> Result<usize, StoreError> {
        let conn = self.lock()?;
        debug!(id = category.id, name = %category.name, "Deleting category");
        Ok(conn.execute("DELETE FROM categories WHERE id = ?1", params![category.id])?)
    }

    // -- products -----------------------------------------------------------

    pub fn get_products(&self) -> Result<Vec<Product>, StoreError> {
        let conn = self.lock()?;
        let products = query_products(
            &conn,
            &format!("SELECT {PRODUCT_COLUMNS} FROM products ORDER BY id"),
            [],
        )?;
        debug!("Retrieved {} products", products.len());
        Ok(products)
    }

    pub fn get_products_by_category(&self, category_id: i64) -> Result<Vec<Product>, StoreError> {
        let conn = self.lock()?;
        let products = query_products(
            &conn,
            &format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE category_id = ?1 ORDER BY id"),
            params![category_id],
        )?;
        debug!(category_id, "Retrieved {} products for category", products.len());
        Ok(products)
    }

    pub fn get_product(&self, id: i64) -> Result<Option<Product>, StoreError> {
        let conn = self.lock()?;
        load_product(&conn, id)
    }

    /// First local product linked to `remote_id`, if any.
    pub fn find_product_by_remote_id(&self, remote_id: i64) -> Result<Option<Product>, StoreError> {
        let conn = self.lock()?;
        let id: Option<i64> = conn
            .query_row(
                "SELECT id FROM products WHERE remote_id = ?1 ORDER BY id LIMIT 1",
                params![remote_id],
                |row| row.get(0),
            )
            .optional()?;
        match id {
            Some(id) => load_product(&conn, id),
            None => Ok(None),
        }
    }

    /// Insert when `id == 0` (assigning the new id), otherwise update by id.
    /// Stamps `updated_at`; `last_sync_at` is stored exactly as given.
    pub fn save_product(&self, product: &mut Product) -> Result<i64, StoreError> {
        let conn = self.lock()?;
        product.updated_at = Utc::now();

        if product.id != 0 {
            debug!(
                id = product.id,
                name = %product.name,
                price = %product.price,
                synced = product.synced,
                "Updating product"
            );
            let affected = conn.execute(
                "UPDATE products SET name = ?1, description = ?2, price = ?3, image_url = ?4,
                        category_id = ?5, is_available = ?6, stock_quantity = ?7,
                        created_at = ?8, updated_at = ?9, remote_id = ?10, is_synced = ?11,
                        last_sync_at = ?12
                 WHERE id = ?13",
                params![
                    product.name,
                    product.description,
                    product.price.to_string(),
                    product.image_url,
                    product.category_id,
                    product.is_available,
                    product.stock_quantity,
                    product.created_at,
                    product.updated_at,
                    product.remote_id,
                    product.synced,
                    product.last_sync_at,
                    product.id,
                ],
            )?;
            warn_if_missing("product", product.id, affected);
        } else {
            debug!(name = %product.name, price = %product.price, "Inserting product");
            insert_product(&conn, product)?;
        }
        Ok(product.id)
    }

    pub fn delete_product(&self, product: &Product) -> Result<usize, StoreError> {
        let conn = self.lock()?;
        debug!(id = product.id, name = %product.name, "Deleting product");
        Ok(conn.execute("DELETE FROM products WHERE id = ?1", params![product.id])?)
    }

    // -- orders -------------------------------------------------------------

    /// All orders, newest `order_date` first.
    pub fn get_orders(&self) -> Result<Vec<Order>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders ORDER BY order_date DESC, id DESC"
        ))?;
        let orders = stmt
            .query_map([], order_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        debug!("Retrieved {} orders", orders.len());
        Ok(orders)
    }

    pub fn get_order(&self, id: i64) -> Result<Option<Order>, StoreError> {
        let conn = self.lock()?;
        let order = conn
            .query_row(
                &format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?1"),
                params![id],
                order_from_row,
            )
            .optional()?;
        Ok(order)
    }

    pub fn save_order(&self, order: &mut Order) -> Result<i64, StoreError> {
        let conn = self.lock()?;
        order.updated_at = Utc::now();

        let total = order.total_amount.to_string();
        if order.id != 0 {
            debug!(id = order.id, customer = %order.customer_name, "Updating order");
            let affected = conn.execute(
                "UPDATE orders SET customer_name = ?1, customer_phone = ?2,
                        delivery_address = ?3, total_amount = ?4, status = ?5, order_date = ?6,
                        delivery_date = ?7, notes = ?8, updated_at = ?9, remote_id = ?10,
                        is_synced = ?11, last_sync_at = ?12
                 WHERE id = ?13",
                params![
                    order.customer_name,
                    order.customer_phone,
                    order.delivery_address,
                    total,
                    order.status.as_i64(),
                    order.order_date,
                    order.delivery_date,
                    order.notes,
                    order.updated_at,
                    order.remote_id,
                    order.synced,
                    order.last_sync_at,
                    order.id,
                ],
            )?;
            warn_if_missing("order", order.id, affected);
        } else {
            debug!(customer = %order.customer_name, "Inserting order");
            order.id = insert_order(&conn, order)?;
        }
        Ok(order.id)
    }

    /// Insert a new order and its items in one transaction. Ids (and the
    /// items' `order_id`) are assigned only once the commit succeeds.
    pub fn insert_order_with_items(
        &self,
        order: &mut Order,
        items: &mut [OrderItem],
    ) -> Result<i64, StoreError> {
        let mut conn = self.lock()?;
        order.updated_at = Utc::now();

        let tx = conn.transaction()?;
        let order_id = insert_order(&tx, order)?;
        let mut item_ids = Vec::with_capacity(items.len());
        for item in items.iter() {
            item_ids.push(insert_order_item(&tx, order_id, item)?);
        }
        tx.commit()?;

        order.id = order_id;
        for (item, id) in items.iter_mut().zip(item_ids) {
            item.id = id;
            item.order_id = order_id;
        }
        debug!(order_id, items = items.len(), "Inserted order with items");
        Ok(order_id)
    }

    pub fn delete_order(&self, order: &Order) -> Result<usize, StoreError> {
        let conn = self.lock()?;
        debug!(id = order.id, customer = %order.customer_name, "Deleting order");
        Ok(conn.execute("DELETE FROM orders WHERE id = ?1", params![order.id])?)
    }

    // -- order items --------------------------------------------------------

    /// Items of an order with their products resolved.
    pub fn get_order_items(&self, order_id: i64) -> Result<Vec<OrderItem>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {ORDER_ITEM_COLUMNS} FROM order_items WHERE order_id = ?1 ORDER BY id"
        ))?;
        let mut items = stmt
            .query_map(params![order_id], order_item_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        for item in &mut items {
            item.product = load_product(&conn, item.product_id)?;
        }
        debug!(order_id, "Retrieved {} order items", items.len());
        Ok(items)
    }

    pub fn get_order_item(&self, id: i64) -> Result<Option<OrderItem>, StoreError> {
        let conn = self.lock()?;
        let item = conn
            .query_row(
                &format!("SELECT {ORDER_ITEM_COLUMNS} FROM order_items WHERE id = ?1"),
                params![id],
                order_item_from_row,
            )
            .optional()?;
        match item {
            Some(mut item) => {
                item.product = load_product(&conn, item.product_id)?;
                Ok(Some(item))
            }
            None => Ok(None),
        }
    }

    pub fn save_order_item(&self, item: &mut OrderItem) -> Result<i64, StoreError> {
        let conn = self.lock()?;
        let unit_price = item.unit_price.to_string();
        if item.id != 0 {
            debug!(id = item.id, product_id = item.product_id, quantity = item.quantity, "Updating order item");
            let affected = conn.execute(
                "UPDATE order_items SET order_id = ?1, product_id = ?2, quantity = ?3,
                        unit_price = ?4
                 WHERE id = ?5",
                params![item.order_id, item.product_id, item.quantity, unit_price, item.id],
            )?;
            warn_if_missing("order_item", item.id, affected);
        } else {
            debug!(product_id = item.product_id, quantity = item.quantity, "Inserting order item");
            item.id = insert_order_item(&conn, item.order_id, item)?;
        }
        Ok(item.id)
    }

    pub fn delete_order_item(&self, item: &OrderItem) -> Result<usize, StoreError> {
        let conn = self.lock()?;
        debug!(id = item.id, product_id = item.product_id, "Deleting order item");
        Ok(conn.execute("DELETE FROM order_items WHERE id = ?1", params![item.id])?)
    }

    // -- settings -----------------------------------------------------------

    /// Get a single setting value.
    pub fn get_setting(&self, category: &str, key: &str) -> Result<Option<String>, StoreError> {
        let conn = self.lock()?;
        let value = conn
            .query_row(
                "SELECT setting_value FROM local_settings
                 WHERE setting_category = ?1 AND setting_key = ?2",
                params![category, key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    /// Insert or update a setting.
    pub fn set_setting(&self, category: &str, key: &str, value: &str) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO local_settings (setting_category, setting_key, setting_value, updated_at)
             VALUES (?1, ?2, ?3, datetime('now'))
             ON CONFLICT(setting_category, setting_key) DO UPDATE SET
                setting_value = excluded.setting_value,
                updated_at = excluded.updated_at",
            params![category, key, value],
        )?;
        Ok(())
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    /// Helper: list table names in the database.
    fn table_names(db: &DbState) -> Vec<String> {
        let conn = db.conn.lock().unwrap();
        let mut stmt = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .expect("prepare table list");
        stmt.query_map([], |row| row.get(0))
            .expect("query tables")
            .filter_map(|r| r.ok())
            .collect()
    }

    fn count(db: &DbState, table: &str) -> i64 {
        let conn = db.conn.lock().unwrap();
        conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn test_tables_created() {
        let db = open_in_memory().unwrap();
        let tables = table_names(&db);
        for table in ["categories", "products", "orders", "order_items", "local_settings"] {
            assert!(tables.contains(&table.to_string()), "missing {table}");
        }
        assert_eq!(count(&db, "categories"), 0, "open_in_memory must not seed");
    }

    #[test]
    fn test_initialize_seeds_once() {
        let db = open_in_memory().unwrap();
        assert!(db.initialize().unwrap());
        assert_eq!(count(&db, "categories"), 5);
        assert_eq!(count(&db, "products"), 5);

        let categories = db.get_categories().unwrap();
        let names: Vec<&str> = categories.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(
            names,
            [
                "Panadería",
                "Pastelería Fina",
                "Bollería",
                "Cupcakes y Muffins",
                "Galletas y Bizcochos"
            ]
        );

        let products = db.get_products().unwrap();
        let expected = [
            ("Pan Integral", 1, "3.50", 20),
            ("Croissant", 3, "2.00", 15),
            ("Torta de Chocolate", 2, "25.00", 5),
            ("Muffin de Arándanos", 4, "2.75", 12),
            ("Galletas de Avena", 5, "1.50", 30),
        ];
        assert_eq!(products.len(), expected.len());
        for (product, (name, position, price, stock)) in products.iter().zip(expected) {
            let category = &categories[position - 1];
            assert_eq!(product.name, name);
            assert_eq!(product.category_id, category.id, "{name}");
            assert_eq!(product.category.as_ref().unwrap().name, category.name, "{name}");
            assert_eq!(product.price, dec(price), "{name}");
            assert_eq!(product.stock_quantity, stock, "{name}");
            assert_eq!(product.image_url, PLACEHOLDER_IMAGE);
        }
        assert!(products.iter().all(|p| p.remote_id.is_none() && !p.synced));

        assert!(!db.initialize().unwrap());
        assert_eq!(count(&db, "categories"), 5);
        assert_eq!(count(&db, "products"), 5);
    }

    #[test]
    fn test_seed_skipped_when_any_category_exists() {
        let db = open_in_memory().unwrap();
        db.save_category(&mut Category::new("Propia", "", "")).unwrap();
        assert!(!db.initialize().unwrap());
        assert_eq!(count(&db, "categories"), 1);
        assert_eq!(count(&db, "products"), 0);
    }

    #[test]
    fn test_init_on_disk_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        {
            let db = init(dir.path()).unwrap();
            assert_eq!(count(&db, "products"), 5);
            assert!(db.db_path.ends_with(DB_FILE_NAME));
        }
        let db = init(dir.path()).unwrap();
        assert_eq!(count(&db, "categories"), 5);
        assert_eq!(count(&db, "products"), 5);
    }

    #[test]
    fn test_save_inserts_then_updates() {
        let db = open_in_memory().unwrap();
        let mut product = Product::new("Baguette", dec("1.20"), 1);

        let id = db.save_product(&mut product).unwrap();
        assert!(id > 0);
        assert_eq!(product.id, id);

        product.price = dec("1.35");
        let again = db.save_product(&mut product).unwrap();
        assert_eq!(again, id);
        assert_eq!(count(&db, "products"), 1);
        assert_eq!(db.get_product(id).unwrap().unwrap().price, dec("1.35"));

        let mut other = Product::new("Chapata", dec("1.00"), 1);
        let other_id = db.save_product(&mut other).unwrap();
        assert_ne!(other_id, id);
    }

    #[test]
    fn test_dangling_category_resolves_to_none() {
        let db = open_in_memory().unwrap();
        let mut product = Product::new("Huérfano", dec("1"), 999);
        let id = db.save_product(&mut product).unwrap();

        let loaded = db.get_product(id).unwrap().unwrap();
        assert_eq!(loaded.category_id, 999);
        assert!(loaded.category.is_none());
        assert_eq!(db.get_products().unwrap().len(), 1);
    }

    #[test]
    fn test_products_by_category() {
        let db = open_in_memory().unwrap();
        db.initialize().unwrap();
        let categories = db.get_categories().unwrap();
        let bread = db.get_products_by_category(categories[0].id).unwrap();
        assert_eq!(bread.len(), 1);
        assert_eq!(bread[0].name, "Pan Integral");
        assert!(db.get_products_by_category(12345).unwrap().is_empty());
    }

    #[test]
    fn test_save_stamps_updated_at_but_not_last_sync() {
        let db = open_in_memory().unwrap();
        let mut product = Product::new("Pan", dec("1"), 1);
        product.updated_at = Utc::now() - Duration::days(3);
        db.save_product(&mut product).unwrap();

        let loaded = db.get_product(product.id).unwrap().unwrap();
        assert!(loaded.updated_at > Utc::now() - Duration::minutes(1));
        assert_eq!(loaded.last_sync_at, None);

        let mut category = Category::new("Temporada", "", "");
        category.updated_at = Utc::now() - Duration::days(3);
        db.save_category(&mut category).unwrap();
        let loaded = db.get_category(category.id).unwrap().unwrap();
        assert!(loaded.updated_at > Utc::now() - Duration::minutes(1));
        assert_eq!(loaded.last_sync_at, None);
    }

    #[test]
    fn test_find_product_by_remote_id() {
        let db = open_in_memory().unwrap();
        let mut product = Product::new("Croissant", dec("2.00"), 1);
        product.remote_id = Some(42);
        product.synced = true;
        db.save_product(&mut product).unwrap();

        let found = db.find_product_by_remote_id(42).unwrap().unwrap();
        assert_eq!(found.id, product.id);
        assert!(found.synced);
        assert!(db.find_product_by_remote_id(43).unwrap().is_none());
    }

    #[test]
    fn test_delete_returns_row_count() {
        let db = open_in_memory().unwrap();
        let mut category = Category::new("Temporal", "", "");
        db.save_category(&mut category).unwrap();
        assert_eq!(db.delete_category(&category).unwrap(), 1);
        assert_eq!(db.delete_category(&category).unwrap(), 0);
        assert!(db.get_category(category.id).unwrap().is_none());
    }

    #[test]
    fn test_orders_newest_first_and_items_resolve_product() {
        let db = open_in_memory().unwrap();
        let mut product = Product::new("Croissant", dec("2.00"), 1);
        db.save_product(&mut product).unwrap();

        let mut older = Order::new("Ana", "555-0001", dec("4.00"));
        older.order_date = Utc::now() - Duration::hours(2);
        db.save_order(&mut older).unwrap();
        let mut newer = Order::new("Luis", "555-0002", dec("2.00"));
        newer.status = OrderStatus::Ready;
        db.save_order(&mut newer).unwrap();

        let orders = db.get_orders().unwrap();
        assert_eq!(orders[0].id, newer.id);
        assert_eq!(orders[0].status, OrderStatus::Ready);
        assert_eq!(orders[1].id, older.id);

        let mut item = OrderItem::new(older.id, product.id, 2, dec("2.00"));
        db.save_order_item(&mut item).unwrap();
        let items = db.get_order_items(older.id).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].total_price(), dec("4.00"));
        assert_eq!(items[0].product.as_ref().unwrap().name, "Croissant");

        item.quantity = 3;
        db.save_order_item(&mut item).unwrap();
        let loaded = db.get_order_item(item.id).unwrap().unwrap();
        assert_eq!(loaded.quantity, 3);
        assert_eq!(db.delete_order_item(&loaded).unwrap(), 1);
        assert_eq!(db.delete_order(&older).unwrap(), 1);
    }

    #[test]
    fn test_settings_upsert() {
        let db = open_in_memory().unwrap();
        assert_eq!(db.get_setting("api", "base_url").unwrap(), None);
        db.set_setting("api", "base_url", "https://a.example/api").unwrap();
        db.set_setting("api", "base_url", "https://b.example/api").unwrap();
        assert_eq!(
            db.get_setting("api", "base_url").unwrap().as_deref(),
            Some("https://b.example/api")
        );
    }

    #[test]
    fn test_insert_order_with_items_assigns_ids() {
        let db = open_in_memory().unwrap();
        let mut order = Order::new("Ana", "555-0000", dec("7.00"));
        let mut items = vec![
            OrderItem::new(0, 1, 2, dec("2.00")),
            OrderItem::new(0, 2, 1, dec("3.00")),
        ];

        let id = db.insert_order_with_items(&mut order, &mut items).unwrap();
        assert_eq!(order.id, id);
        assert!(items.iter().all(|i| i.id > 0 && i.order_id == id));
        assert_eq!(db.get_order_items(id).unwrap().len(), 2);
    }

    #[test]
    fn test_insert_order_with_items_rolls_back_on_failure() {
        let db = open_in_memory().unwrap();
        db.conn
            .lock()
            .unwrap()
            .execute_batch("DROP TABLE order_items")
            .unwrap();

        let mut order = Order::new("Ana", "555-0000", dec("2.00"));
        let mut items = vec![OrderItem::new(0, 1, 1, dec("2.00"))];
        assert!(db.insert_order_with_items(&mut order, &mut items).is_err());

        assert_eq!(order.id, 0);
        assert_eq!(items[0].id, 0);
        assert_eq!(count(&db, "orders"), 0);
    }
}
