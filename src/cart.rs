//! Shopping cart owned by a storefront session.
//!
//! Listeners subscribe explicitly and are notified synchronously after each
//! mutation. There is no replay: a listener registered after a change does
//! not see it. Closing the session drops every subscription.

use rust_decimal::Decimal;
use tracing::{debug, info};

use crate::db::DbState;
use crate::error::CheckoutError;
use crate::models::{CartItem, Order, OrderItem, OrderStatus, Product};

pub const DEFAULT_CUSTOMER_NAME: &str = "Cliente App";
pub const DEFAULT_CUSTOMER_PHONE: &str = "555-1234";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartEvent {
    Added { product_id: i64, quantity: i64 },
    QuantityChanged { product_id: i64, quantity: i64 },
    Removed { product_id: i64 },
    Cleared,
}

pub type SubscriptionId = u64;

type Listener = Box<dyn Fn(&CartEvent, &[CartItem]) + Send + Sync>;

#[derive(Default)]
pub struct Cart {
    items: Vec<CartItem>,
    listeners: Vec<(SubscriptionId, Listener)>,
    next_subscription: SubscriptionId,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener; it receives the event and the cart lines after
    /// the mutation.
    pub fn subscribe<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: Fn(&CartEvent, &[CartItem]) + Send + Sync + 'static,
    {
        self.next_subscription += 1;
        let id = self.next_subscription;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Returns `false` when the id was not subscribed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(sid, _)| *sid != id);
        self.listeners.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.listeners.len()
    }

    fn notify(&self, event: CartEvent) {
        for (_, listener) in &self.listeners {
            listener(&event, &self.items);
        }
    }

    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Add `quantity` of a product, merging with an existing line. A merge
    /// that leaves zero or less removes the line; a new line needs a
    /// positive quantity. Returns `false` when the cart is unchanged.
    pub fn add(&mut self, product: Product, quantity: i64) -> bool {
        let product_id = product.id;
        if let Some(current) = self.quantity_of(product_id) {
            return self.update_quantity(product_id, current + quantity);
        }
        if quantity <= 0 {
            return false;
        }
        self.items.push(CartItem { product, quantity });
        self.notify(CartEvent::Added {
            product_id,
            quantity,
        });
        true
    }

    /// Remove the line for a product entirely.
    pub fn remove(&mut self, product_id: i64) -> bool {
        let before = self.items.len();
        self.items.retain(|i| i.product.id != product_id);
        if self.items.len() == before {
            return false;
        }
        self.notify(CartEvent::Removed { product_id });
        true
    }

    /// Set a line's quantity; zero or less removes the line.
    pub fn update_quantity(&mut self, product_id: i64, quantity: i64) -> bool {
        if quantity <= 0 {
            return self.remove(product_id);
        }
        let Some(item) = self.items.iter_mut().find(|i| i.product.id == product_id) else {
            return false;
        };
        item.quantity = quantity;
        self.notify(CartEvent::QuantityChanged {
            product_id,
            quantity,
        });
        true
    }

    pub fn increase(&mut self, product_id: i64) -> bool {
        match self.quantity_of(product_id) {
            Some(q) => self.update_quantity(product_id, q + 1),
            None => false,
        }
    }

    /// Decrease by one; a line at quantity 1 is removed.
    pub fn decrease(&mut self, product_id: i64) -> bool {
        match self.quantity_of(product_id) {
            Some(q) if q > 1 => self.update_quantity(product_id, q - 1),
            Some(_) => self.remove(product_id),
            None => false,
        }
    }

    fn quantity_of(&self, product_id: i64) -> Option<i64> {
        self.items
            .iter()
            .find(|i| i.product.id == product_id)
            .map(|i| i.quantity)
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.notify(CartEvent::Cleared);
    }

    pub fn total_amount(&self) -> Decimal {
        self.items.iter().map(CartItem::total_price).sum()
    }

    pub fn item_count(&self) -> i64 {
        self.items.iter().map(|i| i.quantity).sum()
    }

    fn unsubscribe_all(&mut self) {
        self.listeners.clear();
    }
}

/// Customer details for checkout.
#[derive(Debug, Clone, PartialEq)]
pub struct Customer {
    pub name: String,
    pub phone: String,
    pub delivery_address: String,
    pub notes: String,
}

impl Default for Customer {
    fn default() -> Self {
        Self {
            name: DEFAULT_CUSTOMER_NAME.to_string(),
            phone: DEFAULT_CUSTOMER_PHONE.to_string(),
            delivery_address: String::new(),
            notes: String::new(),
        }
    }
}

/// One storefront session. Owns the cart and its subscriptions.
#[derive(Default)]
pub struct Session {
    cart: Cart,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cart(&self) -> &Cart {
        &self.cart
    }

    pub fn cart_mut(&mut self) -> &mut Cart {
        &mut self.cart
    }

    /// Persist the cart as a pending order with one item per line, then
    /// clear the cart.
    pub fn checkout(
        &mut self,
        db: &DbState,
        customer: Option<Customer>,
    ) -> Result<Order, CheckoutError> {
        if self.cart.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }
        let customer = customer.unwrap_or_default();

        let mut order = Order::new(&customer.name, &customer.phone, self.cart.total_amount());
        order.delivery_address = customer.delivery_address;
        order.notes = customer.notes;
        order.status = OrderStatus::Pending;
        let mut items: Vec<OrderItem> = self
            .cart
            .items()
            .iter()
            .map(|line| OrderItem::new(0, line.product.id, line.quantity, line.product.price))
            .collect();
        db.insert_order_with_items(&mut order, &mut items)?;

        info!(
            order_id = order.id,
            lines = items.len(),
            total = %order.total_amount,
            "Checkout completed"
        );
        self.cart.clear();
        Ok(order)
    }

    /// End the session and drop all cart subscriptions.
    pub fn close(mut self) {
        self.cart.unsubscribe_all();
        debug!("Session closed");
    }
}
