//! Shopping carts, one per client session.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use std::time::{Duration, Instant};

use chrono::Utc;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CartError;

const DEFAULT_IMAGE: &str = "https://via.placeholder.com/150";
const DEFAULT_CATEGORY: &str = "General";
const DEFAULT_IDLE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    pub id: String,
    pub nombre: String,
    pub precio: f64,
    pub imagen: String,
    pub categoria: String,
    pub cantidad: u32,
}

/// Product payload sent by the storefront. Prices and ids arrive as either
/// strings or numbers depending on the page that built them.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductInput {
    pub id: Option<Value>,
    pub nombre: Option<String>,
    pub precio: Option<Value>,
    pub imagen: Option<String>,
    pub categoria: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub numero_pedido: String,
    pub items: Vec<CartItem>,
    pub total: f64,
    pub datos_cliente: Value,
    pub metodo_pago: Value,
    pub fecha: String,
    pub estado: String,
}

#[derive(Debug)]
struct Cart {
    items: Vec<CartItem>,
    touched: Instant,
}

impl Cart {
    fn new() -> Self {
        Cart {
            items: Vec::new(),
            touched: Instant::now(),
        }
    }

    fn is_idle(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.touched) >= ttl
    }
}

/// Carts keyed by session id. Sessions never see each other's items.
///
/// A cart nobody has modified for the idle TTL is dropped the next time any
/// cart is written, so arbitrary session ids cannot grow the map forever.
#[derive(Debug)]
pub struct CartService {
    carts: RwLock<HashMap<String, Cart>>,
    idle_ttl: Duration,
}

impl Default for CartService {
    fn default() -> Self {
        Self::with_idle_ttl(DEFAULT_IDLE_TTL)
    }
}

impl CartService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_idle_ttl(idle_ttl: Duration) -> Self {
        CartService {
            carts: RwLock::new(HashMap::new()),
            idle_ttl,
        }
    }

    pub fn items(&self, session: &str) -> Vec<CartItem> {
        let carts = self.carts.read().unwrap_or_else(PoisonError::into_inner);
        carts
            .get(session)
            .filter(|cart| !cart.is_idle(Instant::now(), self.idle_ttl))
            .map(|cart| cart.items.clone())
            .unwrap_or_default()
    }

    fn evict_idle(&self, carts: &mut HashMap<String, Cart>) {
        let now = Instant::now();
        let before = carts.len();
        carts.retain(|_, cart| !cart.is_idle(now, self.idle_ttl));
        let evicted = before - carts.len();
        if evicted > 0 {
            debug!("Evicted {} idle cart(s)", evicted);
        }
    }

    /// Add one unit of a product; repeated adds increase the quantity.
    pub fn add(&self, session: &str, product: ProductInput) -> Result<Vec<CartItem>, CartError> {
        let id = product.id.as_ref().and_then(value_to_id).ok_or(CartError::IncompleteProduct)?;
        let nombre = product
            .nombre
            .filter(|n| !n.trim().is_empty())
            .ok_or(CartError::IncompleteProduct)?;
        let precio = product
            .precio
            .as_ref()
            .and_then(value_to_price)
            .ok_or(CartError::IncompleteProduct)?;

        let mut carts = self.carts.write().unwrap_or_else(PoisonError::into_inner);
        self.evict_idle(&mut carts);
        let cart = carts.entry(session.to_string()).or_insert_with(Cart::new);
        cart.touched = Instant::now();

        match cart.items.iter_mut().find(|item| item.id == id) {
            Some(existing) => existing.cantidad += 1,
            None => cart.items.push(CartItem {
                id,
                nombre,
                precio,
                imagen: product.imagen.unwrap_or_else(|| DEFAULT_IMAGE.to_string()),
                categoria: product.categoria.unwrap_or_else(|| DEFAULT_CATEGORY.to_string()),
                cantidad: 1,
            }),
        }
        Ok(cart.items.clone())
    }

    /// Set the quantity of an item; zero or less removes it.
    pub fn update_quantity(
        &self,
        session: &str,
        id: &str,
        cantidad: i64,
    ) -> Result<Vec<CartItem>, CartError> {
        let mut carts = self.carts.write().unwrap_or_else(PoisonError::into_inner);
        self.evict_idle(&mut carts);
        let cart = carts
            .get_mut(session)
            .ok_or_else(|| CartError::ItemNotFound(id.to_string()))?;
        let position = cart
            .items
            .iter()
            .position(|item| item.id == id)
            .ok_or_else(|| CartError::ItemNotFound(id.to_string()))?;

        if cantidad <= 0 {
            cart.items.remove(position);
        } else {
            cart.items[position].cantidad = u32::try_from(cantidad).unwrap_or(u32::MAX);
        }
        cart.touched = Instant::now();
        Ok(cart.items.clone())
    }

    pub fn remove(&self, session: &str, id: &str) -> Vec<CartItem> {
        let mut carts = self.carts.write().unwrap_or_else(PoisonError::into_inner);
        self.evict_idle(&mut carts);
        match carts.get_mut(session) {
            Some(cart) => {
                cart.items.retain(|item| item.id != id);
                cart.touched = Instant::now();
                cart.items.clone()
            }
            None => Vec::new(),
        }
    }

    pub fn clear(&self, session: &str) -> Vec<CartItem> {
        let mut carts = self.carts.write().unwrap_or_else(PoisonError::into_inner);
        carts.remove(session);
        self.evict_idle(&mut carts);
        Vec::new()
    }

    /// Turn the session's cart into an order and empty the cart.
    pub fn checkout(
        &self,
        session: &str,
        datos_cliente: Value,
        metodo_pago: Value,
    ) -> Result<Order, CartError> {
        let mut carts = self.carts.write().unwrap_or_else(PoisonError::into_inner);
        self.evict_idle(&mut carts);
        let items = match carts.remove(session) {
            Some(cart) if !cart.items.is_empty() => cart.items,
            _ => return Err(CartError::EmptyCart),
        };

        let now = Utc::now();
        let total = items
            .iter()
            .map(|item| item.precio * f64::from(item.cantidad))
            .sum();
        let order = Order {
            numero_pedido: format!("PED-{}", now.timestamp_millis()),
            items,
            total,
            datos_cliente,
            metodo_pago,
            fecha: now.to_rfc3339(),
            estado: "Procesando".to_string(),
        };

        info!(
            "Order {} placed: {} line(s), total {:.2}",
            order.numero_pedido,
            order.items.len(),
            order.total
        );
        Ok(order)
    }
}

fn value_to_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn value_to_price(value: &Value) -> Option<f64> {
    let price = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    (price.is_finite() && price > 0.0).then_some(price)
}
