//! Remote catalog API client.
//!
//! One accessor set (list, get, create, update, delete) per entity kind.
//! Requests use the API's own field vocabulary; responses are decoded into
//! explicit DTOs and mapped onto local records. Products and categories are
//! sent as multipart forms, orders as JSON.

use chrono::{DateTime, Utc};
use reqwest::multipart::{Form, Part};
use reqwest::{header, Client, RequestBuilder, Response};
use rust_decimal::Decimal;
use serde::de::{self, DeserializeOwned};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::path::Path;
use tracing::{debug, warn};

use crate::config::{normalize_base_url, Config};
use crate::error::RemoteError;
use crate::models::{Category, Order, OrderStatus, Product};

const PRODUCTS_PATH: &str = "/ProductoApi";
const CATEGORIES_PATH: &str = "/CategoriaApi";
const ORDERS_PATH: &str = "/PedidoApi";

const DEFAULT_PRODUCT_DESCRIPTION: &str = "Descripción no disponible";
const DEFAULT_CATEGORY_ID: i64 = 1;
const IMAGE_PART_NAME: &str = "imagen";

// ---------------------------------------------------------------------------
// Wire shapes
// ---------------------------------------------------------------------------

/// JSON object with keys folded to lowercase so fields match regardless of
/// the casing the server uses.
struct Fields(Map<String, Value>);

impl<'de> Deserialize<'de> for Fields {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let map = Map::<String, Value>::deserialize(deserializer)?;
        Ok(Fields(
            map.into_iter()
                .map(|(key, value)| (key.to_lowercase(), value))
                .collect(),
        ))
    }
}

impl Fields {
    /// Absent and `null` both read as `None`.
    fn get<T: DeserializeOwned>(&mut self, key: &str) -> Result<Option<T>, serde_json::Error> {
        match self.0.remove(key) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|e| de::Error::custom(format!("{key}: {e}"))),
        }
    }
}

/// Product as returned by the API. Keys match case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct ProductDto {
    pub producto_id: Option<i64>,
    pub nombre: Option<String>,
    pub descripcion: Option<String>,
    pub precio: Decimal,
    pub imagen_url: Option<String>,
    pub categoria_id: Option<i64>,
    pub disponible: Option<bool>,
    pub stock: Option<i64>,
}

impl<'de> Deserialize<'de> for ProductDto {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Self::from_fields(Fields::deserialize(deserializer)?).map_err(de::Error::custom)
    }
}

impl ProductDto {
    fn from_fields(mut fields: Fields) -> Result<Self, serde_json::Error> {
        Ok(Self {
            producto_id: fields.get("productoid")?,
            nombre: fields.get("nombre")?,
            descripcion: fields.get("descripcion")?,
            precio: fields.get("precio")?.unwrap_or_default(),
            imagen_url: fields.get("imagenurl")?,
            categoria_id: fields.get("categoriaid")?,
            disponible: fields.get("disponible")?,
            stock: fields.get("stock")?,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct CategoryDto {
    pub categoria_id: Option<i64>,
    pub nombre: Option<String>,
    pub descripcion: Option<String>,
    pub icono: Option<String>,
}

impl<'de> Deserialize<'de> for CategoryDto {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Self::from_fields(Fields::deserialize(deserializer)?).map_err(de::Error::custom)
    }
}

impl CategoryDto {
    fn from_fields(mut fields: Fields) -> Result<Self, serde_json::Error> {
        Ok(Self {
            categoria_id: fields.get("categoriaid")?,
            nombre: fields.get("nombre")?,
            descripcion: fields.get("descripcion")?,
            icono: fields.get("icono")?,
        })
    }
}

/// Order body, sent and received as JSON. `Id` carries the remote id.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct OrderDto {
    #[serde(default, alias = "id")]
    pub id: i64,
    #[serde(default, alias = "customerName")]
    pub customer_name: String,
    #[serde(default, alias = "customerPhone")]
    pub customer_phone: String,
    #[serde(default, alias = "deliveryAddress")]
    pub delivery_address: String,
    #[serde(
        default,
        alias = "totalAmount",
        serialize_with = "rust_decimal::serde::float::serialize"
    )]
    pub total_amount: Decimal,
    #[serde(default, alias = "status")]
    pub status: i64,
    #[serde(alias = "orderDate")]
    pub order_date: DateTime<Utc>,
    #[serde(default, alias = "deliveryDate")]
    pub delivery_date: Option<DateTime<Utc>>,
    #[serde(default, alias = "notes")]
    pub notes: String,
}

/// Map an API product onto a new, unsaved local record linked to it.
/// Fields the API omits take fixed defaults.
pub fn product_from_dto(dto: ProductDto) -> Product {
    let mut product = Product::new(
        &dto.nombre.unwrap_or_default(),
        dto.precio,
        dto.categoria_id.unwrap_or(DEFAULT_CATEGORY_ID),
    );
    product.description = dto
        .descripcion
        .unwrap_or_else(|| DEFAULT_PRODUCT_DESCRIPTION.to_string());
    product.image_url = dto.imagen_url.unwrap_or_default();
    product.is_available = dto.disponible.unwrap_or(true);
    product.stock_quantity = dto.stock.unwrap_or(0);
    product.remote_id = dto.producto_id;
    product.synced = true;
    product
}

pub fn category_from_dto(dto: CategoryDto) -> Category {
    let mut category = Category::new(
        &dto.nombre.unwrap_or_default(),
        &dto.descripcion.unwrap_or_default(),
        &dto.icono.unwrap_or_default(),
    );
    category.remote_id = dto.categoria_id;
    category.synced = true;
    category
}

pub fn order_from_dto(dto: OrderDto) -> Order {
    let mut order = Order::new(&dto.customer_name, &dto.customer_phone, dto.total_amount);
    order.delivery_address = dto.delivery_address;
    order.status = OrderStatus::from_i64(dto.status).unwrap_or_default();
    order.order_date = dto.order_date;
    order.delivery_date = dto.delivery_date;
    order.notes = dto.notes;
    order.remote_id = Some(dto.id);
    order.synced = true;
    order
}

pub fn order_to_dto(order: &Order) -> OrderDto {
    OrderDto {
        id: order.remote_id.unwrap_or(0),
        customer_name: order.customer_name.clone(),
        customer_phone: order.customer_phone.clone(),
        delivery_address: order.delivery_address.clone(),
        total_amount: order.total_amount,
        status: order.status.as_i64(),
        order_date: order.order_date,
        delivery_date: order.delivery_date,
        notes: order.notes.clone(),
    }
}

fn product_form(product: &Product) -> Form {
    let mut form = Form::new()
        .text("Nombre", product.name.clone())
        .text("Descripcion", product.description.clone())
        .text("Precio", product.price.to_string())
        .text("CategoriaId", product.category_id.to_string())
        .text("Disponible", product.is_available.to_string())
        .text("Stock", product.stock_quantity.to_string());
    if product.id != 0 {
        form = form.text("Id", product.id.to_string());
    }
    if let Some(remote_id) = product.remote_id {
        form = form.text("ProductoId", remote_id.to_string());
    }
    form
}

fn category_form(category: &Category) -> Form {
    let mut form = Form::new()
        .text("Nombre", category.name.clone())
        .text("Descripcion", category.description.clone())
        .text("Icono", category.icon_name.clone());
    if category.id != 0 {
        form = form.text("Id", category.id.to_string());
    }
    if let Some(remote_id) = category.remote_id {
        form = form.text("CategoriaId", remote_id.to_string());
    }
    form
}

/// Binary part for a local image file. `None` when the path is empty, not a
/// file on disk, or unreadable; the request then goes out without an image.
async fn image_part(image_path: Option<&str>) -> Option<Part> {
    let raw = image_path.map(str::trim).filter(|p| !p.is_empty())?;
    let path = Path::new(raw);
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() => {}
        _ => return None,
    }

    let bytes = match tokio::fs::read(path).await {
        Ok(b) => b,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to read product image, sending without it");
            return None;
        }
    };
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(IMAGE_PART_NAME)
        .to_string();
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    debug!(file_name = %file_name, size = bytes.len(), "Attaching product image");

    match Part::bytes(bytes).file_name(file_name).mime_str(mime.essence_str()) {
        Ok(part) => Some(part),
        Err(e) => {
            warn!(error = %e, "Invalid image mime type, sending without image");
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

/// Convert a `reqwest::Error` into a user-friendly message.
fn friendly_error(url: &str, err: &reqwest::Error) -> String {
    if err.is_connect() {
        return format!("Cannot reach catalog API at {url}");
    }
    if err.is_timeout() {
        return format!("Connection to {url} timed out");
    }
    if err.is_builder() {
        return format!("Invalid catalog API URL: {url}");
    }
    format!("Network error communicating with {url}: {err}")
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(config: &Config) -> Result<Self, RemoteError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json"),
        );

        let client = Client::builder()
            .timeout(config.request_timeout)
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .default_headers(headers)
            .build()
            .map_err(|e| RemoteError::Build(e.to_string()))?;

        if config.accept_invalid_certs {
            warn!("TLS certificate validation is disabled for the catalog API");
        }

        Ok(Self {
            client,
            base_url: normalize_base_url(&config.api_base_url),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn item_url(&self, collection: &str, remote_id: i64) -> String {
        format!("{}{}/{}", self.base_url, collection, remote_id)
    }

    /// Send a request, mapping transport failures and non-2xx statuses.
    async fn send(
        &self,
        request: RequestBuilder,
        method: &str,
        url: &str,
    ) -> Result<Response, RemoteError> {
        debug!(method, url, "API request");
        let resp = request.send().await.map_err(|e| {
            let message = friendly_error(url, &e);
            warn!(method, url, error = %message, "API transport failure");
            RemoteError::Transport(message)
        })?;

        let status = resp.status();
        debug!(method, url, status = status.as_u16(), "API response");
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            warn!(method, url, status = status.as_u16(), body = %body, "API rejected request");
            return Err(RemoteError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp)
    }

    /// Decode a JSON body, or `None` for an empty (e.g. 204) response.
    async fn read_optional<T: DeserializeOwned>(resp: Response) -> Result<Option<T>, RemoteError> {
        let body = resp
            .text()
            .await
            .map_err(|e| RemoteError::Transport(format!("failed to read response body: {e}")))?;
        if body.trim().is_empty() {
            return Ok(None);
        }
        serde_json::from_str(&body)
            .map(Some)
            .map_err(|e| RemoteError::InvalidResponse(e.to_string()))
    }

    async fn read_required<T: DeserializeOwned>(resp: Response) -> Result<T, RemoteError> {
        Self::read_optional(resp)
            .await?
            .ok_or_else(|| RemoteError::InvalidResponse("empty response body".to_string()))
    }

    async fn list<T: DeserializeOwned>(&self, collection: &str) -> Result<Vec<T>, RemoteError> {
        let url = self.url(collection);
        let resp = self.send(self.client.get(&url), "GET", &url).await?;
        Ok(Self::read_optional(resp).await?.unwrap_or_default())
    }

    /// `Ok(None)` on 404.
    async fn get_one<T: DeserializeOwned>(
        &self,
        collection: &str,
        remote_id: i64,
    ) -> Result<Option<T>, RemoteError> {
        let url = self.item_url(collection, remote_id);
        match self.send(self.client.get(&url), "GET", &url).await {
            Ok(resp) => Self::read_optional(resp).await,
            Err(e) if e.status() == Some(404) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn delete_one(&self, collection: &str, remote_id: i64) -> Result<(), RemoteError> {
        let url = self.item_url(collection, remote_id);
        self.send(self.client.delete(&url), "DELETE", &url).await?;
        Ok(())
    }

    // -- products -----------------------------------------------------------

    pub async fn get_products(&self) -> Result<Vec<Product>, RemoteError> {
        let dtos: Vec<ProductDto> = self.list(PRODUCTS_PATH).await?;
        Ok(dtos.into_iter().map(product_from_dto).collect())
    }

    pub async fn get_product(&self, remote_id: i64) -> Result<Option<Product>, RemoteError> {
        let dto: Option<ProductDto> = self.get_one(PRODUCTS_PATH, remote_id).await?;
        Ok(dto.map(product_from_dto))
    }

    /// Create the product remotely, uploading `image_path` when it exists on
    /// disk. The returned record carries the server's id and image locator.
    pub async fn create_product(
        &self,
        product: &Product,
        image_path: Option<&str>,
    ) -> Result<Product, RemoteError> {
        let url = self.url(PRODUCTS_PATH);
        let mut form = product_form(product);
        if let Some(part) = image_part(image_path).await {
            form = form.part(IMAGE_PART_NAME, part);
        }
        let resp = self
            .send(self.client.post(&url).multipart(form), "POST", &url)
            .await?;
        let dto: ProductDto = Self::read_required(resp).await?;
        Ok(product_from_dto(dto))
    }

    /// Update a linked product. An empty response echoes the sent record.
    pub async fn update_product(
        &self,
        product: &Product,
        image_path: Option<&str>,
    ) -> Result<Product, RemoteError> {
        let remote_id = product.remote_id.ok_or_else(|| {
            RemoteError::InvalidRequest(format!("product {} has no remote id", product.id))
        })?;
        let url = self.item_url(PRODUCTS_PATH, remote_id);
        let mut form = product_form(product);
        if let Some(part) = image_part(image_path).await {
            form = form.part(IMAGE_PART_NAME, part);
        }
        let resp = self
            .send(self.client.put(&url).multipart(form), "PUT", &url)
            .await?;
        match Self::read_optional::<ProductDto>(resp).await? {
            Some(dto) => Ok(product_from_dto(dto)),
            None => {
                let mut echoed = product.clone();
                echoed.synced = true;
                Ok(echoed)
            }
        }
    }

    pub async fn delete_product(&self, remote_id: i64) -> Result<(), RemoteError> {
        self.delete_one(PRODUCTS_PATH, remote_id).await
    }

    // -- categories ---------------------------------------------------------

    pub async fn get_categories(&self) -> Result<Vec<Category>, RemoteError> {
        let dtos: Vec<CategoryDto> = self.list(CATEGORIES_PATH).await?;
        Ok(dtos.into_iter().map(category_from_dto).collect())
    }

    pub async fn get_category(&self, remote_id: i64) -> Result<Option<Category>, RemoteError> {
        let dto: Option<CategoryDto> = self.get_one(CATEGORIES_PATH, remote_id).await?;
        Ok(dto.map(category_from_dto))
    }

    pub async fn create_category(&self, category: &Category) -> Result<Category, RemoteError> {
        let url = self.url(CATEGORIES_PATH);
        let resp = self
            .send(
                self.client.post(&url).multipart(category_form(category)),
                "POST",
                &url,
            )
            .await?;
        let dto: CategoryDto = Self::read_required(resp).await?;
        Ok(category_from_dto(dto))
    }

    pub async fn update_category(&self, category: &Category) -> Result<Category, RemoteError> {
        let remote_id = category.remote_id.ok_or_else(|| {
            RemoteError::InvalidRequest(format!("category {} has no remote id", category.id))
        })?;
        let url = self.item_url(CATEGORIES_PATH, remote_id);
        let resp = self
            .send(
                self.client.put(&url).multipart(category_form(category)),
                "PUT",
                &url,
            )
            .await?;
        match Self::read_optional::<CategoryDto>(resp).await? {
            Some(dto) => Ok(category_from_dto(dto)),
            None => {
                let mut echoed = category.clone();
                echoed.synced = true;
                Ok(echoed)
            }
        }
    }

    pub async fn delete_category(&self, remote_id: i64) -> Result<(), RemoteError> {
        self.delete_one(CATEGORIES_PATH, remote_id).await
    }

    // -- orders -------------------------------------------------------------

    pub async fn get_orders(&self) -> Result<Vec<Order>, RemoteError> {
        let dtos: Vec<OrderDto> = self.list(ORDERS_PATH).await?;
        Ok(dtos.into_iter().map(order_from_dto).collect())
    }

    pub async fn get_order(&self, remote_id: i64) -> Result<Option<Order>, RemoteError> {
        let dto: Option<OrderDto> = self.get_one(ORDERS_PATH, remote_id).await?;
        Ok(dto.map(order_from_dto))
    }

    pub async fn create_order(&self, order: &Order) -> Result<Order, RemoteError> {
        let url = self.url(ORDERS_PATH);
        let resp = self
            .send(
                self.client.post(&url).json(&order_to_dto(order)),
                "POST",
                &url,
            )
            .await?;
        let dto: OrderDto = Self::read_required(resp).await?;
        Ok(order_from_dto(dto))
    }

    pub async fn update_order(&self, order: &Order) -> Result<Order, RemoteError> {
        let remote_id = order.remote_id.ok_or_else(|| {
            RemoteError::InvalidRequest(format!("order {} has no remote id", order.id))
        })?;
        let url = self.item_url(ORDERS_PATH, remote_id);
        let resp = self
            .send(
                self.client.put(&url).json(&order_to_dto(order)),
                "PUT",
                &url,
            )
            .await?;
        match Self::read_optional::<OrderDto>(resp).await? {
            Some(dto) => Ok(order_from_dto(dto)),
            None => {
                let mut echoed = order.clone();
                echoed.synced = true;
                Ok(echoed)
            }
        }
    }

    pub async fn delete_order(&self, remote_id: i64) -> Result<(), RemoteError> {
        self.delete_one(ORDERS_PATH, remote_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::{Multipart, Path as AxumPath, State};
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use std::str::FromStr;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    type Captured = Arc<Mutex<Vec<HashMap<String, String>>>>;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    async fn spawn(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/api")
    }

    fn client_for(base_url: &str) -> ApiClient {
        let config = Config {
            request_timeout: Duration::from_secs(5),
            ..Config::default()
        }
        .with_api_base_url(base_url);
        ApiClient::new(&config).unwrap()
    }

    async fn collect_fields(mut multipart: Multipart) -> HashMap<String, String> {
        let mut fields = HashMap::new();
        while let Some(field) = multipart.next_field().await.unwrap() {
            let name = field.name().unwrap_or_default().to_string();
            if let Some(file_name) = field.file_name() {
                fields.insert(format!("{name}.filename"), file_name.to_string());
            }
            let data = field.bytes().await.unwrap();
            fields.insert(name, String::from_utf8_lossy(&data).to_string());
        }
        fields
    }

    async fn list_products() -> Json<Value> {
        Json(json!([
            { "productoId": 42, "nombre": "Croissant", "precio": 2.00, "imagenUrl": "/img/c.png" },
            {
                "ProductoId": 7, "Nombre": "Pan", "Descripcion": "Pan de molde",
                "Precio": "3.50", "CategoriaId": 2, "Disponible": false, "Stock": 4
            }
        ]))
    }

    async fn get_product(AxumPath(id): AxumPath<i64>) -> Result<Json<Value>, StatusCode> {
        if id == 42 {
            Ok(Json(json!({ "productoId": 42, "nombre": "Croissant", "precio": 2.0 })))
        } else {
            Err(StatusCode::NOT_FOUND)
        }
    }

    async fn create_product(State(captured): State<Captured>, multipart: Multipart) -> Json<Value> {
        let fields = collect_fields(multipart).await;
        let name = fields.get("Nombre").cloned().unwrap_or_default();
        let price = fields.get("Precio").cloned().unwrap_or_default();
        captured.lock().unwrap().push(fields);
        Json(json!({
            "productoId": 99,
            "nombre": name,
            "precio": price,
            "imagenUrl": "/uploads/99.png"
        }))
    }

    async fn update_product(State(captured): State<Captured>, multipart: Multipart) -> StatusCode {
        let fields = collect_fields(multipart).await;
        captured.lock().unwrap().push(fields);
        StatusCode::NO_CONTENT
    }

    async fn create_order(Json(body): Json<Value>) -> Json<Value> {
        let mut echoed = body.clone();
        echoed["Id"] = json!(5);
        Json(echoed)
    }

    async fn catalog_server() -> (String, Captured) {
        let captured: Captured = Arc::new(Mutex::new(Vec::new()));
        let app = Router::new()
            .route("/api/ProductoApi", get(list_products).post(create_product))
            .route(
                "/api/ProductoApi/{id}",
                get(get_product)
                    .put(update_product)
                    .delete(|| async { StatusCode::NO_CONTENT }),
            )
            .route(
                "/api/CategoriaApi",
                get(|| async { Json(json!([{ "categoriaId": 3, "nombre": "Bollería", "icono": "🥐" }])) }),
            )
            .route("/api/PedidoApi", get(|| async { Json(json!([])) }).post(create_order))
            .with_state(captured.clone());
        (spawn(app).await, captured)
    }

    #[test]
    fn test_product_dto_defaults() {
        let dto: ProductDto =
            serde_json::from_value(json!({ "productoId": 1, "nombre": "Rosca", "precio": 4.5 }))
                .unwrap();
        let product = product_from_dto(dto);
        assert_eq!(product.id, 0);
        assert_eq!(product.remote_id, Some(1));
        assert!(product.synced);
        assert_eq!(product.description, DEFAULT_PRODUCT_DESCRIPTION);
        assert_eq!(product.category_id, DEFAULT_CATEGORY_ID);
        assert!(product.is_available);
        assert_eq!(product.stock_quantity, 0);
        assert_eq!(product.price, dec("4.5"));
    }

    #[test]
    fn test_product_dto_keys_are_case_insensitive() {
        for body in [
            json!({ "productoid": 5, "nombre": "Pan", "precio": 1.5, "imagenurl": "/a.png", "stock": 2 }),
            json!({ "PRODUCTOID": 5, "NOMBRE": "Pan", "PRECIO": "1.5", "IMAGENURL": "/a.png", "STOCK": 2 }),
            json!({ "productoID": 5, "Nombre": "Pan", "precio": 1.5, "ImagenURL": "/a.png", "Stock": 2 }),
        ] {
            let product = product_from_dto(serde_json::from_value(body).unwrap());
            assert_eq!(product.remote_id, Some(5));
            assert_eq!(product.name, "Pan");
            assert_eq!(product.price, dec("1.5"));
            assert_eq!(product.image_url, "/a.png");
            assert_eq!(product.stock_quantity, 2);
        }

        let category = category_from_dto(
            serde_json::from_value(json!({ "CATEGORIAID": 4, "nombre": "Galletas", "ICONO": "x" }))
                .unwrap(),
        );
        assert_eq!(category.remote_id, Some(4));
        assert_eq!(category.name, "Galletas");
        assert_eq!(category.icon_name, "x");
    }

    #[test]
    fn test_product_dto_missing_or_null_price_is_zero() {
        let dto: ProductDto =
            serde_json::from_value(json!({ "productoId": 8, "nombre": "Sin precio" })).unwrap();
        assert_eq!(dto.precio, Decimal::ZERO);
        let dto: ProductDto =
            serde_json::from_value(json!({ "productoId": 8, "precio": null })).unwrap();
        assert_eq!(dto.precio, Decimal::ZERO);
    }

    #[test]
    fn test_product_dto_wrong_type_names_field() {
        let err = serde_json::from_value::<ProductDto>(json!({ "productoId": 1, "precio": [1] }))
            .unwrap_err();
        assert!(err.to_string().contains("precio"), "{err}");
    }

    #[tokio::test]
    async fn test_get_products_keeps_list_with_odd_records() {
        let app = Router::new().route(
            "/api/ProductoApi",
            get(|| async {
                Json(json!([
                    { "PRODUCTOID": 1, "NOMBRE": "Pan", "PRECIO": 1.0 },
                    { "productoid": 2, "nombre": "Sin precio" }
                ]))
            }),
        );
        let base = spawn(app).await;
        let products = client_for(&base).get_products().await.unwrap();
        assert_eq!(products.len(), 2);
        assert_eq!(products[0].name, "Pan");
        assert_eq!(products[1].remote_id, Some(2));
        assert_eq!(products[1].price, Decimal::ZERO);
    }

    #[test]
    fn test_order_dto_uses_entity_field_names() {
        let mut order = Order::new("Ana", "555-1234", dec("12.50"));
        order.status = OrderStatus::Confirmed;
        let body = serde_json::to_value(order_to_dto(&order)).unwrap();
        assert_eq!(body["Id"], json!(0));
        assert_eq!(body["CustomerName"], json!("Ana"));
        assert_eq!(body["TotalAmount"], json!(12.5));
        assert_eq!(body["Status"], json!(1));

        let back = order_from_dto(serde_json::from_value(body).unwrap());
        assert_eq!(back.customer_phone, "555-1234");
        assert_eq!(back.total_amount, dec("12.5"));
        assert_eq!(back.status, OrderStatus::Confirmed);
    }

    #[tokio::test]
    async fn test_get_products_maps_both_casings() {
        let (base, _) = catalog_server().await;
        let products = client_for(&base).get_products().await.unwrap();
        assert_eq!(products.len(), 2);

        assert_eq!(products[0].remote_id, Some(42));
        assert_eq!(products[0].name, "Croissant");
        assert_eq!(products[0].price, dec("2.00"));
        assert_eq!(products[0].image_url, "/img/c.png");

        assert_eq!(products[1].remote_id, Some(7));
        assert_eq!(products[1].price, dec("3.50"));
        assert_eq!(products[1].category_id, 2);
        assert!(!products[1].is_available);
        assert_eq!(products[1].stock_quantity, 4);
    }

    #[tokio::test]
    async fn test_get_product_not_found_is_none() {
        let (base, _) = catalog_server().await;
        let client = client_for(&base);
        assert_eq!(client.get_product(42).await.unwrap().unwrap().name, "Croissant");
        assert!(client.get_product(1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_product_sends_form_fields_and_image() {
        let (base, captured) = catalog_server().await;
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("croissant.png");
        std::fs::write(&image, b"\x89PNG fake").unwrap();

        let mut product = Product::new("Croissant", dec("2.00"), 3)
            .with_description("De mantequilla")
            .with_stock(15);
        product.id = 11;
        let image_path = image.to_string_lossy().to_string();

        let created = client_for(&base)
            .create_product(&product, Some(&image_path))
            .await
            .unwrap();
        assert_eq!(created.remote_id, Some(99));
        assert_eq!(created.image_url, "/uploads/99.png");

        let requests = captured.lock().unwrap();
        let fields = &requests[0];
        assert_eq!(fields["Nombre"], "Croissant");
        assert_eq!(fields["Descripcion"], "De mantequilla");
        assert_eq!(fields["Precio"], "2.00");
        assert_eq!(fields["CategoriaId"], "3");
        assert_eq!(fields["Disponible"], "true");
        assert_eq!(fields["Stock"], "15");
        assert_eq!(fields["Id"], "11");
        assert!(!fields.contains_key("ProductoId"));
        assert_eq!(fields["imagen.filename"], "croissant.png");
    }

    #[tokio::test]
    async fn test_create_product_skips_missing_image() {
        let (base, captured) = catalog_server().await;
        let product = Product::new("Pan", dec("1.00"), 1);
        client_for(&base)
            .create_product(&product, Some("/definitely/not/here.png"))
            .await
            .unwrap();
        let requests = captured.lock().unwrap();
        assert!(!requests[0].contains_key("imagen"));
        assert!(!requests[0].contains_key("Id"));
    }

    #[tokio::test]
    async fn test_update_product_empty_response_echoes() {
        let (base, captured) = catalog_server().await;
        let mut product = Product::new("Pan", dec("1.10"), 1).with_image("/img/pan.png");
        product.id = 3;
        product.remote_id = Some(42);

        let updated = client_for(&base).update_product(&product, None).await.unwrap();
        assert!(updated.synced);
        assert_eq!(updated.image_url, "/img/pan.png");
        assert_eq!(captured.lock().unwrap()[0]["ProductoId"], "42");
    }

    #[tokio::test]
    async fn test_update_requires_remote_id() {
        let client = client_for("http://127.0.0.1:9/api");
        let product = Product::new("Pan", dec("1"), 1);
        let err = client.update_product(&product, None).await.unwrap_err();
        assert!(matches!(err, RemoteError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_delete_and_categories_and_orders() {
        let (base, _) = catalog_server().await;
        let client = client_for(&base);
        client.delete_product(42).await.unwrap();

        let categories = client.get_categories().await.unwrap();
        assert_eq!(categories[0].remote_id, Some(3));
        assert_eq!(categories[0].icon_name, "🥐");

        assert!(client.get_orders().await.unwrap().is_empty());
        let order = Order::new("Cliente App", "555-1234", dec("4.00"));
        let created = client.create_order(&order).await.unwrap();
        assert_eq!(created.remote_id, Some(5));
        assert_eq!(created.total_amount, dec("4"));
    }

    #[tokio::test]
    async fn test_rejection_is_distinct_from_empty() {
        let app = Router::new().route(
            "/api/ProductoApi",
            get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
        );
        let base = spawn(app).await;
        let err = client_for(&base).get_products().await.unwrap_err();
        match err {
            RemoteError::Rejected { status, body } => {
                assert_eq!(status, 500);
                assert_eq!(body, "boom");
            }
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_transport_failure() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = client_for(&format!("http://{addr}/api"))
            .get_products()
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteError::Transport(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn test_invalid_json_is_invalid_response() {
        let app = Router::new().route("/api/ProductoApi", get(|| async { "not json" }));
        let base = spawn(app).await;
        let err = client_for(&base).get_products().await.unwrap_err();
        assert!(matches!(err, RemoteError::InvalidResponse(_)));
    }
}
