use axum::async_trait;
use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequestParts, Path, Query, State};
use axum::http::request::Parts;
use axum::Json;
use log::info;
use serde::Deserialize;
use serde_json::{json, Value};

use super::error::ApiError;
use super::AppState;
use crate::cart::{CartItem, Order, ProductInput};
use crate::error::{NormalizeError, OcrError};
use crate::model::{MedicationRecord, NormalizationOutcome, StockCheck};
use crate::ocr::decode_image;

pub const SESSION_HEADER: &str = "x-session-id";

/// Cart owner, taken from the `X-Session-Id` header.
pub struct SessionId(pub String);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for SessionId {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(SESSION_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(|id| SessionId(id.to_string()))
            .ok_or_else(|| ApiError::BadRequest("Falta el encabezado X-Session-Id".to_string()))
    }
}

pub async fn validate_stock(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Vec<StockCheck>>, ApiError> {
    let Json(body) = body?;
    let names = string_array(&body["medicamentos"])
        .ok_or_else(|| ApiError::BadRequest("Se espera un array de medicamentos.".to_string()))?;

    info!("Validating stock for {} name(s)", names.len());
    Ok(Json(state.normalizer.check_stock(&names).await))
}

pub async fn normalize_prescription(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<NormalizationOutcome>, ApiError> {
    let Json(body) = body?;
    let text = body["texto"].as_str().ok_or(NormalizeError::MissingInput)?;

    let outcome = state.normalizer.normalize(text).await?;
    Ok(Json(outcome))
}

pub async fn scan_prescription(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(body) = body?;
    let ocr = state.ocr.as_ref().ok_or(OcrError::NotConfigured)?;
    let encoded = body["imagen"]
        .as_str()
        .ok_or_else(|| ApiError::BadRequest("Falta la imagen de la receta".to_string()))?;

    let image = decode_image(encoded)?;
    info!("Scanning prescription image ({} bytes)", image.len());
    let text = ocr.recognize(&image).await?;
    Ok(Json(json!({ "texto": text })))
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    nombre: Option<String>,
}

pub async fn search_medications(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<MedicationRecord>>, ApiError> {
    let fragment = params
        .nombre
        .filter(|n| !n.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("Falta el parámetro nombre".to_string()))?;

    let records = state.normalizer.stock().lookup(fragment.trim()).await?;
    Ok(Json(records))
}

pub async fn get_cart(State(state): State<AppState>, SessionId(session): SessionId) -> Json<Vec<CartItem>> {
    Json(state.carts.items(&session))
}

pub async fn add_to_cart(
    State(state): State<AppState>,
    SessionId(session): SessionId,
    body: Result<Json<ProductInput>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(product) = body?;
    let cart = state.carts.add(&session, product)?;
    Ok(cart_message("Producto agregado al carrito", cart))
}

pub async fn update_cart_item(
    State(state): State<AppState>,
    SessionId(session): SessionId,
    Path(id): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(body) = body?;
    let cantidad = quantity(&body["cantidad"])
        .ok_or_else(|| ApiError::BadRequest("Cantidad inválida".to_string()))?;

    let cart = state.carts.update_quantity(&session, &id, cantidad)?;
    Ok(cart_message("Carrito actualizado", cart))
}

pub async fn remove_cart_item(
    State(state): State<AppState>,
    SessionId(session): SessionId,
    Path(id): Path<String>,
) -> Json<Value> {
    cart_message("Producto eliminado del carrito", state.carts.remove(&session, &id))
}

pub async fn clear_cart(State(state): State<AppState>, SessionId(session): SessionId) -> Json<Value> {
    cart_message("Carrito limpiado", state.carts.clear(&session))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    #[serde(default)]
    datos_cliente: Value,
    #[serde(default)]
    metodo_pago: Value,
}

pub async fn checkout(
    State(state): State<AppState>,
    SessionId(session): SessionId,
    body: Result<Json<CheckoutRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(request) = body?;
    let order: Order = state
        .carts
        .checkout(&session, request.datos_cliente, request.metodo_pago)?;
    Ok(Json(json!({
        "message": "Pedido procesado exitosamente",
        "pedido": order,
    })))
}

fn cart_message(message: &str, cart: Vec<CartItem>) -> Json<Value> {
    Json(json!({ "message": message, "carrito": cart }))
}

/// Accepts only an array made entirely of strings.
fn string_array(value: &Value) -> Option<Vec<String>> {
    value
        .as_array()?
        .iter()
        .map(|entry| entry.as_str().map(str::to_string))
        .collect()
}

fn quantity(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
