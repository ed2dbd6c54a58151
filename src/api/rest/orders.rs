use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::api::rest::auth::CurrentDriver;
use crate::backend::OrderQuery;
use crate::engine::photos::PhotoEvidence;
use crate::engine::summary;
use crate::engine::workflow::{self, DeliveryConfirmation, OrderActions, ScanOutcome};
use crate::error::AppError;
use crate::models::order::{GeoPoint, Order, OrderStatus, OrderType};
use crate::models::route::{DriverStats, RouteStop};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/orders", post(create_order).get(list_orders))
        .route("/orders/:id", get(get_order))
        .route("/orders/:id/actions", get(order_actions))
        .route("/orders/:id/scan", post(scan_order))
        .route("/orders/:id/pickup", post(confirm_pickup))
        .route("/orders/:id/arrive", post(mark_arrived))
        .route("/orders/:id/deliver", post(confirm_delivery))
        .route("/facility/orders", get(facility_orders))
        .route("/facility/scan", post(facility_scan))
        .route("/current", get(current_stop))
        .route("/route", get(route))
        .route("/stats", get(stats))
}

/// Intake of a new order, standing in for the upstream order system.
#[derive(Deserialize)]
pub struct CreateOrderRequest {
    pub order_number: String,
    pub customer_name: String,
    pub shipping_address: String,
    pub phone: Option<String>,
    #[serde(rename = "type")]
    pub order_type: OrderType,
    pub qr_code: Option<String>,
    pub location: Option<GeoPoint>,
    pub estimated_pickup_at: Option<DateTime<Utc>>,
    pub estimated_dropoff_at: Option<DateTime<Utc>>,
    pub assigned_pickup_driver_id: Option<Uuid>,
    pub assigned_dropoff_driver_id: Option<Uuid>,
}

#[derive(Deserialize)]
pub struct DayQuery {
    pub date: Option<NaiveDate>,
    /// Comma-separated status names.
    pub status: Option<String>,
}

#[derive(Deserialize)]
pub struct ScanRequest {
    pub code: String,
}

#[derive(Deserialize)]
pub struct PickupParams {
    pub photo_uri: Option<String>,
}

#[derive(Deserialize)]
pub struct DeliveryParams {
    pub photo_uri: Option<String>,
    pub recipient_name: Option<String>,
}

pub const INTAKE_KEY_HEADER: &str = "x-intake-key";

fn ensure_intake_allowed(state: &AppState, headers: &HeaderMap) -> Result<(), AppError> {
    let Some(expected) = state.intake_key.as_deref() else {
        return Ok(());
    };

    let presented = headers
        .get(INTAKE_KEY_HEADER)
        .and_then(|value| value.to_str().ok());
    if presented == Some(expected) {
        Ok(())
    } else {
        Err(AppError::Unauthenticated)
    }
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

fn parse_statuses(raw: &str) -> Result<Vec<OrderStatus>, AppError> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<OrderStatus>()
                .map_err(|err| AppError::BadRequest(err.to_string()))
        })
        .collect()
}

async fn create_order(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<CreateOrderRequest>,
) -> Result<Json<Order>, AppError> {
    ensure_intake_allowed(&state, &headers)?;

    let order_number = payload.order_number.trim().to_string();
    if order_number.is_empty() {
        return Err(AppError::BadRequest("order_number cannot be empty".to_string()));
    }
    if payload.assigned_pickup_driver_id.is_none() && payload.assigned_dropoff_driver_id.is_none() {
        return Err(AppError::BadRequest("order needs at least one assigned driver".to_string()));
    }

    let qr_code = payload
        .qr_code
        .map(|code| code.trim().to_string())
        .filter(|code| !code.is_empty())
        .unwrap_or_else(|| order_number.clone());

    let now = Utc::now();
    let order = Order {
        id: Uuid::new_v4(),
        order_number,
        customer_name: payload.customer_name,
        shipping_address: payload.shipping_address,
        phone: payload.phone,
        order_type: payload.order_type,
        status: OrderStatus::ReadyForDelivery,
        qr_code,
        location: payload.location,
        estimated_pickup_at: payload.estimated_pickup_at,
        estimated_dropoff_at: payload.estimated_dropoff_at,
        assigned_pickup_driver_id: payload.assigned_pickup_driver_id,
        assigned_dropoff_driver_id: payload.assigned_dropoff_driver_id,
        pickup_photo_url: None,
        delivery_photo_url: None,
        recipient_name: None,
        picked_up_at: None,
        created_at: now,
        updated_at: now,
    };

    state.orders.insert(order.clone()).await?;
    info!(order_id = %order.id, order_number = %order.order_number, "order received");

    Ok(Json(order))
}

async fn list_orders(
    State(state): State<Arc<AppState>>,
    current: CurrentDriver,
    Query(params): Query<DayQuery>,
) -> Result<Json<Vec<Order>>, AppError> {
    let mut query = OrderQuery::for_driver(current.driver.id).on_day(params.date.unwrap_or_else(today));
    if let Some(raw) = params.status.as_deref() {
        query = query.with_statuses(&parse_statuses(raw)?);
    }

    Ok(Json(state.orders.fetch(&query).await?))
}

async fn get_order(
    State(state): State<Arc<AppState>>,
    current: CurrentDriver,
    Path(id): Path<Uuid>,
) -> Result<Json<Order>, AppError> {
    Ok(Json(workflow::load_assigned(&state, &current.driver, id).await?))
}

async fn order_actions(
    State(state): State<Arc<AppState>>,
    current: CurrentDriver,
    Path(id): Path<Uuid>,
) -> Result<Json<OrderActions>, AppError> {
    let order = workflow::load_assigned(&state, &current.driver, id).await?;
    Ok(Json(workflow::available_actions(&order)))
}

async fn scan_order(
    State(state): State<Arc<AppState>>,
    current: CurrentDriver,
    Path(id): Path<Uuid>,
    Json(payload): Json<ScanRequest>,
) -> Result<Json<ScanOutcome>, AppError> {
    let outcome = workflow::verify_stop_scan(&state, &current.driver, id, &payload.code).await?;
    Ok(Json(outcome))
}

async fn confirm_pickup(
    State(state): State<Arc<AppState>>,
    current: CurrentDriver,
    Path(id): Path<Uuid>,
    Query(params): Query<PickupParams>,
    body: Bytes,
) -> Result<Json<Order>, AppError> {
    let photo = PhotoEvidence::from_parts(params.photo_uri, body);
    let order = workflow::confirm_pickup(&state, &current.driver, id, photo).await?;
    Ok(Json(order))
}

async fn mark_arrived(
    State(state): State<Arc<AppState>>,
    current: CurrentDriver,
    Path(id): Path<Uuid>,
) -> Result<Json<Order>, AppError> {
    Ok(Json(workflow::mark_arrived(&state, &current.driver, id).await?))
}

async fn confirm_delivery(
    State(state): State<Arc<AppState>>,
    current: CurrentDriver,
    Path(id): Path<Uuid>,
    Query(params): Query<DeliveryParams>,
    body: Bytes,
) -> Result<Json<Order>, AppError> {
    let confirmation = DeliveryConfirmation {
        photo: PhotoEvidence::from_parts(params.photo_uri, body),
        recipient_name: params.recipient_name,
    };

    let order = workflow::confirm_delivery(&state, &current.driver, id, confirmation).await?;
    Ok(Json(order))
}

async fn facility_orders(
    State(state): State<Arc<AppState>>,
    current: CurrentDriver,
) -> Result<Json<Vec<Order>>, AppError> {
    Ok(Json(workflow::facility_orders(&state, &current.driver, today()).await?))
}

async fn facility_scan(
    State(state): State<Arc<AppState>>,
    current: CurrentDriver,
    Json(payload): Json<ScanRequest>,
) -> Result<Json<ScanOutcome>, AppError> {
    let outcome = workflow::scan_at_facility(&state, &current.driver, &payload.code, today()).await?;
    Ok(Json(outcome))
}

async fn current_stop(
    State(state): State<Arc<AppState>>,
    current: CurrentDriver,
) -> Result<Json<Option<RouteStop>>, AppError> {
    Ok(Json(summary::current_stop(&state, &current.driver).await?))
}

async fn route(
    State(state): State<Arc<AppState>>,
    current: CurrentDriver,
    Query(params): Query<DayQuery>,
) -> Result<Json<Vec<RouteStop>>, AppError> {
    let day = params.date.unwrap_or_else(today);
    Ok(Json(summary::route_for_day(&state, &current.driver, day).await?))
}

async fn stats(
    State(state): State<Arc<AppState>>,
    current: CurrentDriver,
    Query(params): Query<DayQuery>,
) -> Result<Json<DriverStats>, AppError> {
    let day = params.date.unwrap_or_else(today);
    Ok(Json(summary::stats_for_day(&state, &current.driver, day).await?))
}

#[cfg(test)]
mod tests {
    use axum::http::{HeaderMap, HeaderValue};

    use super::{ensure_intake_allowed, parse_statuses, INTAKE_KEY_HEADER};
    use crate::config::PhotoSettings;
    use crate::models::order::OrderStatus;
    use crate::state::AppState;

    #[test]
    fn intake_is_open_without_configured_key() {
        let state = AppState::in_memory(16, &PhotoSettings::default());
        assert!(ensure_intake_allowed(&state, &HeaderMap::new()).is_ok());
    }

    #[test]
    fn intake_requires_matching_key_when_configured() {
        let state = AppState::in_memory(16, &PhotoSettings::default())
            .with_intake_key(Some("s3cret".to_string()));

        let mut headers = HeaderMap::new();
        assert!(ensure_intake_allowed(&state, &headers).is_err());

        headers.insert(INTAKE_KEY_HEADER, HeaderValue::from_static("wrong"));
        assert!(ensure_intake_allowed(&state, &headers).is_err());

        headers.insert(INTAKE_KEY_HEADER, HeaderValue::from_static("s3cret"));
        assert!(ensure_intake_allowed(&state, &headers).is_ok());
    }

    #[test]
    fn status_list_parses_and_skips_blanks() {
        assert_eq!(
            parse_statuses("ready_for_delivery, scanned,").unwrap(),
            vec![OrderStatus::ReadyForDelivery, OrderStatus::Scanned]
        );
    }

    #[test]
    fn unknown_status_in_list_is_bad_request() {
        assert!(parse_statuses("scanned,in_transit_to_customer").is_err());
    }
}
