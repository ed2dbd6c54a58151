//! Driver actions against an order.
//!
//! Each action loads the current row, validates the requested status change
//! locally, and only then issues a single store update. Nothing is changed
//! in place before the store accepts the write.

use std::time::Instant;

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::backend::OrderQuery;
use crate::engine::photos::{PhotoEvidence, PhotoKind, PhotoRecord, discard_photo, store_photo};
use crate::engine::qr;
use crate::engine::transitions::{self, check_transition, leg_of};
use crate::error::AppError;
use crate::models::driver::Driver;
use crate::models::order::{Leg, Order, OrderStatus, OrderUpdate};
use crate::state::AppState;

/// Statuses shown on the facility screen.
pub const FACILITY_STATUSES: &[OrderStatus] =
    &[OrderStatus::ReadyForDelivery, OrderStatus::Scanned];

#[derive(Debug, Clone, Serialize)]
pub struct ScanOutcome {
    pub order: Order,
    pub leg: Leg,
    /// Whether the scan moved the order to a new status.
    pub advanced: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderActions {
    pub order_id: Uuid,
    pub status: OrderStatus,
    pub leg: Leg,
    pub next_valid_states: Vec<OrderStatus>,
    pub can_start_pickup_scan: bool,
    pub can_complete_delivery: bool,
    pub is_terminal: bool,
}

#[derive(Debug, Clone, Default)]
pub struct DeliveryConfirmation {
    pub photo: Option<PhotoEvidence>,
    pub recipient_name: Option<String>,
}

pub fn available_actions(order: &Order) -> OrderActions {
    OrderActions {
        order_id: order.id,
        status: order.status,
        leg: leg_of(order),
        next_valid_states: transitions::next_valid_states(order.status).to_vec(),
        can_start_pickup_scan: transitions::can_start_pickup_scan(order.status),
        can_complete_delivery: transitions::can_complete_delivery(order.status),
        is_terminal: transitions::is_terminal(order.status),
    }
}

/// Whether `driver_id` may act on the given leg of `order`.
///
/// A leg without its own assignee falls to whoever holds the other leg.
pub fn holds_leg(order: &Order, driver_id: Uuid, leg: Leg) -> bool {
    let (own, other) = match leg {
        Leg::Pickup => (order.assigned_pickup_driver_id, order.assigned_dropoff_driver_id),
        Leg::Dropoff => (order.assigned_dropoff_driver_id, order.assigned_pickup_driver_id),
    };

    match own {
        Some(assignee) => assignee == driver_id,
        None => other == Some(driver_id),
    }
}

/// Loads an order visible to `driver`. Orders assigned elsewhere are
/// reported as missing.
pub async fn load_assigned(
    state: &AppState,
    driver: &Driver,
    order_id: Uuid,
) -> Result<Order, AppError> {
    state
        .orders
        .get(order_id)
        .await?
        .filter(|order| order.is_assigned_to(driver.id))
        .ok_or_else(|| AppError::NotFound(format!("order {order_id} not found")))
}

pub async fn facility_orders(
    state: &AppState,
    driver: &Driver,
    day: NaiveDate,
) -> Result<Vec<Order>, AppError> {
    let query = OrderQuery::for_driver(driver.id)
        .on_day(day)
        .with_statuses(FACILITY_STATUSES);

    let orders = state.orders.fetch(&query).await?;
    Ok(orders
        .into_iter()
        .filter(|order| holds_leg(order, driver.id, Leg::Pickup))
        .collect())
}

/// Facility scan: matches the scanned tag against the driver's orders of
/// `day` that still await the pickup scan and marks the match scanned.
pub async fn scan_at_facility(
    state: &AppState,
    driver: &Driver,
    scanned: &str,
    day: NaiveDate,
) -> Result<ScanOutcome, AppError> {
    if scanned.trim().is_empty() {
        return Err(AppError::BadRequest("scanned code cannot be empty".to_string()));
    }

    let orders = facility_orders(state, driver, day).await?;
    let Some(order) = qr::find_match(&orders, scanned).cloned() else {
        state.metrics.qr_scans_total.with_label_values(&["mismatch"]).inc();
        info!(driver_id = %driver.id, scanned = %scanned.trim(), "facility scan matched no order");
        return Err(AppError::QrMismatch {
            scanned: scanned.trim().to_string(),
        });
    };

    state.metrics.qr_scans_total.with_label_values(&["matched"]).inc();
    mark_scanned(state, driver, order).await
}

/// Current-stop scan. On the pickup leg a match marks the order scanned; on
/// the dropoff leg it only verifies the parcel.
pub async fn verify_stop_scan(
    state: &AppState,
    driver: &Driver,
    order_id: Uuid,
    scanned: &str,
) -> Result<ScanOutcome, AppError> {
    let order = load_assigned(state, driver, order_id).await?;

    if !qr::matches(&order, scanned) {
        state.metrics.qr_scans_total.with_label_values(&["mismatch"]).inc();
        info!(order_id = %order.id, driver_id = %driver.id, "scanned code does not match order");
        return Err(AppError::QrMismatch {
            scanned: scanned.trim().to_string(),
        });
    }

    state.metrics.qr_scans_total.with_label_values(&["matched"]).inc();

    match leg_of(&order) {
        Leg::Pickup => {
            ensure_holds(&order, driver, Leg::Pickup)?;
            mark_scanned(state, driver, order).await
        }
        Leg::Dropoff => {
            if transitions::is_terminal(order.status) {
                return Err(AppError::TerminalState(order.status));
            }
            ensure_holds(&order, driver, Leg::Dropoff)?;

            Ok(ScanOutcome {
                order,
                leg: Leg::Dropoff,
                advanced: false,
            })
        }
    }
}

/// Pickup confirmation. Requires photo evidence; the photo is uploaded
/// before the status write so a failed upload leaves the order untouched.
pub async fn confirm_pickup(
    state: &AppState,
    driver: &Driver,
    order_id: Uuid,
    photo: Option<PhotoEvidence>,
) -> Result<Order, AppError> {
    let started = Instant::now();
    let target = OrderStatus::InTransitToFacility;

    let order = load_assigned(state, driver, order_id).await?;
    ensure_holds(&order, driver, Leg::Pickup)?;
    validate(state, &order, target)?;

    let Some(photo) = photo else {
        state.metrics.record_transition(target.as_str(), "rejected");
        info!(order_id = %order.id, "pickup rejected: no photo evidence");
        return Err(AppError::MissingPhoto);
    };

    let record = store_photo(state, driver.id, PhotoKind::Pickup, &order.order_number, &photo)
        .await
        .inspect_err(|err| {
            state.metrics.record_transition(target.as_str(), "failed");
            warn!(order_id = %order.id, error = %err, "pickup photo upload failed");
        })?;

    let now = Utc::now();
    let mut update = OrderUpdate::status(target, now);
    update.pickup_photo_url = Some(record.url.clone());
    update.picked_up_at = Some(now);

    commit_with_photo(state, driver, &order, update, started, Some(&record)).await
}

/// Facility arrival check-in. Either assignee may record it.
pub async fn mark_arrived(
    state: &AppState,
    driver: &Driver,
    order_id: Uuid,
) -> Result<Order, AppError> {
    let started = Instant::now();
    let target = OrderStatus::ArrivedAtFacility;

    let order = load_assigned(state, driver, order_id).await?;
    validate(state, &order, target)?;

    commit(state, driver, &order, OrderUpdate::status(target, Utc::now()), started).await
}

/// Delivery confirmation. Photo and recipient name are optional; a failed
/// photo upload keeps the local reference instead of blocking delivery.
pub async fn confirm_delivery(
    state: &AppState,
    driver: &Driver,
    order_id: Uuid,
    confirmation: DeliveryConfirmation,
) -> Result<Order, AppError> {
    let started = Instant::now();
    let target = OrderStatus::Delivered;

    let order = load_assigned(state, driver, order_id).await?;
    ensure_holds(&order, driver, Leg::Dropoff)?;
    validate(state, &order, target)?;

    let mut update = OrderUpdate::status(target, Utc::now());

    let mut record = None;
    if let Some(photo) = &confirmation.photo {
        let stored = match store_photo(state, driver.id, PhotoKind::Delivery, &order.order_number, photo).await {
            Ok(stored) => stored,
            Err(err) => {
                warn!(order_id = %order.id, error = %err, "delivery photo not uploaded; keeping local reference");
                PhotoRecord {
                    url: photo.local_uri.clone(),
                    uploaded: None,
                }
            }
        };
        update.delivery_photo_url = Some(stored.url.clone());
        record = Some(stored);
    }

    update.recipient_name = confirmation
        .recipient_name
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty());

    commit_with_photo(state, driver, &order, update, started, record.as_ref()).await
}

async fn mark_scanned(
    state: &AppState,
    driver: &Driver,
    order: Order,
) -> Result<ScanOutcome, AppError> {
    if order.status == OrderStatus::Scanned {
        return Ok(ScanOutcome {
            order,
            leg: Leg::Pickup,
            advanced: false,
        });
    }

    let started = Instant::now();
    let target = OrderStatus::Scanned;
    validate(state, &order, target)?;

    let updated = commit(state, driver, &order, OrderUpdate::status(target, Utc::now()), started).await?;
    Ok(ScanOutcome {
        leg: leg_of(&updated),
        order: updated,
        advanced: true,
    })
}

fn ensure_holds(order: &Order, driver: &Driver, leg: Leg) -> Result<(), AppError> {
    if holds_leg(order, driver.id, leg) {
        Ok(())
    } else {
        Err(AppError::NotAssigned(order.order_number.clone()))
    }
}

fn validate(state: &AppState, order: &Order, target: OrderStatus) -> Result<(), AppError> {
    check_transition(order.status, target).map_err(|err| {
        state.metrics.record_transition(target.as_str(), "rejected");
        info!(order_id = %order.id, from = %order.status, to = %target, "transition rejected");
        AppError::from(err)
    })
}

/// Commits `update`; an object uploaded for it is removed if the write fails.
async fn commit_with_photo(
    state: &AppState,
    driver: &Driver,
    order: &Order,
    update: OrderUpdate,
    started: Instant,
    photo: Option<&PhotoRecord>,
) -> Result<Order, AppError> {
    let result = commit(state, driver, order, update, started).await;
    if result.is_err() {
        if let Some(record) = photo {
            discard_photo(state, driver.id, record).await;
        }
    }
    result
}

async fn commit(
    state: &AppState,
    driver: &Driver,
    order: &Order,
    update: OrderUpdate,
    started: Instant,
) -> Result<Order, AppError> {
    let target = update.status;

    match state.orders.update(order.id, &update).await {
        Ok(updated) => {
            state.metrics.record_transition(target.as_str(), "accepted");
            state
                .metrics
                .transition_latency_seconds
                .with_label_values(&[target.as_str()])
                .observe(started.elapsed().as_secs_f64());
            info!(
                order_id = %order.id,
                driver_id = %driver.id,
                from = %order.status,
                to = %target,
                "order status changed"
            );
            Ok(updated)
        }
        Err(err) => {
            state.metrics.record_transition(target.as_str(), "failed");
            warn!(order_id = %order.id, to = %target, error = %err, "order update failed");
            Err(err.into())
        }
    }
}
