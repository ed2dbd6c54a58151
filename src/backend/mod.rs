//! Boundaries to the hosted backend.
//!
//! The service never talks to a particular database, bucket or auth
//! provider directly. Each concern sits behind one of the traits below.
//! `memory` provides implementations used for local runs and tests.

pub mod memory;

use async_trait::async_trait;
use axum::body::Bytes;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::models::driver::{Driver, Session};
use crate::models::order::{Order, OrderStatus, OrderUpdate};

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("record not found")]
    NotFound,

    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("storage bucket {0} is not provisioned")]
    BucketMissing(String),

    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

/// Filter for reading a driver's orders.
///
/// Matches orders where the driver holds either the pickup or the dropoff
/// assignment. `created_from` is inclusive, `created_before` exclusive.
#[derive(Debug, Clone)]
pub struct OrderQuery {
    pub driver_id: Uuid,
    pub statuses: Option<Vec<OrderStatus>>,
    pub created_from: Option<DateTime<Utc>>,
    pub created_before: Option<DateTime<Utc>>,
}

impl OrderQuery {
    pub fn for_driver(driver_id: Uuid) -> Self {
        Self {
            driver_id,
            statuses: None,
            created_from: None,
            created_before: None,
        }
    }

    pub fn with_statuses(mut self, statuses: &[OrderStatus]) -> Self {
        self.statuses = Some(statuses.to_vec());
        self
    }

    /// Restricts the query to orders created on `day` (UTC).
    pub fn on_day(mut self, day: NaiveDate) -> Self {
        self.created_from = start_of_day(day);
        self.created_before = day.succ_opt().and_then(start_of_day);
        self
    }

    pub fn matches(&self, order: &Order) -> bool {
        if !order.is_assigned_to(self.driver_id) {
            return false;
        }

        if let Some(statuses) = &self.statuses {
            if !statuses.contains(&order.status) {
                return false;
            }
        }

        if self.created_from.is_some_and(|from| order.created_at < from) {
            return false;
        }

        if self
            .created_before
            .is_some_and(|before| order.created_at >= before)
        {
            return false;
        }

        true
    }
}

fn start_of_day(day: NaiveDate) -> Option<DateTime<Utc>> {
    day.and_hms_opt(0, 0, 0)
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// "Something changed" signal for an order row.
#[derive(Debug, Clone, Serialize)]
pub struct OrderChange {
    pub order_id: Uuid,
    pub pickup_driver_id: Option<Uuid>,
    pub dropoff_driver_id: Option<Uuid>,
}

impl OrderChange {
    pub fn for_order(order: &Order) -> Self {
        Self {
            order_id: order.id,
            pickup_driver_id: order.assigned_pickup_driver_id,
            dropoff_driver_id: order.assigned_dropoff_driver_id,
        }
    }

    pub fn concerns(&self, driver_id: Uuid) -> bool {
        self.pickup_driver_id == Some(driver_id) || self.dropoff_driver_id == Some(driver_id)
    }
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn insert(&self, order: Order) -> Result<(), BackendError>;

    async fn get(&self, id: Uuid) -> Result<Option<Order>, BackendError>;

    /// Orders matching `query`, oldest first.
    async fn fetch(&self, query: &OrderQuery) -> Result<Vec<Order>, BackendError>;

    /// Applies `update` to one row and returns the row as stored.
    async fn update(&self, id: Uuid, update: &OrderUpdate) -> Result<Order, BackendError>;

    async fn count(&self) -> Result<usize, BackendError>;

    fn subscribe(&self) -> broadcast::Receiver<OrderChange>;
}

#[async_trait]
pub trait PhotoStore: Send + Sync {
    /// Stores a photo under `{driver_id}/{file_name}` and returns its
    /// durable URL.
    async fn upload(
        &self,
        driver_id: Uuid,
        file_name: &str,
        payload: Bytes,
        content_type: &str,
    ) -> Result<String, BackendError>;

    /// Deletes `{driver_id}/{file_name}`. Missing objects are not an error.
    async fn remove(&self, driver_id: Uuid, file_name: &str) -> Result<(), BackendError>;
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn register_driver(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<Driver, BackendError>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, BackendError>;

    async fn resolve(&self, token: &str) -> Result<Option<Driver>, BackendError>;

    async fn sign_out(&self, token: &str) -> Result<(), BackendError>;

    async fn driver_count(&self) -> Result<usize, BackendError>;

    async fn session_count(&self) -> Result<usize, BackendError>;
}
