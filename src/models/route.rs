use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::order::{Leg, OrderStatus};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteStop {
    pub order_id: Uuid,
    pub order_number: String,
    pub leg: Leg,
    pub customer_name: String,
    pub address: String,
    pub phone: Option<String>,
    pub status: OrderStatus,
    pub qr_code: String,
    pub estimated_at: Option<DateTime<Utc>>,
    /// Distance from the previous stop, when both carry coordinates.
    pub distance_km: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DriverStats {
    pub total_orders: usize,
    /// Still waiting for the pickup scan.
    pub ready: usize,
    pub completed_pickups: usize,
    pub completed_deliveries: usize,
    pub in_progress: usize,
}
