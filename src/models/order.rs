use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    ReadyForDelivery,
    Scanned,
    InTransitToFacility,
    ArrivedAtFacility,
    Delivered,
}

impl OrderStatus {
    /// Every status, in normal progression order.
    pub const ALL: [OrderStatus; 5] = [
        OrderStatus::ReadyForDelivery,
        OrderStatus::Scanned,
        OrderStatus::InTransitToFacility,
        OrderStatus::ArrivedAtFacility,
        OrderStatus::Delivered,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::ReadyForDelivery => "ready_for_delivery",
            OrderStatus::Scanned => "scanned",
            OrderStatus::InTransitToFacility => "in_transit_to_facility",
            OrderStatus::ArrivedAtFacility => "arrived_at_facility",
            OrderStatus::Delivered => "delivered",
        }
    }

    /// Position along the chain; later statuses rank higher.
    pub fn rank(&self) -> u8 {
        match self {
            OrderStatus::ReadyForDelivery => 0,
            OrderStatus::Scanned => 1,
            OrderStatus::InTransitToFacility => 2,
            OrderStatus::ArrivedAtFacility => 3,
            OrderStatus::Delivered => 4,
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown order status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for OrderStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

/// The leg of the journey an order was booked as.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    Pickup,
    Delivery,
}

/// Which half of the journey a stop currently represents for the driver.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Leg {
    Pickup,
    Dropoff,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub order_number: String,
    pub customer_name: String,
    pub shipping_address: String,
    pub phone: Option<String>,
    #[serde(rename = "type")]
    pub order_type: OrderType,
    pub status: OrderStatus,
    pub qr_code: String,
    pub location: Option<GeoPoint>,
    pub estimated_pickup_at: Option<DateTime<Utc>>,
    pub estimated_dropoff_at: Option<DateTime<Utc>>,
    pub assigned_pickup_driver_id: Option<Uuid>,
    pub assigned_dropoff_driver_id: Option<Uuid>,
    pub pickup_photo_url: Option<String>,
    pub delivery_photo_url: Option<String>,
    pub recipient_name: Option<String>,
    pub picked_up_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn is_assigned_to(&self, driver_id: Uuid) -> bool {
        self.assigned_pickup_driver_id == Some(driver_id)
            || self.assigned_dropoff_driver_id == Some(driver_id)
    }
}

/// A single-row write against the order store.
///
/// `None` fields are left untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderUpdate {
    pub status: OrderStatus,
    pub updated_at: DateTime<Utc>,
    pub pickup_photo_url: Option<String>,
    pub picked_up_at: Option<DateTime<Utc>>,
    pub delivery_photo_url: Option<String>,
    pub recipient_name: Option<String>,
}

impl OrderUpdate {
    pub fn status(status: OrderStatus, at: DateTime<Utc>) -> Self {
        Self {
            status,
            updated_at: at,
            pickup_photo_url: None,
            picked_up_at: None,
            delivery_photo_url: None,
            recipient_name: None,
        }
    }

    pub fn apply_to(&self, order: &mut Order) {
        order.status = self.status;
        order.updated_at = self.updated_at;

        if let Some(url) = &self.pickup_photo_url {
            order.pickup_photo_url = Some(url.clone());
        }
        if let Some(at) = self.picked_up_at {
            order.picked_up_at = Some(at);
        }
        if let Some(url) = &self.delivery_photo_url {
            order.delivery_photo_url = Some(url.clone());
        }
        if let Some(name) = &self.recipient_name {
            order.recipient_name = Some(name.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::OrderStatus;

    #[test]
    fn status_round_trips_through_wire_names() {
        for status in OrderStatus::ALL {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
            assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), status);
        }
    }

    #[test]
    fn unknown_status_string_is_rejected() {
        assert!("awaiting_pickup_customer".parse::<OrderStatus>().is_err());
        assert!("".parse::<OrderStatus>().is_err());
    }
}
