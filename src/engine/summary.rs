use chrono::NaiveDate;

use crate::backend::OrderQuery;
use crate::engine::transitions::leg_of;
use crate::error::AppError;
use crate::geo::{distance_km, round_km};
use crate::models::driver::Driver;
use crate::models::order::{GeoPoint, Leg, Order, OrderStatus};
use crate::models::route::{DriverStats, RouteStop};
use crate::state::AppState;

/// Every status an order can hold before it is delivered.
pub const OPEN_STATUSES: &[OrderStatus] = &[
    OrderStatus::ReadyForDelivery,
    OrderStatus::Scanned,
    OrderStatus::InTransitToFacility,
    OrderStatus::ArrivedAtFacility,
];

pub fn stats_for(orders: &[Order]) -> DriverStats {
    let count = |pred: fn(OrderStatus) -> bool| orders.iter().filter(|o| pred(o.status)).count();

    DriverStats {
        total_orders: orders.len(),
        ready: count(|status| status == OrderStatus::ReadyForDelivery),
        completed_pickups: count(|status| status.rank() >= OrderStatus::InTransitToFacility.rank()),
        completed_deliveries: count(|status| status == OrderStatus::Delivered),
        in_progress: count(|status| {
            matches!(
                status,
                OrderStatus::Scanned
                    | OrderStatus::InTransitToFacility
                    | OrderStatus::ArrivedAtFacility
            )
        }),
    }
}

pub fn route_stops(orders: &[Order]) -> Vec<RouteStop> {
    let mut previous: Option<GeoPoint> = None;

    orders
        .iter()
        .filter(|order| order.status != OrderStatus::Delivered)
        .map(|order| {
            let leg = leg_of(order);
            let distance = match (previous, order.location) {
                (Some(from), Some(to)) => Some(round_km(distance_km(&from, &to))),
                _ => None,
            };
            if order.location.is_some() {
                previous = order.location;
            }

            RouteStop {
                order_id: order.id,
                order_number: order.order_number.clone(),
                leg,
                customer_name: order.customer_name.clone(),
                address: order.shipping_address.clone(),
                phone: order.phone.clone(),
                status: order.status,
                qr_code: order.qr_code.clone(),
                estimated_at: match leg {
                    Leg::Pickup => order.estimated_pickup_at,
                    Leg::Dropoff => order.estimated_dropoff_at,
                },
                distance_km: distance,
            }
        })
        .collect()
}

pub async fn stats_for_day(
    state: &AppState,
    driver: &Driver,
    day: NaiveDate,
) -> Result<DriverStats, AppError> {
    let orders = state
        .orders
        .fetch(&OrderQuery::for_driver(driver.id).on_day(day))
        .await?;
    Ok(stats_for(&orders))
}

pub async fn route_for_day(
    state: &AppState,
    driver: &Driver,
    day: NaiveDate,
) -> Result<Vec<RouteStop>, AppError> {
    let orders = state
        .orders
        .fetch(&OrderQuery::for_driver(driver.id).on_day(day))
        .await?;
    Ok(route_stops(&orders))
}

/// The oldest order the driver still has to act on.
pub async fn current_stop(state: &AppState, driver: &Driver) -> Result<Option<RouteStop>, AppError> {
    let orders = state
        .orders
        .fetch(&OrderQuery::for_driver(driver.id).with_statuses(OPEN_STATUSES))
        .await?;

    Ok(route_stops(&orders).into_iter().next())
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    use super::{route_stops, stats_for};
    use crate::models::order::{GeoPoint, Leg, Order, OrderStatus, OrderType};
    use crate::models::route::DriverStats;

    fn order(status: OrderStatus, location: Option<GeoPoint>) -> Order {
        let now = Utc::now();
        Order {
            id: Uuid::new_v4(),
            order_number: format!("ORD-{status}"),
            customer_name: "Bram".to_string(),
            shipping_address: "Oudegracht 1".to_string(),
            phone: None,
            order_type: OrderType::Delivery,
            status,
            qr_code: "QR".to_string(),
            location,
            estimated_pickup_at: Some(now),
            estimated_dropoff_at: Some(now + Duration::hours(2)),
            assigned_pickup_driver_id: None,
            assigned_dropoff_driver_id: None,
            pickup_photo_url: None,
            delivery_photo_url: None,
            recipient_name: None,
            picked_up_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn stats_classify_by_position_in_chain() {
        let orders: Vec<Order> = OrderStatus::ALL
            .into_iter()
            .map(|status| order(status, None))
            .collect();

        assert_eq!(
            stats_for(&orders),
            DriverStats {
                total_orders: 5,
                ready: 1,
                completed_pickups: 3,
                completed_deliveries: 1,
                in_progress: 3,
            }
        );
    }

    #[test]
    fn empty_day_has_zero_stats() {
        assert_eq!(stats_for(&[]), DriverStats::default());
    }

    #[test]
    fn route_skips_delivered_and_uses_leg_estimate() {
        let pickup = order(OrderStatus::ReadyForDelivery, None);
        let dropoff = order(OrderStatus::ArrivedAtFacility, None);
        let done = order(OrderStatus::Delivered, None);

        let stops = route_stops(&[pickup.clone(), done, dropoff.clone()]);
        assert_eq!(stops.len(), 2);
        assert_eq!(stops[0].leg, Leg::Pickup);
        assert_eq!(stops[0].estimated_at, pickup.estimated_pickup_at);
        assert_eq!(stops[1].leg, Leg::Dropoff);
        assert_eq!(stops[1].estimated_at, dropoff.estimated_dropoff_at);
    }

    #[test]
    fn route_distance_measured_from_last_located_stop() {
        let utrecht = GeoPoint {
            lat: 52.0907,
            lng: 5.1214,
        };
        let amersfoort = GeoPoint {
            lat: 52.1561,
            lng: 5.3878,
        };

        let stops = route_stops(&[
            order(OrderStatus::ReadyForDelivery, Some(utrecht)),
            order(OrderStatus::Scanned, None),
            order(OrderStatus::ReadyForDelivery, Some(amersfoort)),
        ]);

        assert_eq!(stops[0].distance_km, None);
        assert_eq!(stops[1].distance_km, None);
        let km = stops[2].distance_km.unwrap();
        assert!(km > 15.0 && km < 25.0, "{km}");
    }
}
