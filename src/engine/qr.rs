use crate::models::order::Order;

/// A printed tag matches an order when its payload equals the stored QR
/// code or the human-facing order number.
pub fn matches(order: &Order, scanned: &str) -> bool {
    let scanned = scanned.trim();
    if scanned.is_empty() {
        return false;
    }

    scanned == order.qr_code || scanned == order.order_number
}

pub fn find_match<'a>(orders: &'a [Order], scanned: &str) -> Option<&'a Order> {
    orders.iter().find(|order| matches(order, scanned))
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::{find_match, matches};
    use crate::models::order::{Order, OrderStatus, OrderType};

    fn order(order_number: &str, qr_code: &str) -> Order {
        Order {
            id: Uuid::new_v4(),
            order_number: order_number.to_string(),
            customer_name: "Fleur".to_string(),
            shipping_address: "Prinsengracht 263".to_string(),
            phone: None,
            order_type: OrderType::Pickup,
            status: OrderStatus::ReadyForDelivery,
            qr_code: qr_code.to_string(),
            location: None,
            estimated_pickup_at: None,
            estimated_dropoff_at: None,
            assigned_pickup_driver_id: None,
            assigned_dropoff_driver_id: None,
            pickup_photo_url: None,
            delivery_photo_url: None,
            recipient_name: None,
            picked_up_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn qr_code_match_is_accepted() {
        assert!(matches(&order("ORD-7", "QR-7"), "QR-7"));
    }

    #[test]
    fn order_number_alone_is_sufficient() {
        assert!(matches(&order("ORD-7", "QR-7"), "ORD-7"));
    }

    #[test]
    fn other_codes_do_not_match() {
        let o = order("ORD-7", "QR-7");
        assert!(!matches(&o, "QR-8"));
        assert!(!matches(&o, "qr-7"));
        assert!(!matches(&o, ""));
    }

    #[test]
    fn scanner_whitespace_is_ignored() {
        assert!(matches(&order("ORD-7", "QR-7"), "QR-7\n"));
    }

    #[test]
    fn blank_stored_code_never_matches_blank_scan() {
        assert!(!matches(&order("ORD-7", ""), "   "));
    }

    #[test]
    fn find_match_returns_first_matching_order() {
        let orders = vec![order("ORD-1", "QR-1"), order("ORD-2", "QR-2")];
        let found = find_match(&orders, "ORD-2").unwrap();
        assert_eq!(found.order_number, "ORD-2");
        assert!(find_match(&orders, "ORD-3").is_none());
    }
}
