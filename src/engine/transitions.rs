//! Order status lifecycle.
//!
//! The transition table below is the single authority on which status
//! changes are legal. Screens and handlers ask this module instead of
//! comparing status values themselves.

use thiserror::Error;

use crate::models::order::{Leg, Order, OrderStatus};

const FROM_READY: &[OrderStatus] = &[OrderStatus::Scanned, OrderStatus::InTransitToFacility];
const FROM_SCANNED: &[OrderStatus] = &[OrderStatus::InTransitToFacility];
const FROM_IN_TRANSIT: &[OrderStatus] = &[OrderStatus::ArrivedAtFacility];
const FROM_ARRIVED: &[OrderStatus] = &[OrderStatus::Delivered];
const TERMINAL: &[OrderStatus] = &[];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("order is {current}, which is final; no further changes are possible")]
    Terminal { current: OrderStatus },

    #[error("order is {from} and cannot be moved to {to} from there")]
    NotPermitted { from: OrderStatus, to: OrderStatus },
}

pub fn next_valid_states(current: OrderStatus) -> &'static [OrderStatus] {
    match current {
        OrderStatus::ReadyForDelivery => FROM_READY,
        OrderStatus::Scanned => FROM_SCANNED,
        OrderStatus::InTransitToFacility => FROM_IN_TRANSIT,
        OrderStatus::ArrivedAtFacility => FROM_ARRIVED,
        OrderStatus::Delivered => TERMINAL,
    }
}

pub fn is_valid_transition(from: OrderStatus, to: OrderStatus) -> bool {
    next_valid_states(from).contains(&to)
}

pub fn is_terminal(status: OrderStatus) -> bool {
    next_valid_states(status).is_empty()
}

/// Gates the "scan at facility" action.
pub fn can_start_pickup_scan(status: OrderStatus) -> bool {
    matches!(status, OrderStatus::ReadyForDelivery | OrderStatus::Scanned)
}

/// Gates the "confirm delivery" action. Only orders that reached the
/// facility may be delivered.
pub fn can_complete_delivery(status: OrderStatus) -> bool {
    status == OrderStatus::ArrivedAtFacility
}

/// The leg a stop represents, derived from where the order sits in the
/// chain: pickup while the pickup scan is still open, dropoff afterwards.
pub fn leg_of(order: &Order) -> Leg {
    if can_start_pickup_scan(order.status) {
        Leg::Pickup
    } else {
        Leg::Dropoff
    }
}

pub fn check_transition(current: OrderStatus, target: OrderStatus) -> Result<(), TransitionError> {
    if is_terminal(current) {
        return Err(TransitionError::Terminal { current });
    }

    if !is_valid_transition(current, target) {
        return Err(TransitionError::NotPermitted {
            from: current,
            to: target,
        });
    }

    Ok(())
}

/// Status checks on untyped values, e.g. rows written by other systems.
/// Unrecognized strings have no permitted transitions.
pub mod raw {
    use crate::models::order::OrderStatus;

    fn parse(status: &str) -> Option<OrderStatus> {
        status.parse().ok()
    }

    pub fn is_valid_transition(from: &str, to: &str) -> bool {
        match (parse(from), parse(to)) {
            (Some(from), Some(to)) => super::is_valid_transition(from, to),
            _ => false,
        }
    }

    pub fn next_valid_states(current: &str) -> &'static [OrderStatus] {
        parse(current).map_or(super::TERMINAL, super::next_valid_states)
    }

    pub fn can_start_pickup_scan(status: &str) -> bool {
        parse(status).is_some_and(super::can_start_pickup_scan)
    }

    pub fn can_complete_delivery(status: &str) -> bool {
        parse(status).is_some_and(super::can_complete_delivery)
    }
}
