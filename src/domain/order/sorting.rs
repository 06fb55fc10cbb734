use super::value_objects::OrderStatus;
use super::view::OrderView;

/// Display rank for kitchen/pickup boards: ready orders first, then those
/// being prepared, then the queue.
pub fn display_priority(status: OrderStatus) -> u8 {
    match status {
        OrderStatus::Done => 0,
        OrderStatus::Preparing => 1,
        OrderStatus::Created => 2,
        _ => 3,
    }
}

/// Stable sort by display priority; equal statuses keep their input order.
pub fn sort_by_display_priority<T>(items: &mut [T], status_of: impl Fn(&T) -> OrderStatus) {
    items.sort_by_key(|item| display_priority(status_of(item)));
}

pub fn sort_for_display(orders: &mut [OrderView]) {
    sort_by_display_priority(orders, |order| order.order_status);
}
