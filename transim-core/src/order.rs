use crate::map::{StationId, TileIndex};
use serde::{Deserialize, Serialize};

/// Where along a platform a train stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum StopLocation {
    /// Front of the train just past the platform entry.
    NearEnd,
    Middle,
    #[default]
    FarEnd,
}

/// Current destination of a vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Order {
    #[default]
    None,
    GoToStation {
        station: StationId,
        stop: StopLocation,
    },
    GoToWaypoint {
        station: StationId,
    },
    /// `None` means the nearest depot.
    GoToDepot {
        depot: Option<TileIndex>,
        /// Stop inside instead of servicing and leaving.
        halt: bool,
    },
}

impl Order {
    pub fn station(&self) -> Option<StationId> {
        match self {
            Order::GoToStation { station, .. } | Order::GoToWaypoint { station } => Some(*station),
            _ => None,
        }
    }

    pub fn is_depot(&self) -> bool {
        matches!(self, Order::GoToDepot { .. })
    }
}

/// Orders of one vehicle, executed in a cycle.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OrderList {
    pub orders: Vec<Order>,
    pub current: usize,
    /// One-off order that takes priority, such as "go to depot".
    pub interrupt: Option<Order>,
}

impl OrderList {
    pub fn current(&self) -> Order {
        if let Some(order) = self.interrupt {
            return order;
        }
        self.orders.get(self.current).copied().unwrap_or_default()
    }

    /// Finish the current order and move on to the next one.
    pub fn advance(&mut self) {
        if self.interrupt.take().is_some() {
            return;
        }
        if !self.orders.is_empty() {
            self.current = (self.current + 1) % self.orders.len();
        }
    }

    /// Insert at `index`, or replace the order there when `replace` is set.
    /// Returns `false` when `index` is out of range.
    pub fn set(&mut self, index: usize, order: Order, replace: bool) -> bool {
        if replace {
            match self.orders.get_mut(index) {
                Some(slot) => *slot = order,
                None => return false,
            }
        } else {
            if index > self.orders.len() {
                return false;
            }
            self.orders.insert(index, order);
            if index <= self.current && self.orders.len() > 1 {
                self.current += 1;
            }
        }
        if self.current >= self.orders.len() {
            self.current = 0;
        }
        true
    }

    /// Drop every order to `station`, which no longer exists.
    pub fn remove_station(&mut self, station: StationId) {
        self.orders.retain(|o| o.station() != Some(station));
        if self.interrupt.and_then(|o| o.station()) == Some(station) {
            self.interrupt = None;
        }
        if self.current >= self.orders.len() {
            self.current = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_orders_cycle() {
        let mut list = OrderList::default();
        assert_eq!(list.current(), Order::None);
        let a = Order::GoToStation { station: 1, stop: StopLocation::FarEnd };
        let b = Order::GoToWaypoint { station: 2 };
        assert!(list.set(0, a, false));
        assert!(list.set(1, b, false));
        assert_eq!(list.current(), a);
        list.advance();
        assert_eq!(list.current(), b);
        list.advance();
        assert_eq!(list.current(), a);
    }

    #[test]
    fn test_interrupt_takes_priority_once() {
        let mut list = OrderList::default();
        let a = Order::GoToStation { station: 1, stop: StopLocation::Middle };
        list.set(0, a, false);
        list.interrupt = Some(Order::GoToDepot { depot: None, halt: true });
        assert!(list.current().is_depot());
        list.advance();
        assert_eq!(list.current(), a);
        assert!(!list.set(3, a, true));
    }
}
