use serde::{Deserialize, Serialize};
use slotmap::new_key_type;

new_key_type! {
    /// Identifies a bus segment. Every `create_bus` call yields one; bridged
    /// segments share a net whose live handle is the smallest member id.
    pub struct BusId;

    /// Identifies a connection point (grid hole or element pin).
    pub struct PointId;

    /// Identifies an element in the circuit's element store.
    pub struct ElementId;
}

/// Where a power operation lands: a single connection point, or a bus that
/// drives itself (rail feeds, test harnesses).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PowerTarget {
    Point(PointId),
    Bus(BusId),
}

impl From<PointId> for PowerTarget {
    fn from(point: PointId) -> Self {
        PowerTarget::Point(point)
    }
}

impl From<BusId> for PowerTarget {
    fn from(bus: BusId) -> Self {
        PowerTarget::Bus(bus)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    #[test]
    fn bus_ids_order_by_allocation() {
        let mut sm = SlotMap::<BusId, ()>::with_key();
        let a = sm.insert(());
        let b = sm.insert(());
        assert!(a < b);
    }

    #[test]
    fn reused_slot_gets_a_distinct_key() {
        let mut sm = SlotMap::<BusId, ()>::with_key();
        let a = sm.insert(());
        sm.remove(a);
        let b = sm.insert(());
        assert_ne!(a, b);
        assert!(!sm.contains_key(a));
    }

    #[test]
    fn power_target_from_ids() {
        let mut points = SlotMap::<PointId, ()>::with_key();
        let p = points.insert(());
        assert_eq!(PowerTarget::from(p), PowerTarget::Point(p));
    }
}
