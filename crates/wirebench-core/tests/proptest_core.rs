//! Property-based tests for the bus registry and power manager.
//!
//! Random bridge sequences are checked against a naive connectivity oracle,
//! and random power/unpower sequences against a plain OR of driver counts.

use std::collections::BTreeMap;

use proptest::prelude::*;
use wirebench_core::bus::BusRegistry;
use wirebench_core::circuit::Circuit;
use wirebench_core::id::{BusId, PowerTarget};
use wirebench_core::power::PowerManager;
use wirebench_core::test_utils::*;

// ===========================================================================
// Bridge sequences vs. oracle
// ===========================================================================

#[derive(Debug, Clone)]
enum BridgeOp {
    Add(usize, usize),
    Remove(usize, usize),
}

fn arb_bridge_ops(buses: usize, max_ops: usize) -> impl Strategy<Value = Vec<BridgeOp>> {
    proptest::collection::vec(
        prop_oneof![
            (0..buses, 0..buses).prop_map(|(a, b)| BridgeOp::Add(a, b)),
            (0..buses, 0..buses).prop_map(|(a, b)| BridgeOp::Remove(a, b)),
        ],
        0..max_ops,
    )
}

/// Union-find over the multiset of live bridges, rebuilt per query.
fn oracle_connected(bridges: &BTreeMap<(usize, usize), u32>, n: usize, a: usize, b: usize) -> bool {
    let mut parent: Vec<usize> = (0..n).collect();
    fn find(parent: &mut [usize], x: usize) -> usize {
        let mut x = x;
        while parent[x] != x {
            parent[x] = parent[parent[x]];
            x = parent[x];
        }
        x
    }
    for (&(x, y), &count) in bridges {
        if count > 0 {
            let (rx, ry) = (find(&mut parent, x), find(&mut parent, y));
            parent[rx] = ry;
        }
    }
    find(&mut parent, a) == find(&mut parent, b)
}

proptest! {
    #[test]
    fn bridges_match_connectivity_oracle(ops in arb_bridge_ops(6, 40)) {
        let mut reg = BusRegistry::new();
        let ids: Vec<BusId> = (0..6).map(|_| reg.create_bus()).collect();
        let mut oracle: BTreeMap<(usize, usize), u32> = BTreeMap::new();

        for op in ops {
            match op {
                BridgeOp::Add(a, b) => {
                    reg.add_bridge(ids[a], ids[b]).unwrap();
                    if a != b {
                        *oracle.entry((a.min(b), a.max(b))).or_insert(0) += 1;
                    }
                }
                BridgeOp::Remove(a, b) => {
                    let key = (a.min(b), a.max(b));
                    let present = oracle.get(&key).is_some_and(|c| *c > 0);
                    let result = reg.remove_bridge(ids[a], ids[b]);
                    if a == b {
                        prop_assert!(result.is_ok());
                    } else if present {
                        prop_assert!(result.is_ok());
                        if let Some(c) = oracle.get_mut(&key) {
                            *c -= 1;
                        }
                    } else {
                        prop_assert!(result.is_err());
                    }
                }
            }
            for a in 0..6 {
                for b in 0..6 {
                    prop_assert_eq!(
                        reg.connected(ids[a], ids[b]),
                        oracle_connected(&oracle, 6, a, b)
                    );
                }
            }
        }
    }

    #[test]
    fn live_handle_is_smallest_segment(ops in arb_bridge_ops(5, 30)) {
        let mut reg = BusRegistry::new();
        let ids: Vec<BusId> = (0..5).map(|_| reg.create_bus()).collect();
        for op in ops {
            match op {
                BridgeOp::Add(a, b) => { reg.add_bridge(ids[a], ids[b]).unwrap(); }
                BridgeOp::Remove(a, b) => { let _ = reg.remove_bridge(ids[a], ids[b]); }
            }
        }
        for net in reg.nets() {
            prop_assert_eq!(Some(&net.id()), net.segments().iter().next());
        }
        let total: usize = reg.nets().map(|n| n.segments().len()).sum();
        prop_assert_eq!(total, 5);
    }
}

// ===========================================================================
// Reference-counted OR semantics
// ===========================================================================

proptest! {
    #[test]
    fn net_power_is_or_of_drivers(ops in proptest::collection::vec((0..4usize, any::<bool>()), 0..60)) {
        let mut reg = BusRegistry::new();
        let mut power = PowerManager::new();
        let bus = reg.create_bus();
        let drivers: Vec<PowerTarget> = (0..4)
            .map(|_| {
                let p = reg.create_point();
                reg.bond(p, bus).unwrap();
                PowerTarget::Point(p)
            })
            .collect();
        let mut counts = [0u32; 4];

        for (driver, on) in ops {
            if on {
                power.power(&reg, drivers[driver]).unwrap();
                counts[driver] += 1;
            } else if counts[driver] > 0 {
                power.unpower(&reg, drivers[driver]).unwrap();
                counts[driver] -= 1;
            }
            power.apply_changes(&mut reg);

            let expected = counts.iter().any(|c| *c > 0);
            prop_assert_eq!(power.has_power(&reg, bus.into()).unwrap(), expected);
            prop_assert_eq!(power.net_count(&reg, bus).unwrap(), counts.iter().sum::<u32>());
            for (i, d) in drivers.iter().enumerate() {
                prop_assert_eq!(power.driver_count(*d), counts[i]);
            }
        }
    }

    #[test]
    fn level_triggered_drive_never_climbs(levels in proptest::collection::vec(any::<bool>(), 1..30)) {
        let mut c = Circuit::new();
        let (_bus, point) = grounded_pin(&mut c);
        for on in levels {
            c.set_power_state(point, on).unwrap();
            c.set_power_state(point, on).unwrap();
            c.tick();
            prop_assert_eq!(c.power_manager().driver_count(point.into()), u32::from(on));
            prop_assert_eq!(c.reads_power(point).unwrap(), on);
        }
    }
}
