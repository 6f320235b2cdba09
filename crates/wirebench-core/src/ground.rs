//! Ground reachability over the bridge graph.
//!
//! A bus only reads as powered through an element pin when it can reach a
//! ground reference. Ground is registered per segment; reachability is a
//! breadth-first search from every ground segment across bridges.
//!
//! The reachable set is cached against the registry's topology generation
//! and the local registration version. A stale cache is never consulted:
//! queries against a changed topology fall back to a fresh search until
//! [`GroundReachability::refresh`] rebuilds the cache.

use std::collections::{BTreeSet, VecDeque};

use crate::bus::BusRegistry;
use crate::error::CircuitError;
use crate::id::BusId;

#[derive(Debug, Clone)]
struct GroundCache {
    generation: u64,
    version: u64,
    reachable: BTreeSet<BusId>,
}

/// Tracks ground segments and answers `is_grounded` queries.
#[derive(Debug, Default)]
pub struct GroundReachability {
    grounds: BTreeSet<BusId>,
    /// Bumped on every registration change.
    version: u64,
    cache: Option<GroundCache>,
}

impl GroundReachability {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a segment as a ground reference.
    pub fn register_ground(&mut self, registry: &BusRegistry, bus: BusId) -> Result<(), CircuitError> {
        registry.resolve(bus)?;
        if self.grounds.insert(bus) {
            self.version += 1;
        }
        Ok(())
    }

    /// Remove a ground registration. Unregistered segments are ignored.
    pub fn unregister_ground(&mut self, bus: BusId) {
        if self.grounds.remove(&bus) {
            self.version += 1;
        }
    }

    /// Registered ground segments.
    pub fn grounds(&self) -> &BTreeSet<BusId> {
        &self.grounds
    }

    /// Whether the bus can reach any ground segment through bridges.
    pub fn is_grounded(&self, registry: &BusRegistry, bus: BusId) -> Result<bool, CircuitError> {
        registry.resolve(bus)?;
        match &self.cache {
            Some(cache) if self.is_fresh(cache, registry) => Ok(cache.reachable.contains(&bus)),
            _ => Ok(self.search(registry).contains(&bus)),
        }
    }

    /// Recompute the cached reachable set if the topology or the ground
    /// registrations moved since the last refresh.
    pub fn refresh(&mut self, registry: &BusRegistry) {
        if let Some(cache) = &self.cache {
            if self.is_fresh(cache, registry) {
                return;
            }
        }
        let reachable = self.search(registry);
        tracing::trace!(grounded = reachable.len(), "ground reachability refreshed");
        self.cache = Some(GroundCache {
            generation: registry.generation(),
            version: self.version,
            reachable,
        });
    }

    fn is_fresh(&self, cache: &GroundCache, registry: &BusRegistry) -> bool {
        cache.generation == registry.generation() && cache.version == self.version
    }

    /// Every segment reachable from a live ground segment.
    fn search(&self, registry: &BusRegistry) -> BTreeSet<BusId> {
        let graph = registry.bridge_graph();
        let mut reachable = BTreeSet::new();
        let mut queue: VecDeque<BusId> = self
            .grounds
            .iter()
            .copied()
            .filter(|g| registry.contains_bus(*g))
            .collect();
        while let Some(seg) = queue.pop_front() {
            if !reachable.insert(seg) {
                continue;
            }
            if let Some(next) = graph.get(&seg) {
                queue.extend(next.iter().copied().filter(|n| !reachable.contains(n)));
            }
        }
        reachable
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ground_bus_is_grounded() {
        let mut reg = BusRegistry::new();
        let mut ground = GroundReachability::new();
        let g = reg.create_bus();
        let other = reg.create_bus();
        ground.register_ground(&reg, g).unwrap();

        assert!(ground.is_grounded(&reg, g).unwrap());
        assert!(!ground.is_grounded(&reg, other).unwrap());
    }

    #[test]
    fn transitive_bridge_reaches_ground() {
        let mut reg = BusRegistry::new();
        let mut ground = GroundReachability::new();
        let a = reg.create_bus();
        let b = reg.create_bus();
        let c = reg.create_bus();
        reg.add_bridge(a, b).unwrap();
        reg.add_bridge(b, c).unwrap();
        ground.register_ground(&reg, c).unwrap();
        ground.refresh(&reg);

        assert!(ground.is_grounded(&reg, a).unwrap());

        reg.remove_bridge(a, b).unwrap();
        // Cache is stale now; the query must not return the old answer.
        assert!(!ground.is_grounded(&reg, a).unwrap());
        assert!(ground.is_grounded(&reg, b).unwrap());

        ground.refresh(&reg);
        assert!(!ground.is_grounded(&reg, a).unwrap());
        assert!(ground.is_grounded(&reg, c).unwrap());
    }

    #[test]
    fn unregister_drops_reachability() {
        let mut reg = BusRegistry::new();
        let mut ground = GroundReachability::new();
        let g = reg.create_bus();
        ground.register_ground(&reg, g).unwrap();
        ground.refresh(&reg);
        ground.unregister_ground(g);
        assert!(!ground.is_grounded(&reg, g).unwrap());
    }

    #[test]
    fn destroyed_ground_segment_is_ignored() {
        let mut reg = BusRegistry::new();
        let mut ground = GroundReachability::new();
        let g = reg.create_bus();
        let a = reg.create_bus();
        reg.add_bridge(a, g).unwrap();
        ground.register_ground(&reg, g).unwrap();
        reg.destroy_bus(g).unwrap();

        assert!(!ground.is_grounded(&reg, a).unwrap());
        assert!(ground.is_grounded(&reg, g).is_err());
    }

    #[test]
    fn register_unknown_bus_fails() {
        let mut reg = BusRegistry::new();
        let mut ground = GroundReachability::new();
        let g = reg.create_bus();
        reg.destroy_bus(g).unwrap();
        assert_eq!(
            ground.register_ground(&reg, g),
            Err(CircuitError::UnknownBus(g))
        );
    }
}
