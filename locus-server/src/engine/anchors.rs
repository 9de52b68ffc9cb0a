//! Anchor (beacon) registry
//!
//! Holds the last declared position, zone and freshness of every beacon that
//! has reported. Iteration order is registration order; re-registering a
//! beacon keeps its original slot.

use std::collections::HashMap;

use locus_common::{Error, Result};

/// Last known state of a beacon
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Anchor {
    pub id: String,
    pub zone: String,
    pub x: i64,
    pub y: i64,
    /// Epoch seconds
    pub last_seen: i64,
}

/// Registry of known beacons
#[derive(Debug, Default)]
pub struct AnchorRegistry {
    anchors: Vec<Anchor>,
    index: HashMap<String, usize>,
}

impl AnchorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a registry from persisted anchors, keeping their order
    pub fn from_anchors(anchors: impl IntoIterator<Item = Anchor>) -> Self {
        let mut registry = Self::new();
        for anchor in anchors {
            registry.upsert(anchor);
        }
        registry
    }

    /// Insert or overwrite a beacon (last write wins)
    pub fn update(&mut self, id: &str, zone: &str, x: i64, y: i64, last_seen: i64) -> Result<&Anchor> {
        if id.is_empty() {
            return Err(Error::InvalidInput("beacon id must not be empty".to_string()));
        }

        let slot = self.upsert(Anchor {
            id: id.to_string(),
            zone: zone.to_string(),
            x,
            y,
            last_seen,
        });
        Ok(&self.anchors[slot])
    }

    fn upsert(&mut self, anchor: Anchor) -> usize {
        match self.index.get(&anchor.id) {
            Some(&slot) => {
                self.anchors[slot] = anchor;
                slot
            }
            None => {
                let slot = self.anchors.len();
                self.index.insert(anchor.id.clone(), slot);
                self.anchors.push(anchor);
                slot
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<&Anchor> {
        self.index.get(id).map(|&slot| &self.anchors[slot])
    }

    /// Copy of every anchor in registration order
    pub fn all(&self) -> Vec<Anchor> {
        self.anchors.clone()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Anchor> {
        self.anchors.iter()
    }

    pub fn len(&self) -> usize {
        self.anchors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }

    /// Anchor nearest to `(x, y)` by Euclidean distance
    ///
    /// The first anchor in registration order wins exact ties. Squared
    /// integer distances are compared, so ties are exact below `u128::MAX`.
    pub fn closest_to(&self, x: i64, y: i64) -> Option<&Anchor> {
        let mut closest: Option<(&Anchor, u128)> = None;
        for anchor in &self.anchors {
            let dx = (anchor.x as i128 - x as i128).unsigned_abs();
            let dy = (anchor.y as i128 - y as i128).unsigned_abs();
            // Each square fits in u128; only the sum can saturate
            let distance_sq = (dx * dx).saturating_add(dy * dy);
            match closest {
                Some((_, best)) if distance_sq >= best => {}
                _ => closest = Some((anchor, distance_sq)),
            }
        }
        closest.map(|(anchor, _)| anchor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry_with(anchors: &[(&str, &str, i64, i64)]) -> AnchorRegistry {
        let mut registry = AnchorRegistry::new();
        for (id, zone, x, y) in anchors {
            registry.update(id, zone, *x, *y, 100).unwrap();
        }
        registry
    }

    #[test]
    fn test_update_inserts_then_overwrites() {
        let mut registry = AnchorRegistry::new();
        registry.update("b1", "lobby", 0, 0, 100).unwrap();
        registry.update("b1", "kitchen", 4, 5, 200).unwrap();

        assert_eq!(registry.len(), 1);
        let anchor = registry.get("b1").unwrap();
        assert_eq!(anchor.zone, "kitchen");
        assert_eq!((anchor.x, anchor.y), (4, 5));
        assert_eq!(anchor.last_seen, 200);
    }

    #[test]
    fn test_empty_id_rejected() {
        let mut registry = AnchorRegistry::new();
        assert!(matches!(registry.update("", "z", 0, 0, 0), Err(Error::InvalidInput(_))));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_overwrite_keeps_registration_order() {
        let mut registry = registry_with(&[("a", "za", 0, 0), ("b", "zb", 1, 1), ("c", "zc", 2, 2)]);
        registry.update("a", "za2", 9, 9, 300).unwrap();

        let ids: Vec<String> = registry.iter().map(|a| a.id.clone()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_all_is_a_snapshot() {
        let mut registry = registry_with(&[("a", "za", 0, 0)]);
        let snapshot = registry.all();

        registry.update("a", "moved", 5, 5, 500).unwrap();
        registry.update("b", "zb", 1, 1, 500).unwrap();

        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].zone, "za");
    }

    #[test]
    fn test_closest_to_empty_registry() {
        assert!(AnchorRegistry::new().closest_to(0, 0).is_none());
    }

    #[test]
    fn test_closest_to_picks_nearest() {
        let registry = registry_with(&[("a", "za", 0, 0), ("b", "zb", 10, 0), ("c", "zc", 0, 10)]);
        assert_eq!(registry.closest_to(8, 1).unwrap().id, "b");
        assert_eq!(registry.closest_to(1, 7).unwrap().id, "c");
        assert_eq!(registry.closest_to(-3, -3).unwrap().id, "a");
    }

    #[test]
    fn test_closest_to_tie_first_registered_wins() {
        // (5, 5) is equidistant from all three
        let registry = registry_with(&[("b", "zb", 10, 0), ("a", "za", 0, 0), ("c", "zc", 0, 10)]);
        assert_eq!(registry.closest_to(5, 5).unwrap().id, "b");

        let registry = registry_with(&[("c", "zc", 0, 10), ("b", "zb", 10, 0), ("a", "za", 0, 0)]);
        assert_eq!(registry.closest_to(5, 5).unwrap().id, "c");
    }

    #[test]
    fn test_closest_to_extreme_coordinates() {
        let registry = registry_with(&[("far", "edge", i64::MAX, i64::MAX), ("near", "home", -2, -2)]);
        assert_eq!(registry.closest_to(-1, -1).unwrap().id, "near");
        assert_eq!(registry.closest_to(i64::MIN, i64::MIN).unwrap().id, "near");
        assert_eq!(registry.closest_to(i64::MAX, 0).unwrap().id, "far");
    }

    #[test]
    fn test_from_anchors_keeps_order() {
        let anchors = vec![
            Anchor { id: "z".into(), zone: "1".into(), x: 0, y: 0, last_seen: 1 },
            Anchor { id: "a".into(), zone: "2".into(), x: 0, y: 0, last_seen: 2 },
        ];
        let registry = AnchorRegistry::from_anchors(anchors);
        assert_eq!(registry.closest_to(0, 0).unwrap().id, "z");
    }
}
