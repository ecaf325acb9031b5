//! Anchor-and-push zone placement
//!
//! A new zone is placed next to the geographically nearest existing zone
//! (preferring one with the same group key), offset in the hex direction of
//! the compass bearing between them. If that cell is taken, the occupant and
//! every zone behind it on the same ray are pushed one step outward. The
//! chain is collected first and then moved from the far end back, so no two
//! zones ever share a cell, even transiently.

use serde::{Deserialize, Serialize};

use crate::config::DiscoveryConfig;
use crate::error::{CoreError, Result};
use crate::geo::{bearing_deg, bearing_to_hex_direction, AxialCoord, HexDirection};
use crate::grid::HexGridIndex;
use crate::models::{GeoPoint, Zone, ZoneId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnchorKind {
    /// Nearest zone sharing the group key
    SameGroup,
    /// No zone shares the key; nearest zone of any group
    OtherGroup,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anchor {
    pub zone_id: ZoneId,
    pub coord: AxialCoord,
    pub kind: AnchorKind,
    pub bearing_deg: f64,
    pub direction: HexDirection,
    /// Hex steps between anchor and target cell
    pub buffer: i32,
}

/// A zone pushed out of the way, with its coordinate before the push
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Displacement {
    pub zone: Zone,
    pub from: AxialCoord,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacementResult {
    /// Free cell for the new zone
    pub coord: AxialCoord,
    /// `None` when the grid was empty and the zone lands on the origin
    pub anchor: Option<Anchor>,
    /// In move order: farthest zone of the chain first
    pub displaced: Vec<Displacement>,
}

#[derive(Debug, Clone, Default)]
pub struct ZonePlacementResolver {
    config: DiscoveryConfig,
}

impl ZonePlacementResolver {
    pub fn new(config: DiscoveryConfig) -> Self {
        Self { config }
    }

    /// Pick the anchor and the cell a new zone at `target` should take,
    /// without touching the grid.
    pub fn plan(&self, target: GeoPoint, group_key: &str, grid: &HexGridIndex) -> Option<Anchor> {
        let (anchor, kind, buffer) = match grid
            .nearest_matching(target.lat, target.lng, |z| z.group_key == group_key)
        {
            Some((zone, _)) => (zone, AnchorKind::SameGroup, self.config.same_group_buffer),
            None => {
                let (zone, _) = grid.nearest_matching(target.lat, target.lng, |_| true)?;
                (zone, AnchorKind::OtherGroup, self.config.foreign_group_buffer)
            }
        };

        let bearing = bearing_deg(anchor.geo, target);
        let direction = bearing_to_hex_direction(bearing);

        Some(Anchor {
            zone_id: anchor.id.clone(),
            coord: anchor.coord,
            kind,
            bearing_deg: bearing,
            direction,
            buffer,
        })
    }

    /// Free a cell for a zone at `target`, displacing existing zones as
    /// needed. The returned coordinate is unoccupied when this returns.
    pub fn resolve(
        &self,
        target: GeoPoint,
        group_key: &str,
        grid: &mut HexGridIndex,
    ) -> Result<PlacementResult> {
        let Some(anchor) = self.plan(target, group_key, grid) else {
            log::debug!("Empty grid, placing first zone at origin");
            return Ok(PlacementResult {
                coord: AxialCoord::ORIGIN,
                anchor: None,
                displaced: Vec::new(),
            });
        };

        let coord = anchor.coord + anchor.direction.offset() * anchor.buffer;
        log::debug!(
            "Anchor {} at {} ({:?}), bearing {:.1}° -> {:?}, target {}",
            anchor.zone_id,
            anchor.coord,
            anchor.kind,
            anchor.bearing_deg,
            anchor.direction,
            coord
        );

        let displaced = self.push_chain(coord, anchor.direction, grid)?;
        Ok(PlacementResult { coord, anchor: Some(anchor), displaced })
    }

    /// Resolve a cell and insert `zone` into it
    pub fn place(&self, mut zone: Zone, grid: &mut HexGridIndex) -> Result<PlacementResult> {
        let placement = self.resolve(zone.geo, &zone.group_key, grid)?;
        zone.coord = placement.coord;
        grid.upsert(zone)?;
        Ok(placement)
    }

    fn push_chain(
        &self,
        start: AxialCoord,
        direction: HexDirection,
        grid: &mut HexGridIndex,
    ) -> Result<Vec<Displacement>> {
        let mut chain: Vec<(ZoneId, AxialCoord)> = Vec::new();
        let mut cursor = start;

        while let Some(occupant) = grid.occupant(cursor) {
            if chain.len() >= self.config.max_chain_depth {
                log::error!(
                    "Displacement chain from {} exceeded {} zones heading {:?}",
                    start,
                    self.config.max_chain_depth,
                    direction
                );
                return Err(CoreError::PlacementExhausted {
                    depth: self.config.max_chain_depth,
                    origin: start,
                });
            }
            chain.push((occupant.clone(), cursor));
            cursor = cursor.step(direction);
        }

        let mut displaced = Vec::with_capacity(chain.len());
        while let Some((id, from)) = chain.pop() {
            let to = from.step(direction);
            grid.move_zone(&id, to)?;
            log::debug!("Pushed zone {} from {} to {}", id, from, to);
            if let Some(zone) = grid.get(&id) {
                displaced.push(Displacement { zone: zone.clone(), from });
            }
        }
        Ok(displaced)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    fn new_zone(id: &str, group: &str, lat: f64, lng: f64) -> Zone {
        Zone::new(ZoneId::from(id), id, group, AxialCoord::ORIGIN, GeoPoint::new(lat, lng))
    }

    fn resolver() -> ZonePlacementResolver {
        ZonePlacementResolver::default()
    }

    #[test]
    fn test_first_zone_lands_on_origin() {
        let mut grid = HexGridIndex::new();
        let result = resolver().place(new_zone("z1", "IT", 45.0, 9.0), &mut grid).unwrap();

        assert_eq!(result.coord, AxialCoord::ORIGIN);
        assert!(result.anchor.is_none());
        assert!(result.displaced.is_empty());
    }

    #[test]
    fn test_discovery_scenario_with_chain_push() {
        let resolver = resolver();
        let mut grid = HexGridIndex::new();

        resolver.place(new_zone("z1", "IT", 45.0, 9.0), &mut grid).unwrap();

        // Bearing ~74° from z1: north-east sector, one step for same group
        let second = resolver.place(new_zone("z2", "IT", 45.01, 9.05), &mut grid).unwrap();
        let anchor = second.anchor.unwrap();
        assert_eq!(anchor.kind, AnchorKind::SameGroup);
        assert_eq!(anchor.direction, HexDirection::NorthEast);
        assert_eq!(second.coord, AxialCoord::new(1, 0));
        assert!(second.displaced.is_empty());

        // Closer to z1 than z2, same bearing sector: targets z2's cell
        let third = resolver.place(new_zone("z3", "IT", 45.002, 9.01), &mut grid).unwrap();
        assert_eq!(third.anchor.as_ref().unwrap().zone_id.as_str(), "z1");
        assert_eq!(third.coord, AxialCoord::new(1, 0));
        assert_eq!(third.displaced.len(), 1);
        assert_eq!(third.displaced[0].zone.id.as_str(), "z2");
        assert_eq!(third.displaced[0].from, AxialCoord::new(1, 0));
        assert_eq!(third.displaced[0].zone.coord, AxialCoord::new(2, 0));

        assert_eq!(grid.occupant(AxialCoord::new(1, 0)), Some(&ZoneId::from("z3")));
        assert_eq!(grid.occupant(AxialCoord::new(2, 0)), Some(&ZoneId::from("z2")));
        assert!(grid.check_consistency().is_ok());
    }

    #[test]
    fn test_foreign_group_uses_wide_buffer() {
        let resolver = resolver();
        let mut grid = HexGridIndex::new();
        resolver.place(new_zone("it", "IT", 45.0, 9.0), &mut grid).unwrap();

        // East-south-east of the anchor, different country
        let result = resolver.place(new_zone("si", "SI", 44.5, 13.0), &mut grid).unwrap();
        let anchor = result.anchor.unwrap();
        assert_eq!(anchor.kind, AnchorKind::OtherGroup);
        assert_eq!(anchor.direction, HexDirection::SouthEast);
        assert_eq!(result.coord, AxialCoord::new(0, 4));
    }

    #[test]
    fn test_same_group_anchor_preferred_over_closer_foreign_zone() {
        let resolver = resolver();
        let mut grid = HexGridIndex::new();
        grid.upsert(Zone::new(
            ZoneId::from("ch"),
            "ch",
            "CH",
            AxialCoord::new(10, 10),
            GeoPoint::new(45.01, 9.0),
        ))
        .unwrap();
        grid.upsert(Zone::new(
            ZoneId::from("it"),
            "it",
            "IT",
            AxialCoord::ORIGIN,
            GeoPoint::new(44.0, 9.0),
        ))
        .unwrap();

        let anchor = resolver.plan(GeoPoint::new(45.0, 9.0), "IT", &grid).unwrap();
        assert_eq!(anchor.zone_id.as_str(), "it");
        assert_eq!(anchor.buffer, 1);
    }

    #[test]
    fn test_long_chain_moves_back_to_front() {
        let resolver = resolver();
        let mut grid = HexGridIndex::new();
        grid.upsert(Zone::new(
            ZoneId::from("anchor"),
            "anchor",
            "IT",
            AxialCoord::ORIGIN,
            GeoPoint::new(45.0, 9.0),
        ))
        .unwrap();
        // A full row heading north-east, geographically far away
        for i in 1..=5 {
            grid.upsert(Zone::new(
                ZoneId::new(format!("row{}", i)),
                "row",
                "IT",
                AxialCoord::new(i, 0),
                GeoPoint::new(50.0, 20.0 + i as f64),
            ))
            .unwrap();
        }

        let result = resolver.place(new_zone("new", "IT", 45.001, 9.004), &mut grid).unwrap();
        assert_eq!(result.coord, AxialCoord::new(1, 0));
        assert_eq!(result.displaced.len(), 5);
        assert_eq!(result.displaced[0].zone.id.as_str(), "row5");
        assert_eq!(result.displaced[0].zone.coord, AxialCoord::new(6, 0));
        assert_eq!(result.displaced[4].zone.id.as_str(), "row1");
        assert_eq!(result.displaced[4].zone.coord, AxialCoord::new(2, 0));
        assert!(grid.check_consistency().is_ok());
    }

    #[test]
    fn test_chain_depth_cap_is_reported() {
        let config = DiscoveryConfig { max_chain_depth: 2, ..DiscoveryConfig::default() };
        let resolver = ZonePlacementResolver::new(config);
        let mut grid = HexGridIndex::new();
        grid.upsert(Zone::new(
            ZoneId::from("anchor"),
            "anchor",
            "IT",
            AxialCoord::ORIGIN,
            GeoPoint::new(45.0, 9.0),
        ))
        .unwrap();
        for i in 1..=3 {
            grid.upsert(Zone::new(
                ZoneId::new(format!("row{}", i)),
                "row",
                "IT",
                AxialCoord::new(i, 0),
                GeoPoint::new(50.0, 20.0 + i as f64),
            ))
            .unwrap();
        }

        let err = resolver.resolve(GeoPoint::new(45.001, 9.004), "IT", &mut grid).unwrap_err();
        assert!(err.is_invariant_violation());
        // Nothing moved
        assert_eq!(grid.occupant(AxialCoord::new(1, 0)), Some(&ZoneId::from("row1")));
        assert!(!grid.is_occupied(AxialCoord::new(4, 0)));
    }

    proptest! {
        /// Property: placements never produce a shared coordinate and always
        /// return a cell that was free once the chain settled
        #[test]
        fn prop_no_collisions_after_many_placements(
            points in prop::collection::vec(
                (44.9f64..45.1, 8.9f64..9.1, prop::bool::ANY),
                1..40,
            )
        ) {
            let resolver = ZonePlacementResolver::default();
            let mut grid = HexGridIndex::new();

            for (i, (lat, lng, foreign)) in points.into_iter().enumerate() {
                let group = if foreign { "CH" } else { "IT" };
                let before: HashSet<AxialCoord> = grid.zones().map(|z| z.coord).collect();
                let zone = Zone::new(
                    ZoneId::new(format!("z{}", i)),
                    "zone",
                    group,
                    AxialCoord::ORIGIN,
                    GeoPoint::new(lat, lng),
                );

                let result = resolver.place(zone, &mut grid).unwrap();
                let displaced_from: HashSet<AxialCoord> =
                    result.displaced.iter().map(|d| d.from).collect();
                prop_assert!(!before.contains(&result.coord) || displaced_from.contains(&result.coord));

                let coords: HashSet<AxialCoord> = grid.zones().map(|z| z.coord).collect();
                prop_assert_eq!(coords.len(), grid.len());
                prop_assert!(grid.check_consistency().is_ok());
            }
        }
    }
}
