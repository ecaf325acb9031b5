//! Hex grid index
//!
//! Two synchronized maps (id → zone, coord → id) plus insertion order, so
//! nearest-zone queries break distance ties by whichever zone was indexed
//! first. Zones created during an unfinished batch carry a pending tag until
//! the store confirms them; lookups see pending and committed zones alike.

use std::collections::{HashMap, HashSet};

use crate::error::{CoreError, Result};
use crate::geo::{haversine_km, AxialCoord};
use crate::models::{Zone, ZoneId};

#[derive(Debug, Clone, Default)]
pub struct HexGridIndex {
    zones: HashMap<ZoneId, Zone>,
    by_coord: HashMap<AxialCoord, ZoneId>,
    order: Vec<ZoneId>,
    pending: HashSet<ZoneId>,
}

impl HexGridIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an index from persisted zones, rejecting duplicate coordinates
    pub fn from_zones(zones: impl IntoIterator<Item = Zone>) -> Result<Self> {
        let mut index = Self::new();
        for zone in zones {
            index.upsert(zone)?;
        }
        Ok(index)
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    pub fn get(&self, id: &ZoneId) -> Option<&Zone> {
        self.zones.get(id)
    }

    pub fn contains(&self, id: &ZoneId) -> bool {
        self.zones.contains_key(id)
    }

    pub fn occupant(&self, coord: AxialCoord) -> Option<&ZoneId> {
        self.by_coord.get(&coord)
    }

    pub fn is_occupied(&self, coord: AxialCoord) -> bool {
        self.by_coord.contains_key(&coord)
    }

    /// Zones in insertion order
    pub fn zones(&self) -> impl Iterator<Item = &Zone> {
        self.order.iter().filter_map(|id| self.zones.get(id))
    }

    pub fn to_vec(&self) -> Vec<Zone> {
        self.zones().cloned().collect()
    }

    /// Closest zone by origin distance, if within `within_km`
    pub fn nearest(&self, lat: f64, lng: f64, within_km: f64) -> Option<&Zone> {
        self.nearest_matching(lat, lng, |_| true)
            .filter(|(_, distance)| *distance <= within_km)
            .map(|(zone, _)| zone)
    }

    /// Closest zone satisfying `predicate`, with its distance in km.
    ///
    /// Ties go to the earliest inserted zone.
    pub fn nearest_matching<F>(&self, lat: f64, lng: f64, predicate: F) -> Option<(&Zone, f64)>
    where
        F: Fn(&Zone) -> bool,
    {
        let mut best: Option<(&Zone, f64)> = None;
        for zone in self.zones().filter(|z| predicate(z)) {
            let distance = haversine_km(lat, lng, zone.geo.lat, zone.geo.lng);
            match best {
                Some((_, best_distance)) if distance >= best_distance => {}
                _ => best = Some((zone, distance)),
            }
        }
        best
    }

    /// Insert or replace a zone. Fails without touching the index when the
    /// zone's coordinate belongs to a different zone.
    pub fn upsert(&mut self, zone: Zone) -> Result<Option<Zone>> {
        if let Some(occupant) = self.by_coord.get(&zone.coord) {
            if *occupant != zone.id {
                return Err(CoreError::CoordinateCollision {
                    coord: zone.coord,
                    occupant: occupant.clone(),
                });
            }
        }

        let id = zone.id.clone();
        let coord = zone.coord;
        let previous = self.zones.insert(id.clone(), zone);
        match &previous {
            Some(old) if old.coord != coord => {
                self.by_coord.remove(&old.coord);
            }
            Some(_) => {}
            None => self.order.push(id.clone()),
        }
        self.by_coord.insert(coord, id);
        Ok(previous)
    }

    /// Move a zone to a free cell, returning its previous coordinate.
    pub fn move_zone(&mut self, id: &ZoneId, to: AxialCoord) -> Result<AxialCoord> {
        let from = self
            .zones
            .get(id)
            .map(|z| z.coord)
            .ok_or_else(|| CoreError::NotFound(format!("Zone not found: {}", id)))?;

        if from == to {
            return Ok(from);
        }
        if let Some(occupant) = self.by_coord.get(&to) {
            return Err(CoreError::CoordinateCollision { coord: to, occupant: occupant.clone() });
        }

        self.by_coord.remove(&from);
        self.by_coord.insert(to, id.clone());
        if let Some(zone) = self.zones.get_mut(id) {
            zone.coord = to;
        }
        Ok(from)
    }

    /// Drop a zone entirely. Zones are never deleted in play; this only
    /// undoes a session-local creation.
    pub fn remove(&mut self, id: &ZoneId) -> Option<Zone> {
        let zone = self.zones.remove(id)?;
        self.by_coord.remove(&zone.coord);
        self.order.retain(|existing| existing != id);
        self.pending.remove(id);
        Some(zone)
    }

    pub fn mark_pending(&mut self, id: &ZoneId) {
        if self.zones.contains_key(id) {
            self.pending.insert(id.clone());
        }
    }

    pub fn is_pending(&self, id: &ZoneId) -> bool {
        self.pending.contains(id)
    }

    /// Pending zones in insertion order
    pub fn pending_ids(&self) -> Vec<ZoneId> {
        self.order.iter().filter(|id| self.pending.contains(*id)).cloned().collect()
    }

    /// Clear the pending tag once the store has the zone
    pub fn commit(&mut self, id: &ZoneId) -> bool {
        self.pending.remove(id)
    }

    /// Verify both maps describe the same set of zones
    pub fn check_consistency(&self) -> Result<()> {
        if self.zones.len() != self.by_coord.len() || self.zones.len() != self.order.len() {
            return Err(CoreError::InvalidState(format!(
                "grid maps out of sync: {} zones, {} coords, {} ordered",
                self.zones.len(),
                self.by_coord.len(),
                self.order.len()
            )));
        }
        for (coord, id) in &self.by_coord {
            match self.zones.get(id) {
                Some(zone) if zone.coord == *coord => {}
                _ => {
                    return Err(CoreError::InvalidState(format!(
                        "coord {} maps to zone {} which is elsewhere",
                        coord, id
                    )))
                }
            }
        }
        Ok(())
    }
}
