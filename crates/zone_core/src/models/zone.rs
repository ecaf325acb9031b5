//! Zone: one ownable hex cell of real-world territory

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::gps::GeoPoint;
use crate::geo::AxialCoord;

/// Opaque, stable zone identity
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ZoneId(pub String);

impl ZoneId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Fresh random identity for a newly minted zone
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ZoneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ZoneId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

fn default_defense_level() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    pub id: ZoneId,
    /// Area name chosen when the zone was confirmed
    pub name: String,
    /// Grouping key (country code) fixed at creation. Authoritative: never
    /// re-derived from `name`.
    pub group_key: String,
    pub coord: AxialCoord,
    /// Original discovery point; never recomputed after creation
    pub geo: GeoPoint,
    #[serde(default)]
    pub owner_id: Option<String>,
    #[serde(default = "default_defense_level")]
    pub defense_level: u32,
    /// Cumulative distance logged inside this zone, credited alongside `total_km`
    #[serde(default)]
    pub record_km: f64,
    /// Cumulative distance logged inside this zone
    #[serde(default)]
    pub total_km: f64,
    /// Yield percentage
    #[serde(default)]
    pub interest_rate: f64,
    /// Accumulated, not yet distributed reward
    #[serde(default)]
    pub interest_pool: f64,
    #[serde(default)]
    pub boost_expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub shield_expires_at: Option<DateTime<Utc>>,
}

impl Zone {
    pub fn new(
        id: ZoneId,
        name: impl Into<String>,
        group_key: impl Into<String>,
        coord: AxialCoord,
        geo: GeoPoint,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            group_key: group_key.into(),
            coord,
            geo,
            owner_id: None,
            defense_level: 1,
            record_km: 0.0,
            total_km: 0.0,
            interest_rate: 0.0,
            interest_pool: 0.0,
            boost_expires_at: None,
            shield_expires_at: None,
        }
    }

    pub fn with_owner(mut self, owner_id: impl Into<String>) -> Self {
        self.owner_id = Some(owner_id.into());
        self
    }

    pub fn is_boosted(&self, now: DateTime<Utc>) -> bool {
        self.boost_expires_at.is_some_and(|expires| expires > now)
    }

    pub fn is_shielded(&self, now: DateTime<Utc>) -> bool {
        self.shield_expires_at.is_some_and(|expires| expires > now)
    }

    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.owner_id.as_deref() == Some(user_id)
    }

    /// Credit distance logged inside this zone
    pub fn log_distance(&mut self, km: f64) {
        self.total_km += km;
        self.record_km += km;
    }
}
