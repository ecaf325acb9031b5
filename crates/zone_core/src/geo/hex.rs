//! Axial hex coordinates and compass-sector directions

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Mul};

/// Axial hex coordinate. Unique key of a live zone in the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct AxialCoord {
    pub q: i32,
    pub r: i32,
}

impl AxialCoord {
    pub const ORIGIN: AxialCoord = AxialCoord { q: 0, r: 0 };

    pub const fn new(q: i32, r: i32) -> Self {
        Self { q, r }
    }

    /// Neighbouring cell in `direction`
    pub fn step(self, direction: HexDirection) -> Self {
        self + direction.offset()
    }

    /// The six adjacent cells, in `HexDirection::ALL` order
    pub fn neighbors(self) -> [AxialCoord; 6] {
        HexDirection::ALL.map(|d| self.step(d))
    }
}

impl fmt::Display for AxialCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.q, self.r)
    }
}

impl Add for AxialCoord {
    type Output = AxialCoord;

    fn add(self, rhs: AxialCoord) -> AxialCoord {
        AxialCoord::new(self.q + rhs.q, self.r + rhs.r)
    }
}

impl Mul<i32> for AxialCoord {
    type Output = AxialCoord;

    fn mul(self, steps: i32) -> AxialCoord {
        AxialCoord::new(self.q * steps, self.r * steps)
    }
}

/// Number of hex steps between two cells
pub fn hex_distance(a: AxialCoord, b: AxialCoord) -> i32 {
    let dq = a.q - b.q;
    let dr = a.r - b.r;
    (dq.abs() + (dq + dr).abs() + dr.abs()) / 2
}

/// One of the six axial unit vectors, named after the compass sector that
/// selects it.
///
/// The circle is cut into 60° sectors starting at 30°. Each sector includes
/// its lower bound and excludes its upper bound:
///
/// | bearing       | direction   | offset   |
/// |---------------|-------------|----------|
/// | [30, 90)      | NorthEast   | (1, 0)   |
/// | [90, 150)     | SouthEast   | (0, 1)   |
/// | [150, 210)    | South       | (-1, 1)  |
/// | [210, 270)    | SouthWest   | (-1, 0)  |
/// | [270, 330)    | NorthWest   | (0, -1)  |
/// | [330, 30)     | North       | (1, -1)  |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HexDirection {
    NorthEast,
    SouthEast,
    South,
    SouthWest,
    NorthWest,
    North,
}

impl HexDirection {
    pub const ALL: [HexDirection; 6] = [
        HexDirection::NorthEast,
        HexDirection::SouthEast,
        HexDirection::South,
        HexDirection::SouthWest,
        HexDirection::NorthWest,
        HexDirection::North,
    ];

    pub const fn offset(self) -> AxialCoord {
        match self {
            HexDirection::NorthEast => AxialCoord::new(1, 0),
            HexDirection::SouthEast => AxialCoord::new(0, 1),
            HexDirection::South => AxialCoord::new(-1, 1),
            HexDirection::SouthWest => AxialCoord::new(-1, 0),
            HexDirection::NorthWest => AxialCoord::new(0, -1),
            HexDirection::North => AxialCoord::new(1, -1),
        }
    }
}

const SECTOR_START_DEG: f64 = 30.0;
const SECTOR_WIDTH_DEG: f64 = 60.0;

/// Map a compass bearing onto a hex direction (lower sector bound inclusive).
///
/// Bearings outside `[0, 360)` are wrapped first; a non-finite bearing maps
/// like 0°.
pub fn bearing_to_hex_direction(bearing_deg: f64) -> HexDirection {
    let bearing = if bearing_deg.is_finite() { bearing_deg } else { 0.0 };
    let shifted = (bearing - SECTOR_START_DEG).rem_euclid(360.0);
    let sector = ((shifted / SECTOR_WIDTH_DEG).floor() as usize).min(5);
    HexDirection::ALL[sector]
}
