//! Axial hex geometry.
//!
//! Flat-topped hexes in axial coordinates `(q, r)`. Directions run
//! clockwise from north: N=0, NE=1, SE=2, S=3, SW=4, NW=5.
//!
//! All functions here are pure. Line interpolation uses fixed-point math so
//! results never depend on the platform's float behavior.

use fixed::types::I32F32;
use serde::{Deserialize, Serialize};

/// Axial hex coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct HexCoordinate {
    /// Column axis.
    pub q: i32,
    /// Diagonal row axis.
    pub r: i32,
}

impl HexCoordinate {
    /// Create a coordinate.
    #[must_use]
    pub const fn new(q: i32, r: i32) -> Self {
        Self { q, r }
    }

    /// Implicit third cube coordinate.
    #[must_use]
    pub const fn s(self) -> i32 {
        -self.q - self.r
    }

    /// Hex distance: `max(|dq|, |dr|, |dq + dr|)`.
    #[must_use]
    pub fn distance(self, other: Self) -> u32 {
        let dq = self.q - other.q;
        let dr = self.r - other.r;
        dq.unsigned_abs()
            .max(dr.unsigned_abs())
            .max((dq + dr).unsigned_abs())
    }

    /// Adjacent hex in a direction.
    #[must_use]
    pub const fn neighbor(self, direction: HexDirection) -> Self {
        let (dq, dr) = direction.offset();
        Self::new(self.q + dq, self.r + dr)
    }

    /// All six neighbors in direction order N, NE, SE, S, SW, NW.
    #[must_use]
    pub fn neighbors(self) -> [Self; 6] {
        HexDirection::ALL.map(|direction| self.neighbor(direction))
    }

    /// Direction of an adjacent hex, if `other` is adjacent.
    #[must_use]
    pub fn direction_to_neighbor(self, other: Self) -> Option<HexDirection> {
        HexDirection::ALL
            .into_iter()
            .find(|&direction| self.neighbor(direction) == other)
    }

    /// Bearing from `self` towards `other`, bucketed to one of six directions.
    ///
    /// Uses the cube dot product against each direction vector. Exact ties
    /// resolve to the lower direction index. Returns `None` for the same hex.
    #[must_use]
    pub fn bearing_to(self, other: Self) -> Option<HexDirection> {
        if self == other {
            return None;
        }
        let delta = [other.q - self.q, other.r - self.r, other.s() - self.s()];
        let mut best: Option<(HexDirection, i32)> = None;
        for direction in HexDirection::ALL {
            let v = direction.cube();
            let dot = delta[0] * v[0] + delta[1] * v[1] + delta[2] * v[2];
            // Strictly greater keeps the lower index on ties
            if best.map_or(true, |(_, best_dot)| dot > best_dot) {
                best = Some((direction, dot));
            }
        }
        best.map(|(direction, _)| direction)
    }

    /// Hexes on the straight line from `self` to `other`, both ends included.
    #[must_use]
    pub fn line_to(self, other: Self) -> Vec<Self> {
        let n = self.distance(other);
        if n == 0 {
            return vec![self];
        }
        // Nudge keeps points off exact hex edges so rounding is stable
        let nudge_q = I32F32::from_num(1) / 1_000_000;
        let nudge_r = I32F32::from_num(2) / 1_000_000;
        let nudge_s = -(nudge_q + nudge_r);

        let (aq, ar, as_) = (
            I32F32::from_num(self.q) + nudge_q,
            I32F32::from_num(self.r) + nudge_r,
            I32F32::from_num(self.s()) + nudge_s,
        );
        let (bq, br, bs) = (
            I32F32::from_num(other.q) + nudge_q,
            I32F32::from_num(other.r) + nudge_r,
            I32F32::from_num(other.s()) + nudge_s,
        );
        let steps = I32F32::from_num(n);

        (0..=n)
            .map(|i| {
                let t = I32F32::from_num(i) / steps;
                cube_round(
                    aq + (bq - aq) * t,
                    ar + (br - ar) * t,
                    as_ + (bs - as_) * t,
                )
            })
            .collect()
    }

    /// Every hex within `radius` of `self`, in (q, r) order.
    #[must_use]
    pub fn hexes_in_range(self, radius: u32) -> Vec<Self> {
        let radius = radius as i32;
        let mut result = Vec::new();
        for dq in -radius..=radius {
            let lo = (-radius).max(-dq - radius);
            let hi = radius.min(-dq + radius);
            for dr in lo..=hi {
                result.push(Self::new(self.q + dq, self.r + dr));
            }
        }
        result
    }
}

fn cube_round(q: I32F32, r: I32F32, s: I32F32) -> HexCoordinate {
    let mut rq = q.round();
    let mut rr = r.round();
    let rs = s.round();

    let dq = (rq - q).abs();
    let dr = (rr - r).abs();
    let ds = (rs - s).abs();

    if dq > dr && dq > ds {
        rq = -rr - rs;
    } else if dr > ds {
        rr = -rq - rs;
    }
    HexCoordinate::new(rq.to_num::<i32>(), rr.to_num::<i32>())
}

/// One of the six hex directions, also used as a unit facing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum HexDirection {
    /// 0
    #[default]
    North,
    /// 1
    NorthEast,
    /// 2
    SouthEast,
    /// 3
    South,
    /// 4
    SouthWest,
    /// 5
    NorthWest,
}

impl HexDirection {
    /// All directions in index order.
    pub const ALL: [Self; 6] = [
        Self::North,
        Self::NorthEast,
        Self::SouthEast,
        Self::South,
        Self::SouthWest,
        Self::NorthWest,
    ];

    /// Index 0..=5.
    #[must_use]
    pub const fn index(self) -> u8 {
        self as u8
    }

    /// Direction from any integer index, wrapping modulo 6.
    #[must_use]
    pub const fn from_index(index: i32) -> Self {
        Self::ALL[index.rem_euclid(6) as usize]
    }

    /// Rotate clockwise by `steps` (negative rotates counter-clockwise).
    #[must_use]
    pub const fn rotate(self, steps: i32) -> Self {
        Self::from_index(self.index() as i32 + steps)
    }

    /// Opposite direction.
    #[must_use]
    pub const fn opposite(self) -> Self {
        self.rotate(3)
    }

    /// Axial offset of the adjacent hex.
    #[must_use]
    pub const fn offset(self) -> (i32, i32) {
        match self {
            Self::North => (0, -1),
            Self::NorthEast => (1, -1),
            Self::SouthEast => (1, 0),
            Self::South => (0, 1),
            Self::SouthWest => (-1, 1),
            Self::NorthWest => (-1, 0),
        }
    }

    /// Cube vector `(q, r, s)`.
    #[must_use]
    pub const fn cube(self) -> [i32; 3] {
        let (q, r) = self.offset();
        [q, r, -q - r]
    }
}

/// Firing/attack arc relative to a facing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Arc {
    /// Facing and the two adjacent directions.
    Front,
    /// Rear-left direction.
    Left,
    /// Rear-right direction.
    Right,
    /// Directly behind.
    Rear,
}

impl Arc {
    /// Arc that contains `direction` for a unit facing `facing`.
    ///
    /// Relative index `(d - F) mod 6`: {0, 1, 5} front, 2 right, 3 rear, 4 left.
    #[must_use]
    pub const fn of_direction(facing: HexDirection, direction: HexDirection) -> Self {
        match (direction.index() as i32 - facing.index() as i32).rem_euclid(6) {
            0 | 1 | 5 => Self::Front,
            2 => Self::Right,
            3 => Self::Rear,
            _ => Self::Left,
        }
    }

    /// Directions belonging to this arc for `facing`.
    #[must_use]
    pub fn directions(self, facing: HexDirection) -> Vec<HexDirection> {
        HexDirection::ALL
            .into_iter()
            .filter(|&d| Self::of_direction(facing, d) == self)
            .collect()
    }
}

/// Front arc directions: `{F-1, F, F+1}`.
#[must_use]
pub fn front_arc(facing: HexDirection) -> Vec<HexDirection> {
    Arc::Front.directions(facing)
}

/// Left arc directions: `{F+4}`.
#[must_use]
pub fn left_arc(facing: HexDirection) -> Vec<HexDirection> {
    Arc::Left.directions(facing)
}

/// Right arc directions: `{F+2}`.
#[must_use]
pub fn right_arc(facing: HexDirection) -> Vec<HexDirection> {
    Arc::Right.directions(facing)
}

/// Rear arc directions: `{F+3}` (equal to `F-3`).
#[must_use]
pub fn rear_arc(facing: HexDirection) -> Vec<HexDirection> {
    Arc::Rear.directions(facing)
}

/// Arc of `target` as seen from a unit at `origin` facing `facing`.
///
/// A target in the same hex counts as front.
#[must_use]
pub fn arc_of_target(origin: HexCoordinate, facing: HexDirection, target: HexCoordinate) -> Arc {
    origin
        .bearing_to(target)
        .map_or(Arc::Front, |bearing| Arc::of_direction(facing, bearing))
}

/// Range bracket for an attack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RangeBracket {
    /// 1-3 hexes.
    Short,
    /// 4-6 hexes.
    Medium,
    /// 7-15 hexes.
    Long,
    /// 16+ hexes.
    Extreme,
    /// Beyond the weapon's maximum range.
    OutOfRange,
}

impl RangeBracket {
    /// To-hit modifier, `None` when out of range.
    #[must_use]
    pub const fn modifier(self) -> Option<i32> {
        match self {
            Self::Short => Some(0),
            Self::Medium => Some(2),
            Self::Long => Some(4),
            Self::Extreme => Some(6),
            Self::OutOfRange => None,
        }
    }
}

/// Weapon range profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct RangeProfile {
    /// Minimum range; at or inside it a penalty applies (0 = none).
    pub minimum: u32,
    /// Maximum range in hexes.
    pub maximum: u32,
}

impl RangeProfile {
    /// Create a range profile.
    #[must_use]
    pub const fn new(minimum: u32, maximum: u32) -> Self {
        Self { minimum, maximum }
    }

    /// Minimum-range penalty: `minimum - distance + 1` inside minimum range.
    #[must_use]
    pub const fn minimum_range_penalty(&self, distance: u32) -> u32 {
        if self.minimum > 0 && distance <= self.minimum {
            self.minimum - distance + 1
        } else {
            0
        }
    }
}

/// Bracket `distance` with the fixed cutoffs, bounded by the weapon maximum.
#[must_use]
pub const fn range_bracket(distance: u32, profile: &RangeProfile) -> RangeBracket {
    if distance == 0 || distance > profile.maximum {
        return RangeBracket::OutOfRange;
    }
    match distance {
        1..=3 => RangeBracket::Short,
        4..=6 => RangeBracket::Medium,
        7..=15 => RangeBracket::Long,
        _ => RangeBracket::Extreme,
    }
}

/// Rectangular map dimensions in odd-q offset terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MapConfig {
    /// Number of columns.
    pub width: u32,
    /// Number of rows.
    pub height: u32,
}

impl MapConfig {
    /// Create a map configuration.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Convert an axial hex to its odd-q `(column, row)`.
    #[must_use]
    pub const fn to_offset(hex: HexCoordinate) -> (i32, i32) {
        let col = hex.q;
        let row = hex.r + (hex.q - (hex.q & 1)) / 2;
        (col, row)
    }

    /// Convert an odd-q `(column, row)` to axial.
    #[must_use]
    pub const fn from_offset(col: i32, row: i32) -> HexCoordinate {
        HexCoordinate::new(col, row - (col - (col & 1)) / 2)
    }

    /// Whether `hex` lies on the map.
    #[must_use]
    pub const fn is_in_bounds(&self, hex: HexCoordinate) -> bool {
        let (col, row) = Self::to_offset(hex);
        col >= 0 && row >= 0 && (col as u32) < self.width && (row as u32) < self.height
    }

    /// Every hex on the map, column by column.
    #[must_use]
    pub fn all_hexes(&self) -> Vec<HexCoordinate> {
        let mut hexes = Vec::with_capacity((self.width * self.height) as usize);
        for col in 0..self.width as i32 {
            for row in 0..self.height as i32 {
                hexes.push(Self::from_offset(col, row));
            }
        }
        hexes
    }
}

/// Whether `hex` lies on the map described by `config`.
#[must_use]
pub const fn is_in_bounds(hex: HexCoordinate, config: &MapConfig) -> bool {
    config.is_in_bounds(hex)
}
