//! Directions, tracks and trackdirs.
//!
//! Tile edges are named after compass points: the NE edge is the low-x side,
//! SW the high-x side, NW the low-y side and SE the high-y side. A tile can
//! carry up to six track pieces: the two axis-aligned diagonals (`X`, `Y`) and
//! four corner pieces (`Upper`, `Lower`, `Left`, `Right`).
//!
//! A [`Trackdir`] is a track plus travel direction. Discriminants follow the
//! classic layout where `td ^ 8` is the reverse and values 6, 7, 14, 15 are
//! unused.

use serde::{Deserialize, Serialize};

/// Length of a diagonal (X/Y) track piece in movement units.
pub const TILE_UNITS: u16 = 16;
/// Length of a corner track piece in movement units.
pub const CORNER_UNITS: u16 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Axis {
    X,
    Y,
}

impl Axis {
    pub fn other(self) -> Axis {
        match self {
            Axis::X => Axis::Y,
            Axis::Y => Axis::X,
        }
    }

    pub fn track(self) -> Track {
        match self {
            Axis::X => Track::X,
            Axis::Y => Track::Y,
        }
    }
}

/// One of the four tile edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum DiagDirection {
    NE = 0,
    SE = 1,
    SW = 2,
    NW = 3,
}

impl DiagDirection {
    pub const ALL: [DiagDirection; 4] = [
        DiagDirection::NE,
        DiagDirection::SE,
        DiagDirection::SW,
        DiagDirection::NW,
    ];

    pub fn from_index(i: u8) -> DiagDirection {
        Self::ALL[(i & 3) as usize]
    }

    pub fn reverse(self) -> DiagDirection {
        Self::from_index(self as u8 + 2)
    }

    pub fn axis(self) -> Axis {
        match self {
            DiagDirection::NE | DiagDirection::SW => Axis::X,
            DiagDirection::SE | DiagDirection::NW => Axis::Y,
        }
    }

    /// Tile coordinate delta when stepping across this edge.
    pub fn offset(self) -> (i32, i32) {
        match self {
            DiagDirection::NE => (-1, 0),
            DiagDirection::SE => (0, 1),
            DiagDirection::SW => (1, 0),
            DiagDirection::NW => (0, -1),
        }
    }

    pub fn to_direction(self) -> Direction {
        match self {
            DiagDirection::NE => Direction::NE,
            DiagDirection::SE => Direction::SE,
            DiagDirection::SW => Direction::SW,
            DiagDirection::NW => Direction::NW,
        }
    }

    /// Trackdirs a vehicle may take after entering a tile moving this way.
    pub fn reaches_trackdirs(self) -> TrackdirBits {
        use Trackdir::*;
        match self {
            DiagDirection::NE => TrackdirBits::of(&[XNe, LowerE, LeftN]),
            DiagDirection::SE => TrackdirBits::of(&[YSe, LeftS, UpperE]),
            DiagDirection::SW => TrackdirBits::of(&[XSw, UpperW, RightS]),
            DiagDirection::NW => TrackdirBits::of(&[YNw, RightN, LowerW]),
        }
    }

    /// The straight trackdir leaving through this edge.
    pub fn diagonal_trackdir(self) -> Trackdir {
        match self {
            DiagDirection::NE => Trackdir::XNe,
            DiagDirection::SE => Trackdir::YSe,
            DiagDirection::SW => Trackdir::XSw,
            DiagDirection::NW => Trackdir::YNw,
        }
    }
}

/// Eight-way facing of a vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Direction {
    N = 0,
    NE = 1,
    E = 2,
    SE = 3,
    S = 4,
    SW = 5,
    W = 6,
    NW = 7,
}

/// Signed difference between two directions, in 45 degree steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DirDiff {
    Same,
    Right45,
    Right90,
    Reverse,
    Left90,
    Left45,
    /// 135 degrees either way; never produced by track geometry.
    Sharp,
}

impl Direction {
    const ALL: [Direction; 8] = [
        Direction::N,
        Direction::NE,
        Direction::E,
        Direction::SE,
        Direction::S,
        Direction::SW,
        Direction::W,
        Direction::NW,
    ];

    pub fn from_index(i: u8) -> Direction {
        Self::ALL[(i & 7) as usize]
    }

    pub fn reverse(self) -> Direction {
        Self::from_index(self as u8 + 4)
    }

    /// Rotate by `steps` 45 degree steps clockwise.
    pub fn turn(self, steps: i8) -> Direction {
        Self::from_index((self as i8 + steps).rem_euclid(8) as u8)
    }

    /// Difference going from `self` to `other`.
    pub fn difference(self, other: Direction) -> DirDiff {
        match (self as u8).wrapping_sub(other as u8) & 7 {
            0 => DirDiff::Same,
            1 => DirDiff::Right45,
            2 => DirDiff::Right90,
            4 => DirDiff::Reverse,
            6 => DirDiff::Left90,
            7 => DirDiff::Left45,
            _ => DirDiff::Sharp,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Track {
    X = 0,
    Y = 1,
    Upper = 2,
    Lower = 3,
    Left = 4,
    Right = 5,
}

impl Track {
    pub const ALL: [Track; 6] = [
        Track::X,
        Track::Y,
        Track::Upper,
        Track::Lower,
        Track::Left,
        Track::Right,
    ];

    pub fn from_index(i: u8) -> Option<Track> {
        Self::ALL.get(i as usize).copied()
    }

    pub fn bit(self) -> TrackBits {
        TrackBits(1 << self as u8)
    }

    pub fn is_diagonal(self) -> bool {
        matches!(self, Track::X | Track::Y)
    }

    /// Length of the piece in movement units.
    pub fn units(self) -> u16 {
        if self.is_diagonal() {
            TILE_UNITS
        } else {
            CORNER_UNITS
        }
    }

    /// Tracks that physically cross this one on the same tile.
    pub fn crosses(self) -> TrackBits {
        match self {
            Track::X => TrackBits::Y,
            Track::Y => TrackBits::X,
            Track::Upper | Track::Lower => TrackBits::VERT,
            Track::Left | Track::Right => TrackBits::HORZ,
        }
    }

    /// Both trackdirs of this track.
    pub fn trackdirs(self) -> TrackdirBits {
        self.bit().to_trackdir_bits()
    }

    /// The trackdir of this track whose discriminant is below 8.
    pub fn forward(self) -> Trackdir {
        Trackdir::ALL[self as usize]
    }
}

/// Set of tracks on a tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct TrackBits(pub u8);

impl TrackBits {
    pub const NONE: TrackBits = TrackBits(0);
    pub const X: TrackBits = TrackBits(1);
    pub const Y: TrackBits = TrackBits(2);
    pub const UPPER: TrackBits = TrackBits(4);
    pub const LOWER: TrackBits = TrackBits(8);
    pub const LEFT: TrackBits = TrackBits(16);
    pub const RIGHT: TrackBits = TrackBits(32);
    pub const CROSS: TrackBits = TrackBits(3);
    pub const HORZ: TrackBits = TrackBits(4 | 8);
    pub const VERT: TrackBits = TrackBits(16 | 32);
    pub const ALL: TrackBits = TrackBits(63);

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn has(self, track: Track) -> bool {
        self.0 & track.bit().0 != 0
    }

    pub fn contains(self, other: TrackBits) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn intersects(self, other: TrackBits) -> bool {
        self.0 & other.0 != 0
    }

    pub fn count(self) -> u32 {
        self.0.count_ones()
    }

    /// The single track in the set, if there is exactly one.
    pub fn single(self) -> Option<Track> {
        (self.count() == 1).then(|| Track::ALL[self.0.trailing_zeros() as usize])
    }

    pub fn iter(self) -> impl Iterator<Item = Track> {
        Track::ALL.into_iter().filter(move |t| self.has(*t))
    }

    pub fn to_trackdir_bits(self) -> TrackdirBits {
        TrackdirBits(self.0 as u16 | (self.0 as u16) << 8)
    }

    /// Whether the tracks form a crossing. More than one track only avoids
    /// overlapping when the pair is the two parallel corner pieces.
    pub fn overlap(self) -> bool {
        if self.count() <= 1 {
            return false;
        }
        self != TrackBits::HORZ && self != TrackBits::VERT
    }
}

impl std::ops::BitOr for TrackBits {
    type Output = TrackBits;
    fn bitor(self, rhs: TrackBits) -> TrackBits {
        TrackBits(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for TrackBits {
    fn bitor_assign(&mut self, rhs: TrackBits) {
        self.0 |= rhs.0;
    }
}

impl std::ops::BitAnd for TrackBits {
    type Output = TrackBits;
    fn bitand(self, rhs: TrackBits) -> TrackBits {
        TrackBits(self.0 & rhs.0)
    }
}

impl std::ops::Not for TrackBits {
    type Output = TrackBits;
    fn not(self) -> TrackBits {
        TrackBits(!self.0 & TrackBits::ALL.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Trackdir {
    XNe = 0,
    YSe = 1,
    UpperE = 2,
    LowerE = 3,
    LeftS = 4,
    RightS = 5,
    XSw = 8,
    YNw = 9,
    UpperW = 10,
    LowerW = 11,
    LeftN = 12,
    RightN = 13,
}

impl Trackdir {
    /// Indexed so that `ALL[track]` is the forward trackdir of `track` and
    /// `ALL[track + 6]` the reverse.
    pub const ALL: [Trackdir; 12] = [
        Trackdir::XNe,
        Trackdir::YSe,
        Trackdir::UpperE,
        Trackdir::LowerE,
        Trackdir::LeftS,
        Trackdir::RightS,
        Trackdir::XSw,
        Trackdir::YNw,
        Trackdir::UpperW,
        Trackdir::LowerW,
        Trackdir::LeftN,
        Trackdir::RightN,
    ];

    pub fn from_raw(raw: u8) -> Option<Trackdir> {
        match raw {
            0..=5 => Some(Self::ALL[raw as usize]),
            8..=13 => Some(Self::ALL[raw as usize - 2]),
            _ => None,
        }
    }

    pub fn track(self) -> Track {
        Track::ALL[(self as u8 & 7) as usize]
    }

    pub fn reverse(self) -> Trackdir {
        match Self::from_raw(self as u8 ^ 8) {
            Some(td) => td,
            None => unreachable!("every trackdir has a reverse"),
        }
    }

    pub fn bit(self) -> TrackdirBits {
        TrackdirBits(1 << self as u8)
    }

    pub fn is_diagonal(self) -> bool {
        self.track().is_diagonal()
    }

    /// Edge through which a vehicle on this trackdir leaves the tile.
    pub fn exitdir(self) -> DiagDirection {
        use DiagDirection::*;
        match self {
            Trackdir::XNe | Trackdir::UpperE | Trackdir::RightN => NE,
            Trackdir::YSe | Trackdir::LowerE | Trackdir::RightS => SE,
            Trackdir::XSw | Trackdir::LowerW | Trackdir::LeftS => SW,
            Trackdir::YNw | Trackdir::UpperW | Trackdir::LeftN => NW,
        }
    }

    /// Direction of travel with which a vehicle enters the tile on this trackdir.
    pub fn enterdir(self) -> DiagDirection {
        self.reverse().exitdir().reverse()
    }

    /// Straight continuation on the next tile.
    pub fn next(self) -> Trackdir {
        use Trackdir::*;
        match self {
            XNe => XNe,
            YSe => YSe,
            UpperE => LowerE,
            LowerE => UpperE,
            LeftS => RightS,
            RightS => LeftS,
            XSw => XSw,
            YNw => YNw,
            UpperW => LowerW,
            LowerW => UpperW,
            LeftN => RightN,
            RightN => LeftN,
        }
    }

    /// Facing of a vehicle travelling this trackdir.
    pub fn direction(self) -> Direction {
        use Trackdir::*;
        match self {
            XNe => Direction::NE,
            YSe => Direction::SE,
            UpperE | LowerE => Direction::E,
            LeftS | RightS => Direction::S,
            XSw => Direction::SW,
            YNw => Direction::NW,
            UpperW | LowerW => Direction::W,
            LeftN | RightN => Direction::N,
        }
    }

    /// Trackdirs on the next tile that would make a 90 degree turn.
    pub fn crosses_trackdirs(self) -> TrackdirBits {
        self.track().crosses().to_trackdir_bits()
    }

    /// Position of a point `offset` units along this trackdir, in 1/16 tile
    /// units relative to the tile's north corner.
    pub fn point(self, offset: u16) -> (i32, i32) {
        use Trackdir::*;
        let o = offset.min(self.track().units()) as i32;
        match self {
            XNe => (16 - o, 8),
            XSw => (o, 8),
            YSe => (8, o),
            YNw => (8, 16 - o),
            UpperE => (8 - o, o),
            UpperW => (o, 8 - o),
            LowerE => (16 - o, 8 + o),
            LowerW => (8 + o, 16 - o),
            LeftS => (8 + o, o),
            LeftN => (16 - o, 8 - o),
            RightS => (o, 8 + o),
            RightN => (8 - o, 16 - o),
        }
    }
}

/// Set of trackdirs, bit `n` for trackdir discriminant `n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct TrackdirBits(pub u16);

impl TrackdirBits {
    pub const NONE: TrackdirBits = TrackdirBits(0);

    pub fn of(tds: &[Trackdir]) -> TrackdirBits {
        TrackdirBits(tds.iter().fold(0, |acc, td| acc | td.bit().0))
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn has(self, td: Trackdir) -> bool {
        self.0 & td.bit().0 != 0
    }

    pub fn count(self) -> u32 {
        self.0.count_ones()
    }

    pub fn first(self) -> Option<Trackdir> {
        (!self.is_empty())
            .then(|| Trackdir::from_raw(self.0.trailing_zeros() as u8))
            .flatten()
    }

    pub fn single(self) -> Option<Trackdir> {
        if self.count() == 1 {
            self.first()
        } else {
            None
        }
    }

    /// Trackdirs in ascending discriminant order.
    pub fn iter(self) -> impl Iterator<Item = Trackdir> {
        Trackdir::ALL
            .into_iter()
            .filter(|td| (*td as u8) < 8)
            .chain(Trackdir::ALL.into_iter().filter(|td| (*td as u8) >= 8))
            .filter(move |td| self.has(*td))
    }

    pub fn to_track_bits(self) -> TrackBits {
        TrackBits(((self.0 | self.0 >> 8) & 0x3F) as u8)
    }
}

impl std::ops::BitOr for TrackdirBits {
    type Output = TrackdirBits;
    fn bitor(self, rhs: TrackdirBits) -> TrackdirBits {
        TrackdirBits(self.0 | rhs.0)
    }
}

impl std::ops::BitAnd for TrackdirBits {
    type Output = TrackdirBits;
    fn bitand(self, rhs: TrackdirBits) -> TrackdirBits {
        TrackdirBits(self.0 & rhs.0)
    }
}

impl std::ops::Not for TrackdirBits {
    type Output = TrackdirBits;
    fn not(self) -> TrackdirBits {
        TrackdirBits(!self.0 & 0x3F3F)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reverse_is_involution() {
        for td in Trackdir::ALL {
            assert_ne!(td, td.reverse());
            assert_eq!(td.reverse().reverse(), td);
            assert_eq!(td.track(), td.reverse().track());
        }
    }

    #[test]
    fn test_exit_enter_consistent_with_reach_table() {
        for dir in DiagDirection::ALL {
            for td in dir.reaches_trackdirs().iter() {
                assert_eq!(td.enterdir(), dir, "{td:?}");
            }
        }
        for td in Trackdir::ALL {
            assert!(td.enterdir().reaches_trackdirs().has(td));
        }
    }

    #[test]
    fn test_points_end_on_exit_edge() {
        for td in Trackdir::ALL {
            let (x, y) = td.point(td.track().units());
            let expected = match td.exitdir() {
                DiagDirection::NE => (0, 8),
                DiagDirection::SW => (16, 8),
                DiagDirection::NW => (8, 0),
                DiagDirection::SE => (8, 16),
            };
            assert_eq!((x, y), expected, "{td:?}");
            // Entry point of the trackdir is the exit point of its reverse
            assert_eq!(td.point(0), td.reverse().point(td.track().units()));
        }
    }

    #[test]
    fn test_straight_continuation_is_reachable() {
        for td in Trackdir::ALL {
            assert!(td.exitdir().reaches_trackdirs().has(td.next()));
            assert_eq!(td.direction(), td.next().direction());
        }
    }

    #[test]
    fn test_track_overlap() {
        assert!(!TrackBits::HORZ.overlap());
        assert!(!TrackBits::VERT.overlap());
        assert!(!TrackBits::X.overlap());
        assert!(TrackBits::CROSS.overlap());
        assert!((TrackBits::X | TrackBits::UPPER).overlap());
    }

    #[test]
    fn test_direction_difference() {
        assert_eq!(Direction::N.difference(Direction::N), DirDiff::Same);
        assert_eq!(Direction::NE.difference(Direction::N), DirDiff::Right45);
        assert_eq!(Direction::N.difference(Direction::NE), DirDiff::Left45);
        assert_eq!(Direction::E.difference(Direction::N), DirDiff::Right90);
        assert_eq!(Direction::S.difference(Direction::N), DirDiff::Reverse);
    }
}
