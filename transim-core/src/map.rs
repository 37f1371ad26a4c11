//! The tile grid and per-tile contents.

use crate::signal::TrackSignals;
use crate::track::{Axis, DiagDirection, Track, TrackBits};
use serde::{Deserialize, Serialize};

/// Linear tile index: `y * size_x + x`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TileIndex(pub u32);

impl std::fmt::Display for TileIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Map dimensions, enough to convert between indices and coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MapSize {
    pub x: u32,
    pub y: u32,
}

impl MapSize {
    pub fn tile(self, x: u32, y: u32) -> TileIndex {
        debug_assert!(x < self.x && y < self.y);
        TileIndex(y * self.x + x)
    }

    /// Tile at signed coordinates, if on the map.
    pub fn tile_checked(self, x: i64, y: i64) -> Option<TileIndex> {
        if x < 0 || y < 0 || x >= self.x as i64 || y >= self.y as i64 {
            return None;
        }
        Some(self.tile(x as u32, y as u32))
    }

    pub fn tile_x(self, tile: TileIndex) -> u32 {
        tile.0 % self.x
    }

    pub fn tile_y(self, tile: TileIndex) -> u32 {
        tile.0 / self.x
    }
}

pub type CompanyId = u8;
pub type StationId = u16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RailType {
    Rail,
    Electric,
    Monorail,
}

impl RailType {
    pub fn bit(self) -> RailTypes {
        RailTypes(1 << self as u8)
    }

    /// Track types an engine of this type can run on.
    pub fn compatible(self) -> RailTypes {
        match self {
            RailType::Rail => RailTypes(RailTypes::RAIL.0 | RailTypes::ELECTRIC.0),
            RailType::Electric => RailTypes::ELECTRIC,
            RailType::Monorail => RailTypes::MONORAIL,
        }
    }

    /// Extra curve speed allowance, in halves of the base limit.
    pub fn curve_speed(self) -> u16 {
        match self {
            RailType::Monorail => 1,
            _ => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RailTypes(pub u8);

impl RailTypes {
    pub const NONE: RailTypes = RailTypes(0);
    pub const RAIL: RailTypes = RailTypes(1);
    pub const ELECTRIC: RailTypes = RailTypes(2);
    pub const MONORAIL: RailTypes = RailTypes(4);
    pub const ALL: RailTypes = RailTypes(7);

    pub fn has(self, rt: RailType) -> bool {
        self.0 & rt.bit().0 != 0
    }

    pub fn intersect(self, other: RailTypes) -> RailTypes {
        RailTypes(self.0 & other.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RailTile {
    pub tracks: TrackBits,
    pub reserved: TrackBits,
    pub rail_type: RailType,
    /// Signals indexed by track.
    pub signals: [Option<TrackSignals>; 6],
}

impl RailTile {
    pub fn new(tracks: TrackBits, rail_type: RailType) -> Self {
        Self {
            tracks,
            reserved: TrackBits::NONE,
            rail_type,
            signals: [None; 6],
        }
    }

    pub fn signals_on(&self, track: Track) -> Option<&TrackSignals> {
        self.signals[track as usize].as_ref()
    }

    pub fn has_signals(&self) -> bool {
        self.signals.iter().any(Option::is_some)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepotTile {
    /// Edge trains leave the depot through.
    pub exit: DiagDirection,
    pub rail_type: RailType,
    pub reserved: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StationTile {
    pub station: StationId,
    pub axis: Axis,
    pub rail_type: RailType,
    pub reserved: bool,
    /// Waypoints are single-tile stations trains never stop at unless ordered.
    pub waypoint: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WormholeKind {
    Tunnel,
    Bridge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Transport {
    Rail(RailType),
    Water,
}

/// One end of a tunnel or bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WormholeTile {
    pub kind: WormholeKind,
    /// Direction of travel from this head into the wormhole.
    pub dir: DiagDirection,
    pub other_end: TileIndex,
    pub transport: Transport,
    pub reserved: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WaterClass {
    Sea,
    Canal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TileKind {
    Clear,
    Rail(RailTile),
    Depot(DepotTile),
    Station(StationTile),
    Wormhole(WormholeTile),
    Water(WaterClass),
    ShipDepot { exit: DiagDirection },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tile {
    pub kind: TileKind,
    pub owner: Option<CompanyId>,
    pub height: u8,
    /// Edge the tile rises towards, if sloped.
    pub slope: Option<DiagDirection>,
}

impl Default for Tile {
    fn default() -> Self {
        Self {
            kind: TileKind::Clear,
            owner: None,
            height: 0,
            slope: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Map {
    size_x: u32,
    size_y: u32,
    tiles: Vec<Tile>,
}

impl Map {
    pub fn new(size_x: u32, size_y: u32) -> Self {
        Self {
            size_x,
            size_y,
            tiles: vec![Tile::default(); (size_x * size_y) as usize],
        }
    }

    pub fn size(&self) -> MapSize {
        MapSize {
            x: self.size_x,
            y: self.size_y,
        }
    }

    pub fn size_x(&self) -> u32 {
        self.size_x
    }

    pub fn size_y(&self) -> u32 {
        self.size_y
    }

    pub fn tile_count(&self) -> u32 {
        self.size_x * self.size_y
    }

    pub fn tile(&self, x: u32, y: u32) -> TileIndex {
        debug_assert!(x < self.size_x && y < self.size_y);
        TileIndex(y * self.size_x + x)
    }

    pub fn x(&self, tile: TileIndex) -> u32 {
        tile.0 % self.size_x
    }

    pub fn y(&self, tile: TileIndex) -> u32 {
        tile.0 / self.size_x
    }

    pub fn is_valid(&self, tile: TileIndex) -> bool {
        tile.0 < self.tile_count()
    }

    /// Offset a tile, returning `None` when the result leaves the map.
    pub fn add_wrap(&self, tile: TileIndex, dx: i32, dy: i32) -> Option<TileIndex> {
        self.size().tile_checked(
            self.x(tile) as i64 + dx as i64,
            self.y(tile) as i64 + dy as i64,
        )
    }

    pub fn add_diagdir(&self, tile: TileIndex, dir: DiagDirection) -> Option<TileIndex> {
        let (dx, dy) = dir.offset();
        self.add_wrap(tile, dx, dy)
    }

    pub fn distance_manhattan(&self, a: TileIndex, b: TileIndex) -> u32 {
        self.x(a).abs_diff(self.x(b)) + self.y(a).abs_diff(self.y(b))
    }

    pub fn distance_max(&self, a: TileIndex, b: TileIndex) -> u32 {
        self.x(a).abs_diff(self.x(b)).max(self.y(a).abs_diff(self.y(b)))
    }

    pub fn get(&self, tile: TileIndex) -> &Tile {
        &self.tiles[tile.0 as usize]
    }

    pub fn get_mut(&mut self, tile: TileIndex) -> &mut Tile {
        &mut self.tiles[tile.0 as usize]
    }

    pub fn rail(&self, tile: TileIndex) -> Option<&RailTile> {
        match &self.get(tile).kind {
            TileKind::Rail(rail) => Some(rail),
            _ => None,
        }
    }

    pub fn rail_mut(&mut self, tile: TileIndex) -> Option<&mut RailTile> {
        match &mut self.get_mut(tile).kind {
            TileKind::Rail(rail) => Some(rail),
            _ => None,
        }
    }

    pub fn depot(&self, tile: TileIndex) -> Option<&DepotTile> {
        match &self.get(tile).kind {
            TileKind::Depot(depot) => Some(depot),
            _ => None,
        }
    }

    pub fn station(&self, tile: TileIndex) -> Option<&StationTile> {
        match &self.get(tile).kind {
            TileKind::Station(st) => Some(st),
            _ => None,
        }
    }

    pub fn wormhole(&self, tile: TileIndex) -> Option<&WormholeTile> {
        match &self.get(tile).kind {
            TileKind::Wormhole(w) => Some(w),
            _ => None,
        }
    }

    /// Rail tracks physically present on the tile.
    pub fn rail_track_bits(&self, tile: TileIndex) -> TrackBits {
        match &self.get(tile).kind {
            TileKind::Rail(rail) => rail.tracks,
            TileKind::Depot(d) => d.exit.axis().track().bit(),
            TileKind::Station(st) => st.axis.track().bit(),
            TileKind::Wormhole(WormholeTile {
                dir,
                transport: Transport::Rail(_),
                ..
            }) => dir.axis().track().bit(),
            _ => TrackBits::NONE,
        }
    }

    /// Rail tracks currently reserved on the tile.
    pub fn reserved_track_bits(&self, tile: TileIndex) -> TrackBits {
        let axis_bit = |reserved: bool, axis: Axis| {
            if reserved {
                axis.track().bit()
            } else {
                TrackBits::NONE
            }
        };
        match &self.get(tile).kind {
            TileKind::Rail(rail) => rail.reserved,
            TileKind::Depot(d) => axis_bit(d.reserved, d.exit.axis()),
            TileKind::Station(st) => axis_bit(st.reserved, st.axis),
            TileKind::Wormhole(w) => axis_bit(w.reserved, w.dir.axis()),
            _ => TrackBits::NONE,
        }
    }

    pub fn rail_type(&self, tile: TileIndex) -> Option<RailType> {
        match &self.get(tile).kind {
            TileKind::Rail(rail) => Some(rail.rail_type),
            TileKind::Depot(d) => Some(d.rail_type),
            TileKind::Station(st) => Some(st.rail_type),
            TileKind::Wormhole(WormholeTile {
                transport: Transport::Rail(rt),
                ..
            }) => Some(*rt),
            _ => None,
        }
    }

    pub fn water_class(&self, tile: TileIndex) -> Option<WaterClass> {
        match &self.get(tile).kind {
            TileKind::Water(class) => Some(*class),
            TileKind::ShipDepot { .. } => Some(WaterClass::Canal),
            TileKind::Wormhole(WormholeTile {
                transport: Transport::Water,
                ..
            }) => Some(WaterClass::Canal),
            _ => None,
        }
    }

    /// Tracks a ship may use on the tile.
    pub fn water_track_bits(&self, tile: TileIndex) -> TrackBits {
        match &self.get(tile).kind {
            TileKind::Water(_) => TrackBits::ALL,
            TileKind::ShipDepot { exit } => exit.axis().track().bit(),
            TileKind::Wormhole(WormholeTile {
                dir,
                transport: Transport::Water,
                ..
            }) => dir.axis().track().bit(),
            _ => TrackBits::NONE,
        }
    }

    /// Whether entering through `enterdir` puts the vehicle on the slope
    /// going uphill (`Some(true)`), downhill (`Some(false)`) or level.
    pub fn slope_effect(&self, tile: TileIndex, enterdir: DiagDirection) -> Option<bool> {
        let slope = self.get(tile).slope?;
        if slope == enterdir {
            Some(true)
        } else if slope == enterdir.reverse() {
            Some(false)
        } else {
            None
        }
    }
}
