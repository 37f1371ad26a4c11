//! Signals and block-segment recomputation.
//!
//! Signal colours of conventional block signals are derived state: whenever
//! track layout or train occupancy changes around a point, that point is put
//! into a [`SignalUpdateBatch`] and the batch is drained, flood-filling every
//! touched segment until signals bound it on every branch.

use crate::map::{Map, TileIndex, TileKind, Transport};
use crate::pathpos::PathPos;
use crate::state::WorldState;
use crate::track::{DiagDirection, Track, TrackBits, Trackdir};
use crate::vehicle::Occupancy;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use tracing::instrument;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignalVariant {
    /// Conventional block signal; colour follows segment occupancy.
    Block,
    /// Path signal; green only while a reservation leads through it.
    Pbs,
    /// Path signal that may not be passed from behind.
    PbsOneway,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignalState {
    Red,
    Green,
}

/// Signals on one track of a tile.
///
/// `along` faces trains travelling the track's forward trackdir (the one with
/// a discriminant below 8), `against` faces the reverse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrackSignals {
    pub variant: SignalVariant,
    pub along: bool,
    pub against: bool,
    pub state_along: SignalState,
    pub state_against: SignalState,
}

impl TrackSignals {
    /// A signal facing trains on `td` only.
    pub fn facing(variant: SignalVariant, td: Trackdir) -> Self {
        let forward = (td as u8) < 8;
        Self {
            variant,
            along: forward,
            against: !forward,
            state_along: SignalState::Red,
            state_against: SignalState::Red,
        }
    }

    /// A two-way pair on the track.
    pub fn two_way(variant: SignalVariant) -> Self {
        Self {
            variant,
            along: true,
            against: true,
            state_along: SignalState::Red,
            state_against: SignalState::Red,
        }
    }

    pub fn has_on(&self, td: Trackdir) -> bool {
        if (td as u8) < 8 {
            self.along
        } else {
            self.against
        }
    }

    pub fn state(&self, td: Trackdir) -> SignalState {
        if (td as u8) < 8 {
            self.state_along
        } else {
            self.state_against
        }
    }

    pub fn set_state(&mut self, td: Trackdir, state: SignalState) {
        if (td as u8) < 8 {
            self.state_along = state;
        } else {
            self.state_against = state;
        }
    }

    pub fn is_pbs(&self) -> bool {
        matches!(self.variant, SignalVariant::Pbs | SignalVariant::PbsOneway)
    }

    /// Every variant except the plain path signal refuses passage from behind.
    pub fn is_oneway(&self) -> bool {
        self.variant != SignalVariant::Pbs
    }
}

/// Classification of a signal segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SigSegState {
    /// No train inside; conventional entry signals show green.
    Free,
    /// Occupied; conventional entry signals show red.
    Full,
    /// Bounded by path signals; entering needs a reservation.
    Pbs,
}

/// Tracks with an end on the given tile edge.
pub fn edge_tracks(side: DiagDirection) -> TrackBits {
    match side {
        DiagDirection::NE => TrackBits::X | TrackBits::UPPER | TrackBits::RIGHT,
        DiagDirection::SE => TrackBits::Y | TrackBits::LOWER | TrackBits::RIGHT,
        DiagDirection::SW => TrackBits::X | TrackBits::LOWER | TrackBits::LEFT,
        DiagDirection::NW => TrackBits::Y | TrackBits::UPPER | TrackBits::LEFT,
    }
}

pub fn signals_on(map: &Map, tile: TileIndex, track: Track) -> Option<&TrackSignals> {
    map.rail(tile).and_then(|r| r.signals_on(track))
}

pub fn has_signal_on_trackdir(map: &Map, tile: TileIndex, td: Trackdir) -> bool {
    signals_on(map, tile, td.track()).is_some_and(|s| s.has_on(td))
}

pub fn has_pbs_signal_on_trackdir(map: &Map, tile: TileIndex, td: Trackdir) -> bool {
    signals_on(map, tile, td.track()).is_some_and(|s| s.is_pbs() && s.has_on(td))
}

/// A one-way signal facing against `td` blocks travel on `td`. Plain path
/// signals can be passed from behind.
pub fn has_oneway_signal_blocking_trackdir(map: &Map, tile: TileIndex, td: Trackdir) -> bool {
    signals_on(map, tile, td.track())
        .is_some_and(|s| s.is_oneway() && s.has_on(td.reverse()) && !s.has_on(td))
}

pub fn signal_state(map: &Map, tile: TileIndex, td: Trackdir) -> Option<SignalState> {
    signals_on(map, tile, td.track())
        .filter(|s| s.has_on(td))
        .map(|s| s.state(td))
}

pub fn set_signal_state(map: &mut Map, tile: TileIndex, td: Trackdir, state: SignalState) {
    if let Some(s) = map
        .rail_mut(tile)
        .and_then(|r| r.signals[td.track() as usize].as_mut())
    {
        if s.has_on(td) {
            s.set_state(td, state);
        }
    }
}

/// Pending segment recomputation.
///
/// Only one batch may be open at a time; opening a second one while another
/// is outstanding is a logic error. A batch must be consumed by
/// [`SignalUpdateBatch::drain`].
#[derive(Debug)]
#[must_use = "a signal batch must be drained"]
pub struct SignalUpdateBatch {
    /// Each entry is "the segment reached through `side` of `tile`".
    entries: Vec<(TileIndex, DiagDirection)>,
    drained: bool,
}

impl SignalUpdateBatch {
    pub fn begin(state: &mut WorldState) -> Self {
        assert!(
            !state.signal_batch_open,
            "signal update batch opened while another is outstanding"
        );
        state.signal_batch_open = true;
        Self {
            entries: Vec::new(),
            drained: false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Both sides of `track` on `tile`.
    pub fn add_track(&mut self, tile: TileIndex, track: Track) {
        let td = track.forward();
        self.entries.push((tile, td.exitdir()));
        self.entries.push((tile, td.reverse().exitdir()));
    }

    /// The segment on the tile edge a vehicle at `pos` is heading for, and the
    /// one behind it.
    pub fn add_pos(&mut self, pos: &PathPos) {
        self.entries.push((pos.tile, pos.td.exitdir()));
        self.entries.push((pos.tile, pos.td.reverse().exitdir()));
    }

    pub fn add_depot(&mut self, map: &Map, tile: TileIndex) {
        if let Some(depot) = map.depot(tile) {
            self.entries.push((tile, depot.exit));
        }
    }

    /// One edge of a tile.
    pub fn add_side(&mut self, tile: TileIndex, side: DiagDirection) {
        self.entries.push((tile, side));
    }

    /// Every edge of a tile with track on it.
    pub fn add_tile(&mut self, map: &Map, tile: TileIndex) {
        let tracks = map.rail_track_bits(tile);
        for side in DiagDirection::ALL {
            if tracks.intersects(edge_tracks(side)) {
                self.entries.push((tile, side));
            }
        }
    }

    /// Recompute every buffered segment and update block signal colours.
    /// Returns the state of the first segment in the batch (`Free` when the
    /// batch touched no track at all).
    #[instrument(skip_all, name = "signal_drain", level = "trace")]
    pub fn drain(mut self, state: &mut WorldState) -> SigSegState {
        self.drained = true;
        state.signal_batch_open = false;

        let occupancy = crate::vehicle::rail_occupancy(state);
        let mut explored: FxHashSet<(TileIndex, DiagDirection)> = FxHashSet::default();
        let mut first = None;

        for &(tile, side) in &self.entries {
            if !state.map.is_valid(tile) {
                continue;
            }
            let Some(start) = normalize_seed(&state.map, tile, side) else {
                continue;
            };
            if explored.contains(&start) {
                continue;
            }
            let seeds = segment_seeds(&state.map, start);
            let segment = explore_segment(&state.map, &occupancy, seeds, &mut explored);
            let seg_state = segment.classify();
            let colour = if segment.train {
                SignalState::Red
            } else {
                SignalState::Green
            };
            for &(sig_tile, td) in &segment.entry_signals {
                set_signal_state(&mut state.map, sig_tile, td, colour);
            }
            log::trace!(
                "segment from {} {:?}: {:?} ({} signals)",
                tile,
                side,
                seg_state,
                segment.entry_signals.len()
            );
            first.get_or_insert(seg_state);
        }

        first.unwrap_or(SigSegState::Free)
    }
}

impl Drop for SignalUpdateBatch {
    fn drop(&mut self) {
        if !std::thread::panicking() {
            debug_assert!(self.drained, "signal update batch dropped without drain");
        }
    }
}

/// Classify the segment reached through `side` of `tile` without changing
/// any signal.
pub fn segment_state(state: &WorldState, tile: TileIndex, side: DiagDirection) -> SigSegState {
    let Some(start) = normalize_seed(&state.map, tile, side) else {
        return SigSegState::Free;
    };
    let occupancy = crate::vehicle::rail_occupancy(state);
    let mut explored = FxHashSet::default();
    let seeds = segment_seeds(&state.map, start);
    explore_segment(&state.map, &occupancy, seeds, &mut explored).classify()
}

/// The seed tile and whatever lies across the seeded edge.
fn segment_seeds(map: &Map, start: (TileIndex, DiagDirection)) -> Vec<(TileIndex, DiagDirection)> {
    let mut seeds = vec![start];
    let into_wormhole = map.wormhole(start.0).is_some_and(|w| w.dir == start.1);
    if let Some(next) = map.add_diagdir(start.0, start.1).filter(|_| !into_wormhole) {
        let back = start.1.reverse();
        if map.rail_track_bits(next).intersects(edge_tracks(back)) {
            seeds.push((next, back));
        }
    }
    seeds
}

/// Turn "segment through `side` of `tile`" into a concrete arrival: either
/// the tile itself when it has track on that edge, or the neighbour across
/// the edge when the buffered tile lost its track there.
fn normalize_seed(map: &Map, tile: TileIndex, side: DiagDirection) -> Option<(TileIndex, DiagDirection)> {
    if map.rail_track_bits(tile).intersects(edge_tracks(side)) {
        return Some((tile, side));
    }
    let next = map.add_diagdir(tile, side)?;
    let back = side.reverse();
    map.rail_track_bits(next)
        .intersects(edge_tracks(back))
        .then_some((next, back))
}

#[derive(Debug, Default)]
struct Segment {
    train: bool,
    pbs: bool,
    /// Conventional signals facing into the segment.
    entry_signals: Vec<(TileIndex, Trackdir)>,
}

impl Segment {
    fn classify(&self) -> SigSegState {
        if self.pbs {
            SigSegState::Pbs
        } else if self.train {
            SigSegState::Full
        } else {
            SigSegState::Free
        }
    }
}

fn occupied(occupancy: &Occupancy, tile: TileIndex, tracks: TrackBits) -> bool {
    occupancy
        .get(&tile)
        .is_some_and(|bits| bits.intersects(tracks))
}

fn explore_segment(
    map: &Map,
    occupancy: &Occupancy,
    mut stack: Vec<(TileIndex, DiagDirection)>,
    explored: &mut FxHashSet<(TileIndex, DiagDirection)>,
) -> Segment {
    let mut seg = Segment::default();

    // Continue into the neighbour across `edge` of `tile`.
    let push_across =
        |stack: &mut Vec<(TileIndex, DiagDirection)>, tile: TileIndex, edge: DiagDirection| {
            if let Some(next) = map.add_diagdir(tile, edge) {
                let back = edge.reverse();
                let wormhole_side = map.wormhole(next).is_some_and(|w| w.dir == back);
                if !wormhole_side && map.rail_track_bits(next).intersects(edge_tracks(back)) {
                    stack.push((next, back));
                }
            }
        };

    while let Some((tile, side)) = stack.pop() {
        if !explored.insert((tile, side)) {
            continue;
        }
        let all_tracks = map.rail_track_bits(tile);
        let masked = all_tracks & edge_tracks(side);
        if masked.is_empty() {
            continue;
        }

        match &map.get(tile).kind {
            TileKind::Rail(rail) => {
                // Parallel corner pieces are independent; only follow ours
                let tracks = if all_tracks == TrackBits::HORZ || all_tracks == TrackBits::VERT {
                    masked
                } else {
                    all_tracks
                };
                if occupied(occupancy, tile, tracks) {
                    seg.train = true;
                }
                if rail.has_signals() {
                    if let Some(track) = masked.iter().next() {
                        if let Some(sig) = rail.signals_on(track) {
                            // Trackdir of travel leaving the segment onto this tile
                            let trackdir = side
                                .reverse()
                                .reaches_trackdirs()
                                .iter()
                                .find(|td| td.track() == track)
                                .unwrap_or(track.forward());
                            let reversedir = trackdir.reverse();
                            if sig.has_on(reversedir) {
                                if sig.is_pbs() {
                                    seg.pbs = true;
                                } else {
                                    seg.entry_signals.push((tile, reversedir));
                                }
                            }
                            if sig.has_on(trackdir) && !sig.is_oneway() {
                                seg.pbs = true;
                            }
                            continue;
                        }
                    }
                }
                for edge in DiagDirection::ALL {
                    if edge != side && tracks.intersects(edge_tracks(edge)) {
                        explored.insert((tile, edge));
                        push_across(&mut stack, tile, edge);
                    }
                }
            }
            TileKind::Depot(depot) => {
                if side == depot.exit {
                    let hidden_only = occupancy
                        .get(&tile)
                        .map_or(true, |bits| !bits.intersects(masked));
                    if !hidden_only {
                        seg.train = true;
                    }
                }
            }
            TileKind::Station(st) => {
                if occupied(occupancy, tile, masked) {
                    seg.train = true;
                }
                let through = st.axis.track().forward().exitdir();
                let edge = if through == side { through.reverse() } else { through };
                explored.insert((tile, edge));
                push_across(&mut stack, tile, edge);
            }
            TileKind::Wormhole(w) if matches!(w.transport, Transport::Rail(_)) => {
                let other = w.other_end;
                if occupied(occupancy, tile, masked) || occupied(occupancy, other, masked) {
                    seg.train = true;
                }
                let outside = w.dir.reverse();
                if side == outside {
                    // Through the wormhole and out of the far head
                    explored.insert((tile, w.dir));
                    explored.insert((other, outside));
                    explored.insert((other, w.dir));
                    push_across(&mut stack, other, w.dir);
                } else {
                    explored.insert((tile, outside));
                    explored.insert((other, w.dir));
                    explored.insert((other, outside));
                    push_across(&mut stack, tile, outside);
                }
            }
            _ => {}
        }
    }
    seg
}

#[cfg(test)]
#[path = "signal_tests.rs"]
mod tests;
