//! The stretch of track a train covers.
//!
//! A [`Trail`] lists the positions under a train, newest first. The front of
//! the train is `head` units into the first step; every part sits at a fixed
//! distance behind the front, so moving the train only ever touches the two
//! ends of the trail and turning it around is a mirror of the distances.

use crate::map::{Map, TileIndex};
use crate::pathpos::PathPos;
use crate::track::TILE_UNITS;
use crate::vehicle::{PartLocation, PartTrack};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Units from a depot's tile edge to the building.
pub const DEPOT_UNITS: u16 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrailStep {
    pub pos: PathPos,
    pub len: u16,
}

impl TrailStep {
    pub fn new(pos: PathPos, len: u16) -> Self {
        debug_assert!(len > 0);
        Self { pos, len }
    }

    fn reversed(&self) -> Self {
        Self {
            pos: self.pos.reverse(),
            len: self.len,
        }
    }
}

/// Length of a step onto `pos`. Depot steps hold the whole train so parts
/// can queue inside the building.
pub fn step_len(map: &Map, pos: &PathPos, train_length: u16) -> u16 {
    if let Some(far) = pos.wormhole {
        let skipped = map.distance_manhattan(pos.tile, far).saturating_sub(1).max(1);
        return skipped as u16 * TILE_UNITS;
    }
    if map.depot(pos.tile).is_some() {
        return train_length + DEPOT_UNITS;
    }
    pos.td.track().units()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trail {
    steps: VecDeque<TrailStep>,
    /// Units travelled into `steps[0]`; always in `1..=steps[0].len`.
    head: u16,
}

impl Trail {
    pub fn new(first: TrailStep, head: u16) -> Self {
        debug_assert!(head > 0 && head <= first.len, "head {head} outside step");
        Self {
            steps: VecDeque::from([first]),
            head,
        }
    }

    pub fn front(&self) -> &TrailStep {
        &self.steps[0]
    }

    pub fn head_pos(&self) -> PathPos {
        self.steps[0].pos
    }

    pub fn head(&self) -> u16 {
        self.head
    }

    /// Units left before the front reaches the end of its step.
    pub fn room(&self) -> u16 {
        self.steps[0].len - self.head
    }

    pub fn steps(&self) -> impl Iterator<Item = &TrailStep> {
        self.steps.iter()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Move the front along its current step. Returns the units used.
    pub fn advance(&mut self, units: u16) -> u16 {
        let used = units.min(self.room());
        self.head += used;
        used
    }

    /// Start a new step in front, `units` into it. Returns the units used.
    pub fn push(&mut self, step: TrailStep, units: u16) -> u16 {
        debug_assert_eq!(self.room(), 0, "pushed step before reaching the end");
        let used = units.clamp(1, step.len);
        self.steps.push_front(step);
        self.head = used;
        used
    }

    /// Distance bounds `(start, end]` of step `i` measured backwards from the
    /// front, where `end` is the entry of the step.
    fn bounds(&self, i: usize) -> (i32, i32) {
        let mut end = self.head as i32;
        let mut start = end - self.steps[0].len as i32;
        for s in self.steps.iter().skip(1).take(i) {
            start = end;
            end += s.len as i32;
        }
        (start, end)
    }

    /// Step holding the point `dist` units behind the front, and how far
    /// into that step the point is.
    pub fn locate(&self, dist: u16) -> Option<(usize, u16)> {
        let dist = dist as i32;
        let mut end = self.head as i32;
        let mut start = end - self.steps[0].len as i32;
        for (i, s) in self.steps.iter().enumerate() {
            if i > 0 {
                start = end;
                end += s.len as i32;
            }
            if (start < dist || i == 0) && dist <= end {
                return Some((i, (end - dist) as u16));
            }
        }
        None
    }

    pub fn step(&self, i: usize) -> Option<&TrailStep> {
        self.steps.get(i)
    }

    /// Drop the steps entirely behind a train of `length` units and return
    /// them, nearest first.
    pub fn trim(&mut self, length: u16) -> Vec<TrailStep> {
        let keep = self.locate(length).map_or(self.steps.len(), |(i, _)| i + 1);
        self.steps.drain(keep..).collect()
    }

    /// The same stretch of track seen from the rear of a train of `length`
    /// units. Applying this twice to a trimmed trail gives it back unchanged.
    pub fn reversed(&self, length: u16) -> Trail {
        let (rear, _) = self
            .locate(length)
            .unwrap_or((self.steps.len() - 1, 0));
        let (start, _) = self.bounds(rear);
        let steps: VecDeque<TrailStep> = self
            .steps
            .iter()
            .take(rear + 1)
            .rev()
            .map(TrailStep::reversed)
            .collect();
        let head = (length as i32 - start).clamp(1, steps[0].len as i32) as u16;
        Trail { steps, head }
    }

    /// Where the point `dist` units behind the front is.
    pub fn location(&self, map: &Map, dist: u16) -> Option<PartLocation> {
        let (i, offset) = self.locate(dist)?;
        let step = &self.steps[i];
        Some(step_location(map, step, offset))
    }
}

fn tile_origin(map: &Map, tile: TileIndex) -> (i32, i32) {
    (map.x(tile) as i32 * 16, map.y(tile) as i32 * 16)
}

/// Physical location `offset` units into `step`.
fn step_location(map: &Map, step: &TrailStep, offset: u16) -> PartLocation {
    let pos = step.pos;
    let td = pos.td;
    let (ox, oy) = tile_origin(map, pos.tile);
    let z = map.get(pos.tile).height as i32 * 8;

    if let Some(far) = pos.wormhole {
        let (dx, dy) = td.exitdir().offset();
        let along = 8 + offset as i32;
        let x = ox + 8 + dx * along;
        let y = oy + 8 + dy * along;
        return PartLocation {
            tile: map
                .size()
                .tile_checked(x as i64 / 16, y as i64 / 16)
                .unwrap_or(pos.tile),
            track: PartTrack::Wormhole { td, far },
            direction: td.direction(),
            x,
            y,
            z,
        };
    }

    if let Some(depot) = map.depot(pos.tile) {
        // Leaving steps end at the tile edge; entering steps start there
        let (phys, hidden) = if td.exitdir() == depot.exit {
            let phys = offset as i32 - (step.len as i32 - TILE_UNITS as i32);
            (phys, phys < DEPOT_UNITS as i32)
        } else {
            (offset as i32, offset > DEPOT_UNITS)
        };
        if hidden {
            return PartLocation::in_depot(pos.tile, td.direction());
        }
        let (px, py) = td.point(phys.max(0) as u16);
        return PartLocation {
            tile: pos.tile,
            track: PartTrack::Track(td),
            direction: td.direction(),
            x: ox + px,
            y: oy + py,
            z,
        };
    }

    let (px, py) = td.point(offset);
    let z = match map.slope_effect(pos.tile, td.enterdir()) {
        Some(true) => z + offset as i32 / 2,
        Some(false) => z + 8 - offset as i32 / 2,
        None => z,
    };
    PartLocation {
        tile: pos.tile,
        track: PartTrack::Track(td),
        direction: td.direction(),
        x: ox + px,
        y: oy + py,
        z,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::track::Trackdir;
    use proptest::prelude::*;

    fn line(n: u32, head: u16) -> Trail {
        let step = |x| TrailStep::new(PathPos::new(TileIndex(x), Trackdir::XSw), 16);
        let mut trail = Trail::new(step(0), 16);
        for x in 1..n {
            trail.push(step(x), 16);
        }
        trail.head = head;
        trail
    }

    #[test]
    fn test_locate_counts_back_from_front() {
        let trail = line(3, 4);
        assert_eq!(trail.locate(0), Some((0, 4)));
        assert_eq!(trail.locate(4), Some((0, 0)));
        assert_eq!(trail.locate(5), Some((1, 15)));
        assert_eq!(trail.locate(20), Some((1, 0)));
        assert_eq!(trail.locate(36), Some((2, 0)));
        assert_eq!(trail.locate(37), None);
    }

    #[test]
    fn test_trim_drops_steps_behind_rear() {
        let mut trail = line(4, 8);
        let dropped = trail.trim(20);
        assert_eq!(trail.len(), 2);
        assert_eq!(dropped.len(), 2);
        assert_eq!(dropped[0].pos.tile, TileIndex(1));
    }

    proptest! {
        #[test]
        fn reversing_twice_restores_the_trail(
            lens in prop::collection::vec(prop::sample::select(vec![8u16, 16, 24]), 1..8),
            head_frac in 1u16..=8,
            length in 1u16..60,
        ) {
            let mut trail = Trail::new(
                TrailStep::new(PathPos::new(TileIndex(0), Trackdir::XSw), lens[0]),
                lens[0],
            );
            for (i, &len) in lens.iter().enumerate().skip(1) {
                trail.push(TrailStep::new(PathPos::new(TileIndex(i as u32), Trackdir::YSe), len), len);
            }
            trail.head = (lens[lens.len() - 1] * head_frac / 8).max(1);
            let total: u16 = trail.steps().skip(1).map(|s| s.len).sum::<u16>() + trail.head;
            prop_assume!(length <= total);
            trail.trim(length);

            let back = trail.reversed(length).reversed(length);
            prop_assert_eq!(back, trail.clone());

            // Every point mirrors onto the same spot
            let rev = trail.reversed(length);
            for d in 1..length {
                let (i, off) = trail.locate(d).unwrap();
                let (j, roff) = rev.locate(length - d).unwrap();
                let a = trail.step(i).unwrap();
                let b = rev.step(j).unwrap();
                if off != 0 && off != a.len {
                    prop_assert_eq!(b.pos, a.pos.reverse());
                    prop_assert_eq!(roff, a.len - off);
                }
            }
        }
    }
}
