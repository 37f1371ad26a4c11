use super::curve_speed_limit;
use crate::map::{RailType, TileIndex};
use crate::news::NewsEvent;
use crate::order::{Order, StopLocation};
use crate::pathpos::PathPos;
use crate::pbs::force_reserve_rail_track;
use crate::signal::{signal_state, SignalState, SignalUpdateBatch, SignalVariant};
use crate::state::WorldState;
use crate::testing::{build_train, place_train, MapBuilder, WorldStateBuilder};
use crate::track::{DiagDirection, Direction, Track, TrackBits, Trackdir};
use crate::train::crash::VICTIMS_PER_TRAIN;
use crate::train::tick_train;
use crate::vehicle::VehicleId;

fn world(builder: MapBuilder) -> (WorldState, TileIndex) {
    let map = builder.depot(0, 1, DiagDirection::SW).build();
    let depot = map.tile(0, 1);
    (WorldStateBuilder::new(map).company(0, 1_000_000).build(), depot)
}

/// Engine on row 1 covering tiles `from..=to`, front at the far end of `to`.
fn place_engine(state: &mut WorldState, depot: TileIndex, from: u32, to: u32) -> VehicleId {
    let front = build_train(state, depot, &[0]);
    let positions: Vec<PathPos> = (from..=to)
        .map(|x| PathPos::new(state.map.tile(x, 1), Trackdir::XSw))
        .collect();
    place_train(state, front, &positions, 16);
    front
}

fn head(state: &WorldState, front: VehicleId) -> PathPos {
    state.consist(front).unwrap().trail().unwrap().head_pos()
}

#[test]
fn test_train_accelerates_along_line() {
    let (mut state, depot) = world(MapBuilder::new(24, 3).rail_x(1, 1..24));
    let front = place_engine(&mut state, depot, 1, 2);

    for _ in 0..60 {
        tick_train(&mut state, front);
    }
    let c = state.consist(front).unwrap();
    assert_eq!(c.speed, 240);
    let x = state.map.x(head(&state, front).tile);
    assert!((4..=7).contains(&x), "front at x={x}");
    // Track the train has left is free again
    assert_eq!(state.map.reserved_track_bits(state.map.tile(1, 1)), TrackBits::NONE);
    assert_eq!(state.map.reserved_track_bits(state.map.tile(x, 1)), TrackBits::X);
}

/// A one-way block signal at x=8 held red by a stopped train at x=12..13,
/// and a train approaching it from x=1.
fn red_signal_ahead(reverse_at_signals: bool) -> (WorldState, VehicleId, TileIndex) {
    let (mut state, depot) = world(
        MapBuilder::new(20, 3)
            .rail_x(1, 1..20)
            .signal(8, 1, Trackdir::XSw, SignalVariant::Block),
    );
    state.settings.train.reverse_at_signals = reverse_at_signals;
    let front = place_engine(&mut state, depot, 1, 2);
    let blocker = place_engine(&mut state, depot, 12, 13);
    state.consist_mut(blocker).unwrap().flags.stopped = true;

    let signal_tile = state.map.tile(8, 1);
    let mut batch = SignalUpdateBatch::begin(&mut state);
    batch.add_tile(&state.map, signal_tile);
    batch.drain(&mut state);
    assert_eq!(signal_state(&state.map, signal_tile, Trackdir::XSw), Some(SignalState::Red));
    (state, front, signal_tile)
}

/// First tick on which the train faces back towards x=0, if any.
fn ticks_until_reversed(state: &mut WorldState, front: VehicleId, limit: u32) -> Option<u32> {
    (0..limit).find(|_| {
        tick_train(state, front);
        head(state, front).td == Trackdir::XNe
    })
}

#[test]
fn test_red_block_signal_holds_train_until_forced() {
    let (mut state, front, signal_tile) = red_signal_ahead(false);

    for _ in 0..150 {
        tick_train(&mut state, front);
    }
    let pos = head(&state, front);
    assert_eq!(pos.tile, state.map.tile(7, 1));
    let c = state.consist(front).unwrap();
    assert_eq!(c.speed, 0);
    assert!(c.wait_counter > 0);
    assert_eq!(c.trail().unwrap().room(), 0);

    state.consist_mut(front).unwrap().flags.force_proceed = true;
    for _ in 0..20 {
        tick_train(&mut state, front);
    }
    assert_eq!(head(&state, front).tile, signal_tile);
    assert!(!state.consist(front).unwrap().flags.force_proceed);
}

#[test]
fn test_waits_at_red_signal_forever_by_default() {
    let (mut state, front, _) = red_signal_ahead(false);
    let threshold = state.settings.train.oneway_signal_wait_ticks();

    assert_eq!(ticks_until_reversed(&mut state, front, 3 * threshold), None);
    let c = state.consist(front).unwrap();
    assert_eq!(c.speed, 0);
    assert!(c.wait_counter >= 2 * threshold);
    assert_eq!(head(&state, front), PathPos::new(state.map.tile(7, 1), Trackdir::XSw));
}

#[test]
fn test_reverses_at_red_signal_after_waiting() {
    let (mut state, front, _) = red_signal_ahead(true);
    let threshold = state.settings.train.oneway_signal_wait_ticks();

    let reversed = ticks_until_reversed(&mut state, front, 3 * threshold);
    let tick = reversed.expect("train never turned around");
    assert!(tick >= threshold, "turned around after {tick} ticks");
    assert_eq!(state.consist(front).unwrap().wait_counter, 0);
}

#[test]
fn test_stops_at_far_end_of_platform() {
    let (mut state, depot) = world(
        MapBuilder::new(20, 3)
            .rail_x(1, 1..20)
            .station_x(1, 5..8, 0),
    );
    let front = place_engine(&mut state, depot, 1, 2);
    state.consist_mut(front).unwrap().orders.orders.push(Order::GoToStation {
        station: 0,
        stop: StopLocation::FarEnd,
    });

    for _ in 0..300 {
        tick_train(&mut state, front);
        if state.consist(front).unwrap().loading_ticks > 0 {
            break;
        }
    }
    let c = state.consist(front).unwrap();
    assert!(c.loading_ticks > 0);
    assert_eq!(c.last_station, Some(0));
    assert_eq!(c.speed, 0);
    let trail = c.trail().unwrap();
    assert_eq!(trail.head_pos().tile, state.map.tile(7, 1));
    assert_eq!(trail.head(), 16);
}

#[test]
fn test_stops_near_end_of_platform() {
    let (mut state, depot) = world(
        MapBuilder::new(20, 3)
            .rail_x(1, 1..20)
            .station_x(1, 5..8, 0),
    );
    let front = place_engine(&mut state, depot, 1, 2);
    state.consist_mut(front).unwrap().orders.orders.push(Order::GoToStation {
        station: 0,
        stop: StopLocation::NearEnd,
    });

    for _ in 0..300 {
        tick_train(&mut state, front);
        if state.consist(front).unwrap().loading_ticks > 0 {
            break;
        }
    }
    let trail = state.consist(front).unwrap().trail().unwrap();
    // An 8 unit engine stops with its front half way into the first tile
    assert_eq!(trail.head_pos().tile, state.map.tile(5, 1));
    assert_eq!(trail.head(), 8);
}

#[test]
fn test_reverses_at_end_of_line() {
    let (mut state, depot) = world(MapBuilder::new(12, 3).rail_x(1, 1..6));
    let front = place_engine(&mut state, depot, 3, 4);

    for _ in 0..200 {
        tick_train(&mut state, front);
        if head(&state, front).td == Trackdir::XNe {
            break;
        }
    }
    let pos = head(&state, front);
    assert_eq!(pos.td, Trackdir::XNe);
    assert_eq!(pos.tile, state.map.tile(5, 1));
    assert_eq!(state.consist(front).unwrap().speed, 0);
}

#[test]
fn test_stuck_train_waits_and_advises_once() {
    let (mut state, depot) = world(MapBuilder::new(12, 3).rail_x(1, 1..12));
    let front = place_engine(&mut state, depot, 2, 3);
    let advisory = state.settings.train.stuck_advisory_ticks();
    {
        let c = state.consist_mut(front).unwrap();
        c.flags.stuck = true;
        c.stuck.ticks = advisory - 1;
        c.stuck.retry_in = 5;
    }
    let before = head(&state, front);

    tick_train(&mut state, front);
    tick_train(&mut state, front);
    let stuck_news = state
        .news
        .iter()
        .filter(|n| matches!(n, NewsEvent::TrainStuck { train, .. } if *train == front))
        .count();
    assert_eq!(stuck_news, 1);
    let c = state.consist(front).unwrap();
    assert_eq!(c.stuck.retry_in, 3);
    assert!(c.stuck.advised);
    assert_eq!(head(&state, front), before);
}

#[test]
fn test_trains_of_one_company_collide() {
    let (mut state, depot) = world(MapBuilder::new(20, 3).rail_x(1, 1..20));
    let front = place_engine(&mut state, depot, 1, 2);
    let standing = place_engine(&mut state, depot, 8, 9);
    // The standing train holds a path further on
    for x in 10..=12 {
        let tile = state.map.tile(x, 1);
        force_reserve_rail_track(&mut state.map, tile, Track::X);
    }
    {
        let c = state.consist_mut(standing).unwrap();
        c.flags.stopped = true;
        c.flags.path_reserved = true;
    }

    let crashed = (0..200).any(|_| {
        tick_train(&mut state, front);
        state.consist(front).unwrap().flags.crashed
    });
    assert!(crashed);

    for id in [front, standing] {
        let c = state.consist(id).unwrap();
        assert!(c.flags.crashed, "train {id}");
        assert_eq!(c.speed, 0);
        assert!(!c.flags.path_reserved);
    }
    for x in 10..=12 {
        assert_eq!(state.map.reserved_track_bits(state.map.tile(x, 1)), TrackBits::NONE, "tile {x}");
    }
    // Wrecks keep blocking the track they stand on
    let wreck = head(&state, standing).tile;
    assert_eq!(state.map.reserved_track_bits(wreck), TrackBits::X);
    let crashes: Vec<u32> = state
        .news
        .iter()
        .filter_map(|n| match n {
            NewsEvent::TrainCrash { victims, .. } => Some(*victims),
            _ => None,
        })
        .collect();
    assert_eq!(crashes, vec![2 * VICTIMS_PER_TRAIN]);
}

#[test]
fn test_stuck_backoff_doubles_up_to_limit() {
    let mut stuck = crate::train::consist::StuckState::default();
    let mut intervals = Vec::new();
    for _ in 0..8 {
        stuck.back_off(64);
        intervals.push(stuck.retry_in);
    }
    assert_eq!(intervals, vec![2, 4, 8, 16, 32, 64, 64, 64]);
}

#[test]
fn test_curve_speed_limits() {
    use Direction::*;
    assert_eq!(curve_speed_limit(&[NE, NE, NE], RailType::Rail), u16::MAX);
    // Adjacent 45 degree turns
    assert_eq!(curve_speed_limit(&[NE, N, NE], RailType::Rail), 88);
    // 90 degree turn, with and without a curve speed bonus
    assert_eq!(curve_speed_limit(&[NE, NW], RailType::Rail), 61);
    assert_eq!(curve_speed_limit(&[NE, NW], RailType::Monorail), 91);
    // Two turns the same way two parts apart
    assert_eq!(curve_speed_limit(&[NE, N, N, NW], RailType::Rail), 111);
    // One left and one right turn further apart cancel out
    assert_eq!(curve_speed_limit(&[NE, N, N, N, NE], RailType::Rail), u16::MAX);
}
