use super::*;
use crate::testing::{build_train, place_train, MapBuilder, WorldStateBuilder};
use crate::vehicle::VehicleId;

fn world(builder: MapBuilder) -> WorldState {
    let map = builder.depot(0, 1, DiagDirection::SW).build();
    WorldStateBuilder::new(map).company(0, 1_000_000).build()
}

/// Line on row 1 with one signal on tile 4 guarding the stretch beyond it.
fn line(variant: SignalVariant) -> WorldState {
    world(
        MapBuilder::new(12, 3)
            .rail_x(1, 1..12)
            .signal(4, 1, Trackdir::XSw, variant),
    )
}

fn park(state: &mut WorldState, from: u32, to: u32) -> VehicleId {
    let depot = state.map.tile(0, 1);
    let front = build_train(state, depot, &[0]);
    let positions: Vec<PathPos> = (from..=to)
        .map(|x| PathPos::new(state.map.tile(x, 1), Trackdir::XSw))
        .collect();
    place_train(state, front, &positions, 16);
    front
}

fn refresh(state: &mut WorldState, x: u32) -> SigSegState {
    let tile = state.map.tile(x, 1);
    let mut batch = SignalUpdateBatch::begin(state);
    batch.add_tile(&state.map, tile);
    batch.drain(state)
}

#[test]
fn test_track_signals_sides() {
    let one = TrackSignals::facing(SignalVariant::Block, Trackdir::XSw);
    assert!(one.has_on(Trackdir::XSw));
    assert!(!one.has_on(Trackdir::XNe));
    assert!(one.is_oneway());
    assert!(!one.is_pbs());

    let pair = TrackSignals::two_way(SignalVariant::Pbs);
    assert!(pair.has_on(Trackdir::YSe) && pair.has_on(Trackdir::YNw));
    assert!(pair.is_pbs());
    assert!(!pair.is_oneway());
    assert!(TrackSignals::two_way(SignalVariant::PbsOneway).is_oneway());
}

#[test]
fn test_edge_tracks() {
    assert_eq!(
        edge_tracks(DiagDirection::NE),
        TrackBits::X | TrackBits::UPPER | TrackBits::RIGHT
    );
    for side in DiagDirection::ALL {
        assert_eq!(edge_tracks(side).count(), 3);
        // Opposite edges share only the straight track
        assert_eq!((edge_tracks(side) & edge_tracks(side.reverse())).count(), 1);
    }
}

#[test]
fn test_empty_block_shows_green() {
    let mut state = line(SignalVariant::Block);
    let signal = state.map.tile(4, 1);
    assert_eq!(signal_state(&state.map, signal, Trackdir::XSw), Some(SignalState::Red));

    refresh(&mut state, 4);
    assert_eq!(signal_state(&state.map, signal, Trackdir::XSw), Some(SignalState::Green));
    assert_eq!(segment_state(&state, state.map.tile(7, 1), DiagDirection::SW), SigSegState::Free);
    assert!(!state.signal_batch_open);
}

#[test]
fn test_occupied_block_shows_red() {
    let mut state = line(SignalVariant::Block);
    park(&mut state, 7, 8);
    refresh(&mut state, 4);

    let signal = state.map.tile(4, 1);
    assert_eq!(signal_state(&state.map, signal, Trackdir::XSw), Some(SignalState::Red));
    assert_eq!(segment_state(&state, state.map.tile(6, 1), DiagDirection::SW), SigSegState::Full);
    // The stretch behind the signal is a separate segment
    assert_eq!(segment_state(&state, state.map.tile(2, 1), DiagDirection::SW), SigSegState::Free);
}

#[test]
fn test_train_leaving_block_clears_signal() {
    let mut state = line(SignalVariant::Block);
    let front = park(&mut state, 7, 8);
    refresh(&mut state, 4);
    let signal = state.map.tile(4, 1);
    assert_eq!(signal_state(&state.map, signal, Trackdir::XSw), Some(SignalState::Red));

    state.vehicles.remove(front);
    refresh(&mut state, 4);
    assert_eq!(signal_state(&state.map, signal, Trackdir::XSw), Some(SignalState::Green));
}

/// Five plain tiles, x=3..=7, between signals on x=2 and x=8.
fn block(variant: SignalVariant) -> WorldState {
    world(
        MapBuilder::new(12, 3)
            .rail_x(1, 1..12)
            .signal(2, 1, Trackdir::XSw, variant)
            .signal(8, 1, Trackdir::XSw, variant),
    )
}

#[test]
fn test_segment_between_two_signals() {
    let mut state = block(SignalVariant::Block);
    let middle = state.map.tile(5, 1);
    assert_eq!(segment_state(&state, middle, DiagDirection::SW), SigSegState::Free);
    refresh(&mut state, 2);
    let entry = state.map.tile(2, 1);
    assert_eq!(signal_state(&state.map, entry, Trackdir::XSw), Some(SignalState::Green));

    park(&mut state, 5, 5);
    assert_eq!(segment_state(&state, middle, DiagDirection::SW), SigSegState::Full);
    assert_eq!(segment_state(&state, middle, DiagDirection::NE), SigSegState::Full);
    refresh(&mut state, 2);
    assert_eq!(signal_state(&state.map, entry, Trackdir::XSw), Some(SignalState::Red));

    let state = block(SignalVariant::Pbs);
    assert_eq!(segment_state(&state, state.map.tile(5, 1), DiagDirection::SW), SigSegState::Pbs);
}

#[test]
fn test_path_signal_makes_pbs_segment() {
    let state = line(SignalVariant::Pbs);
    assert_eq!(segment_state(&state, state.map.tile(6, 1), DiagDirection::SW), SigSegState::Pbs);
    assert!(has_pbs_signal_on_trackdir(&state.map, state.map.tile(4, 1), Trackdir::XSw));
    assert!(!has_pbs_signal_on_trackdir(&state.map, state.map.tile(4, 1), Trackdir::XNe));
}

#[test]
fn test_oneway_signal_blocks_wrong_way_traffic() {
    let state = line(SignalVariant::PbsOneway);
    let tile = state.map.tile(4, 1);
    assert!(has_oneway_signal_blocking_trackdir(&state.map, tile, Trackdir::XNe));
    assert!(!has_oneway_signal_blocking_trackdir(&state.map, tile, Trackdir::XSw));

    let plain = line(SignalVariant::Pbs);
    assert!(!has_oneway_signal_blocking_trackdir(&plain.map, tile, Trackdir::XNe));
}

#[test]
fn test_train_in_depot_is_hidden() {
    let mut state = world(MapBuilder::new(12, 3).rail_x(1, 1..12));
    let depot = state.map.tile(0, 1);
    build_train(&mut state, depot, &[0]);
    assert_eq!(segment_state(&state, state.map.tile(1, 1), DiagDirection::NE), SigSegState::Free);
}

#[test]
#[should_panic(expected = "signal update batch opened while another is outstanding")]
fn test_nested_batches_are_refused() {
    let mut state = line(SignalVariant::Block);
    let first = SignalUpdateBatch::begin(&mut state);
    let second = SignalUpdateBatch::begin(&mut state);
    second.drain(&mut state);
    first.drain(&mut state);
}
