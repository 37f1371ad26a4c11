use super::*;
use crate::network::CommandQueue;
use crate::testing::{MapBuilder, WorldStateBuilder};
use proptest::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};

const ME: Actor = Actor::Company(0);

fn world(money: i64) -> WorldState {
    WorldStateBuilder::new(MapBuilder::new(8, 8).build())
        .company(0, money)
        .company(1, 0)
        .build()
}

fn run(state: &mut WorldState, actor: Actor, cmd: &Command) -> CommandResult {
    let mut net = CommandQueue::default();
    do_command_p(state, &mut net, actor, cmd, None)
}

fn track(state: &WorldState, x: u32, y: u32) -> Command {
    Command::BuildRailroadTrack {
        tile: state.map.tile(x, y),
        track: Track::X,
        rail_type: RailType::Rail,
    }
}

#[test]
fn test_opcodes_are_stable() {
    for (i, kind) in CommandKind::ALL.iter().enumerate() {
        assert_eq!(kind.opcode() as usize, i);
        assert_eq!(CommandKind::from_opcode(kind.opcode()), Some(*kind));
    }
    assert_eq!(CommandKind::from_opcode(CommandKind::ALL.len() as u8), None);
    assert_eq!(CommandKind::BuildRailroadTrack.opcode(), 0);
    assert_eq!(CommandKind::LandscapeClear.opcode(), 9);
    assert_eq!(CommandKind::GiveMoney.opcode(), 21);
    assert_eq!(command_name(CommandKind::Pause), "pause");
}

#[test]
fn test_table_flags() {
    assert!(is_command_allowed_while_paused(CommandKind::Pause));
    assert!(!is_command_allowed_while_paused(CommandKind::BuildRailroadTrack));
    assert!(command_flags(CommandKind::LandscapeClear).no_test);
    assert!(command_flags(CommandKind::StartStopVehicle).bankrupt_exempt);
    assert!(command_flags(CommandKind::SellVehicle).tile_agnostic);
    assert_eq!(CommandKind::BuildVehicle.info().expense, ExpenseType::NewVehicles);
}

#[test]
fn test_give_money_needs_cash() {
    let mut state = world(100);
    let gift = Command::GiveMoney { to: 1, amount: 150 };
    assert_eq!(
        run(&mut state, ME, &gift),
        Err(CommandError::InsufficientFunds {
            required: 150,
            available: 100
        })
    );
    assert_eq!(state.companies[&0].money, 100);
    assert_eq!(state.companies[&1].money, 0);

    state.companies.get_mut(&0).expect("company").money = 200;
    assert_eq!(
        run(&mut state, ME, &gift),
        Ok(CommandCost::with_cost(ExpenseType::Other, 150))
    );
    assert_eq!(state.companies[&0].money, 50);
    assert_eq!(state.companies[&1].money, 150);
    assert_eq!(state.companies[&0].expenses[&ExpenseType::Other], 150);
}

#[test]
fn test_give_money_targets() {
    let mut state = world(1_000);
    let to_self = Command::GiveMoney { to: 0, amount: 10 };
    assert_eq!(run(&mut state, ME, &to_self), Err(CommandError::NotPermitted));
    let to_nobody = Command::GiveMoney { to: 7, amount: 10 };
    assert_eq!(run(&mut state, ME, &to_nobody), Err(CommandError::UnknownCompany(7)));
    let nothing = Command::GiveMoney { to: 1, amount: 0 };
    assert_eq!(run(&mut state, ME, &nothing), Err(CommandError::NotPermitted));
}

#[test]
fn test_loan_headroom_counts_as_cash() {
    let mut state = world(50);
    if let Some(c) = state.companies.get_mut(&0) {
        c.max_loan = 100;
    }
    let build = track(&state, 2, 2);
    assert!(run(&mut state, ME, &build).is_ok());
    assert_eq!(state.companies[&0].money, -50);
}

#[test]
fn test_paused_game_refuses_construction() {
    let mut state = world(10_000);
    state.paused = true;
    let build = track(&state, 2, 2);
    assert_eq!(run(&mut state, ME, &build), Err(CommandError::Paused));

    let unpause = Command::Pause { paused: false };
    assert_eq!(run(&mut state, ME, &unpause), Err(CommandError::NotPermitted));
    assert!(run(&mut state, Actor::Deity, &unpause).is_ok());
    assert!(!state.paused);
    assert!(run(&mut state, ME, &build).is_ok());
}

#[test]
fn test_actor_gates() {
    let mut state = world(10_000);
    let build = track(&state, 2, 2);
    assert_eq!(run(&mut state, Actor::Spectator, &build), Err(CommandError::NotPermitted));
    assert_eq!(run(&mut state, Actor::Deity, &build), Err(CommandError::NotPermitted));
    assert_eq!(run(&mut state, Actor::Company(5), &build), Err(CommandError::UnknownCompany(5)));

    run(&mut state, ME, &build).expect("builds");
    // The deity clears anything, and pays nothing
    let clear = Command::LandscapeClear {
        tile: state.map.tile(2, 2),
    };
    assert!(run(&mut state, Actor::Deity, &clear).is_ok());
    assert_eq!(state.map.get(state.map.tile(2, 2)).kind, crate::map::TileKind::Clear);
}

#[test]
fn test_bounds_checked_before_anything_else() {
    let mut state = world(10_000);
    let far = TileIndex(9_999);
    let build = Command::BuildRailroadTrack {
        tile: far,
        track: Track::X,
        rail_type: RailType::Rail,
    };
    assert_eq!(run(&mut state, ME, &build), Err(CommandError::TileOutOfBounds(far)));
    let sell = Command::SellVehicle {
        vehicle: 3,
        whole_chain: false,
    };
    assert_eq!(run(&mut state, ME, &sell), Err(CommandError::UnknownVehicle(3)));
}

#[test]
fn test_bankrupt_company_may_only_steer() {
    let mut state = world(10_000);
    state.companies.get_mut(&0).expect("company").bankrupt = true;
    let build = track(&state, 2, 2);
    assert_eq!(run(&mut state, ME, &build), Err(CommandError::NotPermitted));
    let start = Command::StartStopVehicle { vehicle: 4 };
    assert_eq!(run(&mut state, ME, &start), Err(CommandError::UnknownVehicle(4)));
}

static SUCCEEDED: AtomicUsize = AtomicUsize::new(0);
static FAILED: AtomicUsize = AtomicUsize::new(0);

fn count_outcome(_: &WorldState, _: &Command, result: &CommandResult) {
    match result {
        Ok(_) => SUCCEEDED.fetch_add(1, Ordering::SeqCst),
        Err(_) => FAILED.fetch_add(1, Ordering::SeqCst),
    };
}

#[test]
fn test_callback_sees_every_outcome() {
    let mut state = world(10_000);
    let mut net = CommandQueue::default();
    let build = track(&state, 3, 3);
    assert!(do_command_p(&mut state, &mut net, ME, &build, Some(count_outcome)).is_ok());
    assert!(do_command_p(&mut state, &mut net, ME, &build, Some(count_outcome)).is_err());
    assert_eq!(SUCCEEDED.load(Ordering::SeqCst), 1);
    assert_eq!(FAILED.load(Ordering::SeqCst), 1);
}

#[test]
fn test_test_phase_changes_nothing() {
    let mut state = world(10_000);
    let before = state.checksum();
    let build = track(&state, 2, 2);
    let estimated = estimate(&mut state, ME, &build);
    assert_eq!(estimated, Ok(CommandCost::with_cost(ExpenseType::Construction, 100)));
    let tested = do_command(&mut state, ME, &build, DoFlags::TEST, ExecutionContext::TOP);
    assert_eq!(tested, estimated);
    assert_eq!(state.checksum(), before);

    let nested = do_command(&mut state, ME, &build, DoFlags::EXEC, ExecutionContext::TOP.nested());
    assert_eq!(nested, estimated);
    assert!(state.map.rail(state.map.tile(2, 2)).is_some());
    // Nested execution leaves the books to the outer command
    assert_eq!(state.companies[&0].money, 10_000);
}

fn any_command() -> impl Strategy<Value = Command> {
    let tile = (0u32..6, 0u32..6).prop_map(|(x, y)| TileIndex(y * 8 + x));
    let track = (0usize..6).prop_map(|i| Track::ALL[i]);
    let dir = (0usize..4).prop_map(|i| DiagDirection::ALL[i]);
    let axis = any::<bool>().prop_map(|x| if x { Axis::X } else { Axis::Y });
    prop_oneof![
        4 => (tile.clone(), track.clone()).prop_map(|(tile, track)| Command::BuildRailroadTrack {
            tile,
            track,
            rail_type: RailType::Rail,
        }),
        2 => (tile.clone(), track.clone())
            .prop_map(|(tile, track)| Command::RemoveRailroadTrack { tile, track }),
        2 => (tile.clone(), track.clone(), any::<bool>()).prop_map(|(tile, track, two_way)| {
            Command::BuildSingleSignal {
                tile,
                track,
                variant: SignalVariant::Block,
                facing: (!two_way).then(|| track.forward()),
            }
        }),
        1 => (tile.clone(), track).prop_map(|(tile, track)| Command::RemoveSingleSignal { tile, track }),
        1 => (tile.clone(), dir).prop_map(|(tile, exit)| Command::BuildTrainDepot {
            tile,
            exit,
            rail_type: RailType::Rail,
        }),
        1 => (tile.clone(), axis, 1u8..4).prop_map(|(tile, axis, length)| {
            Command::BuildRailStation {
                tile,
                axis,
                length,
                rail_type: RailType::Rail,
            }
        }),
        1 => (tile.clone(), tile.clone()).prop_map(|(start, end)| Command::BuildCanal { start, end }),
        2 => tile.prop_map(|tile| Command::LandscapeClear { tile }),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Whatever the sequence, a command that fails leaves the world as it
    /// was, and one that succeeds costs exactly what its test phase said.
    #[test]
    fn prop_test_and_execute_agree(commands in proptest::collection::vec(any_command(), 1..40)) {
        let mut state = world(1_000_000_000);
        for cmd in &commands {
            let before = state.checksum();
            let estimated = estimate(&mut state, ME, cmd);
            prop_assert_eq!(state.checksum(), before);
            let result = run(&mut state, ME, cmd);
            prop_assert_eq!(&result, &estimated);
            if result.is_err() {
                prop_assert_eq!(state.checksum(), before);
            }
            prop_assert!(!state.signal_batch_open);
        }
    }
}
