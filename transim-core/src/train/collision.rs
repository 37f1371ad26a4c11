//! Train to train collisions.

use super::crash::mark_crashed;
use crate::map::TileIndex;
use crate::news::NewsEvent;
use crate::state::WorldState;
use crate::vehicle::{chain, part, VehicleId};

/// Largest height difference at which two parts still touch.
const MAX_Z_DIFF: i32 = 5;

/// Physical extent of one visible part.
#[derive(Debug, Clone, Copy)]
struct Body {
    x: i32,
    y: i32,
    z: i32,
    length: u16,
}

fn bodies(state: &WorldState, front: VehicleId) -> Vec<Body> {
    chain(&state.vehicles, front)
        .into_iter()
        .filter_map(|id| part(&state.vehicles, id))
        .filter(|p| !p.flags.hidden && !p.location.is_in_depot())
        .map(|p| Body {
            x: p.location.x,
            y: p.location.y,
            z: p.location.z,
            length: p.length,
        })
        .collect()
}

fn touches(a: &Body, b: &Body) -> bool {
    let min_diff = (a.length as i32 + 1) / 2 + (b.length as i32 + 1) / 2 - 1;
    let dx = a.x - b.x;
    let dy = a.y - b.y;
    dx * dx + dy * dy <= min_diff * min_diff && (a.z - b.z).abs() <= MAX_Z_DIFF
}

/// Check the train at `front` against every other train of its owner.
/// Both trains of a collision are marked crashed. Returns the number of
/// victims.
pub fn check_train_collision(state: &mut WorldState, front: VehicleId) -> u32 {
    let Some(owner) = part(&state.vehicles, front).map(|p| p.owner) else {
        return 0;
    };
    if state.consist(front).map_or(true, |c| c.flags.crashed || c.trail().is_none()) {
        return 0;
    }
    let ours = bodies(state, front);
    let hit: Vec<VehicleId> = state
        .train_fronts()
        .into_iter()
        .filter(|&other| other != front)
        .filter(|&other| part(&state.vehicles, other).is_some_and(|p| p.owner == owner))
        .filter(|&other| {
            let theirs = bodies(state, other);
            ours.iter().any(|a| theirs.iter().any(|b| touches(a, b)))
        })
        .collect();
    if hit.is_empty() {
        return 0;
    }

    let mut victims = mark_crashed(state, front);
    for &other in &hit {
        victims += mark_crashed(state, other);
    }
    let tile = part(&state.vehicles, front).map_or(TileIndex(0), |p| p.location.tile);
    log::warn!("train {front} collided with {hit:?} at {tile}, {victims} victims");
    state.news.push(NewsEvent::TrainCrash {
        tick: state.tick,
        tile,
        victims,
    });
    victims
}
