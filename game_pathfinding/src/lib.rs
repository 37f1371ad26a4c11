use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::hash::Hash;

/// A trait for graphs that can be searched.
///
/// `Node`: The type of node identifiers (e.g., a tile/trackdir key).
/// `Ctx`: A context object passed to cost calculations (e.g., the map).
pub trait Graph<Node, Ctx> {
    /// Return an iterator over the neighbors of a node.
    fn neighbors(&self, node: Node, context: &Ctx) -> Vec<Node>;

    /// Calculate the cost to move from `from` to `to`.
    /// This allows dynamic weighting based on the provided context.
    fn cost(&self, from: Node, to: Node, context: &Ctx) -> u32;

    /// Calculate the estimated cost (heuristic) from `from` to `target`.
    /// For A*, this must be admissible (never overestimate).
    fn heuristic(&self, from: Node, target: Node, context: &Ctx) -> u32;
}

/// A search space whose goal is a predicate rather than a single node.
///
/// Successors are produced together with the cost of the step, so the
/// implementation may price a transition using state it only knows while
/// expanding (curves, signals, skipped tunnel tiles).
///
/// Nodes may carry history (signals passed so far, say) that is not part of
/// their identity. The closed list is keyed on [`SearchSpace::key`]: once a
/// key is expanded, later nodes with the same key are dropped.
pub trait SearchSpace {
    type Node: Copy + Eq + Hash + std::fmt::Debug;
    type Key: Copy + Eq + Hash + std::fmt::Debug;

    fn key(&self, node: &Self::Node) -> Self::Key;

    /// Push every `(successor, step_cost)` reachable from `node` into `out`.
    fn successors(&mut self, node: &Self::Node, out: &mut Vec<(Self::Node, u32)>);

    /// Remaining cost estimate. Must never overestimate.
    fn estimate(&self, node: &Self::Node) -> u32;

    /// Whether `node` satisfies the search target.
    fn is_goal(&self, node: &Self::Node) -> bool;
}

/// Limits applied to a single search run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchLimits {
    /// Maximum number of node expansions before the search gives up.
    pub max_nodes: usize,
}

impl Default for SearchLimits {
    fn default() -> Self {
        Self { max_nodes: 10_000 }
    }
}

/// Why a search finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchStatus {
    /// A goal node was popped from the open list.
    Found,
    /// The open list ran empty.
    Exhausted,
    /// The expansion budget ran out first.
    BudgetExceeded,
}

/// Outcome of [`AStar::search`].
#[derive(Debug, Clone)]
pub struct SearchResult<Node> {
    pub status: SearchStatus,
    /// Path from an origin to the goal, inclusive, when found. Otherwise the
    /// path to the expanded node with the lowest estimate (best effort).
    pub path: Vec<Node>,
    /// Cost of `path`.
    pub cost: u32,
    /// Number of nodes expanded.
    pub expanded: usize,
}

impl<Node> SearchResult<Node> {
    pub fn found(&self) -> bool {
        self.status == SearchStatus::Found
    }

    /// First node of the returned path, i.e. the origin the search settled on.
    pub fn origin(&self) -> Option<&Node> {
        self.path.first()
    }
}

/// A generic A* pathfinder.
pub struct AStar;

impl AStar {
    /// Find the shortest path from `start` to `goal`.
    pub fn find_path<Node, Ctx, G>(
        graph: &G,
        start: Node,
        goal: Node,
        context: &Ctx,
    ) -> Option<(Vec<Node>, u32)>
    where
        Node: Copy + Eq + Hash + std::fmt::Debug,
        G: Graph<Node, Ctx>,
    {
        let mut space = GraphSpace {
            graph,
            goal,
            context,
        };
        let result = Self::search(
            &mut space,
            &[(start, 0)],
            SearchLimits {
                max_nodes: usize::MAX,
            },
        );
        result.found().then_some((result.path, result.cost))
    }

    /// Search from a set of weighted origins until `space.is_goal` holds.
    ///
    /// Ties on `f` are broken by lower `g`, then by insertion order, so two
    /// runs over the same space always pick the same path.
    pub fn search<S: SearchSpace>(
        space: &mut S,
        origins: &[(S::Node, u32)],
        limits: SearchLimits,
    ) -> SearchResult<S::Node> {
        let mut open_set = BinaryHeap::new();
        let mut came_from: HashMap<S::Key, S::Node> = HashMap::new();
        let mut g_score: HashMap<S::Key, u32> = HashMap::new();
        let mut closed_set: HashSet<S::Key> = HashSet::new();
        let mut seq = 0u64;

        for &(node, cost) in origins {
            let key = space.key(&node);
            if cost < *g_score.get(&key).unwrap_or(&u32::MAX) {
                g_score.insert(key, cost);
                open_set.push(State {
                    node,
                    cost,
                    priority: cost.saturating_add(space.estimate(&node)),
                    seq,
                });
                seq += 1;
            }
        }

        let mut best: Option<(u32, u32, S::Node)> = None;
        let mut expanded = 0usize;
        let mut successors = Vec::new();

        while let Some(State {
            node: current,
            cost: current_g,
            ..
        }) = open_set.pop()
        {
            let current_key = space.key(&current);
            // Stale heap entry or already processed with a better path
            if current_g > g_score[&current_key] || !closed_set.insert(current_key) {
                continue;
            }

            if space.is_goal(&current) {
                return SearchResult {
                    status: SearchStatus::Found,
                    path: reconstruct(space, &came_from, current),
                    cost: current_g,
                    expanded,
                };
            }

            let estimate = space.estimate(&current);
            if best.is_none_or(|(e, g, _)| (estimate, current_g) < (e, g)) {
                best = Some((estimate, current_g, current));
            }

            if expanded >= limits.max_nodes {
                return partial(space, SearchStatus::BudgetExceeded, &came_from, best, expanded);
            }
            expanded += 1;

            successors.clear();
            space.successors(&current, &mut successors);
            for &(neighbor, step) in &successors {
                let key = space.key(&neighbor);
                if closed_set.contains(&key) {
                    continue;
                }

                let tentative_g = current_g.saturating_add(step);
                if tentative_g < *g_score.get(&key).unwrap_or(&u32::MAX) {
                    came_from.insert(key, current);
                    g_score.insert(key, tentative_g);
                    open_set.push(State {
                        node: neighbor,
                        cost: tentative_g,
                        priority: tentative_g.saturating_add(space.estimate(&neighbor)),
                        seq,
                    });
                    seq += 1;
                }
            }
        }

        partial(space, SearchStatus::Exhausted, &came_from, best, expanded)
    }
}

fn reconstruct<S: SearchSpace>(
    space: &S,
    came_from: &HashMap<S::Key, S::Node>,
    last: S::Node,
) -> Vec<S::Node> {
    let mut path = vec![last];
    let mut curr = last;
    while let Some(&prev) = came_from.get(&space.key(&curr)) {
        path.push(prev);
        curr = prev;
    }
    path.reverse();
    path
}

fn partial<S: SearchSpace>(
    space: &S,
    status: SearchStatus,
    came_from: &HashMap<S::Key, S::Node>,
    best: Option<(u32, u32, S::Node)>,
    expanded: usize,
) -> SearchResult<S::Node> {
    match best {
        Some((_, cost, node)) => SearchResult {
            status,
            path: reconstruct(space, came_from, node),
            cost,
            expanded,
        },
        None => SearchResult {
            status,
            path: Vec::new(),
            cost: 0,
            expanded,
        },
    }
}

/// Adapts a single-target [`Graph`] to a [`SearchSpace`].
struct GraphSpace<'a, Node, Ctx, G> {
    graph: &'a G,
    goal: Node,
    context: &'a Ctx,
}

impl<Node, Ctx, G> SearchSpace for GraphSpace<'_, Node, Ctx, G>
where
    Node: Copy + Eq + Hash + std::fmt::Debug,
    G: Graph<Node, Ctx>,
{
    type Node = Node;
    type Key = Node;

    fn key(&self, node: &Node) -> Node {
        *node
    }

    fn successors(&mut self, node: &Node, out: &mut Vec<(Node, u32)>) {
        for next in self.graph.neighbors(*node, self.context) {
            out.push((next, self.graph.cost(*node, next, self.context)));
        }
    }

    fn estimate(&self, node: &Node) -> u32 {
        self.graph.heuristic(*node, self.goal, self.context)
    }

    fn is_goal(&self, node: &Node) -> bool {
        *node == self.goal
    }
}

/// Helper struct for the priority queue.
#[derive(Copy, Clone, Eq, PartialEq)]
struct State<Node> {
    node: Node,
    cost: u32,     // Actual cost from start (g_score)
    priority: u32, // Estimated total cost (f_score = g + h)
    seq: u64,      // Insertion order, final tie-break
}

// The priority queue depends on `Ord`.
// Explicitly implement the trait so the queue becomes a min-heap.
impl<Node: Eq> Ord for State<Node> {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| other.cost.cmp(&self.cost))
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl<Node: Eq> PartialOrd for State<Node> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
