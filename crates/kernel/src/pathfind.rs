//! Bounded A* over the 4-connected tile grid.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};

use shardworld_common::GlobalCoord;

/// Outcome of a search. `path` excludes the start and ends at the goal when
/// `found` is set; it is empty otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PathResult {
    pub path: Vec<GlobalCoord>,
    pub found: bool,
    /// Nodes expanded before the search stopped.
    pub expanded: usize,
}

impl PathResult {
    /// The only part movers act on; they replan on every move.
    pub fn first_step(&self) -> Option<GlobalCoord> {
        if self.found { self.path.first().copied() } else { None }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PathNode {
    coord: GlobalCoord,
    estimated_total: i64,
    seq: u64,
}

// Min-heap on estimated total; equal estimates pop in insertion order.
impl Ord for PathNode {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .estimated_total
            .cmp(&self.estimated_total)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for PathNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Search from `start` to `goal` expanding at most `budget` nodes.
///
/// `is_open` filters every neighbour except the goal itself, which is
/// usually occupied by whatever is being chased.
pub fn find_path(
    start: GlobalCoord,
    goal: GlobalCoord,
    budget: usize,
    is_open: impl Fn(GlobalCoord) -> bool,
) -> PathResult {
    if start == goal {
        return PathResult {
            path: Vec::new(),
            found: true,
            expanded: 0,
        };
    }

    let mut open_set = BinaryHeap::new();
    let mut came_from: HashMap<GlobalCoord, GlobalCoord> = HashMap::new();
    let mut g_score: HashMap<GlobalCoord, i64> = HashMap::new();
    let mut closed: HashSet<GlobalCoord> = HashSet::new();
    let mut seq = 0u64;
    let mut expanded = 0usize;

    g_score.insert(start, 0);
    open_set.push(PathNode {
        coord: start,
        estimated_total: start.manhattan(goal),
        seq,
    });

    while let Some(current) = open_set.pop() {
        if current.coord == goal {
            return PathResult {
                path: reconstruct(&came_from, start, goal),
                found: true,
                expanded,
            };
        }
        if !closed.insert(current.coord) {
            continue;
        }
        if expanded >= budget {
            break;
        }
        expanded += 1;

        let g = g_score.get(&current.coord).copied().unwrap_or(i64::MAX);
        for neighbor in current.coord.neighbors4() {
            if neighbor != goal && !is_open(neighbor) {
                continue;
            }
            let tentative = g + 1;
            if tentative < g_score.get(&neighbor).copied().unwrap_or(i64::MAX) {
                came_from.insert(neighbor, current.coord);
                g_score.insert(neighbor, tentative);
                seq += 1;
                open_set.push(PathNode {
                    coord: neighbor,
                    estimated_total: tentative + neighbor.manhattan(goal),
                    seq,
                });
            }
        }
    }

    tracing::trace!(%start, %goal, expanded, "path search gave up");
    PathResult {
        path: Vec::new(),
        found: false,
        expanded,
    }
}

fn reconstruct(
    came_from: &HashMap<GlobalCoord, GlobalCoord>,
    start: GlobalCoord,
    goal: GlobalCoord,
) -> Vec<GlobalCoord> {
    let mut path = vec![goal];
    let mut current = goal;
    while let Some(&prev) = came_from.get(&current) {
        if prev == start {
            break;
        }
        path.push(prev);
        current = prev;
    }
    path.reverse();
    path
}
