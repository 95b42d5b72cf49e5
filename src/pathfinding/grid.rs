/// Grid A* over the walkability map.
///
/// The grid is a sparse blocked-set: water and colliding entities block
/// their tile, everything else is walkable. Costs are integer (10 cardinal,
/// 14 diagonal) and ties break on insertion order, so results are
/// deterministic for identical world state.
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};

use bevy::math::IVec2;
use bevy::prelude::*;

const CARDINAL_COST: u32 = 10;
const DIAGONAL_COST: u32 = 14;

/// Orderable wrapper around `IVec2` so it can sit in the open-set heap's
/// tuple key. The `u64` sequence number ahead of it is always unique, so
/// this ordering is never actually exercised, but the tuple's `Ord` impl
/// still requires every field to implement it.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct HeapTile(i32, i32);

impl From<IVec2> for HeapTile {
    fn from(v: IVec2) -> Self {
        HeapTile(v.x, v.y)
    }
}

impl From<HeapTile> for IVec2 {
    fn from(t: HeapTile) -> Self {
        IVec2::new(t.0, t.1)
    }
}

/// Sparse walkability map maintained by the entity layer.
#[derive(Resource, Debug, Default)]
pub struct PathfindingGrid {
    blocked: HashSet<IVec2>,
}

impl PathfindingGrid {
    pub fn block(&mut self, tile: IVec2) {
        self.blocked.insert(tile);
    }

    pub fn unblock(&mut self, tile: IVec2) {
        self.blocked.remove(&tile);
    }

    pub fn is_blocked(&self, tile: IVec2) -> bool {
        self.blocked.contains(&tile)
    }

    pub fn blocked_count(&self) -> usize {
        self.blocked.len()
    }
}

fn heuristic(a: IVec2, b: IVec2) -> u32 {
    // Octile distance scaled to match the step costs.
    let dx = (a.x - b.x).unsigned_abs();
    let dy = (a.y - b.y).unsigned_abs();
    let (lo, hi) = if dx < dy { (dx, dy) } else { (dy, dx) };
    DIAGONAL_COST * lo + CARDINAL_COST * (hi - lo)
}

const CARDINALS: [IVec2; 4] = [
    IVec2::new(1, 0),
    IVec2::new(-1, 0),
    IVec2::new(0, 1),
    IVec2::new(0, -1),
];

const DIAGONALS: [IVec2; 4] = [
    IVec2::new(1, 1),
    IVec2::new(1, -1),
    IVec2::new(-1, 1),
    IVec2::new(-1, -1),
];

/// A* search from `from` to `to`. Returns the waypoint tiles excluding the
/// start tile, or `None` when unreachable within `max_steps` expansions.
/// Diagonal steps never cut a blocked corner.
pub fn find_path(
    from: IVec2,
    to: IVec2,
    grid: &PathfindingGrid,
    allow_diagonal: bool,
    max_steps: Option<usize>,
) -> Option<Vec<IVec2>> {
    if grid.is_blocked(to) {
        return None;
    }
    if from == to {
        return Some(Vec::new());
    }

    let max_steps = max_steps.unwrap_or(5000);
    let mut open: BinaryHeap<Reverse<(u32, u64, HeapTile)>> = BinaryHeap::new();
    let mut g_score: HashMap<IVec2, u32> = HashMap::new();
    let mut came_from: HashMap<IVec2, IVec2> = HashMap::new();
    let mut seq: u64 = 0;

    g_score.insert(from, 0);
    open.push(Reverse((heuristic(from, to), seq, from.into())));

    let mut expansions = 0usize;
    while let Some(Reverse((_, _, current))) = open.pop() {
        let current: IVec2 = current.into();
        if current == to {
            let mut path = vec![current];
            let mut node = current;
            while let Some(&prev) = came_from.get(&node) {
                if prev == from {
                    break;
                }
                path.push(prev);
                node = prev;
            }
            path.reverse();
            return Some(path);
        }

        expansions += 1;
        if expansions > max_steps {
            return None;
        }

        let current_g = g_score[&current];
        let mut try_neighbor =
            |neighbor: IVec2,
             cost: u32,
             open: &mut BinaryHeap<Reverse<(u32, u64, HeapTile)>>,
             g_score: &mut HashMap<IVec2, u32>,
             came_from: &mut HashMap<IVec2, IVec2>| {
                if grid.is_blocked(neighbor) {
                    return;
                }
                let tentative = current_g + cost;
                if tentative < *g_score.get(&neighbor).unwrap_or(&u32::MAX) {
                    g_score.insert(neighbor, tentative);
                    came_from.insert(neighbor, current);
                    seq += 1;
                    open.push(Reverse((
                        tentative + heuristic(neighbor, to),
                        seq,
                        neighbor.into(),
                    )));
                }
            };

        for step in CARDINALS {
            try_neighbor(
                current + step,
                CARDINAL_COST,
                &mut open,
                &mut g_score,
                &mut came_from,
            );
        }
        if allow_diagonal {
            for step in DIAGONALS {
                // No corner cutting: both flanking cardinals must be open.
                let a = current + IVec2::new(step.x, 0);
                let b = current + IVec2::new(0, step.y);
                if grid.is_blocked(a) || grid.is_blocked(b) {
                    continue;
                }
                try_neighbor(
                    current + step,
                    DIAGONAL_COST,
                    &mut open,
                    &mut g_score,
                    &mut came_from,
                );
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_straight_line_path() {
        let grid = PathfindingGrid::default();
        let path = find_path(IVec2::ZERO, IVec2::new(3, 0), &grid, false, None).unwrap();
        assert_eq!(
            path,
            vec![IVec2::new(1, 0), IVec2::new(2, 0), IVec2::new(3, 0)]
        );
    }

    #[test]
    fn test_routes_around_wall() {
        let mut grid = PathfindingGrid::default();
        for y in -2..=2 {
            grid.block(IVec2::new(1, y));
        }
        let path = find_path(IVec2::ZERO, IVec2::new(2, 0), &grid, true, None).unwrap();
        assert!(!path.is_empty());
        assert!(path.iter().all(|t| !grid.is_blocked(*t)));
        assert_eq!(*path.last().unwrap(), IVec2::new(2, 0));
    }

    #[test]
    fn test_blocked_goal_fails_fast() {
        let mut grid = PathfindingGrid::default();
        grid.block(IVec2::new(5, 5));
        assert!(find_path(IVec2::ZERO, IVec2::new(5, 5), &grid, true, None).is_none());
    }

    #[test]
    fn test_no_corner_cutting() {
        let mut grid = PathfindingGrid::default();
        grid.block(IVec2::new(1, 0));
        grid.block(IVec2::new(0, 1));
        let path = find_path(IVec2::ZERO, IVec2::new(1, 1), &grid, true, None).unwrap();
        // The diagonal through the blocked corner pair is forbidden.
        assert!(path.len() > 1);
    }

    #[test]
    fn test_same_tile_is_empty_path() {
        let grid = PathfindingGrid::default();
        assert_eq!(
            find_path(IVec2::ONE, IVec2::ONE, &grid, true, None),
            Some(vec![])
        );
    }
}
