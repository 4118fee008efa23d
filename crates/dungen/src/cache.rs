use std::collections::{HashMap, HashSet, VecDeque};

use parking_lot::RwLock;
use shardworld_common::{CELL_HEIGHT, CELL_WIDTH, CellId, Direction, GlobalCoord, LocalCoord};

use crate::generator::{Breakouts, Generator};
use crate::tile::{Tile, TileMap};

/// Default number of cells kept before unpinned cells are evicted.
pub const DEFAULT_CACHE_CAPACITY: usize = 1000;

#[derive(Debug, Clone)]
struct CellEntry {
    tiles: TileMap,
    breakouts: Breakouts,
    stitched: [bool; 4],
}

/// Memoised cell layouts, shared by the coordinator and every shard worker.
///
/// Reads take a shared lock. A miss generates the cell outside any lock and
/// inserts it first-writer-wins; since generation is deterministic, losing
/// that race is harmless. Stitching holds the write lock for the whole
/// carve, so readers never see a half-carved corridor.
#[derive(Debug)]
pub struct DungeonCache {
    generator: Generator,
    capacity: usize,
    overrides: HashMap<CellId, TileMap>,
    cells: RwLock<HashMap<CellId, CellEntry>>,
}

impl DungeonCache {
    pub fn new(generator: Generator, capacity: usize) -> Self {
        Self {
            generator,
            capacity,
            overrides: HashMap::new(),
            cells: RwLock::new(HashMap::new()),
        }
    }

    /// Serve `cell` from `tiles` instead of the generator.
    pub fn with_override(mut self, cell: CellId, tiles: TileMap) -> Self {
        self.cells.get_mut().remove(&cell);
        self.overrides.insert(cell, tiles);
        self
    }

    pub fn generator(&self) -> &Generator {
        &self.generator
    }

    /// Number of cells currently cached.
    pub fn len(&self) -> usize {
        self.cells.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.read().is_empty()
    }

    pub fn contains(&self, cell: CellId) -> bool {
        self.cells.read().contains_key(&cell)
    }

    fn build(&self, cell: CellId) -> CellEntry {
        match self.overrides.get(&cell) {
            Some(tiles) => CellEntry {
                breakouts: tiles.exposed_walls(),
                tiles: tiles.clone(),
                stitched: [false; 4],
            },
            None => {
                let generated = self.generator.generate(cell);
                CellEntry {
                    tiles: generated.tiles,
                    breakouts: generated.breakouts,
                    stitched: [false; 4],
                }
            }
        }
    }

    /// Generate `cell` if it is not cached yet.
    pub fn ensure(&self, cell: CellId) {
        if self.contains(cell) {
            return;
        }
        let entry = self.build(cell);
        self.cells.write().entry(cell).or_insert(entry);
    }

    /// Run `f` against the tiles of `cell`, generating them first if needed.
    pub fn with_cell<R>(&self, cell: CellId, f: impl FnOnce(&TileMap) -> R) -> R {
        {
            let cells = self.cells.read();
            if let Some(entry) = cells.get(&cell) {
                return f(&entry.tiles);
            }
        }
        let entry = self.build(cell);
        let mut cells = self.cells.write();
        let entry = cells.entry(cell).or_insert(entry);
        f(&entry.tiles)
    }

    /// A copy of the tiles of `cell`.
    pub fn tiles(&self, cell: CellId) -> TileMap {
        self.with_cell(cell, TileMap::clone)
    }

    pub fn tile_at(&self, coord: GlobalCoord) -> Tile {
        let local = coord.local();
        self.with_cell(coord.cell(), |tiles| tiles.get(local))
    }

    pub fn walkable_at(&self, coord: GlobalCoord) -> bool {
        self.tile_at(coord).is_walkable()
    }

    pub fn is_stitched(&self, cell: CellId, dir: Direction) -> bool {
        self.cells
            .read()
            .get(&cell)
            .is_some_and(|e| e.stitched[dir.index()])
    }

    /// Carve passages between `cell` and every cached neighbour it is not
    /// yet joined to. The neighbour's facing edge is carved in the same
    /// pass, aligned with this cell's opening. Safe to call repeatedly.
    pub fn ensure_stitched(&self, cell: CellId) {
        self.ensure(cell);
        for dir in Direction::ALL {
            let neighbor = cell.neighbor(dir);
            let mut cells = self.cells.write();
            let pending = cells.get(&cell).is_some_and(|e| !e.stitched[dir.index()])
                || cells
                    .get(&neighbor)
                    .is_some_and(|e| !e.stitched[dir.opposite().index()]);
            if !pending || !cells.contains_key(&neighbor) {
                continue;
            }
            let Some(mut mine) = cells.remove(&cell) else {
                continue;
            };
            let Some(mut theirs) = cells.remove(&neighbor) else {
                cells.insert(cell, mine);
                continue;
            };
            stitch_pair(&mut mine, &mut theirs, dir);
            tracing::debug!(%cell, %neighbor, ?dir, "stitched cells");
            cells.insert(cell, mine);
            cells.insert(neighbor, theirs);
        }
    }

    /// Evict cells outside `keep` once the cache has grown past capacity.
    /// Evicted cells regenerate identically on next access; their stitching
    /// is redone when they are next stitched.
    pub fn trim(&self, keep: &HashSet<CellId>) -> usize {
        let mut cells = self.cells.write();
        if cells.len() <= self.capacity {
            return 0;
        }
        let before = cells.len();
        cells.retain(|cell, _| keep.contains(cell));
        let evicted = before - cells.len();
        tracing::debug!(evicted, remaining = cells.len(), "trimmed dungeon cache");
        evicted
    }
}

impl Default for DungeonCache {
    fn default() -> Self {
        Self::new(Generator::default(), DEFAULT_CACHE_CAPACITY)
    }
}

fn stitch_pair(mine: &mut CellEntry, theirs: &mut CellEntry, dir: Direction) {
    let back = dir.opposite();
    if !mine.stitched[dir.index()] {
        let target = opening_on_edge(&theirs.tiles, back);
        carve_edge(mine, dir, target);
        mine.stitched[dir.index()] = true;
    }
    if !theirs.stitched[back.index()] {
        let target = opening_on_edge(&mine.tiles, dir);
        carve_edge(theirs, back, target);
        theirs.stitched[back.index()] = true;
    }
}

/// Number of tiles along the edge facing `dir`.
fn edge_len(dir: Direction) -> usize {
    match dir {
        Direction::North | Direction::South => CELL_WIDTH,
        Direction::East | Direction::West => CELL_HEIGHT,
    }
}

/// The tile at position `lateral` along the edge facing `dir`.
fn edge_tile(dir: Direction, lateral: usize) -> LocalCoord {
    match dir {
        Direction::North => LocalCoord::new(lateral, 0),
        Direction::South => LocalCoord::new(lateral, CELL_HEIGHT - 1),
        Direction::West => LocalCoord::new(0, lateral),
        Direction::East => LocalCoord::new(CELL_WIDTH - 1, lateral),
    }
}

fn lateral_of(dir: Direction, at: LocalCoord) -> usize {
    match dir {
        Direction::North | Direction::South => at.x,
        Direction::East | Direction::West => at.y,
    }
}

/// First walkable position along the edge facing `dir`, corners excluded.
fn opening_on_edge(tiles: &TileMap, dir: Direction) -> Option<usize> {
    (1..edge_len(dir) - 1).find(|l| tiles.is_walkable(edge_tile(dir, *l)))
}

struct Passage {
    path: Vec<LocalCoord>,
    /// Breakout wall to turn into a door, when the path ends against one.
    door: Option<LocalCoord>,
}

fn carve_edge(entry: &mut CellEntry, dir: Direction, target: Option<usize>) {
    // Already open where the neighbour is.
    if target.is_some_and(|l| entry.tiles.is_walkable(edge_tile(dir, l))) {
        return;
    }
    if let Some(lateral) = target {
        if let Some(passage) = search(entry, &[edge_tile(dir, lateral)]) {
            apply(entry, passage);
            return;
        }
    }

    let starts: Vec<LocalCoord> = (1..edge_len(dir) - 1).map(|l| edge_tile(dir, l)).collect();
    if let Some(passage) = search(entry, &starts) {
        let reached = lateral_of(dir, passage.path[0]);
        apply(entry, passage);
        if let Some(lateral) = target {
            let (lo, hi) = (reached.min(lateral), reached.max(lateral));
            for l in lo..=hi {
                let at = edge_tile(dir, l);
                if entry.tiles.get(at) == Tile::Unused {
                    entry.tiles.set(at, Tile::Corridor);
                }
            }
        }
        return;
    }

    tracing::warn!(?dir, "no passage found; carving fallback corridor");
    let mut at = edge_tile(dir, target.unwrap_or(edge_len(dir) / 2));
    while entry.tiles.get(at) == Tile::Unused {
        entry.tiles.set(at, Tile::Corridor);
        match at.step(dir.opposite()) {
            Some(next) if next.in_interior() => at = next,
            _ => break,
        }
    }
}

/// Breadth-first search over unused tiles, starting from `starts`, for the
/// nearest tile that touches walkable floor or sits just outside a
/// breakout wall.
fn search(entry: &CellEntry, starts: &[LocalCoord]) -> Option<Passage> {
    let tiles = &entry.tiles;
    let mut came_from: HashMap<LocalCoord, Option<LocalCoord>> = HashMap::new();
    let mut queue = VecDeque::new();
    for start in starts {
        if tiles.get(*start) == Tile::Unused && !came_from.contains_key(start) {
            came_from.insert(*start, None);
            queue.push_back(*start);
        }
    }

    while let Some(at) = queue.pop_front() {
        if let Some(door) = connection_from(entry, at) {
            let mut path = vec![at];
            let mut cursor = at;
            while let Some(Some(prev)) = came_from.get(&cursor) {
                path.push(*prev);
                cursor = *prev;
            }
            path.reverse();
            return Some(Passage { path, door });
        }
        for dir in Direction::ALL {
            let Some(next) = at.step(dir) else { continue };
            if !next.in_interior() || came_from.contains_key(&next) {
                continue;
            }
            if tiles.get(next) != Tile::Unused {
                continue;
            }
            came_from.insert(next, Some(at));
            queue.push_back(next);
        }
    }
    None
}

/// `Some(None)` when `at` touches walkable floor directly, `Some(Some(wall))`
/// when it lies just outside a breakout wall, `None` otherwise.
fn connection_from(entry: &CellEntry, at: LocalCoord) -> Option<Option<LocalCoord>> {
    let tiles = &entry.tiles;
    for dir in Direction::ALL {
        if let Some(n) = at.step(dir) {
            if tiles.is_walkable(n) {
                return Some(None);
            }
        }
    }
    for dir in Direction::ALL {
        let Some(wall) = at.step(dir.opposite()) else {
            continue;
        };
        if tiles.get(wall) == Tile::Wall && entry.breakouts[dir.index()].contains(&wall) {
            return Some(Some(wall));
        }
    }
    None
}

fn apply(entry: &mut CellEntry, passage: Passage) {
    for at in &passage.path {
        entry.tiles.set(*at, Tile::Corridor);
    }
    if let Some(door) = passage.door {
        entry.tiles.set(door, Tile::Door);
    }
}
