use std::collections::BTreeSet;
use std::str::FromStr;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use shardworld_common::{CELL_HEIGHT, CELL_WIDTH, CellId, Direction, LocalCoord};

use crate::error::DungenError;
use crate::tile::{Tile, TileMap};

/// Walls (or corridor tiles) that a new feature may grow out of, grouped by
/// the direction they face.
pub type Breakouts = [Vec<LocalCoord>; 4];

/// Global entropy mixed into every cell's seed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Entropy(pub [u8; 16]);

impl Default for Entropy {
    fn default() -> Self {
        Self([1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 55, 13, 14, 15, 16])
    }
}

impl FromStr for Entropy {
    type Err = DungenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.len() != 32 || !s.is_ascii() {
            return Err(DungenError::InvalidEntropy(s.to_string()));
        }
        let mut out = [0u8; 16];
        for (i, byte) in out.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&s[i * 2..i * 2 + 2], 16)
                .map_err(|_| DungenError::InvalidEntropy(s.to_string()))?;
        }
        Ok(Self(out))
    }
}

impl TryFrom<String> for Entropy {
    type Error = DungenError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Entropy> for String {
    fn from(value: Entropy) -> Self {
        value.to_string()
    }
}

impl std::fmt::Display for Entropy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for b in self.0 {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

/// Tuning knobs for the room-and-corridor generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Rooms plus corridors to aim for, including the seed room.
    pub target_features: usize,
    /// Percent chance that a new feature is a room rather than a corridor.
    pub chance_room: u32,
    pub max_room_width: usize,
    pub max_room_height: usize,
    pub max_corridor_length: usize,
    /// Growth attempts before accepting fewer features than targeted.
    pub feature_attempts: usize,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            target_features: 20,
            chance_room: 50,
            max_room_width: 28,
            max_room_height: 14,
            max_corridor_length: 16,
            feature_attempts: 1000,
        }
    }
}

/// Output of one generation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedCell {
    pub tiles: TileMap,
    pub breakouts: Breakouts,
    /// Features actually placed, seed room included.
    pub features: usize,
}

/// Deterministic room-and-corridor generator.
#[derive(Debug, Clone, Default)]
pub struct Generator {
    config: GeneratorConfig,
    entropy: Entropy,
}

impl Generator {
    pub fn new(config: GeneratorConfig, entropy: Entropy) -> Self {
        Self { config, entropy }
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    pub fn entropy(&self) -> Entropy {
        self.entropy
    }

    /// SHA-256 of the cell's canonical bytes followed by the entropy.
    pub fn seed_for(&self, cell: CellId) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(cell.to_bytes());
        hasher.update(self.entropy.0);
        hasher.finalize().into()
    }

    /// Generate the layout of `cell`. Same cell and entropy, same bytes.
    pub fn generate(&self, cell: CellId) -> GeneratedCell {
        let _span = tracing::trace_span!("generate_cell", %cell).entered();
        let rng = ChaCha8Rng::from_seed(self.seed_for(cell));
        let generated = Builder::new(&self.config, rng).run();
        tracing::trace!(
            features = generated.features,
            walkable = generated.tiles.walkable_count(),
            "cell generated"
        );
        generated
    }
}

/// An axis-aligned rectangle of tiles, inclusive of its walls.
#[derive(Debug, Clone, Copy)]
struct Rect {
    x0: i64,
    y0: i64,
    width: i64,
    height: i64,
}

impl Rect {
    fn x1(&self) -> i64 {
        self.x0 + self.width - 1
    }

    fn y1(&self) -> i64 {
        self.y0 + self.height - 1
    }

    fn in_interior(&self) -> bool {
        self.x0 >= 1
            && self.y0 >= 1
            && self.x1() <= CELL_WIDTH as i64 - 2
            && self.y1() <= CELL_HEIGHT as i64 - 2
    }

    fn coords(&self) -> impl Iterator<Item = LocalCoord> + '_ {
        (self.y0..=self.y1()).flat_map(move |y| {
            (self.x0..=self.x1()).map(move |x| LocalCoord::new(x as usize, y as usize))
        })
    }
}

struct Builder<'a> {
    config: &'a GeneratorConfig,
    rng: ChaCha8Rng,
    tiles: TileMap,
    candidates: [BTreeSet<LocalCoord>; 4],
}

impl<'a> Builder<'a> {
    fn new(config: &'a GeneratorConfig, rng: ChaCha8Rng) -> Self {
        Self {
            config,
            rng,
            tiles: TileMap::new(),
            candidates: Default::default(),
        }
    }

    fn run(mut self) -> GeneratedCell {
        self.seed_room();
        let mut features = 1;

        for _ in 0..self.config.feature_attempts {
            if features >= self.config.target_features {
                break;
            }
            let Some((dir, from)) = self.pick_candidate() else {
                break;
            };
            let Some(start) = from.step(dir) else {
                self.candidates[dir.index()].remove(&from);
                continue;
            };
            let placed = if self.rng.gen_range(0..100) < self.config.chance_room {
                self.try_room(start, dir)
            } else {
                self.try_corridor(start, dir)
            };
            if placed {
                features += 1;
                if self.tiles.get(from) == Tile::Wall {
                    self.tiles.set(from, Tile::Door);
                }
                self.prune();
            }
        }

        GeneratedCell {
            tiles: self.tiles,
            breakouts: self.candidates.map(|set| set.into_iter().collect()),
            features,
        }
    }

    fn seed_room(&mut self) {
        let width = self.rng.gen_range(6..=self.config.max_room_width.max(6)) as i64;
        let height = self.rng.gen_range(5..=self.config.max_room_height.max(5)) as i64;
        let cx = CELL_WIDTH as i64 / 2 + self.rng.gen_range(-4..=4);
        let cy = CELL_HEIGHT as i64 / 2 + self.rng.gen_range(-2..=2);
        let width = width.min(CELL_WIDTH as i64 - 2);
        let height = height.min(CELL_HEIGHT as i64 - 2);
        let rect = Rect {
            x0: (cx - width / 2).clamp(1, CELL_WIDTH as i64 - 1 - width),
            y0: (cy - height / 2).clamp(1, CELL_HEIGHT as i64 - 1 - height),
            width,
            height,
        };
        self.commit_room(rect);
    }

    /// Choose a random direction, falling through the others when its set
    /// is empty, then a random candidate facing that way.
    fn pick_candidate(&mut self) -> Option<(Direction, LocalCoord)> {
        let first = self.rng.gen_range(0..4);
        for turn in 0..4 {
            let dir = Direction::ALL[(first + turn) % 4];
            let set = &self.candidates[dir.index()];
            if set.is_empty() {
                continue;
            }
            let n = self.rng.gen_range(0..set.len());
            return set.iter().nth(n).map(|c| (dir, *c));
        }
        None
    }

    /// A room whose near wall contains `start`, extending away in `dir`.
    fn try_room(&mut self, start: LocalCoord, dir: Direction) -> bool {
        let width = self.rng.gen_range(4..=self.config.max_room_width.max(4)) as i64;
        let height = self.rng.gen_range(4..=self.config.max_room_height.max(4)) as i64;
        let (sx, sy) = (start.x as i64, start.y as i64);
        let rect = match dir {
            Direction::North => Rect {
                x0: sx - width / 2,
                y0: sy - height + 1,
                width,
                height,
            },
            Direction::South => Rect {
                x0: sx - width / 2,
                y0: sy,
                width,
                height,
            },
            Direction::East => Rect {
                x0: sx,
                y0: sy - height / 2,
                width,
                height,
            },
            Direction::West => Rect {
                x0: sx - width + 1,
                y0: sy - height / 2,
                width,
                height,
            },
        };
        if !self.is_free(&rect) {
            return false;
        }
        self.commit_room(rect);
        self.tiles.set(start, Tile::Floor);
        true
    }

    /// A straight corridor starting at `start` and running in `dir`.
    fn try_corridor(&mut self, start: LocalCoord, dir: Direction) -> bool {
        let length = self.rng.gen_range(2..=self.config.max_corridor_length.max(2));
        let mut path = Vec::with_capacity(length);
        let mut at = start;
        for i in 0..length {
            if !at.in_interior() || self.tiles.get(at) != Tile::Unused {
                return false;
            }
            path.push(at);
            if i + 1 < length {
                match at.step(dir) {
                    Some(next) => at = next,
                    None => return false,
                }
            }
        }
        for at in &path {
            self.tiles.set(*at, Tile::Corridor);
            self.candidates[dir.cw().index()].insert(*at);
            self.candidates[dir.ccw().index()].insert(*at);
        }
        self.candidates[dir.index()].insert(at);
        true
    }

    fn is_free(&self, rect: &Rect) -> bool {
        rect.in_interior() && rect.coords().all(|c| self.tiles.get(c) == Tile::Unused)
    }

    fn commit_room(&mut self, rect: Rect) {
        for at in rect.coords() {
            let (x, y) = (at.x as i64, at.y as i64);
            let on_x_edge = x == rect.x0 || x == rect.x1();
            let on_y_edge = y == rect.y0 || y == rect.y1();
            let tile = if on_x_edge || on_y_edge {
                Tile::Wall
            } else {
                Tile::Floor
            };
            self.tiles.set(at, tile);

            // Corners never become doors.
            if on_x_edge && on_y_edge {
                continue;
            }
            if y == rect.y0 {
                self.candidates[Direction::North.index()].insert(at);
            } else if y == rect.y1() {
                self.candidates[Direction::South.index()].insert(at);
            } else if x == rect.x0 {
                self.candidates[Direction::West.index()].insert(at);
            } else if x == rect.x1() {
                self.candidates[Direction::East.index()].insert(at);
            }
        }
    }

    /// Drop candidates that are no longer growable: the tile itself changed
    /// (wall turned into a door or floor), or the tile beyond it is taken.
    fn prune(&mut self) {
        let tiles = &self.tiles;
        for dir in Direction::ALL {
            self.candidates[dir.index()].retain(|at| {
                matches!(tiles.get(*at), Tile::Wall | Tile::Corridor)
                    && at
                        .step(dir)
                        .is_some_and(|beyond| tiles.get(beyond) == Tile::Unused)
            });
        }
    }
}
