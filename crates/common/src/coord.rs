use serde::{Deserialize, Serialize};

/// Width of one cell, in tiles.
pub const CELL_WIDTH: usize = 79;
/// Height of one cell, in tiles.
pub const CELL_HEIGHT: usize = 25;

const WIDTH: i64 = CELL_WIDTH as i64;
const HEIGHT: i64 = CELL_HEIGHT as i64;

/// Half-extent of a viewer's window, in tiles.
pub const VIEW_HALF_WIDTH: i64 = WIDTH / 2;
/// Vertical half-extent of a viewer's window, in tiles.
pub const VIEW_HALF_HEIGHT: i64 = HEIGHT / 2;

/// One of the four grid directions. North is towards negative `y`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Direction {
    North,
    East,
    South,
    West,
}

impl Direction {
    /// Clockwise order starting at north.
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::East,
        Direction::South,
        Direction::West,
    ];

    /// Unit step `(dx, dy)` for this direction.
    pub fn offset(self) -> (i64, i64) {
        match self {
            Direction::North => (0, -1),
            Direction::East => (1, 0),
            Direction::South => (0, 1),
            Direction::West => (-1, 0),
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Direction::North => Direction::South,
            Direction::East => Direction::West,
            Direction::South => Direction::North,
            Direction::West => Direction::East,
        }
    }

    /// Quarter turn clockwise.
    pub fn cw(self) -> Self {
        match self {
            Direction::North => Direction::East,
            Direction::East => Direction::South,
            Direction::South => Direction::West,
            Direction::West => Direction::North,
        }
    }

    /// Quarter turn counter-clockwise.
    pub fn ccw(self) -> Self {
        self.cw().opposite()
    }

    /// Position in [`Direction::ALL`], handy for per-direction arrays.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Parse a wire move character (`n`, `e`, `s`, `w`, either case).
    pub fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_lowercase() {
            'n' => Some(Direction::North),
            'e' => Some(Direction::East),
            's' => Some(Direction::South),
            'w' => Some(Direction::West),
            _ => None,
        }
    }

    pub fn as_char(self) -> char {
        match self {
            Direction::North => 'n',
            Direction::East => 'e',
            Direction::South => 's',
            Direction::West => 'w',
        }
    }
}

/// A tile position anywhere in the unbounded world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GlobalCoord {
    pub x: i64,
    pub y: i64,
}

impl GlobalCoord {
    pub const fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }

    /// The cell that owns this coordinate.
    pub fn cell(self) -> CellId {
        CellId {
            x: self.x.div_euclid(WIDTH),
            y: self.y.div_euclid(HEIGHT),
        }
    }

    /// Offset of this coordinate inside its cell.
    pub fn local(self) -> LocalCoord {
        LocalCoord {
            x: self.x.rem_euclid(WIDTH) as usize,
            y: self.y.rem_euclid(HEIGHT) as usize,
        }
    }

    /// True when both coordinates belong to the same cell.
    pub fn is_local_to(self, other: GlobalCoord) -> bool {
        self.cell() == other.cell()
    }

    pub fn moved(self, dir: Direction) -> Self {
        let (dx, dy) = dir.offset();
        Self::new(self.x + dx, self.y + dy)
    }

    /// Direction of a unit step from `self` to `other`, if they are 4-adjacent.
    pub fn direction_to(self, other: GlobalCoord) -> Option<Direction> {
        Direction::ALL
            .into_iter()
            .find(|d| self.moved(*d) == other)
    }

    pub fn manhattan(self, other: GlobalCoord) -> i64 {
        (self.x - other.x).abs() + (self.y - other.y).abs()
    }

    pub fn euclidean(self, other: GlobalCoord) -> f64 {
        let dx = (self.x - other.x) as f64;
        let dy = (self.y - other.y) as f64;
        (dx * dx + dy * dy).sqrt()
    }

    /// North, south, west, east neighbours.
    pub fn neighbors4(self) -> [GlobalCoord; 4] {
        [
            self.moved(Direction::North),
            self.moved(Direction::South),
            self.moved(Direction::West),
            self.moved(Direction::East),
        ]
    }

    /// True when `other` falls inside the viewing window centred on `self`.
    pub fn in_view(self, other: GlobalCoord) -> bool {
        (self.x - other.x).abs() <= VIEW_HALF_WIDTH && (self.y - other.y).abs() <= VIEW_HALF_HEIGHT
    }
}

impl std::fmt::Display for GlobalCoord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Identity of a cell: the floor-divided coordinate of its tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellId {
    pub x: i64,
    pub y: i64,
}

impl CellId {
    pub const fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }

    /// Global coordinate of local `(0, 0)`.
    pub fn corner(self) -> GlobalCoord {
        GlobalCoord::new(self.x * WIDTH, self.y * HEIGHT)
    }

    pub fn global(self, local: LocalCoord) -> GlobalCoord {
        let corner = self.corner();
        GlobalCoord::new(corner.x + local.x as i64, corner.y + local.y as i64)
    }

    pub fn neighbor(self, dir: Direction) -> CellId {
        let (dx, dy) = dir.offset();
        CellId::new(self.x + dx, self.y + dy)
    }

    /// This cell and its eight surrounding cells.
    pub fn expansion(self) -> impl Iterator<Item = CellId> {
        (-1..=1).flat_map(move |dy| (-1..=1).map(move |dx| CellId::new(self.x + dx, self.y + dy)))
    }

    pub fn contains(self, coord: GlobalCoord) -> bool {
        coord.cell() == self
    }

    /// Canonical byte form used when deriving the cell's generation seed.
    pub fn to_bytes(self) -> [u8; 16] {
        let mut out = [0u8; 16];
        out[..8].copy_from_slice(&self.x.to_le_bytes());
        out[8..].copy_from_slice(&self.y.to_le_bytes());
        out
    }

    /// Cells intersecting the viewing window centred on `center`, sorted and
    /// without duplicates. At most four cells, since the window is no larger
    /// than a cell.
    pub fn visible_from(center: GlobalCoord) -> Vec<CellId> {
        let min = GlobalCoord::new(center.x - VIEW_HALF_WIDTH, center.y - VIEW_HALF_HEIGHT).cell();
        let max = GlobalCoord::new(center.x + VIEW_HALF_WIDTH, center.y + VIEW_HALF_HEIGHT).cell();
        let mut cells = Vec::with_capacity(4);
        for y in min.y..=max.y {
            for x in min.x..=max.x {
                cells.push(CellId::new(x, y));
            }
        }
        cells
    }
}

impl std::fmt::Display for CellId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {}]", self.x, self.y)
    }
}

/// A tile position inside one cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LocalCoord {
    pub x: usize,
    pub y: usize,
}

impl LocalCoord {
    pub const fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }

    pub fn in_bounds(self) -> bool {
        self.x < CELL_WIDTH && self.y < CELL_HEIGHT
    }

    /// At least one tile away from every cell edge.
    pub fn in_interior(self) -> bool {
        self.x >= 1 && self.y >= 1 && self.x < CELL_WIDTH - 1 && self.y < CELL_HEIGHT - 1
    }

    /// True when the tile lies on the edge facing `dir`.
    pub fn on_edge(self, dir: Direction) -> bool {
        match dir {
            Direction::North => self.y == 0,
            Direction::South => self.y == CELL_HEIGHT - 1,
            Direction::West => self.x == 0,
            Direction::East => self.x == CELL_WIDTH - 1,
        }
    }

    /// Row-major index into a cell's tile array.
    pub fn index(self) -> usize {
        self.x + self.y * CELL_WIDTH
    }

    /// One step in `dir`, or `None` when that leaves the cell.
    pub fn step(self, dir: Direction) -> Option<LocalCoord> {
        let (dx, dy) = dir.offset();
        let x = self.x as i64 + dx;
        let y = self.y as i64 + dy;
        if x < 0 || y < 0 || x >= WIDTH || y >= HEIGHT {
            None
        } else {
            Some(LocalCoord::new(x as usize, y as usize))
        }
    }
}
