//! Idle monster movement: walk in a random direction until a wall is hit,
//! then follow that wall keeping it on the left.

use rand::Rng;
use serde::{Deserialize, Serialize};
use shardworld_common::{Direction, GlobalCoord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Patrol {
    /// Heading straight for whatever wall lies in this direction.
    Seek(Direction),
    /// Following a wall; the value is the current heading.
    Follow(Direction),
}

impl Default for Patrol {
    fn default() -> Self {
        Patrol::Seek(Direction::North)
    }
}

fn random_direction(rng: &mut impl Rng) -> Direction {
    Direction::ALL[rng.gen_range(0..Direction::ALL.len())]
}

impl Patrol {
    pub fn random(rng: &mut impl Rng) -> Self {
        Patrol::Seek(random_direction(rng))
    }

    pub fn heading(self) -> Direction {
        match self {
            Patrol::Seek(d) | Patrol::Follow(d) => d,
        }
    }

    /// Turn around, keeping the current mode.
    pub fn reverse(&mut self) {
        *self = match *self {
            Patrol::Seek(d) => Patrol::Seek(d.opposite()),
            Patrol::Follow(d) => Patrol::Follow(d.opposite()),
        };
    }

    /// A move into `heading` was refused by a wall.
    pub fn hit_wall(&mut self) {
        *self = Patrol::Follow(self.heading().cw());
    }

    /// Pick the next step from `at`, updating the state. `None` when every
    /// neighbour is closed.
    pub fn next_step(
        &mut self,
        at: GlobalCoord,
        rng: &mut impl Rng,
        is_open: impl Fn(GlobalCoord) -> bool,
    ) -> Option<GlobalCoord> {
        let open = Direction::ALL.map(|d| is_open(at.moved(d)));
        let open_count = open.iter().filter(|o| **o).count();
        if open_count == 0 {
            *self = Patrol::random(rng);
            return None;
        }
        if open_count == Direction::ALL.len() && matches!(self, Patrol::Follow(_)) {
            // Lost the wall in open floor.
            *self = Patrol::random(rng);
        }

        if let Patrol::Seek(d) = *self {
            if open[d.index()] {
                return Some(at.moved(d));
            }
            self.hit_wall();
        }

        let heading = self.heading();
        let turn = [heading.ccw(), heading, heading.cw(), heading.opposite()]
            .into_iter()
            .find(|d| open[d.index()])?;
        *self = Patrol::Follow(turn);
        Some(at.moved(turn))
    }
}
