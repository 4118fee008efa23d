//! The entity model: one shared base record plus a small closed set of
//! behaviours.

use std::collections::VecDeque;
use std::sync::Arc;

use shardworld_common::{Direction, EntityId, GlobalCoord};

use crate::connection::Connection;
use crate::patrol::Patrol;

pub const PLAYER_HEALTH: i32 = 10;
pub const MONSTER_HEALTH: i32 = 3;
/// Health restored by walking over loot.
pub const LOOT_HEAL: i32 = 3;
/// Damage dealt by either side of a player/monster collision.
pub const ATTACK: i32 = 1;

/// Move schedules: bit `i` set means the entity may move on ticks where
/// `(tick + phase) % 8 == i`.
pub const PLAYER_SCHEDULE: u8 = 0xFF;
pub const MONSTER_SCHEDULE: u8 = 0x55;
pub const STATIC_SCHEDULE: u8 = 0x00;

/// Messages kept for display; older ones are dropped.
pub const INBOX_CAPACITY: usize = 8;

/// A player seen by a monster during the display pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Detection {
    pub distance: i64,
    pub target: GlobalCoord,
}

#[derive(Clone, Default)]
pub struct PlayerState {
    pub moves: VecDeque<Direction>,
    /// Timestamp of the last move batch received.
    pub last_move: u64,
    pub connection: Option<Arc<dyn Connection>>,
}

impl std::fmt::Debug for PlayerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlayerState")
            .field("moves", &self.moves)
            .field("last_move", &self.last_move)
            .field("connected", &self.connection.is_some())
            .finish()
    }
}

#[derive(Debug, Clone, Default)]
pub struct MonsterState {
    pub detections: Vec<Detection>,
    pub patrol: Patrol,
}

impl MonsterState {
    /// Closest detected player; the earliest wins on ties.
    pub fn nearest(&self) -> Option<Detection> {
        self.detections.iter().copied().min_by_key(|d| d.distance)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LootState {
    pub heal: i32,
}

impl Default for LootState {
    fn default() -> Self {
        Self { heal: LOOT_HEAL }
    }
}

#[derive(Debug, Clone)]
pub enum EntityKind {
    Player(PlayerState),
    Monster(MonsterState),
    Loot(LootState),
    Guard,
}

/// What a mover does about the entity standing on its target tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Contact {
    /// Both trade places.
    Swap,
    /// The occupant is consumed and the mover takes its tile.
    Displace,
    /// Nobody moves; any damage or knockback has been applied.
    Blocked,
}

enum Rule {
    Swap,
    Pickup(i32),
    Fight,
    Knockback,
    Block,
}

#[derive(Debug, Clone)]
pub struct Entity {
    pub id: EntityId,
    pub coord: GlobalCoord,
    pub health: i32,
    pub max_health: i32,
    pub facing: Direction,
    /// Per-instance offset into the move schedule.
    pub phase: u8,
    /// Removed when its shard is culled.
    pub transient: bool,
    /// Bumped into a wall or another entity since the last display.
    pub collided: bool,
    pub inbox: VecDeque<String>,
    pub kind: EntityKind,
}

impl Entity {
    fn with_kind(kind: EntityKind, health: i32, transient: bool) -> Self {
        Self {
            id: EntityId::new(),
            coord: GlobalCoord::new(0, 0),
            health,
            max_health: health,
            facing: Direction::South,
            phase: 0,
            transient,
            collided: false,
            inbox: VecDeque::new(),
            kind,
        }
    }

    pub fn player() -> Self {
        Self::with_kind(EntityKind::Player(PlayerState::default()), PLAYER_HEALTH, false)
    }

    pub fn connected_player(connection: Arc<dyn Connection>) -> Self {
        let state = PlayerState {
            connection: Some(connection),
            ..PlayerState::default()
        };
        Self::with_kind(EntityKind::Player(state), PLAYER_HEALTH, false)
    }

    pub fn monster() -> Self {
        Self::with_kind(EntityKind::Monster(MonsterState::default()), MONSTER_HEALTH, true)
    }

    pub fn loot() -> Self {
        Self::with_kind(EntityKind::Loot(LootState::default()), 1, true)
    }

    pub fn guard() -> Self {
        Self::with_kind(EntityKind::Guard, 1, false)
    }

    pub fn at(mut self, coord: GlobalCoord) -> Self {
        self.coord = coord;
        self
    }

    pub fn with_phase(mut self, phase: u8) -> Self {
        self.phase = phase % 8;
        self
    }

    pub fn is_player(&self) -> bool {
        matches!(self.kind, EntityKind::Player(_))
    }

    pub fn is_monster(&self) -> bool {
        matches!(self.kind, EntityKind::Monster(_))
    }

    pub fn player_state(&self) -> Option<&PlayerState> {
        match &self.kind {
            EntityKind::Player(state) => Some(state),
            _ => None,
        }
    }

    pub fn player_state_mut(&mut self) -> Option<&mut PlayerState> {
        match &mut self.kind {
            EntityKind::Player(state) => Some(state),
            _ => None,
        }
    }

    pub fn connection(&self) -> Option<&Arc<dyn Connection>> {
        self.player_state().and_then(|p| p.connection.as_ref())
    }

    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            EntityKind::Player(_) => "player",
            EntityKind::Monster(_) => "monster",
            EntityKind::Loot(_) => "loot",
            EntityKind::Guard => "guard",
        }
    }

    pub fn glyph(&self) -> char {
        match self.kind {
            EntityKind::Player(_) => '@',
            EntityKind::Monster(_) => 'M',
            EntityKind::Loot(_) => '$',
            EntityKind::Guard => 'G',
        }
    }

    pub fn schedule(&self) -> u8 {
        match self.kind {
            EntityKind::Player(_) => PLAYER_SCHEDULE,
            EntityKind::Monster(_) => MONSTER_SCHEDULE,
            EntityKind::Loot(_) | EntityKind::Guard => STATIC_SCHEDULE,
        }
    }

    /// Whether this tick falls in the entity's move schedule.
    pub fn wants_to_move(&self, tick: u64) -> bool {
        let slot = (tick.wrapping_add(u64::from(self.phase)) % 8) as u32;
        (self.schedule() >> slot) & 1 == 1
    }

    pub fn is_dead(&self) -> bool {
        self.health <= 0
    }

    pub fn attack(&self) -> i32 {
        match self.kind {
            EntityKind::Player(_) | EntityKind::Monster(_) => ATTACK,
            EntityKind::Loot(_) | EntityKind::Guard => 0,
        }
    }

    pub fn take_damage(&mut self, amount: i32) {
        self.health -= amount;
    }

    pub fn heal(&mut self, amount: i32) {
        self.health = (self.health + amount).min(self.max_health);
    }

    /// Leave a message for the next display.
    pub fn notify(&mut self, message: impl Into<String>) {
        if self.inbox.len() == INBOX_CAPACITY {
            self.inbox.pop_front();
        }
        self.inbox.push_back(message.into());
    }

    /// Append moves to a player's queue, keeping at most `limit` queued.
    /// Returns how many were accepted.
    pub fn queue_moves(
        &mut self,
        moves: impl IntoIterator<Item = Direction>,
        timestamp: u64,
        limit: usize,
    ) -> usize {
        let Some(player) = self.player_state_mut() else {
            return 0;
        };
        player.last_move = timestamp;
        let mut accepted = 0;
        for dir in moves {
            if player.moves.len() >= limit {
                break;
            }
            player.moves.push_back(dir);
            accepted += 1;
        }
        accepted
    }

    /// Consume the intent acted on this tick, whatever came of it.
    pub fn commit_move(&mut self) {
        match &mut self.kind {
            EntityKind::Player(player) => {
                player.moves.pop_front();
            }
            EntityKind::Monster(monster) => monster.detections.clear(),
            EntityKind::Loot(_) | EntityKind::Guard => {}
        }
    }

    pub fn hit_wall(&mut self) {
        self.collided = true;
        if let EntityKind::Monster(monster) = &mut self.kind {
            monster.patrol.hit_wall();
        }
    }

    /// Record a sighting; only monsters care.
    pub fn detect(&mut self, detection: Detection) {
        if let EntityKind::Monster(monster) = &mut self.kind {
            monster.detections.push(detection);
        }
    }

    fn knockback(&mut self, dir: Direction) {
        self.collided = true;
        match &mut self.kind {
            EntityKind::Player(player) => player.moves.push_front(dir.opposite()),
            EntityKind::Monster(monster) => monster.patrol.reverse(),
            EntityKind::Loot(_) | EntityKind::Guard => {}
        }
    }

    /// Apply the collision rules for `self` moving in `dir` onto the tile
    /// held by `other`.
    pub fn contact(&mut self, other: &mut Entity, dir: Direction) -> Contact {
        let rule = match (&self.kind, &other.kind) {
            (EntityKind::Player(_), EntityKind::Player(_)) => Rule::Swap,
            (EntityKind::Player(_), EntityKind::Loot(loot)) => Rule::Pickup(loot.heal),
            (EntityKind::Player(_), EntityKind::Monster(_))
            | (EntityKind::Monster(_), EntityKind::Player(_)) => Rule::Fight,
            (_, EntityKind::Guard) => Rule::Knockback,
            _ => Rule::Block,
        };
        match rule {
            Rule::Swap => Contact::Swap,
            Rule::Pickup(heal) => {
                self.heal(heal);
                self.notify(format!("picked up loot (+{heal})"));
                Contact::Displace
            }
            Rule::Fight => {
                other.take_damage(self.attack());
                self.take_damage(other.attack());
                self.collided = true;
                other.collided = true;
                let (mine, theirs) = (self.kind_name(), other.kind_name());
                self.notify(format!("you hit a {theirs}"));
                other.notify(format!("a {mine} hit you"));
                Contact::Blocked
            }
            Rule::Knockback => {
                self.knockback(dir);
                Contact::Blocked
            }
            Rule::Block => {
                self.collided = true;
                Contact::Blocked
            }
        }
    }

    /// What replaces this entity when it dies.
    pub fn death_spawn(&self) -> Option<Entity> {
        match self.kind {
            EntityKind::Player(_) | EntityKind::Monster(_) => Some(Entity::loot().at(self.coord)),
            EntityKind::Loot(_) | EntityKind::Guard => None,
        }
    }

    /// Restore a dead player for respawning: full health, empty queue.
    pub fn revive(&mut self) {
        self.health = self.max_health;
        self.collided = false;
        if let Some(player) = self.player_state_mut() {
            player.moves.clear();
        }
        self.notify("you died");
    }
}
