//! One cell's worth of entities, updated by a single worker per tick.

use std::collections::{BTreeMap, HashMap};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use shardworld_common::{CELL_HEIGHT, CELL_WIDTH, CellId, EntityId, GlobalCoord, LocalCoord};
use shardworld_dungen::DungeonCache;

use crate::entity::{Contact, Entity, EntityKind};
use crate::pathfind::find_path;

/// Deferred moves a shard holds between drains; enough for every edge tile.
pub const DEFERRED_CAPACITY: usize = 2 * (CELL_WIDTH + CELL_HEIGHT);

/// A move whose target lies in another shard, applied by the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeferredMove {
    pub id: EntityId,
    pub target: GlobalCoord,
}

/// The single result of resolving one move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    /// The mover now stands on the target (by stepping, swapping or displacing).
    Relocated,
    /// The target is not walkable; nothing moved.
    WallCollision,
    /// The occupant refused the mover; nothing moved.
    Collision(EntityId),
    /// The target belongs to another shard; queued for the coordinator.
    Deferred,
}

/// Read-only state shared with every shard worker during a tick.
#[derive(Debug, Clone, Copy)]
pub struct TickContext<'a> {
    pub tick: u64,
    pub cache: &'a DungeonCache,
    pub path_budget: usize,
}

#[derive(Debug)]
pub struct Shard {
    cell: CellId,
    entities: BTreeMap<EntityId, Entity>,
    occupancy: HashMap<GlobalCoord, EntityId>,
    deferred: Vec<DeferredMove>,
    deaths: Vec<EntityId>,
    /// Entities removed by a displacing move, not yet dropped from the
    /// coordinator's index.
    displaced: Vec<EntityId>,
    players: usize,
    rng: ChaCha8Rng,
}

impl Shard {
    pub fn new(cell: CellId, seed: u64) -> Self {
        Self {
            cell,
            entities: BTreeMap::new(),
            occupancy: HashMap::new(),
            deferred: Vec::new(),
            deaths: Vec::new(),
            displaced: Vec::new(),
            players: 0,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    pub fn cell(&self) -> CellId {
        self.cell
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn player_count(&self) -> usize {
        self.players
    }

    pub fn has_players(&self) -> bool {
        self.players > 0
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    /// Mutable access for state that does not affect placement. Moving an
    /// entity must go through `remove`/`insert` to keep the index in step.
    pub(crate) fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(&id)
    }

    /// Entities in id order.
    pub fn entities(&self) -> impl Iterator<Item = &Entity> + '_ {
        self.entities.values()
    }

    pub(crate) fn players_mut(&mut self) -> impl Iterator<Item = &mut Entity> + '_ {
        self.entities.values_mut().filter(|e| e.is_player())
    }

    pub fn occupant_id(&self, coord: GlobalCoord) -> Option<EntityId> {
        self.occupancy.get(&coord).copied()
    }

    pub fn occupant(&self, coord: GlobalCoord) -> Option<&Entity> {
        self.occupant_id(coord).and_then(|id| self.entities.get(&id))
    }

    /// Inside this cell, walkable and unoccupied.
    pub fn is_free(&self, coord: GlobalCoord, cache: &DungeonCache) -> bool {
        self.cell.contains(coord)
            && !self.occupancy.contains_key(&coord)
            && cache.walkable_at(coord)
    }

    /// Take ownership of `entity` at its current coordinate.
    ///
    /// # Panics
    /// If the coordinate is outside this cell, the id is already present or
    /// the tile is already taken. Callers check with [`Shard::is_free`].
    pub fn insert(&mut self, entity: Entity) {
        assert!(
            self.cell.contains(entity.coord),
            "entity {} at {} inserted into shard {}",
            entity.id,
            entity.coord,
            self.cell
        );
        assert!(
            !self.entities.contains_key(&entity.id),
            "entity {} inserted twice into shard {}",
            entity.id,
            self.cell
        );
        if let Some(other) = self.occupancy.insert(entity.coord, entity.id) {
            panic!(
                "entity {} placed on {} already held by {}",
                entity.id, entity.coord, other
            );
        }
        if entity.is_player() {
            self.players += 1;
        }
        self.entities.insert(entity.id, entity);
    }

    pub fn remove(&mut self, id: EntityId) -> Option<Entity> {
        let entity = self.entities.remove(&id)?;
        self.occupancy.remove(&entity.coord);
        if entity.is_player() {
            self.players -= 1;
        }
        Some(entity)
    }

    /// A random free tile, or `None` after `tries` misses.
    pub fn random_free_coord(&mut self, cache: &DungeonCache, tries: usize) -> Option<GlobalCoord> {
        for _ in 0..tries {
            let local = LocalCoord::new(
                self.rng.gen_range(0..CELL_WIDTH),
                self.rng.gen_range(0..CELL_HEIGHT),
            );
            let coord = self.cell.global(local);
            if self.is_free(coord, cache) {
                return Some(coord);
            }
        }
        None
    }

    /// The first free tile in row-major order.
    pub fn first_free_coord(&self, cache: &DungeonCache) -> Option<GlobalCoord> {
        cache.with_cell(self.cell, |tiles| {
            tiles
                .iter()
                .filter(|(_, tile)| tile.is_walkable())
                .map(|(local, _)| self.cell.global(local))
                .find(|coord| !self.occupancy.contains_key(coord))
        })
    }

    fn defer(&mut self, id: EntityId, target: GlobalCoord) {
        if self.deferred.len() >= DEFERRED_CAPACITY {
            tracing::warn!(cell = %self.cell, %id, %target, "deferred move queue full, dropping move");
            return;
        }
        self.deferred.push(DeferredMove { id, target });
    }

    /// Move `id` towards `target`, resolving to exactly one [`MoveOutcome`].
    /// The mover's current intent is consumed whatever the outcome.
    ///
    /// # Panics
    /// If `id` is not owned by this shard.
    pub fn resolve_move(&mut self, id: EntityId, target: GlobalCoord, cache: &DungeonCache) -> MoveOutcome {
        let Some(mut mover) = self.remove(id) else {
            panic!("resolve_move for entity {id} which shard {} does not own", self.cell);
        };
        mover.commit_move();
        if let Some(dir) = mover.coord.direction_to(target) {
            mover.facing = dir;
        }

        if !self.cell.contains(target) {
            self.defer(id, target);
            self.insert(mover);
            return MoveOutcome::Deferred;
        }

        if !cache.walkable_at(target) {
            mover.hit_wall();
            self.insert(mover);
            return MoveOutcome::WallCollision;
        }

        let Some(occupant_id) = self.occupant_id(target) else {
            mover.coord = target;
            self.insert(mover);
            return MoveOutcome::Relocated;
        };
        let Some(mut occupant) = self.remove(occupant_id) else {
            panic!("shard {} indexes {target} to missing entity {occupant_id}", self.cell);
        };

        let dir = mover.facing;
        match mover.contact(&mut occupant, dir) {
            Contact::Swap => {
                occupant.coord = mover.coord;
                mover.coord = target;
                self.insert(occupant);
                self.insert(mover);
                MoveOutcome::Relocated
            }
            Contact::Displace => {
                tracing::trace!(mover = %id, displaced = %occupant_id, "displaced");
                self.displaced.push(occupant_id);
                mover.coord = target;
                self.insert(mover);
                MoveOutcome::Relocated
            }
            Contact::Blocked => {
                self.insert(occupant);
                self.insert(mover);
                MoveOutcome::Collision(occupant_id)
            }
        }
    }

    /// Where `id` wants to go this tick, if anywhere.
    fn intent(&mut self, id: EntityId, ctx: &TickContext<'_>) -> Option<GlobalCoord> {
        let cell = self.cell;
        let Self {
            entities,
            occupancy,
            rng,
            ..
        } = self;
        let entity = entities.get_mut(&id)?;
        let here = entity.coord;
        match &mut entity.kind {
            EntityKind::Player(player) => player.moves.front().map(|d| here.moved(*d)),
            EntityKind::Monster(monster) => {
                // Occupancy beyond this cell is unknown here; the coordinator
                // resolves those collisions.
                let is_open = |c: GlobalCoord| {
                    ctx.cache.walkable_at(c) && !(cell.contains(c) && occupancy.contains_key(&c))
                };
                if let Some(seen) = monster.nearest() {
                    monster.detections.clear();
                    let path = find_path(here, seen.target, ctx.path_budget, &is_open);
                    if let Some(step) = path.first_step() {
                        return Some(step);
                    }
                }
                monster.patrol.next_step(here, rng, &is_open)
            }
            EntityKind::Loot(_) | EntityKind::Guard => None,
        }
    }

    /// Move every entity scheduled for this tick, then record the dead.
    /// Returns the number of moves resolved.
    pub fn update_movers(&mut self, ctx: &TickContext<'_>) -> usize {
        let movers: Vec<EntityId> = self
            .entities
            .values()
            .filter(|e| !e.is_dead() && e.wants_to_move(ctx.tick))
            .map(|e| e.id)
            .collect();

        let mut resolved = 0;
        for id in movers {
            // Displaced or killed earlier in this pass.
            if self.entities.get(&id).is_none_or(Entity::is_dead) {
                continue;
            }
            let Some(target) = self.intent(id, ctx) else {
                continue;
            };
            let outcome = self.resolve_move(id, target, ctx.cache);
            tracing::trace!(cell = %self.cell, %id, %target, ?outcome, "resolved move");
            resolved += 1;
        }
        self.mark_dead();
        resolved
    }

    /// Queue every dead entity for removal. Idempotent.
    pub fn mark_dead(&mut self) {
        for entity in self.entities.values() {
            if entity.is_dead() && !self.deaths.contains(&entity.id) {
                self.deaths.push(entity.id);
            }
        }
    }

    pub fn take_deaths(&mut self) -> Vec<EntityId> {
        std::mem::take(&mut self.deaths)
    }

    /// Ids removed from this shard by displacement since the last call.
    pub fn take_displaced(&mut self) -> Vec<EntityId> {
        std::mem::take(&mut self.displaced)
    }

    pub fn take_deferred(&mut self) -> Vec<DeferredMove> {
        std::mem::take(&mut self.deferred)
    }

    pub fn deferred(&self) -> &[DeferredMove] {
        &self.deferred
    }

    /// Remove every transient entity, returning the removed ids.
    pub fn cull_transient(&mut self) -> Vec<EntityId> {
        let doomed: Vec<EntityId> = self
            .entities
            .values()
            .filter(|e| e.transient && !e.is_player())
            .map(|e| e.id)
            .collect();
        for id in &doomed {
            self.remove(*id);
        }
        self.deaths.retain(|id| !doomed.contains(id));
        doomed
    }

    /// Reset per-display flags once every viewer has been served.
    pub fn clear_display_state(&mut self) {
        for entity in self.entities.values_mut() {
            entity.collided = false;
            entity.inbox.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shardworld_common::Direction;
    use shardworld_dungen::{Tile, TileMap};

    /// A cache whose cell (0, 0) is a 10x5 room with a wall column at x = 6.
    fn room_cache() -> DungeonCache {
        let mut map = TileMap::new();
        for y in 1..=5 {
            for x in 1..=10 {
                let tile = if x == 6 && y != 3 { Tile::Wall } else { Tile::Floor };
                map.set(LocalCoord::new(x, y), tile);
            }
        }
        DungeonCache::default().with_override(CellId::new(0, 0), map)
    }

    fn shard() -> Shard {
        Shard::new(CellId::new(0, 0), 1)
    }

    fn at(x: i64, y: i64) -> GlobalCoord {
        GlobalCoord::new(x, y)
    }

    fn place(shard: &mut Shard, entity: Entity, x: i64, y: i64) -> EntityId {
        let entity = entity.at(at(x, y));
        let id = entity.id;
        shard.insert(entity);
        id
    }

    #[test]
    fn step_into_free_floor() {
        let cache = room_cache();
        let mut shard = shard();
        let id = place(&mut shard, Entity::player(), 2, 2);
        assert_eq!(shard.resolve_move(id, at(3, 2), &cache), MoveOutcome::Relocated);
        assert_eq!(shard.entity(id).unwrap().coord, at(3, 2));
        assert_eq!(shard.occupant_id(at(3, 2)), Some(id));
        assert_eq!(shard.occupant_id(at(2, 2)), None);
        assert_eq!(shard.entity(id).unwrap().facing, Direction::East);
    }

    #[test]
    fn wall_collision_leaves_mover_in_place() {
        let cache = room_cache();
        let mut shard = shard();
        let id = place(&mut shard, Entity::player(), 5, 2);
        assert_eq!(shard.resolve_move(id, at(6, 2), &cache), MoveOutcome::WallCollision);
        let player = shard.entity(id).unwrap();
        assert_eq!(player.coord, at(5, 2));
        assert!(player.collided);
    }

    #[test]
    fn outside_target_is_deferred() {
        let cache = room_cache();
        let mut shard = shard();
        let id = place(&mut shard, Entity::player(), 0, 3);
        assert_eq!(shard.resolve_move(id, at(-1, 3), &cache), MoveOutcome::Deferred);
        assert_eq!(shard.entity(id).unwrap().coord, at(0, 3));
        assert_eq!(
            shard.deferred(),
            &[DeferredMove {
                id,
                target: at(-1, 3)
            }]
        );
        assert_eq!(shard.take_deferred().len(), 1);
        assert!(shard.deferred().is_empty());
    }

    #[test]
    fn players_swap_places() {
        let cache = room_cache();
        let mut shard = shard();
        let a = place(&mut shard, Entity::player(), 2, 2);
        let b = place(&mut shard, Entity::player(), 3, 2);
        assert_eq!(shard.resolve_move(a, at(3, 2), &cache), MoveOutcome::Relocated);
        assert_eq!(shard.entity(a).unwrap().coord, at(3, 2));
        assert_eq!(shard.entity(b).unwrap().coord, at(2, 2));
        assert_eq!(shard.occupant_id(at(2, 2)), Some(b));
    }

    #[test]
    fn loot_is_displaced() {
        let cache = room_cache();
        let mut shard = shard();
        let player = place(&mut shard, Entity::player(), 2, 2);
        let loot = place(&mut shard, Entity::loot(), 2, 3);
        assert_eq!(shard.resolve_move(player, at(2, 3), &cache), MoveOutcome::Relocated);
        assert!(shard.entity(loot).is_none());
        assert_eq!(shard.len(), 1);
        assert_eq!(shard.take_displaced(), vec![loot]);
        assert!(shard.take_displaced().is_empty());
    }

    #[test]
    fn combat_leaves_both_in_place() {
        let cache = room_cache();
        let mut shard = shard();
        let player = place(&mut shard, Entity::player(), 2, 2);
        let monster = place(&mut shard, Entity::monster(), 2, 1);
        assert_eq!(
            shard.resolve_move(player, at(2, 1), &cache),
            MoveOutcome::Collision(monster)
        );
        assert_eq!(shard.entity(player).unwrap().coord, at(2, 2));
        assert_eq!(shard.entity(monster).unwrap().health, 2);
    }

    #[test]
    fn blocked_move_is_consumed() {
        let cache = room_cache();
        let mut shard = shard();
        let id = place(&mut shard, Entity::player(), 5, 2);
        shard
            .entity_mut(id)
            .unwrap()
            .queue_moves([Direction::East, Direction::South], 0, 8);
        let ctx = TickContext {
            tick: 0,
            cache: &cache,
            path_budget: 50,
        };
        shard.update_movers(&ctx);
        assert_eq!(shard.entity(id).unwrap().coord, at(5, 2));
        shard.update_movers(&TickContext { tick: 1, ..ctx });
        assert_eq!(shard.entity(id).unwrap().coord, at(5, 3));
    }

    #[test]
    fn monster_chases_detected_player() {
        let cache = room_cache();
        let mut shard = shard();
        let player = place(&mut shard, Entity::player(), 9, 3);
        let monster = place(&mut shard, Entity::monster(), 2, 3);
        let target = shard.entity(player).unwrap().coord;
        shard.entity_mut(monster).unwrap().detect(crate::Detection {
            distance: 7,
            target,
        });
        let ctx = TickContext {
            tick: 0,
            cache: &cache,
            path_budget: 150,
        };
        shard.update_movers(&ctx);
        assert_eq!(shard.entity(monster).unwrap().coord, at(3, 3));
    }

    #[test]
    fn dead_entities_are_marked_once() {
        let mut shard = shard();
        let cache = room_cache();
        let id = place(&mut shard, Entity::monster(), 3, 3);
        shard.entity_mut(id).unwrap().health = 0;
        shard.mark_dead();
        shard.update_movers(&TickContext {
            tick: 0,
            cache: &cache,
            path_budget: 10,
        });
        assert_eq!(shard.take_deaths(), vec![id]);
        assert!(shard.take_deaths().is_empty());
        // Dead entities do not move.
        assert_eq!(shard.entity(id).unwrap().coord, at(3, 3));
    }

    #[test]
    fn cull_keeps_players() {
        let mut shard = shard();
        let player = place(&mut shard, Entity::player(), 2, 2);
        place(&mut shard, Entity::monster(), 3, 3);
        place(&mut shard, Entity::loot(), 4, 4);
        let guard = place(&mut shard, Entity::guard(), 5, 5);
        assert_eq!(shard.cull_transient().len(), 2);
        assert!(shard.entity(player).is_some());
        assert!(shard.entity(guard).is_some());
        assert_eq!(shard.player_count(), 1);
    }

    #[test]
    fn placement_finds_floor() {
        let cache = room_cache();
        let mut shard = shard();
        let coord = shard.random_free_coord(&cache, 10_000).unwrap();
        assert!(cache.walkable_at(coord));
        let first = shard.first_free_coord(&cache).unwrap();
        assert_eq!(first, at(1, 1));
    }

    #[test]
    #[should_panic(expected = "already held")]
    fn double_occupancy_panics() {
        let mut shard = shard();
        place(&mut shard, Entity::player(), 2, 2);
        place(&mut shard, Entity::player(), 2, 2);
    }

    #[test]
    #[should_panic(expected = "does not own")]
    fn resolving_unknown_entity_panics() {
        let cache = room_cache();
        shard().resolve_move(EntityId::new(), at(1, 1), &cache);
    }
}
