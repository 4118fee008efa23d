use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::seq::IteratorRandom;
use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use shardworld_common::coord::{VIEW_HALF_HEIGHT, VIEW_HALF_WIDTH};
use shardworld_common::{CellId, Direction, EntityId, GlobalCoord};
use shardworld_dungen::{DungeonCache, Generator, TileMap};
use shardworld_stream::{StreamState, TickBudget, TickTimer};

use crate::config::WorldConfig;
use crate::connection::DisplaySerializer;
use crate::display::{Viewport, VisibleEntity};
use crate::entity::{Contact, Detection, Entity};
use crate::error::SpawnRejected;
use crate::shard::{DeferredMove, MoveOutcome, Shard, TickContext};

/// What one call to [`World::tick`] did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    pub tick: u64,
    pub elapsed: Duration,
    /// Fraction of the tick period this tick used.
    pub load: f64,
    pub population: usize,
    pub entities: usize,
    pub shards: usize,
    pub moves: usize,
    pub deferred: usize,
    pub deaths: usize,
}

/// The authoritative world: every materialised shard plus the indices that
/// tie entities to them.
///
/// Only the coordinating thread mutates the entity → cell index and the
/// shard map. Workers touch shards only inside the parallel phases of
/// [`World::tick`], one worker per shard.
pub struct World {
    config: WorldConfig,
    cache: Arc<DungeonCache>,
    shards: BTreeMap<CellId, Shard>,
    entity_cells: HashMap<EntityId, CellId>,
    spawn_cells: Vec<CellId>,
    stream: StreamState,
    rng: ChaCha8Rng,
    tick: u64,
    budget: TickBudget,
    timer: TickTimer,
    /// Dead players waiting for room in a spawn cell.
    respawns: Vec<Entity>,
    serializer: Option<Arc<dyn DisplaySerializer>>,
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("tick", &self.tick)
            .field("shards", &self.shards.len())
            .field("entities", &self.entity_cells.len())
            .field("cached_cells", &self.cache.len())
            .finish()
    }
}

fn materialize<'a>(
    shards: &'a mut BTreeMap<CellId, Shard>,
    cache: &DungeonCache,
    rng: &mut ChaCha8Rng,
    cell: CellId,
) -> &'a mut Shard {
    shards.entry(cell).or_insert_with(|| {
        cache.ensure_stitched(cell);
        tracing::debug!(%cell, "materialised shard");
        Shard::new(cell, rng.next_u64())
    })
}

fn shard_mut(shards: &mut BTreeMap<CellId, Shard>, cell: CellId) -> &mut Shard {
    match shards.get_mut(&cell) {
        Some(shard) => shard,
        None => panic!("no shard for cell {cell}"),
    }
}

impl World {
    pub fn new(config: WorldConfig) -> Self {
        let generator = Generator::new(config.generator.clone(), config.entropy);
        let cache = Arc::new(DungeonCache::new(generator, config.cache_capacity));
        Self::with_cache(config, cache)
    }

    /// Build on an existing cache, e.g. one carrying a map override.
    pub fn with_cache(config: WorldConfig, cache: Arc<DungeonCache>) -> Self {
        let seed = config.seed.unwrap_or_else(rand::random);
        let mut world = Self {
            budget: TickBudget::new(config.tick_period()),
            spawn_cells: config.spawn_cells.clone(),
            stream: StreamState::new(config.stream.clone()),
            config,
            cache,
            shards: BTreeMap::new(),
            entity_cells: HashMap::new(),
            rng: ChaCha8Rng::seed_from_u64(seed),
            tick: 0,
            timer: TickTimer::default(),
            respawns: Vec::new(),
            serializer: None,
        };
        for cell in world.spawn_cells.clone() {
            materialize(&mut world.shards, &world.cache, &mut world.rng, cell);
        }
        tracing::info!(
            seed,
            spawn_cells = world.spawn_cells.len(),
            entropy = %world.config.entropy,
            "world created"
        );
        world
    }

    /// Render viewports for connected players with `serializer`.
    pub fn with_serializer(mut self, serializer: Arc<dyn DisplaySerializer>) -> Self {
        self.serializer = Some(serializer);
        self
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<DungeonCache> {
        &self.cache
    }

    pub fn tick_number(&self) -> u64 {
        self.tick
    }

    /// Connected players, including those waiting to respawn.
    pub fn population(&self) -> usize {
        self.shards.values().map(Shard::player_count).sum::<usize>() + self.respawns.len()
    }

    /// Entities currently placed in a shard.
    pub fn entity_count(&self) -> usize {
        self.entity_cells.len()
    }

    /// Rolling fraction of the tick budget in use.
    pub fn load(&self) -> f64 {
        self.timer.load(&self.budget)
    }

    pub fn budget(&self) -> TickBudget {
        self.budget
    }

    /// Durations of the most recent ticks.
    pub fn tick_timer(&self) -> &TickTimer {
        &self.timer
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    pub fn shard_cells(&self) -> impl Iterator<Item = CellId> + '_ {
        self.shards.keys().copied()
    }

    pub fn shard(&self, cell: CellId) -> Option<&Shard> {
        self.shards.get(&cell)
    }

    pub fn spawn_cells(&self) -> &[CellId] {
        &self.spawn_cells
    }

    pub fn is_spawn_cell(&self, cell: CellId) -> bool {
        self.spawn_cells.contains(&cell)
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        let cell = self.entity_cells.get(&id)?;
        self.shards.get(cell)?.entity(id)
    }

    pub fn entity_cell(&self, id: EntityId) -> Option<CellId> {
        self.entity_cells.get(&id).copied()
    }

    /// Make sure the shard for `cell` exists, creating and stitching it if not.
    pub fn ensure_shard(&mut self, cell: CellId) -> &Shard {
        materialize(&mut self.shards, &self.cache, &mut self.rng, cell)
    }

    fn assert_unplaced(&self, entity: &Entity) {
        assert!(
            !self.entity_cells.contains_key(&entity.id),
            "entity {} is already placed in {:?}",
            entity.id,
            self.entity_cells.get(&entity.id)
        );
    }

    /// Place `entity` exactly at `coord`. Returns `None` when the tile is a
    /// wall or already taken.
    ///
    /// # Panics
    /// If the entity is already placed.
    pub fn spawn_entity_at(&mut self, entity: Entity, coord: GlobalCoord) -> Option<EntityId> {
        self.assert_unplaced(&entity);
        let cell = coord.cell();
        let shard = materialize(&mut self.shards, &self.cache, &mut self.rng, cell);
        if !shard.is_free(coord, &self.cache) {
            tracing::debug!(%coord, kind = entity.kind_name(), "spawn target not free");
            return None;
        }
        let entity = entity.at(coord);
        let id = entity.id;
        shard.insert(entity);
        self.entity_cells.insert(id, cell);
        Some(id)
    }

    /// Place `entity` on a random free tile of `cell`, giving up after the
    /// configured number of tries.
    ///
    /// # Panics
    /// If the entity is already placed.
    pub fn place_in_cell(&mut self, entity: Entity, cell: CellId) -> Option<EntityId> {
        self.assert_unplaced(&entity);
        let tries = self.config.placement_tries;
        let shard = materialize(&mut self.shards, &self.cache, &mut self.rng, cell);
        let coord = shard.random_free_coord(&self.cache, tries)?;
        let entity = entity.at(coord);
        let id = entity.id;
        shard.insert(entity);
        self.entity_cells.insert(id, cell);
        Some(id)
    }

    /// Random tries across the spawn cells, then a scan of each. Hands the
    /// entity back if every spawn cell is full.
    fn place_in_spawn(&mut self, entity: Entity) -> Result<EntityId, Entity> {
        if self.spawn_cells.is_empty() {
            return Err(entity);
        }
        let tries = self.config.placement_tries;
        let Self {
            shards,
            cache,
            rng,
            spawn_cells,
            ..
        } = self;
        let mut found = None;
        for _ in 0..tries {
            let cell = spawn_cells[rng.gen_range(0..spawn_cells.len())];
            let shard = materialize(shards, cache, rng, cell);
            if let Some(coord) = shard.random_free_coord(cache, 1) {
                found = Some(coord);
                break;
            }
        }
        if found.is_none() {
            found = spawn_cells.iter().find_map(|cell| {
                let shard = materialize(shards, cache, rng, *cell);
                shard.first_free_coord(cache)
            });
        }
        let Some(coord) = found else {
            return Err(entity);
        };
        let cell = coord.cell();
        let entity = entity.at(coord);
        let id = entity.id;
        shard_mut(shards, cell).insert(entity);
        self.entity_cells.insert(id, cell);
        Ok(id)
    }

    /// Give `entity` a random schedule phase and place it in a spawn cell.
    /// Players are refused past the configured population.
    ///
    /// # Panics
    /// If the entity is already placed.
    pub fn new_entity(&mut self, mut entity: Entity) -> Result<EntityId, SpawnRejected> {
        self.assert_unplaced(&entity);
        let rejected = |world: &World| SpawnRejected {
            population: world.population(),
            load: world.load(),
        };
        if entity.is_player() && self.population() >= self.config.max_population {
            tracing::warn!(population = self.population(), "world full, rejecting player");
            return Err(rejected(&*self));
        }
        entity.phase = self.rng.gen_range(0..8);
        let kind = entity.kind_name();
        match self.place_in_spawn(entity) {
            Ok(id) => {
                tracing::debug!(%id, kind, "entity spawned");
                Ok(id)
            }
            Err(_) => {
                tracing::warn!(kind, "no free tile in any spawn cell");
                Err(rejected(&*self))
            }
        }
    }

    /// Remove an entity from the world, e.g. when its connection closes.
    pub fn remove_entity(&mut self, id: EntityId) -> Option<Entity> {
        let Some(cell) = self.entity_cells.remove(&id) else {
            let index = self.respawns.iter().position(|e| e.id == id)?;
            return Some(self.respawns.swap_remove(index));
        };
        let shard = self.shards.get_mut(&cell)?;
        shard.remove(id)
    }

    /// Queue moves for a player from a string of `n`/`e`/`s`/`w`. Other
    /// characters are ignored. Returns how many moves were accepted.
    pub fn queue_moves(&mut self, id: EntityId, moves: &str, timestamp: u64) -> usize {
        let limit = self.config.max_queued_moves;
        let Some(cell) = self.entity_cells.get(&id) else {
            return 0;
        };
        let Some(entity) = self.shards.get_mut(cell).and_then(|s| s.entity_mut(id)) else {
            return 0;
        };
        entity.queue_moves(moves.chars().filter_map(Direction::from_char), timestamp, limit)
    }

    /// Advance the simulation by one tick.
    pub fn tick(&mut self) -> TickReport {
        let started = Instant::now();
        self.tick += 1;
        let _span = tracing::info_span!("tick", tick = self.tick).entered();

        self.intake();
        self.retry_respawns();
        self.advance_frontier();
        let moves = self.update_shards();
        let deferred = self.apply_deferred();
        self.display();
        let deaths = self.collect_garbage();

        let elapsed = started.elapsed();
        self.timer.record(elapsed);
        let report = TickReport {
            tick: self.tick,
            elapsed,
            load: self.budget.load(elapsed),
            population: self.population(),
            entities: self.entity_cells.len(),
            shards: self.shards.len(),
            moves,
            deferred,
            deaths,
        };
        tracing::debug!(
            population = report.population,
            shards = report.shards,
            moves,
            deferred,
            deaths,
            elapsed_us = elapsed.as_micros() as u64,
            "tick complete"
        );
        report
    }

    /// Tick on the fixed period, sleeping off whatever each tick leaves of
    /// its budget. Runs forever when `ticks` is `None`.
    pub fn run(&mut self, ticks: Option<u64>) {
        let mut done = 0u64;
        while ticks.is_none_or(|limit| done < limit) {
            let report = self.tick();
            match self.budget.remaining(report.elapsed) {
                Some(rest) => std::thread::sleep(rest),
                None => tracing::warn!(
                    tick = report.tick,
                    load = report.load,
                    "tick overran its budget"
                ),
            }
            done += 1;
        }
    }

    /// Pull queued moves off every player's connection and drop players
    /// whose connection has closed.
    fn intake(&mut self) {
        let limit = self.config.max_queued_moves;
        let mut closed = Vec::new();
        for shard in self.shards.values_mut() {
            for player in shard.players_mut() {
                let Some(connection) = player.connection().cloned() else {
                    continue;
                };
                if connection.is_closed() {
                    closed.push(player.id);
                    continue;
                }
                for request in connection.take_moves() {
                    player.queue_moves(
                        request.moves.chars().filter_map(Direction::from_char),
                        request.timestamp,
                        limit,
                    );
                }
            }
        }
        for id in closed {
            self.remove_entity(id);
            tracing::info!(%id, "player disconnected");
        }
        self.respawns
            .retain(|p| !p.connection().is_some_and(|c| c.is_closed()));
    }

    fn retry_respawns(&mut self) {
        for player in std::mem::take(&mut self.respawns) {
            if let Err(player) = self.place_in_spawn(player) {
                self.respawns.push(player);
            }
        }
    }

    fn player_cells(&self) -> BTreeSet<CellId> {
        self.shards
            .iter()
            .filter(|(_, shard)| shard.has_players())
            .map(|(cell, _)| *cell)
            .collect()
    }

    /// Keep the neighbourhood of every player generated and stitched, then
    /// prepopulate and cull according to the frontier plan.
    fn advance_frontier(&mut self) {
        let _span = tracing::debug_span!("frontier").entered();
        let player_cells = self.player_cells();
        for cell in &player_cells {
            for near in cell.expansion() {
                self.cache.ensure_stitched(near);
            }
        }

        let materialized: BTreeSet<CellId> = self.shards.keys().copied().collect();
        let plan = self.stream.plan(&player_cells, &materialized, &self.spawn_cells);
        let stats = self.stream.stats();
        tracing::debug!(
            player_cells = stats.player_cells,
            prepopulate = stats.prepopulate_candidates,
            cull = stats.cull_candidates,
            plan_us = stats.plan_time.as_micros() as u64,
            "frontier"
        );
        let load_budget = self.stream.config.load_budget;
        let unload_budget = self.stream.config.unload_budget;

        let to_fill = plan
            .prepopulate
            .iter()
            .copied()
            .choose_multiple(&mut self.rng, load_budget);
        for cell in to_fill {
            self.prepopulate(cell);
        }
        let to_cull = plan
            .cull
            .iter()
            .copied()
            .choose_multiple(&mut self.rng, unload_budget);
        for cell in to_cull {
            self.cull(cell);
        }
    }

    /// Materialise `cell` and spawn up to the configured number of monsters
    /// and guards. Everything spawned here is transient.
    pub fn prepopulate(&mut self, cell: CellId) -> usize {
        let tries = self.config.prepopulate_tries;
        let monsters = std::iter::repeat_n(
            Entity::monster as fn() -> Entity,
            self.config.prepopulate_monsters,
        );
        let guards = std::iter::repeat_n(
            Entity::guard as fn() -> Entity,
            self.config.prepopulate_guards,
        );
        let roster = monsters.chain(guards);
        let Self {
            shards,
            cache,
            rng,
            entity_cells,
            ..
        } = self;
        let shard = materialize(shards, cache, rng, cell);
        let mut spawned = 0;
        for make in roster {
            let Some(coord) = shard.random_free_coord(cache, tries) else {
                break;
            };
            let mut entity = make().at(coord).with_phase(rng.gen_range(0..8));
            entity.transient = true;
            entity_cells.insert(entity.id, cell);
            shard.insert(entity);
            spawned += 1;
        }
        tracing::debug!(%cell, spawned, "prepopulated cell");
        spawned
    }

    /// Drop the transient entities of `cell`.
    pub fn cull(&mut self, cell: CellId) -> usize {
        let Some(shard) = self.shards.get_mut(&cell) else {
            return 0;
        };
        let removed = shard.cull_transient();
        for id in &removed {
            self.entity_cells.remove(id);
        }
        tracing::debug!(%cell, removed = removed.len(), "culled cell");
        removed.len()
    }

    /// Parallel phase: every shard moves its own entities.
    fn update_shards(&mut self) -> usize {
        let _span = tracing::debug_span!("update_movers", shards = self.shards.len()).entered();
        let ctx = TickContext {
            tick: self.tick,
            cache: &self.cache,
            path_budget: self.config.path_budget,
        };
        let moves: usize = self
            .shards
            .par_iter_mut()
            .map(|(_, shard)| shard.update_movers(&ctx))
            .sum();
        for shard in self.shards.values_mut() {
            for id in shard.take_displaced() {
                self.entity_cells.remove(&id);
            }
        }
        moves
    }

    /// Sequential phase: apply every queued cross-shard move, one at a time.
    fn apply_deferred(&mut self) -> usize {
        let _span = tracing::debug_span!("deferred").entered();
        let moves: Vec<DeferredMove> = self
            .shards
            .values_mut()
            .flat_map(|shard| shard.take_deferred())
            .collect();
        let count = moves.len();
        for mv in moves {
            let outcome = self.apply_cross_shard(mv);
            tracing::trace!(id = %mv.id, target = %mv.target, ?outcome, "applied deferred move");
        }
        count
    }

    /// Resolve a move whose target lies in another shard. `None` when the
    /// mover is gone, dead, or no longer next to the target.
    pub fn apply_cross_shard(&mut self, mv: DeferredMove) -> Option<MoveOutcome> {
        let from = *self.entity_cells.get(&mv.id)?;
        let to = mv.target.cell();
        let mover = self.shards.get(&from)?.entity(mv.id)?;
        if from == to || mover.is_dead() || mover.coord.manhattan(mv.target) != 1 {
            return None;
        }

        let Self {
            shards,
            cache,
            rng,
            entity_cells,
            ..
        } = self;
        materialize(shards, cache, rng, to);
        let mut mover = shard_mut(shards, from).remove(mv.id)?;
        let origin = mover.coord;

        if !cache.walkable_at(mv.target) {
            mover.hit_wall();
            shard_mut(shards, from).insert(mover);
            return Some(MoveOutcome::WallCollision);
        }

        let Some(occupant_id) = shard_mut(shards, to).occupant_id(mv.target) else {
            mover.coord = mv.target;
            shard_mut(shards, to).insert(mover);
            entity_cells.insert(mv.id, to);
            return Some(MoveOutcome::Relocated);
        };
        let Some(mut occupant) = shard_mut(shards, to).remove(occupant_id) else {
            panic!("shard {to} indexes {} to missing entity {occupant_id}", mv.target);
        };

        let dir = mover.facing;
        let outcome = match mover.contact(&mut occupant, dir) {
            Contact::Swap => {
                occupant.coord = origin;
                mover.coord = mv.target;
                shard_mut(shards, from).insert(occupant);
                shard_mut(shards, to).insert(mover);
                entity_cells.insert(occupant_id, from);
                entity_cells.insert(mv.id, to);
                MoveOutcome::Relocated
            }
            Contact::Displace => {
                mover.coord = mv.target;
                shard_mut(shards, to).insert(mover);
                entity_cells.remove(&occupant_id);
                entity_cells.insert(mv.id, to);
                MoveOutcome::Relocated
            }
            Contact::Blocked => {
                shard_mut(shards, to).insert(occupant);
                shard_mut(shards, from).insert(mover);
                MoveOutcome::Collision(occupant_id)
            }
        };
        Some(outcome)
    }

    /// The viewport `id` would be sent this tick.
    pub fn viewport(&self, id: EntityId) -> Option<Viewport> {
        self.entity(id).map(|viewer| self.build_viewport(viewer))
    }

    fn build_viewport(&self, viewer: &Entity) -> Viewport {
        let center = viewer.coord;
        let cells = CellId::visible_from(center);
        let tiles: HashMap<CellId, TileMap> =
            cells.iter().map(|c| (*c, self.cache.tiles(*c))).collect();

        let rows = (-VIEW_HALF_HEIGHT..=VIEW_HALF_HEIGHT)
            .map(|dy| {
                (-VIEW_HALF_WIDTH..=VIEW_HALF_WIDTH)
                    .map(|dx| {
                        let coord = GlobalCoord::new(center.x + dx, center.y + dy);
                        tiles
                            .get(&coord.cell())
                            .map_or(' ', |t| t.get(coord.local()).glyph())
                    })
                    .collect::<String>()
            })
            .collect();

        let entities = cells
            .iter()
            .filter_map(|c| self.shards.get(c))
            .flat_map(|shard| shard.entities())
            .filter(|e| e.id != viewer.id && center.in_view(e.coord))
            .map(|e| VisibleEntity::of(e, center))
            .collect();

        Viewport {
            tick: self.tick,
            population: self.population(),
            load: self.load(),
            location: center,
            cell: center.cell(),
            health: viewer.health,
            max_health: viewer.max_health,
            collided: viewer.collided,
            messages: viewer.inbox.iter().cloned().collect(),
            timestamp: viewer.player_state().map_or(0, |p| p.last_move),
            rows,
            entities,
        }
    }

    /// Monsters that can see `viewer`.
    fn sightings(&self, viewer: &Entity) -> Vec<(CellId, EntityId, Detection)> {
        let center = viewer.coord;
        CellId::visible_from(center)
            .into_iter()
            .filter_map(|c| self.shards.get(&c))
            .flat_map(|shard| shard.entities())
            .filter(|e| e.is_monster() && center.in_view(e.coord))
            .map(|e| {
                let detection = Detection {
                    distance: center.manhattan(e.coord),
                    target: center,
                };
                (e.coord.cell(), e.id, detection)
            })
            .collect()
    }

    /// Parallel phase: serve every player's viewport and gather what the
    /// monsters saw; then hand those sightings over sequentially.
    fn display(&mut self) {
        let _span = tracing::debug_span!("display").entered();
        let viewers: Vec<(CellId, EntityId)> = self
            .shards
            .iter()
            .flat_map(|(cell, shard)| {
                shard
                    .entities()
                    .filter(|e| e.is_player())
                    .map(move |e| (*cell, e.id))
            })
            .collect();

        let world = &*self;
        let sightings: Vec<(CellId, EntityId, Detection)> = viewers
            .par_iter()
            .flat_map_iter(|(cell, id)| {
                let Some(viewer) = world.shards.get(cell).and_then(|s| s.entity(*id)) else {
                    return Vec::new();
                };
                if let (Some(serializer), Some(connection)) =
                    (&world.serializer, viewer.connection())
                {
                    let viewport = world.build_viewport(viewer);
                    let mut out = Vec::new();
                    serializer.serialize(&viewport, &mut out);
                    connection.send(out);
                }
                world.sightings(viewer)
            })
            .collect();

        for (cell, id, detection) in sightings {
            if let Some(monster) = self.shards.get_mut(&cell).and_then(|s| s.entity_mut(id)) {
                monster.detect(detection);
            }
        }
        for shard in self.shards.values_mut() {
            shard.clear_display_state();
        }
    }

    /// Replace the dead with their death spawn, respawn dead players, drop
    /// empty shards outside the spawn set and bound the generation cache.
    fn collect_garbage(&mut self) -> usize {
        let _span = tracing::debug_span!("gc").entered();
        let mut deaths = Vec::new();
        for (cell, shard) in self.shards.iter_mut() {
            shard.mark_dead();
            deaths.extend(shard.take_deaths().into_iter().map(|id| (*cell, id)));
        }
        for (cell, id) in &deaths {
            self.process_death(*cell, *id);
        }

        let empty: Vec<CellId> = self
            .shards
            .iter()
            .filter(|(cell, shard)| shard.is_empty() && !self.spawn_cells.contains(cell))
            .map(|(cell, _)| *cell)
            .collect();
        for cell in empty {
            self.shards.remove(&cell);
            tracing::debug!(%cell, "dropped empty shard");
        }

        let keep: HashSet<CellId> = self
            .shards
            .keys()
            .flat_map(|cell| cell.expansion())
            .collect();
        self.cache.trim(&keep);
        deaths.len()
    }

    fn process_death(&mut self, cell: CellId, id: EntityId) {
        let Some(shard) = self.shards.get_mut(&cell) else {
            return;
        };
        let Some(mut dead) = shard.remove(id) else {
            return;
        };
        self.entity_cells.remove(&id);
        if let Some(remains) = dead.death_spawn() {
            let remains_id = remains.id;
            shard.insert(remains);
            self.entity_cells.insert(remains_id, cell);
        }
        tracing::debug!(%id, kind = dead.kind_name(), coord = %dead.coord, "entity died");

        if dead.is_player() {
            dead.revive();
            if let Err(player) = self.place_in_spawn(dead) {
                tracing::warn!(%id, "no room to respawn player, retrying next tick");
                self.respawns.push(player);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shardworld_common::LocalCoord;
    use shardworld_dungen::Tile;

    fn config() -> WorldConfig {
        WorldConfig {
            seed: Some(42),
            spawn_cells: vec![CellId::new(0, 0)],
            prepopulate_monsters: 0,
            prepopulate_guards: 0,
            tick_period_ms: 1,
            ..WorldConfig::default()
        }
    }

    /// Cell (0, 0) is one open 20x10 room starting at local (1, 1).
    fn open_room() -> TileMap {
        let mut map = TileMap::new();
        for y in 0..12 {
            for x in 0..22 {
                let edge = x == 0 || y == 0 || x == 21 || y == 11;
                map.set(
                    LocalCoord::new(x, y),
                    if edge { Tile::Wall } else { Tile::Floor },
                );
            }
        }
        map
    }

    fn world() -> World {
        let cache = DungeonCache::default().with_override(CellId::new(0, 0), open_room());
        World::with_cache(config(), Arc::new(cache))
    }

    #[test]
    fn starts_with_spawn_shards() {
        let w = world();
        assert_eq!(w.tick_number(), 0);
        assert_eq!(w.shard_count(), 1);
        assert_eq!(w.population(), 0);
        assert!(w.is_spawn_cell(CellId::new(0, 0)));
    }

    #[test]
    fn run_ticks_on_the_period() {
        let mut w = world();
        let started = Instant::now();
        w.run(Some(3));
        assert_eq!(w.tick_number(), 3);
        assert!(started.elapsed() >= Duration::from_millis(2));
        assert!(w.load() >= 0.0);
    }

    #[test]
    fn new_entity_lands_in_a_spawn_cell() {
        let mut w = world();
        let id = w.new_entity(Entity::player()).unwrap();
        let player = w.entity(id).unwrap();
        assert_eq!(player.coord.cell(), CellId::new(0, 0));
        assert!(w.cache().walkable_at(player.coord));
        assert_eq!(w.population(), 1);
        assert_eq!(w.entity_cell(id), Some(CellId::new(0, 0)));
    }

    #[test]
    fn spawn_rejected_when_full() {
        let mut w = World::with_cache(
            WorldConfig {
                max_population: 1,
                ..config()
            },
            Arc::new(DungeonCache::default().with_override(CellId::new(0, 0), open_room())),
        );
        w.new_entity(Entity::player()).unwrap();
        let err = w.new_entity(Entity::player()).unwrap_err();
        assert_eq!(err.population, 1);
    }

    #[test]
    #[should_panic(expected = "already placed")]
    fn placing_twice_panics() {
        let mut w = world();
        let player = Entity::player();
        let copy = player.clone();
        w.spawn_entity_at(player, GlobalCoord::new(3, 3)).unwrap();
        w.spawn_entity_at(copy, GlobalCoord::new(4, 3));
    }

    #[test]
    fn spawn_at_refuses_walls_and_occupied_tiles() {
        let mut w = world();
        assert!(w.spawn_entity_at(Entity::player(), GlobalCoord::new(0, 0)).is_none());
        assert!(w.spawn_entity_at(Entity::player(), GlobalCoord::new(3, 3)).is_some());
        assert!(w.spawn_entity_at(Entity::monster(), GlobalCoord::new(3, 3)).is_none());
    }

    #[test]
    fn queued_moves_are_walked() {
        let mut w = world();
        let id = w.spawn_entity_at(Entity::player(), GlobalCoord::new(3, 3)).unwrap();
        assert_eq!(w.queue_moves(id, "eexs", 7), 3);
        w.tick();
        w.tick();
        w.tick();
        assert_eq!(w.entity(id).unwrap().coord, GlobalCoord::new(5, 4));
        assert_eq!(w.entity(id).unwrap().player_state().unwrap().last_move, 7);
    }

    #[test]
    fn remove_entity_clears_indices() {
        let mut w = world();
        let id = w.new_entity(Entity::player()).unwrap();
        assert!(w.remove_entity(id).is_some());
        assert!(w.entity(id).is_none());
        assert_eq!(w.population(), 0);
        assert!(w.remove_entity(id).is_none());
    }

    #[test]
    fn monster_death_leaves_loot() {
        let mut w = world();
        let player = w.spawn_entity_at(Entity::player(), GlobalCoord::new(3, 3)).unwrap();
        let mut monster = Entity::monster();
        monster.health = 1;
        let monster = w.spawn_entity_at(monster, GlobalCoord::new(4, 3)).unwrap();
        w.queue_moves(player, "e", 0);
        let report = w.tick();
        assert_eq!(report.deaths, 1);
        assert!(w.entity(monster).is_none());
        let shard = w.shard(CellId::new(0, 0)).unwrap();
        assert_eq!(shard.occupant(GlobalCoord::new(4, 3)).unwrap().glyph(), '$');
        assert_eq!(w.entity(player).unwrap().health, 9);
    }

    #[test]
    fn dead_player_respawns_with_full_health() {
        let mut w = world();
        let mut player = Entity::player();
        player.health = 1;
        let player = w.spawn_entity_at(player, GlobalCoord::new(3, 3)).unwrap();
        w.spawn_entity_at(Entity::monster(), GlobalCoord::new(4, 3)).unwrap();
        w.queue_moves(player, "e", 0);
        w.tick();
        let revived = w.entity(player).unwrap();
        assert_eq!(revived.health, revived.max_health);
        assert_eq!(w.population(), 1);
        let shard = w.shard(CellId::new(0, 0)).unwrap();
        assert_eq!(shard.occupant(GlobalCoord::new(3, 3)).unwrap().glyph(), '$');
    }

    #[test]
    fn crossing_into_a_neighbour_moves_ownership() {
        // A corridor from the room's east wall to the edge, met by one
        // in the neighbouring cell.
        let mut map = open_room();
        for x in 21..79 {
            map.set(LocalCoord::new(x, 5), Tile::Corridor);
        }
        let mut east = TileMap::new();
        for x in 0..5 {
            east.set(LocalCoord::new(x, 5), Tile::Corridor);
        }
        let cache = DungeonCache::default()
            .with_override(CellId::new(0, 0), map)
            .with_override(CellId::new(1, 0), east);
        let mut w = World::with_cache(config(), Arc::new(cache));
        let id = w.spawn_entity_at(Entity::player(), GlobalCoord::new(77, 5)).unwrap();
        w.queue_moves(id, "eee", 0);
        let first = w.tick();
        assert_eq!(first.deferred, 0);
        let second = w.tick();
        assert_eq!(second.deferred, 1);
        assert_eq!(w.entity_cell(id), Some(CellId::new(1, 0)));
        assert_eq!(w.entity(id).unwrap().coord, GlobalCoord::new(79, 5));
        w.tick();
        assert_eq!(w.entity(id).unwrap().coord, GlobalCoord::new(80, 5));
    }

    #[test]
    fn empty_shards_outside_spawn_are_dropped() {
        let mut w = world();
        w.ensure_shard(CellId::new(5, 5));
        assert_eq!(w.shard_count(), 2);
        w.tick();
        assert_eq!(w.shard_count(), 1);
        assert!(w.shard(CellId::new(0, 0)).is_some());
    }

    #[test]
    fn prepopulate_and_cull() {
        let mut w = world();
        w.config.prepopulate_monsters = 3;
        w.config.prepopulate_guards = 2;
        w.config.prepopulate_tries = 5000;
        let cell = CellId::new(0, 0);
        assert_eq!(w.prepopulate(cell), 5);
        assert_eq!(w.entity_count(), 5);
        let shard = w.shard(cell).unwrap();
        assert_eq!(shard.entities().filter(|e| e.is_monster()).count(), 3);
        assert_eq!(shard.entities().filter(|e| e.kind_name() == "guard").count(), 2);
        assert_eq!(w.cull(cell), 5);
        assert_eq!(w.entity_count(), 0);
    }

    #[test]
    fn guards_knock_players_back() {
        let mut w = world();
        let player = w.spawn_entity_at(Entity::player(), GlobalCoord::new(3, 3)).unwrap();
        w.spawn_entity_at(Entity::guard(), GlobalCoord::new(4, 3)).unwrap();
        w.queue_moves(player, "e", 0);
        w.tick();
        assert_eq!(w.entity(player).unwrap().coord, GlobalCoord::new(3, 3));
        let queued: Vec<Direction> =
            w.entity(player).unwrap().player_state().unwrap().moves.iter().copied().collect();
        assert_eq!(queued, vec![Direction::West]);
        w.tick();
        assert_eq!(w.entity(player).unwrap().coord, GlobalCoord::new(2, 3));
    }

    #[test]
    fn viewport_centres_on_viewer() {
        let mut w = world();
        let id = w.spawn_entity_at(Entity::player(), GlobalCoord::new(5, 5)).unwrap();
        w.spawn_entity_at(Entity::loot(), GlobalCoord::new(7, 5)).unwrap();
        let view = w.viewport(id).unwrap();
        assert_eq!(view.location, GlobalCoord::new(5, 5));
        assert_eq!(view.rows.len(), crate::display::VIEW_HEIGHT);
        assert!(view.rows.iter().all(|r| r.chars().count() == crate::display::VIEW_WIDTH));
        assert_eq!(view.glyph_at(2, 0), Some('$'));
        assert_eq!(view.glyph_at(-5, 0), Some('#'));
        assert_eq!(view.glyph_at(1, 1), Some('.'));
        assert_eq!(view.entities.len(), 1);
    }

    #[test]
    fn monsters_detect_visible_players() {
        let mut w = world();
        w.spawn_entity_at(Entity::player(), GlobalCoord::new(2, 2)).unwrap();
        let monster = w
            .spawn_entity_at(Entity::monster(), GlobalCoord::new(10, 2))
            .unwrap();
        // Monsters sit out odd ticks; on tick 1 it only sees the player.
        w.tick();
        assert_eq!(w.entity(monster).unwrap().coord, GlobalCoord::new(10, 2));
        // Tick 2 is a move tick; it closes in along the row.
        w.tick();
        assert_eq!(w.entity(monster).unwrap().coord, GlobalCoord::new(9, 2));
    }
}
