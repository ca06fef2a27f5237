use glam::Vec2;
use mapgraph_catalog::{Catalog, EntityType, RegionType};
use mapgraph_common::{
    EntityId, InstancePool, NodeIndex, PoolError, PoolKey, RegionTier, ResourceState,
};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::drops::roll_drop_amount;
use crate::entity::{DropYield, LiveEntity, MineOutcome, Strike};
use crate::grid::{ExclusionGrid, spawn_cells};

/// Placement tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Minimum distance between two placed entities.
    pub overlap_radius: f32,
    /// Probability rolls per bonus-drop type.
    pub bonus_attempts: u32,
    /// Added to bonus probabilities in rare-tier regions.
    pub rare_tier_bonus: f64,
    /// Common placement gives up after `budget * attempt_factor` attempts.
    pub attempt_factor: u32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            overlap_radius: 1.0,
            bonus_attempts: 10,
            rare_tier_bonus: 0.4,
            attempt_factor: 10,
        }
    }
}

/// Errors from layout operations.
#[derive(Debug, thiserror::Error)]
pub enum LayoutError {
    #[error("pool failure: {0}")]
    Pool(#[from] PoolError),
    #[error("node {0} already has live entities")]
    AlreadyLive(NodeIndex),
    #[error("entity {0:?} is not live")]
    UnknownEntity(EntityId),
}

/// Where a node sits and what it was instantiated from.
#[derive(Debug, Clone, Copy)]
pub struct NodeArea<'a> {
    pub node: NodeIndex,
    pub origin: Vec2,
    pub region: &'a RegionType,
}

/// Counters from one fresh population.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PopulateReport {
    pub candidate_cells: usize,
    pub bonus_placed: usize,
    pub common_placed: usize,
    /// Attempts spent on common placement.
    pub attempts: u32,
}

impl PopulateReport {
    pub fn total_placed(&self) -> usize {
        self.bonus_placed + self.common_placed
    }
}

/// How a node's entities came to life on activation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Activation {
    Restored { entities: usize },
    Populated(PopulateReport),
}

/// Owns per-node snapshots and the live entity set of the active node.
///
/// Live instances belong to the pool; the engine only keeps their handles.
pub struct LayoutEngine {
    config: LayoutConfig,
    rng: SmallRng,
    snapshots: BTreeMap<NodeIndex, Vec<ResourceState>>,
    live: BTreeMap<NodeIndex, Vec<LiveEntity>>,
}

impl LayoutEngine {
    pub fn new(config: LayoutConfig) -> Self {
        Self::from_rng(config, SmallRng::from_entropy())
    }

    /// Seeded engine for reproducible placement.
    pub fn with_seed(config: LayoutConfig, seed: u64) -> Self {
        Self::from_rng(config, SmallRng::seed_from_u64(seed ^ 0x1A70_0D5E))
    }

    fn from_rng(config: LayoutConfig, rng: SmallRng) -> Self {
        Self {
            config,
            rng,
            snapshots: BTreeMap::new(),
            live: BTreeMap::new(),
        }
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    /// Bring a node's entities to life: restore the saved layout if one
    /// exists, otherwise generate a fresh one.
    pub fn activate(
        &mut self,
        area: NodeArea<'_>,
        catalog: &Catalog,
        stage: u32,
        pool: &mut dyn InstancePool,
    ) -> Result<Activation, LayoutError> {
        if self.snapshots.contains_key(&area.node) {
            let entities = self.restore(area.node, pool)?;
            Ok(Activation::Restored { entities })
        } else {
            let report = self.populate(area, catalog, stage, pool)?;
            Ok(Activation::Populated(report))
        }
    }

    /// Generate a fresh layout for a node.
    ///
    /// Bonus-drop types are placed first by independent probability rolls,
    /// then the region's common budget is filled by weighted draws. Both
    /// phases reject cells closer than `overlap_radius` to anything placed,
    /// and common placement stops after `budget * attempt_factor` attempts.
    ///
    /// All-or-nothing: if the pool refuses an instance, everything placed so
    /// far is released and the node stays unpopulated.
    pub fn populate(
        &mut self,
        area: NodeArea<'_>,
        catalog: &Catalog,
        stage: u32,
        pool: &mut dyn InstancePool,
    ) -> Result<PopulateReport, LayoutError> {
        let _span = tracing::info_span!("populate", node = area.node.0).entered();
        if self.live.contains_key(&area.node) {
            return Err(LayoutError::AlreadyLive(area.node));
        }

        let mut report = PopulateReport::default();
        let mut placed: Vec<LiveEntity> = Vec::new();
        let spawnable = catalog.spawnable(stage);
        if spawnable.is_empty() {
            tracing::debug!(stage, "no spawnable entity types");
            self.live.insert(area.node, placed);
            return Ok(report);
        }

        let mut cells = spawn_cells(area.origin, area.region);
        report.candidate_cells = cells.len();
        let mut exclusion = ExclusionGrid::new(self.config.overlap_radius);

        let (bonus, common): (Vec<&EntityType>, Vec<&EntityType>) =
            spawnable.into_iter().partition(|e| e.bonus_drop);

        let boost = if area.region.tier == RegionTier::Rare {
            self.config.rare_tier_bonus
        } else {
            0.0
        };

        'bonus: for ty in &bonus {
            let probability = f64::from(ty.spawn_weight) / 100.0 + boost;
            for _ in 0..self.config.bonus_attempts {
                if cells.is_empty() {
                    break 'bonus;
                }
                let i = self.rng.gen_range(0..cells.len());
                let pos = cells[i];
                if exclusion.too_close(pos) {
                    continue;
                }
                if self.rng.r#gen::<f64>() > probability {
                    continue;
                }
                match place(ty, pos, pool) {
                    Ok(entity) => {
                        placed.push(entity);
                        exclusion.insert(pos);
                        cells.swap_remove(i);
                        report.bonus_placed += 1;
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, type_id = ty.id.0, "bonus placement failed");
                        release_all(&mut placed, pool);
                        return Err(e.into());
                    }
                }
            }
        }

        let total_weight: u32 = common.iter().map(|e| e.spawn_weight).sum();
        let budget = area.region.budget;
        let max_attempts = budget.saturating_mul(self.config.attempt_factor);
        let mut common_placed = 0u32;

        while total_weight > 0 && common_placed < budget && report.attempts < max_attempts {
            report.attempts += 1;
            if cells.is_empty() {
                break;
            }
            let i = self.rng.gen_range(0..cells.len());
            let pos = cells[i];
            if exclusion.too_close(pos) {
                continue;
            }
            let Some(ty) = draw_weighted(&common, total_weight, &mut self.rng) else {
                break;
            };
            match place(ty, pos, pool) {
                Ok(entity) => {
                    placed.push(entity);
                    exclusion.insert(pos);
                    cells.swap_remove(i);
                    common_placed += 1;
                }
                Err(e) => {
                    tracing::warn!(error = %e, type_id = ty.id.0, "common placement failed");
                    release_all(&mut placed, pool);
                    return Err(e.into());
                }
            }
        }
        report.common_placed = common_placed as usize;

        tracing::debug!(
            cells = report.candidate_cells,
            bonus = report.bonus_placed,
            common = report.common_placed,
            attempts = report.attempts,
            "populate complete"
        );
        self.live.insert(area.node, placed);
        Ok(report)
    }

    /// Store the live state of a node as its newest snapshot.
    ///
    /// Returns the number of captured entries, or `None` when the node has no
    /// live set (never populated, e.g. home).
    pub fn snapshot(&mut self, node: NodeIndex) -> Option<usize> {
        let states = self.capture(node)?;
        let count = states.len();
        self.snapshots.insert(node, states);
        tracing::debug!(node = node.0, count, "snapshot taken");
        Some(count)
    }

    /// Copy of the live state of a node, without storing it. Consumed
    /// entities are left out.
    pub fn capture(&self, node: NodeIndex) -> Option<Vec<ResourceState>> {
        self.live.get(&node).map(|entities| {
            entities
                .iter()
                .filter(|e| !e.state.consumed)
                .map(|e| e.state.clone())
                .collect()
        })
    }

    /// Re-acquire one instance per non-consumed entity in the node's snapshot.
    ///
    /// All-or-nothing: on pool failure every instance acquired so far is
    /// released and the snapshot is left untouched.
    pub fn restore(
        &mut self,
        node: NodeIndex,
        pool: &mut dyn InstancePool,
    ) -> Result<usize, LayoutError> {
        if self.live.contains_key(&node) {
            return Err(LayoutError::AlreadyLive(node));
        }
        let Some(states) = self.snapshots.get(&node) else {
            self.live.insert(node, Vec::new());
            return Ok(0);
        };

        let mut restored: Vec<LiveEntity> = Vec::with_capacity(states.len());
        for state in states.iter().filter(|s| !s.consumed) {
            let key = PoolKey::Entity(state.type_id);
            match pool.acquire(key, state.position) {
                Ok(handle) => restored.push(LiveEntity::new(state.clone(), handle)),
                Err(e) => {
                    release_all(&mut restored, pool);
                    return Err(e.into());
                }
            }
        }
        let count = restored.len();
        tracing::debug!(node = node.0, count, "layout restored");
        self.live.insert(node, restored);
        Ok(count)
    }

    /// Release every live instance of a node back to the pool.
    pub fn despawn(&mut self, node: NodeIndex, pool: &mut dyn InstancePool) -> usize {
        let Some(mut entities) = self.live.remove(&node) else {
            return 0;
        };
        release_all(&mut entities, pool)
    }

    /// Route a mining hit to a live entity.
    ///
    /// A resource consumed by this hit goes back to the pool immediately and
    /// yields a drop rolled against `drop_rate_percent`.
    pub fn mine(
        &mut self,
        entity: EntityId,
        damage: u32,
        drop_rate_percent: f64,
        catalog: &Catalog,
        pool: &mut dyn InstancePool,
    ) -> Result<MineOutcome, LayoutError> {
        let live = self
            .live
            .values_mut()
            .flat_map(|v| v.iter_mut())
            .find(|e| e.state.id == entity)
            .ok_or(LayoutError::UnknownEntity(entity))?;

        let outcome = match live.strike(damage) {
            Strike::Ignored => MineOutcome {
                still_alive: true,
                consumed: false,
                drop: None,
            },
            Strike::Damaged { remaining } => MineOutcome {
                still_alive: remaining > 0,
                consumed: false,
                drop: None,
            },
            Strike::Spent => MineOutcome {
                still_alive: false,
                consumed: live.state.consumed,
                drop: None,
            },
            Strike::Consumed => {
                if let Some(handle) = live.handle.take() {
                    if let Err(e) = pool.release(PoolKey::Entity(live.state.type_id), handle) {
                        tracing::warn!(error = %e, "release of consumed entity failed");
                    }
                }
                let drop = catalog.entity(live.state.type_id).map(|ty| DropYield {
                    item: ty.drop_item,
                    amount: roll_drop_amount(1, drop_rate_percent, &mut self.rng),
                });
                MineOutcome {
                    still_alive: false,
                    consumed: true,
                    drop,
                }
            }
        };
        Ok(outcome)
    }

    /// Release every live instance and forget every snapshot.
    pub fn clear(&mut self, pool: &mut dyn InstancePool) {
        let nodes: Vec<NodeIndex> = self.live.keys().copied().collect();
        for node in nodes {
            self.despawn(node, pool);
        }
        self.snapshots.clear();
    }

    /// Seed a snapshot from persisted data. Replaces any existing one.
    pub fn seed_snapshot(&mut self, node: NodeIndex, states: Vec<ResourceState>) {
        self.snapshots.insert(node, states);
    }

    pub fn snapshot_for(&self, node: NodeIndex) -> Option<&[ResourceState]> {
        self.snapshots.get(&node).map(Vec::as_slice)
    }

    pub fn snapshots(&self) -> &BTreeMap<NodeIndex, Vec<ResourceState>> {
        &self.snapshots
    }

    pub fn live_entities(&self, node: NodeIndex) -> &[LiveEntity] {
        self.live.get(&node).map_or(&[], Vec::as_slice)
    }

    pub fn is_live(&self, node: NodeIndex) -> bool {
        self.live.contains_key(&node)
    }

    /// Live entities that still hold a pool instance, across all nodes.
    pub fn live_count(&self) -> usize {
        self.live
            .values()
            .flat_map(|v| v.iter())
            .filter(|e| e.handle.is_some())
            .count()
    }
}

fn place(ty: &EntityType, pos: Vec2, pool: &mut dyn InstancePool) -> Result<LiveEntity, PoolError> {
    let handle = pool.acquire(PoolKey::Entity(ty.id), pos)?;
    let state = ResourceState::fresh(ty.id, ty.kind, pos, ty.durability);
    Ok(LiveEntity::new(state, handle))
}

fn release_all(entities: &mut [LiveEntity], pool: &mut dyn InstancePool) -> usize {
    let mut released = 0;
    for e in entities.iter_mut() {
        if let Some(handle) = e.handle.take() {
            match pool.release(PoolKey::Entity(e.state.type_id), handle) {
                Ok(()) => released += 1,
                Err(err) => tracing::warn!(error = %err, "entity release failed"),
            }
        }
    }
    released
}

fn draw_weighted<'a>(
    types: &[&'a EntityType],
    total_weight: u32,
    rng: &mut SmallRng,
) -> Option<&'a EntityType> {
    if total_weight == 0 {
        return None;
    }
    let roll = rng.gen_range(0..total_weight);
    let mut sum = 0;
    for ty in types {
        sum += ty.spawn_weight;
        if roll < sum {
            return Some(*ty);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use mapgraph_catalog::Rect;
    use mapgraph_common::{EntityKind, EntityTypeId, InMemoryPool, RegionTypeId};
    use std::collections::BTreeSet;

    fn region(area: Vec2, budget: u32, tier: RegionTier) -> RegionType {
        RegionType {
            id: RegionTypeId(10),
            name: "test".into(),
            tier,
            area,
            budget,
            portals: Vec::new(),
            spawn_zones: Vec::new(),
            obstacles: Vec::new(),
        }
    }

    fn ore(id: u32, weight: u32) -> EntityType {
        EntityType {
            id: EntityTypeId(id),
            name: format!("ore{id}"),
            kind: EntityKind::Resource,
            spawn_weight: weight,
            spawn_stage: 0,
            bonus_drop: false,
            durability: 4,
            drop_item: 100 + id,
        }
    }

    fn catalog_with(entities: Vec<EntityType>) -> Catalog {
        Catalog {
            regions: Vec::new(),
            entities,
            home_portals: Vec::new(),
        }
    }

    fn area(node: u32, region: &RegionType) -> NodeArea<'_> {
        NodeArea {
            node: NodeIndex(node),
            origin: Vec2::new(100.0 * node as f32, 0.0),
            region,
        }
    }

    #[test]
    fn populate_respects_budget() {
        let r = region(Vec2::new(20.0, 20.0), 30, RegionTier::Common);
        let catalog = catalog_with(vec![ore(1, 1)]);
        let mut pool = InMemoryPool::new();
        let mut engine = LayoutEngine::with_seed(LayoutConfig::default(), 1);

        let report = engine.populate(area(1, &r), &catalog, 0, &mut pool).unwrap();
        assert_eq!(report.common_placed, 30);
        assert_eq!(engine.live_entities(NodeIndex(1)).len(), 30);
        assert_eq!(pool.total_active(), 30);
    }

    #[test]
    fn populate_halts_when_cells_run_out() {
        // 10x5 area: exactly 50 valid cells for a budget of 100.
        let r = region(Vec2::new(10.0, 5.0), 100, RegionTier::Common);
        let catalog = catalog_with(vec![ore(1, 3), ore(2, 1)]);
        let mut pool = InMemoryPool::new();
        let mut engine = LayoutEngine::with_seed(LayoutConfig::default(), 7);

        let report = engine.populate(area(1, &r), &catalog, 0, &mut pool).unwrap();
        assert_eq!(report.candidate_cells, 50);
        assert!(report.common_placed <= 50);
        assert!(report.attempts <= 100 * 10);
    }

    #[test]
    fn placements_keep_minimum_separation() {
        let r = region(Vec2::new(12.0, 12.0), 60, RegionTier::Common);
        let catalog = catalog_with(vec![ore(1, 1)]);
        let mut pool = InMemoryPool::new();
        let config = LayoutConfig {
            overlap_radius: 2.5,
            ..LayoutConfig::default()
        };
        let mut engine = LayoutEngine::with_seed(config, 3);
        engine.populate(area(1, &r), &catalog, 0, &mut pool).unwrap();

        let live = engine.live_entities(NodeIndex(1));
        for (i, a) in live.iter().enumerate() {
            for b in &live[i + 1..] {
                assert!(a.state.position.distance(b.state.position) >= 2.5);
            }
        }
    }

    #[test]
    fn obstacles_are_never_used() {
        let mut r = region(Vec2::new(10.0, 10.0), 40, RegionTier::Common);
        r.obstacles.push(Rect::new(Vec2::new(-5.0, -5.0), Vec2::new(0.0, 5.0)));
        let catalog = catalog_with(vec![ore(1, 1)]);
        let mut pool = InMemoryPool::new();
        let mut engine = LayoutEngine::with_seed(LayoutConfig::default(), 5);
        engine.populate(area(0, &r), &catalog, 0, &mut pool).unwrap();
        assert!(
            engine
                .live_entities(NodeIndex(0))
                .iter()
                .all(|e| e.state.position.x > 0.0)
        );
    }

    #[test]
    fn stage_gate_filters_types() {
        let r = region(Vec2::new(10.0, 10.0), 20, RegionTier::Common);
        let mut late = ore(2, 100);
        late.spawn_stage = 5;
        let catalog = catalog_with(vec![ore(1, 1), late]);
        let mut pool = InMemoryPool::new();
        let mut engine = LayoutEngine::with_seed(LayoutConfig::default(), 9);
        engine.populate(area(1, &r), &catalog, 0, &mut pool).unwrap();
        assert!(
            engine
                .live_entities(NodeIndex(1))
                .iter()
                .all(|e| e.state.type_id == EntityTypeId(1))
        );
    }

    #[test]
    fn rare_tier_boosts_bonus_rolls() {
        let mut jewel = ore(9, 0);
        jewel.bonus_drop = true;
        let catalog = catalog_with(vec![jewel]);
        let common = region(Vec2::new(20.0, 20.0), 0, RegionTier::Common);
        let rare = region(Vec2::new(20.0, 20.0), 0, RegionTier::Rare);

        let mut pool = InMemoryPool::new();
        let config = LayoutConfig {
            rare_tier_bonus: 1.0,
            ..LayoutConfig::default()
        };
        let mut engine = LayoutEngine::with_seed(config, 11);
        let plain = engine.populate(area(1, &common), &catalog, 0, &mut pool).unwrap();
        assert_eq!(plain.common_placed, 0);

        // A certain roll in a rare region places one per attempt.
        let boosted = engine.populate(area(2, &rare), &catalog, 0, &mut pool).unwrap();
        assert_eq!(boosted.bonus_placed, 10);
        assert_eq!(boosted.attempts, 0);
    }

    #[test]
    fn snapshot_restore_preserves_non_consumed_set() {
        let r = region(Vec2::new(10.0, 10.0), 15, RegionTier::Common);
        let catalog = catalog_with(vec![ore(1, 1)]);
        let mut pool = InMemoryPool::new();
        let mut engine = LayoutEngine::with_seed(LayoutConfig::default(), 13);
        engine.populate(area(1, &r), &catalog, 0, &mut pool).unwrap();

        let ids: Vec<EntityId> = engine
            .live_entities(NodeIndex(1))
            .iter()
            .map(|e| e.state.id)
            .collect();
        engine.mine(ids[0], 1, 100.0, &catalog, &mut pool).unwrap();
        let consumed = engine.mine(ids[1], 10, 100.0, &catalog, &mut pool).unwrap();
        assert!(consumed.consumed);

        engine.snapshot(NodeIndex(1)).unwrap();
        let before: BTreeSet<_> = engine
            .snapshot_for(NodeIndex(1))
            .unwrap()
            .iter()
            .filter(|s| !s.consumed)
            .map(|s| (s.id, s.position.to_array().map(f32::to_bits), s.durability))
            .collect();
        engine.despawn(NodeIndex(1), &mut pool);
        assert_eq!(pool.total_active(), 0);

        let restored = engine.restore(NodeIndex(1), &mut pool).unwrap();
        assert_eq!(restored, 14);
        let after: BTreeSet<_> = engine
            .live_entities(NodeIndex(1))
            .iter()
            .map(|e| (e.state.id, e.state.position.to_array().map(f32::to_bits), e.state.durability))
            .collect();
        assert_eq!(before, after);
        assert_eq!(pool.total_active(), 14);
        assert!(!after.iter().any(|(id, _, _)| *id == ids[1]));
    }

    #[test]
    fn consumed_entity_never_returns() {
        let r = region(Vec2::new(6.0, 6.0), 5, RegionTier::Common);
        let catalog = catalog_with(vec![ore(1, 1)]);
        let mut pool = InMemoryPool::new();
        let mut engine = LayoutEngine::with_seed(LayoutConfig::default(), 17);
        engine.populate(area(1, &r), &catalog, 0, &mut pool).unwrap();
        let victim = engine.live_entities(NodeIndex(1))[0].state.id;
        engine.mine(victim, 99, 100.0, &catalog, &mut pool).unwrap();

        for _ in 0..5 {
            engine.snapshot(NodeIndex(1));
            engine.despawn(NodeIndex(1), &mut pool);
            engine.restore(NodeIndex(1), &mut pool).unwrap();
            assert!(
                engine
                    .live_entities(NodeIndex(1))
                    .iter()
                    .all(|e| e.state.id != victim)
            );
        }
        assert_eq!(engine.live_entities(NodeIndex(1)).len(), 4);
    }

    #[test]
    fn restore_is_all_or_nothing_on_pool_failure() {
        let r = region(Vec2::new(10.0, 10.0), 8, RegionTier::Common);
        let catalog = catalog_with(vec![ore(1, 1)]);
        let mut pool = InMemoryPool::new();
        let mut engine = LayoutEngine::with_seed(LayoutConfig::default(), 19);
        engine.populate(area(1, &r), &catalog, 0, &mut pool).unwrap();
        engine.snapshot(NodeIndex(1));
        engine.despawn(NodeIndex(1), &mut pool);

        pool.set_capacity(PoolKey::Entity(EntityTypeId(1)), 3);
        let err = engine.restore(NodeIndex(1), &mut pool).unwrap_err();
        assert!(matches!(err, LayoutError::Pool(PoolError::Exhausted { .. })));
        assert_eq!(pool.total_active(), 0);
        assert!(!engine.is_live(NodeIndex(1)));
        assert_eq!(engine.snapshot_for(NodeIndex(1)).unwrap().len(), 8);
    }

    #[test]
    fn populate_is_all_or_nothing_on_pool_failure() {
        let r = region(Vec2::new(10.0, 10.0), 20, RegionTier::Common);
        let catalog = catalog_with(vec![ore(1, 1), ore(2, 1)]);
        let mut pool = InMemoryPool::new();
        pool.set_capacity(PoolKey::Entity(EntityTypeId(1)), 1);
        pool.set_capacity(PoolKey::Entity(EntityTypeId(2)), 1);
        let mut engine = LayoutEngine::with_seed(LayoutConfig::default(), 21);

        let err = engine.populate(area(1, &r), &catalog, 0, &mut pool).unwrap_err();
        assert!(matches!(err, LayoutError::Pool(PoolError::Exhausted { .. })));
        assert_eq!(pool.total_active(), 0);
        assert!(!engine.is_live(NodeIndex(1)));
        assert!(engine.snapshot_for(NodeIndex(1)).is_none());

        pool.set_capacity(PoolKey::Entity(EntityTypeId(1)), 100);
        pool.set_capacity(PoolKey::Entity(EntityTypeId(2)), 100);
        let report = engine.populate(area(1, &r), &catalog, 0, &mut pool).unwrap();
        assert_eq!(report.common_placed, 20);
    }

    #[test]
    fn double_activation_is_refused() {
        let r = region(Vec2::new(4.0, 4.0), 2, RegionTier::Common);
        let catalog = catalog_with(vec![ore(1, 1)]);
        let mut pool = InMemoryPool::new();
        let mut engine = LayoutEngine::with_seed(LayoutConfig::default(), 23);
        engine.activate(area(1, &r), &catalog, 0, &mut pool).unwrap();
        assert!(matches!(
            engine.activate(area(1, &r), &catalog, 0, &mut pool),
            Err(LayoutError::AlreadyLive(NodeIndex(1)))
        ));
    }

    #[test]
    fn activate_prefers_snapshot() {
        let r = region(Vec2::new(4.0, 4.0), 3, RegionTier::Common);
        let catalog = catalog_with(vec![ore(1, 1)]);
        let mut pool = InMemoryPool::new();
        let mut engine = LayoutEngine::with_seed(LayoutConfig::default(), 29);
        assert!(matches!(
            engine.activate(area(1, &r), &catalog, 0, &mut pool).unwrap(),
            Activation::Populated(_)
        ));
        engine.snapshot(NodeIndex(1));
        engine.despawn(NodeIndex(1), &mut pool);
        assert_eq!(
            engine.activate(area(1, &r), &catalog, 0, &mut pool).unwrap(),
            Activation::Restored { entities: 3 }
        );
    }

    #[test]
    fn mining_unknown_entity_fails() {
        let catalog = catalog_with(Vec::new());
        let mut pool = InMemoryPool::new();
        let mut engine = LayoutEngine::with_seed(LayoutConfig::default(), 31);
        assert!(matches!(
            engine.mine(EntityId::new(), 1, 100.0, &catalog, &mut pool),
            Err(LayoutError::UnknownEntity(_))
        ));
    }

    #[test]
    fn consuming_a_resource_releases_and_drops() {
        let r = region(Vec2::new(4.0, 4.0), 1, RegionTier::Common);
        let catalog = catalog_with(vec![ore(1, 1)]);
        let mut pool = InMemoryPool::new();
        let mut engine = LayoutEngine::with_seed(LayoutConfig::default(), 37);
        engine.populate(area(1, &r), &catalog, 0, &mut pool).unwrap();
        let id = engine.live_entities(NodeIndex(1))[0].state.id;

        let hit = engine.mine(id, 1, 100.0, &catalog, &mut pool).unwrap();
        assert_eq!(
            hit,
            MineOutcome {
                still_alive: true,
                consumed: false,
                drop: None
            }
        );
        let last = engine.mine(id, 3, 300.0, &catalog, &mut pool).unwrap();
        assert!(last.consumed && !last.still_alive);
        assert_eq!(last.drop, Some(DropYield { item: 101, amount: 3 }));
        assert_eq!(pool.total_active(), 0);
        assert_eq!(engine.live_count(), 0);
    }

    #[test]
    fn clear_releases_everything() {
        let r = region(Vec2::new(6.0, 6.0), 6, RegionTier::Common);
        let catalog = catalog_with(vec![ore(1, 1)]);
        let mut pool = InMemoryPool::new();
        let mut engine = LayoutEngine::with_seed(LayoutConfig::default(), 41);
        engine.populate(area(1, &r), &catalog, 0, &mut pool).unwrap();
        engine.snapshot(NodeIndex(1));
        engine.clear(&mut pool);
        assert_eq!(pool.total_active(), 0);
        assert!(engine.snapshots().is_empty());
        assert!(!engine.is_live(NodeIndex(1)));
    }
}
