//! Transition driver.
//!
//! Portal triggers, returns and recalls become requests. A request waits out
//! the fade-out, mutates the graph exactly once at the visual midpoint, then
//! blocks new requests until the fade-in finishes. Time only moves through
//! [`Navigator::advance`].

use mapgraph_common::{Direction, EntityId, NodeIndex};
use mapgraph_layout::MineOutcome;

use crate::config::TransitionConfig;
use crate::graph::{GraphError, MapGraph, TransitionOutcome, WorldEnv};
use crate::modes::{ModeFlags, RecallOverride, transitions_locked};
use crate::portal::Traversal;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    /// Walked through a portal; the traversal was resolved on contact.
    Portal {
        direction: Direction,
        traversal: Traversal,
    },
    Return,
    Home,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TransitionPhase {
    Idle,
    /// Fade-out running.
    Pending { request: Request, remaining: f32 },
    /// Graph mutation in progress.
    Transitioning,
    /// Fade-in running; requests are still ignored.
    Settling { remaining: f32 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Recall {
    remaining: f32,
    forced: bool,
}

/// Owns the graph and serializes every mutation through one phase machine.
pub struct Navigator {
    graph: MapGraph,
    config: TransitionConfig,
    phase: TransitionPhase,
    dwell: Option<(Direction, f32)>,
    recall: Option<Recall>,
    /// Set when a recall countdown expires, cleared after its mutation.
    recall_override: bool,
}

impl Navigator {
    pub fn new(graph: MapGraph, config: TransitionConfig) -> Self {
        Self {
            graph,
            config,
            phase: TransitionPhase::Idle,
            dwell: None,
            recall: None,
            recall_override: false,
        }
    }

    pub fn graph(&self) -> &MapGraph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut MapGraph {
        &mut self.graph
    }

    pub fn into_graph(self) -> MapGraph {
        self.graph
    }

    pub fn phase(&self) -> TransitionPhase {
        self.phase
    }

    pub fn is_idle(&self) -> bool {
        self.phase == TransitionPhase::Idle
    }

    pub fn current_node_index(&self) -> NodeIndex {
        self.graph.current_node_index()
    }

    pub fn recall_pending(&self) -> bool {
        self.recall.is_some()
    }

    /// Queue a portal transition. Returns whether it was accepted.
    pub fn request_transition(&mut self, direction: Direction, modes: &dyn ModeFlags) -> bool {
        if !self.is_idle() {
            tracing::debug!(?direction, "portal request ignored: transition in flight");
            return false;
        }
        let modes = RecallOverride::new(modes, self.recall_override);
        let Some(traversal) = self.graph.resolve_entry(direction, &modes) else {
            return false;
        };
        self.start(Request::Portal {
            direction,
            traversal,
        })
    }

    pub fn request_return(&mut self, modes: &dyn ModeFlags) -> bool {
        self.request(Request::Return, modes)
    }

    pub fn request_home_return(&mut self, modes: &dyn ModeFlags) -> bool {
        self.request(Request::Home, modes)
    }

    /// Player touched a portal. It fires after standing in it for the dwell time.
    pub fn portal_contact(&mut self, direction: Direction) {
        if !matches!(self.dwell, Some((d, _)) if d == direction) {
            self.dwell = Some((direction, self.config.portal_dwell));
        }
    }

    pub fn portal_release(&mut self) {
        self.dwell = None;
    }

    /// Start the recall countdown. Only away from home, and only once.
    pub fn begin_recall(&mut self, forced: bool) -> bool {
        if self.recall.is_some() || !self.is_idle() || self.current_node_index().is_home() {
            return false;
        }
        self.recall = Some(Recall {
            remaining: self.config.recall_countdown,
            forced,
        });
        tracing::debug!(forced, "recall started");
        true
    }

    /// Movement input cancels a voluntary recall before it expires.
    pub fn cancel_recall(&mut self) -> bool {
        match self.recall {
            Some(r) if !r.forced => {
                self.recall = None;
                tracing::debug!("recall cancelled");
                true
            }
            _ => false,
        }
    }

    /// Advance the clock. Returns the result of the graph mutation when the
    /// midpoint of a transition is crossed during this step.
    pub fn advance(
        &mut self,
        dt: f32,
        env: &mut WorldEnv<'_>,
    ) -> Option<Result<TransitionOutcome, GraphError>> {
        let result = self.step_phase(dt, env);
        if self.is_idle() {
            self.tick_recall(dt);
            self.tick_dwell(dt, env.modes);
        }
        result
    }

    /// Mining is refused while the graph is mutating.
    pub fn mine(
        &mut self,
        entity: EntityId,
        damage: u32,
        drop_rate_percent: f64,
        env: &mut WorldEnv<'_>,
    ) -> Result<Option<MineOutcome>, GraphError> {
        if self.phase == TransitionPhase::Transitioning {
            return Ok(None);
        }
        self.graph
            .mine(entity, damage, drop_rate_percent, env)
            .map(Some)
    }

    fn request(&mut self, request: Request, modes: &dyn ModeFlags) -> bool {
        if !self.is_idle() {
            tracing::debug!(?request, "request ignored: transition in flight");
            return false;
        }
        if transitions_locked(&RecallOverride::new(modes, self.recall_override)) {
            tracing::debug!(?request, "request ignored: locked");
            return false;
        }
        self.start(request)
    }

    fn start(&mut self, request: Request) -> bool {
        self.dwell = None;
        self.phase = TransitionPhase::Pending {
            request,
            remaining: self.config.fade_out,
        };
        true
    }

    fn step_phase(
        &mut self,
        dt: f32,
        env: &mut WorldEnv<'_>,
    ) -> Option<Result<TransitionOutcome, GraphError>> {
        match self.phase {
            TransitionPhase::Idle | TransitionPhase::Transitioning => None,
            TransitionPhase::Pending { request, remaining } => {
                let remaining = remaining - dt;
                if remaining > 0.0 {
                    self.phase = TransitionPhase::Pending { request, remaining };
                    return None;
                }
                self.phase = TransitionPhase::Transitioning;
                let result = self.execute(request, env);
                if let Err(e) = &result {
                    tracing::warn!(?request, error = %e, "transition failed");
                }
                self.recall_override = false;
                self.phase = TransitionPhase::Settling {
                    remaining: self.config.fade_in,
                };
                Some(result)
            }
            TransitionPhase::Settling { remaining } => {
                let remaining = remaining - dt;
                self.phase = if remaining > 0.0 {
                    TransitionPhase::Settling { remaining }
                } else {
                    TransitionPhase::Idle
                };
                None
            }
        }
    }

    fn execute(
        &mut self,
        request: Request,
        env: &mut WorldEnv<'_>,
    ) -> Result<TransitionOutcome, GraphError> {
        let modes = RecallOverride::new(env.modes, self.recall_override);
        let mut scoped = WorldEnv::new(&mut *env.pool, env.catalog, &modes);
        match request {
            Request::Portal {
                direction,
                traversal,
            } => self.graph.enter_portal(direction, traversal, &mut scoped),
            Request::Return => self.graph.return_to_previous(&mut scoped),
            Request::Home => self.graph.return_to_home(&mut scoped),
        }
    }

    fn tick_recall(&mut self, dt: f32) {
        let Some(recall) = &mut self.recall else {
            return;
        };
        recall.remaining -= dt;
        if recall.remaining > 0.0 {
            return;
        }
        self.recall = None;
        self.recall_override = true;
        tracing::info!("recall countdown finished");
        self.start(Request::Home);
    }

    fn tick_dwell(&mut self, dt: f32, modes: &dyn ModeFlags) {
        let Some((direction, remaining)) = &mut self.dwell else {
            return;
        };
        *remaining -= dt;
        if *remaining > 0.0 {
            return;
        }
        let direction = *direction;
        self.dwell = None;
        self.request_transition(direction, modes);
    }
}
