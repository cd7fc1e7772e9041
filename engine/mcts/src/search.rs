//! Search orchestration.
//!
//! [`MctsAgent`] owns everything that lives across moves (the tree, the
//! transposition index, the reclaimer thread and the game history) and runs
//! one search at a time:
//! 1. Resolve the root, reusing the previous tree when the position matches
//! 2. Evaluate and expand the root if needed, then mix in root noise
//! 3. Run the workers on scoped threads while polling the time budget
//! 4. Join, aggregate statistics and pre-link the next move's root candidates

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, ScopedJoinHandle};
use std::time::{Duration, Instant};

use engine_core::{GameHistory, InfiniteTime, MoveTimeManager, Position, StateHistory, TimeManager};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{ConfigError, SearchConfig};
use crate::evaluator::{assign_priors, EvalResult, Evaluator, EvaluatorError};
use crate::node::Node;
use crate::reclaimer::{ReclaimStats, Reclaimer};
use crate::stats::{
    child_statistics, root_statistics, ChildStatistics, NpsAverage, RootStatistics, SearchCounters, SearchStats,
};
use crate::transposition::TranspositionIndex;
use crate::tree::{RootResolution, TreeManager};
use crate::worker::{SearchShared, Worker};

/// Errors that can occur during MCTS search.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("Evaluator error: {0}")]
    Evaluator(#[from] EvaluatorError),

    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Cannot search a terminal position")]
    TerminalPosition,

    #[error("No legal moves available")]
    NoLegalMoves,

    #[error("Search ended before any root move was evaluated")]
    NoEvaluatedChildren,

    #[error("No position has been searched yet")]
    NoPosition,

    #[error("Illegal move: {0}")]
    IllegalMove(String),

    #[error("A search is already running")]
    AlreadyRunning,

    #[error("Failed to spawn search thread: {0}")]
    ThreadSpawn(#[from] std::io::Error),

    #[error("Search worker panicked")]
    WorkerPanicked,
}

/// Lifecycle of a search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SearchState {
    Idle = 0,
    Running = 1,
    Stopping = 2,
}

impl SearchState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => Self::Running,
            2 => Self::Stopping,
            _ => Self::Idle,
        }
    }
}

#[derive(Debug, Default)]
struct Control {
    stop: AtomicBool,
    state: AtomicU8,
}

/// Cloneable handle to stop a running search, usable from any thread.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    control: Arc<Control>,
}

impl StopHandle {
    /// Ask the running search to stop. Workers finish their current batch
    /// round and exit.
    pub fn stop(&self) {
        self.control.stop.store(true, Ordering::Release);
        let _ = self.control.state.compare_exchange(
            SearchState::Running as u8,
            SearchState::Stopping as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    pub fn is_stopped(&self) -> bool {
        self.control.stop.load(Ordering::Acquire)
    }

    pub fn state(&self) -> SearchState {
        SearchState::from_u8(self.control.state.load(Ordering::Acquire))
    }

    /// Idle -> Running. Fails if a search is already in progress.
    pub(crate) fn begin(&self) -> bool {
        let started = self
            .control
            .state
            .compare_exchange(
                SearchState::Idle as u8,
                SearchState::Running as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok();
        if started {
            self.control.stop.store(false, Ordering::Release);
        }
        started
    }

    pub(crate) fn finish(&self) {
        self.control.state.store(SearchState::Idle as u8, Ordering::Release);
    }
}

/// Limits for a single search. A search without limits runs until stopped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchLimits {
    /// Playouts to back up.
    pub nodes: Option<u64>,
    /// Wall-clock budget.
    pub movetime: Option<Duration>,
}

impl SearchLimits {
    pub fn nodes(nodes: u64) -> Self {
        Self {
            nodes: Some(nodes),
            movetime: None,
        }
    }

    pub fn movetime(movetime: Duration) -> Self {
        Self {
            nodes: None,
            movetime: Some(movetime),
        }
    }

    /// Builder pattern: add a node limit.
    pub fn with_nodes(mut self, nodes: u64) -> Self {
        self.nodes = Some(nodes);
        self
    }

    /// Time manager matching `movetime`.
    pub fn time_manager(&self) -> Box<dyn TimeManager> {
        match self.movetime {
            Some(budget) => Box::new(MoveTimeManager::new(budget)),
            None => Box::new(InfiniteTime),
        }
    }
}

/// Result of an MCTS search.
#[derive(Debug, Clone)]
pub struct SearchResult<M> {
    /// Move to play
    pub best_move: M,

    /// Mean value of `best_move` from the searching side's perspective
    pub value: f32,

    /// Per-move statistics at the root
    pub children: Vec<ChildStatistics<M>>,

    /// Whether the search started from a reused tree
    pub reused: bool,

    pub stats: SearchStats,
}

impl<M: Copy> SearchResult<M> {
    /// Visit distribution over the root moves.
    pub fn policy(&self) -> Vec<(M, f32)> {
        let total: u32 = self.children.iter().map(|c| c.visits).sum();
        self.children
            .iter()
            .map(|c| {
                let share = if total == 0 {
                    0.0
                } else {
                    c.visits as f32 / total as f32
                };
                (c.mv, share)
            })
            .collect()
    }
}

/// Multi-threaded MCTS player for one side (or both) of a game.
pub struct MctsAgent<P: Position, E: Evaluator<P>> {
    config: SearchConfig,
    evaluator: E,
    index: Arc<TranspositionIndex<P>>,
    tree: TreeManager<P>,
    history: Box<dyn StateHistory>,
    /// Position the tree and history currently describe
    position: Option<P>,
    control: StopHandle,
    rng: ChaCha20Rng,
    last_stats: Option<SearchStats>,
    /// Search speed over the current game
    nps: NpsAverage,
    reclaimer: Reclaimer<P>,
}

impl<P: Position, E: Evaluator<P>> MctsAgent<P, E> {
    pub fn new(config: SearchConfig, evaluator: E) -> Result<Self, SearchError> {
        config.validate()?;
        let index = Arc::new(TranspositionIndex::new());
        let reclaimer = Reclaimer::spawn(Arc::clone(&index))?;
        Ok(Self {
            tree: TreeManager::new(config.tree_reuse),
            rng: ChaCha20Rng::seed_from_u64(config.seed),
            config,
            evaluator,
            index,
            history: Box::new(GameHistory::new()),
            position: None,
            control: StopHandle::default(),
            last_stats: None,
            nps: NpsAverage::default(),
            reclaimer,
        })
    }

    /// Builder pattern: track played positions with a custom history.
    pub fn with_history(mut self, history: Box<dyn StateHistory>) -> Self {
        self.history = history;
        self
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn evaluator(&self) -> &E {
        &self.evaluator
    }

    pub fn tree(&self) -> &TreeManager<P> {
        &self.tree
    }

    pub fn index(&self) -> &TranspositionIndex<P> {
        &self.index
    }

    /// Position the agent is following, set by a search and advanced by
    /// `apply_move`.
    pub fn position(&self) -> Option<&P> {
        self.position.as_ref()
    }

    pub fn history(&self) -> &dyn StateHistory {
        self.history.as_ref()
    }

    pub fn reclaim_stats(&self) -> &ReclaimStats {
        self.reclaimer.stats()
    }

    /// Statistics of the most recent search, including aborted ones.
    pub fn last_stats(&self) -> Option<&SearchStats> {
        self.last_stats.as_ref()
    }

    /// Average playouts per second over the searches of the current game.
    pub fn overall_nps(&self) -> f64 {
        self.nps.mean()
    }

    pub fn state(&self) -> SearchState {
        self.control.state()
    }

    /// Handle for stopping searches from another thread.
    pub fn stop_handle(&self) -> StopHandle {
        self.control.clone()
    }

    pub fn stop(&self) {
        self.control.stop();
    }

    /// Change the Q weight between searches.
    pub fn set_q_value_weight(&mut self, weight: f32) -> Result<(), ConfigError> {
        let config = self.config.clone().with_q_value_weight(weight);
        config.validate()?;
        self.config = config;
        Ok(())
    }

    /// Change the root noise weight between searches (0 disables noise).
    pub fn set_dirichlet_epsilon(&mut self, epsilon: f32) -> Result<(), ConfigError> {
        let alpha = self.config.dirichlet_alpha;
        let config = self.config.clone().with_dirichlet(alpha, epsilon);
        config.validate()?;
        self.config = config;
        Ok(())
    }

    /// Search with the time manager implied by `limits.movetime`.
    pub fn search(&mut self, position: &P, limits: SearchLimits) -> Result<SearchResult<P::Move>, SearchError> {
        let time = limits.time_manager();
        self.start_search(position, limits, time.as_ref())
    }

    /// Run one search of `position`. Blocks until a limit is reached, the
    /// time manager says stop, a stop handle fires or an evaluator fails.
    pub fn start_search(
        &mut self,
        position: &P,
        limits: SearchLimits,
        time: &dyn TimeManager,
    ) -> Result<SearchResult<P::Move>, SearchError> {
        if !self.control.begin() {
            return Err(SearchError::AlreadyRunning);
        }
        let result = self.run_search(position, limits, time);
        self.control.finish();
        result
    }

    fn run_search(
        &mut self,
        position: &P,
        limits: SearchLimits,
        time: &dyn TimeManager,
    ) -> Result<SearchResult<P::Move>, SearchError> {
        let started = Instant::now();
        self.sync_history(position);
        let window = self.history.repetition_window();
        let RootResolution { root, reused } =
            self.tree.resolve_root(position, window, &self.index, &self.reclaimer);

        if root.is_terminal() {
            return Err(SearchError::TerminalPosition);
        }
        if !root.is_expanded() {
            self.expand_root(&root)?;
        }
        if root.edges().is_empty() {
            return Err(SearchError::NoLegalMoves);
        }
        self.apply_root_noise(&root);

        let reused_nodes = root.visits();
        let counters = SearchCounters::default();
        let outcome = self.run_workers(&root, limits, time, &counters, started);

        let stats = counters.snapshot(started.elapsed(), reused_nodes);
        self.last_stats = Some(stats.clone());
        if let Err(err) = outcome {
            warn!(error = %err, playouts = stats.playouts, "Search aborted");
            return Err(err);
        }

        let edges = root.edges();
        let Some(best) = root.best_edge().map(|idx| &edges[idx]).filter(|e| e.visits() > 0) else {
            // the caller has to pick a move itself
            return Err(SearchError::NoEvaluatedChildren);
        };
        let best_move = best.mv();
        let value = best.mean_value();
        self.tree.prepare_candidates(best_move);
        if stats.playouts > 0 {
            self.nps.record(stats.nps);
        }

        debug!(
            best_move = ?best_move,
            value,
            playouts = stats.playouts,
            nps = stats.nps as u64,
            overall_nps = self.nps.mean() as u64,
            reused_nodes,
            "Search finished"
        );

        Ok(SearchResult {
            best_move,
            value,
            children: child_statistics(&root),
            reused,
            stats,
        })
    }

    /// Restart the history when asked to search a position that is not the
    /// one the agent has been following.
    fn sync_history(&mut self, position: &P) {
        if self.position.as_ref() == Some(position) {
            return;
        }
        self.history.clear();
        self.history.push(position.hash_key(), true);
        self.position = Some(position.clone());
    }

    fn expand_root(&self, root: &Node<P>) -> Result<(), SearchError> {
        if !root.try_claim() {
            return Ok(());
        }
        match self.evaluate_root(root) {
            Ok(result) => {
                let priors = assign_priors(root.position().legal_moves(), &result.priors);
                root.expand(result.value, priors);
                Ok(())
            }
            Err(err) => {
                root.release_claim();
                Err(err.into())
            }
        }
    }

    fn evaluate_root(&self, root: &Node<P>) -> Result<EvalResult<P::Move>, EvaluatorError> {
        let results = self.evaluator.evaluate_batch(&[root.position()])?;
        let [result]: [EvalResult<P::Move>; 1] = results.try_into().map_err(|results: Vec<_>| {
            EvaluatorError::MalformedOutput(format!("expected 1 result for the root, got {}", results.len()))
        })?;
        result.validate()?;
        Ok(result)
    }

    /// Mix Dirichlet noise into the root priors, always starting from the
    /// evaluator's priors so reused roots do not accumulate noise.
    fn apply_root_noise(&mut self, root: &Node<P>) {
        let edges = root.edges();
        let eps = self.config.dirichlet_epsilon;
        if eps <= 0.0 || edges.len() < 2 {
            for edge in edges {
                edge.set_prior(edge.raw_prior());
            }
            return;
        }

        let noise = dirichlet_noise(edges.len(), self.config.dirichlet_alpha, &mut self.rng);
        for (edge, n) in edges.iter().zip(noise) {
            edge.set_prior((1.0 - eps) * edge.raw_prior() + eps * n);
        }
    }

    fn run_workers(
        &self,
        root: &Node<P>,
        limits: SearchLimits,
        time: &dyn TimeManager,
        counters: &SearchCounters,
        started: Instant,
    ) -> Result<(), SearchError> {
        let shared = SearchShared {
            root,
            index: self.index.as_ref(),
            config: &self.config,
            stop: &self.control,
            counters,
            node_limit: limits.nodes,
        };
        let evaluator = &self.evaluator;

        thread::scope(|scope| {
            let mut handles = Vec::with_capacity(self.config.threads);
            for id in 0..self.config.threads {
                let shared = &shared;
                let spawned = thread::Builder::new()
                    .name(format!("mcts-worker-{id}"))
                    .spawn_scoped(scope, move || Worker::new(id, shared, evaluator).run());
                match spawned {
                    Ok(handle) => handles.push(handle),
                    Err(err) => {
                        // the scope joins the workers already running
                        self.control.stop();
                        return Err(SearchError::ThreadSpawn(err));
                    }
                }
            }

            self.supervise(&handles, root, time, counters, started);

            let mut first_error = None;
            for handle in handles {
                let error = match handle.join() {
                    Ok(Ok(())) => continue,
                    Ok(Err(err)) => SearchError::Evaluator(err),
                    Err(_) => SearchError::WorkerPanicked,
                };
                first_error.get_or_insert(error);
            }
            first_error.map_or(Ok(()), Err)
        })
    }

    /// Poll until every worker has exited, raising the stop flag once the
    /// time manager says so.
    fn supervise<T>(
        &self,
        handles: &[ScopedJoinHandle<'_, T>],
        root: &Node<P>,
        time: &dyn TimeManager,
        counters: &SearchCounters,
        started: Instant,
    ) {
        let mut next_log = self.config.log_interval.map(|interval| started + interval);
        loop {
            let finished = handles.iter().filter(|h| h.is_finished()).count();
            if finished == handles.len() {
                break;
            }
            let elapsed = started.elapsed();
            if !self.control.is_stopped() {
                if finished > 0 {
                    // a worker only exits early by panicking
                    self.control.stop();
                } else if time.should_stop(elapsed, counters.playouts()) {
                    debug!(elapsed_ms = elapsed.as_millis() as u64, "Time budget used up");
                    self.control.stop();
                }
            }
            if let (Some(at), Some(interval)) = (next_log, self.config.log_interval) {
                if Instant::now() >= at {
                    log_status(root, counters, elapsed);
                    next_log = Some(at + interval);
                }
            }
            thread::sleep(self.config.poll_interval);
        }
    }

    /// Most visited root move. `None` before the first search or while no
    /// root move has been visited.
    pub fn best_move(&self) -> Option<P::Move> {
        let root = self.tree.root()?;
        let edge = &root.edges()[root.best_edge()?];
        (edge.visits() > 0).then(|| edge.mv())
    }

    /// Statistics of the tree below the current root.
    pub fn root_statistics(&self) -> Option<RootStatistics<P::Move>> {
        self.tree.root().map(|root| root_statistics(root))
    }

    /// Follow a move played on the board, by this agent (`is_own`) or by the
    /// opponent.
    pub fn apply_move(&mut self, mv: P::Move, is_own: bool) -> Result<(), SearchError> {
        let current = self.position.as_ref().ok_or(SearchError::NoPosition)?;
        if !current.legal_moves().contains(&mv) {
            return Err(SearchError::IllegalMove(format!("{mv:?}")));
        }
        let next = current.apply(mv);
        self.history.push(next.hash_key(), current.is_irreversible(mv));
        let window = self.history.repetition_window();
        self.tree.apply_move(mv, is_own, &next, window, &self.reclaimer);
        self.position = Some(next);
        Ok(())
    }

    /// Drop the tree and the history.
    pub fn new_game(&mut self) {
        self.tree.clear(&self.reclaimer);
        self.history.clear();
        self.position = None;
        self.last_stats = None;
        self.nps = NpsAverage::default();
    }
}

impl<P: Position, E: Evaluator<P>> Drop for MctsAgent<P, E> {
    fn drop(&mut self) {
        // hand the tree to the reclaimer before its thread is joined
        self.tree.clear(&self.reclaimer);
    }
}

fn log_status<P: Position>(root: &Node<P>, counters: &SearchCounters, elapsed: Duration) {
    let stats = counters.snapshot(elapsed, 0);
    let best = root.best_edge().map(|idx| &root.edges()[idx]);
    info!(
        playouts = stats.playouts,
        nps = stats.nps as u64,
        avg_depth = format_args!("{:.1}", stats.avg_depth),
        max_depth = stats.max_depth,
        best_move = ?best.map(|e| e.mv()),
        best_visits = best.map_or(0, |e| e.visits()),
        value = best.map_or(0.0, |e| e.mean_value()),
        "Search status"
    );
}

/// Sample a Dirichlet(alpha) vector of length `n` through normalized Gamma draws.
fn dirichlet_noise(n: usize, alpha: f32, rng: &mut ChaCha20Rng) -> Vec<f32> {
    use rand_distr::{Distribution, Gamma};

    let Ok(gamma) = Gamma::new(alpha as f64, 1.0) else {
        return vec![1.0 / n as f32; n];
    };
    let mut samples: Vec<f32> = (0..n).map(|_| gamma.sample(rng) as f32).collect();

    // Normalize
    let sum: f32 = samples.iter().sum();
    if sum > 0.0 {
        for s in &mut samples {
            *s /= sum;
        }
    } else {
        samples.fill(1.0 / n as f32);
    }

    samples
}
