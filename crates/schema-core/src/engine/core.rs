//! Motor de ejecución del grafo.
//!
//! Recorre el grafo desde el nodo de entrada pasando el `WorkflowState` de
//! nodo en nodo. Cada ejecución de nodo (y de rama) va envuelta en la
//! política de reintentos; un error definitivo deriva al manejador de errores
//! con el fallo registrado en el estado; una rama que termina la corrida
//! deriva igual y el reduce no se ejecuta. El límite de recursión cuenta
//! ejecuciones de nodo y es fatal, aunque antes corre el manejador.

use std::sync::Arc;

use futures::future::join_all;
use log::{debug, info, warn};

use super::builder::{Edge, Graph};
use super::retry::{run_with_retry, RetryPolicy};
use crate::constants::DEFAULT_RECURSION_LIMIT;
use crate::errors::{classify_error, ErrorClass, NodeError, WorkflowError, WorkflowFailure};
use crate::event::{EventStore, FlowEvent, FlowEventKind, InMemoryEventStore};
use crate::hashing::schema_fingerprint;
use crate::model::{BranchFailure, BranchState, WorkflowConfig, WorkflowState};
use crate::node::{Route, Transition, WorkflowNode};
use uuid::Uuid;

pub struct WorkflowEngine<E>
    where E: EventStore
{
    graph: Arc<Graph>,
    event_store: E,
    recursion_limit: usize,
    retry: RetryPolicy,
}

impl WorkflowEngine<InMemoryEventStore> {
    /// Motor con traza en memoria y límites por defecto.
    pub fn new(graph: Graph) -> Self {
        Self::with_store(graph, InMemoryEventStore::new())
    }
}

enum Step {
    Next(String),
    Finish,
}

impl<E> WorkflowEngine<E>
    where E: EventStore
{
    pub fn with_store(graph: Graph, event_store: E) -> Self {
        Self { graph: Arc::new(graph),
               event_store,
               recursion_limit: DEFAULT_RECURSION_LIMIT,
               retry: RetryPolicy::default() }
    }

    /// Aplica límite de recursión y política de reintentos de la config.
    pub fn with_config(mut self, config: &WorkflowConfig) -> Self {
        self.recursion_limit = config.recursion_limit;
        self.retry = config.node_retry.clone();
        self
    }

    pub fn with_recursion_limit(mut self, limit: usize) -> Self {
        self.recursion_limit = limit;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn events(&self, run_id: Uuid) -> Vec<FlowEvent> {
        self.event_store.list(run_id)
    }

    /// Ejecuta la corrida completa y devuelve el estado terminal.
    pub async fn run(&self, initial: WorkflowState) -> Result<WorkflowState, WorkflowError> {
        let run_id = initial.run_id;
        self.event_store.append_kind(run_id,
                                     FlowEventKind::FlowInitialized { graph_hash: self.graph.hash().to_string(),
                                                                      entry: self.graph.entry().to_string() });
        info!("run {run_id} started at '{}'", self.graph.entry());

        let mut state = initial;
        let mut current = self.graph.entry().to_string();
        let mut executed = 0usize;
        loop {
            executed += 1;
            if executed > self.recursion_limit {
                let err = WorkflowError::RecursionLimitExceeded { limit: self.recursion_limit };
                self.finalize_after_limit(run_id, &current, &state, &err).await;
                return Err(self.fail(run_id, err));
            }
            let node = match self.graph.node(&current) {
                Ok(node) => node.clone(),
                Err(e) => return Err(self.fail(run_id, e)),
            };

            let transition = match self.run_node(run_id, node.as_ref(), &state).await {
                Ok(t) => t,
                Err(err) => {
                    current = self.route_failure(run_id, &current, err, &mut state)?;
                    continue;
                }
            };
            self.event_store.append_kind(run_id,
                                         FlowEventKind::NodeFinished { node: current.clone(),
                                                                       schema_fingerprint: schema_fingerprint(transition.state().working_schema()) });

            let step = match transition {
                Transition::End(next) => {
                    state = next;
                    Step::Finish
                }
                Transition::Goto(next, to) => {
                    debug!("node '{current}' jumps to '{to}'");
                    state = next;
                    Step::Next(to)
                }
                Transition::FanOut(next, branches) => {
                    let (next, to) = self.fan_out(run_id, &current, next, branches).await?;
                    state = next;
                    Step::Next(to)
                }
                Transition::Continue(next) => {
                    state = next;
                    match self.graph.edge(&current) {
                        Some(Edge::Direct(to)) => Step::Next(to.clone()),
                        Some(Edge::Conditional(router)) => match router(&state) {
                            Route::Node(to) => Step::Next(to),
                            Route::End => Step::Finish,
                        },
                        Some(Edge::FanOut { .. }) => {
                            let (next, to) = self.fan_out(run_id, &current, state, Vec::new()).await?;
                            state = next;
                            Step::Next(to)
                        }
                        Some(Edge::End) | None => Step::Finish,
                    }
                }
            };

            match step {
                Step::Next(to) => current = to,
                Step::Finish => {
                    self.event_store.append_kind(run_id,
                                                 FlowEventKind::FlowCompleted { schema_fingerprint:
                                                                                    schema_fingerprint(state.working_schema()),
                                                                                executed_nodes: executed });
                    info!("run {run_id} completed after {executed} node executions");
                    return Ok(state);
                }
            }
        }
    }

    /// Registra el fallo de `node` en el estado y devuelve el manejador al que
    /// derivar. Sin manejador (o si el que falla es el propio manejador) el
    /// error es fatal.
    fn route_failure(&self,
                     run_id: Uuid,
                     node: &str,
                     err: NodeError,
                     state: &mut WorkflowState)
                     -> Result<String, WorkflowError> {
        let class = classify_error(&err);
        self.event_store.append_kind(run_id,
                                     FlowEventKind::NodeFailed { node: node.to_string(),
                                                                 class,
                                                                 error: err.to_string() });
        match self.graph.error_handler() {
            Some(handler) if handler != node => {
                warn!("node '{node}' failed ({class:?}): {err}; routing to '{handler}'");
                *state = state.with_failure(WorkflowFailure::new(node, &err));
                Ok(handler.to_string())
            }
            _ => Err(self.fail(run_id,
                               WorkflowError::Node { node: node.to_string(),
                                                     source: err })),
        }
    }

    /// Agotado el límite, el manejador corre una sola vez con el fallo
    /// registrado para dejar resumen y traza. La corrida sigue siendo fatal.
    async fn finalize_after_limit(&self, run_id: Uuid, current: &str, state: &WorkflowState, err: &WorkflowError) {
        let Some(handler) = self.graph.error_handler() else {
            return;
        };
        if handler == current {
            return;
        }
        let Ok(node) = self.graph.node(handler).cloned() else {
            return;
        };
        let cause = NodeError::Termination(err.to_string());
        self.event_store.append_kind(run_id,
                                     FlowEventKind::NodeFailed { node: current.to_string(),
                                                                 class: ErrorClass::Termination,
                                                                 error: cause.to_string() });
        warn!("{err} at '{current}'; running '{handler}' before aborting");
        let state = state.with_failure(WorkflowFailure::new(current, &cause));
        match self.run_node(run_id, node.as_ref(), &state).await {
            Ok(transition) => {
                self.event_store.append_kind(run_id,
                                             FlowEventKind::NodeFinished { node: handler.to_string(),
                                                                           schema_fingerprint: schema_fingerprint(transition.state().working_schema()) });
            }
            Err(e) => warn!("error handler '{handler}' failed after recursion limit: {e}"),
        }
    }

    /// Reparte las ramas del borde fan-out de `from` y devuelve el estado con
    /// los resultados y el siguiente nodo: el reduce, o el manejador de
    /// errores si alguna rama terminó la corrida.
    async fn fan_out(&self,
                     run_id: Uuid,
                     from: &str,
                     state: WorkflowState,
                     branches: Vec<BranchState>)
                     -> Result<(WorkflowState, String), WorkflowError> {
        let (branch, reduce) = match self.graph.edge(from) {
            Some(Edge::FanOut { branch, reduce }) => (branch.clone(), reduce.clone()),
            _ => return Err(self.fail(run_id, WorkflowError::MissingFanOutEdge(from.to_string()))),
        };
        let (mut state, terminated) = match self.dispatch(run_id, from, &branch, state, branches).await {
            Ok(out) => out,
            Err(e) => return Err(self.fail(run_id, e)),
        };
        match terminated {
            Some(err) => {
                let handler = self.route_failure(run_id, &branch, err, &mut state)?;
                Ok((state, handler))
            }
            None => Ok((state, reduce)),
        }
    }

    fn fail(&self, run_id: Uuid, err: WorkflowError) -> WorkflowError {
        warn!("run {run_id} failed: {err}");
        self.event_store.append_kind(run_id, FlowEventKind::FlowFailed { reason: err.to_string() });
        err
    }

    async fn run_node(&self,
                      run_id: Uuid,
                      node: &dyn WorkflowNode,
                      state: &WorkflowState)
                      -> Result<Transition, NodeError> {
        let id = node.id().to_string();
        run_with_retry(&self.retry,
                       |attempt| {
                           self.event_store.append_kind(run_id,
                                                        FlowEventKind::NodeStarted { node: id.clone(),
                                                                                     attempt });
                           node.run(state)
                       },
                       |attempt, delay, err| {
                           warn!("node '{id}' attempt {attempt} failed: {err}; retrying in {delay:?}");
                           self.event_store.append_kind(run_id,
                                                        FlowEventKind::RetryScheduled { node: id.clone(),
                                                                                        attempt,
                                                                                        delay_ms: delay.as_millis() as u64,
                                                                                        reason: err.to_string() });
                       }).await
    }

    /// Ejecuta las ramas concurrentemente y vuelca salidas y fallos en el
    /// estado. Vuelve sólo cuando todas terminaron o fallaron; la primera
    /// terminación (por índice) se devuelve aparte.
    async fn dispatch(&self,
                      run_id: Uuid,
                      from: &str,
                      branch_id: &str,
                      mut state: WorkflowState,
                      branches: Vec<BranchState>)
                      -> Result<(WorkflowState, Option<NodeError>), WorkflowError> {
        let branch = self.graph.branch(branch_id)?.clone();
        self.event_store.append_kind(run_id,
                                     FlowEventKind::BranchesDispatched { node: from.to_string(),
                                                                         branch: branch_id.to_string(),
                                                                         count: branches.len() });
        debug!("dispatching {} '{branch_id}' branches", branches.len());

        let runs = branches.into_iter().map(|input| {
                                           let branch = branch.clone();
                                           async move {
                                               let out = run_with_retry(&self.retry,
                                                                        |_| branch.run(&input),
                                                                        |attempt, _, err| {
                                                                            warn!("branch {} attempt {attempt} failed: {err}",
                                                                                  input.index)
                                                                        }).await;
                                               (input, out)
                                           }
                                       });
        let mut results = join_all(runs).await;
        results.sort_by_key(|(input, _)| input.index);

        let mut terminated = None;
        for (input, out) in results {
            self.event_store.append_kind(run_id,
                                         FlowEventKind::BranchFinished { branch: branch_id.to_string(),
                                                                         index: input.index,
                                                                         success: out.is_ok() });
            match out {
                Ok(output) => state.branch_outputs.push(output),
                Err(err) => {
                    warn!("branch {} ('{}') failed: {err}", input.index, input.requirement.requirement);
                    state.branch_failures.push(BranchFailure { index: input.index,
                                                               requirement: input.requirement,
                                                               message: err.to_string() });
                    if terminated.is_none() && classify_error(&err) == ErrorClass::Termination {
                        terminated = Some(err);
                    }
                }
            }
        }
        Ok((state, terminated))
    }
}
