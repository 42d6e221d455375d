use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use schema_core::event::FlowEventKind;
use schema_core::model::{BranchOutput, BranchState};
use schema_core::repo::SchemaSnapshot;
use schema_core::{BranchNode, ErrorClass, GraphBuilder, NodeError, RetryPolicy, Route, Transition, WorkflowEngine, WorkflowError,
                  WorkflowNode, WorkflowState};
use schema_domain::{RequirementItem, Schema};
use uuid::Uuid;

fn initial_state() -> WorkflowState {
    WorkflowState::new(SchemaSnapshot { schema_id: Uuid::new_v4(),
                                        session_id: Uuid::new_v4(),
                                        schema: Schema::empty(),
                                        latest_version_number: 0 },
                       "test input")
}

/// Nodo que incrementa un contador y sigue su arista.
struct Counter {
    id: &'static str,
}

#[async_trait]
impl WorkflowNode for Counter {
    fn id(&self) -> &str {
        self.id
    }
    async fn run(&self, state: &WorkflowState) -> Result<Transition, NodeError> {
        Ok(Transition::Continue(state.with_retry_incremented(self.id)))
    }
}

/// Falla con `error` las primeras `failures` veces.
struct Flaky {
    id: &'static str,
    failures: u32,
    error: NodeError,
    calls: Arc<AtomicU32>,
}

#[async_trait]
impl WorkflowNode for Flaky {
    fn id(&self) -> &str {
        self.id
    }
    async fn run(&self, state: &WorkflowState) -> Result<Transition, NodeError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if n < self.failures {
            return Err(self.error.clone());
        }
        Ok(Transition::Continue(state.clone()))
    }
}

/// Manejador de errores: escribe un resumen y termina.
struct Finalize;

#[async_trait]
impl WorkflowNode for Finalize {
    fn id(&self) -> &str {
        "finalize"
    }
    async fn run(&self, state: &WorkflowState) -> Result<Transition, NodeError> {
        let mut next = state.clone();
        next.summary = Some(match &state.failure {
                                Some(f) => format!("failed at {}", f.node),
                                None => "ok".to_string(),
                            });
        Ok(Transition::End(next))
    }
}

#[tokio::test]
async fn conditional_edge_loops_until_router_ends() {
    let graph = GraphBuilder::new().node(Counter { id: "loop" })
                                   .node(Finalize)
                                   .entry("loop")
                                   .conditional("loop", |s| {
                                       if s.retry_count("loop") < 3 {
                                           Route::to("loop")
                                       } else {
                                           Route::to("finalize")
                                       }
                                   })
                                   .end("finalize")
                                   .build()
                                   .unwrap();
    let engine = WorkflowEngine::new(graph);
    let state = initial_state();
    let run_id = state.run_id;
    let out = engine.run(state).await.unwrap();
    assert_eq!(out.retry_count("loop"), 3);
    assert_eq!(out.summary.as_deref(), Some("ok"));

    let codes: String = engine.events(run_id).iter().map(|e| e.kind.code()).collect();
    assert_eq!(codes, "ISFSFSFSFC");
}

#[tokio::test]
async fn recursion_limit_is_fatal() {
    let graph = GraphBuilder::new().node(Counter { id: "spin" })
                                   .entry("spin")
                                   .edge("spin", "spin")
                                   .build()
                                   .unwrap();
    let engine = WorkflowEngine::new(graph).with_recursion_limit(5);
    let err = engine.run(initial_state()).await.unwrap_err();
    assert_eq!(err, WorkflowError::RecursionLimitExceeded { limit: 5 });
}

#[tokio::test]
async fn recursion_limit_runs_error_handler_before_failing() {
    let graph = GraphBuilder::new().node(Counter { id: "spin" })
                                   .node(Finalize)
                                   .entry("spin")
                                   .edge("spin", "spin")
                                   .end("finalize")
                                   .error_handler("finalize")
                                   .build()
                                   .unwrap();
    let engine = WorkflowEngine::new(graph).with_recursion_limit(4);
    let state = initial_state();
    let run_id = state.run_id;
    let err = engine.run(state).await.unwrap_err();
    assert_eq!(err, WorkflowError::RecursionLimitExceeded { limit: 4 });

    let events = engine.events(run_id);
    let failed = events.iter()
                       .find_map(|e| match &e.kind {
                           FlowEventKind::NodeFailed { node, class, .. } => Some((node.clone(), *class)),
                           _ => None,
                       })
                       .expect("limit recorded as node failure");
    assert_eq!(failed, ("spin".to_string(), ErrorClass::Termination));
    let handler_runs = events.iter()
                             .filter(|e| matches!(&e.kind, FlowEventKind::NodeFinished { node, .. } if node == "finalize"))
                             .count();
    assert_eq!(handler_runs, 1);
    assert!(matches!(events.last().map(|e| &e.kind), Some(FlowEventKind::FlowFailed { .. })));
}

#[tokio::test]
async fn transient_failures_are_retried_in_place() {
    let calls = Arc::new(AtomicU32::new(0));
    let graph = GraphBuilder::new().node(Flaky { id: "flaky",
                                                 failures: 2,
                                                 error: NodeError::Transient("timeout".into()),
                                                 calls: calls.clone() })
                                   .node(Finalize)
                                   .entry("flaky")
                                   .edge("flaky", "finalize")
                                   .end("finalize")
                                   .error_handler("finalize")
                                   .build()
                                   .unwrap();
    let engine = WorkflowEngine::new(graph).with_retry_policy(RetryPolicy::immediate(3));
    let state = initial_state();
    let run_id = state.run_id;
    let out = engine.run(state).await.unwrap();
    assert!(out.failure.is_none());
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    let retries = engine.events(run_id)
                        .iter()
                        .filter(|e| matches!(e.kind, FlowEventKind::RetryScheduled { .. }))
                        .count();
    assert_eq!(retries, 2);
}

#[tokio::test]
async fn termination_routes_to_error_handler_without_retry() {
    let calls = Arc::new(AtomicU32::new(0));
    let graph = GraphBuilder::new().node(Flaky { id: "doomed",
                                                 failures: 10,
                                                 error: NodeError::Termination("missing extension".into()),
                                                 calls: calls.clone() })
                                   .node(Finalize)
                                   .entry("doomed")
                                   .edge("doomed", "finalize")
                                   .end("finalize")
                                   .error_handler("finalize")
                                   .build()
                                   .unwrap();
    let engine = WorkflowEngine::new(graph).with_retry_policy(RetryPolicy::immediate(5));
    let out = engine.run(initial_state()).await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    let failure = out.failure.expect("failure recorded");
    assert_eq!(failure.node, "doomed");
    assert_eq!(out.summary.as_deref(), Some("failed at doomed"));
}

#[tokio::test]
async fn failure_without_handler_surfaces_to_caller() {
    let graph = GraphBuilder::new().node(Flaky { id: "boom",
                                                 failures: 1,
                                                 error: NodeError::Execution("bad".into()),
                                                 calls: Arc::new(AtomicU32::new(0)) })
                                   .entry("boom")
                                   .end("boom")
                                   .build()
                                   .unwrap();
    let err = WorkflowEngine::new(graph).run(initial_state()).await.unwrap_err();
    assert!(matches!(err, WorkflowError::Node { node, .. } if node == "boom"));
}

struct Distribute;

#[async_trait]
impl WorkflowNode for Distribute {
    fn id(&self) -> &str {
        "distribute"
    }
    async fn run(&self, state: &WorkflowState) -> Result<Transition, NodeError> {
        let branches = ["a", "b", "fail", "d"].iter()
                                              .enumerate()
                                              .map(|(i, r)| {
                                                  BranchState::new(i,
                                                                   RequirementItem::functional("cat", *r),
                                                                   state.schema.clone(),
                                                                   state.ddl.clone())
                                              })
                                              .collect();
        Ok(Transition::FanOut(state.clone(), branches))
    }
}

struct Echo;

#[async_trait]
impl BranchNode for Echo {
    fn id(&self) -> &str {
        "echo"
    }
    async fn run(&self, branch: &BranchState) -> Result<BranchOutput, NodeError> {
        assert!(branch.messages.is_empty());
        if branch.requirement.requirement == "fail" {
            return Err(NodeError::Execution("cannot".into()));
        }
        // ramas tardías terminan antes para forzar desorden
        tokio::time::sleep(std::time::Duration::from_millis(20 - 5 * branch.index as u64)).await;
        Ok(BranchOutput { index: branch.index,
                          requirement: branch.requirement.clone(),
                          testcases: Vec::new() })
    }
}

struct Reduce;

#[async_trait]
impl WorkflowNode for Reduce {
    fn id(&self) -> &str {
        "reduce"
    }
    async fn run(&self, state: &WorkflowState) -> Result<Transition, NodeError> {
        let mut next = state.clone();
        next.summary = Some(format!("{} ok, {} failed", state.branch_outputs.len(), state.branch_failures.len()));
        Ok(Transition::End(next))
    }
}

#[tokio::test]
async fn fan_out_waits_for_every_branch_before_reduce() {
    let graph = GraphBuilder::new().node(Distribute)
                                   .node(Reduce)
                                   .branch(Echo)
                                   .entry("distribute")
                                   .fan_out("distribute", "echo", "reduce")
                                   .end("reduce")
                                   .build()
                                   .unwrap();
    let engine = WorkflowEngine::new(graph).with_retry_policy(RetryPolicy::none());
    let state = initial_state();
    let run_id = state.run_id;
    let out = engine.run(state).await.unwrap();
    assert_eq!(out.summary.as_deref(), Some("3 ok, 1 failed"));
    assert_eq!(out.branch_outputs.iter().map(|o| o.index).collect::<Vec<_>>(), vec![0, 1, 3]);
    assert_eq!(out.branch_failures[0].index, 2);

    let events = engine.events(run_id);
    let last_branch = events.iter()
                            .rposition(|e| matches!(e.kind, FlowEventKind::BranchFinished { .. }))
                            .unwrap();
    let reduce_started = events.iter()
                               .position(|e| matches!(&e.kind, FlowEventKind::NodeStarted { node, .. } if node == "reduce"))
                               .unwrap();
    assert!(last_branch < reduce_started);
}

/// Rama que aborta la corrida entera.
struct Abort;

#[async_trait]
impl BranchNode for Abort {
    fn id(&self) -> &str {
        "abort"
    }
    async fn run(&self, branch: &BranchState) -> Result<BranchOutput, NodeError> {
        if branch.index == 1 {
            return Err(NodeError::Termination("pgtap extension missing".into()));
        }
        Ok(BranchOutput { index: branch.index,
                          requirement: branch.requirement.clone(),
                          testcases: Vec::new() })
    }
}

#[tokio::test]
async fn terminating_branch_skips_reduce_and_routes_to_handler() {
    let graph = GraphBuilder::new().node(Distribute)
                                   .node(Reduce)
                                   .node(Finalize)
                                   .branch(Abort)
                                   .entry("distribute")
                                   .fan_out("distribute", "abort", "reduce")
                                   .edge("reduce", "finalize")
                                   .end("finalize")
                                   .error_handler("finalize")
                                   .build()
                                   .unwrap();
    let engine = WorkflowEngine::new(graph).with_retry_policy(RetryPolicy::immediate(3));
    let state = initial_state();
    let run_id = state.run_id;
    let out = engine.run(state).await.unwrap();

    let failure = out.failure.expect("termination recorded");
    assert_eq!(failure.node, "abort");
    assert_eq!(failure.class, ErrorClass::Termination);
    assert_eq!(out.summary.as_deref(), Some("failed at abort"));
    assert_eq!(out.branch_outputs.len(), 3);
    assert_eq!(out.branch_failures.iter().map(|f| f.index).collect::<Vec<_>>(), vec![1]);

    let events = engine.events(run_id);
    assert!(!events.iter()
                   .any(|e| matches!(&e.kind, FlowEventKind::NodeStarted { node, .. } if node == "reduce")));
    let retries = events.iter()
                        .filter(|e| matches!(e.kind, FlowEventKind::RetryScheduled { .. }))
                        .count();
    assert_eq!(retries, 0);
}

#[test]
fn builder_rejects_dangling_edges() {
    let err = GraphBuilder::new().node(Counter { id: "a" })
                                 .entry("a")
                                 .edge("a", "missing")
                                 .build()
                                 .err()
                                 .expect("invalid graph");
    assert!(matches!(err, WorkflowError::Graph(_)));

    let err = GraphBuilder::new().node(Counter { id: "a" }).entry("a").build().err().expect("no edge");
    assert!(matches!(err, WorkflowError::Graph(msg) if msg.contains("no outgoing edge")));
}

#[test]
fn graph_hash_is_stable() {
    let build = || {
        GraphBuilder::new().node(Counter { id: "a" })
                           .node(Finalize)
                           .entry("a")
                           .edge("a", "finalize")
                           .end("finalize")
                           .build()
                           .unwrap()
    };
    assert_eq!(build().hash(), build().hash());
}
