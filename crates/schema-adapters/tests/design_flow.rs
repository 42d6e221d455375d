use std::sync::Arc;

use schema_adapters::nodes::{COMMIT_VERSION, DESIGN_SCHEMA, EXECUTE_DDL};
use schema_adapters::tools::SCHEMA_DESIGN_TOOL;
use schema_adapters::{design_graph, Deps};
use schema_core::constants::{DDL_EXECUTION_RETRY_KEY, VERSION_CONFLICT_RETRY_KEY};
use schema_core::event::FlowEventKind;
use schema_core::llm::{tool_reply, Message, ScriptedChatModel};
use schema_core::repo::{CreateVersionParams, InMemorySchemaRepository, SchemaRepository, TimelineKind};
use schema_core::sql::ScriptedSqlExecutor;
use schema_core::{RetryPolicy, WorkflowConfig, WorkflowEngine, WorkflowState};
use schema_domain::{PatchOperation, Schema};
use serde_json::{json, Value};
use uuid::Uuid;

fn users_table() -> Value {
    json!({"operations": [{
        "op": "add",
        "path": "/tables/users",
        "value": {
            "name": "users",
            "columns": {
                "id": {"name": "id", "type": "uuid", "notNull": true, "default": "gen_random_uuid()"},
                "email": {"name": "email", "type": "text", "notNull": true}
            },
            "constraints": {
                "users_pkey": {"type": "PRIMARY KEY", "name": "users_pkey", "columnNames": ["id"]}
            }
        }
    }]})
}

fn config() -> WorkflowConfig {
    WorkflowConfig { node_retry: RetryPolicy::none(),
                     ..WorkflowConfig::default() }
}

struct Fixture {
    model: Arc<ScriptedChatModel>,
    executor: Arc<ScriptedSqlExecutor>,
    repo: Arc<InMemorySchemaRepository>,
    deps: Deps,
}

fn fixture(model: ScriptedChatModel, executor: ScriptedSqlExecutor, config: WorkflowConfig) -> Fixture {
    let model = Arc::new(model);
    let executor = Arc::new(executor);
    let repo = Arc::new(InMemorySchemaRepository::new());
    let deps = Deps::new(model.clone(), repo.clone(), executor.clone(), config);
    Fixture { model,
              executor,
              repo,
              deps }
}

async fn start(repo: &InMemorySchemaRepository, input: &str) -> WorkflowState {
    let snapshot = repo.create_schema(Uuid::new_v4(), Schema::empty()).await.unwrap();
    WorkflowState::new(snapshot, input)
}

#[tokio::test]
async fn designs_validates_and_commits_users_table() {
    let f = fixture(ScriptedChatModel::new(vec![Ok(tool_reply(SCHEMA_DESIGN_TOOL, users_table()))]),
                    ScriptedSqlExecutor::accepting(),
                    config());
    let engine = WorkflowEngine::new(design_graph(&f.deps).unwrap()).with_config(&f.deps.config);
    let state = start(&f.repo, "users with an email").await;
    let session = state.session_id;

    let out = engine.run(state).await.unwrap();
    assert!(out.failure.is_none());
    assert_eq!(out.latest_version_number, 1);
    assert!(out.candidate.is_none());
    assert!(out.ddl.contains("\"id\" uuid DEFAULT gen_random_uuid() NOT NULL"));
    assert!(!out.ddl.contains("'gen_random_uuid()'"));

    let batches = f.executor.batches().await;
    assert_eq!(batches, vec![out.ddl.clone()]);

    let committed = f.repo.get_schema(session).await.unwrap();
    assert_eq!(committed.schema, out.schema);
    assert!(committed.schema.table("users").is_some());

    let kinds: Vec<TimelineKind> = f.repo
                                    .list_timeline_items(session)
                                    .await
                                    .unwrap()
                                    .iter()
                                    .map(|i| i.kind)
                                    .collect();
    assert_eq!(kinds,
               vec![TimelineKind::QueryResult, TimelineKind::SchemaVersion, TimelineKind::AssistantMessage]);
    assert_eq!(out.summary.as_deref(), Some("Schema is at version 1 with 1 table(s)."));
    assert!(matches!(out.messages.last(), Some(Message::Assistant { .. })));
}

#[tokio::test]
async fn failing_ddl_is_redesigned_once_then_finalized() {
    let f = fixture(ScriptedChatModel::from_fn(|_| Ok(tool_reply(SCHEMA_DESIGN_TOOL, users_table()))),
                    ScriptedSqlExecutor::failing_on("CREATE TABLE", "type \"uuid\" is broken"),
                    config());
    let engine = WorkflowEngine::new(design_graph(&f.deps).unwrap()).with_config(&f.deps.config);
    let state = start(&f.repo, "users").await;
    let session = state.session_id;
    let run_id = state.run_id;

    let out = engine.run(state).await.unwrap();
    let requests = f.model.requests().await;
    assert_eq!(requests.len(), 2, "one design plus exactly one redesign");
    assert!(!requests[0].prompt_text().contains("is broken"));
    assert!(requests[1].prompt_text().contains("Error: type \"uuid\" is broken"));

    assert_eq!(out.retry_count(DDL_EXECUTION_RETRY_KEY), 1);
    assert!(out.ddl_execution_failed);
    assert_eq!(out.latest_version_number, 0);
    assert!(out.summary.as_deref().unwrap().starts_with("The schema could not be validated"));
    assert_eq!(f.repo.list_versions(out.schema_id).await.unwrap().len(), 0);

    let timeline = f.repo.list_timeline_items(session).await.unwrap();
    assert_eq!(timeline.last().map(|i| i.kind), Some(TimelineKind::Error));

    let design_runs = engine.events(run_id)
                            .iter()
                            .filter(|e| matches!(&e.kind, FlowEventKind::NodeStarted { node, .. } if node == DESIGN_SCHEMA))
                            .count();
    assert_eq!(design_runs, 2);
}

#[tokio::test]
async fn rejected_patch_is_reported_back_and_repaired() {
    let f = fixture(ScriptedChatModel::new(vec![Ok(tool_reply(SCHEMA_DESIGN_TOOL,
                                                              json!({"operations": [{"op": "remove", "path": "/tables/ghost"}]}))),
                                                Ok(tool_reply(SCHEMA_DESIGN_TOOL, users_table()))]),
                    ScriptedSqlExecutor::accepting(),
                    config());
    let engine = WorkflowEngine::new(design_graph(&f.deps).unwrap()).with_config(&f.deps.config);
    let out = engine.run(start(&f.repo, "users").await).await.unwrap();

    let requests = f.model.requests().await;
    assert_eq!(requests.len(), 2);
    let feedback = requests[1].messages.last().unwrap();
    assert_eq!(feedback.role(), "tool");
    assert!(feedback.content().starts_with("Patch rejected"));
    assert_eq!(out.latest_version_number, 1);
    // solo las operaciones aceptadas llegan a la versión
    let versions = f.repo.list_versions(out.schema_id).await.unwrap();
    assert_eq!(versions[0].patch.len(), 1);
    assert!(matches!(&versions[0].patch[0], PatchOperation::Add { .. }));
}

#[tokio::test]
async fn exhausted_patch_repairs_route_to_finalize() {
    let config = WorkflowConfig { max_patch_repairs: 1,
                                  ..config() };
    let f = fixture(ScriptedChatModel::from_fn(|_| {
                        Ok(tool_reply(SCHEMA_DESIGN_TOOL,
                                      json!({"operations": [{"op": "add", "path": "/tables/__proto__", "value": {}}]})))
                    }),
                    ScriptedSqlExecutor::accepting(),
                    config);
    let engine = WorkflowEngine::new(design_graph(&f.deps).unwrap()).with_config(&f.deps.config);
    let out = engine.run(start(&f.repo, "users").await).await.unwrap();

    assert_eq!(f.model.requests().await.len(), 2);
    let failure = out.failure.expect("design failure recorded");
    assert_eq!(failure.node, DESIGN_SCHEMA);
    assert!(f.executor.batches().await.is_empty());
    assert!(out.summary.unwrap().contains(DESIGN_SCHEMA));
}

#[tokio::test]
async fn version_conflict_refetches_and_redesigns() {
    let posts = json!({"operations": [{"op": "add", "path": "/tables/posts",
                                       "value": {"columns": {"id": {"type": "bigint", "notNull": true}}}}]});
    let f = fixture(ScriptedChatModel::from_fn(move |_| Ok(tool_reply(SCHEMA_DESIGN_TOOL, posts.clone()))),
                    ScriptedSqlExecutor::accepting(),
                    config());
    let engine = WorkflowEngine::new(design_graph(&f.deps).unwrap()).with_config(&f.deps.config);
    let state = start(&f.repo, "posts").await;

    // otro escritor gana la carrera después de tomar el snapshot
    f.repo
     .create_version(CreateVersionParams { schema_id: state.schema_id,
                                           expected_latest_version_number: 0,
                                           patch: vec![PatchOperation::add("/tables/users",
                                                                           json!({"columns": {}}))] })
     .await
     .unwrap();

    let run_id = state.run_id;
    let out = engine.run(state).await.unwrap();
    assert!(out.failure.is_none());
    assert_eq!(out.retry_count(VERSION_CONFLICT_RETRY_KEY), 1);
    assert_eq!(out.latest_version_number, 2);
    assert_eq!(out.schema.tables.keys().collect::<Vec<_>>(), vec!["users", "posts"]);

    let commits = engine.events(run_id)
                        .iter()
                        .filter(|e| matches!(&e.kind, FlowEventKind::NodeStarted { node, .. } if node == COMMIT_VERSION))
                        .count();
    assert_eq!(commits, 2);
}

#[tokio::test]
async fn missing_extension_terminates_without_retry() {
    let config = WorkflowConfig { required_extensions: vec!["pgcrypto".into()],
                                  node_retry: RetryPolicy::immediate(3),
                                  ..WorkflowConfig::default() };
    let f = fixture(ScriptedChatModel::new(vec![Ok(tool_reply(SCHEMA_DESIGN_TOOL, users_table()))]),
                    ScriptedSqlExecutor::accepting().with_available_extensions(&[]),
                    config);
    let engine = WorkflowEngine::new(design_graph(&f.deps).unwrap()).with_config(&f.deps.config);
    let state = start(&f.repo, "users").await;
    let run_id = state.run_id;
    let out = engine.run(state).await.unwrap();

    let failure = out.failure.expect("termination recorded");
    assert_eq!(failure.node, EXECUTE_DDL);
    assert_eq!(out.latest_version_number, 0);
    let retries = engine.events(run_id)
                        .iter()
                        .filter(|e| matches!(e.kind, FlowEventKind::RetryScheduled { .. }))
                        .count();
    assert_eq!(retries, 0);
}
