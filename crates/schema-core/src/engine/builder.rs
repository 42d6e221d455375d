//! Construcción y validación del grafo de nodos.
//!
//! `GraphBuilder` acumula nodos y aristas y valida en `build` que toda
//! referencia estática exista: destino de aristas directas, rama y reduce de
//! los fan-out, nodo de entrada y manejador de errores. Los destinos de
//! aristas condicionales y de `Transition::Goto` se resuelven en ejecución.
//!
//! ```ignore
//! let graph = GraphBuilder::new()
//!     .node(design).node(generate).node(finalize)
//!     .entry("designSchema")
//!     .edge("designSchema", "generateDdl")
//!     .conditional("generateDdl", |s| if s.ddl.is_empty() { Route::End } else { Route::to("finalize") })
//!     .end("finalize")
//!     .error_handler("finalize")
//!     .build()?;
//! ```

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use serde_json::json;

use crate::constants::ENGINE_VERSION;
use crate::errors::WorkflowError;
use crate::hashing::hash_value;
use crate::model::WorkflowState;
use crate::node::{BranchNode, Route, WorkflowNode};

pub type Router = Arc<dyn Fn(&WorkflowState) -> Route + Send + Sync>;

#[derive(Clone)]
pub enum Edge {
    Direct(String),
    Conditional(Router),
    FanOut { branch: String, reduce: String },
    End,
}

impl fmt::Debug for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

impl Edge {
    fn describe(&self) -> String {
        match self {
            Edge::Direct(to) => format!("-> {to}"),
            Edge::Conditional(_) => "-> ?".to_string(),
            Edge::FanOut { branch, reduce } => format!("=> [{branch}]* -> {reduce}"),
            Edge::End => "-> END".to_string(),
        }
    }
}

/// Grafo validado e inmutable.
pub struct Graph {
    nodes: HashMap<String, Arc<dyn WorkflowNode>>,
    branches: HashMap<String, Arc<dyn BranchNode>>,
    edges: HashMap<String, Edge>,
    entry: String,
    error_handler: Option<String>,
    hash: String,
}

impl Graph {
    pub fn node(&self, id: &str) -> Result<&Arc<dyn WorkflowNode>, WorkflowError> {
        self.nodes.get(id).ok_or_else(|| WorkflowError::UnknownNode(id.to_string()))
    }

    pub fn branch(&self, id: &str) -> Result<&Arc<dyn BranchNode>, WorkflowError> {
        self.branches.get(id).ok_or_else(|| WorkflowError::UnknownBranch(id.to_string()))
    }

    pub fn edge(&self, from: &str) -> Option<&Edge> {
        self.edges.get(from)
    }

    pub fn entry(&self) -> &str {
        &self.entry
    }

    pub fn error_handler(&self) -> Option<&str> {
        self.error_handler.as_deref()
    }

    /// Hash estable de la topología (ids y aristas, no comportamiento).
    pub fn hash(&self) -> &str {
        &self.hash
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }
}

#[derive(Default)]
pub struct GraphBuilder {
    nodes: Vec<Arc<dyn WorkflowNode>>,
    branches: Vec<Arc<dyn BranchNode>>,
    edges: Vec<(String, Edge)>,
    entry: Option<String>,
    error_handler: Option<String>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node<N: WorkflowNode + 'static>(self, node: N) -> Self {
        self.shared_node(Arc::new(node))
    }

    pub fn shared_node(mut self, node: Arc<dyn WorkflowNode>) -> Self {
        self.nodes.push(node);
        self
    }

    pub fn branch<B: BranchNode + 'static>(mut self, branch: B) -> Self {
        self.branches.push(Arc::new(branch));
        self
    }

    pub fn entry(mut self, id: &str) -> Self {
        self.entry = Some(id.to_string());
        self
    }

    /// Nodo al que se deriva cuando otro nodo falla tras sus reintentos.
    pub fn error_handler(mut self, id: &str) -> Self {
        self.error_handler = Some(id.to_string());
        self
    }

    pub fn edge(mut self, from: &str, to: &str) -> Self {
        self.edges.push((from.to_string(), Edge::Direct(to.to_string())));
        self
    }

    pub fn conditional<F>(mut self, from: &str, router: F) -> Self
        where F: Fn(&WorkflowState) -> Route + Send + Sync + 'static
    {
        self.edges.push((from.to_string(), Edge::Conditional(Arc::new(router))));
        self
    }

    pub fn fan_out(mut self, from: &str, branch: &str, reduce: &str) -> Self {
        self.edges.push((from.to_string(),
                         Edge::FanOut { branch: branch.to_string(),
                                        reduce: reduce.to_string() }));
        self
    }

    pub fn end(mut self, from: &str) -> Self {
        self.edges.push((from.to_string(), Edge::End));
        self
    }

    pub fn build(self) -> Result<Graph, WorkflowError> {
        let mut nodes = HashMap::new();
        for node in self.nodes {
            let id = node.id().to_string();
            if nodes.insert(id.clone(), node).is_some() {
                return Err(WorkflowError::Graph(format!("duplicate node '{id}'")));
            }
        }
        let mut branches = HashMap::new();
        for branch in self.branches {
            let id = branch.id().to_string();
            if branches.insert(id.clone(), branch).is_some() {
                return Err(WorkflowError::Graph(format!("duplicate branch node '{id}'")));
            }
        }

        let mut edges = HashMap::new();
        for (from, edge) in self.edges {
            if !nodes.contains_key(&from) {
                return Err(WorkflowError::Graph(format!("edge from unknown node '{from}'")));
            }
            match &edge {
                Edge::Direct(to) if !nodes.contains_key(to) => {
                    return Err(WorkflowError::Graph(format!("edge '{from}' -> unknown node '{to}'")));
                }
                Edge::FanOut { branch, reduce } => {
                    if !branches.contains_key(branch) {
                        return Err(WorkflowError::Graph(format!("fan-out from '{from}' to unknown branch '{branch}'")));
                    }
                    if !nodes.contains_key(reduce) {
                        return Err(WorkflowError::Graph(format!("fan-out from '{from}' reduces into unknown node '{reduce}'")));
                    }
                }
                _ => {}
            }
            if edges.insert(from.clone(), edge).is_some() {
                return Err(WorkflowError::Graph(format!("node '{from}' has more than one outgoing edge")));
            }
        }
        if let Some(missing) = nodes.keys().find(|id| !edges.contains_key(*id)) {
            return Err(WorkflowError::Graph(format!("node '{missing}' has no outgoing edge")));
        }

        let entry = self.entry.ok_or_else(|| WorkflowError::Graph("no entry node".into()))?;
        if !nodes.contains_key(&entry) {
            return Err(WorkflowError::Graph(format!("entry node '{entry}' is not registered")));
        }
        if let Some(handler) = &self.error_handler {
            if !nodes.contains_key(handler) {
                return Err(WorkflowError::Graph(format!("error handler '{handler}' is not registered")));
            }
        }

        let topology: BTreeMap<&String, String> = edges.iter().map(|(k, e)| (k, e.describe())).collect();
        let mut branch_ids: Vec<&String> = branches.keys().collect();
        branch_ids.sort();
        let hash = hash_value(&json!({
            "engine_version": ENGINE_VERSION,
            "entry": entry,
            "error_handler": self.error_handler,
            "edges": topology,
            "branches": branch_ids,
        }));

        Ok(Graph { nodes,
                   branches,
                   edges,
                   entry,
                   error_handler: self.error_handler,
                   hash })
    }
}
