//! Requerimientos analizados a partir del texto del usuario.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequirementKind {
    Functional,
    NonFunctional,
}

impl RequirementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequirementKind::Functional => "functional",
            RequirementKind::NonFunctional => "non_functional",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequirementItem {
    #[serde(rename = "type")]
    pub kind: RequirementKind,
    pub category: String,
    pub requirement: String,
}

/// Resultado del análisis: objetivo de negocio y requerimientos concretos.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AnalyzedRequirements {
    pub goal: String,
    #[serde(default)]
    pub requirements: Vec<RequirementItem>,
}

impl RequirementItem {
    pub fn functional(category: impl Into<String>, requirement: impl Into<String>) -> Self {
        Self { kind: RequirementKind::Functional,
               category: category.into(),
               requirement: requirement.into() }
    }

    pub fn non_functional(category: impl Into<String>, requirement: impl Into<String>) -> Self {
        Self { kind: RequirementKind::NonFunctional,
               category: category.into(),
               requirement: requirement.into() }
    }
}

impl AnalyzedRequirements {
    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }

    /// Texto plano para incluir en prompts.
    pub fn render(&self) -> String {
        let mut out = format!("Goal: {}\n", self.goal);
        for item in &self.requirements {
            out.push_str(&format!("- [{}/{}] {}\n", item.kind.as_str(), item.category, item.requirement));
        }
        out
    }
}
