// SPDX-FileCopyrightText: 2026 Funil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Knowledge-base context provider trait (the RAG seam).

use async_trait::async_trait;

use crate::error::FunilError;

/// Adapter that retrieves knowledge-base context for a user query.
///
/// Retrieval itself is out of scope for the agent; the orchestrator only
/// needs a string of context to hand to the responder, and tolerates
/// failures with an empty context.
#[async_trait]
pub trait ContextProvider: Send + Sync {
    /// Builds a context block relevant to `query`, bounded by `top_k` chunks.
    async fn build_context(&self, query: &str, top_k: usize) -> Result<String, FunilError>;
}

/// A provider that always returns the same pre-baked context.
///
/// Used by deployments without a knowledge base and by tests.
#[derive(Debug, Clone, Default)]
pub struct StaticContextProvider {
    context: String,
}

impl StaticContextProvider {
    pub fn new(context: impl Into<String>) -> Self {
        Self {
            context: context.into(),
        }
    }
}

#[async_trait]
impl ContextProvider for StaticContextProvider {
    async fn build_context(&self, _query: &str, _top_k: usize) -> Result<String, FunilError> {
        Ok(self.context.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_provider_ignores_query() {
        let provider = StaticContextProvider::new("catalogo de cursos");
        let a = provider.build_context("mensalidade", 4).await.unwrap();
        let b = provider.build_context("qualquer coisa", 1).await.unwrap();
        assert_eq!(a, "catalogo de cursos");
        assert_eq!(a, b);
    }
}
