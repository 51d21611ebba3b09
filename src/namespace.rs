//! Logical space name to external namespace translation.

use crate::config::Settings;

/// The graph store's default personal space, never prefixed
pub const PERSONAL_SPACE: &str = "myspace";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceTranslator {
    collab_prefix: String,
    graph_prefix: String,
}

impl NamespaceTranslator {
    pub fn new(collab_prefix: impl Into<String>, graph_prefix: impl Into<String>) -> Self {
        Self {
            collab_prefix: collab_prefix.into(),
            graph_prefix: graph_prefix.into(),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings.collab.prefix.clone(),
            settings.knowledge_graph.prefix.clone(),
        )
    }

    pub fn for_collab_namespace(&self, logical_name: &str) -> String {
        format!("{}{}", self.collab_prefix, logical_name)
    }

    pub fn for_graph_namespace(&self, logical_name: &str) -> String {
        if logical_name == PERSONAL_SPACE {
            logical_name.to_string()
        } else {
            format!(
                "{}{}",
                self.graph_prefix,
                self.for_collab_namespace(logical_name)
            )
        }
    }

    /// True for graph-store space names this gateway manages
    pub fn is_managed_graph_space(&self, graph_name: &str) -> bool {
        graph_name == PERSONAL_SPACE
            || graph_name.starts_with(&format!("{}{}", self.graph_prefix, self.collab_prefix))
    }
}
