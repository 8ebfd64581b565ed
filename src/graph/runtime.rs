// petgraph-backed state graph: nodes mutate AgentState, edges pick the next node.

use async_trait::async_trait;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::HashMap;

use super::state::AgentState;
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeOutput {
    /// Follow the default edge, or jump to the named node.
    Continue(Option<String>),
    /// Follow the edge labelled with this condition.
    Branch(String),
    /// Stop; the state is the result.
    Final,
}

#[async_trait]
pub trait Node: Send + Sync {
    fn id(&self) -> &'static str;

    async fn execute(&self, state: &mut AgentState) -> Result<NodeOutput>;
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EdgeCondition {
    Always,
    OnCondition(String),
}

impl EdgeCondition {
    pub fn on(condition: impl Into<String>) -> Self {
        Self::OnCondition(condition.into())
    }
}

pub struct StateGraph {
    graph: DiGraph<Box<dyn Node>, EdgeCondition>,
    node_indices: HashMap<String, NodeIndex>,
    entry_node_id: String,
    max_steps: usize,
}

impl StateGraph {
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            node_indices: HashMap::new(),
            entry_node_id: String::new(),
            max_steps: 25,
        }
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn with_entry(mut self, node_id: impl Into<String>) -> Self {
        self.entry_node_id = node_id.into();
        self
    }

    pub fn add_node(&mut self, node: Box<dyn Node>) -> NodeIndex {
        let id = node.id().to_string();
        let index = self.graph.add_node(node);
        self.node_indices.insert(id, index);
        index
    }

    pub fn add_edge(&mut self, from: &str, to: &str) -> Result<()> {
        self.add_conditional_edge(from, to, EdgeCondition::Always)
    }

    pub fn add_conditional_edge(
        &mut self,
        from: &str,
        to: &str,
        condition: EdgeCondition,
    ) -> Result<()> {
        let from_idx = self.index_of(from)?;
        let to_idx = self.index_of(to)?;
        self.graph.add_edge(from_idx, to_idx, condition);
        Ok(())
    }

    pub async fn run(&self, state: &mut AgentState) -> Result<()> {
        if self.entry_node_id.is_empty() {
            return Err(Error::graph("runtime", "No entry node set"));
        }
        let mut current = self.index_of(&self.entry_node_id)?;

        loop {
            if state.steps >= self.max_steps {
                return Err(Error::RecursionLimit(self.max_steps));
            }

            let node = &self.graph[current];
            let node_id = node.id();
            tracing::debug!(node = node_id, step = state.steps, "Executing node");

            let output = node.execute(state).await.map_err(|e| {
                tracing::error!(node = node_id, error = %e, "Node failed");
                e
            })?;
            state.steps += 1;

            current = match output {
                NodeOutput::Final => {
                    tracing::debug!(node = node_id, steps = state.steps, "Graph execution complete");
                    return Ok(());
                }
                NodeOutput::Continue(Some(next)) => self.index_of(&next)?,
                NodeOutput::Continue(None) => self.resolve_next(current, None)?,
                NodeOutput::Branch(condition) => self.resolve_next(current, Some(&condition))?,
            };
        }
    }

    fn index_of(&self, node_id: &str) -> Result<NodeIndex> {
        self.node_indices
            .get(node_id)
            .copied()
            .ok_or_else(|| Error::graph(node_id, "node not found"))
    }

    fn resolve_next(&self, current: NodeIndex, condition: Option<&str>) -> Result<NodeIndex> {
        let current_id = self.graph[current].id();
        let mut fallback = None;

        for edge in self.graph.edges_directed(current, Direction::Outgoing) {
            match (edge.weight(), condition) {
                (EdgeCondition::OnCondition(expected), Some(actual)) if expected == actual => {
                    return Ok(edge.target());
                }
                (EdgeCondition::Always, _) => fallback = Some(edge.target()),
                _ => {}
            }
        }

        if let (Some(target), Some(cond)) = (fallback, condition) {
            tracing::warn!(
                node = current_id,
                condition = cond,
                "Condition not matched, using default edge"
            );
            return Ok(target);
        }

        fallback.ok_or_else(|| {
            Error::graph(
                current_id,
                format!("no outgoing edge for condition {:?}", condition.unwrap_or("(none)")),
            )
        })
    }
}

impl Default for StateGraph {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChatMessage;

    /// Appends its id and branches on how many messages exist.
    struct Echo {
        id: &'static str,
        output: fn(&AgentState) -> NodeOutput,
    }

    #[async_trait]
    impl Node for Echo {
        fn id(&self) -> &'static str {
            self.id
        }

        async fn execute(&self, state: &mut AgentState) -> Result<NodeOutput> {
            state.messages.push(ChatMessage::assistant(self.id));
            Ok((self.output)(state))
        }
    }

    fn visited(state: &AgentState) -> Vec<String> {
        state.messages.iter().skip(1).map(|m| m.content.clone()).collect()
    }

    #[tokio::test]
    async fn test_conditional_loop_until_final() {
        let mut graph = StateGraph::new().with_entry("a");
        graph.add_node(Box::new(Echo {
            id: "a",
            output: |s| {
                if s.messages.len() < 5 {
                    NodeOutput::Branch("again".to_string())
                } else {
                    NodeOutput::Final
                }
            },
        }));
        graph.add_node(Box::new(Echo {
            id: "b",
            output: |_| NodeOutput::Continue(None),
        }));
        graph.add_conditional_edge("a", "b", EdgeCondition::on("again")).unwrap();
        graph.add_edge("b", "a").unwrap();

        let mut state = AgentState::new("start");
        graph.run(&mut state).await.unwrap();

        assert_eq!(visited(&state), vec!["a", "b", "a", "b", "a"]);
        assert_eq!(state.steps, 5);
    }

    #[tokio::test]
    async fn test_recursion_limit() {
        let mut graph = StateGraph::new().with_entry("a").with_max_steps(4);
        graph.add_node(Box::new(Echo {
            id: "a",
            output: |_| NodeOutput::Continue(Some("a".to_string())),
        }));

        let mut state = AgentState::new("start");
        let err = graph.run(&mut state).await.unwrap_err();

        assert!(matches!(err, Error::RecursionLimit(4)));
        assert_eq!(state.steps, 4);
    }

    #[tokio::test]
    async fn test_unmatched_branch_without_default_edge() {
        let mut graph = StateGraph::new().with_entry("a");
        graph.add_node(Box::new(Echo {
            id: "a",
            output: |_| NodeOutput::Branch("nowhere".to_string()),
        }));

        let err = graph.run(&mut AgentState::new("x")).await.unwrap_err();
        assert!(matches!(err, Error::Graph { ref node, .. } if node == "a"));
    }

    #[test]
    fn test_edges_require_known_nodes() {
        let mut graph = StateGraph::new();
        assert!(graph.add_edge("a", "b").is_err());
    }
}
