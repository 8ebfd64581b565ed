pub mod runtime;
pub mod state;
pub mod nodes;
pub mod react;

pub use runtime::{EdgeCondition, Node, NodeOutput, StateGraph};
pub use state::AgentState;
pub use react::ReactAgent;
