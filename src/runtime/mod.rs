//! Application lifecycle: assemble a node from configuration, serve it, stop it.

pub mod server;
pub mod shutdown;
pub mod startup;

pub use server::run_server;
pub use startup::{Node, default_metrics, prepare_node, prepare_node_with};
