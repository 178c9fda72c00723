// src/export/mod.rs

//! Graph export: the plan as nodes and edges with statuses, and renderers
//! for it. Works on any plan and state, whether a run is active or not.

pub mod dot;
pub mod view;

pub use dot::render_dot;
pub use view::{GraphEdge, GraphNode, GraphView};
