// src/export/dot.rs

//! Graphviz rendering of a [`GraphView`].

use std::collections::HashMap;

use petgraph::dot::{Config, Dot};
use petgraph::graph::{DiGraph, NodeIndex};

use crate::export::view::GraphView;
use crate::types::Status;

#[derive(Debug)]
struct DotNode {
    label: String,
    shape: &'static str,
    color: &'static str,
}

fn shape_for(kind: &str) -> &'static str {
    match kind {
        "command" => "component",
        "manual" => "note",
        "set" => "polygon",
        _ => "box",
    }
}

fn color_for(status: Status) -> &'static str {
    match status {
        Status::Succeeded => "green",
        Status::Failed => "red",
        Status::Blocked => "orange",
        Status::Running => "yellow",
        Status::Pending | Status::Ready => "gray",
    }
}

/// Render the view as a DOT digraph with `start` and `end` markers.
///
/// `start` points at every action without dependencies and every action
/// nothing depends on points at `end`.
pub fn render_dot(view: &GraphView) -> String {
    let mut graph: DiGraph<DotNode, ()> = DiGraph::new();
    let mut index: HashMap<&str, NodeIndex> = HashMap::new();

    let start = graph.add_node(DotNode {
        label: "start".to_string(),
        shape: "circle",
        color: "gray",
    });
    let end = graph.add_node(DotNode {
        label: "end".to_string(),
        shape: "octagon",
        color: "gray",
    });

    for node in &view.nodes {
        let idx = graph.add_node(DotNode {
            label: node.id.clone(),
            shape: shape_for(node.kind),
            color: color_for(node.status),
        });
        index.insert(node.id.as_str(), idx);
    }

    for edge in &view.edges {
        if let (Some(&from), Some(&to)) = (index.get(edge.from.as_str()), index.get(edge.to.as_str())) {
            graph.add_edge(from, to, ());
        }
    }

    for node in &view.nodes {
        let idx = index[node.id.as_str()];
        if !view.edges.iter().any(|e| e.to == node.id) {
            graph.add_edge(start, idx, ());
        }
        if !view.edges.iter().any(|e| e.from == node.id) {
            graph.add_edge(idx, end, ());
        }
    }

    // Labels come from the attribute getter, so the weights are never printed.
    let dot = Dot::with_attr_getters(
        &graph,
        &[Config::NodeNoLabel, Config::EdgeNoLabel],
        &|_, _| String::new(),
        &|_, (_, node)| {
            format!(
                "label = \"{}\" shape = {} style = filled fillcolor = {}",
                node.label.replace('"', "\\\""),
                node.shape,
                node.color
            )
        },
    );
    format!("{dot:?}")
}
