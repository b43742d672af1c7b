//! Graph view of a snapshot: one node per group, one undirected edge
//! per neighbor pair.

use crate::{risk::RiskBand, snapshot::Snapshot};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

pub const EDGE_COLOR: &str = "#cbd5e1";
pub const EDGE_SIZE: u32 = 2;

pub fn band_color(band: RiskBand) -> &'static str {
    match band {
        RiskBand::Healthy => "#10B981",
        RiskBand::Medium => "#F59E0B",
        RiskBand::Toxic => "#EF4444",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphTopology {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub key: String,
    pub attributes: NodeAttributes,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeAttributes {
    pub label: String,
    pub x: i64,
    pub y: i64,
    pub size: u32,
    pub color: String,
    pub risk_badge: String,
    pub location_city: String,
    pub location_village: String,
    pub trust_score: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub key: String,
    pub source: String,
    pub target: String,
    pub attributes: EdgeAttributes,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeAttributes {
    pub size: u32,
    pub color: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub label: String,
}

/// `edge_<lo>_<hi>`, so A->B and B->A share a key.
pub fn edge_key(a: &str, b: &str) -> String {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    format!("edge_{lo}_{hi}")
}

/// Nodes in group order. Edges to unknown ids are dropped; when both
/// directions exist the later one's attributes win, keeping the first
/// one's position.
pub fn graph_topology(snapshot: &Snapshot) -> GraphTopology {
    let mut nodes = Vec::with_capacity(snapshot.groups.len());
    let mut edges: IndexMap<String, Edge> = IndexMap::new();

    for (id, group) in &snapshot.groups {
        nodes.push(Node {
            key: id.clone(),
            attributes: NodeAttributes {
                label: group.header.name.clone(),
                x: group.x,
                y: group.y,
                size: group.size,
                color: band_color(group.risk).to_string(),
                risk_badge: group.header.risk_badge.clone(),
                location_city: group.header.location_city.clone(),
                location_village: group.header.location_village.clone(),
                trust_score: group.header.trust_score,
            },
        });

        for neighbor in &group.overview.neighbors {
            if !snapshot.groups.contains_key(&neighbor.id) {
                log::debug!("topology: {id} lists unknown neighbor {}", neighbor.id);
                continue;
            }
            let key = edge_key(id, &neighbor.id);
            edges.insert(
                key.clone(),
                Edge {
                    key,
                    source: id.clone(),
                    target: neighbor.id.clone(),
                    attributes: EdgeAttributes {
                        size: EDGE_SIZE,
                        color: EDGE_COLOR.to_string(),
                        kind: "line".to_string(),
                        label: neighbor.relation.label().to_string(),
                    },
                },
            );
        }
    }

    GraphTopology {
        nodes,
        edges: edges.into_values().collect(),
    }
}
