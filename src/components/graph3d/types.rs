//! Wire types for the `/api/graph/full` payload.

use glam::DVec3;
use serde::{Deserialize, Serialize};

use super::error::GraphError;

/// Relation kind used only for bookkeeping self-references.
pub const IDENTITY_KIND: &str = "identity";

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
	pub x: f64,
	pub y: f64,
	pub z: f64,
}

impl From<Position> for DVec3 {
	fn from(p: Position) -> Self {
		DVec3::new(p.x, p.y, p.z)
	}
}

/// Controls the visual size of a node.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeKind {
	Pure,
	#[default]
	#[serde(other)]
	Mixed,
}

impl NodeKind {
	pub fn size_factor(self) -> f64 {
		match self {
			NodeKind::Pure => 1.0,
			NodeKind::Mixed => 0.72,
		}
	}
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
	pub id: String,
	#[serde(default)]
	pub name: String,
	#[serde(default, alias = "greek")]
	pub short_label: String,
	#[serde(default, alias = "series")]
	pub category: String,
	#[serde(default, rename = "type", alias = "kind")]
	pub kind: NodeKind,
	#[serde(default)]
	pub color: Option<String>,
	#[serde(default)]
	pub meaning: String,
	#[serde(default)]
	pub workflow: String,
	#[serde(default)]
	pub position: Option<Position>,
}

impl GraphNode {
	pub fn new(id: impl Into<String>) -> Self {
		Self {
			id: id.into(),
			name: String::new(),
			short_label: String::new(),
			category: String::new(),
			kind: NodeKind::default(),
			color: None,
			meaning: String::new(),
			workflow: String::new(),
			position: None,
		}
	}

	pub fn at(mut self, x: f64, y: f64, z: f64) -> Self {
		self.position = Some(Position { x, y, z });
		self
	}
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
	#[serde(default)]
	pub id: String,
	pub source: String,
	pub target: String,
	#[serde(default, rename = "type", alias = "kind")]
	pub kind: String,
	#[serde(default)]
	pub pair: String,
	#[serde(default)]
	pub naturality: String,
	#[serde(default)]
	pub shared_coordinate: String,
	#[serde(default)]
	pub meaning: String,
}

impl GraphEdge {
	pub fn new(
		source: impl Into<String>,
		target: impl Into<String>,
		kind: impl Into<String>,
	) -> Self {
		let (source, target) = (source.into(), target.into());
		Self {
			id: format!("{source}->{target}"),
			source,
			target,
			kind: kind.into(),
			pair: String::new(),
			naturality: String::new(),
			shared_coordinate: String::new(),
			meaning: String::new(),
		}
	}

	pub fn is_identity(&self) -> bool {
		self.kind == IDENTITY_KIND
	}

	pub fn touches(&self, id: &str) -> bool {
		self.source == id || self.target == id
	}
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphPayload {
	pub nodes: Vec<GraphNode>,
	pub edges: Vec<GraphEdge>,
	#[serde(default)]
	pub meta: serde_json::Value,
}

impl GraphPayload {
	/// A payload that does not parse is reported as unavailable data.
	pub fn from_json(text: &str) -> Result<Self, GraphError> {
		serde_json::from_str(text)
			.map_err(|e| GraphError::DataUnavailable(format!("malformed payload: {e}")))
	}
}
