//! Fetches the graph payload and turns it into a simulation-ready node/edge
//! set: duplicate nodes, identity edges and dangling edges are dropped, and
//! every node gets a seed position.

use std::collections::HashMap;
use std::f64::consts::PI;

use glam::DVec3;
use log::{debug, info, warn};

use super::config::{SeriesBridges, ViewConfig};
use super::error::{GraphError, ResolutionGap};
use super::simulation::LayoutLink;
use super::types::{GraphEdge, GraphNode, GraphPayload};

const UNSEEDED_RADIUS: f64 = 10.0;

/// The external graph-data collaborator. One request, one response.
#[allow(async_fn_in_trait)]
pub trait GraphSource {
	async fn fetch(&self) -> Result<GraphPayload, GraphError>;
}

/// Serves a payload already in memory.
#[derive(Clone, Debug, Default)]
pub struct StaticGraphSource {
	payload: GraphPayload,
}

impl StaticGraphSource {
	pub fn new(payload: GraphPayload) -> Self {
		Self { payload }
	}

	pub fn from_json(text: &str) -> Result<Self, GraphError> {
		GraphPayload::from_json(text).map(Self::new)
	}
}

impl GraphSource for StaticGraphSource {
	async fn fetch(&self) -> Result<GraphPayload, GraphError> {
		Ok(self.payload.clone())
	}
}

/// GETs the payload from the graph backend.
#[derive(Clone, Debug)]
pub struct HttpGraphSource {
	url: String,
}

impl HttpGraphSource {
	pub fn new(url: impl Into<String>) -> Self {
		Self { url: url.into() }
	}
}

#[cfg(target_arch = "wasm32")]
impl GraphSource for HttpGraphSource {
	async fn fetch(&self) -> Result<GraphPayload, GraphError> {
		use gloo_net::http::Request;

		let resp = Request::get(&self.url)
			.send()
			.await
			.map_err(|e| GraphError::DataUnavailable(format!("network error: {e}")))?;

		if !resp.ok() {
			return Err(GraphError::DataUnavailable(format!(
				"HTTP {}: {}",
				resp.status(),
				resp.status_text()
			)));
		}

		resp.json::<GraphPayload>()
			.await
			.map_err(|e| GraphError::DataUnavailable(format!("malformed payload: {e}")))
	}
}

#[cfg(not(target_arch = "wasm32"))]
impl GraphSource for HttpGraphSource {
	async fn fetch(&self) -> Result<GraphPayload, GraphError> {
		Err(GraphError::DataUnavailable(format!(
			"{}: HTTP transport is only available in the browser",
			self.url
		)))
	}
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct LoadReport {
	pub identity_dropped: usize,
	pub duplicate_nodes: Vec<String>,
	pub unresolved: Vec<ResolutionGap>,
}

/// Live node/edge set of one view activation.
#[derive(Clone, Debug, Default)]
pub struct LoadedGraph {
	pub nodes: Vec<GraphNode>,
	pub edges: Vec<GraphEdge>,
	/// `(source index, target index)` for each entry of `edges`.
	pub links: Vec<(usize, usize)>,
	/// Layout-only series bridges. Not part of `edges`.
	pub bridges: Vec<LayoutLink>,
	/// Initial simulation position for each entry of `nodes`.
	pub seeds: Vec<DVec3>,
	pub report: LoadReport,
	index_by_id: HashMap<String, usize>,
}

impl LoadedGraph {
	pub fn from_payload(payload: GraphPayload, seed_scale: f64) -> Self {
		let mut report = LoadReport::default();
		let mut nodes = Vec::with_capacity(payload.nodes.len());
		let mut index_by_id = HashMap::with_capacity(payload.nodes.len());

		for node in payload.nodes {
			if index_by_id.contains_key(&node.id) {
				warn!("dropping duplicate node id {}", node.id);
				report.duplicate_nodes.push(node.id);
				continue;
			}
			index_by_id.insert(node.id.clone(), nodes.len());
			nodes.push(node);
		}

		let mut edges = Vec::with_capacity(payload.edges.len());
		let mut links = Vec::with_capacity(payload.edges.len());
		for edge in payload.edges {
			if edge.is_identity() {
				report.identity_dropped += 1;
				continue;
			}
			let source = index_by_id.get(&edge.source).copied();
			let target = index_by_id.get(&edge.target).copied();
			match (source, target) {
				(Some(s), Some(t)) => {
					links.push((s, t));
					edges.push(edge);
				}
				_ => {
					let missing = if source.is_none() { &edge.source } else { &edge.target };
					warn!("dropping edge {}: node {} is not in the graph", edge.id, missing);
					report.unresolved.push(ResolutionGap {
						edge_id: edge.id.clone(),
						missing: missing.clone(),
					});
				}
			}
		}

		let seeds = nodes
			.iter()
			.enumerate()
			.map(|(i, node)| match node.position {
				Some(p) => DVec3::from(p) * seed_scale,
				None => spiral_seed(i),
			})
			.collect();

		debug!(
			"prepared graph: {} nodes, {} edges ({} identity, {} unresolved dropped)",
			nodes.len(),
			edges.len(),
			report.identity_dropped,
			report.unresolved.len()
		);

		Self {
			nodes,
			edges,
			links,
			bridges: Vec::new(),
			seeds,
			report,
			index_by_id,
		}
	}

	/// Replace `bridges` with weak links joining the low and high ordinals of
	/// each configured series. A node's ordinal is the last character of its
	/// id; ids that do not end in a digit take no part.
	pub fn bridge_series(&mut self, config: &SeriesBridges) {
		self.bridges.clear();
		if !config.enabled {
			return;
		}
		for series in &config.series {
			let members: Vec<(usize, u32)> = self
				.nodes
				.iter()
				.enumerate()
				.filter(|(_, node)| &node.category == series)
				.filter_map(|(i, node)| ordinal(&node.id).map(|o| (i, o)))
				.collect();
			for &(low, _) in members.iter().filter(|(_, o)| *o <= config.split) {
				for &(high, _) in members.iter().filter(|(_, o)| *o > config.split) {
					self.bridges.push(LayoutLink::weighted(low, high, config.weight));
				}
			}
		}
		if !self.bridges.is_empty() {
			debug!("added {} series bridges", self.bridges.len());
		}
	}

	/// Everything the simulator should pull on: one full-weight link per
	/// live edge, then the bridges.
	pub fn layout_links(&self) -> Vec<LayoutLink> {
		self.links
			.iter()
			.map(|&(s, t)| LayoutLink::new(s, t))
			.chain(self.bridges.iter().copied())
			.collect()
	}

	pub fn index_of(&self, id: &str) -> Option<usize> {
		self.index_by_id.get(id).copied()
	}

	pub fn node(&self, id: &str) -> Option<&GraphNode> {
		self.index_of(id).map(|i| &self.nodes[i])
	}
}

/// Fetch once and prepare. No retries; the caller decides whether to
/// re-activate the view.
pub async fn load<S: GraphSource>(
	source: &S,
	config: &ViewConfig,
) -> Result<LoadedGraph, GraphError> {
	let payload = source.fetch().await?;
	let mut graph = LoadedGraph::from_payload(payload, config.seed_scale);
	graph.bridge_series(&config.bridges);
	info!(
		"loaded graph with {} nodes and {} edges",
		graph.nodes.len(),
		graph.edges.len()
	);
	Ok(graph)
}

fn ordinal(id: &str) -> Option<u32> {
	id.chars().last().and_then(|c| c.to_digit(10))
}

/// Deterministic spiral placement for nodes the backend did not position.
fn spiral_seed(i: usize) -> DVec3 {
	let roll_step = PI * (3.0 - 5f64.sqrt());
	let yaw_step = PI * 20.0 / (9.0 + 221f64.sqrt());
	let radius = UNSEEDED_RADIUS * (0.5 + i as f64).cbrt();
	let (roll, yaw) = (i as f64 * roll_step, i as f64 * yaw_step);
	DVec3::new(
		radius * roll.cos() * yaw.cos(),
		radius * roll.sin() * yaw.cos(),
		radius * yaw.sin(),
	)
}
