use force_graph::{EdgeData, ForceGraph, NodeData, SimulationParameters};
use glam::DVec3;

use super::config::SimulationParams;
use super::simulation::{ForceSimulator, LayoutLink};

const FRAME_DT: f32 = 0.016;
/// `node_speed` at `alpha_start`; it shrinks with alpha after that.
const HOT_NODE_SPEED: f64 = 30_000.0;
const FORCE_MAX: f32 = 100.0;

/// Flat layout backed by `force_graph`. Depth keeps its seed value.
///
/// `force_graph` springs have zero rest length, so the link distance is
/// reached through node mass: two linked nodes balance where
/// `k·d/2 = |c|·m²/d²`, which puts `m = sqrt(k·L³ / 2|c|)`.
pub struct PlanarSimulation {
	graph: ForceGraph<usize, ()>,
	positions: Vec<DVec3>,
	params: SimulationParams,
	alpha: f64,
	stopped: bool,
}

impl PlanarSimulation {
	/// Only full-weight links become springs; `force_graph` edges carry no
	/// strength of their own.
	pub fn new(seeds: Vec<DVec3>, links: &[LayoutLink], params: SimulationParams) -> Self {
		let charge = params.charge_strength.abs().max(f64::EPSILON);
		let mass = (params.link_strength * params.link_distance.powi(3) / (2.0 * charge)).sqrt();
		let mut graph = ForceGraph::new(SimulationParameters {
			force_charge: charge as f32,
			force_spring: params.link_strength as f32,
			force_max: FORCE_MAX,
			node_speed: HOT_NODE_SPEED as f32,
			damping_factor: (1.0 - params.velocity_decay) as f32,
		});

		let indices: Vec<_> = seeds
			.iter()
			.enumerate()
			.map(|(i, seed)| {
				graph.add_node(NodeData {
					x: seed.x as f32,
					y: seed.y as f32,
					mass: mass as f32,
					is_anchor: false,
					user_data: i,
				})
			})
			.collect();

		for link in links.iter().filter(|l| l.weight >= 1.0 && l.source != l.target) {
			if let (Some(&src), Some(&tgt)) = (indices.get(link.source), indices.get(link.target)) {
				graph.add_edge(src, tgt, EdgeData::default());
			}
		}

		Self {
			graph,
			positions: seeds,
			alpha: params.alpha_start,
			params,
			stopped: false,
		}
	}

	fn node_speed(&self) -> f32 {
		if self.params.alpha_start <= 0.0 {
			return 0.0;
		}
		(HOT_NODE_SPEED * self.alpha / self.params.alpha_start) as f32
	}

	fn recenter(&mut self) {
		let (mut sum_x, mut sum_y, mut count) = (0.0f64, 0.0f64, 0usize);
		self.graph.visit_nodes(|node| {
			sum_x += node.x() as f64;
			sum_y += node.y() as f64;
			count += 1;
		});
		if count == 0 {
			return;
		}
		let strength = self.params.center_strength;
		let shift_x = (sum_x / count as f64 * strength) as f32;
		let shift_y = (sum_y / count as f64 * strength) as f32;
		self.graph.visit_nodes_mut(|node| {
			node.data.x -= shift_x;
			node.data.y -= shift_y;
		});
	}
}

impl ForceSimulator for PlanarSimulation {
	fn step(&mut self) {
		if self.stopped {
			return;
		}
		self.alpha += (self.params.alpha_target - self.alpha) * self.params.alpha_decay;
		if self.params.settle_threshold.is_some_and(|t| self.alpha < t) {
			return;
		}

		self.graph.parameters.node_speed = self.node_speed();
		self.graph.update(FRAME_DT);
		self.recenter();

		let positions = &mut self.positions;
		self.graph.visit_nodes(|node| {
			if let Some(p) = positions.get_mut(node.data.user_data) {
				p.x = node.x() as f64;
				p.y = node.y() as f64;
			}
		});
	}

	fn stop(&mut self) {
		self.stopped = true;
	}

	fn is_stopped(&self) -> bool {
		self.stopped
	}

	fn alpha(&self) -> f64 {
		self.alpha
	}

	fn positions(&self) -> &[DVec3] {
		&self.positions
	}
}
