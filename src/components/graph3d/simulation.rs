//! Force-directed layout in three dimensions.
//!
//! Every step cools `alpha` geometrically and scales the link and repulsion
//! forces by it, so later steps become negligible without the simulation ever
//! reporting that it has finished.

use glam::DVec3;
use log::debug;

use super::config::SimulationParams;

/// The contract the frame loop drives. Implementations must tolerate being
/// stepped at irregular intervals and must never panic.
pub trait ForceSimulator {
	/// Advance every node by one discrete increment. No-op once stopped.
	fn step(&mut self);
	/// Halt the simulator. Idempotent.
	fn stop(&mut self);
	fn is_stopped(&self) -> bool;
	fn alpha(&self) -> f64;
	/// Current positions, indexed like the loaded node list.
	fn positions(&self) -> &[DVec3];
}

/// One spring between two node indices. `weight` scales `link_strength`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LayoutLink {
	pub source: usize,
	pub target: usize,
	pub weight: f64,
}

impl LayoutLink {
	pub fn new(source: usize, target: usize) -> Self {
		Self::weighted(source, target, 1.0)
	}

	pub fn weighted(source: usize, target: usize, weight: f64) -> Self {
		Self { source, target, weight }
	}
}

pub struct LayoutSimulation {
	params: SimulationParams,
	positions: Vec<DVec3>,
	velocities: Vec<DVec3>,
	links: Vec<LayoutLink>,
	bias: Vec<f64>,
	alpha: f64,
	ticks: u64,
	stopped: bool,
}

impl LayoutSimulation {
	pub fn new(seeds: Vec<DVec3>, links: &[LayoutLink], params: SimulationParams) -> Self {
		let n = seeds.len();
		let links: Vec<LayoutLink> = links
			.iter()
			.copied()
			.filter(|l| l.source < n && l.target < n && l.source != l.target)
			.collect();

		let mut degree = vec![0usize; n];
		for link in &links {
			degree[link.source] += 1;
			degree[link.target] += 1;
		}
		let bias = links
			.iter()
			.map(|l| degree[l.source] as f64 / (degree[l.source] + degree[l.target]) as f64)
			.collect();

		let mut sim = Self {
			alpha: params.alpha_start,
			params,
			velocities: vec![DVec3::ZERO; n],
			positions: seeds,
			links,
			bias,
			ticks: 0,
			stopped: false,
		};
		for _ in 0..sim.params.warmup_ticks {
			sim.step();
		}
		if sim.params.warmup_ticks > 0 {
			debug!(
				"pre-stabilised layout with {} ticks, alpha {:.4}",
				sim.params.warmup_ticks, sim.alpha
			);
		}
		sim
	}

	pub fn ticks(&self) -> u64 {
		self.ticks
	}

	fn apply_links(&mut self) {
		let SimulationParams {
			link_distance,
			link_strength,
			..
		} = self.params;
		for (i, link) in self.links.iter().enumerate() {
			let (s, t) = (link.source, link.target);
			let mut delta =
				(self.positions[t] + self.velocities[t]) - (self.positions[s] + self.velocities[s]);
			if delta.length_squared() == 0.0 {
				delta = jiggle(i);
			}
			let length = delta.length();
			let strength = link_strength * link.weight;
			let pull = delta * ((length - link_distance) / length * self.alpha * strength);
			let b = self.bias[i];
			self.velocities[t] -= pull * b;
			self.velocities[s] += pull * (1.0 - b);
		}
	}

	fn apply_charge(&mut self) {
		let strength = self.params.charge_strength * self.alpha;
		let min_sq = self.params.charge_distance_min * self.params.charge_distance_min;
		let max_sq = self.params.charge_distance_max.map(|d| d * d);
		let n = self.positions.len();

		for i in 0..n {
			for j in (i + 1)..n {
				let mut delta = self.positions[j] - self.positions[i];
				if delta.length_squared() == 0.0 {
					delta = jiggle(i * n + j);
				}
				let distance_sq = delta.length_squared();
				if max_sq.is_some_and(|max| distance_sq >= max) {
					continue;
				}
				// strength < 0 pushes i away from j
				let force = delta.normalize() * (strength / distance_sq.max(min_sq));
				self.velocities[i] += force;
				self.velocities[j] -= force;
			}
		}
	}

	fn integrate(&mut self) {
		let keep = 1.0 - self.params.velocity_decay;
		for (position, velocity) in self.positions.iter_mut().zip(self.velocities.iter_mut()) {
			*velocity *= keep;
			*position += *velocity;
		}
	}

	fn recenter(&mut self) {
		if self.positions.is_empty() {
			return;
		}
		let centroid =
			self.positions.iter().copied().sum::<DVec3>() / self.positions.len() as f64;
		let shift = centroid * self.params.center_strength;
		for position in &mut self.positions {
			*position -= shift;
		}
	}
}

impl ForceSimulator for LayoutSimulation {
	fn step(&mut self) {
		if self.stopped {
			return;
		}
		self.ticks += 1;
		self.alpha += (self.params.alpha_target - self.alpha) * self.params.alpha_decay;

		if self.params.settle_threshold.is_some_and(|t| self.alpha < t) {
			return;
		}

		self.apply_links();
		self.apply_charge();
		self.integrate();
		self.recenter();
	}

	fn stop(&mut self) {
		if !self.stopped {
			debug!("layout simulation stopped after {} ticks", self.ticks);
		}
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

/// Tiny deterministic offset used to separate coincident points.
fn jiggle(seed: usize) -> DVec3 {
	let angle = seed as f64 * 2.399_963;
	let lift = (seed as f64 * 0.618_034).fract() - 0.5;
	DVec3::new(angle.cos(), angle.sin(), lift) * 1e-6
}
