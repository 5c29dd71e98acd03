//! Renderable primitives and the per-frame synchronizer.
//!
//! Attribute ownership is split: `Scene::sync` writes position, pulse, spin and
//! edge endpoints; the interaction pass writes `emphasis` and edge `opacity`.
//! Both run in a fixed order inside one frame, never concurrently.

use std::collections::HashMap;
use std::f64::consts::{FRAC_PI_2, FRAC_PI_4, TAU};

use glam::DVec3;
use log::debug;
use serde::{Deserialize, Serialize};

use super::config::SceneStyle;
use super::loader::LoadedGraph;
use super::picking::{Hit, Ray, intersect_spheres};
use super::types::NodeKind;

const PULSE_RATE: f64 = 0.02;
const PULSE_PHASE_STEP: f64 = 0.6;
const SPIN_RATE: f64 = 0.004;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PrimitiveHandle(pub u32);

/// Solid drawn for a node. Styles map categories to shapes; unmapped
/// categories get a sphere.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeShape {
	Octahedron,
	Cube,
	Tetrahedron,
	Dodecahedron,
	Icosahedron,
	/// Octahedron subdivided once.
	GeodesicOctahedron,
	#[default]
	Sphere,
}

impl NodeShape {
	/// Size relative to a sphere of the same node radius.
	pub fn extent(self) -> f64 {
		match self {
			NodeShape::Cube => 1.28,
			NodeShape::Tetrahedron => 1.2,
			_ => 1.0,
		}
	}

	fn corners(self) -> Option<u32> {
		match self {
			NodeShape::Tetrahedron => Some(3),
			NodeShape::Octahedron | NodeShape::Cube => Some(4),
			NodeShape::Dodecahedron => Some(5),
			NodeShape::Icosahedron => Some(6),
			NodeShape::GeodesicOctahedron => Some(8),
			NodeShape::Sphere => None,
		}
	}

	/// Screen silhouette centred on `(x, y)` and turned by `spin`. `None`
	/// means the glyph is a circle.
	pub fn outline(self, x: f64, y: f64, radius: f64, spin: f64) -> Option<Vec<(f64, f64)>> {
		let corners = self.corners()?;
		// cubes sit flat, everything else stands on a corner
		let start = if self == NodeShape::Cube { FRAC_PI_4 } else { -FRAC_PI_2 };
		let points = (0..corners)
			.map(|k| {
				let angle = spin + start + TAU * k as f64 / corners as f64;
				(x + radius * angle.cos(), y + radius * angle.sin())
			})
			.collect();
		Some(points)
	}
}

/// Allocates and releases the backing resources of each primitive and answers
/// ray queries against node primitives.
pub trait ScenePrimitiveFactory {
	fn make_node(&mut self, kind: NodeKind, shape: NodeShape) -> PrimitiveHandle;
	fn make_line(&mut self) -> PrimitiveHandle;
	fn make_points(&mut self, count: usize) -> PrimitiveHandle;
	/// Releasing an unknown or already released handle is a no-op.
	fn release(&mut self, handle: PrimitiveHandle);
	fn live_resources(&self) -> usize;

	fn intersect(&self, ray: &Ray, primitives: &[NodePrimitive]) -> Option<Hit> {
		intersect_spheres(ray, primitives)
	}
}

/// Bookkeeping factory: every primitive holds a geometry and a material.
/// Nodes add a material for the wireframe shell, and ringed nodes one more
/// pair for the ring.
#[derive(Debug, Default)]
pub struct ResourceArena {
	next: u32,
	live: HashMap<PrimitiveHandle, usize>,
}

impl ResourceArena {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn live_primitives(&self) -> usize {
		self.live.len()
	}

	fn allocate(&mut self, resources: usize) -> PrimitiveHandle {
		let handle = PrimitiveHandle(self.next);
		self.next += 1;
		self.live.insert(handle, resources);
		handle
	}
}

impl ScenePrimitiveFactory for ResourceArena {
	fn make_node(&mut self, kind: NodeKind, _shape: NodeShape) -> PrimitiveHandle {
		match kind {
			NodeKind::Pure => self.allocate(5),
			NodeKind::Mixed => self.allocate(3),
		}
	}

	fn make_line(&mut self) -> PrimitiveHandle {
		self.allocate(2)
	}

	fn make_points(&mut self, _count: usize) -> PrimitiveHandle {
		self.allocate(2)
	}

	fn release(&mut self, handle: PrimitiveHandle) {
		self.live.remove(&handle);
	}

	fn live_resources(&self) -> usize {
		self.live.values().sum()
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rgb {
	pub r: u8,
	pub g: u8,
	pub b: u8,
}

impl Rgb {
	pub const WHITE: Rgb = Rgb { r: 255, g: 255, b: 255 };

	/// Parses `#rrggbb`.
	pub fn from_hex(hex: &str) -> Option<Self> {
		let digits = hex.strip_prefix('#')?;
		if digits.len() != 6 || !digits.is_ascii() {
			return None;
		}
		let channel = |i: usize| u8::from_str_radix(&digits[i..i + 2], 16).ok();
		Some(Self {
			r: channel(0)?,
			g: channel(2)?,
			b: channel(4)?,
		})
	}

	pub fn css(&self, alpha: f64) -> String {
		format!("rgba({}, {}, {}, {:.3})", self.r, self.g, self.b, alpha.clamp(0.0, 1.0))
	}
}

/// Hover emphasis, written only by the interaction pass.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Emphasis {
	pub scale: f64,
	pub glow: f64,
}

impl Default for Emphasis {
	fn default() -> Self {
		Self { scale: 1.0, glow: 0.0 }
	}
}

#[derive(Clone, Debug)]
pub struct NodePrimitive {
	pub handle: PrimitiveHandle,
	pub id: String,
	pub label: String,
	pub color: Rgb,
	/// Series colour, independent of any per-node colour override.
	pub label_color: Rgb,
	pub shape: NodeShape,
	pub radius: f64,
	/// Pure nodes carry an orbit ring.
	pub ring: bool,
	pub position: DVec3,
	pub pulse: f64,
	pub spin: f64,
	pub emphasis: Emphasis,
}

impl NodePrimitive {
	pub fn pick_radius(&self) -> f64 {
		self.radius * self.emphasis.scale
	}

	pub fn glow(&self, base: f64) -> f64 {
		base + self.pulse + self.emphasis.glow
	}
}

#[derive(Clone, Debug)]
pub struct EdgePrimitive {
	pub handle: PrimitiveHandle,
	/// Index into `LoadedGraph::edges`.
	pub edge: usize,
	pub source: usize,
	pub target: usize,
	pub color: Rgb,
	pub dashed: bool,
	pub endpoints: [DVec3; 2],
	/// False when an endpoint did not resolve this frame.
	pub visible: bool,
	pub opacity: f64,
}

impl EdgePrimitive {
	pub fn touches(&self, node: usize) -> bool {
		self.source == node || self.target == node
	}
}

/// Decorative background points, unrelated to graph data.
#[derive(Clone, Debug)]
pub struct ParticleField {
	pub handle: PrimitiveHandle,
	pub points: Vec<DVec3>,
	pub rotation: f64,
}

impl ParticleField {
	fn new(handle: PrimitiveHandle, count: usize, extent: f64) -> Self {
		let points = (0..count)
			.map(|i| {
				let axis = |k: usize| (rand_simple(i * 3 + k) - 0.5) * extent;
				DVec3::new(axis(0), axis(1), axis(2))
			})
			.collect();
		Self {
			handle,
			points,
			rotation: 0.0,
		}
	}

	/// Points after applying the current rotation about the vertical axis.
	pub fn rotated(&self) -> impl Iterator<Item = DVec3> + '_ {
		let (sin, cos) = self.rotation.sin_cos();
		self.points
			.iter()
			.map(move |p| DVec3::new(p.x * cos + p.z * sin, p.y, -p.x * sin + p.z * cos))
	}
}

pub struct Scene {
	pub nodes: Vec<NodePrimitive>,
	pub edges: Vec<EdgePrimitive>,
	pub particles: ParticleField,
	node_by_id: HashMap<String, usize>,
	style: SceneStyle,
	frame: u64,
	released: bool,
}

impl Scene {
	/// One node primitive per node (same order), one line per live edge.
	pub fn build(
		graph: &LoadedGraph,
		factory: &mut dyn ScenePrimitiveFactory,
		style: &SceneStyle,
	) -> Self {
		let nodes: Vec<NodePrimitive> = graph
			.nodes
			.iter()
			.zip(&graph.seeds)
			.map(|(node, seed)| {
				let shape = style.category_shapes.get(&node.category).copied().unwrap_or_default();
				NodePrimitive {
					handle: factory.make_node(node.kind, shape),
					id: node.id.clone(),
					label: node.id.clone(),
					color: node_color(node.color.as_deref(), &node.category, style),
					label_color: category_color(&node.category, style).unwrap_or(Rgb::WHITE),
					shape,
					radius: style.node_radius * node.kind.size_factor() * shape.extent(),
					ring: node.kind == NodeKind::Pure,
					position: *seed,
					pulse: 0.0,
					spin: 0.0,
					emphasis: Emphasis::default(),
				}
			})
			.collect();

		let edges = graph
			.edges
			.iter()
			.zip(&graph.links)
			.enumerate()
			.map(|(i, (edge, &(source, target)))| EdgePrimitive {
				handle: factory.make_line(),
				edge: i,
				source,
				target,
				color: style
					.naturality_colors
					.get(&edge.naturality)
					.and_then(|c| Rgb::from_hex(c))
					.or_else(|| Rgb::from_hex(&style.fallback_edge_color))
					.unwrap_or(Rgb::WHITE),
				dashed: edge.naturality == "structural",
				endpoints: [graph.seeds[source], graph.seeds[target]],
				visible: true,
				opacity: style.edge_opacity,
			})
			.collect();

		let particles = ParticleField::new(
			factory.make_points(style.particle_count),
			style.particle_count,
			style.particle_extent,
		);

		let node_by_id = nodes.iter().enumerate().map(|(i, n)| (n.id.clone(), i)).collect();

		debug!("built scene with {} live resources", factory.live_resources());

		Self {
			nodes,
			edges,
			particles,
			node_by_id,
			style: style.clone(),
			frame: 0,
			released: false,
		}
	}

	pub fn frame(&self) -> u64 {
		self.frame
	}

	pub fn style(&self) -> &SceneStyle {
		&self.style
	}

	pub fn node_index(&self, id: &str) -> Option<usize> {
		self.node_by_id.get(id).copied()
	}

	pub fn node(&self, id: &str) -> Option<&NodePrimitive> {
		self.node_index(id).map(|i| &self.nodes[i])
	}

	pub fn is_released(&self) -> bool {
		self.released
	}

	/// Mirror simulator positions onto the primitives and advance the
	/// cosmetic effects by one frame.
	pub fn sync(&mut self, positions: &[DVec3], selected: Option<&str>) {
		if self.released {
			return;
		}
		self.frame += 1;
		let frame = self.frame as f64;

		for (i, node) in self.nodes.iter_mut().enumerate() {
			if let Some(p) = positions.get(i) {
				node.position = *p;
			}
			if selected == Some(node.id.as_str()) {
				node.pulse = 0.0;
				continue;
			}
			let phase = frame * PULSE_RATE + i as f64 * PULSE_PHASE_STEP;
			node.pulse = self.style.pulse_amplitude * phase.sin();
			node.spin = (node.spin + SPIN_RATE) % TAU;
		}

		for edge in &mut self.edges {
			match (positions.get(edge.source), positions.get(edge.target)) {
				(Some(a), Some(b)) => {
					edge.endpoints = [*a, *b];
					edge.visible = true;
				}
				_ => edge.visible = false,
			}
		}

		self.particles.rotation = (self.particles.rotation + self.style.particle_spin) % TAU;
	}

	/// Return every handle to the factory. Safe to call repeatedly.
	pub fn release(&mut self, factory: &mut dyn ScenePrimitiveFactory) {
		if self.released {
			return;
		}
		for node in &self.nodes {
			factory.release(node.handle);
		}
		for edge in &self.edges {
			factory.release(edge.handle);
		}
		factory.release(self.particles.handle);
		self.released = true;
		debug!(
			"released scene ({} nodes, {} edges), {} resources still live",
			self.nodes.len(),
			self.edges.len(),
			factory.live_resources()
		);
	}
}

fn category_color(category: &str, style: &SceneStyle) -> Option<Rgb> {
	style.category_colors.get(category).and_then(|c| Rgb::from_hex(c))
}

fn node_color(explicit: Option<&str>, category: &str, style: &SceneStyle) -> Rgb {
	explicit
		.and_then(Rgb::from_hex)
		.or_else(|| category_color(category, style))
		.or_else(|| Rgb::from_hex(&style.fallback_node_color))
		.unwrap_or(Rgb::WHITE)
}

const RAND_MODULUS: u64 = 233_280;

/// Simple pseudo-random number generator (deterministic for consistency).
/// The seed is reduced first so the product stays in range on 32-bit targets.
fn rand_simple(seed: usize) -> f64 {
	let seed = seed as u64 % RAND_MODULUS;
	let x = ((seed + 1) * 9301 + 49297) % RAND_MODULUS;
	x as f64 / RAND_MODULUS as f64
}
