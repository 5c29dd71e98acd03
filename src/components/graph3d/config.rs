//! Tunables for the graph view. Every field has a default so a partial JSON
//! document (or none at all) yields a working configuration.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::error::GraphError;
use super::scene::NodeShape;

pub const DEFAULT_GRAPH_URL: &str = "http://127.0.0.1:9696/api/graph/full";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
	pub graph_url: String,
	/// Multiplier applied to backend seed coordinates, which come in a compact
	/// unit-radius layout.
	pub seed_scale: f64,
	pub engine: LayoutEngine,
	pub simulation: SimulationParams,
	pub bridges: SeriesBridges,
	pub camera: CameraConfig,
	pub style: SceneStyle,
}

impl Default for ViewConfig {
	fn default() -> Self {
		Self {
			graph_url: DEFAULT_GRAPH_URL.into(),
			seed_scale: 8.0,
			engine: LayoutEngine::default(),
			simulation: SimulationParams::default(),
			bridges: SeriesBridges::default(),
			camera: CameraConfig::default(),
			style: SceneStyle::default(),
		}
	}
}

impl ViewConfig {
	pub fn from_json(text: &str) -> Result<Self, GraphError> {
		serde_json::from_str(text)
			.map_err(|e| GraphError::DataUnavailable(format!("invalid view config: {e}")))
	}
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutEngine {
	/// Full 3D link/repulsion/centering simulation.
	#[default]
	Volumetric,
	/// 2D `force_graph` physics; depth stays at the seed value.
	Planar,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationParams {
	pub link_distance: f64,
	pub link_strength: f64,
	/// Negative values repel.
	pub charge_strength: f64,
	pub charge_distance_min: f64,
	pub charge_distance_max: Option<f64>,
	pub center_strength: f64,
	pub alpha_start: f64,
	pub alpha_decay: f64,
	pub alpha_target: f64,
	pub velocity_decay: f64,
	/// Below this alpha a step only cools; forces are skipped.
	pub settle_threshold: Option<f64>,
	pub warmup_ticks: u32,
}

impl Default for SimulationParams {
	fn default() -> Self {
		Self {
			link_distance: 40.0,
			link_strength: 0.3,
			charge_strength: -80.0,
			charge_distance_min: 1.0,
			charge_distance_max: None,
			center_strength: 0.05,
			alpha_start: 0.8,
			alpha_decay: 0.02,
			alpha_target: 0.0,
			velocity_decay: 0.4,
			settle_threshold: None,
			warmup_ticks: 0,
		}
	}
}

/// Layout-only springs between members of one series that sit in different
/// components: ordinals up to `split` pair with every ordinal above it.
/// They never show up as edges.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeriesBridges {
	pub enabled: bool,
	pub series: Vec<String>,
	pub split: u32,
	/// Multiplier on `link_strength`.
	pub weight: f64,
}

impl Default for SeriesBridges {
	fn default() -> Self {
		Self {
			enabled: true,
			series: ["O", "S", "H", "P", "K", "A"].map(String::from).to_vec(),
			split: 2,
			weight: 0.25,
		}
	}
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
	pub fov_degrees: f64,
	pub near: f64,
	pub far: f64,
	pub position: [f64; 3],
	pub min_distance: f64,
	pub max_distance: f64,
	pub rotate_speed: f64,
	pub auto_orbit: bool,
	/// Radians per frame.
	pub auto_orbit_speed: f64,
	/// Frames without user camera input before auto-orbit resumes.
	pub auto_orbit_resume_frames: u64,
}

impl Default for CameraConfig {
	fn default() -> Self {
		Self {
			fov_degrees: 55.0,
			near: 1.0,
			far: 1500.0,
			position: [55.0, 40.0, 75.0],
			min_distance: 20.0,
			max_distance: 250.0,
			rotate_speed: 0.005,
			auto_orbit: true,
			auto_orbit_speed: 0.0006,
			auto_orbit_resume_frames: 180,
		}
	}
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneStyle {
	pub background: String,
	pub node_radius: f64,
	pub base_glow: f64,
	pub pulse_amplitude: f64,
	pub hover_scale: f64,
	pub hover_glow: f64,
	pub edge_opacity: f64,
	pub edge_opacity_selected: f64,
	pub edge_opacity_dimmed: f64,
	pub particle_count: usize,
	pub particle_extent: f64,
	pub particle_spin: f64,
	pub tooltip_offset: f64,
	pub category_colors: BTreeMap<String, String>,
	pub category_shapes: BTreeMap<String, NodeShape>,
	pub naturality_colors: BTreeMap<String, String>,
	pub fallback_node_color: String,
	pub fallback_edge_color: String,
}

impl Default for SceneStyle {
	fn default() -> Self {
		let category_colors = [
			("O", "#00d4ff"),
			("S", "#10b981"),
			("H", "#ef4444"),
			("P", "#a855f7"),
			("K", "#f59e0b"),
			("A", "#f97316"),
		];
		let category_shapes = [
			("O", NodeShape::Octahedron),
			("S", NodeShape::Cube),
			("H", NodeShape::Tetrahedron),
			("P", NodeShape::Dodecahedron),
			("K", NodeShape::Icosahedron),
			("A", NodeShape::GeodesicOctahedron),
		];
		let naturality_colors = [
			("experiential", "#00d4ff"),
			("reflective", "#ffd700"),
			("structural", "#8888aa"),
		];
		Self {
			background: "#050508".into(),
			node_radius: 2.5,
			base_glow: 0.5,
			pulse_amplitude: 0.1,
			hover_scale: 1.3,
			hover_glow: 0.5,
			edge_opacity: 0.25,
			edge_opacity_selected: 0.8,
			edge_opacity_dimmed: 0.08,
			particle_count: 400,
			particle_extent: 400.0,
			particle_spin: 0.0001,
			tooltip_offset: 15.0,
			category_colors: owned_pairs(&category_colors),
			category_shapes: category_shapes.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
			naturality_colors: owned_pairs(&naturality_colors),
			fallback_node_color: "#ffffff".into(),
			fallback_edge_color: "#333333".into(),
		}
	}
}

fn owned_pairs(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
	pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}
