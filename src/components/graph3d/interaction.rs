//! Hover/select state machine driven by explicit commands.

use super::camera::Viewport;
use super::loader::LoadedGraph;
use super::scene::{Emphasis, Rgb, Scene};
use super::types::NodeKind;

/// Input translated from surface events. The frame drains these in order.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Command {
	PointerMoved { x: f64, y: f64 },
	PointerClicked { x: f64, y: f64 },
	PointerLeft,
	Resized { width: f64, height: f64 },
	CloseDetails,
	Orbit { dx: f64, dy: f64 },
	Zoom { delta: f64 },
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct InteractionState {
	pub hovered: Option<String>,
	pub selected: Option<String>,
	/// Last pointer position on the surface, anchors the tooltip.
	pub pointer: Option<(f64, f64)>,
	pub viewport: Viewport,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Phase {
	Idle,
	Hovering(String),
	Selected(String),
	SelectedAndHovering { selected: String, hovered: String },
}

impl InteractionState {
	pub fn new(viewport: Viewport) -> Self {
		Self {
			viewport,
			..Self::default()
		}
	}

	pub fn phase(&self) -> Phase {
		match (&self.selected, &self.hovered) {
			(None, None) => Phase::Idle,
			(None, Some(h)) => Phase::Hovering(h.clone()),
			(Some(s), Some(h)) if s != h => Phase::SelectedAndHovering {
				selected: s.clone(),
				hovered: h.clone(),
			},
			(Some(s), _) => Phase::Selected(s.clone()),
		}
	}
}

/// Pure transition function. `pick` maps a surface point to the nearest node
/// id under it, if any.
pub fn reduce(
	state: InteractionState,
	command: &Command,
	pick: impl FnOnce(f64, f64) -> Option<String>,
) -> InteractionState {
	match *command {
		Command::PointerMoved { x, y } => InteractionState {
			hovered: pick(x, y),
			pointer: Some((x, y)),
			..state
		},
		Command::PointerClicked { x, y } => InteractionState {
			selected: pick(x, y),
			..state
		},
		Command::PointerLeft => InteractionState {
			hovered: None,
			pointer: None,
			..state
		},
		Command::Resized { width, height } => InteractionState {
			viewport: Viewport::new(width, height),
			..state
		},
		Command::CloseDetails => InteractionState { selected: None, ..state },
		Command::Orbit { .. } | Command::Zoom { .. } => state,
	}
}

/// Keep only the last pointer move of a drained batch, in its place. Every
/// other command keeps its order.
pub fn coalesce_pointer_moves(mut commands: Vec<Command>) -> Vec<Command> {
	let last_move = commands
		.iter()
		.rposition(|c| matches!(c, Command::PointerMoved { .. }));
	if let Some(last) = last_move {
		let mut index = 0;
		commands.retain(|c| {
			let keep = index == last || !matches!(c, Command::PointerMoved { .. });
			index += 1;
			keep
		});
	}
	commands
}

/// Recompute hover emphasis and edge opacity from the current state. Runs
/// every frame so a missed event never leaves stale highlighting behind.
pub fn apply_emphasis(scene: &mut Scene, state: &InteractionState) {
	let style = scene.style();
	let hovered_emphasis = Emphasis {
		scale: style.hover_scale,
		glow: style.hover_glow,
	};
	let (base, bright, dim) = (
		style.edge_opacity,
		style.edge_opacity_selected,
		style.edge_opacity_dimmed,
	);
	let hovered = state.hovered.as_deref().and_then(|id| scene.node_index(id));
	let selected = state.selected.as_deref().and_then(|id| scene.node_index(id));

	for (i, node) in scene.nodes.iter_mut().enumerate() {
		node.emphasis = if Some(i) == hovered {
			hovered_emphasis
		} else {
			Emphasis::default()
		};
	}

	for edge in &mut scene.edges {
		edge.opacity = match selected {
			Some(s) if edge.touches(s) => bright,
			Some(_) => dim,
			None => base,
		};
	}
}

#[derive(Clone, Debug, PartialEq)]
pub struct TooltipView {
	pub id: String,
	pub name: String,
	pub short_label: String,
	pub meaning: String,
	pub workflow: String,
	pub color: String,
	pub left: f64,
	pub top: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
	Outgoing,
	Incoming,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Connection {
	pub edge_id: String,
	pub source: String,
	pub target: String,
	pub direction: Direction,
	pub kind: String,
	pub naturality: String,
	pub shared_coordinate: String,
	pub meaning: String,
	pub color: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DetailPanel {
	pub id: String,
	pub name: String,
	pub short_label: String,
	pub meaning: String,
	pub workflow: String,
	pub kind: NodeKind,
	pub color: String,
	pub connections: Vec<Connection>,
}

/// What the host shows on top of the canvas.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Overlay {
	pub tooltip: Option<TooltipView>,
	pub details: Option<DetailPanel>,
}

impl Overlay {
	pub fn compose(graph: &LoadedGraph, scene: &Scene, state: &InteractionState) -> Self {
		let offset = scene.style().tooltip_offset;
		let tooltip = match (&state.hovered, state.pointer) {
			(Some(id), Some((x, y))) => graph.node(id).map(|node| TooltipView {
				id: node.id.clone(),
				name: node.name.clone(),
				short_label: node.short_label.clone(),
				meaning: node.meaning.clone(),
				workflow: node.workflow.clone(),
				color: node_css(scene, &node.id),
				left: x + offset,
				top: y + offset,
			}),
			_ => None,
		};

		let details = state.selected.as_deref().and_then(|id| {
			let node = graph.node(id)?;
			let connections = graph
				.edges
				.iter()
				.zip(&scene.edges)
				.filter(|(edge, _)| edge.touches(id))
				.map(|(edge, primitive)| Connection {
					edge_id: edge.id.clone(),
					source: edge.source.clone(),
					target: edge.target.clone(),
					direction: if edge.source == id {
						Direction::Outgoing
					} else {
						Direction::Incoming
					},
					kind: edge.kind.clone(),
					naturality: edge.naturality.clone(),
					shared_coordinate: edge.shared_coordinate.clone(),
					meaning: edge.meaning.clone(),
					color: primitive.color.css(1.0),
				})
				.collect();
			Some(DetailPanel {
				id: node.id.clone(),
				name: node.name.clone(),
				short_label: node.short_label.clone(),
				meaning: node.meaning.clone(),
				workflow: node.workflow.clone(),
				kind: node.kind,
				color: node_css(scene, id),
				connections,
			})
		});

		Self { tooltip, details }
	}
}

fn node_css(scene: &Scene, id: &str) -> String {
	scene.node(id).map(|n| n.color).unwrap_or(Rgb::WHITE).css(1.0)
}
