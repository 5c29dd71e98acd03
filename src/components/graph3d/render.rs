use std::f64::consts::PI;

use leptos::prelude::*;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{CanvasGradient, CanvasRenderingContext2d, HtmlCanvasElement};

use super::camera::{Camera, Projected, Viewport};
use super::error::GraphError;
use super::interaction::{DetailPanel, Overlay, TooltipView};
use super::scene::{NodePrimitive, NodeShape, Scene};
use super::session::{FrameView, SceneRenderer};

const PARTICLE_ALPHA: f64 = 0.35;
const RING_SCALE: f64 = 1.7;
const LABEL_MIN_PIXELS: f64 = 3.0;
const SHELL_SCALE: f64 = 1.15;
const SHELL_ALPHA: f64 = 0.2;

/// Draws the projected scene on a 2D canvas and mirrors the overlay into
/// leptos signals.
pub struct CanvasRenderer {
	canvas: HtmlCanvasElement,
	ctx: CanvasRenderingContext2d,
	tooltip: RwSignal<Option<TooltipView>>,
	details: RwSignal<Option<DetailPanel>>,
	shown: Overlay,
	released: bool,
}

impl CanvasRenderer {
	pub fn new(
		canvas: &HtmlCanvasElement,
		tooltip: RwSignal<Option<TooltipView>>,
		details: RwSignal<Option<DetailPanel>>,
	) -> Result<Self, GraphError> {
		let ctx: CanvasRenderingContext2d = canvas
			.get_context("2d")
			.map_err(|e| GraphError::surface("getContext", e))?
			.ok_or_else(|| GraphError::Surface("2d context unavailable".into()))?
			.dyn_into()
			.map_err(|e| GraphError::surface("2d context", e.into()))?;
		Ok(Self {
			canvas: canvas.clone(),
			ctx,
			tooltip,
			details,
			shown: Overlay::default(),
			released: false,
		})
	}

	fn publish(&mut self, overlay: &Overlay) {
		if self.shown.tooltip != overlay.tooltip {
			self.tooltip.set(overlay.tooltip.clone());
		}
		if self.shown.details != overlay.details {
			self.details.set(overlay.details.clone());
		}
		self.shown = overlay.clone();
	}
}

impl SceneRenderer for CanvasRenderer {
	fn resize(&mut self, viewport: Viewport) {
		self.canvas.set_width(viewport.width as u32);
		self.canvas.set_height(viewport.height as u32);
	}

	fn render(&mut self, frame: &FrameView<'_>) {
		if self.released {
			return;
		}
		let ctx = &self.ctx;
		let style = frame.scene.style();
		ctx.set_fill_style_str(&style.background);
		ctx.fill_rect(0.0, 0.0, frame.viewport.width, frame.viewport.height);

		draw_particles(frame.scene, frame.camera, frame.viewport, ctx);
		draw_edges(frame.scene, frame.camera, frame.viewport, ctx);
		draw_nodes(frame.scene, frame.camera, frame.viewport, ctx);
		self.publish(frame.overlay);
	}

	fn release(&mut self) {
		if self.released {
			return;
		}
		self.released = true;
		let (width, height) = (self.canvas.width() as f64, self.canvas.height() as f64);
		self.ctx.clear_rect(0.0, 0.0, width, height);
		self.publish(&Overlay::default());
	}
}

fn draw_particles(
	scene: &Scene,
	camera: &Camera,
	viewport: Viewport,
	ctx: &CanvasRenderingContext2d,
) {
	ctx.set_fill_style_str(&format!("rgba(255, 255, 255, {PARTICLE_ALPHA})"));
	for point in scene.particles.rotated() {
		if let Some(p) = camera.project(point, viewport) {
			let size = (p.pixels_per_unit * 0.4).clamp(0.5, 2.0);
			ctx.fill_rect(p.x, p.y, size, size);
		}
	}
}

fn draw_edges(scene: &Scene, camera: &Camera, viewport: Viewport, ctx: &CanvasRenderingContext2d) {
	let dash = js_sys::Array::of2(&JsValue::from_f64(4.0), &JsValue::from_f64(3.0));
	let solid = js_sys::Array::new();

	for edge in scene.edges.iter().filter(|e| e.visible) {
		let [a, b] = edge.endpoints;
		let (Some(a), Some(b)) = (camera.project(a, viewport), camera.project(b, viewport))
		else {
			continue;
		};
		ctx.set_stroke_style_str(&edge.color.css(edge.opacity));
		ctx.set_line_width(1.0);
		let _ = ctx.set_line_dash(if edge.dashed { &dash } else { &solid });
		ctx.begin_path();
		ctx.move_to(a.x, a.y);
		ctx.line_to(b.x, b.y);
		ctx.stroke();
	}
	let _ = ctx.set_line_dash(&solid);
}

fn draw_nodes(scene: &Scene, camera: &Camera, viewport: Viewport, ctx: &CanvasRenderingContext2d) {
	let base_glow = scene.style().base_glow;
	let mut visible: Vec<(&NodePrimitive, Projected)> = scene
		.nodes
		.iter()
		.filter_map(|node| camera.project(node.position, viewport).map(|p| (node, p)))
		.collect();
	// painter's order, far first
	visible.sort_by(|a, b| b.1.depth.total_cmp(&a.1.depth));

	for (node, p) in visible {
		let radius = node.radius * node.emphasis.scale * p.pixels_per_unit;
		let glow = node.glow(base_glow).max(0.0);

		if let Ok(gradient) = glow_gradient(ctx, node, &p, radius, glow) {
			ctx.begin_path();
			let _ = ctx.arc(p.x, p.y, radius * (1.8 + glow), 0.0, 2.0 * PI);
			#[allow(deprecated)]
			ctx.set_fill_style(&gradient);
			ctx.fill();
		}

		trace_glyph(ctx, node.shape, p.x, p.y, radius, node.spin);
		ctx.set_fill_style_str(&node.color.css(0.85 + 0.15 * glow.min(1.0)));
		ctx.fill();

		trace_glyph(ctx, node.shape, p.x, p.y, radius * SHELL_SCALE, node.spin);
		ctx.set_stroke_style_str(&node.color.css(SHELL_ALPHA));
		ctx.set_line_width(1.0);
		ctx.stroke();

		if node.ring {
			let ring = radius * RING_SCALE;
			ctx.begin_path();
			let _ = ctx.ellipse(p.x, p.y, ring, ring * 0.35, node.spin, 0.0, 2.0 * PI);
			ctx.set_stroke_style_str(&node.color.css(0.6));
			ctx.set_line_width(1.0);
			ctx.stroke();
		}

		if radius >= LABEL_MIN_PIXELS {
			ctx.set_fill_style_str(&node.label_color.css(0.6 + 0.4 * node.emphasis.glow));
			ctx.set_font(&format!("{}px sans-serif", (radius * 1.2).clamp(9.0, 14.0)));
			let _ = ctx.fill_text(&node.label, p.x + radius + 3.0, p.y + 3.0);
		}
	}
}

/// Begin a path holding the node's silhouette.
fn trace_glyph(
	ctx: &CanvasRenderingContext2d,
	shape: NodeShape,
	x: f64,
	y: f64,
	radius: f64,
	spin: f64,
) {
	ctx.begin_path();
	match shape.outline(x, y, radius, spin) {
		Some(corners) => {
			for (i, &(cx, cy)) in corners.iter().enumerate() {
				if i == 0 {
					ctx.move_to(cx, cy);
				} else {
					ctx.line_to(cx, cy);
				}
			}
			ctx.close_path();
		}
		None => {
			let _ = ctx.arc(x, y, radius, 0.0, 2.0 * PI);
		}
	}
}

fn glow_gradient(
	ctx: &CanvasRenderingContext2d,
	node: &NodePrimitive,
	p: &Projected,
	radius: f64,
	glow: f64,
) -> Result<CanvasGradient, JsValue> {
	let outer = radius * (1.8 + glow);
	let gradient = ctx.create_radial_gradient(p.x, p.y, radius * 0.3, p.x, p.y, outer)?;
	gradient.add_color_stop(0.0, &node.color.css(0.45 * glow.min(1.5)))?;
	gradient.add_color_stop(0.6, &node.color.css(0.15 * glow.min(1.5)))?;
	gradient.add_color_stop(1.0, "rgba(0, 0, 0, 0)")?;
	Ok(gradient)
}
