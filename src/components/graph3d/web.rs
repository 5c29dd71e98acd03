//! Browser hosts: requestAnimationFrame scheduling and canvas/window
//! listeners feeding the command queue.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use leptos::prelude::*;
use log::{debug, error};
use wasm_bindgen::prelude::*;
use web_sys::{Event, EventTarget, HtmlCanvasElement, MouseEvent, WheelEvent, Window};

use super::camera::Viewport;
use super::error::GraphError;
use super::interaction::{Command, DetailPanel, TooltipView};
use super::render::CanvasRenderer;
use super::scene::ResourceArena;
use super::session::{CommandQueue, FrameScheduler, HostBindings, SurfaceEvents};

/// Pointer travel, in pixels, beyond which a press counts as a drag and the
/// following click is swallowed.
const DRAG_CLICK_TOLERANCE: f64 = 4.0;

fn window() -> Result<Window, GraphError> {
	web_sys::window().ok_or_else(|| GraphError::Surface("no window".into()))
}

pub struct AnimationFrameLoop {
	window: Window,
	callback: Rc<RefCell<Option<Closure<dyn FnMut()>>>>,
	handle: Rc<Cell<Option<i32>>>,
}

impl AnimationFrameLoop {
	pub fn new() -> Result<Self, GraphError> {
		Ok(Self {
			window: window()?,
			callback: Rc::new(RefCell::new(None)),
			handle: Rc::new(Cell::new(None)),
		})
	}
}

impl FrameScheduler for AnimationFrameLoop {
	fn start(&mut self, mut tick: Box<dyn FnMut()>) -> Result<(), GraphError> {
		self.cancel();

		let (window, handle) = (self.window.clone(), Rc::clone(&self.handle));
		let registered = Rc::downgrade(&self.callback);
		*self.callback.borrow_mut() = Some(Closure::new(move || {
			handle.set(None);
			tick();
			// cancel() drops the closure, which ends the chain here
			let Some(registered) = registered.upgrade() else {
				return;
			};
			if let Some(ref cb) = *registered.borrow() {
				match window.request_animation_frame(cb.as_ref().unchecked_ref()) {
					Ok(id) => handle.set(Some(id)),
					Err(err) => error!("requestAnimationFrame failed: {err:?}"),
				}
			}
		}));

		let id = match *self.callback.borrow() {
			Some(ref cb) => self
				.window
				.request_animation_frame(cb.as_ref().unchecked_ref())
				.map_err(|e| GraphError::surface("requestAnimationFrame", e))?,
			None => return Err(GraphError::Surface("frame callback missing".into())),
		};
		self.handle.set(Some(id));
		Ok(())
	}

	fn cancel(&mut self) {
		if let Some(id) = self.handle.take() {
			if let Err(err) = self.window.cancel_animation_frame(id) {
				error!("cancelAnimationFrame failed: {err:?}");
			}
		}
		self.callback.borrow_mut().take();
	}

	fn is_scheduled(&self) -> bool {
		self.handle.get().is_some()
	}
}

impl Drop for AnimationFrameLoop {
	fn drop(&mut self) {
		self.cancel();
	}
}

struct Listener {
	target: EventTarget,
	kind: &'static str,
	callback: Closure<dyn FnMut(Event)>,
}

/// Mouse listeners on the canvas plus `resize` on the window.
pub struct CanvasEvents {
	canvas: HtmlCanvasElement,
	window: Window,
	listeners: Vec<Listener>,
}

impl CanvasEvents {
	pub fn new(canvas: HtmlCanvasElement) -> Result<Self, GraphError> {
		Ok(Self {
			canvas,
			window: window()?,
			listeners: Vec::new(),
		})
	}

	fn listen(
		&mut self,
		target: EventTarget,
		kind: &'static str,
		callback: Closure<dyn FnMut(Event)>,
	) -> Result<(), GraphError> {
		target
			.add_event_listener_with_callback(kind, callback.as_ref().unchecked_ref())
			.map_err(|e| GraphError::surface(kind, e))?;
		self.listeners.push(Listener { target, kind, callback });
		Ok(())
	}

	fn attach_all(&mut self, commands: CommandQueue) -> Result<(), GraphError> {
		let canvas = self.canvas.clone();
		let pressed: Rc<Cell<Option<(f64, f64)>>> = Rc::new(Cell::new(None));
		let travel = Rc::new(Cell::new(0.0f64));

		let on_mousedown = {
			let (canvas, pressed, travel) = (canvas.clone(), pressed.clone(), travel.clone());
			Closure::<dyn FnMut(Event)>::new(move |ev: Event| {
				if let Some(ev) = ev.dyn_ref::<MouseEvent>() {
					pressed.set(Some(surface_point(&canvas, ev)));
					travel.set(0.0);
				}
			})
		};

		let on_mousemove = {
			let (canvas, pressed, travel, commands) =
				(canvas.clone(), pressed.clone(), travel.clone(), commands.clone());
			Closure::<dyn FnMut(Event)>::new(move |ev: Event| {
				let Some(ev) = ev.dyn_ref::<MouseEvent>() else {
					return;
				};
				let (x, y) = surface_point(&canvas, ev);
				if let Some((px, py)) = pressed.get() {
					let (dx, dy) = (x - px, y - py);
					travel.set(travel.get() + dx.hypot(dy));
					pressed.set(Some((x, y)));
					commands.push(Command::Orbit { dx, dy });
				}
				commands.push(Command::PointerMoved { x, y });
			})
		};

		let on_mouseup = {
			let pressed = pressed.clone();
			Closure::<dyn FnMut(Event)>::new(move |_: Event| pressed.set(None))
		};

		let on_click = {
			let (canvas, travel, commands) = (canvas.clone(), travel.clone(), commands.clone());
			Closure::<dyn FnMut(Event)>::new(move |ev: Event| {
				let Some(ev) = ev.dyn_ref::<MouseEvent>() else {
					return;
				};
				if travel.replace(0.0) > DRAG_CLICK_TOLERANCE {
					return;
				}
				let (x, y) = surface_point(&canvas, ev);
				commands.push(Command::PointerClicked { x, y });
			})
		};

		let on_mouseleave = {
			let (pressed, commands) = (pressed.clone(), commands.clone());
			Closure::<dyn FnMut(Event)>::new(move |_: Event| {
				pressed.set(None);
				commands.push(Command::PointerLeft);
			})
		};

		let on_wheel = {
			let commands = commands.clone();
			Closure::<dyn FnMut(Event)>::new(move |ev: Event| {
				if let Some(ev) = ev.dyn_ref::<WheelEvent>() {
					ev.prevent_default();
					commands.push(Command::Zoom { delta: ev.delta_y() });
				}
			})
		};

		let on_resize = {
			let canvas = canvas.clone();
			Closure::<dyn FnMut(Event)>::new(move |_: Event| {
				let Viewport { width, height } = fit_to_parent(&canvas);
				commands.push(Command::Resized { width, height });
			})
		};

		let target: EventTarget = canvas.into();
		self.listen(target.clone(), "mousedown", on_mousedown)?;
		self.listen(target.clone(), "mousemove", on_mousemove)?;
		self.listen(target.clone(), "mouseup", on_mouseup)?;
		self.listen(target.clone(), "click", on_click)?;
		self.listen(target.clone(), "mouseleave", on_mouseleave)?;
		self.listen(target, "wheel", on_wheel)?;
		self.listen(self.window.clone().into(), "resize", on_resize)?;
		Ok(())
	}
}

impl SurfaceEvents for CanvasEvents {
	fn viewport(&self) -> Viewport {
		fit_to_parent(&self.canvas)
	}

	fn attach(&mut self, commands: CommandQueue) -> Result<(), GraphError> {
		self.detach();
		let result = self.attach_all(commands);
		if result.is_err() {
			self.detach();
		} else {
			debug!("attached {} listeners", self.listeners.len());
		}
		result
	}

	fn detach(&mut self) {
		for listener in self.listeners.drain(..) {
			let Listener {
				target,
				kind,
				callback,
			} = listener;
			let removed =
				target.remove_event_listener_with_callback(kind, callback.as_ref().unchecked_ref());
			if let Err(err) = removed {
				error!("failed to remove {kind} listener: {err:?}");
			}
		}
	}
}

impl Drop for CanvasEvents {
	fn drop(&mut self) {
		self.detach();
	}
}

fn surface_point(canvas: &HtmlCanvasElement, ev: &MouseEvent) -> (f64, f64) {
	let rect = canvas.get_bounding_client_rect();
	(ev.client_x() as f64 - rect.left(), ev.client_y() as f64 - rect.top())
}

/// Size the canvas backing store to its container and return the result.
fn fit_to_parent(canvas: &HtmlCanvasElement) -> Viewport {
	let (width, height) = canvas
		.parent_element()
		.map(|p| (p.client_width() as f64, p.client_height() as f64))
		.filter(|(w, h)| *w > 0.0 && *h > 0.0)
		.unwrap_or((800.0, 600.0));
	canvas.set_width(width as u32);
	canvas.set_height(height as u32);
	Viewport::new(width, height)
}

/// Browser bindings for one activation on `canvas`.
pub fn canvas_bindings(
	canvas: &HtmlCanvasElement,
	tooltip: RwSignal<Option<TooltipView>>,
	details: RwSignal<Option<DetailPanel>>,
	commands: CommandQueue,
) -> Result<HostBindings<AnimationFrameLoop, CanvasEvents, CanvasRenderer>, GraphError> {
	Ok(HostBindings {
		scheduler: AnimationFrameLoop::new()?,
		events: CanvasEvents::new(canvas.clone())?,
		renderer: CanvasRenderer::new(canvas, tooltip, details)?,
		factory: ResourceArena::new(),
		commands,
	})
}
