//! In-memory hosts: a frame loop pumped by hand, a surface with no listeners
//! and a renderer that only records what it was asked to draw. Used for
//! offscreen runs and tests.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

use super::camera::Viewport;
use super::error::GraphError;
use super::interaction::Overlay;
use super::session::{CommandQueue, FrameScheduler, FrameView, SceneRenderer, SurfaceEvents};

#[derive(Default)]
struct PendingFrames {
	next: u64,
	callbacks: BTreeMap<u64, Box<dyn FnMut()>>,
	/// Callback currently out of the map because it is running.
	running: Option<u64>,
	/// Set when the running callback was cancelled from inside itself.
	cancelled_running: bool,
}

/// Scheduler whose callbacks run only when `pump` is called. Siblings share
/// one host, so `pending` counts callbacks across every session on it.
#[derive(Default)]
pub struct ManualFrameLoop {
	host: Rc<RefCell<PendingFrames>>,
	id: Option<u64>,
}

impl ManualFrameLoop {
	pub fn new() -> Self {
		Self::default()
	}

	/// A fresh scheduler on the same host.
	pub fn sibling(&self) -> Self {
		Self {
			host: Rc::clone(&self.host),
			id: None,
		}
	}

	/// Callbacks currently registered on the host.
	pub fn pending(&self) -> usize {
		self.host.borrow().callbacks.len()
	}

	/// Run every registered callback `frames` times. A callback may cancel or
	/// restart its own scheduler while it runs.
	pub fn pump(&self, frames: usize) {
		for _ in 0..frames {
			let ids: Vec<u64> = self.host.borrow().callbacks.keys().copied().collect();
			for id in ids {
				let taken = self.host.borrow_mut().callbacks.remove(&id);
				let Some(mut tick) = taken else {
					continue;
				};
				self.host.borrow_mut().running = Some(id);
				tick();

				let mut host = self.host.borrow_mut();
				host.running = None;
				if !std::mem::take(&mut host.cancelled_running) {
					host.callbacks.insert(id, tick);
				}
			}
		}
	}
}

impl FrameScheduler for ManualFrameLoop {
	fn start(&mut self, tick: Box<dyn FnMut()>) -> Result<(), GraphError> {
		self.cancel();
		let mut host = self.host.borrow_mut();
		let id = host.next;
		host.next += 1;
		host.callbacks.insert(id, tick);
		self.id = Some(id);
		Ok(())
	}

	fn cancel(&mut self) {
		if let Some(id) = self.id.take() {
			let mut host = self.host.borrow_mut();
			if host.callbacks.remove(&id).is_none() && host.running == Some(id) {
				host.cancelled_running = true;
			}
		}
	}

	fn is_scheduled(&self) -> bool {
		self.id.is_some_and(|id| {
			let host = self.host.borrow();
			host.callbacks.contains_key(&id) || host.running == Some(id)
		})
	}
}

/// A surface of fixed size that never produces events on its own. Siblings
/// share the attachment count.
#[derive(Default)]
pub struct DetachedSurface {
	viewport: Viewport,
	commands: Option<CommandQueue>,
	attached: Rc<Cell<usize>>,
}

impl DetachedSurface {
	pub fn new(viewport: Viewport) -> Self {
		Self {
			viewport,
			..Self::default()
		}
	}

	pub fn sibling(&self) -> Self {
		Self {
			viewport: self.viewport,
			commands: None,
			attached: Rc::clone(&self.attached),
		}
	}

	pub fn is_attached(&self) -> bool {
		self.commands.is_some()
	}

	/// Listener sets attached across all siblings.
	pub fn attached_listeners(&self) -> usize {
		self.attached.get()
	}
}

impl SurfaceEvents for DetachedSurface {
	fn viewport(&self) -> Viewport {
		self.viewport
	}

	fn attach(&mut self, commands: CommandQueue) -> Result<(), GraphError> {
		if self.commands.replace(commands).is_none() {
			self.attached.set(self.attached.get() + 1);
		}
		Ok(())
	}

	fn detach(&mut self) {
		if self.commands.take().is_some() {
			self.attached.set(self.attached.get() - 1);
		}
	}
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct RenderLog {
	pub frames: usize,
	pub viewport: Option<Viewport>,
	pub overlay: Overlay,
	pub visible_edges: usize,
	pub released: bool,
}

/// Renderer that keeps a shared log instead of drawing.
pub struct RecordingRenderer {
	log: Rc<RefCell<RenderLog>>,
}

impl RecordingRenderer {
	pub fn new() -> (Self, Rc<RefCell<RenderLog>>) {
		let log = Rc::new(RefCell::new(RenderLog::default()));
		(Self { log: Rc::clone(&log) }, log)
	}
}

impl SceneRenderer for RecordingRenderer {
	fn resize(&mut self, viewport: Viewport) {
		self.log.borrow_mut().viewport = Some(viewport);
	}

	fn render(&mut self, frame: &FrameView<'_>) {
		let mut log = self.log.borrow_mut();
		log.frames += 1;
		log.visible_edges = frame.scene.edges.iter().filter(|e| e.visible).count();
		if log.overlay != *frame.overlay {
			log.overlay = frame.overlay.clone();
		}
	}

	fn release(&mut self) {
		self.log.borrow_mut().released = true;
	}
}
