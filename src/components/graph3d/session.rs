//! Acquire/release boundary for one activation of the graph view.
//!
//! `SceneSession::activate` loads the graph and only then builds the
//! simulator, primitives, listeners and frame loop; `deactivate` tears all of
//! it down. Each session owns its own resources, so several can coexist and a
//! re-activation never shares state with the previous generation.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::{Rc, Weak};
use std::sync::{Arc, Mutex, PoisonError};

use log::{debug, info, warn};

use super::camera::{Camera, Viewport};
use super::config::{LayoutEngine, ViewConfig};
use super::error::GraphError;
use super::interaction::{
	Command, InteractionState, Overlay, apply_emphasis, coalesce_pointer_moves, reduce,
};
use super::loader::{GraphSource, LoadedGraph, load};
use super::planar::PlanarSimulation;
use super::scene::{ResourceArena, Scene, ScenePrimitiveFactory};
use super::simulation::{ForceSimulator, LayoutSimulation};

type SharedCore = Rc<RefCell<SceneCore>>;

/// Drives the per-frame callback. At most one callback is pending per
/// scheduler.
pub trait FrameScheduler {
	fn start(&mut self, tick: Box<dyn FnMut()>) -> Result<(), GraphError>;
	/// Idempotent. No tick runs after this returns.
	fn cancel(&mut self);
	fn is_scheduled(&self) -> bool;
}

/// Pointer and resize listeners of the render surface.
pub trait SurfaceEvents {
	fn viewport(&self) -> Viewport;
	fn attach(&mut self, commands: CommandQueue) -> Result<(), GraphError>;
	/// Idempotent.
	fn detach(&mut self);
}

pub trait SceneRenderer {
	fn resize(&mut self, viewport: Viewport);
	fn render(&mut self, frame: &FrameView<'_>);
	/// Idempotent.
	fn release(&mut self);
}

/// Everything a renderer needs for one frame.
pub struct FrameView<'a> {
	pub scene: &'a Scene,
	pub camera: &'a Camera,
	pub viewport: Viewport,
	pub overlay: &'a Overlay,
}

/// Commands from listeners, drained once per frame.
#[derive(Clone, Default)]
pub struct CommandQueue(Arc<Mutex<VecDeque<Command>>>);

impl CommandQueue {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn push(&self, command: Command) {
		self.0.lock().unwrap_or_else(PoisonError::into_inner).push_back(command);
	}

	pub fn drain(&self) -> Vec<Command> {
		self.0.lock().unwrap_or_else(PoisonError::into_inner).drain(..).collect()
	}

	pub fn clear(&self) {
		self.0.lock().unwrap_or_else(PoisonError::into_inner).clear();
	}
}

/// Host-side collaborators handed to a session.
pub struct HostBindings<S, E, R, F = ResourceArena> {
	pub scheduler: S,
	pub events: E,
	pub renderer: R,
	/// Owns the primitives' backing resources for the session's lifetime.
	pub factory: F,
	pub commands: CommandQueue,
}

/// The composed core: simulation, primitives, camera and interaction state.
pub struct SceneCore {
	graph: LoadedGraph,
	simulator: Box<dyn ForceSimulator>,
	scene: Scene,
	factory: Box<dyn ScenePrimitiveFactory>,
	camera: Camera,
	interaction: InteractionState,
	overlay: Overlay,
	renderer: Box<dyn SceneRenderer>,
	commands: CommandQueue,
	released: bool,
}

impl SceneCore {
	pub fn new(
		graph: LoadedGraph,
		mut factory: Box<dyn ScenePrimitiveFactory>,
		mut renderer: Box<dyn SceneRenderer>,
		commands: CommandQueue,
		viewport: Viewport,
		config: &ViewConfig,
	) -> Self {
		let (seeds, links, params) =
			(graph.seeds.clone(), graph.layout_links(), config.simulation.clone());
		let simulator: Box<dyn ForceSimulator> = match config.engine {
			LayoutEngine::Volumetric => Box::new(LayoutSimulation::new(seeds, &links, params)),
			LayoutEngine::Planar => Box::new(PlanarSimulation::new(seeds, &links, params)),
		};
		let scene = Scene::build(&graph, factory.as_mut(), &config.style);
		renderer.resize(viewport);

		Self {
			graph,
			simulator,
			scene,
			factory,
			camera: Camera::new(&config.camera, viewport),
			interaction: InteractionState::new(viewport),
			overlay: Overlay::default(),
			renderer,
			commands,
			released: false,
		}
	}

	/// One frame: queued commands, step, sync, emphasis, controls, render.
	/// Picking runs against the positions drawn by the previous frame, and
	/// only the last pointer move of the batch is picked.
	pub fn frame(&mut self) {
		if self.released {
			return;
		}
		for command in coalesce_pointer_moves(self.commands.drain()) {
			self.apply(command);
		}

		self.simulator.step();
		let selected = self.interaction.selected.clone();
		self.scene.sync(self.simulator.positions(), selected.as_deref());
		apply_emphasis(&mut self.scene, &self.interaction);
		self.camera.update();
		self.overlay = Overlay::compose(&self.graph, &self.scene, &self.interaction);
		self.renderer.render(&FrameView {
			scene: &self.scene,
			camera: &self.camera,
			viewport: self.interaction.viewport,
			overlay: &self.overlay,
		});
	}

	fn apply(&mut self, command: Command) {
		match command {
			Command::Orbit { dx, dy } => self.camera.orbit(dx, dy),
			Command::Zoom { delta } => self.camera.zoom(delta),
			Command::Resized { width, height } => {
				let viewport = Viewport::new(width, height);
				self.camera.set_viewport(viewport);
				self.renderer.resize(viewport);
			}
			_ => {}
		}
		let state = std::mem::take(&mut self.interaction);
		let viewport = state.viewport;
		let (camera, scene, factory) = (&self.camera, &self.scene, self.factory.as_ref());
		self.interaction = reduce(state, &command, |x, y| {
			pick(camera, scene, factory, viewport, x, y)
		});
	}

	pub fn graph(&self) -> &LoadedGraph {
		&self.graph
	}

	pub fn scene(&self) -> &Scene {
		&self.scene
	}

	pub fn camera(&self) -> &Camera {
		&self.camera
	}

	pub fn simulator(&self) -> &dyn ForceSimulator {
		self.simulator.as_ref()
	}

	pub fn interaction(&self) -> &InteractionState {
		&self.interaction
	}

	pub fn overlay(&self) -> &Overlay {
		&self.overlay
	}

	pub fn live_resources(&self) -> usize {
		self.factory.live_resources()
	}

	pub fn is_released(&self) -> bool {
		self.released
	}

	fn release(&mut self) {
		if self.released {
			return;
		}
		self.released = true;
		self.simulator.stop();
		self.scene.release(self.factory.as_mut());
		self.renderer.release();
		self.commands.clear();
	}
}

fn pick(
	camera: &Camera,
	scene: &Scene,
	factory: &dyn ScenePrimitiveFactory,
	viewport: Viewport,
	x: f64,
	y: f64,
) -> Option<String> {
	let ray = camera.ray_through(x, y, viewport);
	factory
		.intersect(&ray, &scene.nodes)
		.map(|hit| scene.nodes[hit.primitive].id.clone())
}

pub struct SceneSession<S: FrameScheduler, E: SurfaceEvents> {
	core: SharedCore,
	scheduler: S,
	events: E,
	commands: CommandQueue,
	/// Shared with the frame callback, which finishes a release that
	/// `deactivate` could not perform while the core was borrowed.
	active: Rc<Cell<bool>>,
}

impl<S: FrameScheduler, E: SurfaceEvents> SceneSession<S, E> {
	/// Fetch the graph, then build and start everything. A fetch failure
	/// returns before any simulator, primitive or listener exists.
	pub async fn activate<G, R, F>(
		source: &G,
		bindings: HostBindings<S, E, R, F>,
		config: &ViewConfig,
	) -> Result<Self, GraphError>
	where
		G: GraphSource,
		R: SceneRenderer + 'static,
		F: ScenePrimitiveFactory + 'static,
	{
		let graph = load(source, config).await?;
		Self::start(graph, bindings, config)
	}

	/// Build and start a session around an already loaded graph.
	pub fn start<R, F>(
		graph: LoadedGraph,
		bindings: HostBindings<S, E, R, F>,
		config: &ViewConfig,
	) -> Result<Self, GraphError>
	where
		R: SceneRenderer + 'static,
		F: ScenePrimitiveFactory + 'static,
	{
		let HostBindings {
			scheduler,
			events,
			renderer,
			factory,
			commands,
		} = bindings;
		commands.clear();

		let node_count = graph.nodes.len();
		let core = SceneCore::new(
			graph,
			Box::new(factory),
			Box::new(renderer),
			commands.clone(),
			events.viewport(),
			config,
		);
		let mut session = Self {
			core: Rc::new(RefCell::new(core)),
			scheduler,
			events,
			commands,
			active: Rc::new(Cell::new(true)),
		};

		if let Err(err) = session.events.attach(session.commands.clone()) {
			session.deactivate();
			return Err(err);
		}

		let core: Weak<RefCell<SceneCore>> = Rc::downgrade(&session.core);
		let active = Rc::clone(&session.active);
		let tick = Box::new(move || {
			let Some(core) = core.upgrade() else {
				return;
			};
			match core.try_borrow_mut() {
				Ok(mut core) => {
					core.frame();
					if !active.get() {
						core.release();
					}
				}
				Err(_) => warn!("frame skipped: scene core is busy"),
			}
		});
		if let Err(err) = session.scheduler.start(tick) {
			session.deactivate();
			return Err(err);
		}

		info!("graph view active with {node_count} nodes");
		Ok(session)
	}

	/// Cancel the frame loop, stop the simulator, remove listeners and release
	/// every primitive. Calling it again does nothing.
	///
	/// When this runs inside a frame (the core is borrowed), the release is
	/// finished by that frame's callback before it returns.
	pub fn deactivate(&mut self) {
		if !self.active.replace(false) {
			return;
		}
		self.scheduler.cancel();
		self.events.detach();
		match self.core.try_borrow_mut() {
			Ok(mut core) => core.release(),
			Err(_) => debug!("scene core busy, release deferred to the running frame"),
		}
		debug!("graph view deactivated");
	}

	pub fn is_active(&self) -> bool {
		self.active.get()
	}

	/// Queue a command as if a listener had produced it.
	pub fn dispatch(&self, command: Command) {
		if self.active.get() {
			self.commands.push(command);
		}
	}

	/// Run one frame synchronously, outside the scheduler.
	pub fn run_frame(&self) {
		if let Ok(mut core) = self.core.try_borrow_mut() {
			core.frame();
		}
	}

	pub fn with_core<T>(&self, f: impl FnOnce(&SceneCore) -> T) -> T {
		f(&self.core.borrow())
	}

	pub fn scheduler(&self) -> &S {
		&self.scheduler
	}

	pub fn events(&self) -> &E {
		&self.events
	}
}

impl<S: FrameScheduler, E: SurfaceEvents> Drop for SceneSession<S, E> {
	fn drop(&mut self) {
		self.deactivate();
	}
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;

	use std::collections::BTreeSet;

	use super::*;
	use crate::components::graph3d::headless::{
		DetachedSurface, ManualFrameLoop, RecordingRenderer, RenderLog,
	};
	use crate::components::graph3d::loader::StaticGraphSource;
	use crate::components::graph3d::picking::{Hit, Ray, intersect_spheres};
	use crate::components::graph3d::scene::{NodePrimitive, NodeShape, PrimitiveHandle};
	use crate::components::graph3d::types::{GraphEdge, GraphNode, GraphPayload, NodeKind};

	type HeadlessSession = SceneSession<ManualFrameLoop, DetachedSurface>;

	/// Factory that tracks live handles and ray queries in shared cells.
	#[derive(Clone, Default)]
	struct CountingFactory {
		next: Rc<Cell<u32>>,
		live: Rc<RefCell<BTreeSet<PrimitiveHandle>>>,
		made: Rc<Cell<usize>>,
		queries: Rc<Cell<usize>>,
	}

	impl CountingFactory {
		fn allocate(&mut self) -> PrimitiveHandle {
			let handle = PrimitiveHandle(self.next.get());
			self.next.set(handle.0 + 1);
			self.made.set(self.made.get() + 1);
			self.live.borrow_mut().insert(handle);
			handle
		}
	}

	impl ScenePrimitiveFactory for CountingFactory {
		fn make_node(&mut self, _kind: NodeKind, _shape: NodeShape) -> PrimitiveHandle {
			self.allocate()
		}

		fn make_line(&mut self) -> PrimitiveHandle {
			self.allocate()
		}

		fn make_points(&mut self, _count: usize) -> PrimitiveHandle {
			self.allocate()
		}

		fn release(&mut self, handle: PrimitiveHandle) {
			self.live.borrow_mut().remove(&handle);
		}

		fn live_resources(&self) -> usize {
			self.live.borrow().len()
		}

		fn intersect(&self, ray: &Ray, primitives: &[NodePrimitive]) -> Option<Hit> {
			self.queries.set(self.queries.get() + 1);
			intersect_spheres(ray, primitives)
		}
	}

	/// Drops the session it is handed from inside its first render.
	struct TeardownOnRender {
		session: Rc<RefCell<Option<HeadlessSession>>>,
		log: Rc<RefCell<RenderLog>>,
	}

	impl SceneRenderer for TeardownOnRender {
		fn resize(&mut self, _viewport: Viewport) {}

		fn render(&mut self, _frame: &FrameView<'_>) {
			self.log.borrow_mut().frames += 1;
			let session = self.session.borrow_mut().take();
			drop(session);
		}

		fn release(&mut self) {
			self.log.borrow_mut().released = true;
		}
	}

	struct Unreachable;

	impl GraphSource for Unreachable {
		async fn fetch(&self) -> Result<GraphPayload, GraphError> {
			Err(GraphError::DataUnavailable("connection refused".into()))
		}
	}

	fn source() -> StaticGraphSource {
		StaticGraphSource::new(GraphPayload {
			nodes: vec![
				GraphNode::new("T1").at(0.0, 0.0, 0.0),
				GraphNode::new("T2").at(3.0, 0.0, 0.0),
			],
			edges: vec![GraphEdge::new("T1", "T2", "anchor")],
			meta: serde_json::Value::Null,
		})
	}

	fn activate<R, F>(
		source: &StaticGraphSource,
		bindings: HostBindings<ManualFrameLoop, DetachedSurface, R, F>,
	) -> HeadlessSession
	where
		R: SceneRenderer + 'static,
		F: ScenePrimitiveFactory + 'static,
	{
		pollster::block_on(SceneSession::activate(source, bindings, &ViewConfig::default()))
			.unwrap()
	}

	#[test]
	fn failed_load_constructs_nothing() {
		let frames = ManualFrameLoop::new();
		let surface = DetachedSurface::new(Viewport::default());
		let (renderer, log) = RecordingRenderer::new();
		let bindings = HostBindings {
			scheduler: frames.sibling(),
			events: surface.sibling(),
			renderer,
			factory: ResourceArena::new(),
			commands: CommandQueue::new(),
		};
		let config = ViewConfig::default();
		let result = pollster::block_on(SceneSession::activate(&Unreachable, bindings, &config));
		assert!(matches!(result, Err(GraphError::DataUnavailable(_))));
		assert_eq!(frames.pending(), 0);
		assert_eq!(surface.attached_listeners(), 0);
		assert_eq!(log.borrow().frames, 0);
	}

	#[test]
	fn frames_run_until_deactivated() {
		let frames = ManualFrameLoop::new();
		let surface = DetachedSurface::new(Viewport::default());
		let (renderer, log) = RecordingRenderer::new();
		let bindings = HostBindings {
			scheduler: frames.sibling(),
			events: surface.sibling(),
			renderer,
			factory: ResourceArena::new(),
			commands: CommandQueue::new(),
		};
		let mut session = activate(&source(), bindings);
		assert!(session.scheduler().is_scheduled());
		assert!(session.events().is_attached());
		assert!(session.with_core(|core| core.live_resources()) > 0);

		frames.pump(5);
		assert_eq!(log.borrow().frames, 5);
		assert_eq!(log.borrow().visible_edges, 1);
		assert_eq!(session.with_core(|core| core.scene().frame()), 5);

		session.deactivate();
		session.deactivate();
		frames.pump(5);
		assert_eq!(log.borrow().frames, 5);
		assert!(log.borrow().released);
		assert_eq!(frames.pending(), 0);
		assert_eq!(surface.attached_listeners(), 0);
		assert_eq!(session.with_core(|core| core.live_resources()), 0);
		assert!(session.with_core(|core| core.simulator().is_stopped()));
		assert!(session.with_core(|core| core.is_released() && core.scene().is_released()));
	}

	#[test]
	fn click_at_center_selects_node_at_target() {
		let surface = DetachedSurface::new(Viewport::new(800.0, 600.0));
		let (renderer, log) = RecordingRenderer::new();
		let bindings = HostBindings {
			scheduler: ManualFrameLoop::new(),
			events: surface,
			renderer,
			factory: ResourceArena::new(),
			commands: CommandQueue::new(),
		};
		let lone = StaticGraphSource::new(GraphPayload {
			nodes: vec![GraphNode::new("T1").at(0.0, 0.0, 0.0)],
			..GraphPayload::default()
		});
		let session = activate(&lone, bindings);
		session.dispatch(Command::PointerClicked { x: 400.0, y: 300.0 });
		session.run_frame();
		let selected = session.with_core(|core| core.interaction().selected.clone());
		assert_eq!(selected.as_deref(), Some("T1"));
		assert!(log.borrow().overlay.details.is_some());

		session.dispatch(Command::CloseDetails);
		session.run_frame();
		assert_eq!(log.borrow().overlay.details, None);
	}

	#[test]
	fn dropping_a_session_releases_it() {
		let frames = ManualFrameLoop::new();
		let (renderer, log) = RecordingRenderer::new();
		let bindings = HostBindings {
			scheduler: frames.sibling(),
			events: DetachedSurface::default(),
			renderer,
			factory: ResourceArena::new(),
			commands: CommandQueue::new(),
		};
		let session = activate(&source(), bindings);
		drop(session);
		assert_eq!(frames.pending(), 0);
		assert!(log.borrow().released);
	}

	#[test]
	fn supplied_factory_gets_every_primitive_back() {
		let frames = ManualFrameLoop::new();
		let factory = CountingFactory::default();
		let (renderer, _log) = RecordingRenderer::new();
		let bindings = HostBindings {
			scheduler: frames.sibling(),
			events: DetachedSurface::default(),
			renderer,
			factory: factory.clone(),
			commands: CommandQueue::new(),
		};
		let mut session = activate(&source(), bindings);
		// two nodes, one edge, one particle field
		assert_eq!(factory.made.get(), 4);
		assert_eq!(session.with_core(|core| core.live_resources()), 4);

		frames.pump(3);
		session.deactivate();
		assert!(factory.live.borrow().is_empty());
		assert_eq!(factory.made.get(), 4);
	}

	#[test]
	fn pointer_moves_in_one_frame_pick_once() {
		let frames = ManualFrameLoop::new();
		let factory = CountingFactory::default();
		let (renderer, log) = RecordingRenderer::new();
		let bindings = HostBindings {
			scheduler: frames.sibling(),
			events: DetachedSurface::new(Viewport::new(800.0, 600.0)),
			renderer,
			factory: factory.clone(),
			commands: CommandQueue::new(),
		};
		let session = activate(&source(), bindings);
		for step in 0..20 {
			session.dispatch(Command::PointerMoved {
				x: 380.0 + step as f64,
				y: 300.0,
			});
		}
		frames.pump(1);
		assert_eq!(factory.queries.get(), 1);
		let pointer = session.with_core(|core| core.interaction().pointer);
		assert_eq!(pointer, Some((399.0, 300.0)));
		assert_eq!(log.borrow().frames, 1);
	}

	#[test]
	fn teardown_during_a_frame_still_releases() {
		let frames = ManualFrameLoop::new();
		let factory = CountingFactory::default();
		let slot: Rc<RefCell<Option<HeadlessSession>>> = Rc::new(RefCell::new(None));
		let log = Rc::new(RefCell::new(RenderLog::default()));
		let bindings = HostBindings {
			scheduler: frames.sibling(),
			events: DetachedSurface::default(),
			renderer: TeardownOnRender {
				session: Rc::clone(&slot),
				log: Rc::clone(&log),
			},
			factory: factory.clone(),
			commands: CommandQueue::new(),
		};
		*slot.borrow_mut() = Some(activate(&source(), bindings));

		frames.pump(3);
		assert!(slot.borrow().is_none());
		assert_eq!(log.borrow().frames, 1);
		assert!(log.borrow().released);
		assert_eq!(frames.pending(), 0);
		assert!(factory.live.borrow().is_empty());
	}
}
