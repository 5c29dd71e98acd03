use std::cell::RefCell;
use std::rc::Rc;

use force_graph_3d::graph3d::camera::{Camera, Viewport};
use force_graph_3d::graph3d::config::{CameraConfig, LayoutEngine, SceneStyle, ViewConfig};
use force_graph_3d::graph3d::headless::{
	DetachedSurface, ManualFrameLoop, RecordingRenderer, RenderLog,
};
use force_graph_3d::graph3d::interaction::{Command, Phase};
use force_graph_3d::graph3d::picking::intersect_spheres;
use force_graph_3d::graph3d::scene::{ResourceArena, Scene};
use force_graph_3d::graph3d::simulation::{ForceSimulator, LayoutSimulation};
use force_graph_3d::graph3d::{
	CommandQueue, GraphEdge, GraphError, GraphNode, GraphPayload, GraphSource, HostBindings,
	LoadedGraph, SceneSession, StaticGraphSource,
};
use pretty_assertions::assert_eq;

type HeadlessSession = SceneSession<ManualFrameLoop, DetachedSurface>;
type Activation = (Result<HeadlessSession, GraphError>, Rc<RefCell<RenderLog>>);

struct Host {
	frames: ManualFrameLoop,
	surface: DetachedSurface,
}

impl Host {
	fn new() -> Self {
		Self {
			frames: ManualFrameLoop::new(),
			surface: DetachedSurface::new(Viewport::new(800.0, 600.0)),
		}
	}

	fn activate(&self, source: &impl GraphSource, config: &ViewConfig) -> Activation {
		let (renderer, log) = RecordingRenderer::new();
		let bindings = HostBindings {
			scheduler: self.frames.sibling(),
			events: self.surface.sibling(),
			renderer,
			factory: ResourceArena::new(),
			commands: CommandQueue::new(),
		};
		(pollster::block_on(SceneSession::activate(source, bindings, config)), log)
	}
}

fn payload(nodes: &[(&str, f64)], edges: &[(&str, &str, &str)]) -> GraphPayload {
	GraphPayload {
		nodes: nodes.iter().map(|(id, x)| GraphNode::new(*id).at(*x, 0.0, 0.0)).collect(),
		edges: edges.iter().map(|(s, t, k)| GraphEdge::new(*s, *t, *k)).collect(),
		meta: serde_json::Value::Null,
	}
}

fn two_nodes() -> StaticGraphSource {
	StaticGraphSource::new(payload(&[("T1", 0.0), ("T2", 3.0)], &[("T1", "T2", "anchor")]))
}

fn linked_pair_distance(session: &HeadlessSession) -> f64 {
	session.with_core(|core| {
		let p = core.simulator().positions();
		p[0].distance(p[1])
	})
}

struct Refused;

impl GraphSource for Refused {
	async fn fetch(&self) -> Result<GraphPayload, GraphError> {
		Err(GraphError::DataUnavailable("connection refused".into()))
	}
}

#[test]
fn loaded_edge_resolves_both_endpoints() {
	let p = payload(&[("T1", 0.0), ("T2", 1.0)], &[("T1", "T2", "anchor")]);
	let graph = LoadedGraph::from_payload(p, 8.0);
	assert_eq!(graph.edges.len(), 1);
	assert_eq!(graph.links, vec![(0, 1)]);
	assert_eq!(graph.node("T1").map(|n| n.id.as_str()), Some("T1"));
	assert_eq!(graph.node("T2").map(|n| n.id.as_str()), Some("T2"));
}

#[test]
fn identity_edges_never_load() {
	let p = payload(&[("T1", 0.0)], &[("T1", "T1", "identity")]);
	let graph = LoadedGraph::from_payload(p, 8.0);
	assert!(graph.edges.is_empty());
	assert_eq!(graph.report.identity_dropped, 1);
}

#[test]
fn edges_to_missing_nodes_are_dropped() {
	let edges = [("T1", "T2", "anchor"), ("T2", "T3", "bridge")];
	let graph = LoadedGraph::from_payload(payload(&[("T1", 0.0), ("T2", 1.0)], &edges), 8.0);
	assert_eq!(graph.edges.len(), 1);
	assert_eq!(graph.report.unresolved.len(), 1);
	assert_eq!(graph.report.unresolved[0].missing, "T3");
}

#[test]
fn click_selects_then_empty_space_clears() {
	let host = Host::new();
	let (session, log) = host.activate(&two_nodes(), &ViewConfig::default());
	let session = session.unwrap();
	host.frames.pump(1);

	let target = session.with_core(|core| {
		let node = core.scene().node("T2").map(|n| n.position);
		node.and_then(|p| core.camera().project(p, Viewport::new(800.0, 600.0)))
	});
	let target = target.expect("T2 is in front of the camera");

	session.dispatch(Command::PointerClicked {
		x: target.x,
		y: target.y,
	});
	host.frames.pump(1);
	let phase = session.with_core(|core| core.interaction().phase());
	assert_eq!(phase, Phase::Selected("T2".into()));
	let details = log.borrow().overlay.details.clone().unwrap();
	assert_eq!(details.id, "T2");
	assert_eq!(details.connections.len(), 1);

	session.dispatch(Command::PointerClicked { x: 2.0, y: 2.0 });
	host.frames.pump(1);
	assert_eq!(session.with_core(|core| core.interaction().selected.clone()), None);
	assert_eq!(log.borrow().overlay.details, None);
}

#[test]
fn hundred_frames_settle_near_link_distance() {
	let host = Host::new();
	let config = ViewConfig::default();
	let (session, _) = host.activate(&two_nodes(), &config);
	let session = session.unwrap();
	host.frames.pump(100);

	let distance = linked_pair_distance(&session);
	let alpha = session.with_core(|core| core.simulator().alpha());
	let target = config.simulation.link_distance;
	assert!((distance - target).abs() <= target * 0.15, "distance {distance}");
	assert!((alpha - 0.8 * 0.98f64.powi(100)).abs() < 1e-9);
}

#[test]
fn direct_simulation_settles_near_link_distance() {
	let p = payload(&[("T1", 0.0), ("T2", 3.0)], &[("T1", "T2", "anchor")]);
	let graph = LoadedGraph::from_payload(p, 8.0);
	let links = graph.layout_links();
	let mut sim = LayoutSimulation::new(graph.seeds, &links, Default::default());
	for _ in 0..100 {
		sim.step();
	}
	let distance = sim.positions()[0].distance(sim.positions()[1]);
	assert!((distance - 40.0).abs() <= 6.0, "distance {distance}");
}

#[test]
fn one_frame_loop_across_activation_cycles() {
	let host = Host::new();
	let mut previous: Option<(HeadlessSession, Rc<RefCell<RenderLog>>)> = None;

	for cycle in 0..5 {
		if let Some((mut session, log)) = previous.take() {
			session.deactivate();
			assert!(log.borrow().released);
		}
		assert_eq!(host.frames.pending(), 0, "cycle {cycle}");
		assert_eq!(host.surface.attached_listeners(), 0, "cycle {cycle}");

		let (session, log) = host.activate(&two_nodes(), &ViewConfig::default());
		let session = session.unwrap();
		assert_eq!(host.frames.pending(), 1);
		assert_eq!(host.surface.attached_listeners(), 1);
		host.frames.pump(3);
		assert_eq!(log.borrow().frames, 3);
		previous = Some((session, log));
	}

	if let Some((mut session, _)) = previous {
		session.deactivate();
	}
	assert_eq!(host.frames.pending(), 0);
	assert_eq!(host.surface.attached_listeners(), 0);
}

#[test]
fn sessions_do_not_share_state() {
	let host = Host::new();
	let (first, first_log) = host.activate(&two_nodes(), &ViewConfig::default());
	let (second, second_log) = host.activate(&two_nodes(), &ViewConfig::default());
	let (mut first, second) = (first.unwrap(), second.unwrap());
	assert_eq!(host.frames.pending(), 2);

	first.deactivate();
	host.frames.pump(4);
	assert_eq!(first_log.borrow().frames, 0);
	assert_eq!(second_log.borrow().frames, 4);
	assert!(second.is_active());
	assert!(second.with_core(|core| core.live_resources()) > 0);
}

#[test]
fn deactivate_twice_matches_once() {
	let host = Host::new();
	let (session, log) = host.activate(&two_nodes(), &ViewConfig::default());
	let mut session = session.unwrap();
	host.frames.pump(2);

	session.deactivate();
	let once = (
		host.frames.pending(),
		host.surface.attached_listeners(),
		session.with_core(|core| core.live_resources()),
		log.borrow().clone(),
	);
	session.deactivate();
	let twice = (
		host.frames.pending(),
		host.surface.attached_listeners(),
		session.with_core(|core| core.live_resources()),
		log.borrow().clone(),
	);
	assert_eq!(once, twice);
	assert_eq!(once.2, 0);
	assert!(!session.is_active());
}

#[test]
fn unavailable_data_builds_nothing() {
	let host = Host::new();
	let (session, log) = host.activate(&Refused, &ViewConfig::default());
	assert!(matches!(session, Err(GraphError::DataUnavailable(_))));
	assert_eq!(host.frames.pending(), 0);
	assert_eq!(host.surface.attached_listeners(), 0);
	assert_eq!(*log.borrow(), RenderLog::default());
}

#[test]
fn malformed_payload_is_unavailable_data() {
	let err = StaticGraphSource::from_json("{\"nodes\": 3}").unwrap_err();
	assert!(matches!(err, GraphError::DataUnavailable(_)));
}

#[test]
fn empty_graph_runs_frames() {
	let host = Host::new();
	let empty = StaticGraphSource::new(GraphPayload::default());
	let (session, log) = host.activate(&empty, &ViewConfig::default());
	let mut session = session.unwrap();
	session.dispatch(Command::PointerClicked { x: 400.0, y: 300.0 });
	host.frames.pump(10);
	assert_eq!(log.borrow().frames, 10);
	assert_eq!(session.with_core(|core| core.interaction().phase()), Phase::Idle);

	session.deactivate();
	assert_eq!(session.with_core(|core| core.live_resources()), 0);
}

#[test]
fn planar_engine_runs_frames() {
	let host = Host::new();
	let config = ViewConfig {
		engine: LayoutEngine::Planar,
		..ViewConfig::default()
	};
	let (session, log) = host.activate(&two_nodes(), &config);
	let mut session = session.unwrap();
	host.frames.pump(20);
	assert_eq!(log.borrow().frames, 20);
	let positions = session.with_core(|core| core.simulator().positions().to_vec());
	assert!(positions.iter().all(|p| p.is_finite()));

	session.deactivate();
	assert!(session.with_core(|core| core.simulator().is_stopped()));
}

#[test]
fn planar_engine_honours_link_distance() {
	let host = Host::new();
	for link_distance in [40.0, 20.0] {
		let mut config = ViewConfig {
			engine: LayoutEngine::Planar,
			..ViewConfig::default()
		};
		config.simulation.link_distance = link_distance;
		let (session, _) = host.activate(&two_nodes(), &config);
		let session = session.unwrap();
		host.frames.pump(100);
		let distance = linked_pair_distance(&session);
		assert!(
			(distance - link_distance).abs() <= link_distance * 0.15,
			"link distance {link_distance}: ended at {distance}"
		);
	}
}

#[test]
fn series_bridges_pull_without_becoming_edges() {
	let series_node = |id: &str, x: f64| GraphNode {
		category: "O".into(),
		..GraphNode::new(id).at(x, 0.0, 0.0)
	};
	let source = StaticGraphSource::new(GraphPayload {
		nodes: vec![series_node("O1", -10.0), series_node("O3", 10.0)],
		..GraphPayload::default()
	});
	let host = Host::new();

	let (bridged, log) = host.activate(&source, &ViewConfig::default());
	let bridged = bridged.unwrap();
	let mut config = ViewConfig::default();
	config.bridges.enabled = false;
	let (apart, _) = host.activate(&source, &config);
	let apart = apart.unwrap();

	host.frames.pump(100);
	assert!(linked_pair_distance(&bridged) < linked_pair_distance(&apart));
	assert_eq!(bridged.with_core(|core| core.graph().bridges.len()), 1);
	assert_eq!(bridged.with_core(|core| core.scene().edges.len()), 0);
	assert_eq!(log.borrow().visible_edges, 0);

	let target = bridged
		.with_core(|core| {
			let p = core.scene().node("O1")?.position;
			core.camera().project(p, Viewport::new(800.0, 600.0))
		})
		.unwrap();
	bridged.dispatch(Command::PointerClicked {
		x: target.x,
		y: target.y,
	});
	host.frames.pump(1);
	let details = log.borrow().overlay.details.clone().unwrap();
	assert_eq!(details.id, "O1");
	assert!(details.connections.is_empty());
}

#[test]
fn ray_through_node_hits_it_and_misses_elsewhere() {
	let graph = LoadedGraph::from_payload(payload(&[("T1", -2.0), ("T2", 2.0)], &[]), 8.0);
	let scene = Scene::build(&graph, &mut ResourceArena::new(), &SceneStyle::default());
	let viewport = Viewport::new(800.0, 600.0);
	let camera = Camera::new(&CameraConfig::default(), viewport);

	for node in &scene.nodes {
		let p = camera.project(node.position, viewport).unwrap();
		let ray = camera.ray_through(p.x, p.y, viewport);
		let hit = intersect_spheres(&ray, &scene.nodes).unwrap();
		assert_eq!(scene.nodes[hit.primitive].id, node.id);
	}

	assert!(intersect_spheres(&camera.ray_through(1.0, 1.0, viewport), &scene.nodes).is_none());
}

#[test]
fn hover_drives_tooltip_and_emphasis() {
	let host = Host::new();
	let (session, log) = host.activate(&two_nodes(), &ViewConfig::default());
	let session = session.unwrap();
	host.frames.pump(1);

	let target = session
		.with_core(|core| {
			let p = core.scene().node("T1")?.position;
			core.camera().project(p, Viewport::new(800.0, 600.0))
		})
		.unwrap();
	session.dispatch(Command::PointerMoved {
		x: target.x,
		y: target.y,
	});
	host.frames.pump(1);

	let tooltip = log.borrow().overlay.tooltip.clone().unwrap();
	assert_eq!(tooltip.id, "T1");
	assert_eq!((tooltip.left, tooltip.top), (target.x + 15.0, target.y + 15.0));
	let scale = session.with_core(|core| core.scene().node("T1").map(|n| n.emphasis.scale));
	assert_eq!(scale, Some(1.3));

	session.dispatch(Command::PointerMoved { x: 2.0, y: 2.0 });
	host.frames.pump(1);
	assert_eq!(session.with_core(|core| core.interaction().hovered.clone()), None);
	assert_eq!(log.borrow().overlay.tooltip, None);

	session.dispatch(Command::PointerMoved {
		x: target.x,
		y: target.y,
	});
	session.dispatch(Command::PointerLeft);
	host.frames.pump(1);
	assert_eq!(log.borrow().overlay.tooltip, None);
}
