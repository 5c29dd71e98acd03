use std::cell::{Cell, RefCell};
use std::rc::Rc;

use leptos::prelude::*;
use leptos::task::spawn_local;
use log::error;
use send_wrapper::SendWrapper;
use web_sys::HtmlCanvasElement;

use super::config::ViewConfig;
use super::interaction::{Command, Connection, DetailPanel, Direction, TooltipView};
use super::loader::HttpGraphSource;
use super::session::{CommandQueue, SceneSession};
use super::web::{AnimationFrameLoop, CanvasEvents, canvas_bindings};

type WebSession = SceneSession<AnimationFrameLoop, CanvasEvents>;

const CANVAS_SHOWN: &str = "display: block; cursor: grab;";
const CANVAS_HIDDEN: &str = "display: none;";
const ERROR_CARD_STYLE: &str = "position: absolute; inset: 0; display: flex; \
	flex-direction: column; align-items: center; justify-content: center; color: #e5e7eb;";

/// Full-size 3D graph view. Activates when the canvas mounts, re-activates on
/// Retry and tears everything down on unmount.
#[component]
pub fn GraphView(#[prop(optional)] config: Option<ViewConfig>) -> impl IntoView {
	let config = Rc::new(config.unwrap_or_default());
	let canvas_ref = NodeRef::<leptos::html::Canvas>::new();
	let tooltip = RwSignal::new(None::<TooltipView>);
	let details = RwSignal::new(None::<DetailPanel>);
	let failure = RwSignal::new(None::<String>);
	let generation = RwSignal::new(0u32);
	let commands = CommandQueue::new();

	let session: Rc<RefCell<Option<WebSession>>> = Rc::new(RefCell::new(None));
	let latest = Rc::new(Cell::new(0u32));
	let disposed = Rc::new(Cell::new(false));

	let (session_init, latest_init, disposed_init, commands_init) =
		(session.clone(), latest.clone(), disposed.clone(), commands.clone());
	Effect::new(move |_| {
		let current = generation.get();
		let Some(canvas) = canvas_ref.get() else {
			return;
		};
		let canvas: HtmlCanvasElement = canvas.into();

		if let Some(mut previous) = session_init.borrow_mut().take() {
			previous.deactivate();
		}
		latest_init.set(current);
		failure.set(None);

		let bindings = match canvas_bindings(&canvas, tooltip, details, commands_init.clone()) {
			Ok(bindings) => bindings,
			Err(err) => {
				error!("graph view unavailable: {err}");
				failure.set(Some(err.to_string()));
				return;
			}
		};

		let (session, latest, disposed, config) =
			(session_init.clone(), latest_init.clone(), disposed_init.clone(), config.clone());
		spawn_local(async move {
			let source = HttpGraphSource::new(config.graph_url.clone());
			match WebSession::activate(&source, bindings, &config).await {
				Ok(mut active) => {
					if disposed.get() || latest.get() != current {
						active.deactivate();
						return;
					}
					*session.borrow_mut() = Some(active);
				}
				Err(err) => {
					error!("graph view failed to activate: {err}");
					if !disposed.get() && latest.get() == current {
						failure.set(Some(err.to_string()));
					}
				}
			}
		});
	});

	let teardown = SendWrapper::new((session, disposed));
	on_cleanup(move || {
		let (session, disposed) = &*teardown;
		disposed.set(true);
		if let Some(mut active) = session.borrow_mut().take() {
			active.deactivate();
		}
	});

	view! {
		<div class="graph-view" style="position: relative; width: 100%; height: 100%;">
			<canvas
				node_ref=canvas_ref
				class="graph-view-canvas"
				style=move || if failure.get().is_some() { CANVAS_HIDDEN } else { CANVAS_SHOWN }
			/>
			{move || {
				failure
					.get()
					.map(|message| view! { <ErrorCard message=message generation=generation /> })
			}}
			{move || tooltip.get().map(|tip| view! { <NodeTooltip tip=tip /> })}
			{move || {
				let commands = commands.clone();
				details.get().map(|panel| view! { <NodeDetails panel=panel commands=commands /> })
			}}
		</div>
	}
}

#[component]
fn ErrorCard(message: String, generation: RwSignal<u32>) -> impl IntoView {
	view! {
		<div class="graph-error" style=ERROR_CARD_STYLE>
			<h2>"Graph data unavailable"</h2>
			<p class="graph-error-message">{message}</p>
			<button on:click=move |_| generation.update(|g| *g += 1)>"Retry"</button>
		</div>
	}
}

#[component]
fn NodeTooltip(tip: TooltipView) -> impl IntoView {
	let position = format!(
		"position: absolute; left: {}px; top: {}px; pointer-events: none; \
		 border-left: 3px solid {};",
		tip.left, tip.top, tip.color
	);
	view! {
		<div class="graph-tooltip" style=position>
			<strong>{tip.short_label}" "{tip.name}</strong>
			<span class="graph-tooltip-id">{tip.id}</span>
			<p>{tip.meaning}</p>
			<p class="graph-tooltip-workflow">{tip.workflow}</p>
		</div>
	}
}

#[component]
fn NodeDetails(panel: DetailPanel, commands: CommandQueue) -> impl IntoView {
	let header = format!("border-top: 3px solid {};", panel.color);
	let count = panel.connections.len();
	let rows = panel
		.connections
		.into_iter()
		.map(|c| view! { <ConnectionRow connection=c /> })
		.collect_view();

	view! {
		<aside class="graph-details" style=header>
			<button
				class="graph-details-close"
				on:click=move |_| commands.push(Command::CloseDetails)
			>
				"×"
			</button>
			<h2>{panel.short_label}" "{panel.name}</h2>
			<p class="graph-details-meta">{panel.id}" · "{format!("{:?}", panel.kind)}</p>
			<p>{panel.meaning}</p>
			<p class="graph-details-workflow">{panel.workflow}</p>
			<h3>{format!("Connections ({count})")}</h3>
			<ul>{rows}</ul>
		</aside>
	}
}

#[component]
fn ConnectionRow(connection: Connection) -> impl IntoView {
	let (arrow, other) = match connection.direction {
		Direction::Outgoing => ("→", connection.target),
		Direction::Incoming => ("←", connection.source),
	};
	let swatch = format!("color: {};", connection.color);
	view! {
		<li class="graph-connection">
			<span style=swatch>{arrow}" "{other}</span>
			<span class="graph-connection-kind">{connection.kind}" · "{connection.naturality}</span>
			<span class="graph-connection-coordinate">{connection.shared_coordinate}</span>
			<p>{connection.meaning}</p>
		</li>
	}
}
