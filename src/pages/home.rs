use leptos::prelude::*;

use crate::components::graph3d::GraphView;

const OVERLAY_STYLE: &str =
	"position: absolute; top: 16px; left: 16px; color: #e5e7eb; pointer-events: none;";
const HELP: &str =
	"Drag to orbit. Scroll to zoom. Hover a node for its summary, click it for connections.";

/// Default Home Page
#[component]
pub fn Home() -> impl IntoView {
	view! {
		<ErrorBoundary fallback=|errors| {
			view! {
				<h1>"Uh oh! Something went wrong!"</h1>

				<p>"Errors: "</p>
				<ul>
					{move || {
						errors
							.get()
							.into_iter()
							.map(|(_, e)| view! { <li>{e.to_string()}</li> })
							.collect_view()
					}}
				</ul>
			}
		}>

			<div class="fullscreen-graph" style="position: fixed; inset: 0; background: #050508;">
				<GraphView />
				<div class="graph-overlay" style=OVERLAY_STYLE>
					<h1>"Knowledge Graph"</h1>
					<p class="subtitle">{HELP}</p>
				</div>
			</div>
		</ErrorBoundary>
	}
}
