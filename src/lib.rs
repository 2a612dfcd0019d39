//! graph-view: interactive force-directed graph view for static sites.
//!
//! This crate provides a WASM graph view component: a physics layout that
//! persists between visits, a camera with momentum zoom, and frame-rate
//! driven quality adaptation. Page data is read from a JSON script element.

use leptos::prelude::*;
use leptos_meta::*;
use log::{Level, debug, info, warn};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{Element, Event, HtmlScriptElement, Window};

pub mod components;

pub use components::force_graph::{GraphData, GraphError, GraphView, Palette, ViewConfig};

use components::force_graph::sample_palette;

/// Checkbox the host page flips to switch between light and dark themes.
const THEME_TOGGLE_SELECTOR: &str = ".theme-toggle-input";

/// Initialize logging and panic hooks for the WASM target.
pub fn init_logging() {
	let _ = console_log::init_with_level(Level::Debug);
	console_error_panic_hook::set_once();
	info!("graph-view: logging initialized");
}

/// Parse page data. Unknown fields are ignored and missing ones defaulted.
pub fn parse_graph_data(json: &str) -> Result<GraphData, GraphError> {
	Ok(serde_json::from_str(json)?)
}

/// Load graph data from a script element with id="graph-data".
fn load_graph_data() -> Option<GraphData> {
	let window: Window = web_sys::window()?;
	let document = window.document()?;
	let element = document.get_element_by_id("graph-data")?;
	let script: HtmlScriptElement = element.dyn_into().ok()?;
	let json_text = script.text().ok()?;

	match parse_graph_data(&json_text) {
		Ok(data) => {
			info!(
				"graph-view: loaded {} nodes, {} links",
				data.node_count, data.link_count
			);
			Some(data)
		}
		Err(e) => {
			warn!("graph-view: failed to parse graph data: {}", e);
			None
		}
	}
}

/// Palette resolved from the document's current CSS variables.
fn current_palette() -> Palette {
	let Some(window) = web_sys::window() else {
		return Palette::default();
	};
	match window.document() {
		Some(document) => sample_palette(&window, &document),
		None => Palette::default(),
	}
}

/// Resample the palette whenever the theme toggle changes.
///
/// The sample is deferred by a zero-delay timeout so the new theme's styles
/// have been applied when the variables are read.
fn watch_theme_toggle(set_palette: WriteSignal<Palette>) {
	let Some(window) = web_sys::window() else {
		return;
	};
	let Some(document) = window.document() else {
		return;
	};
	let on_change = Closure::<dyn FnMut(Event)>::new(move |ev: Event| {
		let toggled = ev
			.target()
			.and_then(|target| target.dyn_into::<Element>().ok())
			.is_some_and(|element| element.matches(THEME_TOGGLE_SELECTOR).unwrap_or(false));
		if !toggled {
			return;
		}
		let Some(window) = web_sys::window() else {
			return;
		};
		let resample = Closure::once_into_js(move || {
			debug!("graph-view: theme toggled, resampling palette");
			set_palette.set(current_palette());
		});
		let _ = window
			.set_timeout_with_callback_and_timeout_and_arguments_0(resample.unchecked_ref(), 0);
	});
	if document
		.add_event_listener_with_callback("change", on_change.as_ref().unchecked_ref())
		.is_ok()
	{
		// lives as long as the page
		on_change.forget();
	}
}

/// Main application component.
/// Loads graph data from the DOM and mounts the graph view.
/// Colors follow the page theme and are resampled when the theme toggle changes.
#[component]
pub fn App() -> impl IntoView {
	provide_meta_context();

	let graph_data = load_graph_data().unwrap_or_default();
	let graph_signal = Signal::derive(move || graph_data.clone());
	let (collapsed, set_collapsed) = signal(false);
	let (palette, set_palette) = signal(current_palette());
	watch_theme_toggle(set_palette);

	view! {
		<Title text="Graph view" />
		<Meta charset="UTF-8" />
		<Meta name="viewport" content="width=device-width, initial-scale=1.0" />

		<div class="graph-view" class:collapsed=collapsed>
			<button class="graph-view-toggle" on:click=move |_| set_collapsed.update(|c| *c = !*c)>
				{move || if collapsed.get() { "Show graph" } else { "Hide graph" }}
			</button>
			<div class="graph-view-body" style:display=move || if collapsed.get() { "none" } else { "block" }>
				<GraphView data=graph_signal collapsed=collapsed palette=palette />
			</div>
		</div>
	}
}
