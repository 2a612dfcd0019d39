//! Leptos component hosting the graph view on a canvas element.
//!
//! The component builds a [`LoopController`] session when the canvas mounts
//! and runs two `requestAnimationFrame` chains: one ticks the controller at
//! the capped frame-rate, the other drains the rendering context's inbox.
//! Mouse and wheel events are translated to canvas-local coordinates and
//! forwarded to the controller.
//!
//! When the canvas leaves the document the tick chain persists the layout,
//! releases the session, removes the `pagehide` listener and stops both
//! chains.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use leptos::prelude::*;
use log::{error, info, warn};
use wasm_bindgen::prelude::*;
use web_sys::{HtmlCanvasElement, MouseEvent, WheelEvent, Window};

use super::camera::Vec2;
use super::controller::{FrameClock, LoopController, ViewConfig};
use super::error::GraphError;
use super::physics::{ForceGraphEngine, ForceTunables};
use super::proxy::{RenderProxy, StaticGraphData};
use super::render::{CanvasSurface, RenderContext};
use super::state::SimulationBridge;
use super::storage::{LayoutStore, LocalStorageStore, MemoryStore};
use super::theme::{Palette, sample_palette};
use super::types::GraphData;

type FrameCallback = Rc<RefCell<Option<Closure<dyn FnMut()>>>>;
type SharedSession = Rc<RefCell<Option<Session>>>;
type SharedRender = Rc<RefCell<Option<RenderContext>>>;

/// A running view: the controller plus the clock pacing it.
struct Session {
	controller: LoopController,
	clock: FrameClock,
}

/// Renders the interactive graph view.
///
/// The canvas fills its parent; size changes are picked up every frame.
/// `collapsed` pauses the simulation while true. Without a `palette` signal
/// colors are sampled once from the document's CSS variables.
#[component]
pub fn GraphView(
	#[prop(into)] data: Signal<GraphData>,
	#[prop(optional, into)] collapsed: Option<Signal<bool>>,
	#[prop(optional, into)] palette: Option<Signal<Palette>>,
	#[prop(optional)] config: Option<ViewConfig>,
) -> impl IntoView {
	let canvas_ref = NodeRef::<leptos::html::Canvas>::new();
	let config = config.unwrap_or_default();
	let session: SharedSession = Rc::new(RefCell::new(None));
	let render: SharedRender = Rc::new(RefCell::new(None));
	let tick_cb: FrameCallback = Rc::new(RefCell::new(None));
	let pump_cb: FrameCallback = Rc::new(RefCell::new(None));
	let pagehide_cb: FrameCallback = Rc::new(RefCell::new(None));
	let running = Rc::new(Cell::new(false));

	let (session_init, render_init) = (session.clone(), render.clone());
	Effect::new(move |_| {
		let Some(canvas) = canvas_ref.get() else {
			return;
		};
		let canvas: HtmlCanvasElement = canvas.into();
		let Some(window) = web_sys::window() else {
			error!("graph-view: no window, view disabled");
			return;
		};
		let graph_data = data.get();

		if let Some(previous) = session_init.borrow_mut().take() {
			previous.controller.release();
			*render_init.borrow_mut() = None;
		}

		let colors = match palette {
			Some(signal) => signal.get_untracked(),
			None => window
				.document()
				.map(|document| sample_palette(&window, &document))
				.unwrap_or_default(),
		};
		let (mut controller, context) = match start_session(&canvas, graph_data, colors, &config) {
			Ok(started) => started,
			Err(GraphError::EmptyGraph) => {
				info!("graph-view: no nodes, nothing to show");
				return;
			}
			Err(e) => {
				error!("graph-view: could not start: {}", e);
				return;
			}
		};
		let hidden = collapsed.is_some_and(|c| c.get_untracked());
		controller.set_visible(!hidden);

		*session_init.borrow_mut() = Some(Session {
			controller,
			clock: FrameClock::new(config.looping.target_fps),
		});
		*render_init.borrow_mut() = Some(context);

		if running.get() {
			return;
		}
		running.set(true);

		if tick_cb.borrow().is_none() {
			let (session_tick, tick_inner) = (session_init.clone(), tick_cb.clone());
			let (render_tick, pagehide_tick, running_tick) =
				(render_init.clone(), pagehide_cb.clone(), running.clone());
			let host = canvas.clone();
			*tick_cb.borrow_mut() = Some(Closure::new(move || {
				let Some(window) = web_sys::window() else {
					return;
				};
				if !host.is_connected() {
					teardown(&window, &session_tick, &render_tick, &pagehide_tick);
					running_tick.set(false);
					let _ = tick_inner.borrow_mut().take();
					return;
				}
				if let Some(s) = session_tick.borrow_mut().as_mut() {
					if s.controller.is_visible() {
						if let Some(fps) = s.clock.tick(now_ms(&window)) {
							s.controller.tick(fps);
						}
					}
				}
				request_frame(&window, &tick_inner);
			}));
			request_frame(&window, &tick_cb);
		}

		if pump_cb.borrow().is_none() {
			let (render_pump, pump_inner) = (render_init.clone(), pump_cb.clone());
			let running_pump = running.clone();
			*pump_cb.borrow_mut() = Some(Closure::new(move || {
				if !running_pump.get() {
					let _ = pump_inner.borrow_mut().take();
					return;
				}
				if let Some(context) = render_pump.borrow_mut().as_mut() {
					context.pump();
				}
				if let Some(window) = web_sys::window() {
					request_frame(&window, &pump_inner);
				}
			}));
			request_frame(&window, &pump_cb);
		}

		if pagehide_cb.borrow().is_none() {
			let session_hide = session_init.clone();
			*pagehide_cb.borrow_mut() = Some(Closure::new(move || {
				if let Some(s) = session_hide.borrow_mut().as_mut() {
					s.controller.persist();
				}
			}));
			if let Some(ref cb) = *pagehide_cb.borrow() {
				let _ = window.add_event_listener_with_callback("pagehide", cb.as_ref().unchecked_ref());
			}
		}
	});

	if let Some(collapsed) = collapsed {
		let session_vis = session.clone();
		Effect::new(move |_| {
			let hidden = collapsed.get();
			if let Some(s) = session_vis.borrow_mut().as_mut() {
				s.controller.set_visible(!hidden);
				s.clock.reset();
			}
		});
	}

	if let Some(palette) = palette {
		let session_colors = session.clone();
		Effect::new(move |_| {
			let colors = palette.get();
			if let Some(s) = session_colors.borrow_mut().as_mut() {
				s.controller.set_palette(colors);
			}
		});
	}

	let session_md = session.clone();
	let on_mousedown = move |ev: MouseEvent| {
		let Some(point) = local_point(canvas_ref, &ev) else {
			return;
		};
		if let Some(s) = session_md.borrow_mut().as_mut() {
			s.controller.on_pointer_down(point);
		}
	};

	let session_mm = session.clone();
	let on_mousemove = move |ev: MouseEvent| {
		let Some(point) = local_point(canvas_ref, &ev) else {
			return;
		};
		if let Some(s) = session_mm.borrow_mut().as_mut() {
			s.controller.on_pointer_move(point);
		}
	};

	let session_mu = session.clone();
	let on_mouseup = move |_: MouseEvent| {
		if let Some(s) = session_mu.borrow_mut().as_mut() {
			s.controller.on_pointer_up();
		}
	};

	let session_ml = session.clone();
	let on_mouseleave = move |_: MouseEvent| {
		if let Some(s) = session_ml.borrow_mut().as_mut() {
			s.controller.on_pointer_leave();
		}
	};

	let session_wh = session.clone();
	let on_wheel = move |ev: WheelEvent| {
		ev.prevent_default();
		if let Some(s) = session_wh.borrow_mut().as_mut() {
			s.controller.on_wheel(ev.delta_y());
		}
	};

	let session_dc = session;
	let on_dblclick = move |_: MouseEvent| {
		if let Some(s) = session_dc.borrow_mut().as_mut() {
			s.controller.on_double_click();
		}
	};

	view! {
		<canvas
			node_ref=canvas_ref
			class="graph-view-canvas"
			on:mousedown=on_mousedown
			on:mousemove=on_mousemove
			on:mouseup=on_mouseup
			on:mouseleave=on_mouseleave
			on:wheel=on_wheel
			on:dblclick=on_dblclick
			style="display: block; width: 100%; height: 100%;"
		/>
	}
}

/// Validate the page data and wire up a controller, engine, store and surface.
fn start_session(
	canvas: &HtmlCanvasElement,
	data: GraphData,
	palette: Palette,
	config: &ViewConfig,
) -> Result<(LoopController, RenderContext), GraphError> {
	let active = web_sys::window()
		.and_then(|w| w.location().pathname().ok())
		.and_then(|path| data.active_node(&path));
	let options = data.graph_options.clone();
	let graph = data.into_description()?;
	let surface = CanvasSurface::new(canvas.clone())?;

	let tunables = ForceTunables {
		attraction_force: options.attraction_force,
		repulsion_force: options.repulsion_force,
		central_force: options.central_force,
		link_length: options.link_length,
		..ForceTunables::default()
	};
	let store: Box<dyn LayoutStore> = match LocalStorageStore::new() {
		Some(store) => Box::new(store),
		None => {
			warn!("graph-view: localStorage unavailable, layout will not persist across loads");
			Box::new(MemoryStore::new())
		}
	};
	let bridge = SimulationBridge::initialize(
		&graph,
		Box::new(ForceGraphEngine::new(tunables)),
		store,
		&config.slot,
		&tunables,
		&config.seed,
	)?;

	let (proxy, context) = RenderProxy::channel(Box::new(canvas.clone()));
	let mut controller = LoopController::new(
		bridge,
		proxy,
		StaticGraphData::new(&graph, options.edge_pruning),
		Box::new(surface),
		palette,
		options.repulsion_force,
		config,
	);
	controller.set_active(active);
	Ok((controller, context))
}

/// Persist and release the session, drop the rendering context and detach
/// the `pagehide` listener.
fn teardown(
	window: &Window,
	session: &SharedSession,
	render: &SharedRender,
	pagehide: &FrameCallback,
) {
	if let Some(s) = session.borrow_mut().take() {
		s.controller.shutdown();
	}
	*render.borrow_mut() = None;
	if let Some(cb) = pagehide.borrow_mut().take() {
		let _ = window.remove_event_listener_with_callback("pagehide", cb.as_ref().unchecked_ref());
	}
	info!("graph-view: canvas detached, view torn down");
}

fn request_frame(window: &Window, callback: &FrameCallback) {
	if let Some(ref cb) = *callback.borrow() {
		let _ = window.request_animation_frame(cb.as_ref().unchecked_ref());
	}
}

/// High-resolution timestamp in milliseconds.
fn now_ms(window: &Window) -> f64 {
	window
		.performance()
		.map(|p| p.now())
		.unwrap_or_else(js_sys::Date::now)
}

/// Event position relative to the canvas' top-left corner.
fn local_point(canvas_ref: NodeRef<leptos::html::Canvas>, ev: &MouseEvent) -> Option<Vec2> {
	let canvas: HtmlCanvasElement = canvas_ref.get()?.into();
	let rect = canvas.get_bounding_client_rect();
	Some(Vec2::new(
		ev.client_x() as f64 - rect.left(),
		ev.client_y() as f64 - rect.top(),
	))
}
