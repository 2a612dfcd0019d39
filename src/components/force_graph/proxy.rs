//! Main-thread side of the rendering pipeline.
//!
//! [`RenderProxy`] never paints. It forwards state to a
//! [`RenderContext`](super::render::RenderContext) over an unbounded,
//! order-preserving channel and owns the viewport size as seen on screen.
//! Every message is fire-and-forget: nothing is acknowledged, nothing is
//! dropped, and a slow context simply accumulates an inbox.

use std::cell::Cell;

use flume::{Receiver, Sender};
use log::{debug, info, warn};
use web_sys::HtmlCanvasElement;

use super::camera::{Camera, Vec2};
use super::render::{RenderContext, Surface};
use super::theme::Palette;
use super::types::GraphDescription;

/// Immutable per-session data the rendering context needs.
#[derive(Clone, Debug, PartialEq)]
pub struct StaticGraphData {
	pub node_count: usize,
	pub link_sources: Vec<u32>,
	pub link_targets: Vec<u32>,
	pub radii: Vec<f32>,
	pub labels: Vec<String>,
	/// Percentage of links to draw.
	pub edge_pruning: f32,
}

impl StaticGraphData {
	pub fn new(graph: &GraphDescription, edge_pruning: f32) -> Self {
		let (link_sources, link_targets) = graph.link_arrays();
		Self {
			node_count: graph.node_count(),
			link_sources,
			link_targets,
			radii: graph.radii().to_vec(),
			labels: graph.labels().to_vec(),
			edge_pruning,
		}
	}
}

/// Initial viewport handed over with the surface.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewportOptions {
	pub width: f64,
	pub height: f64,
}

/// Messages understood by the rendering context.
pub enum RenderMessage {
	/// One-time handoff. The surface moves into the rendering context.
	Init {
		graph: StaticGraphData,
		viewport: ViewportOptions,
		surface: Box<dyn Surface>,
	},
	/// Positions for one frame. The buffer moves with the message.
	Draw { positions: Vec<f32> },
	Resize { width: f64, height: f64 },
	UpdateCamera { offset: Vec2, scale: f64 },
	UpdateInteraction {
		hovered: Option<usize>,
		grabbed: Option<usize>,
	},
	UpdateColors(Palette),
	SetActive(Option<usize>),
}

impl RenderMessage {
	/// Protocol name, for logging.
	pub fn kind(&self) -> &'static str {
		match self {
			RenderMessage::Init { .. } => "init",
			RenderMessage::Draw { .. } => "draw",
			RenderMessage::Resize { .. } => "resize",
			RenderMessage::UpdateCamera { .. } => "update_camera",
			RenderMessage::UpdateInteraction { .. } => "update_interaction",
			RenderMessage::UpdateColors(_) => "update_colors",
			RenderMessage::SetActive(_) => "set_active",
		}
	}
}

/// The on-screen element the view is laid out in.
pub trait HostElement {
	/// Current CSS size in pixels.
	fn size(&self) -> (f64, f64);
	fn set_cursor(&self, cursor: &str);
}

impl HostElement for HtmlCanvasElement {
	fn size(&self) -> (f64, f64) {
		(self.offset_width() as f64, self.offset_height() as f64)
	}

	fn set_cursor(&self, cursor: &str) {
		let _ = self.style().set_property("cursor", cursor);
	}
}

/// Sending half of the rendering pipeline.
pub struct RenderProxy {
	tx: Sender<RenderMessage>,
	element: Box<dyn HostElement>,
	width: f64,
	height: f64,
	disconnected: Cell<bool>,
}

impl RenderProxy {
	/// Create a proxy and the rendering context it feeds.
	pub fn channel(element: Box<dyn HostElement>) -> (Self, RenderContext) {
		let (tx, rx): (Sender<RenderMessage>, Receiver<RenderMessage>) = flume::unbounded();
		let proxy = Self {
			tx,
			element,
			width: 0.0,
			height: 0.0,
			disconnected: Cell::new(false),
		};
		(proxy, RenderContext::new(rx))
	}

	/// Hand static graph data and the surface to the rendering context.
	pub fn initialize(&mut self, graph: StaticGraphData, surface: Box<dyn Surface>) {
		let (width, height) = self.element.size();
		self.width = width;
		self.height = height;
		info!(
			"graph-view: render context init, {} nodes, {}x{}",
			graph.node_count, width, height
		);
		self.post(RenderMessage::Init {
			graph,
			viewport: ViewportOptions { width, height },
			surface,
		});
	}

	pub fn size(&self) -> (f64, f64) {
		(self.width, self.height)
	}

	/// Send a frame. The buffer is consumed.
	pub fn draw(&self, positions: Vec<f32>) {
		self.post(RenderMessage::Draw { positions });
	}

	pub fn update_camera(&self, offset: Vec2, scale: f64) {
		self.post(RenderMessage::UpdateCamera { offset, scale });
	}

	pub fn update_interaction(&self, hovered: Option<usize>, grabbed: Option<usize>) {
		self.post(RenderMessage::UpdateInteraction { hovered, grabbed });
	}

	pub fn update_colors(&self, palette: Palette) {
		self.post(RenderMessage::UpdateColors(palette));
	}

	pub fn set_active(&self, node: Option<usize>) {
		self.post(RenderMessage::SetActive(node));
	}

	pub fn resize(&mut self, width: f64, height: f64) {
		self.width = width;
		self.height = height;
		self.post(RenderMessage::Resize { width, height });
	}

	/// Follow the element's on-screen size. On change the camera is resized
	/// and recentered and the context is told. Returns whether it changed.
	pub fn auto_resize_canvas(&mut self, camera: &mut Camera) -> bool {
		let (width, height) = self.element.size();
		if width == self.width && height == self.height {
			return false;
		}
		debug!("graph-view: viewport {}x{} -> {}x{}", self.width, self.height, width, height);
		camera.resize(width, height);
		camera.center();
		self.resize(width, height);
		true
	}

	/// Pointer cursor while a node is hovered.
	pub fn set_cursor(&self, hovered: bool) {
		self.element
			.set_cursor(if hovered { "pointer" } else { "default" });
	}

	fn post(&self, message: RenderMessage) {
		let kind = message.kind();
		if self.tx.send(message).is_err() && !self.disconnected.replace(true) {
			warn!("graph-view: render context gone, dropping {} and later messages", kind);
		}
	}
}
