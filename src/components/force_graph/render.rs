//! Rendering context: the receiving side of the rendering pipeline.
//!
//! A [`RenderContext`] drains its inbox on its own schedule, keeps the latest
//! camera, interaction and color state, and paints every queued frame through
//! a [`Surface`]. [`CanvasSurface`] paints to a 2D canvas in multiple passes
//! for correct z-ordering:
//! 1. Background (screen space)
//! 2. Links (world space)
//! 3. Plain nodes, then hovered/grabbed/active nodes on top
//! 4. Labels

use std::f64::consts::PI;

use flume::Receiver;
use log::{debug, info, warn};
use wasm_bindgen::JsCast;
use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement};

use super::camera::Vec2;
use super::error::GraphError;
use super::proxy::{RenderMessage, StaticGraphData};
use super::theme::Palette;

/// Zoom level at which every label is drawn, not just those near the hovered node.
pub const LABEL_SCALE: f64 = 1.6;

/// Everything needed to paint one frame.
pub struct Frame<'a> {
	pub graph: &'a StaticGraphData,
	pub positions: &'a [f32],
	pub offset: Vec2,
	pub scale: f64,
	pub width: f64,
	pub height: f64,
	pub hovered: Option<usize>,
	pub grabbed: Option<usize>,
	pub active: Option<usize>,
	pub palette: &'a Palette,
	neighbors: &'a [Vec<usize>],
}

impl Frame<'_> {
	pub fn node_position(&self, node: usize) -> Option<(f64, f64)> {
		let x = *self.positions.get(2 * node)?;
		let y = *self.positions.get(2 * node + 1)?;
		Some((x as f64, y as f64))
	}

	/// Hovered, grabbed, or active.
	pub fn is_highlighted(&self, node: usize) -> bool {
		[self.hovered, self.grabbed, self.active].contains(&Some(node))
	}

	pub fn label_visible(&self, node: usize) -> bool {
		if self.scale >= LABEL_SCALE || self.is_highlighted(node) {
			return true;
		}
		self.hovered
			.and_then(|h| self.neighbors.get(h))
			.is_some_and(|n| n.contains(&node))
	}

	/// Number of links drawn after edge pruning.
	pub fn visible_links(&self) -> usize {
		let total = self.graph.link_sources.len().min(self.graph.link_targets.len());
		let fraction = (self.graph.edge_pruning as f64 / 100.0).clamp(0.0, 1.0);
		(total as f64 * fraction).ceil() as usize
	}
}

/// Something frames can be painted on.
pub trait Surface {
	fn resize(&mut self, width: f64, height: f64);
	fn paint(&mut self, frame: &Frame<'_>);
}

struct Scene {
	graph: StaticGraphData,
	surface: Box<dyn Surface>,
	neighbors: Vec<Vec<usize>>,
	width: f64,
	height: f64,
	offset: Vec2,
	scale: f64,
	hovered: Option<usize>,
	grabbed: Option<usize>,
	active: Option<usize>,
	palette: Palette,
}

impl Scene {
	fn new(graph: StaticGraphData, width: f64, height: f64, mut surface: Box<dyn Surface>) -> Self {
		let mut neighbors = vec![Vec::new(); graph.node_count];
		for (&s, &t) in graph.link_sources.iter().zip(&graph.link_targets) {
			let (s, t) = (s as usize, t as usize);
			if s < graph.node_count && t < graph.node_count {
				neighbors[s].push(t);
				neighbors[t].push(s);
			}
		}
		surface.resize(width, height);
		Self {
			graph,
			surface,
			neighbors,
			width,
			height,
			offset: Vec2::new(width / 2.0, height / 2.0),
			scale: 1.0,
			hovered: None,
			grabbed: None,
			active: None,
			palette: Palette::default(),
		}
	}

	fn paint(&mut self, positions: &[f32]) {
		let frame = Frame {
			graph: &self.graph,
			positions,
			offset: self.offset,
			scale: self.scale,
			width: self.width,
			height: self.height,
			hovered: self.hovered,
			grabbed: self.grabbed,
			active: self.active,
			palette: &self.palette,
			neighbors: &self.neighbors,
		};
		self.surface.paint(&frame);
	}
}

/// Receiving half of the rendering pipeline.
pub struct RenderContext {
	inbox: Receiver<RenderMessage>,
	scene: Option<Scene>,
}

impl RenderContext {
	pub(crate) fn new(inbox: Receiver<RenderMessage>) -> Self {
		Self { inbox, scene: None }
	}

	#[cfg(test)]
	pub(crate) fn inbox(&self) -> &Receiver<RenderMessage> {
		&self.inbox
	}

	/// Apply every queued message in order. Returns the number of frames painted.
	pub fn pump(&mut self) -> usize {
		let mut painted = 0;
		while let Ok(message) = self.inbox.try_recv() {
			if self.handle(message) {
				painted += 1;
			}
		}
		painted
	}

	/// Returns `true` when the message painted a frame.
	fn handle(&mut self, message: RenderMessage) -> bool {
		let Some(scene) = self.scene.as_mut() else {
			match message {
				RenderMessage::Init {
					graph,
					viewport,
					surface,
				} => {
					info!("graph-view: render context received {} nodes", graph.node_count);
					self.scene = Some(Scene::new(graph, viewport.width, viewport.height, surface));
				}
				other => debug!("graph-view: {} before init, ignored", other.kind()),
			}
			return false;
		};

		match message {
			RenderMessage::Draw { positions } => {
				scene.paint(&positions);
				return true;
			}
			RenderMessage::Resize { width, height } => {
				scene.width = width;
				scene.height = height;
				scene.surface.resize(width, height);
			}
			RenderMessage::UpdateCamera { offset, scale } => {
				scene.offset = offset;
				scene.scale = scale;
			}
			RenderMessage::UpdateInteraction { hovered, grabbed } => {
				scene.hovered = hovered;
				scene.grabbed = grabbed;
			}
			RenderMessage::UpdateColors(palette) => scene.palette = palette,
			RenderMessage::SetActive(node) => scene.active = node,
			RenderMessage::Init { .. } => {
				warn!("graph-view: render context already initialized, ignoring init");
			}
		}
		false
	}
}

/// [`Surface`] over an HTML canvas 2D context.
pub struct CanvasSurface {
	canvas: HtmlCanvasElement,
	ctx: CanvasRenderingContext2d,
}

impl CanvasSurface {
	pub fn new(canvas: HtmlCanvasElement) -> Result<Self, GraphError> {
		let ctx = canvas
			.get_context("2d")
			.map_err(|e| GraphError::SurfaceUnavailable(format!("{:?}", e)))?
			.ok_or_else(|| GraphError::SurfaceUnavailable("no 2d context".into()))?
			.dyn_into::<CanvasRenderingContext2d>()
			.map_err(|_| GraphError::SurfaceUnavailable("unexpected context type".into()))?;
		Ok(Self { canvas, ctx })
	}
}

impl Surface for CanvasSurface {
	fn resize(&mut self, width: f64, height: f64) {
		self.canvas.set_width(width.max(1.0) as u32);
		self.canvas.set_height(height.max(1.0) as u32);
	}

	fn paint(&mut self, frame: &Frame<'_>) {
		let ctx = &self.ctx;
		ctx.set_fill_style_str(&frame.palette.background.to_css());
		ctx.fill_rect(0.0, 0.0, frame.width, frame.height);

		ctx.save();
		let _ = ctx.translate(frame.offset.x, frame.offset.y);
		let _ = ctx.scale(frame.scale, frame.scale);

		draw_links(ctx, frame);
		draw_nodes(ctx, frame, false);
		draw_nodes(ctx, frame, true);
		draw_labels(ctx, frame);

		ctx.restore();
	}
}

fn draw_links(ctx: &CanvasRenderingContext2d, frame: &Frame<'_>) {
	let links = frame
		.graph
		.link_sources
		.iter()
		.zip(&frame.graph.link_targets)
		.take(frame.visible_links());

	ctx.set_stroke_style_str(&frame.palette.link.to_css());
	ctx.set_line_width(1.0 / frame.scale);
	ctx.begin_path();
	for (&s, &t) in links {
		let (Some((x1, y1)), Some((x2, y2))) = (
			frame.node_position(s as usize),
			frame.node_position(t as usize),
		) else {
			continue;
		};
		ctx.move_to(x1, y1);
		ctx.line_to(x2, y2);
	}
	ctx.stroke();
}

fn draw_nodes(ctx: &CanvasRenderingContext2d, frame: &Frame<'_>, highlighted: bool) {
	let palette = frame.palette;
	let fill = if highlighted { palette.accent } else { palette.node };
	ctx.set_fill_style_str(&fill.to_css());
	ctx.set_stroke_style_str(&palette.outline.to_css());
	ctx.set_line_width(1.0 / frame.scale);

	for node in 0..frame.graph.node_count {
		if frame.is_highlighted(node) != highlighted {
			continue;
		}
		let Some((x, y)) = frame.node_position(node) else {
			continue;
		};
		let radius = frame.graph.radii.get(node).copied().unwrap_or(1.0) as f64;
		ctx.begin_path();
		let _ = ctx.arc(x, y, radius, 0.0, 2.0 * PI);
		ctx.fill();
		ctx.stroke();
	}
}

fn draw_labels(ctx: &CanvasRenderingContext2d, frame: &Frame<'_>) {
	let font_px = 12.0 / frame.scale.max(0.5);
	ctx.set_font(&format!("{}px sans-serif", font_px));
	ctx.set_fill_style_str(&frame.palette.text.to_css());
	ctx.set_text_align("center");

	for (node, label) in frame.graph.labels.iter().enumerate() {
		if label.is_empty() || !frame.label_visible(node) {
			continue;
		}
		let Some((x, y)) = frame.node_position(node) else {
			continue;
		};
		let radius = frame.graph.radii.get(node).copied().unwrap_or(1.0) as f64;
		let _ = ctx.fill_text(label, x, y + radius + font_px);
	}
}

#[cfg(test)]
pub(crate) mod tests {
	use std::cell::RefCell;
	use std::rc::Rc;

	use super::*;
	use crate::components::force_graph::proxy::ViewportOptions;
	use crate::components::force_graph::theme::Color;

	/// What a [`RecordingSurface`] saw for one painted frame.
	#[derive(Clone, Debug, PartialEq)]
	pub(crate) struct PaintedFrame {
		pub positions: Vec<f32>,
		pub scale: f64,
		pub size: (f64, f64),
		pub hovered: Option<usize>,
		pub active: Option<usize>,
		pub accent: Color,
		pub labels: Vec<usize>,
	}

	#[derive(Clone, Default)]
	pub(crate) struct RecordingSurface {
		pub frames: Rc<RefCell<Vec<PaintedFrame>>>,
		pub resizes: Rc<RefCell<Vec<(f64, f64)>>>,
	}

	impl Surface for RecordingSurface {
		fn resize(&mut self, width: f64, height: f64) {
			self.resizes.borrow_mut().push((width, height));
		}

		fn paint(&mut self, frame: &Frame<'_>) {
			self.frames.borrow_mut().push(PaintedFrame {
				positions: frame.positions.to_vec(),
				scale: frame.scale,
				size: (frame.width, frame.height),
				hovered: frame.hovered,
				active: frame.active,
				accent: frame.palette.accent,
				labels: (0..frame.graph.node_count)
					.filter(|&n| frame.label_visible(n))
					.collect(),
			});
		}
	}

	fn static_data() -> StaticGraphData {
		StaticGraphData {
			node_count: 4,
			link_sources: vec![0, 1],
			link_targets: vec![1, 2],
			radii: vec![3.0; 4],
			labels: vec!["a".into(), "b".into(), "c".into(), "d".into()],
			edge_pruning: 100.0,
		}
	}

	fn context() -> (flume::Sender<RenderMessage>, RenderContext, RecordingSurface) {
		let (tx, rx) = flume::unbounded();
		let surface = RecordingSurface::default();
		tx.send(RenderMessage::Init {
			graph: static_data(),
			viewport: ViewportOptions {
				width: 640.0,
				height: 480.0,
			},
			surface: Box::new(surface.clone()),
		})
		.unwrap();
		(tx, RenderContext::new(rx), surface)
	}

	#[test]
	fn paints_every_queued_frame_in_order() {
		let (tx, mut context, surface) = context();
		tx.send(RenderMessage::Draw { positions: vec![1.0; 8] }).unwrap();
		tx.send(RenderMessage::UpdateCamera {
			offset: Vec2::new(5.0, 5.0),
			scale: 2.0,
		})
		.unwrap();
		tx.send(RenderMessage::Draw { positions: vec![2.0; 8] }).unwrap();

		assert_eq!(context.pump(), 2);
		let frames = surface.frames.borrow();
		assert_eq!(frames[0].positions, vec![1.0; 8]);
		assert_eq!(frames[0].scale, 1.0);
		assert_eq!(frames[1].positions, vec![2.0; 8]);
		assert_eq!(frames[1].scale, 2.0);
		assert_eq!(surface.resizes.borrow().as_slice(), &[(640.0, 480.0)]);
	}

	#[test]
	fn messages_before_init_are_ignored() {
		let (tx, rx) = flume::unbounded();
		let mut context = RenderContext::new(rx);
		tx.send(RenderMessage::Draw { positions: vec![0.0; 8] }).unwrap();
		tx.send(RenderMessage::SetActive(Some(1))).unwrap();
		assert_eq!(context.pump(), 0);
		assert!(context.scene.is_none());
	}

	#[test]
	fn state_messages_apply_to_next_frame() {
		let (tx, mut context, surface) = context();
		tx.send(RenderMessage::Resize {
			width: 100.0,
			height: 50.0,
		})
		.unwrap();
		tx.send(RenderMessage::UpdateInteraction {
			hovered: Some(1),
			grabbed: None,
		})
		.unwrap();
		tx.send(RenderMessage::SetActive(Some(3))).unwrap();
		let mut palette = Palette::default();
		palette.accent = Color::rgb(1, 2, 3);
		tx.send(RenderMessage::UpdateColors(palette)).unwrap();
		tx.send(RenderMessage::Draw { positions: vec![0.0; 8] }).unwrap();

		assert_eq!(context.pump(), 1);
		let frame = surface.frames.borrow()[0].clone();
		assert_eq!(frame.size, (100.0, 50.0));
		assert_eq!(frame.hovered, Some(1));
		assert_eq!(frame.active, Some(3));
		assert_eq!(frame.accent, Color::rgb(1, 2, 3));
		// hovered node, its two neighbours, and the active node
		assert_eq!(frame.labels, vec![0, 1, 2, 3]);
	}

	#[test]
	fn labels_follow_hover_until_zoomed_in() {
		let (tx, mut context, surface) = context();
		tx.send(RenderMessage::UpdateInteraction {
			hovered: Some(0),
			grabbed: None,
		})
		.unwrap();
		tx.send(RenderMessage::Draw { positions: vec![0.0; 8] }).unwrap();
		tx.send(RenderMessage::UpdateCamera {
			offset: Vec2::default(),
			scale: LABEL_SCALE,
		})
		.unwrap();
		tx.send(RenderMessage::Draw { positions: vec![0.0; 8] }).unwrap();
		context.pump();
		let frames = surface.frames.borrow();
		assert_eq!(frames[0].labels, vec![0, 1]);
		assert_eq!(frames[1].labels, vec![0, 1, 2, 3]);
	}

	#[test]
	fn edge_pruning_limits_links() {
		let mut graph = static_data();
		let neighbors = vec![Vec::new(); 4];
		let palette = Palette::default();
		graph.edge_pruning = 50.0;
		let frame = Frame {
			graph: &graph,
			positions: &[0.0; 8],
			offset: Vec2::default(),
			scale: 1.0,
			width: 1.0,
			height: 1.0,
			hovered: None,
			grabbed: None,
			active: None,
			palette: &palette,
			neighbors: &neighbors,
		};
		assert_eq!(frame.visible_links(), 1);
	}

	#[test]
	fn second_init_is_ignored() {
		let (tx, mut context, surface) = context();
		tx.send(RenderMessage::Init {
			graph: static_data(),
			viewport: ViewportOptions {
				width: 1.0,
				height: 1.0,
			},
			surface: Box::new(RecordingSurface::default()),
		})
		.unwrap();
		tx.send(RenderMessage::Draw { positions: vec![0.0; 8] }).unwrap();
		assert_eq!(context.pump(), 1);
		assert_eq!(surface.frames.borrow()[0].size, (640.0, 480.0));
	}
}
