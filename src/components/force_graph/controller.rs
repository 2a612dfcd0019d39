//! Per-frame orchestration of the graph view.
//!
//! [`LoopController`] is the session object. It owns the simulation bridge,
//! the camera, the render proxy, and the interaction and quality state, and
//! it is the only thing the host talks to: input events go in through the
//! `on_*` methods and each accepted frame runs [`LoopController::tick`].
//!
//! Quality adaptation closes the loop on frame-rate. When the smoothed rate
//! drops below 80% of the target the physics engine integrates a smaller
//! fraction of nodes per step; above 120% it integrates more. Repulsion is
//! divided by the batch fraction so the layout keeps its balance.

use log::{debug, info};

use super::camera::{Camera, CameraConfig, Vec2};
use super::physics::StepInput;
use super::proxy::{RenderProxy, StaticGraphData};
use super::render::Surface;
use super::state::{SeedConfig, SimulationBridge};
use super::storage::DEFAULT_SLOT;
use super::theme::Palette;

/// Frame pacing, quality adaptation and scroll inertia settings.
#[derive(Clone, Debug)]
pub struct LoopConfig {
	/// Frame cap and the rate quality adaptation aims for.
	pub target_fps: f64,
	/// Lowest batch fraction quality adaptation may choose.
	pub min_batch_fraction: f64,
	/// Weight of history in the frame-rate moving average.
	pub fps_smoothing: f64,
	/// Per-tick decay of scroll momentum.
	pub momentum_decay: f64,
	/// Momentum below this magnitude snaps to rest.
	pub momentum_rest: f64,
	/// Minimum momentum magnitude after a wheel event, before amplification.
	pub wheel_floor: f64,
	/// Amplification applied per wheel event.
	pub wheel_gain: f64,
}

impl Default for LoopConfig {
	fn default() -> Self {
		Self {
			target_fps: 40.0,
			min_batch_fraction: 0.3,
			fps_smoothing: 0.95,
			momentum_decay: 0.65,
			momentum_rest: 0.001,
			wheel_floor: 0.09,
			wheel_gain: 1.4,
		}
	}
}

/// All view configuration that does not come from the page data.
#[derive(Clone, Debug)]
pub struct ViewConfig {
	/// Zoom limits.
	pub camera: CameraConfig,
	/// Frame pacing and quality adaptation.
	pub looping: LoopConfig,
	/// Spiral used when no stored layout applies.
	pub seed: SeedConfig,
	/// Layout storage slot.
	pub slot: String,
}

impl Default for ViewConfig {
	fn default() -> Self {
		Self {
			camera: CameraConfig::default(),
			looping: LoopConfig::default(),
			seed: SeedConfig::default(),
			slot: DEFAULT_SLOT.to_string(),
		}
	}
}

/// Caps ticks at a target rate and measures the rate of accepted ticks.
#[derive(Clone, Debug)]
pub struct FrameClock {
	target_fps: f64,
	last_ms: Option<f64>,
}

/// Early callbacks within this many milliseconds of the frame interval still count.
const FRAME_SLACK_MS: f64 = 1.0;

impl FrameClock {
	pub fn new(target_fps: f64) -> Self {
		Self {
			target_fps,
			last_ms: None,
		}
	}

	/// `Some(measured_fps)` if a frame should run at `now_ms`, `None` to skip.
	/// The first frame after creation or [`reset`](Self::reset) reports the target rate.
	pub fn tick(&mut self, now_ms: f64) -> Option<f64> {
		let Some(last) = self.last_ms else {
			self.last_ms = Some(now_ms);
			return Some(self.target_fps);
		};
		let elapsed = now_ms - last;
		if elapsed + FRAME_SLACK_MS < 1000.0 / self.target_fps {
			return None;
		}
		self.last_ms = Some(now_ms);
		Some(1000.0 / elapsed.max(f64::EPSILON))
	}

	/// Forget the last frame time, so a pause is not measured as one long frame.
	pub fn reset(&mut self) {
		self.last_ms = None;
	}
}

/// Smoothed frame-rate and the batch fraction derived from it.
#[derive(Clone, Debug)]
pub struct QualityGovernor {
	batch_fraction: f64,
	average_fps: f64,
	target_fps: f64,
	min_batch_fraction: f64,
	smoothing: f64,
}

impl QualityGovernor {
	pub fn new(config: &LoopConfig) -> Self {
		Self {
			batch_fraction: 1.0,
			average_fps: 2.0 * config.target_fps,
			target_fps: config.target_fps,
			min_batch_fraction: config.min_batch_fraction,
			smoothing: config.fps_smoothing,
		}
	}

	pub fn batch_fraction(&self) -> f64 {
		self.batch_fraction
	}

	pub fn average_fps(&self) -> f64 {
		self.average_fps
	}

	/// Fold one measured frame-rate into the moving average.
	pub fn observe(&mut self, measured_fps: f64) {
		self.average_fps = self.smoothing * self.average_fps + (1.0 - self.smoothing) * measured_fps;
	}

	/// Move the batch fraction one step if the average is outside the
	/// 0.8x..1.2x band. Returns the new fraction when it changed.
	pub fn adapt(&mut self) -> Option<f64> {
		let step = 0.5 / self.target_fps;
		let before = self.batch_fraction;
		if self.average_fps < 0.8 * self.target_fps && self.batch_fraction > self.min_batch_fraction {
			self.batch_fraction = (self.batch_fraction - step).max(self.min_batch_fraction);
		} else if self.average_fps > 1.2 * self.target_fps && self.batch_fraction < 1.0 {
			self.batch_fraction = (self.batch_fraction + step).min(1.0);
		}
		(self.batch_fraction != before).then_some(self.batch_fraction)
	}
}

/// Pointer, hover, grab and scroll state.
#[derive(Clone, Debug, Default)]
pub struct InteractionState {
	pub hovered: Option<usize>,
	pub grabbed: Option<usize>,
	/// Pointer in world space; `None` until the first move and after leaving.
	pub pointer: Option<Vec2>,
	/// Fractional zoom applied per tick, decaying toward rest.
	pub momentum: f64,
	/// Last screen position of an in-progress background pan.
	pan_anchor: Option<Vec2>,
}

impl InteractionState {
	/// Accumulate one wheel event. Positive `delta_y` zooms out.
	pub fn push_wheel(&mut self, delta_y: f64, config: &LoopConfig) {
		if delta_y > 0.0 {
			self.momentum = self.momentum.min(-config.wheel_floor);
		} else {
			self.momentum = self.momentum.max(config.wheel_floor);
		}
		self.momentum *= config.wheel_gain;
	}
}

/// The graph view session.
pub struct LoopController {
	bridge: SimulationBridge,
	camera: Camera,
	proxy: RenderProxy,
	interaction: InteractionState,
	quality: QualityGovernor,
	config: LoopConfig,
	base_repulsion: f32,
	visible: bool,
	published_camera: Option<(Vec2, f64)>,
}

impl LoopController {
	/// Start a session: hand the surface to the rendering context, fit the
	/// camera to the starting layout, and push initial colors.
	pub fn new(
		bridge: SimulationBridge,
		mut proxy: RenderProxy,
		static_data: StaticGraphData,
		surface: Box<dyn Surface>,
		palette: Palette,
		base_repulsion: f32,
		config: &ViewConfig,
	) -> Self {
		proxy.initialize(static_data, surface);
		let (width, height) = proxy.size();
		let mut camera = Camera::new(width, height, config.camera.clone());
		camera.fit_to_rect(&bridge.fit_bounds());
		proxy.update_colors(palette);

		let mut controller = Self {
			bridge,
			camera,
			proxy,
			interaction: InteractionState::default(),
			quality: QualityGovernor::new(&config.looping),
			config: config.looping.clone(),
			base_repulsion,
			visible: true,
			published_camera: None,
		};
		controller.apply_batch_fraction(controller.quality.batch_fraction());
		controller.publish_camera();
		info!(
			"graph-view: session started, {} nodes, scale {:.3}",
			controller.bridge.node_count(),
			controller.camera.scale()
		);
		controller
	}

	pub fn is_visible(&self) -> bool {
		self.visible
	}

	/// Run one frame. Does nothing while hidden; returns whether a step ran.
	pub fn tick(&mut self, measured_fps: f64) -> bool {
		if !self.visible {
			return false;
		}

		let input = StepInput {
			pointer: self.interaction.pointer,
			grabbed: self.interaction.grabbed,
			camera_scale: self.camera.scale(),
		};
		let hovered = self.bridge.step(&input);
		if hovered != self.interaction.hovered {
			self.interaction.hovered = hovered;
			self.proxy
				.update_interaction(hovered, self.interaction.grabbed);
			self.proxy.set_cursor(hovered.is_some());
		}

		self.proxy.auto_resize_canvas(&mut self.camera);
		self.publish_camera();
		self.proxy.draw(self.bridge.snapshot_positions().to_vec());

		self.quality.observe(measured_fps);
		if let Some(fraction) = self.quality.adapt() {
			debug!(
				"graph-view: batch fraction {:.3} at {:.1} fps",
				fraction,
				self.quality.average_fps()
			);
			self.apply_batch_fraction(fraction);
		}

		self.apply_momentum();
		self.publish_camera();
		true
	}

	/// Zoom by `delta` (fractional scale change) keeping the pointer's world
	/// point roughly fixed on screen. At a zoom limit the center stays put.
	pub fn zoom_around_point(&mut self, delta: f64) {
		let center = self.camera.center_world();
		let scale = self
			.camera
			.set_scale(self.camera.scale() + delta * self.camera.scale());
		match self.interaction.pointer {
			Some(pointer) if !self.camera.at_scale_limit(scale) => {
				self.camera.set_center_world(Vec2::new(
					center.x + (pointer.x - center.x) * delta,
					center.y + (pointer.y - center.y) * delta,
				));
			}
			_ => self.camera.set_center_world(center),
		}
	}

	pub fn on_wheel(&mut self, delta_y: f64) {
		self.interaction.push_wheel(delta_y, &self.config);
	}

	/// Fit the camera to the starting layout.
	pub fn on_double_click(&mut self) {
		self.camera.fit_to_rect(&self.bridge.fit_bounds());
		self.publish_camera();
	}

	/// Grab the hovered node, or start panning the background.
	pub fn on_pointer_down(&mut self, screen: Vec2) {
		self.interaction.pointer = Some(self.camera.screen_to_world(screen));
		match self.interaction.hovered {
			Some(node) => {
				self.interaction.grabbed = Some(node);
				self.proxy
					.update_interaction(self.interaction.hovered, Some(node));
			}
			None => self.interaction.pan_anchor = Some(screen),
		}
	}

	pub fn on_pointer_move(&mut self, screen: Vec2) {
		if let Some(anchor) = self.interaction.pan_anchor {
			self.camera.pan_by(screen.x - anchor.x, screen.y - anchor.y);
			self.interaction.pan_anchor = Some(screen);
			self.publish_camera();
		}
		self.interaction.pointer = Some(self.camera.screen_to_world(screen));
	}

	/// Release a grabbed node (persisting the layout) or end a pan.
	pub fn on_pointer_up(&mut self) {
		self.interaction.pan_anchor = None;
		if self.interaction.grabbed.take().is_some() {
			self.proxy.update_interaction(self.interaction.hovered, None);
			self.bridge.persist();
		}
	}

	pub fn on_pointer_leave(&mut self) {
		self.on_pointer_up();
		self.interaction.pointer = None;
	}

	/// Enable or disable the loop. Becoming visible refits the viewport size
	/// and recenters; nothing is simulated while hidden.
	pub fn set_visible(&mut self, visible: bool) {
		if visible == self.visible {
			return;
		}
		self.visible = visible;
		if visible {
			self.proxy.auto_resize_canvas(&mut self.camera);
			self.camera.center();
			self.publish_camera();
			info!("graph-view: resumed");
		} else {
			info!("graph-view: paused");
		}
	}

	pub fn set_palette(&mut self, palette: Palette) {
		self.proxy.update_colors(palette);
	}

	/// Mark the node for the current page.
	pub fn set_active(&mut self, node: Option<usize>) {
		self.proxy.set_active(node);
	}

	pub fn persist(&mut self) {
		self.bridge.persist();
	}

	/// End the session and free the simulation.
	pub fn release(self) {
		self.bridge.release();
	}

	/// Persist the layout, then release. Used when the view is torn down.
	pub fn shutdown(mut self) {
		self.persist();
		self.release();
	}

	fn apply_momentum(&mut self) {
		let momentum = self.interaction.momentum;
		if momentum == 0.0 {
			return;
		}
		if momentum.abs() < self.config.momentum_rest {
			self.interaction.momentum = 0.0;
			return;
		}
		self.zoom_around_point(momentum);
		self.interaction.momentum *= self.config.momentum_decay;
	}

	fn apply_batch_fraction(&mut self, fraction: f64) {
		let engine = self.bridge.engine_mut();
		engine.set_batch_fraction(fraction as f32);
		engine.set_repulsion_force(self.base_repulsion / fraction as f32);
	}

	fn publish_camera(&mut self) {
		let current = (self.camera.offset(), self.camera.scale());
		if self.published_camera != Some(current) {
			self.proxy.update_camera(current.0, current.1);
			self.published_camera = Some(current);
		}
	}
}
