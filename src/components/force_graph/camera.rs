//! Camera transform between world space and screen space.
//!
//! # Coordinate Spaces
//!
//! - **World-space**: the simulation's coordinate system. Node positions live here.
//! - **Screen-space**: device pixels on the canvas, origin at the top-left corner.
//!
//! The mapping is `screen = world * scale + offset`. `offset` is a pixel
//! translation, `scale` a uniform zoom factor clamped to
//! [`CameraConfig::min_scale`]..=[`CameraConfig::max_scale`].

/// Smallest extent (world units, per axis) used when fitting bounds, so a
/// single node or a line of nodes never divides by zero.
pub const MIN_EXTENT: f64 = 1.0;

/// A 2D point or vector.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Vec2 {
	/// Horizontal component.
	pub x: f64,
	/// Vertical component, growing downward on screen.
	pub y: f64,
}

impl Vec2 {
	/// Point at `(x, y)`.
	pub const fn new(x: f64, y: f64) -> Self {
		Self { x, y }
	}
}

/// Axis-aligned rectangle in world space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bounds {
	/// Left edge.
	pub min_x: f64,
	/// Top edge.
	pub min_y: f64,
	/// Right edge.
	pub max_x: f64,
	/// Bottom edge.
	pub max_y: f64,
}

impl Bounds {
	/// An empty rectangle that any included point replaces.
	pub fn empty() -> Self {
		Self {
			min_x: f64::INFINITY,
			min_y: f64::INFINITY,
			max_x: f64::NEG_INFINITY,
			max_y: f64::NEG_INFINITY,
		}
	}

	/// Union of all points in a flat `[x0, y0, x1, y1, ..]` buffer.
	pub fn from_positions(positions: &[f32]) -> Self {
		let mut bounds = Self::empty();
		for xy in positions.chunks_exact(2) {
			bounds.include_point(xy[0] as f64, xy[1] as f64);
		}
		bounds
	}

	/// True until a point has been included.
	pub fn is_empty(&self) -> bool {
		self.min_x > self.max_x || self.min_y > self.max_y
	}

	/// Grow to contain `(x, y)`.
	pub fn include_point(&mut self, x: f64, y: f64) {
		self.min_x = self.min_x.min(x);
		self.max_x = self.max_x.max(x);
		self.min_y = self.min_y.min(y);
		self.max_y = self.max_y.max(y);
	}

	/// Grow by `margin` on every side.
	pub fn expanded(self, margin: f64) -> Self {
		Self {
			min_x: self.min_x - margin,
			min_y: self.min_y - margin,
			max_x: self.max_x + margin,
			max_y: self.max_y + margin,
		}
	}

	/// Width, floored at [`MIN_EXTENT`].
	pub fn width(&self) -> f64 {
		(self.max_x - self.min_x).max(MIN_EXTENT)
	}

	/// Height, floored at [`MIN_EXTENT`].
	pub fn height(&self) -> f64 {
		(self.max_y - self.min_y).max(MIN_EXTENT)
	}

	/// Midpoint of the rectangle.
	pub fn center(&self) -> Vec2 {
		Vec2::new(
			(self.min_x + self.max_x) / 2.0,
			(self.min_y + self.max_y) / 2.0,
		)
	}
}

/// Zoom limits.
#[derive(Clone, Debug)]
pub struct CameraConfig {
	/// Smallest zoom factor.
	pub min_scale: f64,
	/// Largest zoom factor.
	pub max_scale: f64,
}

impl Default for CameraConfig {
	fn default() -> Self {
		Self {
			min_scale: 0.15,
			max_scale: 15.0,
		}
	}
}

/// Camera state for one viewport.
#[derive(Clone, Debug)]
pub struct Camera {
	offset: Vec2,
	scale: f64,
	width: f64,
	height: f64,
	config: CameraConfig,
}

impl Camera {
	/// Camera for a `width` x `height` viewport with the world origin at its
	/// center and a scale of 1.
	pub fn new(width: f64, height: f64, config: CameraConfig) -> Self {
		let mut camera = Self {
			offset: Vec2::default(),
			scale: 1.0,
			width,
			height,
			config,
		};
		camera.center();
		camera
	}

	/// Pixel translation applied after scaling.
	pub fn offset(&self) -> Vec2 {
		self.offset
	}

	/// Current zoom factor.
	pub fn scale(&self) -> f64 {
		self.scale
	}

	/// Viewport size in device pixels.
	pub fn viewport(&self) -> (f64, f64) {
		(self.width, self.height)
	}

	/// Clamp `scale` into the configured range.
	pub fn clamp_scale(&self, scale: f64) -> f64 {
		scale.clamp(self.config.min_scale, self.config.max_scale)
	}

	/// Set the zoom factor, clamped. Returns the scale actually applied.
	pub fn set_scale(&mut self, scale: f64) -> f64 {
		self.scale = self.clamp_scale(scale);
		self.scale
	}

	/// Whether `scale` sits on either clamp boundary.
	pub fn at_scale_limit(&self, scale: f64) -> bool {
		scale <= self.config.min_scale || scale >= self.config.max_scale
	}

	/// Adopt a new viewport size. Offset and scale are left alone.
	pub fn resize(&mut self, width: f64, height: f64) {
		self.width = width;
		self.height = height;
	}

	/// Put the world origin at the viewport center, keeping the scale.
	pub fn center(&mut self) {
		self.offset = Vec2::new(self.width / 2.0, self.height / 2.0);
	}

	/// Zoom and pan so `bounds` spans the viewport along the axis where it is
	/// relatively smallest, with its center on the viewport center.
	pub fn fit_to_rect(&mut self, bounds: &Bounds) {
		if bounds.is_empty() {
			return;
		}
		let (w, h) = (bounds.width(), bounds.height());
		let scale = 1.0 / (w / self.width).min(h / self.height);
		self.set_scale(scale);
		let center = bounds.center();
		self.offset = Vec2::new(
			self.width / 2.0 - center.x * self.scale,
			self.height / 2.0 - center.y * self.scale,
		);
	}

	/// World to screen. With `snap`, coordinates are floored to whole pixels.
	pub fn world_to_screen(&self, point: Vec2, snap: bool) -> Vec2 {
		let x = point.x * self.scale + self.offset.x;
		let y = point.y * self.scale + self.offset.y;
		if snap {
			Vec2::new(x.floor(), y.floor())
		} else {
			Vec2::new(x, y)
		}
	}

	/// Inverse of [`Camera::world_to_screen`] without snapping.
	pub fn screen_to_world(&self, point: Vec2) -> Vec2 {
		Vec2::new(
			(point.x - self.offset.x) / self.scale,
			(point.y - self.offset.y) / self.scale,
		)
	}

	/// World point currently under the viewport center.
	pub fn center_world(&self) -> Vec2 {
		self.screen_to_world(Vec2::new(self.width / 2.0, self.height / 2.0))
	}

	/// Move the camera so `point` sits under the viewport center.
	pub fn set_center_world(&mut self, point: Vec2) {
		self.offset = Vec2::new(
			self.width / 2.0 - point.x * self.scale,
			self.height / 2.0 - point.y * self.scale,
		);
	}

	/// Translate the view by a screen-space delta.
	pub fn pan_by(&mut self, dx: f64, dy: f64) {
		self.offset.x += dx;
		self.offset.y += dy;
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn camera() -> Camera {
		Camera::new(800.0, 600.0, CameraConfig::default())
	}

	#[test]
	fn new_camera_centers_origin() {
		let cam = camera();
		assert_eq!(cam.world_to_screen(Vec2::default(), true), Vec2::new(400.0, 300.0));
		assert_eq!(cam.scale(), 1.0);
	}

	#[test]
	fn fit_to_rect_scale_follows_smaller_ratio() {
		let mut cam = camera();
		let bounds = Bounds {
			min_x: -100.0,
			min_y: -50.0,
			max_x: 100.0,
			max_y: 50.0,
		};
		cam.fit_to_rect(&bounds);
		// 1 / min(200/800, 100/600) = 6
		assert!((cam.scale() - 6.0).abs() < 1e-9);
		assert_eq!(cam.offset(), Vec2::new(400.0, 300.0));
	}

	#[test]
	fn fit_to_rect_centers_bounds() {
		let mut cam = camera();
		let bounds = Bounds {
			min_x: 0.0,
			min_y: 0.0,
			max_x: 200.0,
			max_y: 100.0,
		};
		cam.fit_to_rect(&bounds);
		let center = cam.world_to_screen(Vec2::new(100.0, 50.0), false);
		assert!((center.x - 400.0).abs() < 1e-9);
		assert!((center.y - 300.0).abs() < 1e-9);
	}

	#[test]
	fn fit_to_rect_is_idempotent() {
		let mut cam = camera();
		let bounds = Bounds {
			min_x: -37.0,
			min_y: 12.0,
			max_x: 140.0,
			max_y: 95.5,
		};
		cam.fit_to_rect(&bounds);
		let (offset, scale) = (cam.offset(), cam.scale());
		cam.fit_to_rect(&bounds);
		assert_eq!(cam.offset(), offset);
		assert_eq!(cam.scale(), scale);
	}

	#[test]
	fn fit_to_degenerate_rect_is_finite_and_clamped() {
		let mut cam = camera();
		let bounds = Bounds {
			min_x: 5.0,
			min_y: 5.0,
			max_x: 5.0,
			max_y: 5.0,
		};
		cam.fit_to_rect(&bounds);
		assert!(cam.scale().is_finite());
		assert_eq!(cam.scale(), 15.0);
		assert!(cam.offset().x.is_finite());
	}

	#[test]
	fn fit_to_empty_rect_does_nothing() {
		let mut cam = camera();
		cam.set_scale(2.0);
		cam.fit_to_rect(&Bounds::empty());
		assert_eq!(cam.scale(), 2.0);
	}

	#[test]
	fn screen_world_roundtrip_within_snap() {
		for &scale in &[0.15, 0.7, 1.0, 3.3, 15.0] {
			let mut cam = camera();
			cam.set_scale(scale);
			cam.pan_by(-123.4, 56.7);
			for &(x, y) in &[(0.0, 0.0), (12.5, -40.25), (799.0, 599.0), (-3.0, 1000.0)] {
				let screen = Vec2::new(x, y);
				let back = cam.world_to_screen(cam.screen_to_world(screen), true);
				assert!((back.x - x).abs() <= 1.0, "x {} -> {}", x, back.x);
				assert!((back.y - y).abs() <= 1.0, "y {} -> {}", y, back.y);
				let exact = cam.world_to_screen(cam.screen_to_world(screen), false);
				assert!((exact.x - x).abs() < 1e-9);
				assert!((exact.y - y).abs() < 1e-9);
			}
		}
	}

	#[test]
	fn set_center_world_maps_point_to_viewport_center() {
		let mut cam = camera();
		cam.set_scale(2.5);
		cam.set_center_world(Vec2::new(10.0, -20.0));
		let center = cam.center_world();
		assert!((center.x - 10.0).abs() < 1e-9);
		assert!((center.y + 20.0).abs() < 1e-9);
	}

	#[test]
	fn scale_is_clamped() {
		let mut cam = camera();
		assert_eq!(cam.set_scale(0.01), 0.15);
		assert_eq!(cam.set_scale(1000.0), 15.0);
		assert!(cam.at_scale_limit(cam.scale()));
	}

	#[test]
	fn bounds_from_positions_covers_every_node() {
		let bounds = Bounds::from_positions(&[1.0, 2.0, -3.0, 8.0, 5.0, -1.0]);
		assert_eq!(bounds.min_x, -3.0);
		assert_eq!(bounds.max_x, 5.0);
		assert_eq!(bounds.min_y, -1.0);
		assert_eq!(bounds.max_y, 8.0);
	}

	#[test]
	fn bounds_extent_floor() {
		let bounds = Bounds::from_positions(&[2.0, 2.0]);
		assert_eq!(bounds.width(), MIN_EXTENT);
		assert_eq!(bounds.height(), MIN_EXTENT);
	}
}
