//! Physics capability driving the layout.
//!
//! The simulation state bridge owns the position buffer; an engine only ever
//! sees it as a `&mut [f32]` for the duration of one [`PhysicsEngine::step`].
//! [`ForceGraphEngine`] is the engine used in the browser. Each step it loads
//! the current batch window into a `force_graph` simulation, steps that, and
//! copies positions back.

use force_graph::{DefaultNodeIdx, EdgeData, ForceGraph, NodeData, SimulationParameters};
use log::debug;

use super::camera::Vec2;

/// Static topology handed to an engine once per session.
#[derive(Clone, Copy, Debug)]
pub struct Topology<'a> {
	pub node_count: usize,
	pub radii: &'a [f32],
	pub link_sources: &'a [u32],
	pub link_targets: &'a [u32],
}

/// Per-step inputs from the interaction layer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StepInput {
	/// Pointer position in world space, `None` when the pointer is outside the view.
	pub pointer: Option<Vec2>,
	/// Node being dragged; the engine pins it to the pointer.
	pub grabbed: Option<usize>,
	/// Current camera zoom, for screen-size dependent hit testing.
	pub camera_scale: f64,
}

/// Force tunables, as configured by the page.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ForceTunables {
	pub attraction_force: f32,
	pub repulsion_force: f32,
	pub central_force: f32,
	pub link_length: f32,
	pub dt: f32,
}

impl Default for ForceTunables {
	fn default() -> Self {
		Self {
			attraction_force: 1.0,
			repulsion_force: 150.0,
			central_force: 3.0,
			link_length: 10.0,
			dt: 1.0,
		}
	}
}

/// An opaque layout stepper.
pub trait PhysicsEngine {
	/// Load topology and starting positions. Called once per session.
	fn initialize(&mut self, topology: &Topology<'_>);

	/// Advance every node by one time increment, writing `positions` in place.
	/// Returns the node nearest the pointer, if the pointer is over one.
	fn step(&mut self, positions: &mut [f32], input: &StepInput) -> Option<usize>;

	fn set_attraction_force(&mut self, value: f32);
	fn set_repulsion_force(&mut self, value: f32);
	fn set_central_force(&mut self, value: f32);
	fn set_link_length(&mut self, value: f32);
	/// Fraction of nodes integrated per step, in (0, 1].
	fn set_batch_fraction(&mut self, value: f32);
	fn set_dt(&mut self, value: f32);

	/// Free mirrored simulation memory. No calls are made afterwards.
	fn release(&mut self);
}

/// `dt = 1` corresponds to one nominal 60 Hz frame.
const SECONDS_PER_DT: f32 = 1.0 / 60.0;
/// Screen pixels added to a node's radius when hit testing the pointer.
const HOVER_SLOP_PX: f64 = 4.0;
/// Scales `attraction_force` into `force_graph`'s spring constant.
const SPRING_SCALE: f32 = 0.05;
/// Scales `central_force` into a per-second pull toward the origin.
const CENTRAL_SCALE: f32 = 0.01;

/// [`PhysicsEngine`] backed by the `force_graph` crate.
///
/// Each step only a rotating window of `ceil(n * batch_fraction)` nodes is
/// simulated, and those nodes repel only each other. That samples the
/// repulsion a node would feel from the whole graph, so a repulsion force
/// scaled by `1 / batch_fraction` keeps the expected force unchanged while
/// the pairwise work shrinks with the square of the window. Links leaving the
/// window still pull: their far end joins as a massless anchor, which
/// attracts without repelling. Velocities are kept here across steps, since
/// the window simulation is rebuilt every time.
pub struct ForceGraphEngine {
	radii: Vec<f32>,
	links: Vec<(usize, usize)>,
	velocities: Vec<f32>,
	tunables: ForceTunables,
	batch_fraction: f32,
	batch_cursor: usize,
}

impl Default for ForceGraphEngine {
	fn default() -> Self {
		Self::new(ForceTunables::default())
	}
}

impl ForceGraphEngine {
	pub fn new(tunables: ForceTunables) -> Self {
		Self {
			radii: Vec::new(),
			links: Vec::new(),
			velocities: Vec::new(),
			tunables,
			batch_fraction: 1.0,
			batch_cursor: 0,
		}
	}

	fn parameters(&self) -> SimulationParameters {
		SimulationParameters {
			force_charge: self.tunables.repulsion_force,
			force_spring: self.tunables.attraction_force * SPRING_SCALE,
			force_max: 100.0,
			node_speed: 3000.0,
			damping_factor: 0.9,
		}
	}

	/// Nodes simulated this step, starting at the batch cursor.
	fn window(&self) -> Vec<usize> {
		let n = self.radii.len();
		let len = ((n as f32 * self.batch_fraction).ceil() as usize).clamp(1, n.max(1));
		(0..len.min(n)).map(|k| (self.batch_cursor + k) % n).collect()
	}

	/// Load the window into a fresh simulation. Grabbed nodes and the far
	/// ends of outgoing links are anchors.
	fn window_graph(
		&self,
		positions: &[f32],
		window: &[usize],
		grabbed: Option<usize>,
	) -> ForceGraph<usize, ()> {
		let mut graph = ForceGraph::new(self.parameters());
		let mut slots: Vec<Option<DefaultNodeIdx>> = vec![None; self.radii.len()];
		for &i in window {
			slots[i] = Some(graph.add_node(NodeData {
				x: positions[2 * i],
				y: positions[2 * i + 1],
				mass: self.radii[i].max(1.0),
				is_anchor: grabbed == Some(i),
				user_data: i,
			}));
		}

		let in_window: Vec<bool> = slots.iter().map(Option::is_some).collect();
		for &(a, b) in &self.links {
			if !in_window[a] && !in_window[b] {
				continue;
			}
			let mut slot = |i: usize| {
				*slots[i].get_or_insert_with(|| {
					graph.add_node(NodeData {
						x: positions[2 * i],
						y: positions[2 * i + 1],
						mass: 0.0,
						is_anchor: true,
						user_data: i,
					})
				})
			};
			let (sa, sb) = (slot(a), slot(b));
			graph.add_edge(sa, sb, EdgeData::default());
		}
		graph
	}

	fn apply_link_lengths(&self, positions: &mut [f32], moving: &[bool], dt: f32) {
		let rest = self.tunables.link_length;
		let stiffness = (self.tunables.attraction_force * SPRING_SCALE * dt).min(0.5);
		for &(a, b) in &self.links {
			let (dx, dy) = (
				positions[2 * b] - positions[2 * a],
				positions[2 * b + 1] - positions[2 * a + 1],
			);
			let dist = (dx * dx + dy * dy).sqrt();
			if dist < 1e-3 || dist >= rest {
				continue;
			}
			let push = (rest - dist) / dist * stiffness * 0.5;
			if moving[a] {
				positions[2 * a] -= dx * push;
				positions[2 * a + 1] -= dy * push;
			}
			if moving[b] {
				positions[2 * b] += dx * push;
				positions[2 * b + 1] += dy * push;
			}
		}
	}

	fn nearest_node(&self, positions: &[f32], input: &StepInput) -> Option<usize> {
		let pointer = input.pointer?;
		let slop = HOVER_SLOP_PX / input.camera_scale.max(f64::EPSILON);
		let mut best: Option<(usize, f64)> = None;
		for (i, xy) in positions.chunks_exact(2).enumerate() {
			let (dx, dy) = (xy[0] as f64 - pointer.x, xy[1] as f64 - pointer.y);
			let dist = (dx * dx + dy * dy).sqrt();
			if dist <= self.radii[i] as f64 + slop && best.is_none_or(|(_, d)| dist < d) {
				best = Some((i, dist));
			}
		}
		best.map(|(i, _)| i)
	}
}

impl PhysicsEngine for ForceGraphEngine {
	fn initialize(&mut self, topology: &Topology<'_>) {
		let n = topology.node_count;
		let links: Vec<(usize, usize)> = topology
			.link_sources
			.iter()
			.zip(topology.link_targets)
			.map(|(&src, &tgt)| (src as usize, tgt as usize))
			.filter(|&(src, tgt)| src != tgt && src < n && tgt < n)
			.collect();

		debug!(
			"graph-view: physics initialized with {} nodes, {} links",
			n,
			links.len()
		);
		self.radii = topology.radii[..n].to_vec();
		self.links = links;
		self.velocities = vec![0.0; 2 * n];
		self.batch_cursor = 0;
	}

	fn step(&mut self, positions: &mut [f32], input: &StepInput) -> Option<usize> {
		let n = self.radii.len();
		if n == 0 || positions.len() != 2 * n {
			return None;
		}

		if let Some((node, pointer)) = input.grabbed.zip(input.pointer) {
			if node < n {
				positions[2 * node] = pointer.x as f32;
				positions[2 * node + 1] = pointer.y as f32;
				self.velocities[2 * node] = 0.0;
				self.velocities[2 * node + 1] = 0.0;
			}
		}

		let dt = self.tunables.dt * SECONDS_PER_DT;
		if dt <= 0.0 {
			return self.nearest_node(positions, input);
		}

		let window = self.window();
		let mut moving = vec![false; n];
		for &i in &window {
			moving[i] = input.grabbed != Some(i);
		}

		let mut graph = self.window_graph(positions, &window, input.grabbed);
		graph.update(dt);

		// The window simulation starts at rest; add the carried velocity.
		let carry = graph.parameters.damping_factor * dt;
		let velocities = &mut self.velocities;
		graph.visit_nodes(|node| {
			let i = node.data.user_data;
			if !moving[i] {
				return;
			}
			for (axis, value) in [node.x(), node.y()].into_iter().enumerate() {
				let k = 2 * i + axis;
				let next = value + velocities[k] * carry;
				velocities[k] = (next - positions[k]) / dt;
				positions[k] = next;
			}
		});

		self.apply_link_lengths(positions, &moving, dt);

		let pull = (self.tunables.central_force * CENTRAL_SCALE * dt).min(1.0);
		for (i, xy) in positions.chunks_exact_mut(2).enumerate() {
			if moving[i] {
				xy[0] -= xy[0] * pull;
				xy[1] -= xy[1] * pull;
			}
		}

		self.batch_cursor = (self.batch_cursor + window.len()) % n;
		self.nearest_node(positions, input)
	}

	fn set_attraction_force(&mut self, value: f32) {
		self.tunables.attraction_force = value;
	}

	fn set_repulsion_force(&mut self, value: f32) {
		self.tunables.repulsion_force = value;
	}

	fn set_central_force(&mut self, value: f32) {
		self.tunables.central_force = value;
	}

	fn set_link_length(&mut self, value: f32) {
		self.tunables.link_length = value;
	}

	fn set_batch_fraction(&mut self, value: f32) {
		self.batch_fraction = value.clamp(f32::EPSILON, 1.0);
	}

	fn set_dt(&mut self, value: f32) {
		self.tunables.dt = value;
	}

	fn release(&mut self) {
		self.radii = Vec::new();
		self.links = Vec::new();
		self.velocities = Vec::new();
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn engine_with(radii: &[f32], links: &[(u32, u32)]) -> ForceGraphEngine {
		let (sources, targets): (Vec<u32>, Vec<u32>) = links.iter().copied().unzip();
		let mut engine = ForceGraphEngine::default();
		engine.initialize(&Topology {
			node_count: radii.len(),
			radii,
			link_sources: &sources,
			link_targets: &targets,
		});
		engine
	}

	fn idle() -> StepInput {
		StepInput {
			pointer: None,
			grabbed: None,
			camera_scale: 1.0,
		}
	}

	#[test]
	fn step_keeps_buffer_shape_and_finite_values() {
		let mut positions = vec![0.0, 0.0, 30.0, 0.0, 0.0, 30.0];
		let mut engine = engine_with(&[3.0, 4.0, 5.0], &[(0, 1), (1, 2)]);
		for _ in 0..20 {
			engine.step(&mut positions, &idle());
		}
		assert_eq!(positions.len(), 6);
		assert!(positions.iter().all(|p| p.is_finite()));
	}

	#[test]
	fn hover_reports_node_under_pointer() {
		let positions = vec![0.0, 0.0, 100.0, 100.0];
		let engine = engine_with(&[5.0, 5.0], &[]);
		let input = StepInput {
			pointer: Some(Vec2::new(101.0, 99.0)),
			..idle()
		};
		assert_eq!(engine.nearest_node(&positions, &input), Some(1));
		let input = StepInput {
			pointer: Some(Vec2::new(50.0, 50.0)),
			..idle()
		};
		assert_eq!(engine.nearest_node(&positions, &input), None);
		assert_eq!(engine.nearest_node(&positions, &idle()), None);
	}

	#[test]
	fn grabbed_node_follows_pointer() {
		let mut positions = vec![0.0, 0.0, 40.0, 0.0];
		let mut engine = engine_with(&[3.0, 3.0], &[(0, 1)]);
		let input = StepInput {
			pointer: Some(Vec2::new(-25.0, 12.0)),
			grabbed: Some(1),
			camera_scale: 1.0,
		};
		engine.step(&mut positions, &input);
		assert_eq!(&positions[2..], &[-25.0, 12.0]);
	}

	#[test]
	fn batch_window_rotates_over_all_nodes() {
		let mut positions = vec![0.0, 0.0, 10.0, 0.0, 20.0, 0.0, 30.0, 0.0];
		let mut engine = engine_with(&[1.0; 4], &[]);
		engine.set_batch_fraction(0.5);
		assert_eq!(engine.window(), vec![0, 1]);
		engine.step(&mut positions, &idle());
		assert_eq!(engine.window(), vec![2, 3]);
		engine.step(&mut positions, &idle());
		assert_eq!(engine.window(), vec![0, 1]);
	}

	#[test]
	fn nodes_outside_batch_do_not_move() {
		let mut positions = vec![0.0, 0.0, 20.0, 0.0, 0.0, 20.0, 20.0, 20.0];
		let mut engine = engine_with(&[2.0; 4], &[(0, 1), (2, 3)]);
		engine.set_batch_fraction(0.5);
		let before = positions.clone();
		engine.step(&mut positions, &idle());
		assert_eq!(&positions[4..], &before[4..]);
		assert_ne!(&positions[..4], &before[..4]);
	}

	fn first_step_displacement(batch_fraction: f32) -> f32 {
		// node 0 at the origin, ten nodes stacked at (30, 0)
		let mut positions = vec![0.0, 0.0];
		for _ in 0..10 {
			positions.extend([30.0, 0.0]);
		}
		let mut engine = engine_with(&[1.0; 11], &[]);
		engine.set_batch_fraction(batch_fraction);
		engine.set_repulsion_force(150.0 / batch_fraction);
		engine.step(&mut positions, &idle());
		(positions[0].powi(2) + positions[1].powi(2)).sqrt()
	}

	#[test]
	fn rescaled_repulsion_keeps_displacement_under_smaller_batch() {
		// ceil(11 * 0.3) = 4, so node 0 samples 3 of its 10 neighbours
		let full = first_step_displacement(1.0);
		let sampled = first_step_displacement(0.3);
		assert!(full > 0.0);
		assert!((sampled / full - 1.0).abs() < 1e-3, "full {} sampled {}", full, sampled);
	}

	#[test]
	fn links_leaving_the_window_still_attract() {
		let mut positions = vec![0.0, 0.0, 200.0, 0.0];
		let mut engine = engine_with(&[1.0, 1.0], &[(0, 1)]);
		engine.set_batch_fraction(0.5);
		engine.set_repulsion_force(0.0);
		engine.set_central_force(0.0);
		engine.step(&mut positions, &idle());
		assert!(positions[0] > 0.0);
		assert_eq!(&positions[2..], &[200.0, 0.0]);
	}

	#[test]
	fn motion_carries_between_steps() {
		let mut positions = vec![0.0, 0.0, 20.0, 0.0];
		let mut engine = engine_with(&[1.0, 1.0], &[]);
		engine.set_central_force(0.0);
		engine.step(&mut positions, &idle());
		let first = -positions[0];
		let before = positions[0];
		engine.step(&mut positions, &idle());
		let second = before - positions[0];
		assert!(first > 0.0);
		assert!(second > first);
	}

	#[test]
	fn zero_dt_only_hit_tests() {
		let mut positions = vec![0.0, 0.0, 5.0, 0.0];
		let mut engine = engine_with(&[1.0, 1.0], &[]);
		engine.set_dt(0.0);
		let before = positions.clone();
		engine.step(&mut positions, &idle());
		assert_eq!(positions, before);
	}

	#[test]
	fn release_clears_mirror() {
		let mut positions = vec![0.0, 0.0];
		let mut engine = engine_with(&[1.0], &[]);
		engine.release();
		assert!(engine.radii.is_empty());
		assert_eq!(engine.step(&mut positions, &idle()), None);
	}
}
