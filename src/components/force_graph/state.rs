//! Simulation state: the position buffer, its seeding and persistence.
//!
//! [`SimulationBridge`] is the single owner of the node buffers. The physics
//! engine borrows the position buffer mutably for one step at a time; the
//! renderer gets a read-only snapshot for one frame at a time.

use std::f64::consts::PI;

use log::{info, warn};

use super::camera::Bounds;
use super::error::GraphError;
use super::physics::{ForceTunables, PhysicsEngine, StepInput, Topology};
use super::storage::{self, LayoutStore};
use super::types::GraphDescription;

/// Margin (world units) added around the nodes when fitting the camera.
pub const FIT_MARGIN: f64 = 50.0;

/// Seeded spiral parameters.
#[derive(Clone, Debug)]
pub struct SeedConfig {
	/// Full turns the spiral makes across the node index range. Persisted
	/// layouts from earlier sessions were seeded with this value.
	pub spiral_turns: f64,
}

impl Default for SeedConfig {
	fn default() -> Self {
		Self { spiral_turns: 7.41 }
	}
}

/// Aggregate radius figures used for seeding.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RadiusStats {
	pub max: f32,
	pub mean: f32,
}

impl RadiusStats {
	pub fn of(radii: &[f32]) -> Self {
		let max = radii.iter().copied().fold(0.0, f32::max);
		let mean = radii.iter().sum::<f32>() / radii.len().max(1) as f32;
		Self { max, mean }
	}
}

/// Deterministic spiral placement. Larger nodes sit closer to the center;
/// the largest sits on it.
pub fn seeded_layout(radii: &[f32], stats: &RadiusStats, config: &SeedConfig) -> Vec<f32> {
	let n = radii.len();
	let spread = stats.mean as f64 * (n as f64).sqrt() * 2.0;
	let mut positions = vec![0.0f32; 2 * n];
	for (i, &radius) in radii.iter().enumerate() {
		let distance = (1.0 - radius as f64 / stats.max as f64) * spread;
		let angle = i as f64 / n as f64 * config.spiral_turns * 2.0 * PI;
		positions[2 * i] = (angle.cos() * distance) as f32;
		positions[2 * i + 1] = (angle.sin() * distance) as f32;
	}
	positions
}

/// Node buffers shared with the physics engine.
#[derive(Clone, Debug)]
struct SimulationBuffers {
	/// `[x0, y0, x1, y1, ..]`, always `2 * node_count` long.
	positions: Vec<f32>,
	radii: Vec<f32>,
}

/// Owns the simulation buffers, the physics engine, and the layout store for
/// one session.
pub struct SimulationBridge {
	buffers: SimulationBuffers,
	start_bounds: Bounds,
	engine: Box<dyn PhysicsEngine>,
	store: Box<dyn LayoutStore>,
	slot: String,
}

impl SimulationBridge {
	/// Allocate buffers for `graph`, restore or seed positions, and hand the
	/// topology to `engine`.
	///
	/// Returns [`GraphError::EmptyGraph`] without touching the engine or the
	/// store when the graph has no nodes.
	pub fn initialize(
		graph: &GraphDescription,
		mut engine: Box<dyn PhysicsEngine>,
		store: Box<dyn LayoutStore>,
		slot: &str,
		tunables: &ForceTunables,
		seed: &SeedConfig,
	) -> Result<Self, GraphError> {
		let node_count = graph.node_count();
		if node_count == 0 {
			return Err(GraphError::EmptyGraph);
		}

		let radii = graph.radii().to_vec();
		let stats = RadiusStats::of(&radii);
		let (link_sources, link_targets) = graph.link_arrays();

		let positions = match store
			.load(slot)
			.and_then(|raw| storage::decode_layout(&raw, 2 * node_count))
		{
			Some(positions) => {
				info!("graph-view: restored layout for {} nodes", node_count);
				positions
			}
			None => {
				info!("graph-view: seeding layout for {} nodes", node_count);
				seeded_layout(&radii, &stats, seed)
			}
		};
		let start_bounds = Bounds::from_positions(&positions).expanded(FIT_MARGIN);

		engine.set_attraction_force(tunables.attraction_force);
		engine.set_repulsion_force(tunables.repulsion_force);
		engine.set_central_force(tunables.central_force);
		engine.set_link_length(tunables.link_length);
		engine.set_dt(tunables.dt);
		engine.initialize(&Topology {
			node_count,
			radii: &radii,
			link_sources: &link_sources,
			link_targets: &link_targets,
		});

		Ok(Self {
			buffers: SimulationBuffers { positions, radii },
			start_bounds,
			engine,
			store,
			slot: slot.to_string(),
		})
	}

	pub fn node_count(&self) -> usize {
		self.buffers.radii.len()
	}

	/// Fit rectangle computed from the starting positions.
	pub fn fit_bounds(&self) -> Bounds {
		self.start_bounds
	}

	/// Positions for this frame. The borrow ends before the next step.
	pub fn snapshot_positions(&self) -> &[f32] {
		&self.buffers.positions
	}

	/// Advance the layout one step. Returns the hovered node.
	pub fn step(&mut self, input: &StepInput) -> Option<usize> {
		self.engine.step(&mut self.buffers.positions, input)
	}

	/// Engine handle for tunable updates.
	pub fn engine_mut(&mut self) -> &mut dyn PhysicsEngine {
		self.engine.as_mut()
	}

	/// Write the current positions, rounded, to the layout slot.
	pub fn persist(&mut self) {
		let result = storage::encode_layout(&self.buffers.positions)
			.and_then(|raw| self.store.save(&self.slot, &raw));
		if let Err(e) = result {
			warn!("graph-view: could not persist layout: {}", e);
		}
	}

	/// End the session: drop the buffers and let the engine free its mirror.
	pub fn release(mut self) {
		self.engine.release();
		info!("graph-view: simulation released");
	}
}

#[cfg(test)]
pub(crate) mod tests {
	use std::cell::RefCell;
	use std::rc::Rc;

	use super::*;
	use crate::components::force_graph::storage::{DEFAULT_SLOT, MemoryStore};

	/// Engine that nudges every coordinate by a fixed amount per step.
	#[derive(Default)]
	struct DriftEngine {
		log: Rc<RefCell<Vec<String>>>,
	}

	impl PhysicsEngine for DriftEngine {
		fn initialize(&mut self, topology: &Topology<'_>) {
			self.log
				.borrow_mut()
				.push(format!("init {}", topology.node_count));
		}

		fn step(&mut self, positions: &mut [f32], _input: &StepInput) -> Option<usize> {
			for p in positions.iter_mut() {
				*p += 0.3;
			}
			None
		}

		fn set_attraction_force(&mut self, _value: f32) {}
		fn set_repulsion_force(&mut self, value: f32) {
			self.log.borrow_mut().push(format!("repulsion {}", value));
		}
		fn set_central_force(&mut self, _value: f32) {}
		fn set_link_length(&mut self, _value: f32) {}
		fn set_batch_fraction(&mut self, _value: f32) {}
		fn set_dt(&mut self, _value: f32) {}

		fn release(&mut self) {
			self.log.borrow_mut().push("release".into());
		}
	}

	/// Store that shares its contents with the test through an `Rc`.
	#[derive(Clone, Default)]
	pub(crate) struct SharedStore(pub Rc<RefCell<MemoryStore>>);

	impl LayoutStore for SharedStore {
		fn load(&self, slot: &str) -> Option<String> {
			self.0.borrow().load(slot)
		}

		fn save(&mut self, slot: &str, value: &str) -> Result<(), GraphError> {
			self.0.borrow_mut().save(slot, value)
		}
	}

	fn graph(radii: &[f32], links: &[(u32, u32)]) -> GraphDescription {
		let labels = (0..radii.len()).map(|i| format!("n{}", i)).collect();
		GraphDescription::new(labels, radii.to_vec(), links.to_vec()).unwrap()
	}

	fn bridge(graph: &GraphDescription, store: SharedStore) -> SimulationBridge {
		SimulationBridge::initialize(
			graph,
			Box::new(DriftEngine::default()),
			Box::new(store),
			DEFAULT_SLOT,
			&ForceTunables::default(),
			&SeedConfig::default(),
		)
		.unwrap()
	}

	#[test]
	fn buffer_length_is_twice_node_count() {
		for n in [1usize, 2, 7, 64] {
			let radii: Vec<f32> = (0..n).map(|i| 1.0 + i as f32).collect();
			let bridge = bridge(&graph(&radii, &[]), SharedStore::default());
			assert_eq!(bridge.snapshot_positions().len(), 2 * n);
		}
	}

	#[test]
	fn empty_graph_fails_fast() {
		let log = Rc::new(RefCell::new(Vec::new()));
		let engine = DriftEngine { log: log.clone() };
		let empty = GraphDescription::new(vec![], vec![], vec![]).unwrap();
		let result = SimulationBridge::initialize(
			&empty,
			Box::new(engine),
			Box::new(MemoryStore::new()),
			DEFAULT_SLOT,
			&ForceTunables::default(),
			&SeedConfig::default(),
		);
		assert!(matches!(result, Err(GraphError::EmptyGraph)));
		assert!(log.borrow().is_empty());
	}

	#[test]
	fn seeded_layout_is_deterministic() {
		let radii = [3.0, 5.0, 7.0, 4.0, 6.0];
		let stats = RadiusStats::of(&radii);
		let a = seeded_layout(&radii, &stats, &SeedConfig::default());
		let b = seeded_layout(&radii, &stats, &SeedConfig::default());
		assert_eq!(a, b);
	}

	#[test]
	fn seeded_layout_pulls_large_nodes_inward() {
		let radii = [2.0, 8.0, 5.0];
		let stats = RadiusStats::of(&radii);
		let layout = seeded_layout(&radii, &stats, &SeedConfig::default());
		let dist = |i: usize| (layout[2 * i].powi(2) + layout[2 * i + 1].powi(2)).sqrt();
		assert_eq!(dist(1), 0.0);
		assert!(dist(0) > dist(2));
	}

	#[test]
	fn single_node_seeds_at_origin_with_margin() {
		let bridge = bridge(&graph(&[5.0], &[]), SharedStore::default());
		assert_eq!(bridge.snapshot_positions(), &[0.0, 0.0]);
		let bounds = bridge.fit_bounds();
		assert_eq!(
			bounds,
			Bounds {
				min_x: -50.0,
				min_y: -50.0,
				max_x: 50.0,
				max_y: 50.0,
			}
		);
	}

	#[test]
	fn radius_stats() {
		let stats = RadiusStats::of(&[2.0, 4.0, 9.0]);
		assert_eq!(stats.max, 9.0);
		assert_eq!(stats.mean, 5.0);
	}

	#[test]
	fn persist_then_restore_yields_rounded_positions() {
		let store = SharedStore::default();
		let description = graph(&[3.0, 5.0, 7.0, 2.0], &[(0, 1), (2, 3)]);

		let mut first = bridge(&description, store.clone());
		first.step(&StepInput {
			pointer: None,
			grabbed: None,
			camera_scale: 1.0,
		});
		let expected: Vec<f32> = first.snapshot_positions().iter().map(|p| p.round()).collect();
		first.persist();
		first.release();

		let second = bridge(&description, store);
		assert_eq!(second.snapshot_positions(), expected.as_slice());
	}

	#[test]
	fn mismatched_layout_falls_back_to_seed() {
		let store = SharedStore::default();
		store
			.0
			.borrow_mut()
			.save(DEFAULT_SLOT, "[1, 2, 3, 4, 5, 6]")
			.unwrap();
		let radii = [3.0, 6.0];
		let bridge = bridge(&graph(&radii, &[]), store);
		let stats = RadiusStats::of(&radii);
		let seeded = seeded_layout(&radii, &stats, &SeedConfig::default());
		assert_eq!(bridge.snapshot_positions(), seeded.as_slice());
	}

	#[test]
	fn malformed_layout_falls_back_to_seed() {
		let store = SharedStore::default();
		store.0.borrow_mut().save(DEFAULT_SLOT, "{oops").unwrap();
		let bridge = bridge(&graph(&[4.0], &[]), store);
		assert_eq!(bridge.snapshot_positions(), &[0.0, 0.0]);
	}

	#[test]
	fn fit_bounds_cover_every_node() {
		let store = SharedStore::default();
		store
			.0
			.borrow_mut()
			.save(DEFAULT_SLOT, "[0, 0, 100, -20, -40, 60]")
			.unwrap();
		let bridge = bridge(&graph(&[1.0, 1.0, 1.0], &[]), store);
		assert_eq!(
			bridge.fit_bounds(),
			Bounds {
				min_x: -90.0,
				min_y: -70.0,
				max_x: 150.0,
				max_y: 110.0,
			}
		);
	}

	#[test]
	fn step_mutates_in_place_and_release_frees_engine() {
		let log = Rc::new(RefCell::new(Vec::new()));
		let mut bridge = SimulationBridge::initialize(
			&graph(&[1.0, 1.0], &[]),
			Box::new(DriftEngine { log: log.clone() }),
			Box::new(MemoryStore::new()),
			DEFAULT_SLOT,
			&ForceTunables::default(),
			&SeedConfig::default(),
		)
		.unwrap();
		let before = bridge.snapshot_positions().to_vec();
		bridge.step(&StepInput {
			pointer: None,
			grabbed: None,
			camera_scale: 1.0,
		});
		assert_eq!(bridge.snapshot_positions()[0], before[0] + 0.3);
		bridge.release();
		let log = log.borrow();
		assert_eq!(log.first().map(String::as_str), Some("repulsion 150"));
		assert!(log.contains(&"init 2".to_string()));
		assert_eq!(log.last().map(String::as_str), Some("release"));
	}
}
