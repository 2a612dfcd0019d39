//! Graph data structures: the page payload and the validated description
//! the simulation is built from.

use log::warn;
use serde::Deserialize;

use super::error::GraphError;

/// Physics and presentation tunables shipped with the page data.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GraphOptions {
	/// Spring strength along links.
	pub attraction_force: f32,
	/// Rest length below which linked nodes are pushed apart.
	pub link_length: f32,
	/// Base repulsion. The value sent to the engine is this divided by the
	/// current batch fraction.
	pub repulsion_force: f32,
	/// Pull toward the origin.
	pub central_force: f32,
	/// Percentage of links the renderer draws (100 = all).
	pub edge_pruning: f32,
	/// Radius given to nodes whose radius is missing or invalid.
	pub min_node_radius: f32,
}

impl Default for GraphOptions {
	fn default() -> Self {
		Self {
			attraction_force: 1.0,
			link_length: 10.0,
			repulsion_force: 150.0,
			central_force: 3.0,
			edge_pruning: 100.0,
			min_node_radius: 3.0,
		}
	}
}

/// Graph payload as embedded in the page (`<script id="graph-data">`).
///
/// Node attributes are parallel arrays indexed by node; links are parallel
/// `linkSources`/`linkTargets` arrays. Indices are signed because exported
/// data uses `-1` for dangling link ends.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GraphData {
	/// Physics and presentation tunables.
	pub graph_options: GraphOptions,
	/// Number of nodes; the per-node arrays are repaired to this length.
	pub node_count: usize,
	/// Number of entries of `link_sources`/`link_targets` that are used.
	pub link_count: usize,
	/// Source node of each link, `-1` when dangling.
	pub link_sources: Vec<i64>,
	/// Target node of each link, `-1` when dangling.
	pub link_targets: Vec<i64>,
	/// Display label per node.
	pub labels: Vec<String>,
	/// Node radius in world units.
	pub radii: Vec<f32>,
	/// Page path per node, used to mark the node for the current page.
	pub paths: Vec<String>,
}

impl GraphData {
	/// Build a [`GraphDescription`], repairing what can be repaired.
	///
	/// Dangling links are pruned, bad radii are replaced with
	/// `min_node_radius`, and labels are padded or truncated to the node
	/// count. Each repair is logged.
	pub fn into_description(self) -> Result<GraphDescription, GraphError> {
		let node_count = self.node_count;
		if node_count == 0 {
			return Err(GraphError::EmptyGraph);
		}

		let fallback_radius = if self.graph_options.min_node_radius > 0.0 {
			self.graph_options.min_node_radius
		} else {
			1.0
		};
		let radii: Vec<f32> = (0..node_count)
			.map(|i| match self.radii.get(i) {
				Some(&r) if r.is_finite() && r > 0.0 => r,
				other => {
					warn!("graph-view: node {} has radius {:?}, using {}", i, other, fallback_radius);
					fallback_radius
				}
			})
			.collect();

		if self.labels.len() != node_count {
			warn!(
				"graph-view: {} labels for {} nodes, padding/truncating",
				self.labels.len(),
				node_count
			);
		}
		let mut labels = self.labels;
		labels.resize(node_count, String::new());

		let declared = self.link_count.min(self.link_sources.len()).min(self.link_targets.len());
		let in_range = |i: i64| i >= 0 && (i as usize) < node_count;
		let mut links = Vec::with_capacity(declared);
		let mut pruned = 0usize;
		for (&src, &tgt) in self.link_sources.iter().zip(&self.link_targets).take(declared) {
			if in_range(src) && in_range(tgt) {
				links.push((src as u32, tgt as u32));
			} else {
				pruned += 1;
			}
		}
		if pruned > 0 {
			warn!("graph-view: pruned {} links with out-of-range endpoints", pruned);
		}

		GraphDescription::new(labels, radii, links)
	}

	/// Index of the node whose path matches the end of `location`, if any.
	/// Matches start at a `/` boundary; empty and root-only paths never match.
	pub fn active_node(&self, location: &str) -> Option<usize> {
		let location = location.trim_end_matches('/');
		self.paths.iter().position(|path| {
			let path = path.trim_matches('/');
			!path.is_empty()
				&& location
					.strip_suffix(path)
					.is_some_and(|rest| rest.is_empty() || rest.ends_with('/'))
		})
	}
}

/// Immutable, validated node/link description of one graph.
#[derive(Clone, Debug)]
pub struct GraphDescription {
	labels: Vec<String>,
	radii: Vec<f32>,
	links: Vec<(u32, u32)>,
}

impl GraphDescription {
	/// Validate and build a description. Every link endpoint must be a node
	/// index and every radius must be finite and positive.
	pub fn new(
		labels: Vec<String>,
		radii: Vec<f32>,
		links: Vec<(u32, u32)>,
	) -> Result<Self, GraphError> {
		if labels.len() != radii.len() {
			return Err(GraphError::LengthMismatch {
				what: "labels",
				expected: radii.len(),
				actual: labels.len(),
			});
		}
		if let Some((node, &radius)) = radii
			.iter()
			.enumerate()
			.find(|(_, r)| !r.is_finite() || **r <= 0.0)
		{
			return Err(GraphError::InvalidRadius { node, radius });
		}
		let node_count = radii.len();
		for (link, &(src, tgt)) in links.iter().enumerate() {
			for node in [src, tgt] {
				if node as usize >= node_count {
					return Err(GraphError::InvalidLink {
						link,
						node: node as i64,
						node_count,
					});
				}
			}
		}
		Ok(Self {
			labels,
			radii,
			links,
		})
	}

	/// Number of nodes.
	pub fn node_count(&self) -> usize {
		self.radii.len()
	}

	/// Number of links.
	pub fn link_count(&self) -> usize {
		self.links.len()
	}

	/// Label per node.
	pub fn labels(&self) -> &[String] {
		&self.labels
	}

	/// Radius per node.
	pub fn radii(&self) -> &[f32] {
		&self.radii
	}

	/// Link endpoints split into parallel source/target arrays.
	pub fn link_arrays(&self) -> (Vec<u32>, Vec<u32>) {
		self.links.iter().copied().unzip()
	}
}
