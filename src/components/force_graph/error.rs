//! Error type shared by the graph view modules.

use thiserror::Error;

/// Everything that can go wrong while building or driving a graph view.
///
/// Most of these are recovered locally (a malformed layout falls back to the
/// seeded spiral, a storage failure is logged). Only [`GraphError::EmptyGraph`]
/// and [`GraphError::SurfaceUnavailable`] leave the view inert.
#[derive(Debug, Error)]
pub enum GraphError {
	/// The graph has zero nodes.
	#[error("graph has no nodes")]
	EmptyGraph,

	/// A link endpoint is outside `0..node_count`.
	#[error("link {link} references node {node}, but the graph has {node_count} nodes")]
	InvalidLink {
		/// Index of the offending link.
		link: usize,
		/// Endpoint as given in the page data.
		node: i64,
		/// Nodes in the graph.
		node_count: usize,
	},

	/// A radius is zero, negative or not finite.
	#[error("node {node} has radius {radius}; radii must be finite and positive")]
	InvalidRadius {
		/// Index of the node.
		node: usize,
		/// The rejected radius.
		radius: f32,
	},

	/// A per-node or per-link array has the wrong length.
	#[error("{what}: expected {expected} entries, got {actual}")]
	LengthMismatch {
		/// Name of the array.
		what: &'static str,
		/// Length it should have.
		expected: usize,
		/// Length it has.
		actual: usize,
	},

	/// No 2D context could be obtained for the canvas.
	#[error("rendering surface unavailable: {0}")]
	SurfaceUnavailable(String),

	/// Reading or writing the persisted layout failed.
	#[error("layout storage failed: {0}")]
	Storage(String),

	/// Page data or a stored layout is not valid JSON.
	#[error(transparent)]
	Json(#[from] serde_json::Error),
}
