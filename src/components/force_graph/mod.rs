//! Force-directed graph view.
//!
//! Renders a graph on an HTML canvas with:
//! - A physics layout seeded deterministically and persisted between visits
//! - Pan, wheel zoom with momentum, node dragging and double-click to fit
//! - A rendering context fed over a message channel
//! - Frame-rate driven quality adaptation
//!
//! # Example
//!
//! ```ignore
//! use graph_view::{GraphData, GraphView};
//!
//! let data: GraphData = serde_json::from_str(json)?;
//! let (collapsed, _) = signal(false);
//!
//! view! { <GraphView data=Signal::stored(data) collapsed=collapsed /> }
//! ```

pub mod camera;
mod component;
mod controller;
mod error;
mod physics;
mod proxy;
mod render;
mod state;
mod storage;
mod theme;
mod types;

pub use component::GraphView;
pub use controller::{LoopConfig, ViewConfig};
pub use error::GraphError;
pub use state::SeedConfig;
pub use theme::{Color, Palette, sample_palette};
pub use types::{GraphData, GraphDescription, GraphOptions};
