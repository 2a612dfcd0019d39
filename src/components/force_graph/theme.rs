//! Colors and the palette the renderer paints with.
//!
//! The palette is an input to the view. Hosts that theme through CSS custom
//! properties can resolve it with [`sample_palette`], which reads each
//! variable back through a hidden sampling element.

use log::warn;
use wasm_bindgen::JsCast;
use web_sys::{Document, HtmlElement, Window};

/// RGBA color representation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Color {
	/// Red channel.
	pub r: u8,
	/// Green channel.
	pub g: u8,
	/// Blue channel.
	pub b: u8,
	/// Opacity in `0.0..=1.0`.
	pub a: f64,
}

/// Used when a sampled color cannot be parsed.
pub const FALLBACK_COLOR: Color = Color::rgb(0x88, 0x88, 0x88);

impl Color {
	/// Opaque color.
	pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
		Self { r, g, b, a: 1.0 }
	}

	/// Color with opacity `a`.
	pub const fn rgba(r: u8, g: u8, b: u8, a: f64) -> Self {
		Self { r, g, b, a }
	}

	/// Same channels, opacity replaced.
	pub fn with_alpha(self, a: f64) -> Self {
		Self { a, ..self }
	}

	/// CSS color string: `#rrggbb` when opaque, `rgba(..)` otherwise.
	pub fn to_css(self) -> String {
		if (self.a - 1.0).abs() < 0.001 {
			format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
		} else {
			format!("rgba({}, {}, {}, {})", self.r, self.g, self.b, self.a)
		}
	}

	/// Parses hex (`#RRGGBB`) and `rgb()`/`rgba()` functional notation.
	pub fn parse(s: &str) -> Option<Self> {
		let s = s.trim();
		if let Some(hex) = s.strip_prefix('#') {
			if hex.len() != 6 {
				return None;
			}
			let channel = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
			return Some(Self::rgb(channel(0)?, channel(2)?, channel(4)?));
		}

		let inner = s
			.strip_prefix("rgba(")
			.or_else(|| s.strip_prefix("rgb("))?
			.strip_suffix(')')?;
		let parts: Vec<&str> = inner.split(',').map(str::trim).collect();
		if parts.len() < 3 {
			return None;
		}
		let r = parts[0].parse().ok()?;
		let g = parts[1].parse().ok()?;
		let b = parts[2].parse().ok()?;
		let a = match parts.get(3) {
			Some(a) => a.parse().ok()?,
			None => 1.0,
		};
		Some(Self::rgba(r, g, b, a))
	}
}

/// Semantic colors used by the renderer.
#[derive(Clone, Debug, PartialEq)]
pub struct Palette {
	/// Canvas fill.
	pub background: Color,
	/// Link strokes.
	pub link: Color,
	/// Node fill.
	pub node: Color,
	/// Node outlines.
	pub outline: Color,
	/// Labels.
	pub text: Color,
	/// Hovered, grabbed and active nodes with their links.
	pub accent: Color,
}

impl Default for Palette {
	fn default() -> Self {
		Self {
			background: Color::rgb(22, 27, 34),
			link: Color::rgba(140, 160, 180, 0.5),
			node: Color::rgb(129, 161, 193),
			outline: Color::rgba(140, 160, 180, 0.5),
			text: Color::rgb(220, 225, 230),
			accent: Color::rgb(94, 129, 172),
		}
	}
}

/// CSS custom properties each palette entry is read from.
pub const PALETTE_VARIABLES: [(&str, &str); 6] = [
	("background", "--background-secondary"),
	("link", "--graph-line"),
	("node", "--graph-node"),
	("outline", "--graph-line"),
	("text", "--graph-text"),
	("accent", "--interactive-accent"),
];

/// Resolve the palette from the document's CSS variables.
pub fn sample_palette(window: &Window, document: &Document) -> Palette {
	let sample = |variable: &str| {
		sample_color(window, document, variable).unwrap_or_else(|| {
			warn!("graph-view: could not sample {}, using fallback", variable);
			FALLBACK_COLOR
		})
	};
	let [background, link, node, outline, text, accent] =
		PALETTE_VARIABLES.map(|(_, variable)| sample(variable));
	Palette {
		background,
		link,
		node,
		outline,
		text,
		accent,
	}
}

/// Computed color of a hidden element styled with `color: var(<variable>)`.
fn sample_color(window: &Window, document: &Document, variable: &str) -> Option<Color> {
	let sampler: HtmlElement = document.create_element("div").ok()?.dyn_into().ok()?;
	let body = document.body()?;
	body.append_child(&sampler).ok()?;
	let style = sampler.style();
	let _ = style.set_property("display", "none");
	let _ = style.set_property("color", &format!("var({})", variable));

	let computed = window.get_computed_style(&sampler).ok().flatten();
	let color = computed
		.as_ref()
		.and_then(|c| c.get_property_value("color").ok())
		.and_then(|c| Color::parse(&c));
	let opacity = computed
		.and_then(|c| c.get_property_value("opacity").ok())
		.and_then(|o| o.trim().parse::<f64>().ok())
		.unwrap_or(1.0);
	sampler.remove();

	color.map(|c| c.with_alpha(c.a * opacity))
}
