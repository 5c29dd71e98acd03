use thiserror::Error;
use wasm_bindgen::JsValue;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GraphError {
	/// The graph backend could not be reached or returned a malformed payload.
	#[error("graph data unavailable: {0}")]
	DataUnavailable(String),

	/// Canvas context, listener registration or frame scheduling failed.
	#[error("render surface error: {0}")]
	Surface(String),
}

impl GraphError {
	pub(crate) fn surface(context: &str, value: JsValue) -> Self {
		GraphError::Surface(format!("{context}: {value:?}"))
	}
}

/// An edge referencing a node id missing from the node set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionGap {
	pub edge_id: String,
	pub missing: String,
}
