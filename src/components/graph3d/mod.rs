pub mod camera;
mod component;
pub mod config;
pub mod error;
pub mod headless;
pub mod interaction;
pub mod loader;
pub mod picking;
pub mod planar;
mod render;
pub mod scene;
pub mod session;
pub mod simulation;
pub mod types;
pub mod web;

pub use component::GraphView;
pub use config::{LayoutEngine, ViewConfig};
pub use error::GraphError;
pub use loader::{GraphSource, HttpGraphSource, LoadedGraph, StaticGraphSource};
pub use session::{CommandQueue, HostBindings, SceneSession};
pub use types::{GraphEdge, GraphNode, GraphPayload};
