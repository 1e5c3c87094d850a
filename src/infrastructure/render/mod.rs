//! Renderer adapters.

pub mod command_renderer;

pub use command_renderer::CommandRenderer;
