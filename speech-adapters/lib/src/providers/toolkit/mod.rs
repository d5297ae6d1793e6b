//! Adapters backed by an external toolkit checkout.

mod melo;

pub use melo::ToolkitAdapter;
