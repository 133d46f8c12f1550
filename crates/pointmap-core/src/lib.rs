//! Pointmap Core - annotation records, the ordered point store, and export
//!
//! This crate provides the engine-agnostic foundation for Pointmap:
//! - Point records and the ordered, densely numbered point store
//! - JSON export of the point sequence for clipboard hand-off
//! - Model source locators and their validation

pub mod export;
pub mod source;
pub mod store;

pub use export::points_to_json;
pub use source::{ModelSource, SourceError, SourceKind};
pub use store::{Point, PointStore};
