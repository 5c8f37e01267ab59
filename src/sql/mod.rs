//! Parameterized SQL for resource queries: identifiers come from config, values are bound.

mod builder;
pub mod params;
pub use builder::*;
pub use params::*;
