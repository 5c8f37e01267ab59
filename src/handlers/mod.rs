//! HTTP handlers for resource CRUD, the controller behind them, and lifecycle hooks.

pub mod controller;
pub mod hooks;
pub mod resource;
pub use controller::{body_to_row, parse_id, Controller};
pub use hooks::{DefaultHooks, HookContext, Hooks, NoHooks};
