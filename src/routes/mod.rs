pub mod common;
pub mod resource;

pub use common::{common_routes, common_routes_with_ready, fallback};
pub use resource::{build_controllers, mount, resource_routes, resources_router};
