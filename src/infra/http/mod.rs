pub mod api;
mod middleware;

pub use api::{AdminState, build_admin_router};
