pub mod controller;
pub mod crud;
pub mod middleware;
pub mod model;
pub mod routes;
pub mod schema;
pub mod service;

pub use middleware::{optional_auth, require_auth};
pub use routes::auth_routes;
