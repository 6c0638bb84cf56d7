// Routes module

pub mod auth;
pub mod health;
pub mod services;
pub mod theme;

pub use auth::auth_routes;
pub use health::health_routes;
pub use services::services_routes;
pub use theme::theme_routes;
