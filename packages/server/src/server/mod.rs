// HTTP server setup (Axum webhooks)
pub mod app;
pub mod routes;

pub use app::*;
