//! HTTP-facing side: request intake, normalization, handlers and the router

pub mod audit;
pub mod handler;
pub mod normalize;
pub mod request;
pub mod server;

// Re-export the main entry points for convenience
pub use handler::{ApiHandler, ApiResponse, SlackApiHandler};
pub use server::{create_router, start_server};
