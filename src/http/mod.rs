//! HTTP/WebSocket surface of the relay
//!
//! - GET /stream - WebSocket upgrade; one relay session per connection
//! - GET /health - Health check

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::AppState;
