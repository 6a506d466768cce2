//! Edge server in front of the OrgPilot backend
//!
//! Serves the few routes a browser front end cannot call directly:
//! - `GET /api/multimedia/{id}`: authenticated image proxy with placeholder
//! - `POST /api/auth/{login,register,logout}`: credential forwarding with
//!   an HTTP-only `auth-token` cookie
//! - `GET /api/session`: the session decoded from that cookie
//! - `GET /health`

pub mod auth;
pub mod builder;
pub mod multimedia;
pub mod session;
pub mod state;

pub use builder::ServerBuilder;
pub use multimedia::PLACEHOLDER_SVG;
pub use state::EdgeState;
