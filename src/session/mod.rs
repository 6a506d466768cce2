//! Client session: token decoding, persistence and the gate in front of
//! protected calls

pub mod gate;
pub mod store;
pub mod token;

pub use gate::{Session, SessionGate, SessionUser};
pub use store::{AUTH_TOKEN_KEY, FileSessionStore, InMemorySessionStore, SessionStore};
pub use token::{Claims, TokenError, decode_claims};
