//! Typed access to the OrgPilot backend
//!
//! - [`transport`]: the HTTP seam (reqwest by default)
//! - [`executor`]: bearer injection and status classification
//! - [`endpoints`]: the endpoint table with cache tags
//! - [`requests`]: request and response bodies
//! - [`client`]: the cached, session-aware facade
//! - [`workflows`]: calls spanning several endpoints

pub mod client;
pub mod endpoints;
pub mod executor;
pub mod requests;
pub mod transport;
pub mod workflows;

pub use client::{OrgPilotClient, OrgPilotClientBuilder};
pub use endpoints::{Endpoint, EndpointKind};
pub use executor::ApiExecutor;
pub use requests::*;
pub use transport::{ApiRequest, MultipartFile, RawResponse, RequestBody, ReqwestTransport, Transport};
pub use workflows::{LinkOutcome, LocationCreation};
