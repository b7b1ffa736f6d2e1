//! # bthost-host
//!
//! The pairing-and-credential coordination core of the bthost stack:
//! - Adapter/device registry with stable, generation-checked device keys
//! - Identity resolution from (controller address, peer address) pairs
//! - The multi-method pairing coordinator and its agent round trip
//! - The device lifecycle controller dispatching every controller event
//!
//! All handlers run to completion on one dispatch context; the only
//! suspension point is the external agent's asynchronous decision, which
//! re-enters through [`Host::agent_response`] (or the [`Host::run`] loop).

pub mod agent;
pub mod host;
pub mod link;
pub mod pairing;
pub mod registry;
pub mod resolver;

pub use agent::{AgentRequest, AgentResponse, PairingAgent, SessionToken};
pub use host::{Event, Host, HostInput};
pub use link::{ControllerLink, DiscoveryReport, DiscoverySink};
pub use pairing::{Method, INVALID_PASSKEY};
pub use registry::{Adapter, Device, DeviceKey, FixedPin, Registry};
