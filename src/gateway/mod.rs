//! The gateway graph manager (spec.md §4.2, §2 component D): the
//! user-facing `create`/`add_module`/`remove_module`/`add_link`/
//! `remove_link`/`start`/`destroy` surface that keeps the broker's link
//! table consistent with the declared topology, including the `*`
//! wildcard source.

pub mod error;
pub mod events;
#[allow(clippy::module_inception)]
pub mod gateway;
pub mod types;

pub use error::GatewayError;
pub use events::{GatewayNotification, GatewaySubscription, WeakGateway};
pub use gateway::Gateway;
pub use types::{
    is_wildcard, GatewayLink, GatewayProperties, LinkEntry, LinkSource, ModuleEntry, WILDCARD,
};
