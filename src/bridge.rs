//! Translation between the Home Assistant entity and the MPRIS surface.
//!
//! Inbound, `StateMapper` projects entity states onto the property store.
//! Outbound, the `Executor` turns dispatched commands into `media_player`
//! service calls.

mod executor;
mod metadata;
mod state;

pub use executor::{Executor, ServiceCaller, ServiceRequest, plan};
pub use metadata::{MetadataAssembler, TrackAttributes, seconds_to_micros};
pub use state::{ExternalState, SUPPORT_SEEK, StateMapper};

#[cfg(test)]
mod tests;
