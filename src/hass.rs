//! Home Assistant websocket client.

mod client;
mod protocol;

pub use client::{ClientSlot, EntitySubscription, HassClient, find_entity};
pub use protocol::*;
