//! Ports layer: inbound API traits and outbound collaborator traits.

pub mod inbound;
pub mod outbound;

pub use inbound::*;
pub use outbound::*;
