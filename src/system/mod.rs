//! System core modules
//!
//! Hardware allocation and the channels tasks use to talk to each other.

pub mod event;
pub mod identity;
pub mod indicator;
pub mod resources;
pub mod shutdown;
