//! Utility modules

pub mod hedera_network;
pub mod local_network;
pub mod validation;

pub use hedera_network::*;
pub use local_network::*;
pub use validation::*;
