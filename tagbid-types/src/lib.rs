//! tagbid-specific configuration primitives, validation, and the shared error type.
#![warn(missing_docs)]

mod capability;
mod config;
mod connector;
mod error;

pub use capability::{Analytics, SupportedOptions, TargetingType};
pub use config::{
    PartnerConfig, PriceBucket, RoundingConfig, RoundingType, TargetKeyOverride, TargetingKeys,
    XSlot,
};
pub use connector::GatewayKey;
pub use error::TagbidError;
