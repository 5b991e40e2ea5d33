pub mod message;
pub mod negotiation;
pub mod offer;
