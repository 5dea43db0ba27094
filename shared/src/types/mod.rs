//! Types shared between the engine and its consumers

pub mod category;
pub mod events;
