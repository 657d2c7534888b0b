//! Basic value types shared by the state container and the offload pipeline.

pub mod flags;
pub mod geometry;
pub mod locality;
pub mod padded;
