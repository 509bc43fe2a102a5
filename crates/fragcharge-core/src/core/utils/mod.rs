//! Shared numeric helpers.

pub mod geometry;
