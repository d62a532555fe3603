//! # Resource Sample Library
//!
//! A users / addresses / photos API built on the resource framework, exposed for integration
//! testing.

pub mod lifecycle;
pub mod resources;
