//! Builders for the Kubernetes objects owned by a game server.

pub mod meta;
pub mod pod;
