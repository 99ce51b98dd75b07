//! A Kubernetes operator running game servers.
//!
//! Games are described once by a cluster-wide [`GameDefinition`](crd::GameDefinition). Every
//! [`GameServer`](crd::GameServer) instantiates one of them: its inputs are substituted into the
//! definition, a profile may be layered over it and the result is turned into a pod, services
//! and a volume claim owned by the game server.

pub mod builder;
pub mod cli;
pub mod client;
pub mod config;
pub mod controller;
pub mod crd;
pub mod events;
pub mod logging;
pub mod names;
pub mod namespace;
pub mod profile;
pub mod reconcile;
pub mod resolve;
pub mod workload;

#[cfg(test)]
mod testing;
