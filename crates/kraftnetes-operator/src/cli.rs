//! Command line interface of the operator binary.

use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use crate::{
    namespace::WatchNamespace,
    names::OPERATOR_NAME,
    workload::ports::DEFAULT_HOST_PORT_RANGE,
};

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Opts {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Print the custom resource definitions as YAML.
    Crd,

    /// Run the operator.
    Run(RunArguments),
}

#[derive(Debug, PartialEq, Eq, Args)]
pub struct RunArguments {
    /// Provides a specific namespace to watch (instead of watching all namespaces)
    #[arg(long, env, default_value = "")]
    pub watch_namespace: WatchNamespace,

    /// Field manager recorded on the objects created by the operator
    #[arg(long, env, default_value = OPERATOR_NAME)]
    pub field_manager: String,

    /// Delay before a game server is reconciled again after its game definition was not found or
    /// reconciliation failed
    #[arg(long, env, default_value = "10s", value_parser = humantime::parse_duration)]
    pub requeue_after: Duration,

    /// Image of the file browser sidecar
    #[arg(long, env, default_value = "filebrowser/filebrowser")]
    pub filebrowser_image: String,

    /// Size of the data volume if neither the game server nor its game definition set one
    #[arg(long, env, default_value = "10Gi")]
    pub fallback_volume_size: String,

    /// Lowest host port assigned to `HostPort` ports
    #[arg(long, env, default_value_t = *DEFAULT_HOST_PORT_RANGE.start())]
    pub host_port_min: u16,

    /// Highest host port assigned to `HostPort` ports
    #[arg(long, env, default_value_t = *DEFAULT_HOST_PORT_RANGE.end())]
    pub host_port_max: u16,
}
