//! Derivation of the concrete child objects of a [`GameServer`].
//!
//! [`ResolvedGameServer`] combines the resolved and profile-merged [`GameDefinitionSpec`] with the
//! overrides of the game server. It is recomputed on every reconciliation and never stored.

use std::ops::RangeInclusive;

use k8s_openapi::{
    api::core::v1::{
        ContainerPort, EmptyDirVolumeSource, EnvVar, PersistentVolumeClaim, PersistentVolumeClaimSpec,
        PersistentVolumeClaimVolumeSource, Pod, ResourceRequirements, Service, ServicePort,
        ServiceSpec, Volume, VolumeResourceRequirements,
    },
    apimachinery::pkg::{api::resource::Quantity, util::intstr::IntOrString},
};
use kube::ResourceExt;
use rand::Rng;
use snafu::{ResultExt, Snafu};
use tracing::debug;

use crate::{
    builder::{
        meta::{self, ObjectMetaBuilder},
        pod::{ContainerBuilder, PodBuilder},
    },
    config::OperatorConfig,
    crd::{GameDefinitionSpec, GamePort, GameServer, PortExposure, StopStrategy, value},
    names::ChildNames,
};

pub mod env;
pub mod ports;

pub const GAME_CONTAINER_NAME: &str = "game-server";
pub const FILEBROWSER_CONTAINER_NAME: &str = "filebrowser";
pub const FILEBROWSER_PORT: i32 = 8077;
pub const DATA_VOLUME_NAME: &str = "game-data";
pub const GAME_DATA_MOUNT_PATH: &str = "/data";
pub const FILEBROWSER_MOUNT_PATH: &str = "/srv";
pub const RESTART_COMMAND_ANNOTATION: &str = "kraftnetes.com/restart-cmd";

const DEFAULT_PROTOCOL: &str = "TCP";

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("invalid filebrowser flag"))]
    InvalidFileBrowserFlag { source: value::ParseBoolError },

    #[snafu(display("invalid storage flag"))]
    InvalidStorageFlag { source: value::ParseBoolError },

    #[snafu(display("port {name:?} has container port {value:?}, expected a number in 1..=65535"))]
    InvalidPort { name: String, value: String },

    #[snafu(display("invalid shutdown grace period {value:?}"))]
    InvalidGracePeriod {
        value: String,
        source: humantime::DurationError,
    },

    #[snafu(display("failed to serialize the restart command"))]
    SerializeRestartCommand { source: serde_json::Error },

    #[snafu(display("failed to build metadata of {name:?}"))]
    BuildMetadata { name: String, source: meta::Error },
}

/// A port of the game container after substitution.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedPort {
    pub name: String,
    pub container_port: i32,
    pub protocol: String,
    pub exposure: PortExposure,
}

impl TryFrom<&GamePort> for ResolvedPort {
    type Error = Error;

    fn try_from(port: &GamePort) -> Result<Self> {
        let container_port = match &port.container_port {
            IntOrString::Int(number) => Some(*number),
            IntOrString::String(text) => text.trim().parse().ok(),
        }
        .filter(|number| (1..=65535).contains(number));
        let Some(container_port) = container_port else {
            return InvalidPortSnafu {
                name: port.name.clone(),
                value: match &port.container_port {
                    IntOrString::Int(number) => number.to_string(),
                    IntOrString::String(text) => text.clone(),
                },
            }
            .fail();
        };

        Ok(Self {
            name: port.name.clone(),
            container_port,
            protocol: port
                .protocol
                .clone()
                .filter(|protocol| !protocol.is_empty())
                .unwrap_or_else(|| DEFAULT_PROTOCOL.to_owned()),
            exposure: port.exposure(),
        })
    }
}

/// Everything needed to build the children of one [`GameServer`].
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedGameServer {
    pub names: ChildNames,
    pub namespace: Option<String>,
    pub game: String,
    pub image: String,
    pub console: bool,
    pub file_browser: bool,
    pub file_browser_image: String,
    /// Size of the data volume claim, [`None`] if storage is disabled.
    pub volume_size: Option<Quantity>,
    pub ports: Vec<ResolvedPort>,
    pub host_port_range: RangeInclusive<u16>,
    pub env: Vec<EnvVar>,
    pub resources: Option<ResourceRequirements>,
    pub pre_stop_command: Option<Vec<String>>,
    /// Whether the pre-stop hook writes the stop line to the stdin of the game process.
    pub stop_via_stdin: bool,
    pub termination_grace_period_seconds: Option<i64>,
    pub restart_command: Vec<String>,
}

impl ResolvedGameServer {
    /// Applies the overrides of `game_server` to the merged definition `merged`.
    pub fn new(
        game_server: &GameServer,
        merged: GameDefinitionSpec,
        config: &OperatorConfig,
    ) -> Result<Self> {
        let spec = &game_server.spec;

        let file_browser = match spec.file_browser {
            Some(file_browser) => file_browser,
            None => merged
                .file_browser
                .as_bool()
                .context(InvalidFileBrowserFlagSnafu)?,
        };

        let storage_enabled = match &merged.storage {
            Some(storage) => storage.enabled.as_bool().context(InvalidStorageFlagSnafu)?,
            None => false,
        };
        let volume_size = storage_enabled.then(|| {
            spec.volume_size
                .as_deref()
                .into_iter()
                .chain(
                    merged
                        .storage
                        .as_ref()
                        .and_then(|storage| storage.default_size.as_deref()),
                )
                .find(|size| !size.is_empty())
                .map_or_else(
                    || config.fallback_volume_size.clone(),
                    |size| Quantity(size.to_owned()),
                )
        });

        let ports = merged
            .ports
            .iter()
            .map(ResolvedPort::try_from)
            .collect::<Result<Vec<_>>>()?;

        let stop_hooks = match &merged.stop_strategy {
            Some(stop_strategy) => StopHooks::try_from(stop_strategy)?,
            None => StopHooks::default(),
        };

        let resolved = Self {
            names: ChildNames::for_game_server(game_server),
            namespace: game_server.namespace(),
            game: merged.game,
            image: merged.image,
            console: spec.console.unwrap_or(true),
            file_browser,
            file_browser_image: config.filebrowser_image.clone(),
            volume_size,
            ports,
            host_port_range: config.host_port_range.clone(),
            env: env::merge_env_vars(merged.env, spec.env.clone()),
            resources: spec.resources.clone(),
            pre_stop_command: stop_hooks.command,
            stop_via_stdin: stop_hooks.via_stdin,
            termination_grace_period_seconds: stop_hooks.grace_period_seconds,
            restart_command: merged
                .restart_strategy
                .map(|restart_strategy| restart_strategy.cmd)
                .unwrap_or_default(),
        };
        debug!(
            instance = %resolved.names.instance_id,
            file_browser = resolved.file_browser,
            storage = resolved.volume_size.is_some(),
            ports = resolved.ports.len(),
            "resolved game server"
        );
        Ok(resolved)
    }

    pub fn storage_enabled(&self) -> bool {
        self.volume_size.is_some()
    }

    fn metadata(&self, owner: &GameServer, name: &str) -> Result<ObjectMetaBuilder> {
        let mut builder = ObjectMetaBuilder::new();
        builder
            .name(name)
            .namespace_opt(self.namespace.clone())
            .with_labels(self.names.labels(&self.game))
            .ownerreference_from_resource(owner)
            .context(BuildMetadataSnafu { name })?;
        Ok(builder)
    }

    /// The primary service, [`None`] if the game declares no ports.
    ///
    /// It is a `NodePort` service as soon as one port asks for it.
    pub fn build_game_service(&self, owner: &GameServer) -> Result<Option<Service>> {
        if self.ports.is_empty() {
            return Ok(None);
        }

        let service_type = if self
            .ports
            .iter()
            .any(|port| port.exposure == PortExposure::NodePort)
        {
            PortExposure::NodePort
        } else {
            PortExposure::ClusterIP
        };

        Ok(Some(Service {
            metadata: self.metadata(owner, &self.names.service)?.build(),
            spec: Some(ServiceSpec {
                type_: Some(service_type.to_string()),
                selector: Some(self.names.selector_labels()),
                ports: Some(
                    self.ports
                        .iter()
                        .map(|port| ServicePort {
                            name: Some(port.name.clone()),
                            port: port.container_port,
                            target_port: Some(IntOrString::Int(port.container_port)),
                            protocol: Some(port.protocol.clone()),
                            ..ServicePort::default()
                        })
                        .collect(),
                ),
                ..ServiceSpec::default()
            }),
            status: None,
        }))
    }

    /// The cluster-internal service of the file browser, [`None`] if it is disabled.
    pub fn build_filebrowser_service(&self, owner: &GameServer) -> Result<Option<Service>> {
        if !self.file_browser {
            return Ok(None);
        }

        Ok(Some(Service {
            metadata: self
                .metadata(owner, &self.names.filebrowser_service)?
                .build(),
            spec: Some(ServiceSpec {
                type_: Some(PortExposure::ClusterIP.to_string()),
                selector: Some(self.names.selector_labels()),
                ports: Some(vec![ServicePort {
                    name: Some(FILEBROWSER_CONTAINER_NAME.to_owned()),
                    port: FILEBROWSER_PORT,
                    target_port: Some(IntOrString::Int(FILEBROWSER_PORT)),
                    protocol: Some(DEFAULT_PROTOCOL.to_owned()),
                    ..ServicePort::default()
                }]),
                ..ServiceSpec::default()
            }),
            status: None,
        }))
    }

    /// The claim backing the data volume, [`None`] if storage is disabled.
    pub fn build_pvc(&self, owner: &GameServer) -> Result<Option<PersistentVolumeClaim>> {
        let Some(volume_size) = &self.volume_size else {
            return Ok(None);
        };

        Ok(Some(PersistentVolumeClaim {
            metadata: self.metadata(owner, &self.names.pvc)?.build(),
            spec: Some(PersistentVolumeClaimSpec {
                access_modes: Some(vec!["ReadWriteOnce".to_owned()]),
                resources: Some(VolumeResourceRequirements {
                    requests: Some([("storage".to_owned(), volume_size.clone())].into()),
                    ..VolumeResourceRequirements::default()
                }),
                ..PersistentVolumeClaimSpec::default()
            }),
            status: None,
        }))
    }

    fn container_ports<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<ContainerPort> {
        self.ports
            .iter()
            .map(|port| {
                let host_port = (port.exposure == PortExposure::HostPort)
                    .then(|| ports::assign_host_port(rng, &self.host_port_range));
                if let Some(host_port) = host_port {
                    debug!(port = %port.name, host_port, "assigned host port");
                }
                ContainerPort {
                    name: Some(port.name.clone()),
                    container_port: port.container_port,
                    host_port,
                    protocol: Some(port.protocol.clone()),
                    ..ContainerPort::default()
                }
            })
            .collect()
    }

    /// The game pod. Host ports are drawn from `rng`.
    pub fn build_pod<R: Rng + ?Sized>(&self, owner: &GameServer, rng: &mut R) -> Result<Pod> {
        let mut metadata = self.metadata(owner, &self.names.pod)?;
        if !self.restart_command.is_empty() {
            metadata.with_annotation(
                RESTART_COMMAND_ANNOTATION,
                serde_json::to_string(&self.restart_command)
                    .context(SerializeRestartCommandSnafu)?,
            );
        }

        let mut game = ContainerBuilder::new(GAME_CONTAINER_NAME);
        game.image(&self.image)
            .stdin(self.console || self.stop_via_stdin)
            .tty(self.console && !self.stop_via_stdin)
            .add_env_vars(self.env.clone())
            .resources_opt(self.resources.clone());
        if !self.ports.is_empty() {
            game.add_container_ports(self.container_ports(rng));
        }
        if let Some(command) = &self.pre_stop_command {
            game.pre_stop_command(command.clone());
        }

        let mut pod = PodBuilder::new();
        if self.storage_enabled() {
            game.add_volume_mount(DATA_VOLUME_NAME, GAME_DATA_MOUNT_PATH);
            pod.add_volume(Volume {
                name: DATA_VOLUME_NAME.to_owned(),
                persistent_volume_claim: Some(PersistentVolumeClaimVolumeSource {
                    claim_name: self.names.pvc.clone(),
                    read_only: None,
                }),
                ..Volume::default()
            });
        } else if self.file_browser {
            // Without a claim the file browser still shares a scratch volume with the game.
            game.add_volume_mount(DATA_VOLUME_NAME, GAME_DATA_MOUNT_PATH);
            pod.add_volume(Volume {
                name: DATA_VOLUME_NAME.to_owned(),
                empty_dir: Some(EmptyDirVolumeSource::default()),
                ..Volume::default()
            });
        }

        pod.metadata(metadata.build()).add_container(game.build());

        if self.file_browser {
            pod.add_container(
                ContainerBuilder::new(FILEBROWSER_CONTAINER_NAME)
                    .image(&self.file_browser_image)
                    .args(vec!["--port".to_owned(), FILEBROWSER_PORT.to_string()])
                    .add_container_port(
                        FILEBROWSER_CONTAINER_NAME,
                        FILEBROWSER_PORT,
                        DEFAULT_PROTOCOL,
                    )
                    .add_volume_mount(DATA_VOLUME_NAME, FILEBROWSER_MOUNT_PATH)
                    .build(),
            );
        }
        if let Some(seconds) = self.termination_grace_period_seconds {
            pod.termination_grace_period_seconds(seconds);
        }

        Ok(pod.build())
    }
}

/// The pre-stop hook and termination grace period derived from a [`StopStrategy`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
struct StopHooks {
    command: Option<Vec<String>>,
    via_stdin: bool,
    grace_period_seconds: Option<i64>,
}

impl TryFrom<&StopStrategy> for StopHooks {
    type Error = Error;

    /// An explicit command wins over a stdin line.
    ///
    /// The stdin line is written to `/proc/1/fd/0` of the game container. This only reaches the
    /// game process while its stdin is a pipe, so such containers keep stdin open and run without
    /// a TTY (a TTY turns the write into terminal output).
    fn try_from(stop_strategy: &StopStrategy) -> Result<Self> {
        let grace_period_seconds = stop_strategy
            .shutdown_grace_period
            .as_deref()
            .filter(|value| !value.is_empty())
            .map(|value| {
                humantime::parse_duration(value)
                    .map(|duration| i64::try_from(duration.as_secs()).unwrap_or(i64::MAX))
                    .context(InvalidGracePeriodSnafu { value })
            })
            .transpose()?;

        if !stop_strategy.cmd.is_empty() {
            return Ok(Self {
                command: Some(stop_strategy.cmd.clone()),
                via_stdin: false,
                grace_period_seconds,
            });
        }

        let command = stop_strategy
            .stdin
            .as_deref()
            .filter(|line| !line.is_empty())
            .map(|line| {
                debug!("stop line is sent through stdin, the game runs without a TTY");
                vec![
                    "sh".to_owned(),
                    "-c".to_owned(),
                    format!("echo {} > /proc/1/fd/0", shell_quote(line)),
                ]
            });
        Ok(Self {
            via_stdin: command.is_some(),
            command,
            grace_period_seconds,
        })
    }
}

fn shell_quote(text: &str) -> String {
    format!("'{}'", text.replace('\'', r"'\''"))
}
