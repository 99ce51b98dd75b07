//! The `kraftnetes.com/v1alpha1` custom resources.
//!
//! A [`GameDefinition`] is a cluster-wide template describing how a game is run. A [`GameServer`]
//! requests one running instance of such a game, supplying inputs and overrides.

use std::collections::BTreeMap;

use k8s_openapi::{
    api::core::v1::{EnvVar, ResourceRequirements},
    apimachinery::pkg::util::intstr::IntOrString,
};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use self::value::{AnyValue, BoolOrString};

pub mod value;

pub const GROUP: &str = "kraftnetes.com";

/// Defines how a game is run: its image, ports, storage, presets and the inputs it expects.
#[derive(Clone, CustomResource, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[kube(
    group = "kraftnetes.com",
    version = "v1alpha1",
    kind = "GameDefinition",
    plural = "gamedefinitions",
    shortname = "gd",
    crates(
        kube_core = "kube::core",
        k8s_openapi = "k8s_openapi",
        schemars = "schemars"
    )
)]
#[serde(rename_all = "camelCase")]
pub struct GameDefinitionSpec {
    /// Identifier of the game, referenced by `GameServer.spec.game`.
    pub game: String,

    /// Container image of the game server.
    #[serde(default)]
    pub image: String,

    /// Whether a file browser sidecar is run next to the game server.
    #[serde(default, rename = "filebrowser")]
    pub file_browser: BoolOrString,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_strategy: Option<StopStrategy>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restart_strategy: Option<RestartStrategy>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<StorageConfig>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<GamePort>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<EnvVar>,

    /// Named presets which can be layered over this definition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profiles: Option<GameProfiles>,

    /// Inputs a `GameServer` can supply. They are referenced as `&{name}` anywhere in this spec.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub inputs: BTreeMap<String, GameInput>,
}

/// Controls how the game server is shut down.
#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StopStrategy {
    /// A line written to the game's console to stop it, for example `stop`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stdin: Option<String>,

    /// A command executed in the game container to stop it.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cmd: Vec<String>,

    /// How long the game may take to shut down, for example `30s`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shutdown_grace_period: Option<String>,
}

/// Controls how the game server is restarted, for example via an in-game command.
#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestartStrategy {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cmd: Vec<String>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageConfig {
    #[serde(default)]
    pub enabled: BoolOrString,

    /// Size of the volume claim unless the `GameServer` overrides it, for example `10Gi`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_size: Option<String>,
}

#[derive(Clone, Debug, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GamePort {
    pub name: String,

    /// The port inside the container. May be a placeholder resolving to a number.
    pub container_port: IntOrString,

    /// `TCP` (default), `UDP` or `SCTP`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,

    /// How the port is exposed, see [`PortExposure`].
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_: Option<String>,
}

/// The ways a [`GamePort`] can be exposed.
#[derive(Clone, Copy, Debug, Default, Display, EnumString, Eq, PartialEq)]
pub enum PortExposure {
    /// A random port of the node is forwarded to the container.
    HostPort,
    /// The primary service is of type `NodePort`.
    NodePort,
    /// Reachable from within the cluster only.
    #[default]
    ClusterIP,
}

impl GamePort {
    /// Unknown exposure types are treated as cluster-internal.
    pub fn exposure(&self) -> PortExposure {
        self.type_
            .as_deref()
            .and_then(|type_| type_.parse().ok())
            .unwrap_or_default()
    }
}

#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameProfiles {
    /// Profile applied when the `GameServer` does not choose one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<GameProfile>,
}

/// An overlay of a [`GameDefinitionSpec`].
///
/// Non-empty fields replace the base field, except `env`, which is merged by name, and
/// `filebrowser`, which always replaces the base flag.
#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameProfile {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    #[serde(default, rename = "filebrowser")]
    pub file_browser: BoolOrString,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_strategy: Option<StopStrategy>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restart_strategy: Option<RestartStrategy>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<StorageConfig>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<GamePort>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<EnvVar>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameInput {
    #[serde(default)]
    pub required: bool,

    /// Used when the `GameServer` does not supply a value. Must match the declared `type`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<AnyValue>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, rename = "type")]
    pub type_: InputType,
}

#[derive(
    Clone, Copy, Debug, Default, Deserialize, Display, Eq, JsonSchema, PartialEq, Serialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum InputType {
    #[default]
    String,
    Number,
    Boolean,
}

/// Requests a running instance of a [`GameDefinition`].
#[derive(Clone, CustomResource, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[kube(
    group = "kraftnetes.com",
    version = "v1alpha1",
    kind = "GameServer",
    plural = "gameservers",
    shortname = "gs",
    status = "GameServerStatus",
    namespaced,
    printcolumn = r#"{"name":"Game","type":"string","jsonPath":".spec.game"}"#,
    printcolumn = r#"{"name":"State","type":"string","jsonPath":".status.state"}"#,
    crates(
        kube_core = "kube::core",
        k8s_openapi = "k8s_openapi",
        schemars = "schemars"
    )
)]
#[serde(rename_all = "camelCase")]
pub struct GameServerSpec {
    /// Name of the [`GameDefinition`] to run.
    pub game: String,

    /// Profile of the game definition to apply. Defaults to the definition's default profile.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,

    /// Values for the inputs declared by the game definition.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub inputs: BTreeMap<String, AnyValue>,

    /// Overrides the size of the data volume, for example `20Gi`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_size: Option<String>,

    /// Overrides whether the file browser sidecar is run.
    #[serde(default, rename = "filebrowser", skip_serializing_if = "Option::is_none")]
    pub file_browser: Option<bool>,

    /// Whether the game's console is attached to a TTY. Defaults to `true`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub console: Option<bool>,

    /// Environment variables overriding those of the game definition.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<EnvVar>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceRequirements>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameServerStatus {
    /// Unset until the game server has been picked up by the operator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<GameServerState>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl GameServerStatus {
    pub fn new(state: GameServerState, message: impl Into<String>) -> Self {
        Self {
            state: Some(state),
            message: Some(message.into()),
        }
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Display, Eq, JsonSchema, PartialEq, Serialize)]
pub enum GameServerState {
    Pending,
    Running,
}
