use indexmap::IndexMap;
use k8s_openapi::{
    api::core::v1::{
        Container, ContainerPort, EnvVar, ExecAction, Lifecycle, LifecycleHandler, Pod, PodSpec,
        ResourceRequirements, Volume, VolumeMount,
    },
    apimachinery::pkg::apis::meta::v1::ObjectMeta,
};

/// A builder to build [`Container`] objects.
#[derive(Clone, Debug, Default)]
pub struct ContainerBuilder {
    args: Option<Vec<String>>,
    container_ports: Option<Vec<ContainerPort>>,
    env: Option<Vec<EnvVar>>,
    image: Option<String>,
    lifecycle: Option<Lifecycle>,
    name: String,
    resources: Option<ResourceRequirements>,
    stdin: Option<bool>,
    tty: Option<bool>,
    volume_mounts: Option<Vec<VolumeMount>>,
}

impl ContainerBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            ..Self::default()
        }
    }

    pub fn image(&mut self, image: impl Into<String>) -> &mut Self {
        self.image = Some(image.into());
        self
    }

    pub fn add_env_vars(&mut self, env_vars: Vec<EnvVar>) -> &mut Self {
        self.env.get_or_insert_with(Vec::new).extend(env_vars);
        self
    }

    pub fn args(&mut self, args: Vec<String>) -> &mut Self {
        self.args = Some(args);
        self
    }

    pub fn add_container_port(
        &mut self,
        name: impl Into<String>,
        port: i32,
        protocol: impl Into<String>,
    ) -> &mut Self {
        self.container_ports
            .get_or_insert_with(Vec::new)
            .push(ContainerPort {
                name: Some(name.into()),
                container_port: port,
                protocol: Some(protocol.into()),
                ..ContainerPort::default()
            });
        self
    }

    pub fn add_container_ports(&mut self, container_ports: Vec<ContainerPort>) -> &mut Self {
        self.container_ports
            .get_or_insert_with(Vec::new)
            .extend(container_ports);
        self
    }

    pub fn resources_opt(&mut self, resources: Option<ResourceRequirements>) -> &mut Self {
        self.resources = resources;
        self
    }

    pub fn add_volume_mount(
        &mut self,
        name: impl Into<String>,
        path: impl Into<String>,
    ) -> &mut Self {
        self.volume_mounts
            .get_or_insert_with(Vec::new)
            .push(VolumeMount {
                name: name.into(),
                mount_path: path.into(),
                ..VolumeMount::default()
            });
        self
    }

    /// Keeps stdin of the container open.
    pub fn stdin(&mut self, enabled: bool) -> &mut Self {
        self.stdin = Some(enabled);
        self
    }

    /// Allocates a TTY for the container, which also needs [`Self::stdin`] to be usable.
    pub fn tty(&mut self, enabled: bool) -> &mut Self {
        self.tty = Some(enabled);
        self
    }

    /// Runs `command` inside the container before it is sent the termination signal.
    pub fn pre_stop_command(&mut self, command: Vec<String>) -> &mut Self {
        self.lifecycle = Some(Lifecycle {
            pre_stop: Some(LifecycleHandler {
                exec: Some(ExecAction {
                    command: Some(command),
                }),
                ..LifecycleHandler::default()
            }),
            ..Lifecycle::default()
        });
        self
    }

    pub fn build(&self) -> Container {
        Container {
            args: self.args.clone(),
            env: self.env.clone(),
            image: self.image.clone(),
            lifecycle: self.lifecycle.clone(),
            name: self.name.clone(),
            ports: self.container_ports.clone(),
            resources: self.resources.clone(),
            stdin: self.stdin,
            tty: self.tty,
            volume_mounts: self.volume_mounts.clone(),
            ..Container::default()
        }
    }
}

/// A builder to build [`Pod`] objects.
///
/// Volumes are kept in an [`IndexMap`] keyed by name, so adding a volume twice keeps one copy and
/// the order stays stable between reconciliations.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PodBuilder {
    containers: Vec<Container>,
    metadata: Option<ObjectMeta>,
    termination_grace_period_seconds: Option<i64>,
    volumes: IndexMap<String, Volume>,
}

impl PodBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn metadata(&mut self, metadata: impl Into<ObjectMeta>) -> &mut Self {
        self.metadata = Some(metadata.into());
        self
    }

    pub fn add_container(&mut self, container: Container) -> &mut Self {
        self.containers.push(container);
        self
    }

    pub fn add_volume(&mut self, volume: Volume) -> &mut Self {
        self.volumes.insert(volume.name.clone(), volume);
        self
    }

    pub fn termination_grace_period_seconds(&mut self, seconds: i64) -> &mut Self {
        self.termination_grace_period_seconds = Some(seconds);
        self
    }

    pub fn build(&self) -> Pod {
        Pod {
            metadata: self.metadata.clone().unwrap_or_default(),
            spec: Some(PodSpec {
                containers: self.containers.clone(),
                termination_grace_period_seconds: self.termination_grace_period_seconds,
                volumes: (!self.volumes.is_empty())
                    .then(|| self.volumes.values().cloned().collect()),
                ..PodSpec::default()
            }),
            status: None,
        }
    }
}
