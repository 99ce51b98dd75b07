//! Access to the Kubernetes API.
//!
//! The reconciler only talks to the cluster through the [`Store`] trait, which [`Client`]
//! implements on top of [`kube::Client`].

use std::fmt::Debug;

use async_trait::async_trait;
use k8s_openapi::NamespaceResourceScope;
use kube::{
    Api, Resource, ResourceExt,
    api::{Patch, PatchParams, PostParams},
};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::json;
use snafu::{OptionExt, ResultExt, Snafu};
use tracing::trace;

use crate::crd::{GameDefinition, GameServer, GameServerStatus};

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("failed to get {kind} {name:?}"))]
    GetObject {
        kind: String,
        name: String,
        source: kube::Error,
    },

    #[snafu(display("failed to create {kind} {name:?}"))]
    CreateObject {
        kind: String,
        name: String,
        source: kube::Error,
    },

    #[snafu(display("cannot create {kind} {name:?} without a namespace"))]
    MissingNamespace { kind: String, name: String },

    #[snafu(display("failed to patch status of GameServer {name:?}"))]
    PatchStatus { name: String, source: kube::Error },
}

/// A namespaced object the operator reads or creates.
pub trait ChildObject:
    Resource<DynamicType = (), Scope = NamespaceResourceScope>
    + Clone
    + Debug
    + DeserializeOwned
    + Serialize
    + Send
    + Sync
    + 'static
{
}

impl<K> ChildObject for K where
    K: Resource<DynamicType = (), Scope = NamespaceResourceScope>
        + Clone
        + Debug
        + DeserializeOwned
        + Serialize
        + Send
        + Sync
        + 'static
{
}

/// The object store operations used by the reconciler.
///
/// Lookups return [`None`] when the object does not exist, every other failure is an error.
#[async_trait]
pub trait Store: Send + Sync {
    async fn get_game_definition(&self, name: &str) -> Result<Option<GameDefinition>>;

    async fn get_opt<K: ChildObject>(&self, name: &str, namespace: &str) -> Result<Option<K>>;

    /// Creates `object` in its own namespace.
    async fn create<K: ChildObject>(&self, object: &K) -> Result<K>;

    /// Replaces the status of `game_server` using a merge patch on the status subresource.
    async fn patch_status(
        &self,
        game_server: &GameServer,
        status: &GameServerStatus,
    ) -> Result<GameServer>;
}

/// This `Client` can be used to access Kubernetes.
/// It wraps an underlying [`kube::Client`] and records every write under the operator's field
/// manager.
#[derive(Clone)]
pub struct Client {
    client: kube::Client,
    post_params: PostParams,
    patch_params: PatchParams,
}

impl Client {
    pub fn new(client: kube::Client, field_manager: impl Into<String>) -> Self {
        let field_manager = field_manager.into();
        Self {
            client,
            post_params: PostParams {
                field_manager: Some(field_manager.clone()),
                ..PostParams::default()
            },
            patch_params: PatchParams {
                field_manager: Some(field_manager),
                ..PatchParams::default()
            },
        }
    }

    fn namespaced_api<K>(&self, namespace: &str) -> Api<K>
    where
        K: Resource<DynamicType = (), Scope = NamespaceResourceScope>,
    {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait]
impl Store for Client {
    async fn get_game_definition(&self, name: &str) -> Result<Option<GameDefinition>> {
        Api::<GameDefinition>::all(self.client.clone())
            .get_opt(name)
            .await
            .with_context(|_| GetObjectSnafu {
                kind: GameDefinition::kind(&()),
                name,
            })
    }

    async fn get_opt<K: ChildObject>(&self, name: &str, namespace: &str) -> Result<Option<K>> {
        self.namespaced_api::<K>(namespace)
            .get_opt(name)
            .await
            .with_context(|_| GetObjectSnafu {
                kind: K::kind(&()),
                name,
            })
    }

    async fn create<K: ChildObject>(&self, object: &K) -> Result<K> {
        let name = object.name_any();
        let namespace = object.namespace().with_context(|| MissingNamespaceSnafu {
            kind: K::kind(&()),
            name: name.clone(),
        })?;
        trace!(kind = %K::kind(&()), %name, %namespace, "creating object");

        self.namespaced_api::<K>(&namespace)
            .create(&self.post_params, object)
            .await
            .with_context(|_| CreateObjectSnafu {
                kind: K::kind(&()),
                name,
            })
    }

    async fn patch_status(
        &self,
        game_server: &GameServer,
        status: &GameServerStatus,
    ) -> Result<GameServer> {
        let name = game_server.name_any();
        let api = match game_server.namespace() {
            Some(namespace) => self.namespaced_api::<GameServer>(&namespace),
            None => Api::default_namespaced(self.client.clone()),
        };
        api.patch_status(
            &name,
            &self.patch_params,
            &Patch::Merge(json!({ "status": status })),
        )
        .await
        .context(PatchStatusSnafu { name })
    }
}
