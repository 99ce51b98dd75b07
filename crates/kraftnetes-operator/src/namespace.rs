//! The namespace(s) the operator watches.

use std::fmt;

use k8s_openapi::NamespaceResourceScope;
use kube::{Api, Resource};

/// Where the operator looks for game servers and their children.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub enum WatchNamespace {
    #[default]
    All,
    One(String),
}

/// An empty or blank namespace means all namespaces.
impl From<&str> for WatchNamespace {
    fn from(namespace: &str) -> Self {
        match namespace.trim() {
            "" => Self::All,
            namespace => Self::One(namespace.to_owned()),
        }
    }
}

impl fmt::Display for WatchNamespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("all namespaces"),
            Self::One(namespace) => write!(f, "namespace {namespace:?}"),
        }
    }
}

impl WatchNamespace {
    /// An [`Api`] scoped to the watched namespace.
    pub fn get_api<K>(&self, client: &kube::Client) -> Api<K>
    where
        K: Resource<DynamicType = (), Scope = NamespaceResourceScope>,
    {
        match self {
            Self::All => Api::all(client.clone()),
            Self::One(namespace) => Api::namespaced(client.clone(), namespace),
        }
    }
}
