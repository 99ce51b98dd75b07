use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use kube::{Resource, ResourceExt};
use snafu::{OptionExt, Snafu};

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, PartialEq, Eq, Snafu)]
pub enum Error {
    #[snafu(display("cannot reference {kind} {name:?} as owner, it has no name or uid"))]
    OwnerReferenceIncomplete { kind: String, name: String },
}

/// A builder to build [`ObjectMeta`] objects.
///
/// Of special interest is the [`Self::ownerreference_from_resource()`] function, children created
/// by the operator are always owned (and garbage collected) through it.
/// Note: This builder only supports a single `OwnerReference`.
#[derive(Clone, Debug, Default)]
pub struct ObjectMetaBuilder {
    name: Option<String>,
    namespace: Option<String>,
    ownerreference: Option<OwnerReference>,
    labels: Option<BTreeMap<String, String>>,
    annotations: Option<BTreeMap<String, String>>,
}

impl ObjectMetaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(&mut self, name: impl Into<String>) -> &mut Self {
        self.name = Some(name.into());
        self
    }

    pub fn namespace_opt(&mut self, namespace: impl Into<Option<String>>) -> &mut Self {
        self.namespace = namespace.into();
        self
    }

    /// Sets the controlling `OwnerReference` to the provided resource.
    pub fn ownerreference_from_resource<T: Resource<DynamicType = ()>>(
        &mut self,
        resource: &T,
    ) -> Result<&mut Self> {
        self.ownerreference = Some(resource.controller_owner_ref(&()).with_context(|| {
            OwnerReferenceIncompleteSnafu {
                kind: T::kind(&()).into_owned(),
                name: resource.name_any(),
            }
        })?);
        Ok(self)
    }

    /// This adds a single annotation to the existing annotations.
    /// It'll override an annotation with the same key.
    pub fn with_annotation(
        &mut self,
        annotation_key: impl Into<String>,
        annotation_value: impl Into<String>,
    ) -> &mut Self {
        self.annotations
            .get_or_insert_with(BTreeMap::new)
            .insert(annotation_key.into(), annotation_value.into());
        self
    }

    /// This adds multiple labels to the existing labels.
    /// Any existing label with a key that is contained in `labels` will be overwritten
    pub fn with_labels(&mut self, labels: BTreeMap<String, String>) -> &mut Self {
        self.labels.get_or_insert_with(BTreeMap::new).extend(labels);
        self
    }

    pub fn build(&self) -> ObjectMeta {
        ObjectMeta {
            name: self.name.clone(),
            namespace: self.namespace.clone(),
            owner_references: self
                .ownerreference
                .as_ref()
                .map(|ownerreference| vec![ownerreference.clone()]),
            labels: self.labels.clone(),
            annotations: self.annotations.clone(),
            ..ObjectMeta::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{GameServer, GameServerSpec};

    fn game_server(uid: Option<&str>) -> GameServer {
        let mut game_server = GameServer::new("survival", GameServerSpec::default());
        game_server.metadata.namespace = Some("games".to_owned());
        game_server.metadata.uid = uid.map(str::to_owned);
        game_server
    }

    #[test]
    fn objectmeta_builder() {
        let meta = ObjectMetaBuilder::new()
            .name("gs-survival-pod")
            .namespace_opt(Some("games".to_owned()))
            .ownerreference_from_resource(&game_server(Some("uid-1")))
            .unwrap()
            .with_labels(BTreeMap::from([("a".to_owned(), "b".to_owned())]))
            .with_annotation("foo", "bar")
            .build();

        assert_eq!(meta.name.as_deref(), Some("gs-survival-pod"));
        assert_eq!(meta.namespace.as_deref(), Some("games"));
        let owner = &meta.owner_references.unwrap()[0];
        assert_eq!(owner.kind, "GameServer");
        assert_eq!(owner.api_version, "kraftnetes.com/v1alpha1");
        assert_eq!(owner.name, "survival");
        assert_eq!(owner.uid, "uid-1");
        assert_eq!(owner.controller, Some(true));
        assert_eq!(meta.labels.unwrap()["a"], "b");
        assert_eq!(meta.annotations.unwrap()["foo"], "bar");
    }

    #[test]
    fn ownerreference_requires_uid() {
        let err = ObjectMetaBuilder::new()
            .ownerreference_from_resource(&game_server(None))
            .unwrap_err();
        assert_eq!(
            err,
            Error::OwnerReferenceIncomplete {
                kind: "GameServer".to_owned(),
                name: "survival".to_owned(),
            }
        );
    }
}
