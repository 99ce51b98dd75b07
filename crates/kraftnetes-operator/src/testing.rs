//! In-memory implementations of [`Store`] and [`EventSink`] for tests.

use std::{
    collections::BTreeMap,
    sync::{Mutex, MutexGuard},
};

use async_trait::async_trait;
use kube::ResourceExt;
use serde_json::Value;
use snafu::{OptionExt, ResultExt};

use crate::{
    client::{
        self, ChildObject, CreateObjectSnafu, GetObjectSnafu, MissingNamespaceSnafu,
        PatchStatusSnafu, Store,
    },
    crd::{GameDefinition, GameServer, GameServerStatus},
    events::{EventSink, GameServerEvent},
};

/// Store operations that can be made to fail.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Operation {
    Get,
    Create,
    PatchStatus,
}

#[derive(Default)]
struct State {
    game_definitions: BTreeMap<String, GameDefinition>,
    /// Objects keyed by kind, namespace and name.
    objects: BTreeMap<(String, String, String), Value>,
    created: Vec<(String, String)>,
    status_patches: Vec<GameServerStatus>,
    failures: Vec<(Operation, String)>,
}

#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
}

fn injected_failure(operation: Operation, kind: &str) -> kube::Error {
    kube::Error::Service(format!("injected {operation:?} failure for {kind}").into())
}

impl InMemoryStore {
    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn with_game_definition(self, definition: GameDefinition) -> Self {
        self.state()
            .game_definitions
            .insert(definition.name_any(), definition);
        self
    }

    pub fn insert<K: ChildObject>(&self, object: &K) {
        let key = (
            K::kind(&()).into_owned(),
            object.namespace().unwrap_or_default(),
            object.name_any(),
        );
        self.state()
            .objects
            .insert(key, serde_json::to_value(object).unwrap());
    }

    /// Makes every `operation` on objects of `kind` fail.
    pub fn fail(&self, operation: Operation, kind: &str) {
        self.state().failures.push((operation, kind.to_owned()));
    }

    pub fn object<K: ChildObject>(&self, name: &str, namespace: &str) -> Option<K> {
        self.state()
            .objects
            .get(&(K::kind(&()).into_owned(), namespace.to_owned(), name.to_owned()))
            .map(|value| serde_json::from_value(value.clone()).unwrap())
    }

    /// Kind and name of every created object, in creation order.
    pub fn created(&self) -> Vec<(String, String)> {
        self.state().created.clone()
    }

    pub fn status_patches(&self) -> Vec<GameServerStatus> {
        self.state().status_patches.clone()
    }

    fn check(&self, operation: Operation, kind: &str) -> Result<(), kube::Error> {
        let failing = self
            .state()
            .failures
            .iter()
            .any(|(failing, failing_kind)| *failing == operation && failing_kind == kind);
        if failing {
            Err(injected_failure(operation, kind))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn get_game_definition(&self, name: &str) -> client::Result<Option<GameDefinition>> {
        self.check(Operation::Get, "GameDefinition")
            .context(GetObjectSnafu {
                kind: "GameDefinition",
                name,
            })?;
        Ok(self.state().game_definitions.get(name).cloned())
    }

    async fn get_opt<K: ChildObject>(
        &self,
        name: &str,
        namespace: &str,
    ) -> client::Result<Option<K>> {
        let kind = K::kind(&());
        self.check(Operation::Get, &kind)
            .context(GetObjectSnafu { kind, name })?;
        Ok(self.object(name, namespace))
    }

    async fn create<K: ChildObject>(&self, object: &K) -> client::Result<K> {
        let kind = K::kind(&()).into_owned();
        let name = object.name_any();
        let namespace = object.namespace().context(MissingNamespaceSnafu {
            kind: kind.clone(),
            name: name.clone(),
        })?;
        self.check(Operation::Create, &kind)
            .context(CreateObjectSnafu {
                kind: kind.clone(),
                name: name.clone(),
            })?;

        let mut state = self.state();
        let key = (kind.clone(), namespace, name.clone());
        if state.objects.contains_key(&key) {
            return Err(kube::Error::Service("object already exists".into()))
                .context(CreateObjectSnafu { kind, name });
        }
        state
            .objects
            .insert(key, serde_json::to_value(object).unwrap());
        state.created.push((kind, name));
        Ok(object.clone())
    }

    async fn patch_status(
        &self,
        game_server: &GameServer,
        status: &GameServerStatus,
    ) -> client::Result<GameServer> {
        let name = game_server.name_any();
        self.check(Operation::PatchStatus, "GameServer")
            .context(PatchStatusSnafu { name })?;

        let mut updated = game_server.clone();
        updated.status = Some(status.clone());
        self.state().status_patches.push(status.clone());
        self.insert(&updated);
        Ok(updated)
    }
}

/// Records published events instead of sending them anywhere.
#[derive(Default)]
pub struct RecordingEventSink {
    events: Mutex<Vec<GameServerEvent>>,
}

impl RecordingEventSink {
    pub fn events(&self) -> Vec<GameServerEvent> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn reasons(&self) -> Vec<&'static str> {
        self.events().iter().map(GameServerEvent::reason).collect()
    }
}

#[async_trait]
impl EventSink for RecordingEventSink {
    async fn publish(&self, _game_server: &GameServer, event: GameServerEvent) {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event);
    }
}
