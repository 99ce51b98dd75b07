//! Deterministic names and labels of the objects owned by a [`GameServer`].
//!
//! Children are looked up by these names on every reconciliation, so they must never change for a
//! given game server.

use std::collections::BTreeMap;

use kube::ResourceExt;

use crate::crd::GameServer;

/// Label which, when set on a [`GameServer`], replaces its name in the names of its children.
pub const INSTANCE_ID_LABEL: &str = "kraftnetes-id";

pub const APP_NAME_LABEL: &str = "app.kubernetes.io/name";
pub const APP_INSTANCE_LABEL: &str = "app.kubernetes.io/instance";
pub const APP_MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";
pub const GAME_LABEL: &str = "kraftnetes.com/game";

pub const APP_NAME: &str = "gameserver";
pub const OPERATOR_NAME: &str = "kraftnetes-operator";

/// The identifier of a game server: its `kraftnetes-id` label, falling back to its name.
pub fn instance_id(game_server: &GameServer) -> String {
    game_server
        .labels()
        .get(INSTANCE_ID_LABEL)
        .filter(|id| !id.is_empty())
        .cloned()
        .unwrap_or_else(|| game_server.name_any())
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChildNames {
    pub instance_id: String,
    pub pod: String,
    pub pvc: String,
    pub service: String,
    pub filebrowser_service: String,
}

impl ChildNames {
    pub fn new(instance_id: impl Into<String>) -> Self {
        let instance_id = instance_id.into();
        Self {
            pod: format!("gs-{instance_id}-pod"),
            pvc: format!("gs-{instance_id}-pvc"),
            service: format!("gs-{instance_id}-service"),
            filebrowser_service: format!("gs-{instance_id}-filebrowser-service"),
            instance_id,
        }
    }

    pub fn for_game_server(game_server: &GameServer) -> Self {
        Self::new(instance_id(game_server))
    }

    /// Labels selecting the pod of this game server.
    pub fn selector_labels(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            (APP_NAME_LABEL.to_owned(), APP_NAME.to_owned()),
            (APP_INSTANCE_LABEL.to_owned(), self.instance_id.clone()),
        ])
    }

    /// Labels set on every child object.
    pub fn labels(&self, game: &str) -> BTreeMap<String, String> {
        let mut labels = self.selector_labels();
        labels.insert(APP_MANAGED_BY_LABEL.to_owned(), OPERATOR_NAME.to_owned());
        labels.insert(GAME_LABEL.to_owned(), game.to_owned());
        labels
    }
}
