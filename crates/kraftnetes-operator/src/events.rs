//! Kubernetes events published against a [`GameServer`] while it is reconciled.

use async_trait::async_trait;
use kube::{
    Resource,
    runtime::events::{Event, EventType, Recorder},
};
use strum::IntoStaticStr;
use tracing::{error, warn};

use crate::crd::{GameServer, GameServerState};

const ACTION: &str = "Reconcile";

/// A step of the reconciliation worth telling the owner of the game server about.
#[derive(Clone, Debug, PartialEq, Eq, IntoStaticStr)]
pub enum GameServerEvent {
    Initializing,
    ServiceCreated { name: String },
    FilebrowserServiceCreated { name: String },
    PvcCreated { name: String },
    PodCreated { name: String },
    StatusUpdated { state: GameServerState },
    GameDefinitionNotFound { game: String },
}

impl GameServerEvent {
    /// The `PascalCase` event reason.
    pub fn reason(&self) -> &'static str {
        self.into()
    }

    pub fn type_(&self) -> EventType {
        match self {
            Self::GameDefinitionNotFound { .. } => EventType::Warning,
            _ => EventType::Normal,
        }
    }

    pub fn note(&self) -> String {
        match self {
            Self::Initializing => "GameServer is pending initialization".to_owned(),
            Self::ServiceCreated { name } | Self::FilebrowserServiceCreated { name } => {
                format!("Created Service {name}")
            }
            Self::PvcCreated { name } => format!("Created PersistentVolumeClaim {name}"),
            Self::PodCreated { name } => format!("Created Pod {name}"),
            Self::StatusUpdated { state } => format!("GameServer is {state}"),
            Self::GameDefinitionNotFound { game } => {
                format!("GameDefinition {game:?} not found, retrying later")
            }
        }
    }

    fn to_event(&self) -> Event {
        Event {
            type_: self.type_(),
            reason: self.reason().to_owned(),
            note: Some(self.note()),
            action: ACTION.to_owned(),
            secondary: None,
        }
    }
}

/// Receives the [`GameServerEvent`]s of the reconciler.
///
/// Publishing is best effort, implementations log failures instead of returning them.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn publish(&self, game_server: &GameServer, event: GameServerEvent);
}

/// Publishes events to the Kubernetes API.
#[derive(Clone)]
pub struct KubeEventSink {
    recorder: Recorder,
}

impl KubeEventSink {
    pub fn new(recorder: Recorder) -> Self {
        Self { recorder }
    }
}

#[async_trait]
impl EventSink for KubeEventSink {
    async fn publish(&self, game_server: &GameServer, event: GameServerEvent) {
        if event.type_() == EventType::Warning {
            warn!(reason = event.reason(), note = %event.note(), "publishing event");
        }
        if let Err(err) = self
            .recorder
            .publish(&event.to_event(), &game_server.object_ref(&()))
            .await
        {
            error!(
                error = &err as &dyn std::error::Error,
                reason = event.reason(),
                "failed to publish event"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(GameServerEvent::Initializing, "Initializing", "GameServer is pending initialization")]
    #[case(
        GameServerEvent::FilebrowserServiceCreated { name: "gs-a-filebrowser-service".to_owned() },
        "FilebrowserServiceCreated",
        "Created Service gs-a-filebrowser-service"
    )]
    #[case(
        GameServerEvent::StatusUpdated { state: GameServerState::Running },
        "StatusUpdated",
        "GameServer is Running"
    )]
    fn event_contents(
        #[case] event: GameServerEvent,
        #[case] reason: &str,
        #[case] note: &str,
    ) {
        let event = event.to_event();
        assert_eq!(event.reason, reason);
        assert_eq!(event.note.as_deref(), Some(note));
        assert_eq!(event.type_, EventType::Normal);
    }

    #[test]
    fn missing_game_definition_is_a_warning() {
        let event = GameServerEvent::GameDefinitionNotFound {
            game: "minecraft".to_owned(),
        };
        assert_eq!(event.reason(), "GameDefinitionNotFound");
        assert_eq!(event.type_(), EventType::Warning);
    }
}
