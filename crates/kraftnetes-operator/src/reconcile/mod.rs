//! Reconciliation of a single [`GameServer`].
//!
//! Each pass marks a new game server as pending, loads and resolves its [`GameDefinition`] and then
//! runs the [`EnsureStep`]s in order. Every step only creates what is missing, so a pass can be
//! repeated from scratch at any time. The first failing step ends the pass, and whatever earlier
//! steps created stays in place for the next attempt.
//!
//! [`GameDefinition`]: crate::crd::GameDefinition

use std::{sync::Arc, time::Duration};

use k8s_openapi::api::core::v1::{PersistentVolumeClaim, Pod, Service};
use kube::{
    ResourceExt,
    core::DynamicObject,
    runtime::{controller::Action, reflector::ObjectRef},
};
use snafu::{OptionExt, ResultExt, Snafu};
use strum::{EnumDiscriminants, IntoStaticStr};
use tracing::{debug, info};

use crate::{
    client::{self, Store},
    config::OperatorConfig,
    crd::{GameServer, GameServerState, GameServerStatus},
    events::{EventSink, GameServerEvent},
    logging::controller::ReconcilerError,
    profile, resolve,
    workload::{self, ResolvedGameServer},
};

pub use self::ensure::EnsureError;

mod ensure;

pub const CONTROLLER_NAME: &str = "gameserver";

pub const PENDING_MESSAGE: &str = "GameServer is pending initialization";
pub const RUNNING_MESSAGE: &str = "Pod is active";

type Result<T, E = Error> = std::result::Result<T, E>;

/// Everything a reconciliation needs besides the game server itself.
pub struct Ctx<S, E> {
    pub store: S,
    pub events: E,
    pub config: OperatorConfig,
}

#[derive(Snafu, Debug, EnumDiscriminants)]
#[strum_discriminants(derive(IntoStaticStr))]
pub enum Error {
    #[snafu(display("GameServer has no namespace"))]
    ObjectHasNoNamespace,

    #[snafu(display("failed to set the initial status"))]
    InitializeStatus { source: client::Error },

    #[snafu(display("failed to fetch GameDefinition {game:?}"))]
    FetchGameDefinition { game: String, source: client::Error },

    #[snafu(display("failed to resolve the inputs of GameDefinition {game:?}"))]
    ResolveInputs { game: String, source: resolve::Error },

    #[snafu(display("failed to apply the game profile"))]
    ApplyProfile { source: profile::Error },

    #[snafu(display("failed to derive the workload"))]
    DeriveWorkload { source: workload::Error },

    #[snafu(display("failed to ensure the game service"))]
    EnsureService {
        service: ObjectRef<Service>,
        source: EnsureError,
    },

    #[snafu(display("failed to ensure the filebrowser service"))]
    EnsureFilebrowserService {
        service: ObjectRef<Service>,
        source: EnsureError,
    },

    #[snafu(display("failed to ensure the data volume claim"))]
    EnsureVolumeClaim {
        pvc: ObjectRef<PersistentVolumeClaim>,
        source: EnsureError,
    },

    #[snafu(display("failed to ensure the pod"))]
    EnsurePod {
        pod: ObjectRef<Pod>,
        source: EnsureError,
    },

    #[snafu(display("failed to update the status"))]
    UpdateStatus { source: client::Error },
}

impl ReconcilerError for Error {
    fn category(&self) -> &'static str {
        ErrorDiscriminants::from(self).into()
    }

    fn secondary_object(&self) -> Option<ObjectRef<DynamicObject>> {
        match self {
            Self::EnsureService { service, .. } | Self::EnsureFilebrowserService { service, .. } => {
                Some(service.clone().erase())
            }
            Self::EnsureVolumeClaim { pvc, .. } => Some(pvc.clone().erase()),
            Self::EnsurePod { pod, .. } => Some(pod.clone().erase()),
            Self::ObjectHasNoNamespace
            | Self::InitializeStatus { .. }
            | Self::FetchGameDefinition { .. }
            | Self::ResolveInputs { .. }
            | Self::ApplyProfile { .. }
            | Self::DeriveWorkload { .. }
            | Self::UpdateStatus { .. } => None,
        }
    }
}

/// The outcome of one step of the pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReconcileFunctionAction {
    /// Run the next step
    Continue,
    /// Skip the remaining steps
    Done,
    /// Skip the remaining steps and queue this object again
    Requeue(Duration),
}

/// The ensure steps, in the order they run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::Display)]
enum EnsureStep {
    Services,
    VolumeClaim,
    Pod,
    Status,
}

impl EnsureStep {
    const ORDER: [Self; 4] = [Self::Services, Self::VolumeClaim, Self::Pod, Self::Status];
}

/// A single reconciliation pass over the game server.
struct Pass<'a, S, E> {
    ctx: &'a Ctx<S, E>,
    game_server: GameServer,
    namespace: String,
}

pub async fn reconcile<S, E>(game_server: Arc<GameServer>, ctx: Arc<Ctx<S, E>>) -> Result<Action>
where
    S: Store,
    E: EventSink,
{
    debug!(game_server = %game_server.name_any(), "reconciling GameServer");
    let namespace = game_server.namespace().context(ObjectHasNoNamespaceSnafu)?;
    let mut pass = Pass {
        ctx: &ctx,
        game_server: game_server.as_ref().clone(),
        namespace,
    };

    pass.ensure_initial_status().await?;

    let resolved = match pass.resolve().await? {
        Ok(resolved) => resolved,
        Err(action) => return Ok(action.into()),
    };

    for step in EnsureStep::ORDER {
        debug!(%step, "running ensure step");
        match pass.run(step, &resolved).await? {
            ReconcileFunctionAction::Continue => {}
            ReconcileFunctionAction::Done => break,
            ReconcileFunctionAction::Requeue(delay) => return Ok(Action::requeue(delay)),
        }
    }

    Ok(Action::await_change())
}

/// Retries failed reconciliations after the configured delay.
pub fn error_policy<S, E>(
    _game_server: Arc<GameServer>,
    _error: &Error,
    ctx: Arc<Ctx<S, E>>,
) -> Action {
    Action::requeue(ctx.config.requeue_after)
}

impl From<ReconcileFunctionAction> for Action {
    fn from(action: ReconcileFunctionAction) -> Self {
        match action {
            ReconcileFunctionAction::Continue | ReconcileFunctionAction::Done => {
                Self::await_change()
            }
            ReconcileFunctionAction::Requeue(delay) => Self::requeue(delay),
        }
    }
}

impl<S, E> Pass<'_, S, E>
where
    S: Store,
    E: EventSink,
{
    async fn publish(&self, event: GameServerEvent) {
        self.ctx.events.publish(&self.game_server, event).await;
    }

    async fn set_status(&mut self, status: GameServerStatus) -> Result<(), client::Error> {
        let updated = self
            .ctx
            .store
            .patch_status(&self.game_server, &status)
            .await?;
        // Keep the local copy current even if the store returns a stale object.
        self.game_server = updated;
        self.game_server.status = Some(status);
        Ok(())
    }

    /// Marks a game server that has never been seen before as pending.
    async fn ensure_initial_status(&mut self) -> Result<()> {
        let has_state = self
            .game_server
            .status
            .as_ref()
            .is_some_and(|status| status.state.is_some());
        if has_state {
            return Ok(());
        }

        self.set_status(GameServerStatus::new(
            GameServerState::Pending,
            PENDING_MESSAGE,
        ))
        .await
        .context(InitializeStatusSnafu)?;
        self.publish(GameServerEvent::Initializing).await;
        Ok(())
    }

    /// Loads the game definition and derives the workload from it.
    ///
    /// A missing definition is not an error, the game server is retried later instead.
    async fn resolve(
        &self,
    ) -> Result<std::result::Result<ResolvedGameServer, ReconcileFunctionAction>> {
        let game = &self.game_server.spec.game;
        let Some(definition) = self
            .ctx
            .store
            .get_game_definition(game)
            .await
            .context(FetchGameDefinitionSnafu { game })?
        else {
            info!(%game, "GameDefinition not found, requeueing");
            self.publish(GameServerEvent::GameDefinitionNotFound { game: game.clone() })
                .await;
            return Ok(Err(ReconcileFunctionAction::Requeue(
                self.ctx.config.requeue_after,
            )));
        };

        let resolved = resolve::resolve(&definition.spec, &self.game_server.spec)
            .context(ResolveInputsSnafu { game })?;
        let profile_name = profile::effective_profile_name(&resolved, &self.game_server.spec)
            .map(str::to_owned);
        let merged =
            profile::apply_profile(resolved, profile_name.as_deref()).context(ApplyProfileSnafu)?;

        ResolvedGameServer::new(&self.game_server, merged, &self.ctx.config)
            .context(DeriveWorkloadSnafu)
            .map(Ok)
    }

    async fn run(
        &mut self,
        step: EnsureStep,
        resolved: &ResolvedGameServer,
    ) -> Result<ReconcileFunctionAction> {
        match step {
            EnsureStep::Services => self.ensure_services(resolved).await,
            EnsureStep::VolumeClaim => self.ensure_volume_claim(resolved).await,
            EnsureStep::Pod => self.ensure_pod(resolved).await,
            EnsureStep::Status => self.ensure_running_status().await,
        }
    }

    async fn ensure_services(
        &self,
        resolved: &ResolvedGameServer,
    ) -> Result<ReconcileFunctionAction> {
        let names = &resolved.names;

        if resolved.ports.is_empty() {
            debug!("no ports declared, skipping the game service");
        } else {
            let created = ensure::ensure_child(
                &self.ctx.store,
                &names.service,
                &self.namespace,
                || resolved.build_game_service(&self.game_server),
            )
            .await
            .with_context(|_| EnsureServiceSnafu {
                service: ObjectRef::new(&names.service).within(&self.namespace),
            })?;
            if created.is_some() {
                self.publish(GameServerEvent::ServiceCreated {
                    name: names.service.clone(),
                })
                .await;
            }
        }

        if resolved.file_browser {
            let created = ensure::ensure_child(
                &self.ctx.store,
                &names.filebrowser_service,
                &self.namespace,
                || resolved.build_filebrowser_service(&self.game_server),
            )
            .await
            .with_context(|_| EnsureFilebrowserServiceSnafu {
                service: ObjectRef::new(&names.filebrowser_service).within(&self.namespace),
            })?;
            if created.is_some() {
                self.publish(GameServerEvent::FilebrowserServiceCreated {
                    name: names.filebrowser_service.clone(),
                })
                .await;
            }
        }

        Ok(ReconcileFunctionAction::Continue)
    }

    async fn ensure_volume_claim(
        &self,
        resolved: &ResolvedGameServer,
    ) -> Result<ReconcileFunctionAction> {
        if !resolved.storage_enabled() {
            return Ok(ReconcileFunctionAction::Continue);
        }

        let name = &resolved.names.pvc;
        let created = ensure::ensure_child(&self.ctx.store, name, &self.namespace, || {
            resolved.build_pvc(&self.game_server)
        })
        .await
        .with_context(|_| EnsureVolumeClaimSnafu {
            pvc: ObjectRef::new(name).within(&self.namespace),
        })?;
        if created.is_some() {
            self.publish(GameServerEvent::PvcCreated { name: name.clone() })
                .await;
        }

        Ok(ReconcileFunctionAction::Continue)
    }

    async fn ensure_pod(&self, resolved: &ResolvedGameServer) -> Result<ReconcileFunctionAction> {
        let name = &resolved.names.pod;
        let created = ensure::ensure_child(&self.ctx.store, name, &self.namespace, || {
            resolved
                .build_pod(&self.game_server, &mut rand::rng())
                .map(Some)
        })
        .await
        .with_context(|_| EnsurePodSnafu {
            pod: ObjectRef::new(name).within(&self.namespace),
        })?;
        if created.is_some() {
            self.publish(GameServerEvent::PodCreated { name: name.clone() })
                .await;
        }

        Ok(ReconcileFunctionAction::Continue)
    }

    async fn ensure_running_status(&mut self) -> Result<ReconcileFunctionAction> {
        let desired = GameServerStatus::new(GameServerState::Running, RUNNING_MESSAGE);
        if self.game_server.status.as_ref() == Some(&desired) {
            debug!("status is up to date");
            return Ok(ReconcileFunctionAction::Done);
        }

        self.set_status(desired).await.context(UpdateStatusSnafu)?;
        self.publish(GameServerEvent::StatusUpdated {
            state: GameServerState::Running,
        })
        .await;
        Ok(ReconcileFunctionAction::Done)
    }
}

#[cfg(test)]
mod tests;
