//! Wiring of the [`GameServer`] controller.

use std::sync::Arc;

use futures::StreamExt;
use k8s_openapi::api::core::v1::{PersistentVolumeClaim, Pod, Service};
use kube::runtime::{
    Controller,
    events::{Recorder, Reporter},
    watcher,
};
use tracing::info;

use crate::{
    client::Client,
    config::OperatorConfig,
    crd::GameServer,
    events::KubeEventSink,
    logging::controller::report_controller_reconciled,
    reconcile::{self, CONTROLLER_NAME, Ctx},
};

/// Runs the controller until the process receives a termination signal.
pub async fn run(kube_client: kube::Client, config: OperatorConfig) {
    let namespace = config.watch_namespace.clone();
    info!(%namespace, "starting GameServer controller");

    let recorder = Recorder::new(
        kube_client.clone(),
        Reporter {
            controller: CONTROLLER_NAME.to_owned(),
            instance: None,
        },
    );
    let ctx = Arc::new(Ctx {
        store: Client::new(kube_client.clone(), config.field_manager.clone()),
        events: KubeEventSink::new(recorder.clone()),
        config,
    });

    Controller::new(
        namespace.get_api::<GameServer>(&kube_client),
        watcher::Config::default(),
    )
    .owns(
        namespace.get_api::<Pod>(&kube_client),
        watcher::Config::default(),
    )
    .owns(
        namespace.get_api::<Service>(&kube_client),
        watcher::Config::default(),
    )
    .owns(
        namespace.get_api::<PersistentVolumeClaim>(&kube_client),
        watcher::Config::default(),
    )
    .shutdown_on_signal()
    .run(reconcile::reconcile, reconcile::error_policy, ctx)
    .for_each(|result| {
        report_controller_reconciled(&recorder, &result);
        futures::future::ready(())
    })
    .await;

    info!("GameServer controller stopped");
}
