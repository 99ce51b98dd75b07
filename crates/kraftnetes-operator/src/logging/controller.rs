//! Reporting of what the controller did with each object.

use std::error::Error;

use kube::{
    Resource,
    core::DynamicObject,
    runtime::{
        controller::{self, Action},
        events::Recorder,
        reflector::ObjectRef,
    },
};
use tracing::{debug, error, info};

use crate::logging::k8s_events::publish_reconcile_error;

/// Extra information about a reconciliation error, used to build its Kubernetes event.
pub trait ReconcilerError: Error {
    /// `PascalCase` category of the error, used as the event reason
    ///
    /// Usually derived with [`strum::EnumDiscriminants`] and [`strum::IntoStaticStr`].
    fn category(&self) -> &'static str;

    /// The child object that was being worked on when the error happened, if any
    ///
    /// For example the [`Pod`] of a game server that could not be created.
    ///
    /// [`Pod`]: `k8s_openapi::api::core::v1::Pod`
    fn secondary_object(&self) -> Option<ObjectRef<DynamicObject>> {
        None
    }
}

/// Logs the outcome of one reconciliation.
///
/// Failed reconciliations are also published as a Warning event on the reconciled object.
/// Objects deleted before their turn came up are only worth a debug line, and queue or runner
/// errors concern the operator itself, so no event is published for them.
pub fn report_controller_reconciled<K, ReconcileErr, QueueErr>(
    recorder: &Recorder,
    result: &Result<(ObjectRef<K>, Action), controller::Error<ReconcileErr, QueueErr>>,
) where
    K: Resource,
    ReconcileErr: ReconcilerError + 'static,
    QueueErr: Error + 'static,
{
    match result {
        Ok((object, action)) => info!(%object, ?action, "reconciled object"),
        Err(controller::Error::ReconcilerFailed(err, object)) => {
            error!(
                %object,
                category = err.category(),
                error = err as &dyn Error,
                "failed to reconcile object"
            );
            publish_reconcile_error(recorder, err, object);
        }
        Err(controller::Error::ObjectNotFound(object)) => {
            debug!(%object, "object was deleted before it could be reconciled");
        }
        Err(err) => error!(error = err as &dyn Error, "controller failed"),
    }
}
