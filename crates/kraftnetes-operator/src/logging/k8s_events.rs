//! Reconcile errors published as Kubernetes events.

use std::error::Error;

use k8s_openapi::api::core::v1::ObjectReference;
use kube::{
    core::DynamicObject,
    runtime::{
        events::{Event, EventType, Recorder},
        reflector::ObjectRef,
    },
};
use tracing::Instrument;

use super::controller::ReconcilerError;

/// Notes longer than this are truncated by the API server anyway.
const MAX_NOTE_LEN: usize = 1024;

/// Turns a reconcile error into a Warning [`Event`] whose note is the whole error chain.
fn error_to_event<E: ReconcilerError>(err: &E) -> Event {
    let mut full_msg = err.to_string();
    let mut source = err.source();
    while let Some(err) = source {
        full_msg.push_str(": ");
        full_msg.push_str(&err.to_string());
        source = err.source();
    }
    message::truncate_with_ellipsis(&mut full_msg, MAX_NOTE_LEN);
    Event {
        type_: EventType::Warning,
        reason: err.category().to_owned(),
        note: Some(full_msg),
        action: "Reconcile".to_owned(),
        secondary: err.secondary_object().map(ObjectReference::from),
    }
}

/// Publishes `error` as a Warning event on `object` in the background.
pub fn publish_reconcile_error<E: ReconcilerError>(
    recorder: &Recorder,
    error: &E,
    object: &ObjectRef<DynamicObject>,
) {
    let recorder = recorder.clone();
    let reference = ObjectReference::from(object.clone());
    let event = error_to_event(error);
    tokio::spawn(
        async move {
            if let Err(err) = recorder.publish(&event, &reference).await {
                tracing::error!(
                    error = &err as &dyn Error,
                    reason = %event.reason,
                    "failed to publish reconcile error as event"
                );
            }
        }
        .in_current_span(),
    );
}

mod message {
    /// Ensures that `msg` is at most `max_len` _bytes_ long
    ///
    /// If `msg` is longer than `max_len` then the extra text is replaced with an ellipsis.
    pub fn truncate_with_ellipsis(msg: &mut String, max_len: usize) {
        const ELLIPSIS: char = '…';
        const ELLIPSIS_LEN: usize = ELLIPSIS.len_utf8();
        if msg.len() > max_len {
            let start_of_trunc_char = find_start_of_char(msg, max_len.saturating_sub(ELLIPSIS_LEN));
            msg.truncate(start_of_trunc_char);
            if ELLIPSIS_LEN <= max_len {
                msg.push(ELLIPSIS);
            }
        }
        debug_assert!(msg.len() <= max_len);
    }

    fn find_start_of_char(s: &str, mut pos: usize) -> usize {
        while !s.is_char_boundary(pos) {
            pos -= 1;
        }
        pos
    }

}
