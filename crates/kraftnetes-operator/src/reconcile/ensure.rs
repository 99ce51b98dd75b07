use snafu::{ResultExt, Snafu};
use tracing::{debug, info};

use crate::{
    client::{self, ChildObject, Store},
    workload,
};

#[derive(Debug, Snafu)]
pub enum EnsureError {
    #[snafu(display("failed to look up the existing object"))]
    Lookup { source: client::Error },

    #[snafu(display("failed to build the object"))]
    Build { source: workload::Error },

    #[snafu(display("failed to create the object"))]
    Create { source: client::Error },
}

/// Creates the child `name` unless it already exists.
///
/// `build` is only called when the object is missing and may decline to build one. Returns the
/// created object, or [`None`] if nothing was created. Existing objects are never updated.
pub(super) async fn ensure_child<K, S, F>(
    store: &S,
    name: &str,
    namespace: &str,
    build: F,
) -> Result<Option<K>, EnsureError>
where
    K: ChildObject,
    S: Store,
    F: FnOnce() -> Result<Option<K>, workload::Error>,
{
    let kind = K::kind(&());
    if store
        .get_opt::<K>(name, namespace)
        .await
        .context(LookupSnafu)?
        .is_some()
    {
        debug!(%kind, name, "object already exists");
        return Ok(None);
    }

    let Some(object) = build().context(BuildSnafu)? else {
        return Ok(None);
    };
    let created = store.create(&object).await.context(CreateSnafu)?;
    info!(%kind, name, namespace, "created object");
    Ok(Some(created))
}
