use indexmap::IndexMap;
use k8s_openapi::api::core::v1::EnvVar;

/// Merges `overrides` into `base` by variable name.
///
/// Variables of `base` keep their position, an override of an existing name replaces it in place
/// and new names are appended in the order they appear in `overrides`.
pub fn merge_env_vars(
    base: impl IntoIterator<Item = EnvVar>,
    overrides: impl IntoIterator<Item = EnvVar>,
) -> Vec<EnvVar> {
    let mut merged = base
        .into_iter()
        .map(|env_var| (env_var.name.clone(), env_var))
        .collect::<IndexMap<_, _>>();
    for env_var in overrides {
        merged.insert(env_var.name.clone(), env_var);
    }
    merged.into_values().collect()
}
