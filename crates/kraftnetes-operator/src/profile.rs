//! Layering of a named [`GameProfile`] over the base of a [`GameDefinitionSpec`].

use snafu::{OptionExt, Snafu};
use tracing::debug;

use crate::{
    crd::{GameDefinitionSpec, GameProfile, GameServerSpec},
    workload::env::merge_env_vars,
};

#[derive(Debug, PartialEq, Eq, Snafu)]
pub enum Error {
    #[snafu(display("profile {profile:?} does not exist, available profiles are {available:?}"))]
    ProfileNotFound {
        profile: String,
        available: Vec<String>,
    },
}

/// The profile chosen by the game server, else the default profile of the definition.
pub fn effective_profile_name<'a>(
    definition: &'a GameDefinitionSpec,
    game_server: &'a GameServerSpec,
) -> Option<&'a str> {
    game_server
        .profile
        .as_deref()
        .filter(|name| !name.is_empty())
        .or_else(|| {
            definition
                .profiles
                .as_ref()
                .and_then(|profiles| profiles.default.as_deref())
                .filter(|name| !name.is_empty())
        })
}

/// Applies the profile named `profile_name` to `definition`.
///
/// A name that matches none of the declared profiles is an error.
pub fn apply_profile(
    mut definition: GameDefinitionSpec,
    profile_name: Option<&str>,
) -> Result<GameDefinitionSpec, Error> {
    let Some(profile_name) = profile_name else {
        return Ok(definition);
    };

    let profiles = definition
        .profiles
        .as_ref()
        .map(|profiles| profiles.values.as_slice())
        .unwrap_or_default();
    let profile = profiles
        .iter()
        .find(|profile| profile.name == profile_name)
        .cloned()
        .with_context(|| ProfileNotFoundSnafu {
            profile: profile_name,
            available: profiles
                .iter()
                .map(|profile| profile.name.clone())
                .collect::<Vec<_>>(),
        })?;

    debug!(profile = profile_name, "applying game profile");
    overlay(&mut definition, profile);
    Ok(definition)
}

fn overlay(definition: &mut GameDefinitionSpec, profile: GameProfile) {
    if let Some(image) = profile.image.filter(|image| !image.is_empty()) {
        definition.image = image;
    }
    definition.file_browser = profile.file_browser;
    if profile.stop_strategy.is_some() {
        definition.stop_strategy = profile.stop_strategy;
    }
    if profile.restart_strategy.is_some() {
        definition.restart_strategy = profile.restart_strategy;
    }
    if profile.storage.is_some() {
        definition.storage = profile.storage;
    }
    if !profile.ports.is_empty() {
        definition.ports = profile.ports;
    }
    definition.env = merge_env_vars(std::mem::take(&mut definition.env), profile.env);
}
