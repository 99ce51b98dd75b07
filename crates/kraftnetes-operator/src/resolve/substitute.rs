//! In-place placeholder substitution over the string leaves of a [`GameDefinitionSpec`].

use std::{collections::BTreeMap, sync::LazyLock};

use k8s_openapi::{
    api::core::v1::{
        ConfigMapKeySelector, EnvVar, EnvVarSource, FileKeySelector, ObjectFieldSelector,
        ResourceFieldSelector, SecretKeySelector,
    },
    apimachinery::pkg::{api::resource::Quantity, util::intstr::IntOrString},
};
use regex::{Captures, Regex};
use snafu::Snafu;

use crate::crd::{
    GameDefinitionSpec, GameInput, GamePort, GameProfile, GameProfiles, RestartStrategy,
    StopStrategy, StorageConfig,
    value::{AnyValue, BoolOrString},
};

static PLACEHOLDER_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&\{([^{}]*)\}").expect("failed to compile placeholder regex")
});

#[derive(Debug, PartialEq, Eq, Snafu)]
#[snafu(display("variable {variable:?} referenced in {text:?} is not resolvable"))]
pub struct UnresolvedVariableError {
    pub variable: String,
    pub text: String,
}

/// The final string value of every declared input, keyed by input name.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Variables(BTreeMap<String, String>);

impl Variables {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Replaces every `&{name}` in `text` in a single pass.
    ///
    /// Replacement values are not scanned again, so the result does not depend on the order of
    /// the variables. Fails on the first placeholder without a value.
    pub fn render(&self, text: &str) -> Result<String, UnresolvedVariableError> {
        if !text.contains("&{") {
            return Ok(text.to_owned());
        }

        if let Some(variable) = PLACEHOLDER_REGEX
            .captures_iter(text)
            .map(|captures| captures[1].to_owned())
            .find(|name| !self.0.contains_key(name))
        {
            return UnresolvedVariableSnafu { variable, text }.fail();
        }

        let rendered = PLACEHOLDER_REGEX.replace_all(text, |captures: &Captures| {
            self.0.get(&captures[1]).cloned().unwrap_or_default()
        });
        Ok(rendered.into_owned())
    }
}

impl FromIterator<(String, String)> for Variables {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Types whose string leaves can contain placeholders.
pub trait Substitute {
    fn substitute(&mut self, variables: &Variables) -> Result<(), UnresolvedVariableError>;
}

impl Substitute for String {
    fn substitute(&mut self, variables: &Variables) -> Result<(), UnresolvedVariableError> {
        *self = variables.render(self)?;
        Ok(())
    }
}

impl<T: Substitute> Substitute for Option<T> {
    fn substitute(&mut self, variables: &Variables) -> Result<(), UnresolvedVariableError> {
        match self {
            Some(value) => value.substitute(variables),
            None => Ok(()),
        }
    }
}

impl<T: Substitute> Substitute for Vec<T> {
    fn substitute(&mut self, variables: &Variables) -> Result<(), UnresolvedVariableError> {
        self.iter_mut().try_for_each(|value| value.substitute(variables))
    }
}

impl<V: Substitute> Substitute for BTreeMap<String, V> {
    fn substitute(&mut self, variables: &Variables) -> Result<(), UnresolvedVariableError> {
        self.values_mut()
            .try_for_each(|value| value.substitute(variables))
    }
}

impl Substitute for BoolOrString {
    fn substitute(&mut self, variables: &Variables) -> Result<(), UnresolvedVariableError> {
        match self {
            Self::Bool(_) => Ok(()),
            Self::String(value) => value.substitute(variables),
        }
    }
}

impl Substitute for IntOrString {
    fn substitute(&mut self, variables: &Variables) -> Result<(), UnresolvedVariableError> {
        match self {
            Self::Int(_) => Ok(()),
            Self::String(value) => value.substitute(variables),
        }
    }
}

impl Substitute for AnyValue {
    fn substitute(&mut self, variables: &Variables) -> Result<(), UnresolvedVariableError> {
        match self {
            Self::Bool(_) | Self::Number(_) => Ok(()),
            Self::String(value) => value.substitute(variables),
        }
    }
}

impl Substitute for Quantity {
    fn substitute(&mut self, variables: &Variables) -> Result<(), UnresolvedVariableError> {
        self.0.substitute(variables)
    }
}

impl Substitute for EnvVar {
    fn substitute(&mut self, variables: &Variables) -> Result<(), UnresolvedVariableError> {
        self.name.substitute(variables)?;
        self.value.substitute(variables)?;
        self.value_from.substitute(variables)
    }
}

impl Substitute for EnvVarSource {
    fn substitute(&mut self, variables: &Variables) -> Result<(), UnresolvedVariableError> {
        self.config_map_key_ref.substitute(variables)?;
        self.field_ref.substitute(variables)?;
        self.file_key_ref.substitute(variables)?;
        self.resource_field_ref.substitute(variables)?;
        self.secret_key_ref.substitute(variables)
    }
}

impl Substitute for ConfigMapKeySelector {
    fn substitute(&mut self, variables: &Variables) -> Result<(), UnresolvedVariableError> {
        self.key.substitute(variables)?;
        self.name.substitute(variables)
    }
}

impl Substitute for SecretKeySelector {
    fn substitute(&mut self, variables: &Variables) -> Result<(), UnresolvedVariableError> {
        self.key.substitute(variables)?;
        self.name.substitute(variables)
    }
}

impl Substitute for ObjectFieldSelector {
    fn substitute(&mut self, variables: &Variables) -> Result<(), UnresolvedVariableError> {
        self.api_version.substitute(variables)?;
        self.field_path.substitute(variables)
    }
}

impl Substitute for ResourceFieldSelector {
    fn substitute(&mut self, variables: &Variables) -> Result<(), UnresolvedVariableError> {
        self.container_name.substitute(variables)?;
        self.divisor.substitute(variables)?;
        self.resource.substitute(variables)
    }
}

impl Substitute for FileKeySelector {
    fn substitute(&mut self, variables: &Variables) -> Result<(), UnresolvedVariableError> {
        self.key.substitute(variables)?;
        self.path.substitute(variables)?;
        self.volume_name.substitute(variables)
    }
}

impl Substitute for StopStrategy {
    fn substitute(&mut self, variables: &Variables) -> Result<(), UnresolvedVariableError> {
        self.stdin.substitute(variables)?;
        self.cmd.substitute(variables)?;
        self.shutdown_grace_period.substitute(variables)
    }
}

impl Substitute for RestartStrategy {
    fn substitute(&mut self, variables: &Variables) -> Result<(), UnresolvedVariableError> {
        self.cmd.substitute(variables)
    }
}

impl Substitute for StorageConfig {
    fn substitute(&mut self, variables: &Variables) -> Result<(), UnresolvedVariableError> {
        self.enabled.substitute(variables)?;
        self.default_size.substitute(variables)
    }
}

impl Substitute for GamePort {
    fn substitute(&mut self, variables: &Variables) -> Result<(), UnresolvedVariableError> {
        self.name.substitute(variables)?;
        self.container_port.substitute(variables)?;
        self.protocol.substitute(variables)?;
        self.type_.substitute(variables)
    }
}

impl Substitute for GameProfile {
    fn substitute(&mut self, variables: &Variables) -> Result<(), UnresolvedVariableError> {
        self.name.substitute(variables)?;
        self.image.substitute(variables)?;
        self.file_browser.substitute(variables)?;
        self.stop_strategy.substitute(variables)?;
        self.restart_strategy.substitute(variables)?;
        self.storage.substitute(variables)?;
        self.ports.substitute(variables)?;
        self.env.substitute(variables)
    }
}

impl Substitute for GameProfiles {
    fn substitute(&mut self, variables: &Variables) -> Result<(), UnresolvedVariableError> {
        self.default.substitute(variables)?;
        self.values.substitute(variables)
    }
}

impl Substitute for GameInput {
    fn substitute(&mut self, variables: &Variables) -> Result<(), UnresolvedVariableError> {
        self.default.substitute(variables)?;
        self.description.substitute(variables)
    }
}

impl Substitute for GameDefinitionSpec {
    fn substitute(&mut self, variables: &Variables) -> Result<(), UnresolvedVariableError> {
        self.game.substitute(variables)?;
        self.image.substitute(variables)?;
        self.file_browser.substitute(variables)?;
        self.stop_strategy.substitute(variables)?;
        self.restart_strategy.substitute(variables)?;
        self.storage.substitute(variables)?;
        self.ports.substitute(variables)?;
        self.env.substitute(variables)?;
        self.profiles.substitute(variables)?;
        self.inputs.substitute(variables)
    }
}
