//! Resolution of a [`GameDefinitionSpec`] against the inputs supplied by a [`GameServerSpec`].
//!
//! Every declared input gets exactly one final string value, taken from the game server if it
//! supplies one and from the declared default otherwise. These values then replace the `&{name}`
//! placeholders in every string leaf of the definition. A placeholder that names no declared
//! input fails the resolution.

use std::collections::BTreeMap;

use snafu::{ResultExt, Snafu};
use tracing::debug;

use crate::crd::{
    GameDefinitionSpec, GameInput, GameServerSpec, InputType,
    value::{self, AnyValue},
};

pub use self::substitute::{Substitute, UnresolvedVariableError, Variables};

mod substitute;

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, PartialEq, Snafu)]
pub enum Error {
    #[snafu(display("input {input:?} has no value and no default"))]
    MissingVariable { input: String, required: bool },

    #[snafu(display("default {value} of input {input:?} is not a valid {expected}"))]
    InvalidDefault {
        input: String,
        expected: InputType,
        value: AnyValue,
    },

    #[snafu(display("failed to substitute input placeholders"))]
    UnresolvedVariable { source: UnresolvedVariableError },
}

/// Returns a copy of `definition` with every placeholder replaced by its input value.
pub fn resolve(
    definition: &GameDefinitionSpec,
    game_server: &GameServerSpec,
) -> Result<GameDefinitionSpec> {
    let variables = resolve_inputs(&definition.inputs, &game_server.inputs)?;
    debug!(inputs = variables.len(), "resolved game definition inputs");

    let mut resolved = definition.clone();
    resolved
        .substitute(&variables)
        .context(UnresolvedVariableSnafu)?;
    Ok(resolved)
}

/// Determines the final value of every declared input.
///
/// Supplied values that do not belong to a declared input are ignored.
pub fn resolve_inputs(
    declared: &BTreeMap<String, GameInput>,
    supplied: &BTreeMap<String, AnyValue>,
) -> Result<Variables> {
    for name in supplied.keys().filter(|name| !declared.contains_key(*name)) {
        debug!(input = %name, "ignoring value for undeclared input");
    }

    declared
        .iter()
        .map(|(name, input)| {
            let value = match supplied.get(name) {
                Some(value) => value.to_string(),
                None => default_value(name, input)?,
            };
            Ok((name.clone(), value))
        })
        .collect()
}

fn default_value(name: &str, input: &GameInput) -> Result<String> {
    let default = match &input.default {
        Some(AnyValue::String(value)) if value.is_empty() => None,
        default => default.as_ref(),
    };
    let Some(default) = default else {
        return MissingVariableSnafu {
            input: name,
            required: input.required,
        }
        .fail();
    };

    let invalid = || InvalidDefaultSnafu {
        input: name,
        expected: input.type_,
        value: default.clone(),
    };

    match (input.type_, default) {
        (InputType::String, value) => Ok(value.to_string()),

        (InputType::Number, AnyValue::Number(number)) => Ok(number.to_string()),
        (InputType::Number, AnyValue::String(text)) => match text.trim().parse::<f64>() {
            Ok(number) if number.is_finite() => Ok(text.trim().to_owned()),
            _ => invalid().fail(),
        },

        (InputType::Boolean, AnyValue::Bool(flag)) => Ok(flag.to_string()),
        (InputType::Boolean, AnyValue::String(text)) => value::parse_bool(text.trim())
            .map(|flag| flag.to_string())
            .map_err(|_| invalid().build()),

        (InputType::Number | InputType::Boolean, _) => invalid().fail(),
    }
}
