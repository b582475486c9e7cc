//! `${...}` interpolation for build commands and environment values.
//!
//! | Variable | Value |
//! |---|---|
//! | `${configuration.id}`, `${configuration.name}` | the configuration being built |
//! | `${target}` | its required target, empty when it has none |
//! | `${batch.name}` | the batch it was submitted in |
//! | `${env.NAME}` | an environment variable |
//! | `${date}`, `${datetime}`, `${timestamp}` | when the context was created (UTC) |
//! | `${name}` | a custom variable |
//!
//! Anything else is left in place untouched.

use chrono::{DateTime, Utc};
use regex::{Captures, Regex};
use std::collections::HashMap;
use std::sync::LazyLock;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([A-Za-z_]\w*(?:\.[A-Za-z_]\w*)?)\}").unwrap());

/// Values visible to one build's commands.
#[derive(Debug, Clone)]
pub struct VariableContext {
    pub configuration_id: String,
    pub configuration_name: String,
    pub target: String,
    pub batch_name: String,
    pub env: HashMap<String, String>,
    pub custom: HashMap<String, String>,
    /// Fixed at creation so every date variable in one build agrees.
    pub now: DateTime<Utc>,
}

impl Default for VariableContext {
    fn default() -> Self {
        Self {
            configuration_id: String::new(),
            configuration_name: String::new(),
            target: String::new(),
            batch_name: String::new(),
            env: HashMap::new(),
            custom: HashMap::new(),
            now: Utc::now(),
        }
    }
}

impl VariableContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy the process environment into `${env.*}`.
    pub fn populate_env(&mut self) {
        self.env.extend(std::env::vars());
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.custom.insert(name.into(), value.into());
    }

    /// Value of one variable, without the `${}`.
    pub fn resolve(&self, name: &str) -> Option<String> {
        match name.split_once('.') {
            Some(("configuration", "id")) => Some(self.configuration_id.clone()),
            Some(("configuration", "name")) => Some(self.configuration_name.clone()),
            Some(("batch", "name")) => Some(self.batch_name.clone()),
            Some(("env", key)) => self.env.get(key).cloned(),
            Some(_) => None,
            None => match name {
                "target" => Some(self.target.clone()),
                "date" => Some(self.now.format("%Y-%m-%d").to_string()),
                "datetime" => Some(self.now.format("%Y-%m-%dT%H:%M:%SZ").to_string()),
                "timestamp" => Some(self.now.timestamp().to_string()),
                custom => self.custom.get(custom).cloned(),
            },
        }
    }

    pub fn interpolate(&self, input: &str) -> String {
        PLACEHOLDER
            .replace_all(input, |caps: &Captures| {
                self.resolve(&caps[1])
                    .unwrap_or_else(|| caps[0].to_string())
            })
            .into_owned()
    }

    pub fn interpolate_vec(&self, inputs: &[String]) -> Vec<String> {
        inputs.iter().map(|input| self.interpolate(input)).collect()
    }

    /// Interpolate the values of an env map; keys are taken as written.
    pub fn interpolate_map(&self, map: &HashMap<String, String>) -> HashMap<String, String> {
        map.iter()
            .map(|(key, value)| (key.clone(), self.interpolate(value)))
            .collect()
    }
}

/// Fluent construction of a [`VariableContext`].
#[derive(Debug, Default)]
pub struct VariableContextBuilder {
    ctx: VariableContext,
}

impl VariableContextBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_configuration(mut self, id: impl Into<String>, name: impl Into<String>) -> Self {
        self.ctx.configuration_id = id.into();
        self.ctx.configuration_name = name.into();
        self
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.ctx.target = target.into();
        self
    }

    pub fn with_batch(mut self, name: impl Into<String>) -> Self {
        self.ctx.batch_name = name.into();
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.ctx.env.insert(key.into(), value.into());
        self
    }

    pub fn with_custom(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.ctx.set(name, value);
        self
    }

    pub fn at(mut self, now: DateTime<Utc>) -> Self {
        self.ctx.now = now;
        self
    }

    pub fn build(self) -> VariableContext {
        self.ctx
    }
}
