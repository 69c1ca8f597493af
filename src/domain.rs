use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::VwError;

/// Whether a file fed a model run or was produced by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelSet {
    Inputs,
    Outputs,
}

impl ModelSet {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelSet::Inputs => "inputs",
            ModelSet::Outputs => "outputs",
        }
    }

    /// Outputs are stored datasets with derived services and downloads.
    pub fn has_services(&self) -> bool {
        matches!(self, ModelSet::Outputs)
    }
}

impl fmt::Display for ModelSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelSet {
    type Err = VwError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "inputs" => Ok(ModelSet::Inputs),
            "outputs" => Ok(ModelSet::Outputs),
            _ => Err(VwError::UnrecognizedModelSet(value.to_string())),
        }
    }
}

/// Identifier of one model execution, kept in canonical hyphenated
/// lowercase form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ModelRunUuid(String);

impl ModelRunUuid {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModelRunUuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ModelRunUuid {
    type Err = VwError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let parsed = Uuid::try_parse(value.trim())
            .map_err(|_| VwError::InvalidUuid(value.to_string()))?;
        Ok(Self(parsed.hyphenated().to_string()))
    }
}

impl TryFrom<String> for ModelRunUuid {
    type Error = VwError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ModelRunUuid> for String {
    fn from(value: ModelRunUuid) -> Self {
        value.0
    }
}
