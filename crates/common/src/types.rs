//! Address and wire types shared with the provider boundary

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::{Error, Result};

/// Hierarchical locator for a control, one of its properties and optionally
/// a row within a repeated container.
///
/// Paths are immutable. Every `with_*` method returns an independent copy;
/// parents are shared through `Arc` since they never change either.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ItemPath {
    pub control_name: String,
    pub property_name: Option<String>,
    pub index: Option<usize>,
    #[serde(rename = "ParentControl")]
    pub parent: Option<Arc<ItemPath>>,
}

impl ItemPath {
    /// Path to a top-level control
    pub fn control(name: impl Into<String>) -> Self {
        Self {
            control_name: name.into(),
            property_name: None,
            index: None,
            parent: None,
        }
    }

    /// Path to a control nested under `parent`
    pub fn nested(name: impl Into<String>, parent: Option<Arc<ItemPath>>) -> Self {
        Self {
            parent,
            ..Self::control(name)
        }
    }

    pub fn with_property_name(&self, name: impl Into<String>) -> Self {
        Self {
            property_name: Some(name.into()),
            ..self.clone()
        }
    }

    pub fn with_index(&self, index: usize) -> Self {
        Self {
            index: Some(index),
            ..self.clone()
        }
    }

    /// Drop any row index, keeping control, property and parent
    pub fn without_index(&self) -> Self {
        Self {
            index: None,
            ..self.clone()
        }
    }

    /// Check addressing rules.
    ///
    /// A control name is always required. A property name is required when
    /// `require_property_name` is set or when the path carries a row index.
    /// Ancestors are checked with `require_property_name = false`.
    pub fn validate(&self, require_property_name: bool) -> Result<()> {
        if self.control_name.trim().is_empty() {
            return Err(Error::MissingControlName);
        }

        let has_property = self
            .property_name
            .as_deref()
            .is_some_and(|p| !p.trim().is_empty());
        if (require_property_name || self.index.is_some()) && !has_property {
            return Err(Error::MissingPropertyName {
                control: self.control_name.clone(),
            });
        }

        match &self.parent {
            Some(parent) => parent.validate(false),
            None => Ok(()),
        }
    }

    /// Number of controls from the root down to this one
    pub fn depth(&self) -> usize {
        1 + self.parent.as_ref().map_or(0, |p| p.depth())
    }

    /// Wire form handed to the provider
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

impl fmt::Display for ItemPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(parent) = &self.parent {
            write!(f, "{}/", parent)?;
        }
        write!(f, "{}", self.control_name)?;
        if let Some(property) = &self.property_name {
            write!(f, ".{}", property)?;
        }
        if let Some(index) = self.index {
            write!(f, "[{}]", index)?;
        }
        Ok(())
    }
}

/// Leaf value envelope returned by `getPropertyValue`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PropertyEnvelope {
    #[serde(rename = "propertyValue", default)]
    pub property_value: Option<serde_json::Value>,
}

impl PropertyEnvelope {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            property_value: Some(serde_json::Value::String(value.into())),
        }
    }

    /// Parse a raw provider reply into its payload.
    ///
    /// `None`, an empty reply and a null `propertyValue` all mean "no value".
    /// Non-string JSON payloads are rendered back to their literal text.
    pub fn payload_of(raw: Option<&str>) -> Result<Option<String>> {
        let raw = match raw.map(str::trim) {
            Some(raw) if !raw.is_empty() && raw != "null" => raw,
            _ => return Ok(None),
        };

        let envelope: PropertyEnvelope = serde_json::from_str(raw)?;
        Ok(match envelope.property_value {
            None | Some(serde_json::Value::Null) => None,
            Some(serde_json::Value::String(s)) => Some(s),
            Some(other) => Some(other.to_string()),
        })
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
