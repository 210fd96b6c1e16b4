//! Control catalog built from the app's object model
//!
//! The transport reports every control with its properties and their type
//! strings. Each control's record type is registered in the grammar under
//! the control's own name, so a property typed as `Label1` on a component
//! resolves to Label1's record.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info, warn};

use apptest_common::{Error, Result};

use crate::grammar::{RecordType, TypeGrammar, TypeNode};
use crate::provider::ProviderHandle;
use crate::record::ControlRecord;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectModel {
    #[serde(default)]
    pub controls: Vec<ControlDescriptor>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlDescriptor {
    pub name: String,
    #[serde(default)]
    pub properties: Vec<PropertyDescriptor>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyDescriptor {
    pub property_name: String,
    pub property_type: String,
}

/// Top-level controls and their record types, in reporting order
#[derive(Debug, Clone, Default)]
pub struct ControlCatalog {
    controls: Vec<(String, RecordType)>,
}

impl ControlCatalog {
    pub fn from_json(json: &str, grammar: &mut TypeGrammar) -> Result<Self> {
        let model: ObjectModel = serde_json::from_str(json)?;
        Ok(Self::from_model(&model, grammar))
    }

    /// Build record types for every control.
    ///
    /// Controls whose properties reference other controls are retried until
    /// no further control can be completed. What is still unresolved after
    /// that is registered without the offending properties.
    pub fn from_model(model: &ObjectModel, grammar: &mut TypeGrammar) -> Self {
        let mut done: HashSet<&str> = HashSet::new();
        let mut built: Vec<(String, RecordType)> = Vec::new();

        loop {
            let mut progress = false;
            for control in &model.controls {
                if done.contains(control.name.as_str()) {
                    continue;
                }
                if let Some(record) = Self::build_complete(control, grammar) {
                    Self::register(grammar, &control.name, &record);
                    done.insert(&control.name);
                    built.push((control.name.clone(), record));
                    progress = true;
                }
            }
            if !progress {
                break;
            }
        }

        for control in &model.controls {
            if done.contains(control.name.as_str()) {
                continue;
            }
            let record = Self::build_partial(control, grammar);
            Self::register(grammar, &control.name, &record);
            done.insert(&control.name);
            built.push((control.name.clone(), record));
        }

        // Keep the order the transport reported
        let controls = model
            .controls
            .iter()
            .filter_map(|c| built.iter().position(|(n, _)| *n == c.name))
            .map(|i| built[i].clone())
            .collect::<Vec<_>>();

        info!("Loaded {} controls into catalog", controls.len());
        Self { controls }
    }

    fn build_complete(control: &ControlDescriptor, grammar: &TypeGrammar) -> Option<RecordType> {
        let mut record = RecordType::new();
        for property in &control.properties {
            record.add_field(&property.property_name, grammar.parse(&property.property_type)?);
        }
        Some(record)
    }

    fn build_partial(control: &ControlDescriptor, grammar: &TypeGrammar) -> RecordType {
        let mut record = RecordType::new();
        for property in &control.properties {
            match grammar.parse(&property.property_type) {
                Some(field_type) => record.add_field(&property.property_name, field_type),
                None => warn!(
                    "Skipping {}.{}: unresolvable type {:?}",
                    control.name, property.property_name, property.property_type
                ),
            }
        }
        record
    }

    fn register(grammar: &mut TypeGrammar, name: &str, record: &RecordType) {
        if grammar.add_mapping(name, TypeNode::Record(record.clone())) {
            debug!("Registered type for {}", name);
        } else {
            warn!("Type tag {} already registered, keeping the existing mapping", name);
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.controls.iter().map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.controls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.controls.is_empty()
    }

    pub fn record_type(&self, name: &str) -> Option<&RecordType> {
        self.controls.iter().find(|(n, _)| n == name).map(|(_, t)| t)
    }

    /// Lazy record for top-level control `name`
    pub fn record(&self, name: &str, provider: &ProviderHandle) -> Result<ControlRecord> {
        let record_type = self
            .record_type(name)
            .ok_or_else(|| Error::UnknownType(name.to_string()))?;
        Ok(ControlRecord::control(name, record_type.clone(), provider.clone()))
    }

    pub fn records(&self, provider: &ProviderHandle) -> Vec<ControlRecord> {
        self.controls
            .iter()
            .map(|(name, t)| ControlRecord::control(name.clone(), t.clone(), provider.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::ScalarKind;

    const MODEL: &str = r#"{
        "controls": [
            { "name": "Component1", "properties": [
                { "propertyName": "Label1", "propertyType": "Label1" },
                { "propertyName": "Visible", "propertyType": "b" }
            ]},
            { "name": "Label1", "properties": [
                { "propertyName": "Text", "propertyType": "s" }
            ]},
            { "name": "Broken1", "properties": [
                { "propertyName": "Text", "propertyType": "s" },
                { "propertyName": "Weird", "propertyType": "q" }
            ]}
        ]
    }"#;

    #[test]
    fn test_forward_references_resolve() {
        let mut grammar = TypeGrammar::new();
        let catalog = ControlCatalog::from_json(MODEL, &mut grammar).unwrap();

        assert_eq!(catalog.names().collect::<Vec<_>>(), vec!["Component1", "Label1", "Broken1"]);

        let component = catalog.record_type("Component1").unwrap();
        let label = component.field_type("Label1").unwrap().as_record().unwrap();
        assert_eq!(label.field_type("Text"), Some(&TypeNode::Scalar(ScalarKind::String)));
        assert!(grammar.lookup("Label1").is_some());
    }

    #[test]
    fn test_unresolvable_property_is_dropped() {
        let mut grammar = TypeGrammar::new();
        let catalog = ControlCatalog::from_json(MODEL, &mut grammar).unwrap();

        let broken = catalog.record_type("Broken1").unwrap();
        assert_eq!(broken.field_names().collect::<Vec<_>>(), vec!["Text"]);
    }

    #[test]
    fn test_malformed_json() {
        let mut grammar = TypeGrammar::new();
        assert!(matches!(
            ControlCatalog::from_json("{", &mut grammar),
            Err(Error::Serialization(_))
        ));
    }
}
