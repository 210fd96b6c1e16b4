//! Lazily resolved control records
//!
//! A [`ControlRecord`] holds a record type and an address, never values.
//! Each field access dispatches on the declared field type. Records and
//! tables come back as new lazy values and scalars are fetched on the spot.
//!
//! Two addressing scopes exist:
//! - a named control or component adds its own segment to the path, so its
//!   children hang below it;
//! - a table row adds no segment. Its children are addressed directly
//!   under the indexed row path.

use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};

use apptest_common::{Error, ItemPath, Result};

use crate::coerce::{Coercer, ZoneMode};
use crate::grammar::{RecordType, ScalarKind, TypeNode};
use crate::provider::ProviderHandle;
use crate::table::{TableSource, TableValue};
use crate::value::{FieldValue, ScalarValue};

/// Name shown for records that stand for a table row
pub const ROW_PLACEHOLDER: &str = "TableRow";

/// Where a record sits in the control tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordScope {
    /// One row of a table; the parent path is the indexed row path
    Row,
    /// A named control or component
    Control(String),
}

impl RecordScope {
    pub fn name(&self) -> &str {
        match self {
            RecordScope::Row => ROW_PLACEHOLDER,
            RecordScope::Control(name) => name,
        }
    }
}

#[derive(Clone)]
pub struct ControlRecord {
    record_type: Arc<RecordType>,
    provider: ProviderHandle,
    scope: RecordScope,
    parent: Option<Arc<ItemPath>>,
}

impl ControlRecord {
    /// Record for a top-level control
    pub fn control(
        name: impl Into<String>,
        record_type: RecordType,
        provider: ProviderHandle,
    ) -> Self {
        Self::nested(name, record_type, provider, None)
    }

    /// Record for a control below `parent`
    pub fn nested(
        name: impl Into<String>,
        record_type: RecordType,
        provider: ProviderHandle,
        parent: Option<Arc<ItemPath>>,
    ) -> Self {
        Self {
            record_type: Arc::new(record_type),
            provider,
            scope: RecordScope::Control(name.into()),
            parent,
        }
    }

    /// Record for the row addressed by `row_path`
    pub fn row(record_type: RecordType, provider: ProviderHandle, row_path: ItemPath) -> Self {
        Self {
            record_type: Arc::new(record_type),
            provider,
            scope: RecordScope::Row,
            parent: Some(Arc::new(row_path)),
        }
    }

    /// Control name, or `None` for a table row
    pub fn name(&self) -> Option<&str> {
        match &self.scope {
            RecordScope::Row => None,
            RecordScope::Control(name) => Some(name),
        }
    }

    pub fn scope(&self) -> &RecordScope {
        &self.scope
    }

    pub fn record_type(&self) -> &RecordType {
        &self.record_type
    }

    pub fn parent_path(&self) -> Option<&ItemPath> {
        self.parent.as_deref()
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.record_type.field_names()
    }

    /// Address of this record itself
    pub fn path(&self) -> Result<ItemPath> {
        match &self.scope {
            RecordScope::Control(name) => Ok(ItemPath::nested(name.clone(), self.parent.clone())),
            RecordScope::Row => self
                .parent
                .as_deref()
                .cloned()
                .ok_or(Error::MissingControlName),
        }
    }

    /// Resolve `name` using its declared type
    pub fn field(&self, name: &str) -> Result<FieldValue> {
        let field_type = self
            .record_type
            .field_type(name)
            .ok_or_else(|| Error::UnknownField {
                record: self.scope.name().to_string(),
                field: name.to_string(),
            })?;
        self.resolve_field(field_type, name)
    }

    /// Shortcut for a scalar field
    pub fn scalar(&self, name: &str) -> Result<ScalarValue> {
        match self.field(name)? {
            FieldValue::Scalar(value) => Ok(value),
            other => Err(Error::Coercion {
                field: name.to_string(),
                expected: "scalar".to_string(),
                payload: format!("{:?}", other),
            }),
        }
    }

    /// Resolve `field_name` as `field_type`.
    ///
    /// Tables and records come back unresolved; only scalars reach the
    /// provider. Nothing is cached on `self`.
    pub fn resolve_field(&self, field_type: &TypeNode, field_name: &str) -> Result<FieldValue> {
        trace!("resolve {}.{} as {}", self.scope.name(), field_name, field_type);

        match field_type {
            TypeNode::Table(row_type) => {
                let source = TableSource::new(
                    self.provider.clone(),
                    self.table_path(field_name)?,
                    row_type.clone(),
                );
                Ok(FieldValue::Table(TableValue::new(source)))
            }
            TypeNode::Record(record_type) => {
                let parent = match &self.scope {
                    RecordScope::Row => self.parent.clone(),
                    RecordScope::Control(_) => Some(Arc::new(self.path()?)),
                };
                Ok(FieldValue::Record(ControlRecord::nested(
                    field_name,
                    record_type.clone(),
                    self.provider.clone(),
                    parent,
                )))
            }
            TypeNode::Scalar(kind) => self.fetch_scalar(*kind, field_name).map(FieldValue::Scalar),
        }
    }

    /// Unindexed address of the table held in `field_name`.
    ///
    /// The index slot of a row path belongs to the enclosing table, so a
    /// table inside a row hangs below the indexed row path instead of
    /// reusing it.
    fn table_path(&self, field_name: &str) -> Result<ItemPath> {
        match &self.scope {
            RecordScope::Control(_) => Ok(self.path()?.with_property_name(field_name)),
            RecordScope::Row => {
                let row = self.parent.clone().ok_or(Error::MissingControlName)?;
                Ok(ItemPath::nested(field_name, Some(row)).with_property_name(field_name))
            }
        }
    }

    fn fetch_scalar(&self, kind: ScalarKind, field_name: &str) -> Result<ScalarValue> {
        let config = self.provider.config();
        if config.is_unsupported(field_name) {
            return Err(Error::UnsupportedProperty(field_name.to_string()));
        }

        let path = self.path()?.with_property_name(field_name);
        path.validate(true)?;
        let payload = self.provider.fetch_payload(&path)?;

        Coercer::new(config).coerce(kind, field_name, payload.as_deref(), || {
            self.zone_mode(&path)
        })
    }

    /// Read the timezone-mode sibling of `leaf`; any failure means UTC
    fn zone_mode(&self, leaf: &ItemPath) -> ZoneMode {
        let sibling = leaf.with_property_name(&self.provider.config().timezone_property);
        match self.provider.fetch_payload(&sibling) {
            Ok(Some(payload)) => ZoneMode::from_payload(&payload),
            Ok(None) => ZoneMode::Utc,
            Err(e) => {
                debug!("Timezone lookup {} failed, using UTC: {}", sibling, e);
                ZoneMode::Utc
            }
        }
    }

    /// Select this control (or row) in the hosted app
    pub fn select(&self) -> Result<bool> {
        let path = self.path()?;
        path.validate(false)?;
        self.provider.select_control(&path)
    }

    /// Write `value` to property `name`
    pub fn set_property(&self, name: &str, value: &ScalarValue) -> Result<bool> {
        let path = self.path()?.with_property_name(name);
        path.validate(true)?;
        debug!("set {} = {}", path, value);
        self.provider.set_property(&path, value.to_wire())
    }
}

impl fmt::Debug for ControlRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControlRecord")
            .field("scope", &self.scope)
            .field("type", &self.record_type.to_string())
            .field("parent", &self.parent.as_ref().map(|p| p.to_string()))
            .finish()
    }
}
