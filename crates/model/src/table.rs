//! Tables over repeated containers
//!
//! Row counts and row contents always come from the provider at the moment
//! they are read. Two reads of the same table may disagree when the app
//! changes in between.

use std::fmt;
use tracing::trace;

use apptest_common::{Error, ItemPath, Result};

use crate::grammar::RecordType;
use crate::provider::ProviderHandle;
use crate::record::ControlRecord;

/// Row source addressed by an unindexed item path
#[derive(Clone)]
pub struct TableSource {
    provider: ProviderHandle,
    item_path: ItemPath,
    row_type: RecordType,
}

impl TableSource {
    pub fn new(provider: ProviderHandle, item_path: ItemPath, row_type: RecordType) -> Self {
        Self {
            provider,
            item_path: item_path.without_index(),
            row_type,
        }
    }

    pub fn item_path(&self) -> &ItemPath {
        &self.item_path
    }

    pub fn row_type(&self) -> &RecordType {
        &self.row_type
    }

    /// Fresh row count; every call goes to the provider
    pub fn count(&self) -> Result<usize> {
        self.item_path.validate(true)?;
        let count = self.provider.get_item_count(&self.item_path)?;
        trace!("{} has {} rows", self.item_path, count);
        Ok(count)
    }

    pub fn row_path(&self, index: usize) -> ItemPath {
        self.item_path.with_index(index)
    }

    /// Record for row `index` (0-based). No provider call is made.
    pub fn row(&self, index: usize) -> ControlRecord {
        ControlRecord::row(self.row_type.clone(), self.provider.clone(), self.row_path(index))
    }
}

/// Formula-facing table value
#[derive(Clone)]
pub struct TableValue {
    source: TableSource,
}

impl TableValue {
    pub fn new(source: TableSource) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &TableSource {
        &self.source
    }

    pub fn row_type(&self) -> &RecordType {
        self.source.row_type()
    }

    pub fn count(&self) -> Result<usize> {
        self.source.count()
    }

    pub fn row(&self, index: usize) -> ControlRecord {
        self.source.row(index)
    }

    /// 1-based row access, checked against a fresh count
    pub fn index(&self, position: usize) -> Result<ControlRecord> {
        let count = self.count()?;
        if position == 0 || position > count {
            return Err(Error::IndexOutOfRange {
                index: position,
                count,
            });
        }
        Ok(self.source.row(position - 1))
    }

    /// One record per row present right now
    pub fn rows(&self) -> Result<Vec<ControlRecord>> {
        let count = self.count()?;
        Ok((0..count).map(|i| self.source.row(i)).collect())
    }

    pub fn first(&self) -> Result<Option<ControlRecord>> {
        Ok(match self.count()? {
            0 => None,
            _ => Some(self.source.row(0)),
        })
    }

    pub fn last(&self) -> Result<Option<ControlRecord>> {
        Ok(match self.count()? {
            0 => None,
            n => Some(self.source.row(n - 1)),
        })
    }
}

impl fmt::Debug for TableValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableValue")
            .field("item_path", &self.source.item_path.to_string())
            .field("row_type", &self.source.row_type.to_string())
            .finish()
    }
}
