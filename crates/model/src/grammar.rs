//! Compact type-string grammar
//!
//! Control schemas arrive as short strings such as `*[Title:s,Price:n]`
//! (a table whose rows carry two fields) or `![Text:s,Visible:b]` (a record).
//! A bare tag like `n` names a scalar. Parsing happens once here; everything
//! downstream matches on [`TypeNode`].

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::fmt;

/// Primitive formula types addressable by a scalar tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    String,
    Boolean,
    DateTime,
    Date,
    Hyperlink,
    Color,
    Number,
    Decimal,
    DateTimeNoTimeZone,
    Guid,
    UntypedObject,
}

impl ScalarKind {
    /// Canonical tag written back when serializing a type tree
    pub fn tag(&self) -> &'static str {
        match self {
            ScalarKind::String => "s",
            ScalarKind::Boolean => "b",
            ScalarKind::DateTime => "d",
            ScalarKind::Date => "D",
            ScalarKind::Hyperlink => "h",
            ScalarKind::Color => "c",
            ScalarKind::Number => "n",
            ScalarKind::Decimal => "m",
            ScalarKind::DateTimeNoTimeZone => "Z",
            ScalarKind::Guid => "g",
            ScalarKind::UntypedObject => "v",
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self, ScalarKind::String | ScalarKind::Hyperlink)
    }

    pub fn is_temporal(&self) -> bool {
        matches!(
            self,
            ScalarKind::DateTime | ScalarKind::Date | ScalarKind::DateTimeNoTimeZone
        )
    }
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScalarKind::String => "String",
            ScalarKind::Boolean => "Boolean",
            ScalarKind::DateTime => "DateTime",
            ScalarKind::Date => "Date",
            ScalarKind::Hyperlink => "Hyperlink",
            ScalarKind::Color => "Color",
            ScalarKind::Number => "Number",
            ScalarKind::Decimal => "Decimal",
            ScalarKind::DateTimeNoTimeZone => "DateTimeNoTimeZone",
            ScalarKind::Guid => "Guid",
            ScalarKind::UntypedObject => "UntypedObject",
        };
        f.write_str(name)
    }
}

/// Ordered set of named fields
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordType {
    fields: Vec<(String, TypeNode)>,
}

impl RecordType {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a field; a repeated name replaces the earlier type in place
    pub fn with_field(mut self, name: impl Into<String>, field_type: TypeNode) -> Self {
        self.add_field(name, field_type);
        self
    }

    pub fn add_field(&mut self, name: impl Into<String>, field_type: TypeNode) {
        let name = name.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = field_type,
            None => self.fields.push((name, field_type)),
        }
    }

    pub fn field_type(&self, name: &str) -> Option<&TypeNode> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, t)| t)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &TypeNode)> {
        self.fields.iter().map(|(n, t)| (n.as_str(), t))
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, (name, field_type)) in self.fields.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}:{}", name, field_type)?;
        }
        f.write_str("]")
    }
}

/// A parsed type: scalar, record, or table of records
#[derive(Debug, Clone, PartialEq)]
pub enum TypeNode {
    Scalar(ScalarKind),
    Record(RecordType),
    Table(RecordType),
}

impl TypeNode {
    pub fn as_scalar(&self) -> Option<ScalarKind> {
        match self {
            TypeNode::Scalar(kind) => Some(*kind),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&RecordType> {
        match self {
            TypeNode::Record(record) => Some(record),
            _ => None,
        }
    }

    /// Row schema of a table type
    pub fn row_type(&self) -> Option<&RecordType> {
        match self {
            TypeNode::Table(row) => Some(row),
            _ => None,
        }
    }
}

impl fmt::Display for TypeNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeNode::Scalar(kind) => f.write_str(kind.tag()),
            TypeNode::Record(record) => write!(f, "!{}", record),
            TypeNode::Table(row) => write!(f, "*{}", row),
        }
    }
}

const TABLE_SIGIL: char = '*';
const RECORD_SIGILS: [char; 2] = ['!', 'l'];

static FIELD_PAIR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^\s*([^:\[\],]+?)\s*:\s*(\S(?:.*\S)?)\s*$").expect("valid field regex")
});

/// Type-string parser owning its scalar registry.
///
/// Each instance starts from the built-in tags; [`TypeGrammar::add_mapping`]
/// extends only that instance, so separate sessions never share mappings.
#[derive(Debug, Clone)]
pub struct TypeGrammar {
    mappings: HashMap<String, TypeNode>,
}

impl Default for TypeGrammar {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeGrammar {
    pub fn new() -> Self {
        let builtin = [
            ("s", ScalarKind::String),
            ("b", ScalarKind::Boolean),
            ("d", ScalarKind::DateTime),
            ("D", ScalarKind::Date),
            ("h", ScalarKind::Hyperlink),
            ("c", ScalarKind::Color),
            ("n", ScalarKind::Number),
            ("Z", ScalarKind::DateTimeNoTimeZone),
            ("g", ScalarKind::Guid),
            ("m", ScalarKind::Decimal),
            ("v", ScalarKind::UntypedObject),
            ("i", ScalarKind::String),
        ];

        Self {
            mappings: builtin
                .into_iter()
                .map(|(tag, kind)| (tag.to_string(), TypeNode::Scalar(kind)))
                .collect(),
        }
    }

    /// Register `tag`. The first registration of a tag wins; returns whether
    /// this call inserted it.
    pub fn add_mapping(&mut self, tag: impl Into<String>, node: TypeNode) -> bool {
        use std::collections::hash_map::Entry;

        match self.mappings.entry(tag.into()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(node);
                true
            }
        }
    }

    pub fn lookup(&self, tag: &str) -> Option<&TypeNode> {
        self.mappings.get(tag)
    }

    /// Parse a type string. Any unresolvable part fails the whole parse.
    pub fn parse(&self, input: &str) -> Option<TypeNode> {
        let input = input.trim();
        if input.is_empty() {
            return None;
        }

        if let Some(body) = input.strip_prefix(TABLE_SIGIL) {
            return self.parse_record_body(body).map(TypeNode::Table);
        }

        let mut chars = input.chars();
        if let (Some(first), Some('[')) = (chars.next(), chars.next()) {
            if RECORD_SIGILS.contains(&first) {
                return self.parse_record_body(&input[first.len_utf8()..]).map(TypeNode::Record);
            }
        }

        if input.starts_with('[') {
            return self.parse_record_body(input).map(TypeNode::Record);
        }

        self.lookup(input).cloned()
    }

    fn parse_record_body(&self, body: &str) -> Option<RecordType> {
        let inner = body.trim().strip_prefix('[')?.strip_suffix(']')?;

        let mut record = RecordType::new();
        if inner.trim().is_empty() {
            return Some(record);
        }

        for segment in split_top_level(inner)? {
            let caps = FIELD_PAIR.captures(segment)?;
            let field_type = self.parse(&caps[2])?;
            record.add_field(&caps[1], field_type);
        }
        Some(record)
    }
}

/// Split on commas outside brackets; `None` when brackets are unbalanced
fn split_top_level(inner: &str) -> Option<Vec<&str>> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;

    for (i, ch) in inner.char_indices() {
        match ch {
            '[' => depth += 1,
            ']' => depth = depth.checked_sub(1)?,
            ',' if depth == 0 => {
                parts.push(&inner[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }

    if depth != 0 {
        return None;
    }
    parts.push(&inner[start..]);
    Some(parts)
}
