//! Drawing object model as seen through the CAD host
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Identifier of one object inside one drawing. Unique per drawing only.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(String);

impl ObjectId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ObjectId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ObjectId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// One element of a mark's label content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MarkElement {
    Property { name: String, value: String },
    UserDefined { value: String },
    Text { value: String },
    Unformatted { raw: String },
}

impl MarkElement {
    pub fn searchable_value(&self) -> String {
        match self {
            MarkElement::Property { value, .. }
            | MarkElement::UserDefined { value }
            | MarkElement::Text { value } => value.clone(),
            MarkElement::Unformatted { raw } => strip_formatting(raw),
        }
    }
}

/// Removes the bracket and line-break noise the host leaves in unformatted strings.
fn strip_formatting(raw: &str) -> String {
    raw.chars()
        .filter(|c| !matches!(c, '{' | '}' | '[' | ']' | '\n'))
        .collect::<String>()
        .trim()
        .to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mark {
    pub id: ObjectId,
    #[serde(default)]
    pub elements: Vec<MarkElement>,
}

impl Mark {
    /// Convenience constructor for a mark holding a single text element.
    pub fn with_text(id: impl Into<ObjectId>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            elements: vec![MarkElement::Text { value: text.into() }],
        }
    }

    /// Element values joined by line breaks.
    pub fn searchable_content(&self) -> String {
        self.elements
            .iter()
            .map(MarkElement::searchable_value)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextNote {
    pub id: ObjectId,
    pub text: String,
}

/// A drawing-side representation of a model part.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawingPart {
    pub id: ObjectId,
    pub model_id: ObjectId,
}

/// A model object with its report properties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelObject {
    pub id: ObjectId,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

impl ModelObject {
    pub fn new(id: impl Into<ObjectId>) -> Self {
        Self {
            id: id.into(),
            properties: BTreeMap::new(),
        }
    }

    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties.get(name).map(String::as_str)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Mark,
    Text,
    Part,
    Model,
    Other,
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectKind::Mark => write!(f, "mark"),
            ObjectKind::Text => write!(f, "text"),
            ObjectKind::Part => write!(f, "part"),
            ObjectKind::Model => write!(f, "model"),
            ObjectKind::Other => write!(f, "other"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DrawingObject {
    Mark(Mark),
    Text(TextNote),
    Part(DrawingPart),
    Model(ModelObject),
    Other { id: ObjectId, type_name: String },
}

impl DrawingObject {
    pub fn id(&self) -> &ObjectId {
        match self {
            DrawingObject::Mark(mark) => &mark.id,
            DrawingObject::Text(text) => &text.id,
            DrawingObject::Part(part) => &part.id,
            DrawingObject::Model(model) => &model.id,
            DrawingObject::Other { id, .. } => id,
        }
    }

    pub fn kind(&self) -> ObjectKind {
        match self {
            DrawingObject::Mark(_) => ObjectKind::Mark,
            DrawingObject::Text(_) => ObjectKind::Text,
            DrawingObject::Part(_) => ObjectKind::Part,
            DrawingObject::Model(_) => ObjectKind::Model,
            DrawingObject::Other { .. } => ObjectKind::Other,
        }
    }
}

/// Handle stored in the cache and handed to searches. Cloning shares the object.
pub type SharedObject = Arc<DrawingObject>;
