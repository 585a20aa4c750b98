//! Cache key construction
//!
//! Keys are structured records so equality and hashing never depend on how
//! ids happen to be spelled. Their string form is produced by
//! [`CacheKeyBuilder`] and follows the layout
//!
//! ```text
//! drawing_{drawingId}
//! drawing_object_{objectId}_{drawingKey}
//! assembly_object_{objectId}_{drawingKey}[_main]
//! relationship_{keyA}:{keyB}
//! ```
use std::fmt;

const DRAWING_TOKEN: &str = "drawing";
const DRAWING_OBJECT_TOKEN: &str = "drawing_object";
const ASSEMBLY_OBJECT_TOKEN: &str = "assembly_object";
const MATCHED_CONTENT_TOKEN: &str = "matched_content";
const RELATIONSHIP_TOKEN: &str = "relationship";
const MAIN_PART_TOKEN: &str = "main";
const KEY_DELIMITER: &str = "_";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyKind {
    Drawing,
    DrawingObject,
    AssemblyObject,
    MatchedContent,
}

impl KeyKind {
    pub fn token(self) -> &'static str {
        match self {
            KeyKind::Drawing => DRAWING_TOKEN,
            KeyKind::DrawingObject => DRAWING_OBJECT_TOKEN,
            KeyKind::AssemblyObject => ASSEMBLY_OBJECT_TOKEN,
            KeyKind::MatchedContent => MATCHED_CONTENT_TOKEN,
        }
    }
}

/// Builds a key string from ordered tokens for one subject id.
///
/// The same sequence of calls with the same inputs always yields the same
/// string. Tokens are not escaped: an id that contains `_` or `:` can render
/// identically to another key, which is why the cache itself indexes by
/// [`CacheKey`] and only uses the rendered form for display.
#[derive(Debug, Clone)]
pub struct CacheKeyBuilder {
    object_id: String,
    components: Vec<String>,
}

impl CacheKeyBuilder {
    pub fn new(object_id: impl Into<String>) -> Self {
        Self {
            object_id: object_id.into(),
            components: Vec::new(),
        }
    }

    pub fn use_kind(mut self, kind: KeyKind) -> Self {
        self.components.push(kind.token().to_string());
        self
    }

    pub fn use_drawing_key(self) -> Self {
        self.use_kind(KeyKind::Drawing)
    }

    pub fn use_drawing_object_key(self) -> Self {
        self.use_kind(KeyKind::DrawingObject)
    }

    pub fn use_assembly_object_key(self) -> Self {
        self.use_kind(KeyKind::AssemblyObject)
    }

    pub fn use_matched_content_key(self) -> Self {
        self.use_kind(KeyKind::MatchedContent)
    }

    /// Appends `relationship_{subject}:{related}`.
    pub fn add_relationship_to(mut self, related_id: &str) -> Self {
        self.components.push(format!(
            "{RELATIONSHIP_TOKEN}_{}:{related_id}",
            self.object_id
        ));
        self
    }

    pub fn append_object_id(mut self) -> Self {
        self.components.push(self.object_id.clone());
        self
    }

    pub fn append(mut self, token: impl Into<String>) -> Self {
        self.components.push(token.into());
        self
    }

    pub fn main_part(mut self) -> Self {
        self.components.push(MAIN_PART_TOKEN.to_string());
        self
    }

    /// Shorthand for `drawing_{id}`.
    pub fn drawing_cache_key(self) -> String {
        self.use_drawing_key().append_object_id().build()
    }

    pub fn build(&self) -> String {
        self.components.join(KEY_DELIMITER)
    }
}

/// Structured cache key: a main key (one per drawing) or an entry key inside
/// a drawing's bucket.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    kind: KeyKind,
    id: String,
    drawing: Option<String>,
    main: bool,
}

impl CacheKey {
    pub fn drawing(drawing_id: impl Into<String>) -> Self {
        Self {
            kind: KeyKind::Drawing,
            id: drawing_id.into(),
            drawing: None,
            main: false,
        }
    }

    pub fn drawing_object(drawing_id: impl Into<String>, object_id: impl Into<String>) -> Self {
        Self {
            kind: KeyKind::DrawingObject,
            id: object_id.into(),
            drawing: Some(drawing_id.into()),
            main: false,
        }
    }

    pub fn assembly_object(
        drawing_id: impl Into<String>,
        object_id: impl Into<String>,
        is_main: bool,
    ) -> Self {
        Self {
            kind: KeyKind::AssemblyObject,
            id: object_id.into(),
            drawing: Some(drawing_id.into()),
            main: is_main,
        }
    }

    pub fn kind(&self) -> KeyKind {
        self.kind
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Drawing id an entry key is scoped to. `None` for main keys.
    pub fn drawing_id(&self) -> Option<&str> {
        self.drawing.as_deref()
    }

    pub fn is_main(&self) -> bool {
        self.main
    }

    /// True when this entry key lives in the bucket identified by `main_key`.
    pub fn belongs_to(&self, main_key: &CacheKey) -> bool {
        main_key.kind == KeyKind::Drawing && self.drawing.as_deref() == Some(main_key.id.as_str())
    }

    pub fn render(&self) -> String {
        let builder = CacheKeyBuilder::new(self.id.as_str())
            .use_kind(self.kind)
            .append_object_id();
        let builder = match &self.drawing {
            Some(drawing_id) => {
                builder.append(CacheKeyBuilder::new(drawing_id.as_str()).drawing_cache_key())
            }
            None => builder,
        };
        if self.main {
            builder.main_part().build()
        } else {
            builder.build()
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// Unordered pair of entry keys grouping mutually related participants.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RelationshipKey {
    first: CacheKey,
    second: CacheKey,
}

impl RelationshipKey {
    pub fn new(a: CacheKey, b: CacheKey) -> Self {
        if a <= b {
            Self { first: a, second: b }
        } else {
            Self { first: b, second: a }
        }
    }

    pub fn involves(&self, key: &CacheKey) -> bool {
        &self.first == key || &self.second == key
    }

    pub fn participants(&self) -> (&CacheKey, &CacheKey) {
        (&self.first, &self.second)
    }
}

impl fmt::Display for RelationshipKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered = CacheKeyBuilder::new(self.first.render())
            .add_relationship_to(&self.second.render())
            .build();
        f.write_str(&rendered)
    }
}

/// Canonical keys for drawings, drawing objects and assembly objects.
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheKeyGenerator;

impl CacheKeyGenerator {
    pub fn new() -> Self {
        Self
    }

    pub fn drawing_key(&self, drawing_id: &str) -> CacheKey {
        CacheKey::drawing(drawing_id)
    }

    pub fn drawing_object_key(&self, drawing_id: &str, object_id: &str) -> CacheKey {
        CacheKey::drawing_object(drawing_id, object_id)
    }

    pub fn assembly_key(&self, drawing_id: &str, assembly_id: &str, is_main: bool) -> CacheKey {
        CacheKey::assembly_object(drawing_id, assembly_id, is_main)
    }

    pub fn relationship_key(&self, a: &CacheKey, b: &CacheKey) -> RelationshipKey {
        RelationshipKey::new(a.clone(), b.clone())
    }
}
