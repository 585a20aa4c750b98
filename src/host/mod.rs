//! CAD host boundary: object enumeration, report properties, selection
pub mod snapshot;

use crate::error::Result;
use crate::model::{DrawingObject, DrawingPart, ModelObject, SharedObject};
use log::debug;
use std::sync::Arc;

pub use snapshot::SnapshotHost;

/// Report property holding the assembly position of a model object.
pub const ASSEMBLY_POS_PROPERTY: &str = "ASSEMBLY_POS";
pub const PART_POS_PROPERTY: &str = "PART_POS";

/// Owning assembly of a drawing part, as reported by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssemblyLink {
    pub model_object: ModelObject,
    /// Whether the part is the main part of that assembly.
    pub is_main_part: bool,
}

/// Operations the cache and searches need from the CAD application.
#[cfg_attr(test, mockall::automock)]
pub trait CadHost: Send + Sync {
    fn active_drawing_id(&self) -> Option<String>;

    fn enumerate_objects(&self, drawing_id: &str) -> Result<Vec<DrawingObject>>;

    fn report_property(&self, object: &ModelObject, name: &str) -> Option<String>;

    /// Resolves the assembly owning `part` within the given drawing.
    fn resolve_owning_assembly(&self, drawing_id: &str, part: &DrawingPart) -> Result<AssemblyLink>;

    fn unselect_all(&self) -> Result<()>;

    fn select_objects(&self, objects: &[SharedObject]) -> Result<()>;
}

/// Receives the final result set of a search.
pub trait ResultSelector: Send + Sync {
    fn select_results(&self, objects: &[SharedObject]) -> Result<()>;
}

/// Replaces the host selection with the search results.
pub struct HostResultSelector {
    host: Arc<dyn CadHost>,
}

impl HostResultSelector {
    pub fn new(host: Arc<dyn CadHost>) -> Self {
        Self { host }
    }
}

impl ResultSelector for HostResultSelector {
    fn select_results(&self, objects: &[SharedObject]) -> Result<()> {
        self.host.unselect_all()?;
        debug!("Selecting {} object(s) in host", objects.len());
        self.host.select_objects(objects)
    }
}
