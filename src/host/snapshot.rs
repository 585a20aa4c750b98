//! In-memory host backed by a JSON drawing snapshot
use crate::error::{DrawingSearchError, Result};
use crate::host::{AssemblyLink, CadHost};
use crate::model::{DrawingObject, DrawingPart, ModelObject, ObjectId, SharedObject};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub active_drawing: Option<String>,
    #[serde(default)]
    pub drawings: Vec<SnapshotDrawing>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SnapshotDrawing {
    pub id: String,
    #[serde(default)]
    pub objects: Vec<DrawingObject>,
    #[serde(default)]
    pub assemblies: Vec<SnapshotAssembly>,
}

impl SnapshotDrawing {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn with_object(mut self, object: DrawingObject) -> Self {
        self.objects.push(object);
        self
    }

    pub fn with_assembly(mut self, assembly: SnapshotAssembly) -> Self {
        self.assemblies.push(assembly);
        self
    }
}

/// An assembly model object and the model ids of its parts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotAssembly {
    pub model: ModelObject,
    pub main_part: ObjectId,
    #[serde(default)]
    pub parts: Vec<ObjectId>,
}

pub struct SnapshotHost {
    active: RwLock<Option<String>>,
    drawings: RwLock<HashMap<String, SnapshotDrawing>>,
    selection: Mutex<Vec<ObjectId>>,
}

impl SnapshotHost {
    pub fn new(snapshot: Snapshot) -> Self {
        let drawings = snapshot
            .drawings
            .into_iter()
            .map(|drawing| (drawing.id.clone(), drawing))
            .collect();
        Self {
            active: RwLock::new(snapshot.active_drawing),
            drawings: RwLock::new(drawings),
            selection: Mutex::new(Vec::new()),
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(Self::new(serde_json::from_str(json)?))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Host with a single drawing that is also the active one.
    pub fn with_drawing(drawing: SnapshotDrawing) -> Self {
        Self::new(Snapshot {
            active_drawing: Some(drawing.id.clone()),
            drawings: vec![drawing],
        })
    }

    pub fn set_active_drawing(&self, drawing_id: Option<String>) {
        *self.active.write() = drawing_id;
    }

    /// Swaps the content of a drawing, as if it had been edited in the host.
    pub fn replace_drawing(&self, drawing: SnapshotDrawing) {
        self.drawings.write().insert(drawing.id.clone(), drawing);
    }

    /// Ids selected by the last call to `select_objects`.
    pub fn selected(&self) -> Vec<ObjectId> {
        self.selection.lock().clone()
    }
}

impl CadHost for SnapshotHost {
    fn active_drawing_id(&self) -> Option<String> {
        self.active.read().clone()
    }

    fn enumerate_objects(&self, drawing_id: &str) -> Result<Vec<DrawingObject>> {
        self.drawings
            .read()
            .get(drawing_id)
            .map(|drawing| drawing.objects.clone())
            .ok_or_else(|| DrawingSearchError::HostUnavailable(format!("no drawing '{drawing_id}'")))
    }

    fn report_property(&self, object: &ModelObject, name: &str) -> Option<String> {
        object.property(name).map(str::to_string)
    }

    fn resolve_owning_assembly(&self, drawing_id: &str, part: &DrawingPart) -> Result<AssemblyLink> {
        let drawings = self.drawings.read();
        drawings
            .get(drawing_id)
            .into_iter()
            .flat_map(|drawing| drawing.assemblies.iter())
            .find(|assembly| assembly.parts.contains(&part.model_id))
            .map(|assembly| AssemblyLink {
                model_object: assembly.model.clone(),
                is_main_part: assembly.main_part == part.model_id,
            })
            .ok_or_else(|| DrawingSearchError::ResolutionFailure {
                object_id: part.id.to_string(),
                reason: format!("model object {} belongs to no assembly", part.model_id),
            })
    }

    fn unselect_all(&self) -> Result<()> {
        self.selection.lock().clear();
        Ok(())
    }

    fn select_objects(&self, objects: &[SharedObject]) -> Result<()> {
        self.selection
            .lock()
            .extend(objects.iter().map(|object| object.id().clone()));
        Ok(())
    }
}
