//! Extractors turning searchable items into the string the strategies see
use crate::host::{ASSEMBLY_POS_PROPERTY, PART_POS_PROPERTY};
use crate::model::{DrawingObject, SharedObject};
use crate::search::SearchDomain;

pub trait DataExtractor<T>: Send + Sync {
    fn extract(&self, item: &T) -> String;
}

/// Extractor selection, resolved once per search from the search domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extractor {
    Mark,
    Text,
    ModelObject,
    AssemblyPosition,
}

impl Extractor {
    pub fn for_domain(domain: SearchDomain) -> Self {
        match domain {
            SearchDomain::PartMark => Extractor::Mark,
            SearchDomain::Text => Extractor::Text,
            SearchDomain::Assembly => Extractor::AssemblyPosition,
            SearchDomain::ModelObject => Extractor::ModelObject,
        }
    }
}

impl DataExtractor<SharedObject> for Extractor {
    fn extract(&self, item: &SharedObject) -> String {
        match (self, item.as_ref()) {
            (Extractor::Mark, DrawingObject::Mark(mark)) => mark.searchable_content(),
            (Extractor::Text, DrawingObject::Text(text)) => text.text.clone(),
            (Extractor::ModelObject, DrawingObject::Model(model)) => [ASSEMBLY_POS_PROPERTY, PART_POS_PROPERTY]
                .into_iter()
                .filter_map(|name| model.property(name))
                .filter(|value| !value.trim().is_empty())
                .collect::<Vec<_>>()
                .join("\n"),
            _ => String::new(),
        }
    }
}

impl DataExtractor<String> for Extractor {
    fn extract(&self, item: &String) -> String {
        match self {
            Extractor::AssemblyPosition => item.clone(),
            Extractor::Mark | Extractor::Text | Extractor::ModelObject => String::new(),
        }
    }
}
