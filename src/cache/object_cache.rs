//! Two-tier object cache with a relationship graph and a position index
use crate::cache::keys::{CacheKey, CacheKeyGenerator, KeyKind, RelationshipKey};
use crate::cache::state::{CacheState, CacheStateManager};
use crate::error::{DrawingSearchError, Result};
use crate::host::{AssemblyLink, CadHost, ASSEMBLY_POS_PROPERTY};
use crate::model::{DrawingObject, SharedObject};
use log::{debug, info, warn};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub objects: usize,
    pub assemblies_linked: usize,
    pub links_skipped: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub main_keys: usize,
    pub entries: usize,
    pub relationships: usize,
    pub positions: usize,
}

#[derive(Default)]
struct Bucket {
    entries: HashMap<CacheKey, SharedObject>,
    relationships: HashMap<RelationshipKey, HashSet<CacheKey>>,
}

impl Bucket {
    fn is_linked(&self, key: &CacheKey) -> bool {
        self.relationships.keys().any(|relationship| relationship.involves(key))
    }

    fn unlink(&mut self, key: &CacheKey) {
        self.relationships
            .retain(|relationship, _| !relationship.involves(key));
    }

    /// Unlinks `key` and drops the assembly entries left without any
    /// relationship. Returns the dropped keys.
    fn unlink_and_drop_orphans(&mut self, key: &CacheKey) -> HashSet<CacheKey> {
        let partners: HashSet<CacheKey> = self
            .relationships
            .iter()
            .filter(|(relationship, _)| relationship.involves(key))
            .flat_map(|(_, participants)| participants.iter())
            .filter(|partner| *partner != key && partner.kind() == KeyKind::AssemblyObject)
            .cloned()
            .collect();
        self.unlink(key);

        let orphans: HashSet<CacheKey> = partners
            .into_iter()
            .filter(|partner| !self.is_linked(partner))
            .collect();
        for orphan in &orphans {
            self.entries.remove(orphan);
        }
        orphans
    }
}

struct PositionEntry {
    label: String,
    keys: HashSet<CacheKey>,
}

#[derive(Default)]
struct CacheInner {
    buckets: HashMap<CacheKey, Bucket>,
    /// Lower-cased position -> keys carrying it. Never holds an empty set.
    positions: HashMap<String, PositionEntry>,
    initial_caching_done: bool,
}

impl CacheInner {
    fn bucket_mut(&mut self, main_key: &CacheKey) -> Result<&mut Bucket> {
        self.buckets
            .get_mut(main_key)
            .ok_or_else(|| DrawingSearchError::UnknownMainKey(main_key.to_string()))
    }

    fn index_position(&mut self, key: CacheKey, position: &str) {
        let label = position.trim();
        if label.is_empty() {
            return;
        }
        self.positions
            .entry(label.to_lowercase())
            .or_insert_with(|| PositionEntry {
                label: label.to_string(),
                keys: HashSet::new(),
            })
            .keys
            .insert(key);
    }

    fn unindex_where(&mut self, mut drop_key: impl FnMut(&CacheKey) -> bool) {
        self.positions.retain(|_, entry| {
            entry.keys.retain(|key| !drop_key(key));
            !entry.keys.is_empty()
        });
    }

    /// Drops entries no relationship references, in every bucket or only in
    /// `scope`. Returns how many went.
    fn prune_unrelated(&mut self, scope: Option<&CacheKey>) -> usize {
        let mut removed = HashSet::new();
        for (main_key, bucket) in self.buckets.iter_mut() {
            if scope.is_some_and(|scope| scope != main_key) {
                continue;
            }
            let linked: HashSet<CacheKey> = bucket
                .relationships
                .values()
                .flat_map(|participants| participants.iter().cloned())
                .collect();
            bucket.entries.retain(|key, _| {
                let keep = linked.contains(key);
                if !keep {
                    removed.insert(key.clone());
                }
                keep
            });
        }
        if !removed.is_empty() {
            self.unindex_where(|key| removed.contains(key));
        }
        removed.len()
    }

    fn clear(&mut self) {
        self.buckets.clear();
        self.positions.clear();
    }
}

/// Process-wide cache of drawing objects.
///
/// Each drawing owns a bucket under its main key holding entries and the
/// relationships between them. A secondary index maps assembly positions,
/// compared case-insensitively, to the keys carrying them. All access goes
/// through one lock: writers are exclusive, readers share.
pub struct ObjectCache {
    inner: RwLock<CacheInner>,
    state: CacheStateManager,
    keys: CacheKeyGenerator,
}

impl ObjectCache {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(CacheInner::default()),
            state: CacheStateManager::new(),
            keys: CacheKeyGenerator::new(),
        }
    }

    pub fn state(&self) -> &CacheStateManager {
        &self.state
    }

    pub fn cache_state(&self) -> CacheState {
        self.state.state()
    }

    pub fn is_caching(&self) -> bool {
        self.state.is_caching()
    }

    pub fn add_main_key(&self, main_key: &CacheKey) {
        self.inner
            .write()
            .buckets
            .entry(main_key.clone())
            .or_default();
    }

    pub fn main_keys(&self) -> Vec<CacheKey> {
        let mut keys: Vec<CacheKey> = self.inner.read().buckets.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn contains_main_key(&self, main_key: &CacheKey) -> bool {
        self.inner.read().buckets.contains_key(main_key)
    }

    /// Inserts or overwrites `entry_key`. The bucket must exist.
    pub fn add_entry(&self, main_key: &CacheKey, entry_key: CacheKey, value: SharedObject) -> Result<()> {
        self.inner
            .write()
            .bucket_mut(main_key)?
            .entries
            .insert(entry_key, value);
        Ok(())
    }

    pub fn get(&self, main_key: &CacheKey, entry_key: &CacheKey) -> Option<SharedObject> {
        self.inner
            .read()
            .buckets
            .get(main_key)
            .and_then(|bucket| bucket.entries.get(entry_key))
            .cloned()
    }

    /// Drops the bucket, its relationships and its position index entries.
    pub fn remove_main_key(&self, main_key: &CacheKey) -> bool {
        let mut inner = self.inner.write();
        let removed = inner.buckets.remove(main_key).is_some();
        if removed {
            inner.unindex_where(|key| key.belongs_to(main_key));
            debug!("Removed main key {main_key}");
        }
        removed
    }

    pub fn remove_entry(&self, main_key: &CacheKey, entry_key: &CacheKey) -> Option<SharedObject> {
        let mut inner = self.inner.write();
        let bucket = inner.buckets.get_mut(main_key)?;
        let removed = bucket.entries.remove(entry_key);
        bucket.unlink(entry_key);
        inner.unindex_where(|key| key == entry_key);
        removed
    }

    pub fn add_relationship(&self, main_key: &CacheKey, a: CacheKey, b: CacheKey) -> Result<()> {
        let mut inner = self.inner.write();
        let bucket = inner.bucket_mut(main_key)?;
        let relationship = self.keys.relationship_key(&a, &b);
        let participants = bucket.relationships.entry(relationship).or_default();
        participants.insert(a);
        participants.insert(b);
        Ok(())
    }

    /// Every other participant of the relationships in `main_key` that
    /// involve `entry_key`.
    pub fn related_to(&self, main_key: &CacheKey, entry_key: &CacheKey) -> Vec<SharedObject> {
        let inner = self.inner.read();
        inner
            .buckets
            .get(main_key)
            .map(|bucket| related_in(bucket, entry_key))
            .unwrap_or_default()
    }

    /// Same as [`ObjectCache::related_to`] across every drawing.
    pub fn related_to_any(&self, entry_key: &CacheKey) -> Vec<SharedObject> {
        let inner = self.inner.read();
        inner
            .buckets
            .values()
            .flat_map(|bucket| related_in(bucket, entry_key))
            .collect()
    }

    /// Entry keys of one bucket, or every main key when `main_key` is `None`.
    pub fn dump_keys(&self, main_key: Option<&CacheKey>) -> Vec<String> {
        let inner = self.inner.read();
        let mut keys: Vec<String> = match main_key {
            Some(main_key) => inner
                .buckets
                .get(main_key)
                .map(|bucket| bucket.entries.keys().map(CacheKey::render).collect())
                .unwrap_or_default(),
            None => inner.buckets.keys().map(CacheKey::render).collect(),
        };
        keys.sort();
        keys
    }

    pub fn dump_relationships(&self, main_key: Option<&CacheKey>) -> Vec<String> {
        let inner = self.inner.read();
        let mut relationships: Vec<String> = inner
            .buckets
            .iter()
            .filter(|(key, _)| main_key.map_or(true, |main_key| *key == main_key))
            .flat_map(|(_, bucket)| bucket.relationships.keys().map(ToString::to_string))
            .collect();
        relationships.sort();
        relationships
    }

    /// Copy of one bucket's entries taken under the lock.
    pub fn snapshot(&self, main_key: &CacheKey) -> Vec<(CacheKey, SharedObject)> {
        self.inner
            .read()
            .buckets
            .get(main_key)
            .map(|bucket| {
                bucket
                    .entries
                    .iter()
                    .map(|(key, value)| (key.clone(), value.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Indexes `key` under `position`. Blank positions are ignored.
    pub fn cache_assembly_position(&self, key: CacheKey, position: &str) {
        self.inner.write().index_position(key, position);
    }

    pub fn fetch_by_position(&self, position: &str) -> HashSet<CacheKey> {
        self.inner
            .read()
            .positions
            .get(&position.trim().to_lowercase())
            .map(|entry| entry.keys.clone())
            .unwrap_or_default()
    }

    pub fn dump_positions(&self) -> Vec<String> {
        let mut positions: Vec<String> = self
            .inner
            .read()
            .positions
            .values()
            .map(|entry| entry.label.clone())
            .collect();
        positions.sort();
        positions
    }

    /// Positions carried by at least one key of the given drawing.
    pub fn dump_positions_for(&self, main_key: &CacheKey) -> Vec<String> {
        let mut positions: Vec<String> = self
            .inner
            .read()
            .positions
            .values()
            .filter(|entry| entry.keys.iter().any(|key| key.belongs_to(main_key)))
            .map(|entry| entry.label.clone())
            .collect();
        positions.sort();
        positions
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.read();
        CacheStats {
            main_keys: inner.buckets.len(),
            entries: inner.buckets.values().map(|b| b.entries.len()).sum(),
            relationships: inner.buckets.values().map(|b| b.relationships.len()).sum(),
            positions: inner.positions.len(),
        }
    }

    /// Enumerates a drawing from the host and stores every object, linking
    /// parts to their owning assemblies.
    pub fn bulk_ingest(&self, host: &dyn CadHost, drawing_id: &str, view_changed: bool) -> Result<IngestReport> {
        let guard = self.state.begin_caching();
        let report = self.ingest_locked(&mut self.inner.write(), host, drawing_id, view_changed)?;
        guard.finish();
        Ok(report)
    }

    /// Before the first ingestion this clears everything; afterwards it only
    /// drops entries that no relationship references.
    pub fn refresh(&self) -> usize {
        let guard = self.state.begin_caching();
        let pruned = Self::refresh_locked(&mut self.inner.write(), None);
        guard.finish();
        pruned
    }

    /// [`ObjectCache::refresh`] followed by [`ObjectCache::bulk_ingest`] under
    /// one write lock and one caching phase. Once the cache has been filled,
    /// only the refreshed drawing's bucket is pruned. A `cancel` token
    /// signalled by the time the lock is held aborts without touching the
    /// cache.
    pub fn refresh_and_ingest(
        &self,
        host: &dyn CadHost,
        drawing_id: &str,
        view_changed: bool,
        cancel: Option<&CancellationToken>,
    ) -> Result<IngestReport> {
        let guard = self.state.begin_caching();
        let report = {
            let mut inner = self.inner.write();
            if cancel.is_some_and(CancellationToken::is_cancelled) {
                return Err(DrawingSearchError::CancelledRefresh(drawing_id.to_string()));
            }
            let main_key = self.keys.drawing_key(drawing_id);
            let pruned = Self::refresh_locked(&mut inner, Some(&main_key));
            debug!("Refresh pruned {pruned} unrelated entries");
            self.ingest_locked(&mut inner, host, drawing_id, view_changed)?
        };
        guard.finish();
        Ok(report)
    }

    fn refresh_locked(inner: &mut CacheInner, scope: Option<&CacheKey>) -> usize {
        if inner.initial_caching_done {
            inner.prune_unrelated(scope)
        } else {
            let cleared = inner.buckets.values().map(|b| b.entries.len()).sum();
            inner.clear();
            cleared
        }
    }

    fn ingest_locked(
        &self,
        inner: &mut CacheInner,
        host: &dyn CadHost,
        drawing_id: &str,
        view_changed: bool,
    ) -> Result<IngestReport> {
        let start = Instant::now();
        let main_key = self.keys.drawing_key(drawing_id);
        let objects = host.enumerate_objects(drawing_id)?;
        inner.buckets.entry(main_key.clone()).or_default();

        let mut report = IngestReport::default();
        for object in objects {
            let object: SharedObject = Arc::new(object);
            let key = self.keys.drawing_object_key(drawing_id, object.id().as_str());
            let bucket = inner.bucket_mut(&main_key)?;
            bucket.entries.insert(key.clone(), object.clone());
            report.objects += 1;

            let DrawingObject::Part(part) = object.as_ref() else {
                continue;
            };
            if bucket.is_linked(&key) {
                if !view_changed {
                    continue;
                }
                let orphans = bucket.unlink_and_drop_orphans(&key);
                if !orphans.is_empty() {
                    inner.unindex_where(|dropped| orphans.contains(dropped));
                }
            }

            match host.resolve_owning_assembly(drawing_id, part) {
                Ok(link) => {
                    self.link_assembly(inner, host, &main_key, drawing_id, key, link)?;
                    report.assemblies_linked += 1;
                }
                Err(e) => {
                    warn!("Skipping assembly link for part {}: {}", part.id, e);
                    report.links_skipped += 1;
                }
            }
        }

        inner.initial_caching_done = true;
        info!(
            "Cached {} object(s) for drawing {} ({} assembly link(s), {} skipped) in {:.2?}",
            report.objects,
            drawing_id,
            report.assemblies_linked,
            report.links_skipped,
            start.elapsed()
        );
        Ok(report)
    }

    fn link_assembly(
        &self,
        inner: &mut CacheInner,
        host: &dyn CadHost,
        main_key: &CacheKey,
        drawing_id: &str,
        part_key: CacheKey,
        link: AssemblyLink,
    ) -> Result<()> {
        let assembly_key =
            self.keys
                .assembly_key(drawing_id, link.model_object.id.as_str(), link.is_main_part);
        let position = host.report_property(&link.model_object, ASSEMBLY_POS_PROPERTY);

        let bucket = inner.bucket_mut(main_key)?;
        bucket.entries.insert(
            assembly_key.clone(),
            Arc::new(DrawingObject::Model(link.model_object)),
        );
        let relationship = self.keys.relationship_key(&part_key, &assembly_key);
        let participants = bucket.relationships.entry(relationship).or_default();
        participants.insert(part_key);
        participants.insert(assembly_key.clone());

        if let Some(position) = position {
            inner.index_position(assembly_key, &position);
        }
        Ok(())
    }
}

impl Default for ObjectCache {
    fn default() -> Self {
        Self::new()
    }
}

fn related_in(bucket: &Bucket, entry_key: &CacheKey) -> Vec<SharedObject> {
    let others: HashSet<&CacheKey> = bucket
        .relationships
        .iter()
        .filter(|(relationship, _)| relationship.involves(entry_key))
        .flat_map(|(_, participants)| participants.iter())
        .filter(|key| *key != entry_key)
        .collect();
    others
        .into_iter()
        .filter_map(|key| bucket.entries.get(key).cloned())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::snapshot::{SnapshotAssembly, SnapshotDrawing};
    use crate::host::{MockCadHost, SnapshotHost};
    use crate::model::{DrawingPart, Mark, ModelObject, ObjectId};

    fn mark(id: &str, text: &str) -> SharedObject {
        Arc::new(DrawingObject::Mark(Mark::with_text(id, text)))
    }

    fn part(id: &str, model_id: &str) -> DrawingObject {
        DrawingObject::Part(DrawingPart {
            id: id.into(),
            model_id: model_id.into(),
        })
    }

    fn assembly_drawing() -> SnapshotDrawing {
        SnapshotDrawing::new("42")
            .with_object(DrawingObject::Mark(Mark::with_text("1", "ABC123")))
            .with_object(part("10", "m10"))
            .with_object(part("11", "m11"))
            .with_object(part("12", "m12"))
            .with_assembly(SnapshotAssembly {
                model: ModelObject::new("a1").with_property(ASSEMBLY_POS_PROPERTY, "B1"),
                main_part: ObjectId::new("m10"),
                parts: vec!["m10".into(), "m11".into(), "m12".into()],
            })
    }

    fn ids(objects: &[SharedObject]) -> HashSet<String> {
        objects.iter().map(|o| o.id().to_string()).collect()
    }

    #[test]
    fn relationships_are_symmetric() {
        let cache = ObjectCache::new();
        let main = CacheKey::drawing("42");
        let a = CacheKey::drawing_object("42", "1");
        let b = CacheKey::assembly_object("42", "7", true);
        cache.add_main_key(&main);
        cache.add_entry(&main, a.clone(), mark("1", "A")).unwrap();
        cache.add_entry(&main, b.clone(), mark("7", "B")).unwrap();
        cache.add_relationship(&main, a.clone(), b.clone()).unwrap();

        assert_eq!(ids(&cache.related_to(&main, &a)), HashSet::from(["7".to_string()]));
        assert_eq!(ids(&cache.related_to(&main, &b)), HashSet::from(["1".to_string()]));
        assert_eq!(ids(&cache.related_to_any(&a)), HashSet::from(["7".to_string()]));
    }

    #[test]
    fn writes_to_unknown_bucket_fail() {
        let cache = ObjectCache::new();
        let main = CacheKey::drawing("1");
        let entry = CacheKey::drawing_object("1", "1");
        assert!(matches!(
            cache.add_entry(&main, entry.clone(), mark("1", "A")),
            Err(DrawingSearchError::UnknownMainKey(_))
        ));
        assert!(cache.add_relationship(&main, entry.clone(), entry).is_err());
        assert!(cache.get(&main, &CacheKey::drawing_object("1", "1")).is_none());
    }

    #[test]
    fn add_main_key_is_idempotent() {
        let cache = ObjectCache::new();
        let main = CacheKey::drawing("42");
        cache.add_main_key(&main);
        cache
            .add_entry(&main, CacheKey::drawing_object("42", "1"), mark("1", "A"))
            .unwrap();
        cache.add_main_key(&main);
        assert_eq!(cache.dump_keys(Some(&main)), vec!["drawing_object_1_drawing_42"]);
        assert_eq!(cache.dump_keys(None), vec!["drawing_42"]);
    }

    #[test]
    fn removing_main_key_drops_everything_it_owned() {
        let cache = ObjectCache::new();
        let host = SnapshotHost::with_drawing(assembly_drawing());
        cache.bulk_ingest(&host, "42", false).unwrap();
        let main = CacheKey::drawing("42");
        assert!(!cache.dump_relationships(Some(&main)).is_empty());

        assert!(cache.remove_main_key(&main));
        assert!(cache.dump_keys(Some(&main)).is_empty());
        assert!(cache.dump_relationships(Some(&main)).is_empty());
        assert!(cache.dump_positions().is_empty());
        assert!(!cache.remove_main_key(&main));
    }

    #[test]
    fn removing_entry_prunes_its_relationships_and_positions() {
        let cache = ObjectCache::new();
        let main = CacheKey::drawing("42");
        let part_key = CacheKey::drawing_object("42", "10");
        let assembly_key = CacheKey::assembly_object("42", "a1", true);
        cache.add_main_key(&main);
        cache.add_entry(&main, part_key.clone(), mark("10", "P")).unwrap();
        cache.add_entry(&main, assembly_key.clone(), mark("a1", "A")).unwrap();
        cache
            .add_relationship(&main, part_key.clone(), assembly_key.clone())
            .unwrap();
        cache.cache_assembly_position(assembly_key.clone(), "B1");

        assert!(cache.remove_entry(&main, &assembly_key).is_some());
        assert!(cache.related_to(&main, &part_key).is_empty());
        assert!(cache.fetch_by_position("B1").is_empty());
        assert!(cache.dump_positions().is_empty());
    }

    #[test]
    fn positions_are_case_insensitive_and_never_blank() {
        let cache = ObjectCache::new();
        let key = CacheKey::assembly_object("42", "a1", false);
        cache.cache_assembly_position(key.clone(), "B1");
        cache.cache_assembly_position(CacheKey::assembly_object("42", "a2", false), "  ");

        assert_eq!(cache.fetch_by_position("b1"), HashSet::from([key]));
        assert_eq!(cache.dump_positions(), vec!["B1"]);
        assert!(cache.fetch_by_position("").is_empty());
    }

    #[test]
    fn ingest_links_parts_to_assemblies() {
        let cache = ObjectCache::new();
        let host = SnapshotHost::with_drawing(assembly_drawing());
        let report = cache.bulk_ingest(&host, "42", false).unwrap();

        assert_eq!(
            report,
            IngestReport {
                objects: 4,
                assemblies_linked: 3,
                links_skipped: 0
            }
        );
        assert_eq!(cache.cache_state(), CacheState::Ready);

        let keys = cache.fetch_by_position("B1");
        assert_eq!(keys.len(), 2);
        assert!(keys.contains(&CacheKey::assembly_object("42", "a1", true)));
        assert!(keys.contains(&CacheKey::assembly_object("42", "a1", false)));

        let main = CacheKey::drawing("42");
        let main_assembly = CacheKey::assembly_object("42", "a1", true);
        assert_eq!(
            ids(&cache.related_to(&main, &main_assembly)),
            HashSet::from(["10".to_string()])
        );
        assert_eq!(cache.dump_positions_for(&main), vec!["B1"]);
        assert!(cache.dump_positions_for(&CacheKey::drawing("7")).is_empty());
    }

    #[test]
    fn refresh_twice_changes_nothing_more() {
        let cache = ObjectCache::new();
        let host = SnapshotHost::with_drawing(assembly_drawing());
        cache.bulk_ingest(&host, "42", false).unwrap();

        cache.refresh();
        let main = CacheKey::drawing("42");
        let keys = cache.dump_keys(Some(&main));
        let stats = cache.stats();

        assert_eq!(cache.refresh(), 0);
        assert_eq!(cache.dump_keys(Some(&main)), keys);
        assert_eq!(cache.stats(), stats);
        // Unlinked mark was pruned, linked parts survive.
        assert!(!keys.contains(&"drawing_object_1_drawing_42".to_string()));
        assert!(keys.contains(&"drawing_object_10_drawing_42".to_string()));
    }

    #[test]
    fn refresh_before_first_ingest_clears() {
        let cache = ObjectCache::new();
        let main = CacheKey::drawing("42");
        cache.add_main_key(&main);
        cache
            .add_entry(&main, CacheKey::drawing_object("42", "1"), mark("1", "A"))
            .unwrap();
        assert_eq!(cache.refresh(), 1);
        assert!(!cache.contains_main_key(&main));
    }

    #[test]
    fn refresh_and_ingest_restores_unlinked_objects() {
        let cache = ObjectCache::new();
        let host = SnapshotHost::with_drawing(assembly_drawing());
        cache.bulk_ingest(&host, "42", false).unwrap();
        let before = cache.stats();

        let report = cache.refresh_and_ingest(&host, "42", false, None).unwrap();
        assert_eq!(report.objects, 4);
        // Parts were already linked.
        assert_eq!(report.assemblies_linked, 0);
        assert_eq!(cache.stats(), before);

        let relinked = cache.refresh_and_ingest(&host, "42", true, None).unwrap();
        assert_eq!(relinked.assemblies_linked, 3);
        assert_eq!(cache.stats(), before);
    }

    #[test]
    fn refresh_and_ingest_prunes_only_its_own_drawing() {
        let cache = ObjectCache::new();
        let host = SnapshotHost::with_drawing(assembly_drawing());
        host.replace_drawing(
            SnapshotDrawing::new("7")
                .with_object(DrawingObject::Mark(Mark::with_text("70", "OTHER"))),
        );
        cache.bulk_ingest(&host, "42", false).unwrap();
        cache.bulk_ingest(&host, "7", false).unwrap();

        cache.refresh_and_ingest(&host, "42", false, None).unwrap();

        let other = CacheKey::drawing("7");
        assert_eq!(
            cache.dump_keys(Some(&other)),
            vec!["drawing_object_70_drawing_7".to_string()]
        );
        assert!(cache
            .get(&other, &CacheKey::drawing_object("7", "70"))
            .is_some());
        assert!(cache
            .get(&CacheKey::drawing("42"), &CacheKey::drawing_object("42", "1"))
            .is_some());
    }

    #[test]
    fn relinking_a_moved_part_drops_its_old_assembly() {
        let cache = ObjectCache::new();
        let host = SnapshotHost::with_drawing(assembly_drawing());
        cache.bulk_ingest(&host, "42", false).unwrap();
        let main = CacheKey::drawing("42");
        assert_eq!(cache.dump_positions_for(&main), vec!["B1"]);

        host.replace_drawing(
            SnapshotDrawing::new("42")
                .with_object(part("10", "m10"))
                .with_object(part("11", "m11"))
                .with_object(part("12", "m12"))
                .with_assembly(SnapshotAssembly {
                    model: ModelObject::new("a2").with_property(ASSEMBLY_POS_PROPERTY, "B2"),
                    main_part: ObjectId::new("m10"),
                    parts: vec!["m10".into(), "m11".into(), "m12".into()],
                }),
        );
        let report = cache.refresh_and_ingest(&host, "42", true, None).unwrap();
        assert_eq!(report.assemblies_linked, 3);

        assert_eq!(cache.dump_positions_for(&main), vec!["B2"]);
        assert!(cache.fetch_by_position("B1").is_empty());
        assert!(cache
            .get(&main, &CacheKey::assembly_object("42", "a1", true))
            .is_none());
        assert!(cache
            .get(&main, &CacheKey::assembly_object("42", "a1", false))
            .is_none());
        let related = cache.related_to(&main, &CacheKey::drawing_object("42", "11"));
        assert_eq!(ids(&related), HashSet::from(["a2".to_string()]));
    }

    #[test]
    fn relinking_keeps_assemblies_still_shared_by_other_parts() {
        let cache = ObjectCache::new();
        let host = SnapshotHost::with_drawing(assembly_drawing());
        cache.bulk_ingest(&host, "42", false).unwrap();
        let main = CacheKey::drawing("42");
        let shared = CacheKey::assembly_object("42", "a1", false);

        let mut inner = cache.inner.write();
        let orphans = inner
            .bucket_mut(&main)
            .unwrap()
            .unlink_and_drop_orphans(&CacheKey::drawing_object("42", "11"));
        assert!(orphans.is_empty());
        let orphans = inner
            .bucket_mut(&main)
            .unwrap()
            .unlink_and_drop_orphans(&CacheKey::drawing_object("42", "12"));
        assert_eq!(orphans, HashSet::from([shared]));
    }

    #[test]
    fn cancelled_refresh_leaves_cache_untouched() {
        let cache = ObjectCache::new();
        let host = SnapshotHost::with_drawing(assembly_drawing());
        cache.bulk_ingest(&host, "42", false).unwrap();
        let before = cache.stats();

        let token = CancellationToken::new();
        token.cancel();
        let result = cache.refresh_and_ingest(&host, "42", false, Some(&token));
        assert!(matches!(result, Err(DrawingSearchError::CancelledRefresh(_))));
        assert_eq!(cache.stats(), before);
        assert_eq!(cache.cache_state(), CacheState::Ready);
    }

    #[test]
    fn resolution_failures_are_skipped_and_logged() {
        testing_logger::setup();
        let mut host = MockCadHost::new();
        host.expect_enumerate_objects().returning(|_| {
            Ok(vec![
                DrawingObject::Mark(Mark::with_text("1", "ABC123")),
                DrawingObject::Part(DrawingPart {
                    id: "10".into(),
                    model_id: "m10".into(),
                }),
            ])
        });
        host.expect_resolve_owning_assembly().returning(|_, part| {
            Err(DrawingSearchError::ResolutionFailure {
                object_id: part.id.to_string(),
                reason: "no assembly".to_string(),
            })
        });
        host.expect_report_property().never();

        let cache = ObjectCache::new();
        let report = cache.bulk_ingest(&host, "42", false).unwrap();
        assert_eq!(report.objects, 2);
        assert_eq!(report.links_skipped, 1);
        assert_eq!(cache.stats().relationships, 0);

        testing_logger::validate(|logs| {
            assert!(logs
                .iter()
                .any(|log| log.level == log::Level::Warn && log.body.contains("Skipping")));
        });
    }

    #[test]
    fn failed_enumeration_leaves_state_untouched() {
        let mut host = MockCadHost::new();
        host.expect_enumerate_objects()
            .returning(|id| Err(DrawingSearchError::HostUnavailable(id.to_string())));

        let cache = ObjectCache::new();
        assert!(cache.bulk_ingest(&host, "42", false).is_err());
        assert_eq!(cache.cache_state(), CacheState::Uninitialized);
        assert!(!cache.is_caching());
    }
}
