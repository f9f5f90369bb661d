// 🗂️ Member Store - In-memory entity set for one pipeline run
//
// Primary list in insertion order + derived indexes:
// - normalized name → first member registered under that key
// - constituency    → first member registered under that sub-region
// - county          → every member in that administrative region
//
// Indexes are owned here. Mutations go through `update`, which moves only
// the keys that changed. A key already owned keeps its owner.

use crate::entities::Member;
use crate::normalize::{normalize_region, NameNormalizer};
use log::debug;
use std::collections::HashMap;

/// Position of a member in the store (stable for the store's lifetime)
pub type MemberIndex = usize;

pub struct MemberStore {
    normalizer: NameNormalizer,
    members: Vec<Member>,
    by_name: HashMap<String, MemberIndex>,
    by_region: HashMap<String, MemberIndex>,
    region_counts: HashMap<String, usize>,
    by_county: HashMap<String, Vec<MemberIndex>>,
}

impl MemberStore {
    /// Create new empty store keyed with `normalizer`
    pub fn new(normalizer: NameNormalizer) -> Self {
        MemberStore {
            normalizer,
            members: Vec::new(),
            by_name: HashMap::new(),
            by_region: HashMap::new(),
            region_counts: HashMap::new(),
            by_county: HashMap::new(),
        }
    }

    /// Rebuild a store from a snapshot, inserting in snapshot order
    pub fn from_members(normalizer: NameNormalizer, members: Vec<Member>) -> Self {
        let mut store = MemberStore::new(normalizer);
        for member in members {
            store.insert(member);
        }
        store
    }

    pub fn normalizer(&self) -> &NameNormalizer {
        &self.normalizer
    }

    /// Add a member; its key is recomputed with this store's normalizer
    pub fn insert(&mut self, mut member: Member) -> MemberIndex {
        member.rekey(&self.normalizer);
        let index = self.members.len();
        self.members.push(member);
        self.index_member(index);
        index
    }

    /// Mutate a member in place, keeping indexes consistent
    pub fn update<F, R>(&mut self, index: MemberIndex, update_fn: F) -> Option<R>
    where
        F: FnOnce(&mut Member) -> R,
    {
        let member = self.members.get_mut(index)?;
        let before = (
            member.name().to_string(),
            member.normalized_name().to_string(),
            member.constituency.clone(),
            member.county.clone(),
        );

        let result = update_fn(member);

        if member.name() != before.0 {
            member.rekey(&self.normalizer);
        }

        if member.normalized_name() != before.1 {
            debug!("Reindexing name of member {}", member.id);
            let key = member.normalized_name().to_string();
            self.unindex_name(index, &before.1);
            if !key.is_empty() {
                self.by_name.entry(key).or_insert(index);
            }
        }

        let old_region = before.2.as_deref().map(normalize_region).unwrap_or_default();
        let new_region = self.members[index]
            .constituency
            .as_deref()
            .map(normalize_region)
            .unwrap_or_default();
        if old_region != new_region {
            debug!("Reindexing region of member {}", self.members[index].id);
            self.unindex_region(index, &old_region);
            if !new_region.is_empty() {
                self.by_region.entry(new_region.clone()).or_insert(index);
                *self.region_counts.entry(new_region).or_insert(0) += 1;
            }
        }

        let old_county = before.3.as_deref().map(normalize_region).unwrap_or_default();
        let new_county = self.members[index]
            .county
            .as_deref()
            .map(normalize_region)
            .unwrap_or_default();
        if old_county != new_county {
            if let Some(indexes) = self.by_county.get_mut(&old_county) {
                indexes.retain(|i| *i != index);
                if indexes.is_empty() {
                    self.by_county.remove(&old_county);
                }
            }
            if !new_county.is_empty() {
                let indexes = self.by_county.entry(new_county).or_default();
                let position = indexes.partition_point(|i| *i < index);
                indexes.insert(position, index);
            }
        }

        Some(result)
    }

    pub fn get(&self, index: MemberIndex) -> Option<&Member> {
        self.members.get(index)
    }

    pub fn find_by_id(&self, id: &str) -> Option<&Member> {
        self.members.iter().find(|m| m.id == id)
    }

    /// Member registered under a normalized name key
    pub fn lookup_by_name(&self, normalized_key: &str) -> Option<&Member> {
        self.index_of_name(normalized_key).and_then(|i| self.get(i))
    }

    pub fn index_of_name(&self, normalized_key: &str) -> Option<MemberIndex> {
        if normalized_key.is_empty() {
            return None;
        }
        self.by_name.get(normalized_key).copied()
    }

    /// Member registered under a sub-region (constituency); first registered wins
    pub fn lookup_by_region(&self, region: &str) -> Option<&Member> {
        self.index_of_region(region).and_then(|i| self.get(i))
    }

    pub fn index_of_region(&self, region: &str) -> Option<MemberIndex> {
        let key = normalize_region(region);
        if key.is_empty() {
            return None;
        }
        self.by_region.get(&key).copied()
    }

    /// How many members share a sub-region (more than one = ambiguous)
    pub fn region_count(&self, region: &str) -> usize {
        self.region_counts
            .get(&normalize_region(region))
            .copied()
            .unwrap_or(0)
    }

    /// Sub-regions claimed by more than one member, sorted
    pub fn ambiguous_regions(&self) -> Vec<(String, usize)> {
        let mut regions: Vec<(String, usize)> = self
            .region_counts
            .iter()
            .filter(|(_, count)| **count > 1)
            .map(|(region, count)| (region.clone(), *count))
            .collect();
        regions.sort();
        regions
    }

    /// Members in an administrative region, insertion order
    pub fn by_county(&self, county: &str) -> Vec<&Member> {
        self.by_county
            .get(&normalize_region(county))
            .map(|indexes| indexes.iter().filter_map(|i| self.get(*i)).collect())
            .unwrap_or_default()
    }

    /// All members in insertion order. Each call starts from the beginning.
    pub fn all(&self) -> impl Iterator<Item = &Member> + '_ {
        self.members.iter()
    }

    pub fn members(&self) -> &[Member] {
        &self.members
    }

    pub fn into_members(self) -> Vec<Member> {
        self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    fn index_member(&mut self, index: MemberIndex) {
        let member = &self.members[index];

        let name_key = member.normalized_name().to_string();
        if !name_key.is_empty() {
            self.by_name.entry(name_key).or_insert(index);
        }

        if let Some(region) = member.constituency.as_deref() {
            let key = normalize_region(region);
            if !key.is_empty() {
                self.by_region.entry(key.clone()).or_insert(index);
                *self.region_counts.entry(key).or_insert(0) += 1;
            }
        }

        if let Some(county) = member.county.as_deref() {
            let key = normalize_region(county);
            if !key.is_empty() {
                self.by_county.entry(key).or_default().push(index);
            }
        }
    }

    /// Drop `index` as owner of a name key. Ownership passes to the earliest
    /// other member still carrying the key.
    fn unindex_name(&mut self, index: MemberIndex, key: &str) {
        if key.is_empty() || self.by_name.get(key) != Some(&index) {
            return;
        }
        let successor = self
            .members
            .iter()
            .enumerate()
            .find(|(i, m)| *i != index && m.normalized_name() == key)
            .map(|(i, _)| i);
        match successor {
            Some(i) => {
                self.by_name.insert(key.to_string(), i);
            }
            None => {
                self.by_name.remove(key);
            }
        }
    }

    /// Same as `unindex_name` for a sub-region, keeping the count in step
    fn unindex_region(&mut self, index: MemberIndex, key: &str) {
        if key.is_empty() {
            return;
        }
        if let Some(count) = self.region_counts.get_mut(key) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                self.region_counts.remove(key);
            }
        }
        if self.by_region.get(key) != Some(&index) {
            return;
        }
        let successor = self
            .members
            .iter()
            .enumerate()
            .find(|(i, m)| {
                *i != index && m.constituency.as_deref().map(normalize_region).as_deref() == Some(key)
            })
            .map(|(i, _)| i);
        match successor {
            Some(i) => {
                self.by_region.insert(key.to_string(), i);
            }
            None => {
                self.by_region.remove(key);
            }
        }
    }
}

impl Default for MemberStore {
    fn default() -> Self {
        Self::new(NameNormalizer::new())
    }
}

// ============================================================================
// TESTS
// ============================================================================
