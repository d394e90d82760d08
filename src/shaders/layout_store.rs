use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use ash::vk;
use log::*;
use parking_lot::Mutex;

use super::layout_assembler::LayoutGroup;

/// descriptor set layouts shared between shaders, keyed by content hash
///
/// owned by the session that creates it, and safe to intern into from any thread
#[derive(Debug, Default)]
pub struct LayoutStore {
    entries: Mutex<HashMap<u64, Arc<LayoutGroup>>>,
}

impl LayoutStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// returns the canonical layout for this group's content,
    /// registering it if nothing with the same hash exists yet
    pub fn intern(&self, group: LayoutGroup) -> Arc<LayoutGroup> {
        let mut entries = self.entries.lock();

        if let Some(existing) = entries.get(&group.hash) {
            if existing.same_layout(&group) {
                trace!("reusing layout {:016x} for set {}", group.hash, group.set);
                return Arc::clone(existing);
            }

            error!(
                "layout hash collision on {:016x} for set {}, layout will not be shared",
                group.hash, group.set
            );
            return Arc::new(group);
        }

        debug!("registering layout {:016x} for set {}", group.hash, group.set);
        let group = Arc::new(group);
        entries.insert(group.hash, Arc::clone(&group));

        group
    }

    pub fn get(&self, hash: u64) -> Option<Arc<LayoutGroup>> {
        self.entries.lock().get(&hash).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// descriptor counts per type over every registered layout,
    /// for sizing a descriptor pool that can allocate one set of each
    ///
    /// layouts a rebuilt shader no longer uses are still counted until
    /// [`LayoutStore::prune`] or [`LayoutStore::clear`] drops them
    pub fn descriptor_pool_sizes(&self) -> Vec<vk::DescriptorPoolSize> {
        let entries = self.entries.lock();

        let mut totals: BTreeMap<i32, u32> = BTreeMap::new();
        for binding in entries.values().flat_map(|group| &group.bindings) {
            *totals
                .entry(binding.descriptor_kind.to_vk().as_raw())
                .or_default() += binding.descriptor_count;
        }

        totals
            .into_iter()
            .map(|(ty, descriptor_count)| {
                vk::DescriptorPoolSize::default()
                    .ty(vk::DescriptorType::from_raw(ty))
                    .descriptor_count(descriptor_count)
            })
            .collect()
    }

    /// forgets layouts nothing outside the store holds anymore,
    /// returns how many were dropped
    pub fn prune(&self) -> usize {
        let mut entries = self.entries.lock();

        let before = entries.len();
        entries.retain(|_, group| Arc::strong_count(group) > 1);
        let pruned = before - entries.len();

        if pruned > 0 {
            debug!("pruned {pruned} unused layout(s)");
        }

        pruned
    }

    /// drops the store's handles, layouts still held by shaders stay alive
    pub fn clear(&self) {
        let mut entries = self.entries.lock();
        info!("clearing {} shared layout(s)", entries.len());
        entries.clear();
    }
}
