use std::collections::BTreeMap;

use ash::vk;
use bytemuck::{Pod, Zeroable};
use log::*;
use serde::Serialize;
use xxhash_rust::xxh3::xxh3_64;

use super::binding_unifier::UnifiedBindings;
use super::diagnostics::{BindingLocation, DiagnosticKind, Diagnostics};
use super::reflection::BindingRecord;

/// the bindings of one descriptor set, ordered by binding number
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct LayoutGroup {
    pub set: u32,
    pub bindings: Vec<BindingRecord>,
    /// content hash, the structural identity used by the layout store
    pub hash: u64,
}

impl LayoutGroup {
    pub fn new(set: u32, mut bindings: Vec<BindingRecord>) -> Self {
        bindings.sort_by_key(|b| b.binding);
        let hash = layout_hash(set, &bindings);

        Self {
            set,
            bindings,
            hash,
        }
    }

    pub fn vk_bindings(&self) -> Vec<vk::DescriptorSetLayoutBinding<'static>> {
        self.bindings
            .iter()
            .map(|b| {
                vk::DescriptorSetLayoutBinding::default()
                    .binding(b.binding)
                    .descriptor_type(b.descriptor_kind.to_vk())
                    .descriptor_count(b.descriptor_count)
                    .stage_flags(b.stage_visibility.to_vk())
            })
            .collect()
    }

    /// equal content, ignoring member ranges which don't affect the layout
    pub fn same_layout(&self, other: &LayoutGroup) -> bool {
        self.set == other.set
            && self.bindings.len() == other.bindings.len()
            && self
                .bindings
                .iter()
                .zip(&other.bindings)
                .all(|(a, b)| HashRecord::new(self.set, a) == HashRecord::new(other.set, b))
    }
}

// NOTE no implicit padding allowed, every field is hashed as raw bytes
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
struct HashRecord {
    set: u32,
    binding: u32,
    descriptor_type: i32,
    descriptor_count: u32,
    stage_flags: u32,
    byte_size: u32,
}

impl HashRecord {
    fn new(set: u32, binding: &BindingRecord) -> Self {
        Self {
            set,
            binding: binding.binding,
            descriptor_type: binding.descriptor_kind.to_vk().as_raw(),
            descriptor_count: binding.descriptor_count,
            stage_flags: binding.stage_visibility.bits(),
            byte_size: binding.byte_size,
        }
    }
}

/// bindings must already be sorted by binding number
pub fn layout_hash(set: u32, bindings: &[BindingRecord]) -> u64 {
    let records: Vec<HashRecord> = bindings.iter().map(|b| HashRecord::new(set, b)).collect();
    xxh3_64(bytemuck::cast_slice(&records))
}

#[derive(Debug, Clone, Default)]
pub struct AssembledLayouts {
    /// one group per set present, ascending by set
    pub groups: Vec<LayoutGroup>,
    pub diagnostics: Diagnostics,
}

pub fn assemble(unified: &UnifiedBindings) -> AssembledLayouts {
    let mut diagnostics = Diagnostics::new();

    // records come out ordered by name, so the first claim on a slot is the first by name
    let mut sets: BTreeMap<u32, BTreeMap<u32, BindingRecord>> = BTreeMap::new();
    for record in unified.records() {
        let slots = sets.entry(record.set).or_default();

        if let Some(kept) = slots.get(&record.binding) {
            diagnostics.report(DiagnosticKind::DuplicateBinding {
                location: BindingLocation {
                    set: record.set,
                    binding: record.binding,
                },
                kept: kept.name.clone(),
                dropped: record.name.clone(),
            });
            continue;
        }

        slots.insert(record.binding, record.clone());
    }

    if let Some(&max_set) = sets.keys().next_back() {
        for missing_set in (0..max_set).filter(|set| !sets.contains_key(set)) {
            diagnostics.report(DiagnosticKind::SparseSet { missing_set });
        }
    }

    let groups: Vec<LayoutGroup> = sets
        .into_iter()
        .map(|(set, slots)| LayoutGroup::new(set, slots.into_values().collect()))
        .collect();

    for group in &groups {
        debug!(
            "set {} has {} binding(s), hash {:016x}",
            group.set,
            group.bindings.len(),
            group.hash
        );
    }

    AssembledLayouts {
        groups,
        diagnostics,
    }
}
