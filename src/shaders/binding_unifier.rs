use std::collections::{BTreeMap, BTreeSet};

use log::*;
use serde::Serialize;

use super::ShaderStage;
use super::diagnostics::{BindingLocation, DiagnosticKind, Diagnostics};
use super::reflection::BindingRecord;

/// the bindings of all stages of one shader, keyed by resource name
#[derive(Debug, Serialize, Clone, Default, PartialEq, Eq)]
pub struct UnifiedBindings {
    pub bindings: BTreeMap<String, BindingRecord>,
    /// names dropped because stages disagreed on their location,
    /// kept so a later stage can't bring them back
    pub rejected: BTreeSet<String>,
}

impl UnifiedBindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&BindingRecord> {
        self.bindings.get(name)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn records(&self) -> impl Iterator<Item = &BindingRecord> {
        self.bindings.values()
    }
}

/// folds one stage's bindings into the bindings of the stages before it
///
/// must be applied in the shader's declared stage order
pub fn unify(
    mut unified: UnifiedBindings,
    incoming: Vec<BindingRecord>,
    stage: ShaderStage,
    diagnostics: &mut Diagnostics,
) -> UnifiedBindings {
    for mut binding in incoming {
        if unified.rejected.contains(&binding.name) {
            continue;
        }

        let Some(existing) = unified.bindings.get_mut(&binding.name) else {
            binding.stage_visibility = super::StageVisibility::only(stage);
            unified.bindings.insert(binding.name.clone(), binding);
            continue;
        };

        if existing.set != binding.set || existing.binding != binding.binding {
            diagnostics.report(DiagnosticKind::BindingConflict {
                resource: binding.name.clone(),
                first: BindingLocation {
                    set: existing.set,
                    binding: existing.binding,
                },
                second: BindingLocation {
                    set: binding.set,
                    binding: binding.binding,
                },
            });

            unified.bindings.remove(&binding.name);
            unified.rejected.insert(binding.name);
            continue;
        }

        debug!("'{}' is also accessed from the {stage} stage", binding.name);
        existing.stage_visibility = existing.stage_visibility.with(stage);

        // each stage only reports the members it reads
        existing.member_ranges.append(&mut binding.member_ranges);
        existing.byte_size = existing.byte_size.max(binding.byte_size);
    }

    unified
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::shaders::StageVisibility;
    use crate::shaders::reflection::{DescriptorKind, MemberRange};

    fn record(name: &str, set: u32, binding: u32, stage: ShaderStage) -> BindingRecord {
        BindingRecord {
            name: name.to_string(),
            set,
            binding,
            descriptor_kind: DescriptorKind::UniformBufferDynamic,
            descriptor_count: 1,
            byte_size: 64,
            stage_visibility: StageVisibility::only(stage),
            member_ranges: BTreeMap::new(),
        }
    }

    #[test]
    fn same_block_in_two_stages_merges_visibility() {
        let mut diagnostics = Diagnostics::new();

        let unified = unify(
            UnifiedBindings::new(),
            vec![record("Matrices", 0, 0, ShaderStage::Vertex)],
            ShaderStage::Vertex,
            &mut diagnostics,
        );
        let unified = unify(
            unified,
            vec![record("Matrices", 0, 0, ShaderStage::Fragment)],
            ShaderStage::Fragment,
            &mut diagnostics,
        );

        assert!(diagnostics.is_empty());
        assert_eq!(unified.len(), 1);

        let matrices = unified.get("Matrices").unwrap();
        assert!(matrices.stage_visibility.contains(ShaderStage::Vertex));
        assert!(matrices.stage_visibility.contains(ShaderStage::Fragment));
    }

    #[test]
    fn conflicting_set_is_reported_and_dropped() {
        let mut diagnostics = Diagnostics::new();

        let unified = unify(
            UnifiedBindings::new(),
            vec![
                record("Matrices", 0, 0, ShaderStage::Vertex),
                record("Lights", 0, 1, ShaderStage::Vertex),
            ],
            ShaderStage::Vertex,
            &mut diagnostics,
        );
        let unified = unify(
            unified,
            vec![record("Matrices", 1, 0, ShaderStage::Fragment)],
            ShaderStage::Fragment,
            &mut diagnostics,
        );

        let reported: Vec<_> = diagnostics.iter().map(|d| d.kind.clone()).collect();
        assert_eq!(
            reported,
            vec![DiagnosticKind::BindingConflict {
                resource: "Matrices".to_string(),
                first: BindingLocation { set: 0, binding: 0 },
                second: BindingLocation { set: 1, binding: 0 },
            }]
        );

        assert!(unified.get("Matrices").is_none());
        assert_eq!(unified.records().filter(|r| r.name == "Matrices").count(), 0);
        assert!(unified.get("Lights").is_some());
        assert!(unified.rejected.contains("Matrices"));
    }

    #[test]
    fn rejected_resource_stays_rejected() {
        let mut diagnostics = Diagnostics::new();

        let mut unified = UnifiedBindings::new();
        for (stage, set) in [
            (ShaderStage::Vertex, 0),
            (ShaderStage::Geometry, 1),
            (ShaderStage::Fragment, 0),
        ] {
            unified = unify(
                unified,
                vec![record("Matrices", set, 0, stage)],
                stage,
                &mut diagnostics,
            );
        }

        assert!(unified.is_empty());
        assert_eq!(diagnostics.len(), 1);
    }

    #[test]
    fn unifying_a_stage_twice_is_idempotent() {
        let mut diagnostics = Diagnostics::new();
        let vertex = vec![
            record("Matrices", 0, 0, ShaderStage::Vertex),
            record("Lights", 0, 1, ShaderStage::Vertex),
        ];

        let once = unify(
            UnifiedBindings::new(),
            vertex.clone(),
            ShaderStage::Vertex,
            &mut diagnostics,
        );
        let twice = unify(once.clone(), vertex, ShaderStage::Vertex, &mut diagnostics);

        assert_eq!(once, twice);
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn member_ranges_accumulate_across_stages() {
        let mut diagnostics = Diagnostics::new();

        let mut vertex = record("Matrices", 0, 0, ShaderStage::Vertex);
        vertex.member_ranges.insert(
            "model".to_string(),
            MemberRange {
                offset: 0,
                range: 64,
            },
        );
        let mut fragment = record("Matrices", 0, 0, ShaderStage::Fragment);
        fragment.member_ranges.insert(
            "tint".to_string(),
            MemberRange {
                offset: 128,
                range: 16,
            },
        );

        let unified = unify(
            UnifiedBindings::new(),
            vec![vertex],
            ShaderStage::Vertex,
            &mut diagnostics,
        );
        let unified = unify(
            unified,
            vec![fragment],
            ShaderStage::Fragment,
            &mut diagnostics,
        );

        let matrices = unified.get("Matrices").unwrap();
        assert_eq!(matrices.member_ranges.len(), 2);
        assert_eq!(matrices.member_ranges["tint"].offset, 128);
    }
}
