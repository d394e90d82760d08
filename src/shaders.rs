use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::*;
use serde::Serialize;

pub mod binding_unifier;
pub mod change_detector;
pub mod diagnostics;
pub mod layout_assembler;
pub mod layout_store;
pub mod manifest;
pub mod reflection;
pub mod source;
mod stage;

pub use binding_unifier::{UnifiedBindings, unify};
pub use change_detector::ChangeDetector;
pub use diagnostics::*;
pub use layout_assembler::{AssembledLayouts, LayoutGroup, assemble};
pub use layout_store::LayoutStore;
pub use manifest::{ManifestError, ShaderManifest};
pub use reflection::{
    BindingRecord, MemberRange, ReflectedStage, VertexInputLayout, reflect, reflect_spirv,
};
pub use source::{SourceError, StageSource};
pub use stage::*;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageSettings {
    pub stage: ShaderStage,
    pub source: StageSource,
}

/// a shader's stages, in the order they're unified
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderSettings {
    pub name: String,
    pub stages: Vec<StageSettings>,
}

/// one shader's reflected resources, rebuilt whenever its spirv changes
#[derive(Debug)]
pub struct Shader {
    settings: ShaderSettings,
    change_detector: ChangeDetector,
    built: bool,

    bindings: UnifiedBindings,
    layouts: Vec<Arc<LayoutGroup>>,
    vertex_inputs: VertexInputLayout,
    diagnostics: Diagnostics,
}

/// the reflection json written next to the manifest
#[derive(Debug, Serialize)]
pub struct ShaderReflectionJson<'a> {
    pub name: &'a str,
    pub layouts: Vec<LayoutJson<'a>>,
    pub vertex_inputs: &'a VertexInputLayout,
    pub diagnostics: &'a Diagnostics,
}

/// one shared set layout, listed with this shader's own binding records
///
/// a shared layout is keyed by structure only, so its records may
/// carry block names and member ranges from whichever shader registered it
#[derive(Debug, Serialize)]
pub struct LayoutJson<'a> {
    pub set: u32,
    pub hash: u64,
    pub bindings: Vec<&'a BindingRecord>,
}

impl Shader {
    pub fn new(settings: ShaderSettings) -> Self {
        Self {
            settings,
            change_detector: ChangeDetector::new(),
            built: false,
            bindings: UnifiedBindings::new(),
            layouts: vec![],
            vertex_inputs: VertexInputLayout::default(),
            diagnostics: Diagnostics::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.settings.name
    }

    pub fn settings(&self) -> &ShaderSettings {
        &self.settings
    }

    /// loads every stage and, if any of them changed, rebuilds the shader's
    /// bindings, layouts and vertex inputs, interning the layouts into the store
    ///
    /// returns whether anything was rebuilt
    pub fn setup(&mut self, store: &LayoutStore) -> bool {
        let name = &self.settings.name;
        let mut diagnostics = Diagnostics::new();
        let mut dirty = !self.built;

        let mut loaded = vec![];
        for StageSettings { stage, source } in &self.settings.stages {
            let stage = *stage;

            match source.load() {
                Ok(spirv) => {
                    dirty |= self.change_detector.is_dirty(stage, &spirv);
                    loaded.push((stage, spirv));
                }

                Err(SourceError::NotFound(path)) => {
                    dirty |= self.change_detector.forget(stage);
                    diagnostics.report(DiagnosticKind::MissingSource { stage, path });
                }

                Err(error) => {
                    dirty |= self.change_detector.forget(stage);
                    diagnostics.report(DiagnosticKind::Decode {
                        stage,
                        reason: error.to_string(),
                    });
                }
            }
        }

        if !dirty {
            trace!("'{name}' is unchanged");
            return false;
        }

        info!("setting up shader '{name}'");

        let mut bindings = UnifiedBindings::new();
        let mut vertex_inputs = VertexInputLayout::default();
        for (stage, spirv) in loaded {
            info!("reflecting the {stage} stage of '{name}'");

            let reflected = match reflect_spirv(stage, &spirv) {
                Ok(reflected) => reflected,
                Err(error) => {
                    diagnostics.report(DiagnosticKind::Decode {
                        stage,
                        reason: error.to_string(),
                    });
                    continue;
                }
            };

            diagnostics.extend(reflected.diagnostics);
            if stage == ShaderStage::Vertex {
                vertex_inputs = reflected.vertex_inputs;
            }

            bindings = unify(bindings, reflected.bindings, stage, &mut diagnostics);
        }

        let assembled = assemble(&bindings);
        diagnostics.extend(assembled.diagnostics);

        self.layouts = assembled
            .groups
            .into_iter()
            .map(|group| store.intern(group))
            .collect();
        self.bindings = bindings;
        self.vertex_inputs = vertex_inputs;
        self.diagnostics = diagnostics;
        self.built = true;

        true
    }

    /// the shader's descriptor set layouts, ascending by set
    pub fn layouts(&self) -> &[Arc<LayoutGroup>] {
        &self.layouts
    }

    pub fn vertex_inputs(&self) -> &VertexInputLayout {
        &self.vertex_inputs
    }

    pub fn bindings(&self) -> &UnifiedBindings {
        &self.bindings
    }

    /// diagnostics from the most recent rebuild
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// where to write a uniform block member, if any stage reads it
    pub fn uniform_member_range(&self, block: &str, member: &str) -> Option<MemberRange> {
        self.bindings
            .get(block)?
            .member_ranges
            .get(member)
            .copied()
    }

    /// the record assembly kept for a slot, the first by name
    fn own_binding(&self, set: u32, binding: u32) -> Option<&BindingRecord> {
        self.bindings
            .records()
            .find(|record| record.set == set && record.binding == binding)
    }

    /// writes `<name>.reflection.json` into `shaders_dir`, returning its path
    pub fn write_reflection_json(&self, shaders_dir: &Path) -> anyhow::Result<PathBuf> {
        let json = serde_json::to_string_pretty(&self.reflection_json())?;
        let json_path = crate::util::reflection_json_path(shaders_dir, self.name());
        std::fs::write(&json_path, json)?;

        Ok(json_path)
    }

    pub fn reflection_json(&self) -> ShaderReflectionJson<'_> {
        ShaderReflectionJson {
            name: &self.settings.name,
            layouts: self
                .layouts
                .iter()
                .map(|layout| LayoutJson {
                    set: layout.set,
                    hash: layout.hash,
                    bindings: layout
                        .bindings
                        .iter()
                        .filter_map(|shared| self.own_binding(shared.set, shared.binding))
                        .collect(),
                })
                .collect(),
            vertex_inputs: &self.vertex_inputs,
            diagnostics: &self.diagnostics,
        }
    }
}
