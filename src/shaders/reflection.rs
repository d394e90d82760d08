use std::collections::BTreeMap;

use ash::vk;
use log::*;
use serde::{Deserialize, Serialize};

use super::diagnostics::{DiagnosticKind, Diagnostics};
use super::{ShaderStage, StageVisibility};

mod decoder;
pub use decoder::*;

mod spirv_decoder;
pub use spirv_decoder::*;

mod vertex_inputs;
pub use vertex_inputs::*;

#[cfg(test)]
pub(crate) mod test_spirv;

/// the descriptor type of a binding
///
/// only uniform blocks are reflected, the other kinds are reserved
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum DescriptorKind {
    UniformBufferDynamic,
    Sampler,
    StorageBuffer,
}

impl DescriptorKind {
    pub fn to_vk(self) -> vk::DescriptorType {
        match self {
            Self::UniformBufferDynamic => vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC,
            Self::Sampler => vk::DescriptorType::SAMPLER,
            Self::StorageBuffer => vk::DescriptorType::STORAGE_BUFFER,
        }
    }
}

/// byte offset and size of one member inside a uniform block
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct MemberRange {
    pub offset: u32,
    pub range: u32,
}

/// one reflected uniform block
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct BindingRecord {
    pub name: String,
    pub set: u32,
    pub binding: u32,
    pub descriptor_kind: DescriptorKind,
    /// arrays of uniform blocks are not allowed with dynamic uniform buffers
    pub descriptor_count: u32,
    pub byte_size: u32,
    pub stage_visibility: StageVisibility,
    pub member_ranges: BTreeMap<String, MemberRange>,
}

/// everything reflected from one stage's bytecode
#[derive(Debug, Clone)]
pub struct ReflectedStage {
    pub stage: ShaderStage,
    pub bindings: Vec<BindingRecord>,
    pub vertex_inputs: VertexInputLayout,
    pub diagnostics: Diagnostics,
}

pub fn reflect_spirv(stage: ShaderStage, spirv: &[u32]) -> Result<ReflectedStage, DecodeError> {
    let decoder = SpirvDecoder::from_words(spirv)?;
    reflect(stage, &decoder)
}

pub fn reflect<D: ShaderDecoder>(
    stage: ShaderStage,
    decoder: &D,
) -> Result<ReflectedStage, D::Error> {
    info!("reflecting {stage} stage");

    let mut diagnostics = Diagnostics::new();

    let mut bindings = vec![];
    for block in decoder.resources(ResourceKind::UniformBlock)? {
        let binding = reflect_uniform_block(stage, decoder, &block, &mut diagnostics)?;
        bindings.push(binding);
    }

    // only the vertex stage's inputs feed the pipeline's vertex input state
    let vertex_inputs = if stage == ShaderStage::Vertex {
        reflect_vertex_inputs(decoder, &mut diagnostics)?
    } else {
        VertexInputLayout::default()
    };

    Ok(ReflectedStage {
        stage,
        bindings,
        vertex_inputs,
        diagnostics,
    })
}

fn reflect_uniform_block<D: ShaderDecoder>(
    stage: ShaderStage,
    decoder: &D,
    block: &Resource,
    diagnostics: &mut Diagnostics,
) -> Result<BindingRecord, D::Error> {
    // https://www.khronos.org/registry/vulkan/specs/misc/GL_KHR_vulkan_glsl.txt
    // an undecorated set defaults to 0
    let set = match decoder.decoration(block.id, DecorationKind::DescriptorSet) {
        Some(set) => set,
        None => {
            diagnostics.report(DiagnosticKind::MissingSet {
                resource: block.name.clone(),
            });
            0
        }
    };

    let binding = match decoder.decoration(block.id, DecorationKind::Binding) {
        Some(binding) => binding,
        None => {
            let assigned = 0;
            diagnostics.report(DiagnosticKind::MissingBinding {
                resource: block.name.clone(),
                assigned,
            });
            assigned
        }
    };

    let byte_size = decoder.declared_struct_size(block.base_type_id)?;

    debug!(
        "uniform block '{}', set = {set}, binding = {binding}, size = {byte_size}",
        block.name
    );

    let mut member_ranges = BTreeMap::new();
    for range in decoder.active_buffer_ranges(block)? {
        let member_name = decoder
            .member_name(block.base_type_id, range.member_index)
            .unwrap_or_else(|| format!("_m{}", range.member_index));

        debug!(
            "\\-[{}] : {member_name} (offset = {}, range = {})",
            range.member_index, range.offset, range.range
        );

        member_ranges.insert(
            member_name,
            MemberRange {
                offset: range.offset,
                range: range.range,
            },
        );
    }

    Ok(BindingRecord {
        name: block.name.clone(),
        set,
        binding,
        descriptor_kind: DescriptorKind::UniformBufferDynamic,
        descriptor_count: 1,
        byte_size,
        stage_visibility: StageVisibility::only(stage),
        member_ranges,
    })
}

fn reflect_vertex_inputs<D: ShaderDecoder>(
    decoder: &D,
    diagnostics: &mut Diagnostics,
) -> Result<VertexInputLayout, D::Error> {
    let mut inputs = vec![];

    for (index, input) in decoder
        .resources(ResourceKind::StageInput)?
        .into_iter()
        .enumerate()
    {
        let location = decoder
            .decoration(input.id, DecorationKind::Location)
            .unwrap_or(index as u32);

        let shape = decoder.type_shape(input.base_type_id)?;
        let Some(stride) = shape.stride() else {
            diagnostics.report(DiagnosticKind::OversizedVertexInput { input: input.name });
            continue;
        };

        let format = VertexFormat::from_vector_size(shape.vector_size);
        if format.is_none() {
            diagnostics.report(DiagnosticKind::UnhandledVertexFormat {
                input: input.name.clone(),
                components: shape.vector_size,
            });
        }

        debug!("vertex attribute loc=[{location}] : {}", input.name);

        inputs.push(VertexInputRecord {
            name: input.name,
            location,
            binding: location,
            stride,
            format,
        });
    }

    Ok(VertexInputLayout { inputs })
}
