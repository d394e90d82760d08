use ash::vk;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum VertexFormat {
    Vec3F32,
    Vec4F32,
}

impl VertexFormat {
    /// mapped by component count only, every vertex attribute is 32-bit float
    pub fn from_vector_size(vector_size: u32) -> Option<Self> {
        match vector_size {
            3 => Some(Self::Vec3F32),
            4 => Some(Self::Vec4F32),
            _ => None,
        }
    }

    pub fn to_vk(self) -> vk::Format {
        match self {
            Self::Vec3F32 => vk::Format::R32G32B32_SFLOAT,
            Self::Vec4F32 => vk::Format::R32G32B32A32_SFLOAT,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct VertexInputRecord {
    pub name: String,
    pub location: u32,
    /// the vertex buffer binding slot, one per attribute
    pub binding: u32,
    pub stride: u32,
    pub format: Option<VertexFormat>,
}

impl VertexInputRecord {
    pub fn binding_description(&self) -> vk::VertexInputBindingDescription {
        vk::VertexInputBindingDescription::default()
            .binding(self.binding)
            .stride(self.stride)
            .input_rate(vk::VertexInputRate::VERTEX)
    }

    pub fn attribute_description(&self) -> vk::VertexInputAttributeDescription {
        vk::VertexInputAttributeDescription::default()
            .location(self.location)
            .binding(self.binding)
            .format(self.format.map_or(vk::Format::UNDEFINED, VertexFormat::to_vk))
            .offset(0)
    }
}

/// vertex stage inputs in declaration order
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(transparent)]
pub struct VertexInputLayout {
    pub inputs: Vec<VertexInputRecord>,
}

impl VertexInputLayout {
    pub fn binding_descriptions(&self) -> Vec<vk::VertexInputBindingDescription> {
        self.inputs
            .iter()
            .map(VertexInputRecord::binding_description)
            .collect()
    }

    pub fn attribute_descriptions(&self) -> Vec<vk::VertexInputAttributeDescription> {
        self.inputs
            .iter()
            .map(VertexInputRecord::attribute_description)
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }
}
