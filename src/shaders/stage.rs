use ash::vk;
use serde::{Deserialize, Serialize};

/// one programmable pipeline stage
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "camelCase")]
pub enum ShaderStage {
    Vertex,
    TessellationControl,
    TessellationEvaluation,
    Geometry,
    Fragment,
    Compute,
}

impl ShaderStage {
    pub const ALL: [ShaderStage; 6] = [
        Self::Vertex,
        Self::TessellationControl,
        Self::TessellationEvaluation,
        Self::Geometry,
        Self::Fragment,
        Self::Compute,
    ];

    pub fn to_vk(self) -> vk::ShaderStageFlags {
        match self {
            Self::Vertex => vk::ShaderStageFlags::VERTEX,
            Self::TessellationControl => vk::ShaderStageFlags::TESSELLATION_CONTROL,
            Self::TessellationEvaluation => vk::ShaderStageFlags::TESSELLATION_EVALUATION,
            Self::Geometry => vk::ShaderStageFlags::GEOMETRY,
            Self::Fragment => vk::ShaderStageFlags::FRAGMENT,
            Self::Compute => vk::ShaderStageFlags::COMPUTE,
        }
    }

    /// guesses the stage from a file name like `default.vert.spv`
    pub fn from_file_name(file_name: &str) -> Option<Self> {
        if file_name.contains(".vert") {
            Some(Self::Vertex)
        } else if file_name.contains(".tesc") {
            Some(Self::TessellationControl)
        } else if file_name.contains(".tese") {
            Some(Self::TessellationEvaluation)
        } else if file_name.contains(".geom") {
            Some(Self::Geometry)
        } else if file_name.contains(".frag") {
            Some(Self::Fragment)
        } else if file_name.contains(".comp") {
            Some(Self::Compute)
        } else {
            None
        }
    }
}

impl std::fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Vertex => "vertex",
            Self::TessellationControl => "tessellation control",
            Self::TessellationEvaluation => "tessellation evaluation",
            Self::Geometry => "geometry",
            Self::Fragment => "fragment",
            Self::Compute => "compute",
        };

        f.write_str(name)
    }
}

/// the set of stages a binding is accessible from,
/// stored as raw vulkan stage flag bits
#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct StageVisibility(u32);

impl StageVisibility {
    pub fn empty() -> Self {
        Self(0)
    }

    pub fn only(stage: ShaderStage) -> Self {
        Self(stage.to_vk().as_raw())
    }

    pub fn with(self, stage: ShaderStage) -> Self {
        Self(self.0 | stage.to_vk().as_raw())
    }

    pub fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub fn contains(self, stage: ShaderStage) -> bool {
        let bits = stage.to_vk().as_raw();
        self.0 & bits == bits
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn stages(self) -> impl Iterator<Item = ShaderStage> {
        ShaderStage::ALL
            .into_iter()
            .filter(move |stage| self.contains(*stage))
    }

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn to_vk(self) -> vk::ShaderStageFlags {
        vk::ShaderStageFlags::from_raw(self.0)
    }
}

impl FromIterator<ShaderStage> for StageVisibility {
    fn from_iter<I: IntoIterator<Item = ShaderStage>>(iter: I) -> Self {
        iter.into_iter().fold(Self::empty(), Self::with)
    }
}
