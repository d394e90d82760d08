/// the resource categories a decoder can enumerate
///
/// samplers and storage buffers are reserved, nothing reflects them yet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    UniformBlock,
    StageInput,
    Sampler,
    StorageBuffer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecorationKind {
    DescriptorSet,
    Binding,
    Location,
}

/// a resource variable found in the bytecode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    /// id of the variable
    pub id: u32,
    /// id of the underlying type, with any pointer stripped
    pub base_type_id: u32,
    pub name: String,
}

/// byte range of one referenced member of a buffer block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferRange {
    pub member_index: u32,
    pub offset: u32,
    pub range: u32,
}

/// element width, vector size and column count of a stage input's type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeShape {
    pub width: u32,
    pub vector_size: u32,
    pub columns: u32,
}

impl TypeShape {
    /// bytes per vertex, None if it doesn't fit in 32 bits
    pub fn stride(&self) -> Option<u32> {
        (self.width / 8)
            .checked_mul(self.vector_size)?
            .checked_mul(self.columns)
    }
}

/// the bytecode-decoding capability reflection is written against
pub trait ShaderDecoder {
    type Error: std::error::Error;

    /// resources of one category, in declaration order
    fn resources(&self, kind: ResourceKind) -> Result<Vec<Resource>, Self::Error>;

    /// the literal of a decoration, or None if the resource isn't decorated with it
    fn decoration(&self, id: u32, decoration: DecorationKind) -> Option<u32>;

    fn declared_struct_size(&self, type_id: u32) -> Result<u32, Self::Error>;

    /// ranges of the block members the shader actually references
    fn active_buffer_ranges(&self, resource: &Resource) -> Result<Vec<BufferRange>, Self::Error>;

    fn member_name(&self, type_id: u32, index: u32) -> Option<String>;

    fn type_shape(&self, type_id: u32) -> Result<TypeShape, Self::Error>;
}
