//! assembles small spirv modules for tests

use rspirv::binary::Assemble;
use rspirv::dr::{Builder, Operand};
use rspirv::spirv;

#[derive(Clone, Copy)]
pub enum MemberType {
    Mat4,
    Vec4,
    Float,
}

pub struct MemberSpec<'a> {
    pub name: &'a str,
    pub ty: MemberType,
    pub offset: u32,
}

/// how main reads a block
#[derive(Clone, Copy)]
pub enum Access<'a> {
    /// access chains with these constant member indices
    Members(&'a [u32]),
    /// one OpLoad of the whole block variable
    WholeBlock,
    /// an access chain indexed by a value loaded at runtime
    DynamicIndex,
}

/// member type lists must differ between blocks of one module,
/// since the builder may share identical struct types
pub struct BlockSpec<'a> {
    pub name: &'a str,
    /// OpName of the block variable, glslang names it after the instance
    pub instance: Option<&'a str>,
    pub set: Option<u32>,
    pub binding: Option<u32>,
    pub members: &'a [MemberSpec<'a>],
    pub access: Access<'a>,
}

pub struct InputSpec<'a> {
    pub name: &'a str,
    pub location: Option<u32>,
    pub components: u32,
}

pub const MATRICES_MEMBERS: &[MemberSpec<'static>] = &[
    MemberSpec {
        name: "model",
        ty: MemberType::Mat4,
        offset: 0,
    },
    MemberSpec {
        name: "view",
        ty: MemberType::Mat4,
        offset: 64,
    },
    MemberSpec {
        name: "tint",
        ty: MemberType::Vec4,
        offset: 128,
    },
];

pub const MATERIAL_MEMBERS: &[MemberSpec<'static>] = &[
    MemberSpec {
        name: "color",
        ty: MemberType::Vec4,
        offset: 0,
    },
    MemberSpec {
        name: "roughness",
        ty: MemberType::Float,
        offset: 16,
    },
];

pub fn matrices(set: Option<u32>, binding: Option<u32>) -> BlockSpec<'static> {
    BlockSpec {
        name: "Matrices",
        instance: None,
        set,
        binding,
        members: MATRICES_MEMBERS,
        access: Access::Members(&[0, 2]),
    }
}

pub fn material(set: Option<u32>, binding: Option<u32>) -> BlockSpec<'static> {
    BlockSpec {
        name: "Material",
        instance: None,
        set,
        binding,
        members: MATERIAL_MEMBERS,
        access: Access::Members(&[0]),
    }
}

pub fn position_and_color() -> Vec<InputSpec<'static>> {
    vec![
        InputSpec {
            name: "inPos",
            location: Some(0),
            components: 3,
        },
        InputSpec {
            name: "inColor",
            location: Some(1),
            components: 4,
        },
    ]
}

pub fn build_spirv(blocks: &[BlockSpec<'_>], inputs: &[InputSpec<'_>]) -> Vec<u32> {
    let mut b = Builder::new();
    b.set_version(1, 0);
    b.capability(spirv::Capability::Shader);
    b.memory_model(spirv::AddressingModel::Logical, spirv::MemoryModel::GLSL450);

    let void = b.type_void();
    let float = b.type_float(32);
    let uint = b.type_int(32, 0);
    let int = b.type_int(32, 1);
    let vec3 = b.type_vector(float, 3);
    let vec4 = b.type_vector(float, 4);
    let mat4 = b.type_matrix(vec4, 4);

    let member_type = |ty: MemberType| match ty {
        MemberType::Mat4 => mat4,
        MemberType::Vec4 => vec4,
        MemberType::Float => float,
    };

    let mut block_variables = vec![];
    for block in blocks {
        let member_types: Vec<u32> = block.members.iter().map(|m| member_type(m.ty)).collect();
        let block_type = b.type_struct(member_types);
        b.decorate(block_type, spirv::Decoration::Block, Vec::<Operand>::new());
        b.name(block_type, block.name.to_string());

        for (index, member) in block.members.iter().enumerate() {
            let index = index as u32;
            b.member_name(block_type, index, member.name.to_string());
            b.member_decorate(
                block_type,
                index,
                spirv::Decoration::Offset,
                vec![Operand::LiteralInt32(member.offset)],
            );

            if let MemberType::Mat4 = member.ty {
                b.member_decorate(
                    block_type,
                    index,
                    spirv::Decoration::ColMajor,
                    Vec::<Operand>::new(),
                );
                b.member_decorate(
                    block_type,
                    index,
                    spirv::Decoration::MatrixStride,
                    vec![Operand::LiteralInt32(16)],
                );
            }
        }

        let pointer = b.type_pointer(None, spirv::StorageClass::Uniform, block_type);
        let variable = b.variable(pointer, None, spirv::StorageClass::Uniform, None);
        if let Some(instance) = block.instance {
            b.name(variable, instance.to_string());
        }

        if let Some(set) = block.set {
            b.decorate(
                variable,
                spirv::Decoration::DescriptorSet,
                vec![Operand::LiteralInt32(set)],
            );
        }
        if let Some(binding) = block.binding {
            b.decorate(
                variable,
                spirv::Decoration::Binding,
                vec![Operand::LiteralInt32(binding)],
            );
        }

        block_variables.push((variable, block_type));
    }

    for input in inputs {
        let ty = if input.components == 3 { vec3 } else { vec4 };
        let pointer = b.type_pointer(None, spirv::StorageClass::Input, ty);
        let variable = b.variable(pointer, None, spirv::StorageClass::Input, None);
        b.name(variable, input.name.to_string());

        if let Some(location) = input.location {
            b.decorate(
                variable,
                spirv::Decoration::Location,
                vec![Operand::LiteralInt32(location)],
            );
        }
    }

    // builtins never show up as stage inputs
    let int_pointer = b.type_pointer(None, spirv::StorageClass::Input, int);
    let vertex_index = b.variable(int_pointer, None, spirv::StorageClass::Input, None);
    b.name(vertex_index, "gl_VertexIndex".to_string());
    b.decorate(
        vertex_index,
        spirv::Decoration::BuiltIn,
        vec![Operand::BuiltIn(spirv::BuiltIn::VertexIndex)],
    );

    // a runtime index, never a constant
    let private_uint = b.type_pointer(None, spirv::StorageClass::Private, uint);
    let dynamic_index = b.variable(private_uint, None, spirv::StorageClass::Private, None);

    let main_type = b.type_function(void, Vec::<u32>::new());
    b.begin_function(void, None, spirv::FunctionControl::NONE, main_type)
        .unwrap();
    b.begin_block(None).unwrap();

    for (block, (variable, block_type)) in blocks.iter().zip(block_variables) {
        match block.access {
            Access::Members(members) => {
                for member in members {
                    let index = b.constant_u32(uint, *member);
                    let ty = member_type(block.members[*member as usize].ty);
                    let pointer = b.type_pointer(None, spirv::StorageClass::Uniform, ty);
                    b.access_chain(pointer, None, variable, vec![index]).unwrap();
                }
            }

            Access::WholeBlock => {
                b.load(block_type, None, variable, None, Vec::<Operand>::new())
                    .unwrap();
            }

            Access::DynamicIndex => {
                let index = b
                    .load(uint, None, dynamic_index, None, Vec::<Operand>::new())
                    .unwrap();
                let ty = member_type(block.members[0].ty);
                let pointer = b.type_pointer(None, spirv::StorageClass::Uniform, ty);
                b.access_chain(pointer, None, variable, vec![index]).unwrap();
            }
        }
    }

    b.ret().unwrap();
    b.end_function().unwrap();

    b.module().assemble()
}
