use std::collections::{BTreeSet, HashMap};

use rspirv::dr::{Instruction, Module, Operand};
use rspirv::spirv;

use super::decoder::*;

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("spirv parse error: {0:?}")]
    Parse(#[from] rspirv::binary::ParseState),
    #[error("no instruction defines id {0}")]
    UndefinedId(u32),
    #[error("expected operand {index} of {opcode:?} to be {expected}")]
    Operand {
        opcode: spirv::Op,
        index: usize,
        expected: &'static str,
    },
    #[error("type {0:?} has no size in a buffer block")]
    UnsizedType(spirv::Op),
    #[error("type {0:?} is not a scalar, vector or matrix")]
    UnsupportedInputType(spirv::Op),
    #[error("size of type {0} does not fit in 32 bits")]
    SizeOverflow(u32),
    #[error("type {0} is nested too deeply, or contains itself")]
    TypeTooDeep(u32),
}

/// deeper than any real block, and shallow enough to catch cyclic types
const MAX_TYPE_DEPTH: u32 = 64;

type Result<T, E = DecodeError> = std::result::Result<T, E>;

type DecorationList = Vec<(spirv::Decoration, Option<u32>)>;

/// [`ShaderDecoder`] over a parsed spirv module
pub struct SpirvDecoder {
    module: Module,
    definitions: HashMap<u32, usize>,
    names: HashMap<u32, String>,
    member_names: HashMap<(u32, u32), String>,
    decorations: HashMap<u32, DecorationList>,
    member_decorations: HashMap<(u32, u32), DecorationList>,
}

impl SpirvDecoder {
    pub fn from_words(spirv: &[u32]) -> Result<Self> {
        let module = rspirv::dr::load_words(spirv)?;
        Ok(Self::new(module))
    }

    pub fn new(module: Module) -> Self {
        let definitions = module
            .types_global_values
            .iter()
            .enumerate()
            .filter_map(|(index, inst)| inst.result_id.map(|id| (id, index)))
            .collect();

        let mut names = HashMap::new();
        let mut member_names = HashMap::new();
        for inst in &module.debug_names {
            match inst.operands.as_slice() {
                [Operand::IdRef(target), Operand::LiteralString(name)]
                    if inst.class.opcode == spirv::Op::Name =>
                {
                    names.insert(*target, name.clone());
                }
                [
                    Operand::IdRef(ty),
                    Operand::LiteralInt32(member),
                    Operand::LiteralString(name),
                ] if inst.class.opcode == spirv::Op::MemberName => {
                    member_names.insert((*ty, *member), name.clone());
                }
                _ => {}
            }
        }

        let mut decorations: HashMap<u32, DecorationList> = HashMap::new();
        let mut member_decorations: HashMap<(u32, u32), DecorationList> = HashMap::new();
        for inst in &module.annotations {
            match inst.operands.as_slice() {
                [Operand::IdRef(target), Operand::Decoration(decoration), rest @ ..]
                    if inst.class.opcode == spirv::Op::Decorate =>
                {
                    decorations
                        .entry(*target)
                        .or_default()
                        .push((*decoration, first_literal(rest)));
                }
                [
                    Operand::IdRef(ty),
                    Operand::LiteralInt32(member),
                    Operand::Decoration(decoration),
                    rest @ ..,
                ] if inst.class.opcode == spirv::Op::MemberDecorate => {
                    member_decorations
                        .entry((*ty, *member))
                        .or_default()
                        .push((*decoration, first_literal(rest)));
                }
                _ => {}
            }
        }

        Self {
            module,
            definitions,
            names,
            member_names,
            decorations,
            member_decorations,
        }
    }

    fn definition(&self, id: u32) -> Result<&Instruction> {
        self.definitions
            .get(&id)
            .map(|index| &self.module.types_global_values[*index])
            .ok_or(DecodeError::UndefinedId(id))
    }

    fn find_decoration(&self, id: u32, decoration: spirv::Decoration) -> Option<Option<u32>> {
        self.decorations
            .get(&id)?
            .iter()
            .find(|(d, _)| *d == decoration)
            .map(|(_, literal)| *literal)
    }

    fn find_member_decoration(
        &self,
        ty: u32,
        member: u32,
        decoration: spirv::Decoration,
    ) -> Option<Option<u32>> {
        self.member_decorations
            .get(&(ty, member))?
            .iter()
            .find(|(d, _)| *d == decoration)
            .map(|(_, literal)| *literal)
    }

    fn is_builtin(&self, variable_id: u32, base_type_id: u32) -> bool {
        if self
            .find_decoration(variable_id, spirv::Decoration::BuiltIn)
            .is_some()
        {
            return true;
        }

        // gl_PerVertex style blocks decorate their members instead
        self.member_decorations
            .iter()
            .any(|((ty, _), decorations)| {
                *ty == base_type_id
                    && decorations
                        .iter()
                        .any(|(d, _)| *d == spirv::Decoration::BuiltIn)
            })
    }

    /// global variables of a storage class, in declaration order,
    /// paired with the type their pointer points to
    fn variables(&self, storage_class: spirv::StorageClass) -> Result<Vec<(u32, u32)>> {
        let mut variables = vec![];

        for inst in &self.module.types_global_values {
            if inst.class.opcode != spirv::Op::Variable {
                continue;
            }

            let class = storage_class_operand(inst, 0)?;
            if class != storage_class {
                continue;
            }

            let (Some(result_id), Some(pointer_type)) = (inst.result_id, inst.result_type) else {
                continue;
            };

            let pointer = self.definition(pointer_type)?;
            let pointee = id_operand(pointer, 1)?;

            variables.push((result_id, pointee));
        }

        Ok(variables)
    }

    /// the first non-empty name among the ids, else `_<first id>`
    fn first_name(&self, ids: [u32; 2]) -> String {
        ids.iter()
            .find_map(|id| self.names.get(id).filter(|name| !name.is_empty()))
            .cloned()
            .unwrap_or_else(|| format!("_{}", ids[0]))
    }

    /// stages match uniform blocks by block name, the instance name is stage-local
    fn block_name(&self, variable_id: u32, base_type_id: u32) -> String {
        self.first_name([base_type_id, variable_id])
    }

    fn input_name(&self, variable_id: u32, base_type_id: u32) -> String {
        self.first_name([variable_id, base_type_id])
    }

    fn constant_value(&self, id: u32) -> Option<u32> {
        let inst = self.definition(id).ok()?;
        if inst.class.opcode != spirv::Op::Constant {
            return None;
        }

        match inst.operands.first() {
            Some(Operand::LiteralInt32(value)) => Some(*value),
            Some(Operand::LiteralInt64(value)) => u32::try_from(*value).ok(),
            _ => None,
        }
    }

    fn type_size(&self, type_id: u32, depth: u32) -> Result<u32> {
        if depth > MAX_TYPE_DEPTH {
            return Err(DecodeError::TypeTooDeep(type_id));
        }

        let inst = self.definition(type_id)?;
        let overflow = || DecodeError::SizeOverflow(type_id);

        match inst.class.opcode {
            spirv::Op::TypeInt | spirv::Op::TypeFloat => Ok(literal_operand(inst, 0)? / 8),
            spirv::Op::TypeBool => Ok(4),
            spirv::Op::TypeVector | spirv::Op::TypeMatrix => {
                let component_size = self.type_size(id_operand(inst, 0)?, depth + 1)?;
                component_size
                    .checked_mul(literal_operand(inst, 1)?)
                    .ok_or_else(overflow)
            }
            spirv::Op::TypeArray => {
                let length_id = id_operand(inst, 1)?;
                let length = self
                    .constant_value(length_id)
                    .ok_or(DecodeError::Operand {
                        opcode: inst.class.opcode,
                        index: 1,
                        expected: "a constant array length",
                    })?;

                let stride = match self.find_decoration(type_id, spirv::Decoration::ArrayStride) {
                    Some(Some(stride)) => stride,
                    _ => self.type_size(id_operand(inst, 0)?, depth + 1)?,
                };

                stride.checked_mul(length).ok_or_else(overflow)
            }
            spirv::Op::TypeRuntimeArray => Ok(0),
            spirv::Op::TypeStruct => self.struct_size(type_id, depth + 1),
            op => Err(DecodeError::UnsizedType(op)),
        }
    }

    fn member_type(&self, struct_id: u32, member: u32) -> Result<u32> {
        let inst = self.definition(struct_id)?;
        id_operand(inst, member as usize)
    }

    fn member_offset(&self, struct_id: u32, member: u32) -> u32 {
        self.find_member_decoration(struct_id, member, spirv::Decoration::Offset)
            .flatten()
            .unwrap_or(0)
    }

    /// the furthest end of any member
    fn struct_size(&self, type_id: u32, depth: u32) -> Result<u32> {
        if depth > MAX_TYPE_DEPTH {
            return Err(DecodeError::TypeTooDeep(type_id));
        }

        let mut end_of_struct = 0;
        for member in 0..self.member_count(type_id)? {
            let end = self
                .member_offset(type_id, member)
                .checked_add(self.member_size(type_id, member, depth)?)
                .ok_or(DecodeError::SizeOverflow(type_id))?;
            end_of_struct = end_of_struct.max(end);
        }

        Ok(end_of_struct)
    }

    /// size of a struct member, honoring an explicit matrix stride
    fn member_size(&self, struct_id: u32, member: u32, depth: u32) -> Result<u32> {
        let member_type = self.member_type(struct_id, member)?;
        let inst = self.definition(member_type)?;

        let matrix_stride =
            self.find_member_decoration(struct_id, member, spirv::Decoration::MatrixStride);

        match (inst.class.opcode, matrix_stride) {
            (spirv::Op::TypeMatrix, Some(Some(stride))) => {
                let row_major = self
                    .find_member_decoration(struct_id, member, spirv::Decoration::RowMajor)
                    .is_some();

                let vectors = if row_major {
                    let column = self.definition(id_operand(inst, 0)?)?;
                    literal_operand(column, 1)?
                } else {
                    literal_operand(inst, 1)?
                };

                stride
                    .checked_mul(vectors)
                    .ok_or(DecodeError::SizeOverflow(member_type))
            }
            _ => self.type_size(member_type, depth + 1),
        }
    }

    fn function_instructions(&self) -> impl Iterator<Item = &Instruction> {
        self.module
            .functions
            .iter()
            .flat_map(|function| function.blocks.iter())
            .flat_map(|block| block.instructions.iter())
    }

    fn shape(&self, type_id: u32, depth: u32) -> Result<TypeShape> {
        if depth > MAX_TYPE_DEPTH {
            return Err(DecodeError::TypeTooDeep(type_id));
        }

        let inst = self.definition(type_id)?;

        match inst.class.opcode {
            spirv::Op::TypeInt | spirv::Op::TypeFloat => Ok(TypeShape {
                width: literal_operand(inst, 0)?,
                vector_size: 1,
                columns: 1,
            }),
            spirv::Op::TypeVector => Ok(TypeShape {
                vector_size: literal_operand(inst, 1)?,
                ..self.shape(id_operand(inst, 0)?, depth + 1)?
            }),
            spirv::Op::TypeMatrix => Ok(TypeShape {
                columns: literal_operand(inst, 1)?,
                ..self.shape(id_operand(inst, 0)?, depth + 1)?
            }),
            spirv::Op::TypeArray => self.shape(id_operand(inst, 0)?, depth + 1),
            op => Err(DecodeError::UnsupportedInputType(op)),
        }
    }

    fn member_count(&self, struct_id: u32) -> Result<u32> {
        Ok(self.definition(struct_id)?.operands.len() as u32)
    }
}

impl ShaderDecoder for SpirvDecoder {
    type Error = DecodeError;

    fn resources(&self, kind: ResourceKind) -> Result<Vec<Resource>> {
        let resources = match kind {
            ResourceKind::UniformBlock => self
                .variables(spirv::StorageClass::Uniform)?
                .into_iter()
                .filter(|(_, base_type_id)| {
                    self.find_decoration(*base_type_id, spirv::Decoration::Block)
                        .is_some()
                })
                .map(|(id, base_type_id)| Resource {
                    id,
                    base_type_id,
                    name: self.block_name(id, base_type_id),
                })
                .collect(),

            ResourceKind::StageInput => self
                .variables(spirv::StorageClass::Input)?
                .into_iter()
                .filter(|(id, base_type_id)| !self.is_builtin(*id, *base_type_id))
                .map(|(id, base_type_id)| Resource {
                    id,
                    base_type_id,
                    name: self.input_name(id, base_type_id),
                })
                .collect(),

            ResourceKind::Sampler | ResourceKind::StorageBuffer => vec![],
        };

        Ok(resources)
    }

    fn decoration(&self, id: u32, decoration: DecorationKind) -> Option<u32> {
        let decoration = match decoration {
            DecorationKind::DescriptorSet => spirv::Decoration::DescriptorSet,
            DecorationKind::Binding => spirv::Decoration::Binding,
            DecorationKind::Location => spirv::Decoration::Location,
        };

        self.find_decoration(id, decoration).flatten()
    }

    fn declared_struct_size(&self, type_id: u32) -> Result<u32> {
        self.struct_size(type_id, 0)
    }

    fn active_buffer_ranges(&self, resource: &Resource) -> Result<Vec<BufferRange>> {
        let struct_id = resource.base_type_id;
        let member_count = self.member_count(struct_id)?;

        let mut active = BTreeSet::new();
        for inst in self.function_instructions() {
            let base = match inst.operands.first() {
                Some(Operand::IdRef(base)) => *base,
                _ => continue,
            };

            match inst.class.opcode {
                spirv::Op::AccessChain | spirv::Op::InBoundsAccessChain
                    if base == resource.id =>
                {
                    let member = match inst.operands.get(1) {
                        Some(Operand::IdRef(index)) => self.constant_value(*index),
                        _ => None,
                    };

                    match member {
                        Some(member) => {
                            active.insert(member);
                        }
                        None => active.extend(0..member_count),
                    }
                }

                // the whole block is read at once
                spirv::Op::Load if base == resource.id => active.extend(0..member_count),
                spirv::Op::CopyMemory => {
                    if let Some(Operand::IdRef(source)) = inst.operands.get(1) {
                        if *source == resource.id {
                            active.extend(0..member_count);
                        }
                    }
                }

                _ => {}
            }
        }

        active
            .into_iter()
            .filter(|member| *member < member_count)
            .map(|member| {
                Ok(BufferRange {
                    member_index: member,
                    offset: self.member_offset(struct_id, member),
                    range: self.member_size(struct_id, member, 0)?,
                })
            })
            .collect()
    }

    fn member_name(&self, type_id: u32, index: u32) -> Option<String> {
        self.member_names.get(&(type_id, index)).cloned()
    }

    fn type_shape(&self, type_id: u32) -> Result<TypeShape> {
        self.shape(type_id, 0)
    }
}

fn first_literal(operands: &[Operand]) -> Option<u32> {
    match operands.first() {
        Some(Operand::LiteralInt32(value)) => Some(*value),
        _ => None,
    }
}

fn id_operand(inst: &Instruction, index: usize) -> Result<u32> {
    match inst.operands.get(index) {
        Some(Operand::IdRef(id)) => Ok(*id),
        _ => Err(DecodeError::Operand {
            opcode: inst.class.opcode,
            index,
            expected: "an id",
        }),
    }
}

fn literal_operand(inst: &Instruction, index: usize) -> Result<u32> {
    match inst.operands.get(index) {
        Some(Operand::LiteralInt32(value)) => Ok(*value),
        _ => Err(DecodeError::Operand {
            opcode: inst.class.opcode,
            index,
            expected: "a 32-bit literal",
        }),
    }
}

fn storage_class_operand(inst: &Instruction, index: usize) -> Result<spirv::StorageClass> {
    match inst.operands.get(index) {
        Some(Operand::StorageClass(class)) => Ok(*class),
        _ => Err(DecodeError::Operand {
            opcode: inst.class.opcode,
            index,
            expected: "a storage class",
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rspirv::spirv::{Decoration, Op, StorageClass};

    use crate::shaders::reflection::test_spirv::*;

    fn define(module: &mut Module, op: Op, id: u32, operands: Vec<Operand>) {
        module
            .types_global_values
            .push(Instruction::new(op, None, Some(id), operands));
    }

    fn decorate(module: &mut Module, target: u32, decoration: Decoration, literal: u32) {
        module.annotations.push(Instruction::new(
            Op::Decorate,
            None,
            None,
            vec![
                Operand::IdRef(target),
                Operand::Decoration(decoration),
                Operand::LiteralInt32(literal),
            ],
        ));
    }

    fn member_offset(module: &mut Module, ty: u32, member: u32, offset: u32) {
        module.annotations.push(Instruction::new(
            Op::MemberDecorate,
            None,
            None,
            vec![
                Operand::IdRef(ty),
                Operand::LiteralInt32(member),
                Operand::Decoration(Decoration::Offset),
                Operand::LiteralInt32(offset),
            ],
        ));
    }

    /// `uniform Huge { float values[length]; }` with the given array stride
    fn huge_block(length: u32, stride: u32) -> Module {
        let mut module = Module::new();
        define(&mut module, Op::TypeFloat, 1, vec![Operand::LiteralInt32(32)]);
        define(
            &mut module,
            Op::TypeInt,
            2,
            vec![Operand::LiteralInt32(32), Operand::LiteralInt32(0)],
        );
        module.types_global_values.push(Instruction::new(
            Op::Constant,
            Some(2),
            Some(3),
            vec![Operand::LiteralInt32(length)],
        ));
        define(
            &mut module,
            Op::TypeArray,
            4,
            vec![Operand::IdRef(1), Operand::IdRef(3)],
        );
        define(&mut module, Op::TypeStruct, 5, vec![Operand::IdRef(4)]);
        define(
            &mut module,
            Op::TypePointer,
            6,
            vec![
                Operand::StorageClass(StorageClass::Uniform),
                Operand::IdRef(5),
            ],
        );
        module.types_global_values.push(Instruction::new(
            Op::Variable,
            Some(6),
            Some(7),
            vec![Operand::StorageClass(StorageClass::Uniform)],
        ));

        decorate(&mut module, 4, Decoration::ArrayStride, stride);
        member_offset(&mut module, 5, 0, 0);
        module.annotations.push(Instruction::new(
            Op::Decorate,
            None,
            None,
            vec![Operand::IdRef(5), Operand::Decoration(Decoration::Block)],
        ));

        module
    }

    #[test]
    fn array_sizes_use_the_declared_stride() {
        let decoder = SpirvDecoder::new(huge_block(8, 16));

        assert_eq!(decoder.declared_struct_size(5).unwrap(), 128);
    }

    #[test]
    fn oversized_array_is_a_decode_error() {
        let decoder = SpirvDecoder::new(huge_block(0x1000_0000, 16));

        let result = decoder.declared_struct_size(5);
        assert!(matches!(result, Err(DecodeError::SizeOverflow(4))));

        let blocks = decoder.resources(ResourceKind::UniformBlock).unwrap();
        assert_eq!(blocks.len(), 1);
    }

    #[test]
    fn member_end_past_u32_is_a_decode_error() {
        let mut module = huge_block(4, 16);
        module.annotations.retain(|inst| inst.class.opcode != Op::MemberDecorate);
        member_offset(&mut module, 5, 0, u32::MAX - 8);

        let decoder = SpirvDecoder::new(module);
        assert!(matches!(
            decoder.declared_struct_size(5),
            Err(DecodeError::SizeOverflow(5))
        ));
    }

    #[test]
    fn self_referencing_struct_is_a_decode_error() {
        let mut module = Module::new();
        define(&mut module, Op::TypeStruct, 1, vec![Operand::IdRef(1)]);

        let decoder = SpirvDecoder::new(module);
        assert!(matches!(
            decoder.declared_struct_size(1),
            Err(DecodeError::TypeTooDeep(1))
        ));
    }

    #[test]
    fn blocks_are_named_after_their_type_not_their_instance() {
        let spirv = build_spirv(
            &[BlockSpec {
                instance: Some("vs_ubo"),
                ..matrices(Some(0), Some(0))
            }],
            &[],
        );

        let decoder = SpirvDecoder::from_words(&spirv).unwrap();
        let blocks = decoder.resources(ResourceKind::UniformBlock).unwrap();

        let names: Vec<_> = blocks.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["Matrices"]);
    }

    #[test]
    fn whole_block_load_marks_every_member() {
        let spirv = build_spirv(
            &[BlockSpec {
                access: Access::WholeBlock,
                ..matrices(Some(0), Some(0))
            }],
            &[],
        );

        let decoder = SpirvDecoder::from_words(&spirv).unwrap();
        let blocks = decoder.resources(ResourceKind::UniformBlock).unwrap();
        let block = &blocks[0];

        let members: Vec<_> = decoder
            .active_buffer_ranges(block)
            .unwrap()
            .iter()
            .map(|range| range.member_index)
            .collect();
        assert_eq!(members, vec![0, 1, 2]);
    }

    #[test]
    fn dynamic_index_marks_every_member() {
        let spirv = build_spirv(
            &[BlockSpec {
                access: Access::DynamicIndex,
                ..material(Some(0), Some(0))
            }],
            &[],
        );

        let decoder = SpirvDecoder::from_words(&spirv).unwrap();
        let blocks = decoder.resources(ResourceKind::UniformBlock).unwrap();
        let block = &blocks[0];

        let ranges = decoder.active_buffer_ranges(block).unwrap();
        assert_eq!(
            ranges,
            vec![
                BufferRange {
                    member_index: 0,
                    offset: 0,
                    range: 16,
                },
                BufferRange {
                    member_index: 1,
                    offset: 16,
                    range: 4,
                },
            ]
        );
    }
}
