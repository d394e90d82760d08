use std::collections::HashMap;

use xxhash_rust::xxh3::xxh3_64;

use super::ShaderStage;

/// remembers a content hash per stage so unchanged spirv can skip reflection
#[derive(Debug, Default)]
pub struct ChangeDetector {
    spirv_hashes: HashMap<ShaderStage, u64>,
}

impl ChangeDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// true on the first observation of a stage, or when its bytecode hash changed
    pub fn is_dirty(&mut self, stage: ShaderStage, spirv: &[u32]) -> bool {
        let hash = spirv_hash(spirv);

        match self.spirv_hashes.insert(stage, hash) {
            None => true,
            Some(previous) => previous != hash,
        }
    }

    /// drops the stored hash, so the next observation of this stage is dirty
    ///
    /// returns whether the stage was being tracked
    pub fn forget(&mut self, stage: ShaderStage) -> bool {
        self.spirv_hashes.remove(&stage).is_some()
    }
}

pub fn spirv_hash(spirv: &[u32]) -> u64 {
    xxh3_64(bytemuck::cast_slice(spirv))
}
