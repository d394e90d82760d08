pub mod shader_watcher;
pub mod shaders;
pub mod util;

pub use shaders::{LayoutStore, Shader, ShaderManifest, ShaderSettings, ShaderStage};
