use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::{ShaderSettings, ShaderStage, StageSettings, StageSource};

/// the json file listing every shader and its compiled stages
///
/// ```json
/// {
///   "shaders": [
///     {
///       "name": "default",
///       "stages": [
///         { "path": "default.vert.spv" },
///         { "stage": "fragment", "path": "frag.spv" }
///       ]
///     }
///   ]
/// }
/// ```
///
/// stage paths are relative to the manifest's directory,
/// and the stage is guessed from the file name when left out
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ShaderManifestJson {
    pub shaders: Vec<ShaderEntryJson>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ShaderEntryJson {
    pub name: String,
    pub stages: Vec<StageEntryJson>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct StageEntryJson {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<ShaderStage>,
    pub path: PathBuf,
}

#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("failed to read shader manifest {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid shader manifest: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unable to determine the stage of {} in shader '{shader}'", .path.display())]
    UnknownStage { shader: String, path: PathBuf },

    #[error("shader '{shader}' lists the {stage} stage more than once")]
    DuplicateStage { shader: String, stage: ShaderStage },

    #[error("shader '{0}' is listed more than once")]
    DuplicateShader(String),
}

/// a loaded manifest, with stage paths resolved
#[derive(Debug, Clone)]
pub struct ShaderManifest {
    /// the directory the manifest lives in, also the one to watch for changes
    pub dir: PathBuf,
    pub shaders: Vec<ShaderSettings>,
}

impl ShaderManifest {
    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let json = std::fs::read_to_string(path).map_err(|source| ManifestError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let dir = path.parent().unwrap_or(Path::new(".")).to_path_buf();

        Self::parse(&json, dir)
    }

    pub fn parse(json: &str, dir: PathBuf) -> Result<Self, ManifestError> {
        let manifest: ShaderManifestJson = serde_json::from_str(json)?;

        let mut shaders: Vec<ShaderSettings> = vec![];
        for entry in manifest.shaders {
            if shaders.iter().any(|s| s.name == entry.name) {
                return Err(ManifestError::DuplicateShader(entry.name));
            }

            let mut stages: Vec<StageSettings> = vec![];
            for stage_entry in entry.stages {
                let stage = match stage_entry.stage {
                    Some(stage) => stage,
                    None => stage_entry
                        .path
                        .file_name()
                        .and_then(|name| ShaderStage::from_file_name(&name.to_string_lossy()))
                        .ok_or_else(|| ManifestError::UnknownStage {
                            shader: entry.name.clone(),
                            path: stage_entry.path.clone(),
                        })?,
                };

                if stages.iter().any(|s| s.stage == stage) {
                    return Err(ManifestError::DuplicateStage {
                        shader: entry.name,
                        stage,
                    });
                }

                stages.push(StageSettings {
                    stage,
                    source: StageSource::SpirvFile(dir.join(&stage_entry.path)),
                });
            }

            shaders.push(ShaderSettings {
                name: entry.name,
                stages,
            });
        }

        Ok(Self { dir, shaders })
    }
}
