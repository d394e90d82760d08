use std::path::{Path, PathBuf};

pub fn manifest_path<'a>(segments: impl IntoIterator<Item = &'a str>) -> PathBuf {
    let segments = segments.into_iter();
    let full_path = [env!("CARGO_MANIFEST_DIR")].into_iter().chain(segments);
    full_path.collect()
}

/// an env var set to anything but empty or 'false'
pub fn env_flag(name: &str) -> bool {
    parse_flag(std::env::var(name).ok())
}

fn parse_flag(value: Option<String>) -> bool {
    match value {
        None => false,
        Some(s) if s.is_empty() => false,
        Some(s) if s.to_lowercase() == "false" => false,
        _ => true,
    }
}

/// `<name>.reflection.json`, next to the shader manifest
pub fn reflection_json_path(shaders_dir: &Path, shader_name: &str) -> PathBuf {
    shaders_dir.join(format!("{shader_name}.reflection.json"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_are_off_when_unset_empty_or_false() {
        assert!(!parse_flag(None));
        assert!(!parse_flag(Some(String::new())));
        assert!(!parse_flag(Some("FALSE".to_string())));
        assert!(parse_flag(Some("1".to_string())));
        assert!(parse_flag(Some("true".to_string())));
    }

    #[test]
    fn reflection_json_sits_next_to_the_manifest() {
        assert_eq!(
            reflection_json_path(Path::new("assets/shaders"), "default"),
            PathBuf::from("assets/shaders/default.reflection.json")
        );
    }

    #[test]
    fn manifest_path_is_rooted_at_the_crate() {
        let path = manifest_path(["shaders", "shaders.json"]);

        assert!(path.starts_with(env!("CARGO_MANIFEST_DIR")));
        assert!(path.ends_with("shaders/shaders.json"));
    }
}
