//! Compiled shader binaries.

use crate::core::config::ShaderConfig;

use super::AssetError;

/// The pair of compiled SPIR-V shaders a graphics pipeline is built from.
#[derive(Debug, Clone)]
pub struct ShaderSet {
    vertex: Vec<u8>,
    fragment: Vec<u8>,
}

impl ShaderSet {
    /// Read both shader binaries from the paths in `config`.
    pub fn load(config: &ShaderConfig) -> Result<Self, AssetError> {
        Ok(Self {
            vertex: read_spirv(&config.vertex_shader_path)?,
            fragment: read_spirv(&config.fragment_shader_path)?,
        })
    }

    /// Build a shader set from binaries already in memory.
    pub fn from_bytes(vertex: Vec<u8>, fragment: Vec<u8>) -> Result<Self, AssetError> {
        validate_spirv(&vertex, "vertex")?;
        validate_spirv(&fragment, "fragment")?;
        Ok(Self { vertex, fragment })
    }

    /// Compiled vertex shader bytes.
    pub fn vertex(&self) -> &[u8] {
        &self.vertex
    }

    /// Compiled fragment shader bytes.
    pub fn fragment(&self) -> &[u8] {
        &self.fragment
    }
}

fn read_spirv(path: &str) -> Result<Vec<u8>, AssetError> {
    let bytes = std::fs::read(path).map_err(|e| {
        AssetError::LoadFailed(format!("failed to read shader {path}: {e}"))
    })?;
    validate_spirv(&bytes, path)?;
    Ok(bytes)
}

// SPIR-V words are 32 bits; the first word is a fixed magic number.
const SPIRV_MAGIC: [u8; 4] = [0x03, 0x02, 0x23, 0x07];

fn validate_spirv(bytes: &[u8], what: &str) -> Result<(), AssetError> {
    if bytes.len() < 4 || bytes.len() % 4 != 0 {
        return Err(AssetError::InvalidData(format!(
            "shader {what} is not a whole number of SPIR-V words ({} bytes)",
            bytes.len()
        )));
    }
    if bytes[0..4] != SPIRV_MAGIC {
        return Err(AssetError::InvalidData(format!(
            "shader {what} does not start with the SPIR-V magic number"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_spirv(words: usize) -> Vec<u8> {
        let mut bytes = SPIRV_MAGIC.to_vec();
        bytes.extend(std::iter::repeat(0u8).take((words - 1) * 4));
        bytes
    }

    #[test]
    fn valid_binaries_are_accepted() {
        let set = ShaderSet::from_bytes(fake_spirv(5), fake_spirv(3)).unwrap();
        assert_eq!(set.vertex().len(), 20);
        assert_eq!(set.fragment().len(), 12);
    }

    #[test]
    fn unaligned_binary_is_rejected() {
        let mut bad = fake_spirv(2);
        bad.push(0);
        assert!(ShaderSet::from_bytes(bad, fake_spirv(2)).is_err());
    }

    #[test]
    fn wrong_magic_is_rejected() {
        let bad = vec![0u8; 8];
        assert!(ShaderSet::from_bytes(bad, fake_spirv(2)).is_err());
    }

    #[test]
    fn missing_file_reports_path() {
        let config = ShaderConfig::new("does/not/exist.vert.spv", "does/not/exist.frag.spv");
        let err = ShaderSet::load(&config).unwrap_err();
        assert!(err.to_string().contains("does/not/exist.vert.spv"));
    }
}
