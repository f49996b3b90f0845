//! Screenshot artifacts: validation, atomic writes and the run manifest

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use image::GenericImageView;
use log::debug;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{Error, Result};

pub const MANIFEST_FILE: &str = "manifest.json";

/// A screenshot written by a scenario.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub scenario: String,
    /// File name inside the output directory
    pub file: String,
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub bytes: u64,
    pub sha256: String,
}

/// Decode `data` as PNG and return its dimensions.
pub fn validate_png(data: &[u8]) -> Result<(u32, u32)> {
    if data.is_empty() {
        return Err(Error::RenderError("screenshot is empty".into()));
    }
    let img = image::load_from_memory_with_format(data, image::ImageFormat::Png)
        .map_err(|e| Error::RenderError(format!("screenshot is not a valid PNG: {}", e)))?;
    Ok(img.dimensions())
}

pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Create the output directory if it does not exist yet.
pub fn ensure_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).map_err(|e| Error::fs(dir, e))
}

/// Validate `data` and move it into `dir/file` through a temporary file,
/// so the destination never holds a partial image.
pub fn write_png(dir: &Path, scenario: &str, file: &str, data: &[u8]) -> Result<Artifact> {
    let (width, height) = validate_png(data)?;
    let path = dir.join(file);

    let mut tmp = tempfile::Builder::new()
        .prefix(".visreg-")
        .suffix(".png.tmp")
        .tempfile_in(dir)
        .map_err(|e| Error::fs(dir, e))?;
    tmp.write_all(data).map_err(|e| Error::fs(tmp.path(), e))?;
    tmp.as_file().sync_all().map_err(|e| Error::fs(tmp.path(), e))?;
    tmp.persist(&path).map_err(|e| Error::fs(&path, e.error))?;

    debug!("wrote {} ({}x{}, {} bytes)", path.display(), width, height, data.len());

    Ok(Artifact {
        scenario: scenario.to_string(),
        file: file.to_string(),
        path,
        width,
        height,
        bytes: data.len() as u64,
        sha256: sha256_hex(data),
    })
}

/// Every artifact produced by one suite run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub suite: String,
    pub artifacts: Vec<Artifact>,
}

impl Manifest {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|e| Error::fs(path, e))?;
        serde_json::from_str(&raw)
            .map_err(|e| Error::ConfigError(format!("{}: invalid manifest: {}", path.display(), e)))
    }

    pub fn save(&self, dir: &Path) -> Result<PathBuf> {
        let path = dir.join(MANIFEST_FILE);
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| Error::ConfigError(format!("Failed to serialize manifest: {}", e)))?;
        fs::write(&path, json).map_err(|e| Error::fs(&path, e))?;
        Ok(path)
    }
}

/// A difference in shape between two runs of the same artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShapeMismatch {
    Missing { file: String },
    Added { file: String },
    Resized { file: String, before: (u32, u32), after: (u32, u32) },
}

/// Compare two manifests by artifact dimensions. Byte-level differences are
/// expected between runs and ignored.
pub fn compare_shapes(before: &Manifest, after: &Manifest) -> Vec<ShapeMismatch> {
    let index = |m: &Manifest| -> BTreeMap<String, (u32, u32)> {
        m.artifacts.iter().map(|a| (a.file.clone(), (a.width, a.height))).collect()
    };
    let old = index(before);
    let new = index(after);

    let mut out = Vec::new();
    for (file, dims) in &old {
        match new.get(file) {
            None => out.push(ShapeMismatch::Missing { file: file.clone() }),
            Some(d) if d != dims => out.push(ShapeMismatch::Resized {
                file: file.clone(),
                before: *dims,
                after: *d,
            }),
            Some(_) => {}
        }
    }
    for file in new.keys().filter(|f| !old.contains_key(*f)) {
        out.push(ShapeMismatch::Added { file: file.clone() });
    }
    out
}
