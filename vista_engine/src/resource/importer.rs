//! Import boundary
//!
//! Model and image file parsing live outside the engine core. The core only
//! sees [`ImportedModel`] and [`DecodedImage`]; the file-backed
//! implementations here ([`ObjImporter`], [`ImageFileDecoder`]) are thin
//! adapters over `tobj` and `image`.

use std::path::Path;
use crate::error::{Error, Result};
use crate::resource::Vertex;

// ===== MODELS =====

/// One submesh as produced by an importer
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportedMesh {
    pub positions: Vec<[f32; 3]>,
    /// First texture coordinate set, when the file has one
    pub tex_coords: Option<Vec<[f32; 2]>>,
    /// Triangle list
    pub indices: Vec<u32>,
    /// Index into [`ImportedModel::materials`]
    pub material: Option<usize>,
}

impl ImportedMesh {
    /// Vertices in the engine format
    ///
    /// Missing texture coordinates become (0, 0); the color is white.
    pub fn vertices(&self) -> Vec<Vertex> {
        self.positions
            .iter()
            .enumerate()
            .map(|(i, pos)| {
                let uv = self
                    .tex_coords
                    .as_ref()
                    .and_then(|uvs| uvs.get(i))
                    .copied()
                    .unwrap_or([0.0, 0.0]);
                Vertex::new(*pos, [1.0, 1.0, 1.0], uv)
            })
            .collect()
    }
}

/// A material; only the diffuse texture matters to the renderer
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportedMaterial {
    /// Texture path as written in the model file
    pub diffuse_texture: Option<String>,
}

/// Everything the renderer needs from a model file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportedModel {
    pub meshes: Vec<ImportedMesh>,
    pub materials: Vec<ImportedMaterial>,
}

/// File name part of a texture path written by a modelling tool
///
/// Both separators are accepted since model files often carry Windows paths.
pub fn texture_file_name(path: &str) -> &str {
    match path.rfind(['\\', '/']) {
        Some(index) => &path[index + 1..],
        None => path,
    }
}

/// Produces an [`ImportedModel`] from a file
pub trait ModelImporter {
    fn import(&self, path: &Path) -> Result<ImportedModel>;
}

/// Wavefront OBJ importer
#[derive(Debug, Clone, Copy, Default)]
pub struct ObjImporter;

impl ModelImporter for ObjImporter {
    fn import(&self, path: &Path) -> Result<ImportedModel> {
        let options = tobj::LoadOptions {
            single_index: true,
            triangulate: true,
            ..Default::default()
        };
        let (models, materials) = tobj::load_obj(path, &options)
            .map_err(|e| Error::AssetImport(format!("{}: {}", path.display(), e)))?;

        // A missing .mtl file leaves every mesh on the default texture
        let materials = materials
            .unwrap_or_default()
            .into_iter()
            .map(|material| ImportedMaterial { diffuse_texture: material.diffuse_texture })
            .collect();

        let meshes = models
            .into_iter()
            .map(|model| {
                let mesh = model.mesh;
                let positions = mesh
                    .positions
                    .chunks_exact(3)
                    .map(|p| [p[0], p[1], p[2]])
                    .collect::<Vec<_>>();
                let tex_coords = if mesh.texcoords.is_empty() {
                    None
                } else {
                    // OBJ puts v=0 at the bottom of the image
                    Some(mesh.texcoords.chunks_exact(2).map(|t| [t[0], 1.0 - t[1]]).collect())
                };
                ImportedMesh { positions, tex_coords, indices: mesh.indices, material: mesh.material_id }
            })
            .collect();

        Ok(ImportedModel { meshes, materials })
    }
}

// ===== IMAGES =====

/// Decoded 8-bit RGBA pixels, rows top to bottom
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl DecodedImage {
    /// A 1x1 opaque white image
    pub fn white() -> Self {
        Self { width: 1, height: 1, rgba: vec![255; 4] }
    }

    /// Check that the pixel buffer matches the dimensions
    pub fn validate(&self) -> Result<()> {
        let expected = self.width as usize * self.height as usize * 4;
        if self.width == 0 || self.height == 0 || self.rgba.len() != expected {
            return Err(Error::AssetImport(format!(
                "{}x{} image with {} bytes of RGBA data",
                self.width,
                self.height,
                self.rgba.len()
            )));
        }
        Ok(())
    }
}

/// Produces RGBA pixels from an image file
pub trait ImageDecoder: Send + Sync {
    fn decode(&self, path: &Path) -> Result<DecodedImage>;
}

/// Decoder backed by the `image` crate (PNG and JPEG)
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageFileDecoder;

impl ImageDecoder for ImageFileDecoder {
    fn decode(&self, path: &Path) -> Result<DecodedImage> {
        let image = image::open(path)
            .map_err(|e| Error::AssetImport(format!("{}: {}", path.display(), e)))?
            .to_rgba8();
        Ok(DecodedImage { width: image.width(), height: image.height(), rgba: image.into_raw() })
    }
}

#[cfg(test)]
#[path = "importer_tests.rs"]
mod tests;
