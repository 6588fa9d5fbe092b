//! Resource module
//!
//! GPU-backed resources built on the `graphics_device` traits: the vertex
//! format, staging uploads, meshes and models, the texture cache, and the
//! import boundary for model and image files.

pub mod vertex;
pub mod upload;
pub mod importer;
pub mod mesh;
pub mod texture_cache;

pub use vertex::Vertex;
pub use upload::{create_buffer_with_data, create_staging_buffer, upload_texture, upload_to_buffer};
pub use importer::{
    texture_file_name, DecodedImage, ImageDecoder, ImageFileDecoder, ImportedMaterial, ImportedMesh,
    ImportedModel, ModelImporter, ObjImporter,
};
pub use mesh::{Mesh, MeshModel};
pub use texture_cache::{TextureCache, TextureId};
