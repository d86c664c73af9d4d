//! Backend Collaborators
//!
//! The deformation SDK and the GPU are external to this crate. They are
//! reached only through the traits in this module:
//!
//! - [`PuppetBackend`]: decodes the binary model and the motion, physics and
//!   pose documents, and creates a renderer for a loaded mesh
//! - [`PuppetMesh`]: the deformable mesh; owns canvas size, the declared
//!   parameter table and drawable bounds
//! - [`MeshRenderer`]: draws a mesh with bound textures
//! - [`GpuContext`]: uploads decoded images and hands back an opaque id
//!
//! Expressions are plain JSON and have a native decoder; a backend only needs
//! to override [`PuppetBackend::load_expression`] if it wants its own.

use glam::{Mat4, Vec2};

use crate::animation::expression::ExpressionClip;
use crate::animation::motion::MotionClip;
use crate::animation::parameters::{ParameterBuffer, ParameterInfo};
use crate::assets::image::DecodedImage;
use crate::errors::Result;

/// Opaque GPU texture identity handed out by a [`GpuContext`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GpuTextureId(pub u64);

/// Axis-aligned bounds of a drawable in model space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawableBounds {
    pub min: Vec2,
    pub max: Vec2,
}

impl DrawableBounds {
    #[must_use]
    pub fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self {
            min: Vec2::new(left.min(right), top.min(bottom)),
            max: Vec2::new(left.max(right), top.max(bottom)),
        }
    }

    /// Bounding box of a vertex list. `None` for an empty list.
    #[must_use]
    pub fn from_vertices(vertices: &[Vec2]) -> Option<Self> {
        let first = *vertices.first()?;
        let (min, max) = vertices
            .iter()
            .fold((first, first), |(min, max), v| (min.min(*v), max.max(*v)));
        Some(Self { min, max })
    }

    #[inline]
    #[must_use]
    pub fn contains(&self, point: Vec2) -> bool {
        point.x >= self.min.x && point.x <= self.max.x && point.y >= self.min.y && point.y <= self.max.y
    }
}

/// A loaded, deformable model mesh.
pub trait PuppetMesh {
    /// Canonical canvas width in model units.
    fn canvas_width(&self) -> f32;
    /// Canonical canvas height in model units.
    fn canvas_height(&self) -> f32;

    /// Parameters declared by the model, with their ranges and defaults.
    fn parameter_table(&self) -> Vec<ParameterInfo>;

    /// Current bounds of `drawable_id`, or `None` if the mesh has no such
    /// drawable.
    fn drawable_bounds(&self, drawable_id: &str) -> Option<DrawableBounds>;

    /// Writes the composited parameters into the mesh and deforms it.
    fn commit(&mut self, params: &ParameterBuffer);
}

/// Secondary motion solver.
pub trait PhysicsRig {
    fn evaluate(&mut self, params: &mut ParameterBuffer, dt: f32);
}

/// Part opacity and layering constraints.
pub trait PoseRig {
    fn update(&mut self, params: &mut ParameterBuffer, dt: f32);
}

pub trait MeshRenderer {
    fn bind_texture(&mut self, slot: usize, texture: GpuTextureId);
    fn set_premultiplied_alpha(&mut self, enabled: bool);
    fn draw(&mut self, mesh: &dyn PuppetMesh, mvp: &Mat4);
}

/// The deformation SDK.
pub trait PuppetBackend {
    fn load_moc(&mut self, bytes: &[u8]) -> Result<Box<dyn PuppetMesh>>;

    fn load_expression(&mut self, bytes: &[u8], name: &str) -> Result<Box<dyn MotionClip>> {
        Ok(Box::new(ExpressionClip::from_slice(bytes, name)?))
    }

    fn load_motion(&mut self, bytes: &[u8], name: &str) -> Result<Box<dyn MotionClip>>;

    fn load_physics(&mut self, bytes: &[u8]) -> Result<Box<dyn PhysicsRig>>;

    fn load_pose(&mut self, bytes: &[u8]) -> Result<Box<dyn PoseRig>>;

    fn create_renderer(&mut self, mesh: &dyn PuppetMesh) -> Result<Box<dyn MeshRenderer>>;
}

/// Texture upload capability.
pub trait GpuContext {
    /// Uploads `image` into a new texture, optionally generating mipmaps.
    fn create_texture(&mut self, image: &DecodedImage, mipmaps: bool) -> Result<GpuTextureId>;

    /// Replaces the pixels of an existing texture, keeping its identity.
    fn update_texture(&mut self, texture: GpuTextureId, image: &DecodedImage) -> Result<()>;

    fn delete_texture(&mut self, texture: GpuTextureId);
}
