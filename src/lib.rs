#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_arguments)]

pub mod animation;
pub mod assets;
pub mod backend;
pub mod config;
pub mod errors;
pub mod input;
pub mod model;
pub mod scene;
pub mod utils;

pub use animation::{ParameterBuffer, ParameterId, Priority};
pub use assets::{AssetReaderVariant, MemoryAssetReader, TextureCache, TextureHandle};
pub use backend::{GpuContext, GpuTextureId, MeshRenderer, PhysicsRig, PoseRig, PuppetBackend, PuppetMesh};
pub use config::{LoaderConfig, SceneConfig, StageConfig, ViewportConfig};
pub use errors::{PuppetError, Result};
pub use input::{PointerInput, ViewMatrix};
pub use model::{LoadStage, Model, ModelEvent, ModelHandle};
pub use scene::{SceneManager, StageEvent};
pub use utils::interner;
