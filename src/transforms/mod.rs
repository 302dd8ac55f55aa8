//! Composable preprocessing transforms.
//!
//! ```text
//! transforms/
//! ├── core.rs       → the `Transform<I, O>` trait and static chaining
//! ├── pipeline.rs   → `ImagePipeline`, the inspectable image→tensor pipeline
//! └── vision/       → the individual image and tensor operations
//! ```

pub mod core;
pub mod pipeline;
pub mod vision;

pub use self::core::{Chain, Transform};
pub use pipeline::{ImagePipeline, ImageStage, TensorStage};
