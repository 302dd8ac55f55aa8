//! Image and tensor operations the provider assembles into pipelines.
//!
//! ```text
//! transforms/vision/
//! ├── geometric.rs     → resize, center crop, random-resized crop
//! ├── photometric.rs   → normalization
//! ├── conversion.rs    → image → tensor
//! ├── augmentation.rs  → flip, RandAugment, random erasing
//! └── io.rs            → image decoding
//! ```

pub mod augmentation;
pub mod conversion;
pub mod geometric;
pub mod io;
pub mod photometric;

pub use augmentation::{RandAugment, RandomErasing, RandomHorizontalFlip};
pub use conversion::ToTensor;
pub use geometric::{CenterCrop, Interpolation, RandomResizedCrop, Resize};
pub use io::LoadImage;
pub use photometric::Normalize;
