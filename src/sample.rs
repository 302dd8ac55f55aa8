use tch::Tensor;

/// A single classification example: a transformed image tensor (typically
/// `[C, H, W]` float) and its class label.
#[derive(Debug)]
pub struct Sample {
    pub image: Tensor,
    pub label: i64,
}

impl Sample {
    pub fn new(image: Tensor, label: i64) -> Self {
        Self { image, label }
    }
}

/// Shallow clone: the tensor storage is shared, only the handle is copied.
impl Clone for Sample {
    fn clone(&self) -> Self {
        Self {
            image: self.image.shallow_clone(),
            label: self.label,
        }
    }
}

// Safety: `tch::Tensor` is `Send` and immutable access through `&Sample`
// never mutates the underlying storage, so sharing references across
// threads is sound. See the equivalent reasoning in tch's tensor wrapper.
unsafe impl Send for Sample {}
unsafe impl Sync for Sample {}
