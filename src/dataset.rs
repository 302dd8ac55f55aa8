//! Folder-backed image-classification datasets.
//!
//! [`ImageFolderDataset`] maps a label-per-subdirectory tree
//! (`root/<class>/<image files>`) to `(image, label)` samples. Scanning
//! happens once at `open`; decoding and preprocessing happen lazily per
//! `get` so the dataset itself stays cheap to clone and share.

use crate::sample::Sample;
use crate::transforms::vision::LoadImage;
use crate::transforms::{ImagePipeline, Transform};
use anyhow::{bail, ensure, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

/// File extensions treated as images, matched case-insensitively.
const IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "bmp", "webp"];

/// Random access over `(image, label)` samples.
///
/// Implementations must be `Send + Sync`; an external loader shares one
/// dataset handle across its worker threads.
pub trait Dataset: Send + Sync {
    /// Number of samples.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Loads and transforms the sample at `index`; `Ok(None)` when the index
    /// is out of bounds.
    fn get(&self, index: usize) -> Result<Option<Sample>>;
}

/// The scanned directory tree: sorted class names and `(path, label)`
/// entries. Shared between a dataset and any subsets carved from it.
#[derive(Debug)]
struct FolderIndex {
    root: PathBuf,
    classes: Vec<String>,
    entries: Vec<(PathBuf, i64)>,
}

impl FolderIndex {
    fn scan(root: &Path) -> Result<Self> {
        let metadata = fs::metadata(root)
            .with_context(|| format!("failed to access dataset directory: {}", root.display()))?;
        ensure!(
            metadata.is_dir(),
            "dataset path is not a directory: {}",
            root.display()
        );

        // Class names are the sorted immediate subdirectories; labels are
        // their positions in that order.
        let mut classes = Vec::new();
        for entry in fs::read_dir(root)
            .with_context(|| format!("failed to list dataset directory: {}", root.display()))?
        {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                classes.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        classes.sort();
        if classes.is_empty() {
            bail!("no class directories under {}", root.display());
        }

        let mut entries = Vec::new();
        for (label, class) in classes.iter().enumerate() {
            let class_dir = root.join(class);
            let mut files: Vec<PathBuf> = WalkDir::new(&class_dir)
                .into_iter()
                .filter_map(|entry| entry.ok())
                .filter(|entry| entry.file_type().is_file())
                .map(|entry| entry.into_path())
                .filter(|path| is_image_file(path))
                .collect();
            files.sort();
            entries.extend(files.into_iter().map(|path| (path, label as i64)));
        }
        if entries.is_empty() {
            bail!("no image files under {}", root.display());
        }

        Ok(Self {
            root: root.to_path_buf(),
            classes,
            entries,
        })
    }
}

fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            let ext = ext.to_lowercase();
            IMAGE_EXTENSIONS.contains(&ext.as_str())
        })
}

/// A label-per-subdirectory image dataset with a preprocessing pipeline.
///
/// `subset` produces views that share the scanned index, so carving a
/// holdout split never re-reads the filesystem.
#[derive(Clone)]
pub struct ImageFolderDataset {
    index: Arc<FolderIndex>,
    /// Present on subset views: positions into the shared index.
    indices: Option<Arc<Vec<usize>>>,
    pipeline: Arc<ImagePipeline>,
    loader: LoadImage,
}

impl ImageFolderDataset {
    /// Scans `root` and builds a dataset applying `pipeline` on access.
    pub fn open(root: impl AsRef<Path>, pipeline: ImagePipeline) -> Result<Self> {
        let index = FolderIndex::scan(root.as_ref())?;
        log::debug!(
            "indexed {} images across {} classes under {}",
            index.entries.len(),
            index.classes.len(),
            index.root.display()
        );
        Ok(Self {
            index: Arc::new(index),
            indices: None,
            pipeline: Arc::new(pipeline),
            loader: LoadImage::new(),
        })
    }

    /// A view over `indices` of this dataset, with its own pipeline.
    /// Indices refer to positions in `self` (not in the underlying index),
    /// so subsetting composes.
    pub fn subset(&self, indices: Vec<usize>, pipeline: ImagePipeline) -> Self {
        let resolved = match &self.indices {
            Some(existing) => indices.iter().map(|&i| existing[i]).collect(),
            None => indices,
        };
        Self {
            index: Arc::clone(&self.index),
            indices: Some(Arc::new(resolved)),
            pipeline: Arc::new(pipeline),
            loader: LoadImage::new(),
        }
    }

    /// Sorted class names; a sample's label is its class position here.
    pub fn classes(&self) -> &[String] {
        &self.index.classes
    }

    pub fn root(&self) -> &Path {
        &self.index.root
    }

    /// The pipeline applied to samples on access.
    pub fn pipeline(&self) -> &ImagePipeline {
        &self.pipeline
    }

    /// Path and label of the entry at `index`, without loading the image.
    pub fn entry(&self, index: usize) -> Option<(&Path, i64)> {
        let position = match &self.indices {
            Some(indices) => *indices.get(index)?,
            None => index,
        };
        self.index
            .entries
            .get(position)
            .map(|(path, label)| (path.as_path(), *label))
    }
}

impl Dataset for ImageFolderDataset {
    fn len(&self) -> usize {
        match &self.indices {
            Some(indices) => indices.len(),
            None => self.index.entries.len(),
        }
    }

    fn get(&self, index: usize) -> Result<Option<Sample>> {
        let Some((path, label)) = self.entry(index) else {
            return Ok(None);
        };
        let path = path.to_path_buf();
        let image = self
            .loader
            .apply(path.clone())
            .with_context(|| format!("failed to load image: {}", path.display()))?;
        let tensor = self
            .pipeline
            .apply(image)
            .with_context(|| format!("failed to transform image: {}", path.display()))?;
        Ok(Some(Sample::new(tensor, label)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transforms::pipeline::{ImageStage, TensorStage};
    use crate::transforms::vision::{CenterCrop, Interpolation, Normalize, Resize};
    use image::{Rgb, RgbImage};
    use tempfile::TempDir;

    fn eval_pipeline(size: u32) -> ImagePipeline {
        ImagePipeline::new(
            vec![
                ImageStage::Resize(
                    Resize::new(size, Interpolation::Fixed(image::imageops::FilterType::Nearest))
                        .unwrap(),
                ),
                ImageStage::CenterCrop(CenterCrop::new(size).unwrap()),
            ],
            vec![TensorStage::Normalize(Normalize::imagenet())],
        )
    }

    fn write_class_tree(root: &Path, classes: &[(&str, usize)]) {
        for (class, count) in classes {
            let dir = root.join(class);
            fs::create_dir_all(&dir).unwrap();
            for i in 0..*count {
                let img = RgbImage::from_pixel(10, 10, Rgb([(i * 40) as u8, 80, 160]));
                img.save(dir.join(format!("img_{i}.png"))).unwrap();
            }
        }
    }

    #[test]
    fn test_scan_orders_classes_and_labels() -> Result<()> {
        let dir = TempDir::new()?;
        write_class_tree(dir.path(), &[("wolf", 2), ("ant", 1), ("heron", 1)]);

        let dataset = ImageFolderDataset::open(dir.path(), eval_pipeline(8))?;
        assert_eq!(dataset.classes(), &["ant", "heron", "wolf"]);
        assert_eq!(dataset.len(), 4);

        // Entries follow sorted class order: ant(0), heron(1), wolf(2).
        assert_eq!(dataset.entry(0).unwrap().1, 0);
        assert_eq!(dataset.entry(1).unwrap().1, 1);
        assert_eq!(dataset.entry(2).unwrap().1, 2);
        assert_eq!(dataset.entry(3).unwrap().1, 2);
        Ok(())
    }

    #[test]
    fn test_get_loads_and_transforms() -> Result<()> {
        let dir = TempDir::new()?;
        write_class_tree(dir.path(), &[("cat", 1)]);

        let dataset = ImageFolderDataset::open(dir.path(), eval_pipeline(8))?;
        let sample = dataset.get(0)?.expect("index 0 exists");
        assert_eq!(sample.image.size(), vec![3, 8, 8]);
        assert_eq!(sample.label, 0);

        assert!(dataset.get(99)?.is_none());
        Ok(())
    }

    #[test]
    fn test_subset_shares_index_and_composes() -> Result<()> {
        let dir = TempDir::new()?;
        write_class_tree(dir.path(), &[("a", 2), ("b", 2)]);

        let dataset = ImageFolderDataset::open(dir.path(), eval_pipeline(8))?;
        let first = dataset.subset(vec![1, 2, 3], eval_pipeline(8));
        assert_eq!(first.len(), 3);
        assert_eq!(first.entry(0).unwrap().1, 0); // original index 1: class "a"
        assert_eq!(first.entry(1).unwrap().1, 1); // original index 2: class "b"

        // Subsetting a subset resolves through to the original entries.
        let second = first.subset(vec![2], eval_pipeline(8));
        assert_eq!(second.len(), 1);
        assert_eq!(second.entry(0).unwrap().1, 1); // original index 3
        Ok(())
    }

    #[test]
    fn test_missing_directory_propagates() {
        let result = ImageFolderDataset::open("/definitely/not/here", eval_pipeline(8));
        assert!(result.is_err());
    }

    #[test]
    fn test_non_image_files_are_skipped() -> Result<()> {
        let dir = TempDir::new()?;
        write_class_tree(dir.path(), &[("a", 1)]);
        fs::write(dir.path().join("a").join("notes.txt"), "not an image")?;

        let dataset = ImageFolderDataset::open(dir.path(), eval_pipeline(8))?;
        assert_eq!(dataset.len(), 1);
        Ok(())
    }
}
