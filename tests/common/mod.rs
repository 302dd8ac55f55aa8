use image::{Rgb, RgbImage};
use std::fs;
use std::path::Path;

/// Writes a label-per-subdirectory image tree: for each `(class, count)`
/// pair, `count` small PNG files under `root/<class>/`.
pub fn write_class_tree(root: &Path, classes: &[(&str, usize)]) {
    for (class, count) in classes {
        let dir = root.join(class);
        fs::create_dir_all(&dir).unwrap();
        for i in 0..*count {
            let shade = (40 + i * 30 % 200) as u8;
            let img = RgbImage::from_pixel(12, 10, Rgb([shade, 120, 200]));
            img.save(dir.join(format!("{class}_{i}.png"))).unwrap();
        }
    }
}

/// Collects the `(path, label)` entries of a dataset in index order.
pub fn collect_entries(dataset: &data_provider::ImageFolderDataset) -> Vec<(String, i64)> {
    use data_provider::Dataset;
    (0..dataset.len())
        .map(|i| {
            let (path, label) = dataset.entry(i).unwrap();
            (path.display().to_string(), label)
        })
        .collect()
}
