//! Folder-per-class chest X-ray dataset plumbing.

use burn::data::dataset::vision::ImageFolderDataset;
use image::imageops::FilterType;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use std::path::{Path, PathBuf};

/// Class folders expected under the dataset root.
pub const CLASSES: [&str; 3] = ["COVID19", "NORMAL", "PNEUMONIA"];

/// Edge size of the model input.
pub const IMAGE_SIZE: usize = 150;

/// Resize the source tree into a uniform RGB cache tree.
///
/// Images already present in the cache are skipped, so repeated runs
/// only pay for new files.
pub fn prepare_resized_root(
    source_root: &Path,
    resized_root: &Path,
) -> anyhow::Result<()> {
    for class in CLASSES {
        let source_dir = source_root.join(class);
        let resized_dir = resized_root.join(class);
        std::fs::create_dir_all(&resized_dir)?;

        for entry in std::fs::read_dir(&source_dir)? {
            let source = entry?.path();
            if !source.is_file() {
                continue;
            }

            let resized = resized_dir
                .join(source.file_name().unwrap())
                .with_extension("png");
            if resized.exists() {
                continue;
            }

            image::open(&source)?
                .resize_exact(IMAGE_SIZE as u32, IMAGE_SIZE as u32, FilterType::Triangle)
                .to_rgb8()
                .save(&resized)?;
        }
    }

    Ok(())
}

/// Seeded train/validation split over a folder-per-class tree.
pub trait XrayLoader: Sized {
    /// Split the tree under `root` into train and validation datasets.
    fn xray_train_val_split(
        root: &Path,
        train_percentage: u8,
        seed: u64,
    ) -> anyhow::Result<(Self, Self)>;
}

impl XrayLoader for ImageFolderDataset {
    fn xray_train_val_split(
        root: &Path,
        train_percentage: u8,
        seed: u64,
    ) -> anyhow::Result<(Self, Self)> {
        let mut items: Vec<(PathBuf, String)> = Vec::new();
        for class in CLASSES {
            for entry in std::fs::read_dir(root.join(class))? {
                let path = entry?.path();
                if path.is_file() {
                    items.push((path, class.to_string()));
                }
            }
        }

        let mut rng = StdRng::seed_from_u64(seed);
        items.shuffle(&mut rng);

        let split = items.len() * train_percentage as usize / 100;
        let valid_items = items.split_off(split);

        let classes = CLASSES.map(|class| class.to_string());

        Ok((
            Self::new_classification_with_items(items, &classes)
                .map_err(|error| anyhow::anyhow!("train split: {error:?}"))?,
            Self::new_classification_with_items(valid_items, &classes)
                .map_err(|error| anyhow::anyhow!("validation split: {error:?}"))?,
        ))
    }
}
