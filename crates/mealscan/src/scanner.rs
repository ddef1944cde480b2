//! Photo to saved meal.

use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime};
use tracing::{debug, info, warn};

use crate::analysis::{MealAnalyzer, MealImage};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::model::{MealDetail, MealType};
use crate::storage::Storage;

/// Overrides for a single scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanOptions {
    /// When the meal was eaten. Defaults to now.
    pub consumed_at: Option<NaiveDateTime>,
    /// Meal type. Defaults to the bucket of `consumed_at`.
    pub meal_type: Option<MealType>,
}

/// Runs a photo through an analyzer and stores the result.
#[derive(Debug)]
pub struct Scanner<'a, A> {
    storage: &'a Storage,
    analyzer: A,
    image_dir: PathBuf,
    keep_images: bool,
    max_image_bytes: u64,
}

impl<'a, A: MealAnalyzer> Scanner<'a, A> {
    /// Create a scanner using the image settings from `config`.
    #[must_use]
    pub fn new(storage: &'a Storage, analyzer: A, config: &Config) -> Self {
        Self {
            storage,
            analyzer,
            image_dir: config.image_dir(),
            keep_images: config.scan.keep_images,
            max_image_bytes: config.scan.max_image_bytes,
        }
    }

    /// Analyze the photo at `path` and save it as a meal of the active user.
    ///
    /// Nothing is written when the analysis fails. A photo copy made for a
    /// meal that then fails to save is removed again.
    ///
    /// # Errors
    ///
    /// Returns an error if the photo cannot be read, the analysis fails or
    /// is rejected, or the meal cannot be stored.
    pub async fn scan(&self, path: &Path, options: ScanOptions) -> Result<MealDetail> {
        let image = MealImage::load(path, self.max_image_bytes)?;
        if let Some(previous) = self.storage.find_meal_by_image_hash(&image.hash)? {
            warn!(
                "{} was already scanned as meal {} ('{}')",
                path.display(),
                previous.id,
                previous.name
            );
        }

        debug!("Analyzing with {}", self.analyzer.name());
        let analysis = self.analyzer.analyze(&image).await?;

        let user = self.storage.active_user()?;
        let user_id = user
            .id
            .ok_or_else(|| Error::internal("active user has no id"))?;
        let consumed_at = options
            .consumed_at
            .unwrap_or_else(|| Local::now().naive_local());

        let mut meal = analysis.into_new_meal(user_id, consumed_at, options.meal_type);
        let mut written = None;
        if self.keep_images {
            let (target, is_new) = self.store_image(&image)?;
            if is_new {
                written = Some(target.clone());
            }
            meal.image_path = Some(target);
        }
        meal.image_hash = Some(image.hash.clone());

        let detail = match self.storage.save_meal(&meal) {
            Ok(detail) => detail,
            Err(e) => {
                if let Some(target) = written {
                    remove_image(&target);
                }
                return Err(e);
            }
        };
        info!(
            "Saved meal {} '{}' ({:.0} kcal)",
            detail.meal.id,
            detail.meal.name,
            detail.displayed_nutrition().macros.calories
        );
        Ok(detail)
    }

    /// Copy the photo into the image directory as `<hash>.<ext>`.
    ///
    /// Returns the path and whether the file was written by this call.
    fn store_image(&self, image: &MealImage) -> Result<(PathBuf, bool)> {
        std::fs::create_dir_all(&self.image_dir).map_err(|e| Error::DirectoryCreate {
            path: self.image_dir.clone(),
            source: e,
        })?;
        let target = self
            .image_dir
            .join(format!("{}.{}", image.hash, image.extension()));
        if target.exists() {
            debug!("Image already stored at {}", target.display());
            return Ok((target, false));
        }
        std::fs::write(&target, &image.bytes)?;
        debug!("Stored image at {}", target.display());
        Ok((target, true))
    }
}

/// Remove an image copy whose meal could not be saved.
fn remove_image(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => debug!("Removed unused image {}", path.display()),
        Err(e) => warn!("Failed to remove unused image {}: {}", path.display(), e),
    }
}
