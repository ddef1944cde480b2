//! Photo analysis.
//!
//! A [`MealAnalyzer`] turns a [`MealImage`] into a [`MealAnalysis`]: the
//! meal's name, its ingredients with estimated macros, aggregate nutrition
//! and a health grade. [`OpenAiAnalyzer`] implements this against an
//! OpenAI-compatible chat-completions endpoint.

mod image;
mod openai;
mod response;

use async_trait::async_trait;

pub use image::MealImage;
pub use openai::OpenAiAnalyzer;
pub use response::{parse_analysis, AnalyzedIngredient, AnalyzedNutrition, MealAnalysis};

use crate::error::Result;

/// Something that can estimate the nutrition of a photographed meal.
#[async_trait]
pub trait MealAnalyzer: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Analyze one photo.
    ///
    /// Dropping the returned future cancels the request.
    ///
    /// # Errors
    ///
    /// Returns an error if the service cannot be reached, answers with an
    /// error, or the answer cannot be parsed or rejects the photo.
    async fn analyze(&self, image: &MealImage) -> Result<MealAnalysis>;
}
