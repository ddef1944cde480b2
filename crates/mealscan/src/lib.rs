//! `mealscan` - Photo-based meal scanner and calorie tracker
//!
//! This library analyzes meal photos with a vision model, stores the
//! resulting ingredients and nutrition in a local SQLite database, and
//! aggregates them into daily and monthly dashboards.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod analysis;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;
pub mod scanner;
pub mod storage;
pub mod summary;

pub use analysis::{MealAnalysis, MealAnalyzer, MealImage, OpenAiAnalyzer};
pub use config::Config;
pub use error::{Error, Result};
pub use logging::init_logging;
pub use model::{Ingredient, Meal, MealDetail, MealType, NewMeal, Nutrition, User};
pub use scanner::{ScanOptions, Scanner};
pub use storage::{Storage, StorageStats};
pub use summary::{CalendarMonth, DailySummary};
