//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use chrono::{Duration, Local, NaiveDate, NaiveDateTime, NaiveTime};
use clap::{Args, Subcommand, ValueEnum};

use crate::model::{ActivityLevel, MealType, Sex, WeightGoal};

/// Scan command arguments.
#[derive(Debug, Args)]
pub struct ScanCommand {
    /// Photo of the meal (JPEG, PNG, GIF or WebP)
    pub image: PathBuf,

    /// When the meal was eaten ("2024-06-03 12:30", or "12:30" for today)
    #[arg(long, value_parser = parse_datetime_arg)]
    pub at: Option<NaiveDateTime>,

    /// Override the meal type derived from the time
    #[arg(short = 't', long, value_enum)]
    pub meal_type: Option<MealTypeArg>,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Arguments shared by commands that only need an output switch.
#[derive(Debug, Args)]
pub struct JsonFlag {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Day dashboard arguments.
#[derive(Debug, Args)]
pub struct DayCommand {
    /// The day: YYYY-MM-DD, "today" or "yesterday"
    #[arg(value_parser = parse_date_arg)]
    pub date: NaiveDate,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Calendar history arguments.
#[derive(Debug, Args)]
pub struct CalendarCommand {
    /// Month to show as YYYY-MM (defaults to the current month)
    #[arg(short, long)]
    pub month: Option<String>,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Meal commands.
#[derive(Debug, Subcommand)]
pub enum MealCommand {
    /// Show a meal with its ingredients and nutrition
    Show {
        /// Meal id
        id: i64,
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// List recent meals
    List {
        /// Maximum number of meals
        #[arg(short, long, default_value = "20")]
        limit: usize,
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Search meals by name, note or ingredient
    Search {
        /// Text to look for
        query: String,
        /// Maximum number of results
        #[arg(short, long, default_value = "20")]
        limit: usize,
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Rename a meal
    Rename {
        /// Meal id
        id: i64,
        /// New name
        name: String,
    },

    /// Set how many servings were eaten
    Quantity {
        /// Meal id
        id: i64,
        /// Servings, e.g. 0.5 or 2
        servings: f64,
    },

    /// Change the meal type
    Type {
        /// Meal id
        id: i64,
        /// New meal type
        #[arg(value_enum)]
        meal_type: MealTypeArg,
    },

    /// Change when the meal was eaten
    Time {
        /// Meal id
        id: i64,
        /// New time ("2024-06-03 12:30", or "12:30" for today)
        #[arg(value_parser = parse_datetime_arg)]
        at: NaiveDateTime,
    },

    /// Attach a note to a meal (omit the text to clear it)
    Note {
        /// Meal id
        id: i64,
        /// Note text
        text: Option<String>,
    },

    /// Delete a meal and its ingredients
    Delete {
        /// Meal id
        id: i64,
    },
}

/// Ingredient commands.
#[derive(Debug, Subcommand)]
pub enum IngredientCommand {
    /// Change an ingredient's amount; its macros and the meal totals follow
    Amount {
        /// Ingredient id
        id: i64,
        /// New amount, in the ingredient's unit
        amount: f64,
    },

    /// Remove an ingredient from its meal
    Delete {
        /// Ingredient id
        id: i64,
    },
}

/// Profile commands.
#[derive(Debug, Subcommand)]
pub enum ProfileCommand {
    /// Show the profile and daily calorie goal
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Update profile fields
    Set(ProfileUpdate),
}

/// Profile fields to change. Unset fields keep their value.
#[derive(Debug, Default, Args)]
pub struct ProfileUpdate {
    /// Display name
    #[arg(long)]
    pub name: Option<String>,

    /// Sex, used for the metabolic rate estimate
    #[arg(long, value_enum)]
    pub sex: Option<SexArg>,

    /// Age in years
    #[arg(long)]
    pub age: Option<u32>,

    /// Height in centimetres
    #[arg(long)]
    pub height: Option<f64>,

    /// Weight in kilograms
    #[arg(long)]
    pub weight: Option<f64>,

    /// Activity level
    #[arg(long, value_enum)]
    pub activity: Option<ActivityArg>,

    /// Weight goal
    #[arg(long, value_enum)]
    pub goal: Option<GoalArg>,

    /// Fixed daily calorie goal, replacing the computed one
    #[arg(long, conflicts_with = "auto_goal")]
    pub calorie_goal: Option<u32>,

    /// Go back to the computed daily calorie goal
    #[arg(long)]
    pub auto_goal: bool,
}

/// Status command arguments.
#[derive(Debug, Args)]
pub struct StatusCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

/// Meal type argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MealTypeArg {
    /// 04:00-10:59
    Breakfast,
    /// 11:00-15:59
    Lunch,
    /// 16:00-21:59
    Dinner,
    /// Any other time
    Snack,
}

impl From<MealTypeArg> for MealType {
    fn from(arg: MealTypeArg) -> Self {
        match arg {
            MealTypeArg::Breakfast => Self::Breakfast,
            MealTypeArg::Lunch => Self::Lunch,
            MealTypeArg::Dinner => Self::Dinner,
            MealTypeArg::Snack => Self::Snack,
        }
    }
}

/// Sex argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SexArg {
    /// Male
    Male,
    /// Female
    Female,
    /// Not specified
    Unspecified,
}

impl From<SexArg> for Sex {
    fn from(arg: SexArg) -> Self {
        match arg {
            SexArg::Male => Self::Male,
            SexArg::Female => Self::Female,
            SexArg::Unspecified => Self::Unspecified,
        }
    }
}

/// Activity level argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ActivityArg {
    /// Little or no exercise
    Sedentary,
    /// Exercise 1-3 days a week
    Light,
    /// Exercise 3-5 days a week
    Moderate,
    /// Exercise 6-7 days a week
    Active,
    /// Hard daily exercise or a physical job
    VeryActive,
}

impl From<ActivityArg> for ActivityLevel {
    fn from(arg: ActivityArg) -> Self {
        match arg {
            ActivityArg::Sedentary => Self::Sedentary,
            ActivityArg::Light => Self::Light,
            ActivityArg::Moderate => Self::Moderate,
            ActivityArg::Active => Self::Active,
            ActivityArg::VeryActive => Self::VeryActive,
        }
    }
}

/// Weight goal argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum GoalArg {
    /// Lose weight
    Lose,
    /// Keep the current weight
    Maintain,
    /// Gain weight
    Gain,
}

impl From<GoalArg> for WeightGoal {
    fn from(arg: GoalArg) -> Self {
        match arg {
            GoalArg::Lose => Self::Lose,
            GoalArg::Maintain => Self::Maintain,
            GoalArg::Gain => Self::Gain,
        }
    }
}

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%dT%H:%M:%S",
];

/// Parse a local date-time, or a bare time meaning today.
fn parse_datetime_arg(value: &str) -> Result<NaiveDateTime, String> {
    let value = value.trim();
    if let Some(parsed) = DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
    {
        return Ok(parsed);
    }
    ["%H:%M", "%H:%M:%S"]
        .iter()
        .find_map(|format| NaiveTime::parse_from_str(value, format).ok())
        .map(|time| Local::now().date_naive().and_time(time))
        .ok_or_else(|| format!("'{value}' is not a date-time like 2024-06-03 12:30 or a time like 12:30"))
}

/// Parse a date, accepting `today` and `yesterday`.
fn parse_date_arg(value: &str) -> Result<NaiveDate, String> {
    let today = Local::now().date_naive();
    match value.trim().to_ascii_lowercase().as_str() {
        "today" => Ok(today),
        "yesterday" => Ok(today - Duration::days(1)),
        other => NaiveDate::parse_from_str(other, "%Y-%m-%d")
            .map_err(|_| format!("'{value}' is not a date like 2024-06-03")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meal_type_arg_conversion() {
        assert_eq!(MealType::from(MealTypeArg::Breakfast), MealType::Breakfast);
        assert_eq!(MealType::from(MealTypeArg::Lunch), MealType::Lunch);
        assert_eq!(MealType::from(MealTypeArg::Dinner), MealType::Dinner);
        assert_eq!(MealType::from(MealTypeArg::Snack), MealType::Snack);
    }

    #[test]
    fn test_profile_arg_conversion() {
        assert_eq!(Sex::from(SexArg::Female), Sex::Female);
        assert_eq!(
            ActivityLevel::from(ActivityArg::VeryActive),
            ActivityLevel::VeryActive
        );
        assert_eq!(WeightGoal::from(GoalArg::Gain), WeightGoal::Gain);
    }

    #[test]
    fn test_parse_datetime_arg() {
        let expected = NaiveDate::from_ymd_opt(2024, 6, 3)
            .unwrap()
            .and_hms_opt(12, 30, 0)
            .unwrap();
        assert_eq!(parse_datetime_arg("2024-06-03 12:30"), Ok(expected));
        assert_eq!(parse_datetime_arg("2024-06-03T12:30:00"), Ok(expected));

        let today = parse_datetime_arg("07:45").unwrap();
        assert_eq!(today.time(), NaiveTime::from_hms_opt(7, 45, 0).unwrap());

        assert!(parse_datetime_arg("lunchtime").is_err());
    }

    #[test]
    fn test_parse_date_arg() {
        assert_eq!(
            parse_date_arg("2024-02-29"),
            Ok(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap())
        );
        assert_eq!(parse_date_arg("Today"), Ok(Local::now().date_naive()));
        assert!(parse_date_arg("2023-02-29").is_err());
    }

    #[test]
    fn test_profile_update_default_is_empty() {
        let update = ProfileUpdate::default();
        assert!(update.name.is_none());
        assert!(!update.auto_goal);
    }

    #[test]
    fn test_config_command_debug() {
        let cmd = ConfigCommand::Show { json: false };
        let debug_str = format!("{cmd:?}");
        assert!(debug_str.contains("Show"));
    }
}
