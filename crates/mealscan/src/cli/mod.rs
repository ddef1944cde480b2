//! Command-line interface for mealscan.
//!
//! This module provides the CLI structure and text views for the
//! `mealscan` binary.

mod commands;
pub mod render;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{
    ActivityArg, CalendarCommand, ConfigCommand, DayCommand, GoalArg, IngredientCommand,
    JsonFlag, MealCommand, MealTypeArg, ProfileCommand, ProfileUpdate, ScanCommand, SexArg,
    StatusCommand,
};

/// mealscan - Photograph your meals, track your calories
///
/// Sends a photo of a meal to a vision model, stores the estimated
/// ingredients and nutrition locally, and shows daily and monthly totals.
#[derive(Debug, Parser)]
#[command(name = "mealscan")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Analyze a meal photo and log it
    Scan(ScanCommand),

    /// Show today's dashboard
    Today(JsonFlag),

    /// Show the dashboard for a given day
    Day(DayCommand),

    /// Show calories per day for a month
    Calendar(CalendarCommand),

    /// Inspect and edit logged meals
    #[command(subcommand)]
    Meal(MealCommand),

    /// Edit a meal's ingredients
    #[command(subcommand)]
    Ingredient(IngredientCommand),

    /// View or change the profile used for the calorie goal
    #[command(subcommand)]
    Profile(ProfileCommand),

    /// Show database and API status
    Status(StatusCommand),

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> crate::logging::Verbosity {
        if self.quiet {
            crate::logging::Verbosity::Quiet
        } else {
            match self.verbose {
                0 => crate::logging::Verbosity::Normal,
                1 => crate::logging::Verbosity::Verbose,
                _ => crate::logging::Verbosity::Trace,
            }
        }
    }
}
