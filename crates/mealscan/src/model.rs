//! Core domain types for mealscan.
//!
//! Meals belong to a user, carry a list of ingredients and at most one
//! nutrition row. Stored nutrition values describe one serving; the meal's
//! `quantity` multiplies them for display and for daily totals.

use std::fmt;
use std::ops::{Add, AddAssign};
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, NaiveTime, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Lowest daily calorie goal the profile calculation will suggest.
pub const MIN_CALORIE_GOAL: u32 = 1200;

/// Calories, protein, carbohydrates and fat.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Macros {
    /// Energy in kcal.
    pub calories: f64,
    /// Protein in grams.
    pub protein_g: f64,
    /// Carbohydrates in grams.
    pub carbs_g: f64,
    /// Fat in grams.
    pub fat_g: f64,
}

impl Macros {
    /// Create a macro set.
    #[must_use]
    pub fn new(calories: f64, protein_g: f64, carbs_g: f64, fat_g: f64) -> Self {
        Self {
            calories,
            protein_g,
            carbs_g,
            fat_g,
        }
    }

    /// Multiply every value by `factor`.
    #[must_use]
    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            calories: self.calories * factor,
            protein_g: self.protein_g * factor,
            carbs_g: self.carbs_g * factor,
            fat_g: self.fat_g * factor,
        }
    }
}

impl Add for Macros {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            calories: self.calories + rhs.calories,
            protein_g: self.protein_g + rhs.protein_g,
            carbs_g: self.carbs_g + rhs.carbs_g,
            fat_g: self.fat_g + rhs.fat_g,
        }
    }
}

impl AddAssign for Macros {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl std::iter::Sum for Macros {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

/// Aggregate nutrition for one serving of a meal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Nutrition {
    /// Energy and macronutrients.
    #[serde(flatten)]
    pub macros: Macros,
    /// Dietary fiber in grams.
    pub fiber_g: f64,
    /// Sugar in grams.
    pub sugar_g: f64,
    /// Sodium in milligrams.
    pub sodium_mg: f64,
}

impl Nutrition {
    /// Multiply every value by `factor`.
    #[must_use]
    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            macros: self.macros.scaled(factor),
            fiber_g: self.fiber_g * factor,
            sugar_g: self.sugar_g * factor,
            sodium_mg: self.sodium_mg * factor,
        }
    }
}

/// Time-of-day bucket a meal is filed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MealType {
    /// 04:00 to 10:59.
    Breakfast,
    /// 11:00 to 15:59.
    Lunch,
    /// 16:00 to 21:59.
    Dinner,
    /// Anything else.
    Snack,
}

impl MealType {
    /// All buckets in display order.
    pub const ALL: [MealType; 4] = [Self::Breakfast, Self::Lunch, Self::Dinner, Self::Snack];

    /// Pick the bucket for a local time of day.
    #[must_use]
    pub fn from_time(time: NaiveTime) -> Self {
        match time.hour() {
            4..=10 => Self::Breakfast,
            11..=15 => Self::Lunch,
            16..=21 => Self::Dinner,
            _ => Self::Snack,
        }
    }

    /// Storage and CLI name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Breakfast => "breakfast",
            Self::Lunch => "lunch",
            Self::Dinner => "dinner",
            Self::Snack => "snack",
        }
    }
}

impl fmt::Display for MealType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for MealType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "breakfast" => Ok(Self::Breakfast),
            "lunch" => Ok(Self::Lunch),
            "dinner" => Ok(Self::Dinner),
            "snack" => Ok(Self::Snack),
            other => Err(Error::invalid_input(format!("unknown meal type '{other}'"))),
        }
    }
}

/// Letter grade for how healthy a meal is, `A` best.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum HealthGrade {
    /// Excellent.
    A,
    /// Good.
    B,
    /// Fair.
    C,
    /// Poor.
    D,
    /// Bad.
    E,
}

impl HealthGrade {
    /// Parse a grade leniently.
    ///
    /// A bare letter (`"b"`, `"B+"`) is read case-insensitively. Longer text
    /// such as `"Grade: A"` is searched for a standalone capital letter.
    /// `F` is folded into `E`. Words like `"Excellent"` are not grades and
    /// give `None`.
    #[must_use]
    pub fn parse_lenient(s: &str) -> Option<Self> {
        let trimmed = s.trim();
        if let Some(letter) = single_letter(trimmed) {
            return Self::from_letter(letter.to_ascii_uppercase());
        }
        trimmed
            .split(|c: char| !(c.is_ascii_alphanumeric() || c == '+' || c == '-'))
            .filter_map(single_letter)
            .filter(char::is_ascii_uppercase)
            .find_map(Self::from_letter)
    }

    fn from_letter(letter: char) -> Option<Self> {
        match letter {
            'A' => Some(Self::A),
            'B' => Some(Self::B),
            'C' => Some(Self::C),
            'D' => Some(Self::D),
            'E' | 'F' => Some(Self::E),
            _ => None,
        }
    }

    /// The grade as a single letter.
    #[must_use]
    pub fn as_char(&self) -> char {
        match self {
            Self::A => 'A',
            Self::B => 'B',
            Self::C => 'C',
            Self::D => 'D',
            Self::E => 'E',
        }
    }
}

/// The letter of a one-letter token, allowing a trailing `+` or `-`.
fn single_letter(token: &str) -> Option<char> {
    let token = token.strip_suffix(['+', '-']).unwrap_or(token);
    let mut chars = token.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii_alphabetic() => Some(c),
        _ => None,
    }
}

impl fmt::Display for HealthGrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// One ingredient of a meal, with its share of the meal's macros.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ingredient {
    /// Row id (assigned by storage).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    /// Owning meal (assigned by storage).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meal_id: Option<i64>,
    /// Display name.
    pub name: String,
    /// Estimated amount in `unit`.
    pub amount: f64,
    /// Unit of `amount`, usually `g`.
    pub unit: String,
    /// Macros for `amount`.
    #[serde(flatten)]
    pub macros: Macros,
}

impl Ingredient {
    /// Create an ingredient that has not been stored yet.
    #[must_use]
    pub fn new(name: impl Into<String>, amount: f64, unit: impl Into<String>, macros: Macros) -> Self {
        Self {
            id: None,
            meal_id: None,
            name: name.into(),
            amount,
            unit: unit.into(),
            macros,
        }
    }

    /// Return a copy with `amount` changed and macros rescaled to match.
    ///
    /// # Errors
    ///
    /// Returns an error if `amount` is not a positive finite number, or if
    /// this ingredient has no positive amount to scale from.
    pub fn with_amount(&self, amount: f64) -> Result<Self> {
        validate_positive("amount", amount)?;
        if !(self.amount.is_finite() && self.amount > 0.0) {
            return Err(Error::invalid_input(format!(
                "ingredient '{}' has no amount to scale from",
                self.name
            )));
        }
        let macros = self.macros.scaled(amount / self.amount);
        Ok(Self {
            amount,
            macros,
            ..self.clone()
        })
    }
}

/// A stored meal, without its ingredients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Meal {
    /// Row id.
    pub id: i64,
    /// Owner.
    pub user_id: i64,
    /// Display name.
    pub name: String,
    /// Time-of-day bucket.
    pub meal_type: MealType,
    /// Local date and time the meal was eaten.
    pub consumed_at: NaiveDateTime,
    /// Servings eaten; multiplies the stored nutrition.
    pub quantity: f64,
    /// Health grade reported by the analysis.
    pub health_grade: Option<HealthGrade>,
    /// Copy of the scanned photo.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_path: Option<PathBuf>,
    /// BLAKE3 hash of the scanned photo.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_hash: Option<String>,
    /// Free-text note.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// When the row was written.
    pub created_at: DateTime<Utc>,
}

/// A meal that is about to be saved.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMeal {
    /// Owner.
    pub user_id: i64,
    /// Display name.
    pub name: String,
    /// Time-of-day bucket.
    pub meal_type: MealType,
    /// Local date and time the meal was eaten.
    pub consumed_at: NaiveDateTime,
    /// Servings eaten.
    pub quantity: f64,
    /// Health grade, if known.
    pub health_grade: Option<HealthGrade>,
    /// Copy of the scanned photo.
    pub image_path: Option<PathBuf>,
    /// BLAKE3 hash of the scanned photo.
    pub image_hash: Option<String>,
    /// Free-text note.
    pub notes: Option<String>,
    /// Ingredients; ids are ignored.
    pub ingredients: Vec<Ingredient>,
    /// Nutrition for one serving.
    pub nutrition: Nutrition,
}

impl NewMeal {
    /// Start a one-serving meal eaten at `consumed_at`, bucketed by time.
    #[must_use]
    pub fn new(user_id: i64, name: impl Into<String>, consumed_at: NaiveDateTime) -> Self {
        Self {
            user_id,
            name: name.into(),
            meal_type: MealType::from_time(consumed_at.time()),
            consumed_at,
            quantity: 1.0,
            health_grade: None,
            image_path: None,
            image_hash: None,
            notes: None,
            ingredients: Vec::new(),
            nutrition: Nutrition::default(),
        }
    }

    /// Check the values that storage relies on.
    ///
    /// # Errors
    ///
    /// Returns an error for an empty name, a non-positive quantity, or an
    /// ingredient whose amount is not a positive finite number.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::invalid_input("meal name must not be empty"));
        }
        validate_positive("quantity", self.quantity)?;
        for ingredient in &self.ingredients {
            if !ingredient.amount.is_finite() || ingredient.amount <= 0.0 {
                return Err(Error::invalid_input(format!(
                    "ingredient '{}' has invalid amount {}",
                    ingredient.name, ingredient.amount
                )));
            }
        }
        Ok(())
    }
}

/// A meal with everything the detail view shows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MealDetail {
    /// The meal row.
    pub meal: Meal,
    /// Its ingredients, in insertion order.
    pub ingredients: Vec<Ingredient>,
    /// Nutrition for one serving, if recorded.
    pub nutrition: Option<Nutrition>,
}

impl MealDetail {
    /// Nutrition multiplied by the meal's quantity.
    #[must_use]
    pub fn displayed_nutrition(&self) -> Nutrition {
        self.nutrition
            .unwrap_or_default()
            .scaled(self.meal.quantity)
    }

    /// Ingredient macros multiplied by the meal's quantity.
    #[must_use]
    pub fn displayed_ingredients(&self) -> Vec<Ingredient> {
        self.ingredients
            .iter()
            .map(|ingredient| Ingredient {
                amount: ingredient.amount * self.meal.quantity,
                macros: ingredient.macros.scaled(self.meal.quantity),
                ..ingredient.clone()
            })
            .collect()
    }
}

/// Biological sex used by the energy-requirement formula.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sex {
    /// Male.
    Male,
    /// Female.
    Female,
    /// Not given; the formula uses the midpoint.
    #[default]
    Unspecified,
}

/// Typical weekly activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityLevel {
    /// Little or no exercise.
    Sedentary,
    /// Exercise 1-3 days a week.
    Light,
    /// Exercise 3-5 days a week.
    #[default]
    Moderate,
    /// Exercise 6-7 days a week.
    Active,
    /// Hard daily exercise or a physical job.
    VeryActive,
}

impl ActivityLevel {
    /// Multiplier applied to basal metabolic rate.
    #[must_use]
    pub fn factor(&self) -> f64 {
        match self {
            Self::Sedentary => 1.2,
            Self::Light => 1.375,
            Self::Moderate => 1.55,
            Self::Active => 1.725,
            Self::VeryActive => 1.9,
        }
    }
}

/// What the user wants their weight to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightGoal {
    /// Calorie deficit of 500 kcal.
    Lose,
    /// No adjustment.
    #[default]
    Maintain,
    /// Calorie surplus of 300 kcal.
    Gain,
}

impl WeightGoal {
    fn adjustment(self) -> f64 {
        match self {
            Self::Lose => -500.0,
            Self::Maintain => 0.0,
            Self::Gain => 300.0,
        }
    }
}

macro_rules! snake_case_enum_str {
    ($ty:ty { $($variant:ident => $name:literal),+ $(,)? }) => {
        impl $ty {
            /// Storage and CLI name.
            #[must_use]
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $name,)+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.pad(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self> {
                match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
                    $($name => Ok(Self::$variant),)+
                    other => Err(Error::invalid_input(format!(
                        concat!("unknown ", stringify!($ty), " '{}'"),
                        other
                    ))),
                }
            }
        }
    };
}

snake_case_enum_str!(Sex { Male => "male", Female => "female", Unspecified => "unspecified" });
snake_case_enum_str!(ActivityLevel {
    Sedentary => "sedentary",
    Light => "light",
    Moderate => "moderate",
    Active => "active",
    VeryActive => "very_active",
});
snake_case_enum_str!(WeightGoal { Lose => "lose", Maintain => "maintain", Gain => "gain" });

/// Profile of the person whose meals are tracked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Row id (assigned by storage).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    /// Display name.
    pub name: String,
    /// Biological sex.
    pub sex: Sex,
    /// Age in years.
    pub age_years: u32,
    /// Height in centimetres.
    pub height_cm: f64,
    /// Weight in kilograms.
    pub weight_kg: f64,
    /// Activity level.
    pub activity: ActivityLevel,
    /// Weight goal.
    pub goal: WeightGoal,
    /// Explicit daily calorie goal, overriding the computed one.
    pub calorie_goal: Option<u32>,
    /// When the profile was created.
    pub created_at: DateTime<Utc>,
}

impl Default for User {
    fn default() -> Self {
        Self {
            id: None,
            name: "Me".to_string(),
            sex: Sex::default(),
            age_years: 30,
            height_cm: 170.0,
            weight_kg: 70.0,
            activity: ActivityLevel::default(),
            goal: WeightGoal::default(),
            calorie_goal: None,
            created_at: Utc::now(),
        }
    }
}

impl User {
    /// Basal metabolic rate in kcal/day (Mifflin-St Jeor).
    #[must_use]
    pub fn basal_metabolic_rate(&self) -> f64 {
        let base = 10.0 * self.weight_kg + 6.25 * self.height_cm - 5.0 * f64::from(self.age_years);
        let sex_offset = match self.sex {
            Sex::Male => 5.0,
            Sex::Female => -161.0,
            Sex::Unspecified => -78.0,
        };
        base + sex_offset
    }

    /// Daily calorie goal: the explicit one if set, otherwise computed from
    /// BMR, activity and weight goal, never below [`MIN_CALORIE_GOAL`].
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn daily_calorie_goal(&self) -> u32 {
        if let Some(goal) = self.calorie_goal {
            return goal;
        }
        let maintenance = self.basal_metabolic_rate() * self.activity.factor();
        let target = (maintenance + self.goal.adjustment()).round();
        if target.is_finite() && target > f64::from(MIN_CALORIE_GOAL) {
            target as u32
        } else {
            MIN_CALORIE_GOAL
        }
    }

    /// Check that the body measurements are plausible.
    ///
    /// # Errors
    ///
    /// Returns an error for an empty name or out-of-range measurements.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::invalid_input("name must not be empty"));
        }
        if !(1..=120).contains(&self.age_years) {
            return Err(Error::invalid_input(format!(
                "age {} is out of range",
                self.age_years
            )));
        }
        validate_positive("height_cm", self.height_cm)?;
        validate_positive("weight_kg", self.weight_kg)?;
        if self.calorie_goal == Some(0) {
            return Err(Error::invalid_input("calorie goal must be positive"));
        }
        Ok(())
    }
}

/// Reject zero, negative and non-finite values.
pub(crate) fn validate_positive(field: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(Error::invalid_input(format!(
            "{field} must be a positive number, got {value}"
        )))
    }
}
