//! Dashboard aggregation.
//!
//! Turns stored meals into the numbers the dashboard shows: totals for a
//! day, calories per time-of-day bucket, and a per-day calendar for a month.
//! Every total here already has each meal's quantity applied.

use std::collections::BTreeMap;

use chrono::{Datelike, Months, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{Macros, MealDetail, MealType};

/// One line of the daily meal list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MealLine {
    /// Meal id.
    pub id: i64,
    /// Meal name.
    pub name: String,
    /// Bucket.
    pub meal_type: MealType,
    /// Time of day, `HH:MM`.
    pub time: String,
    /// Calories with quantity applied.
    pub calories: f64,
}

/// Totals for a single day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySummary {
    /// The day.
    pub date: NaiveDate,
    /// Sum over all meals.
    pub totals: Macros,
    /// Calories per bucket; every bucket is present.
    pub calories_by_meal_type: BTreeMap<MealType, f64>,
    /// Number of meals logged.
    pub meal_count: usize,
    /// Target for the day.
    pub calorie_goal: u32,
    /// Goal minus eaten calories; negative when over.
    pub remaining_calories: f64,
    /// Meals in time order.
    pub meals: Vec<MealLine>,
}

impl DailySummary {
    /// Share of the calorie goal eaten so far, `0.0` when no goal.
    #[must_use]
    pub fn progress(&self) -> f64 {
        if self.calorie_goal == 0 {
            0.0
        } else {
            self.totals.calories / f64::from(self.calorie_goal)
        }
    }
}

/// Summarize the meals eaten on `date`.
///
/// Meals dated on other days are ignored, so callers may pass a wider
/// window.
#[must_use]
pub fn summarize_day(date: NaiveDate, meals: &[MealDetail], calorie_goal: u32) -> DailySummary {
    let mut calories_by_meal_type: BTreeMap<MealType, f64> =
        MealType::ALL.iter().map(|t| (*t, 0.0)).collect();
    let mut totals = Macros::default();
    let mut lines = Vec::new();

    for detail in meals.iter().filter(|d| d.meal.consumed_at.date() == date) {
        let macros = detail.displayed_nutrition().macros;
        totals += macros;
        *calories_by_meal_type
            .entry(detail.meal.meal_type)
            .or_insert(0.0) += macros.calories;
        lines.push(MealLine {
            id: detail.meal.id,
            name: detail.meal.name.clone(),
            meal_type: detail.meal.meal_type,
            time: detail.meal.consumed_at.format("%H:%M").to_string(),
            calories: macros.calories,
        });
    }
    lines.sort_by(|a, b| a.time.cmp(&b.time).then(a.id.cmp(&b.id)));

    DailySummary {
        date,
        totals,
        calories_by_meal_type,
        meal_count: lines.len(),
        calorie_goal,
        remaining_calories: f64::from(calorie_goal) - totals.calories,
        meals: lines,
    }
}

/// One cell of the calendar history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarDay {
    /// The day.
    pub date: NaiveDate,
    /// Calories eaten, quantity applied.
    pub calories: f64,
    /// Meals logged.
    pub meal_count: usize,
}

/// Calendar history for one month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarMonth {
    /// Year.
    pub year: i32,
    /// Month, 1-12.
    pub month: u32,
    /// Daily calorie goal used for `days_within_goal`.
    pub calorie_goal: u32,
    /// Every day of the month, in order.
    pub days: Vec<CalendarDay>,
}

impl CalendarMonth {
    /// Build a full month from the days that have meals.
    ///
    /// Days missing from `logged` appear with zero calories. Entries outside
    /// the month are dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if `year`/`month` is not a valid month.
    pub fn from_logged_days(
        year: i32,
        month: u32,
        calorie_goal: u32,
        logged: &[CalendarDay],
    ) -> Result<Self> {
        let (start, end) = month_bounds(year, month)?;
        let by_date: BTreeMap<NaiveDate, &CalendarDay> =
            logged.iter().map(|day| (day.date, day)).collect();

        let days = start
            .iter_days()
            .take_while(|date| *date < end)
            .map(|date| match by_date.get(&date) {
                Some(day) => (*day).clone(),
                None => CalendarDay {
                    date,
                    calories: 0.0,
                    meal_count: 0,
                },
            })
            .collect();

        Ok(Self {
            year,
            month,
            calorie_goal,
            days,
        })
    }

    /// Days with at least one meal.
    #[must_use]
    pub fn logged_days(&self) -> usize {
        self.days.iter().filter(|day| day.meal_count > 0).count()
    }

    /// Logged days whose calories did not exceed the goal.
    #[must_use]
    pub fn days_within_goal(&self) -> usize {
        self.days
            .iter()
            .filter(|day| day.meal_count > 0 && day.calories <= f64::from(self.calorie_goal))
            .count()
    }

    /// Mean calories over logged days, `0.0` if none.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn average_calories(&self) -> f64 {
        let logged = self.logged_days();
        if logged == 0 {
            return 0.0;
        }
        let total: f64 = self.days.iter().map(|day| day.calories).sum();
        total / logged as f64
    }
}

/// First day of the month and first day of the following month.
///
/// # Errors
///
/// Returns an error if `year`/`month` is not a valid month.
pub fn month_bounds(year: i32, month: u32) -> Result<(NaiveDate, NaiveDate)> {
    let start = NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| Error::invalid_input(format!("invalid month {year}-{month:02}")))?;
    let end = start
        .checked_add_months(Months::new(1))
        .ok_or_else(|| Error::invalid_input(format!("month {year}-{month:02} out of range")))?;
    Ok((start, end))
}

/// Parse `YYYY-MM` into a year and month.
///
/// # Errors
///
/// Returns an error if the text is not a valid month.
pub fn parse_month(text: &str) -> Result<(i32, u32)> {
    let date = NaiveDate::parse_from_str(&format!("{}-01", text.trim()), "%Y-%m-%d")
        .map_err(|_| Error::invalid_input(format!("expected YYYY-MM, got '{text}'")))?;
    Ok((date.year(), date.month()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Meal, Nutrition};
    use chrono::Utc;

    fn meal(id: i64, date: NaiveDate, time: (u32, u32), calories: f64, quantity: f64) -> MealDetail {
        let consumed_at = date.and_hms_opt(time.0, time.1, 0).unwrap();
        MealDetail {
            meal: Meal {
                id,
                user_id: 1,
                name: format!("meal {id}"),
                meal_type: MealType::from_time(consumed_at.time()),
                consumed_at,
                quantity,
                health_grade: None,
                image_path: None,
                image_hash: None,
                notes: None,
                created_at: Utc::now(),
            },
            ingredients: Vec::new(),
            nutrition: Some(Nutrition {
                macros: Macros::new(calories, 10.0, 20.0, 5.0),
                ..Nutrition::default()
            }),
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 2, d).unwrap()
    }

    #[test]
    fn test_summarize_day_totals_and_buckets() {
        let meals = vec![
            meal(1, day(10), (8, 0), 300.0, 1.0),
            meal(2, day(10), (12, 30), 600.0, 0.5),
            meal(3, day(10), (19, 15), 700.0, 1.0),
            meal(4, day(10), (23, 0), 150.0, 2.0),
            meal(5, day(11), (8, 0), 999.0, 1.0),
        ];

        let summary = summarize_day(day(10), &meals, 2000);

        assert_eq!(summary.meal_count, 4);
        assert_eq!(summary.totals.calories, 300.0 + 300.0 + 700.0 + 300.0);
        assert_eq!(summary.totals.protein_g, 10.0 + 5.0 + 10.0 + 20.0);
        assert_eq!(summary.calories_by_meal_type[&MealType::Breakfast], 300.0);
        assert_eq!(summary.calories_by_meal_type[&MealType::Lunch], 300.0);
        assert_eq!(summary.calories_by_meal_type[&MealType::Dinner], 700.0);
        assert_eq!(summary.calories_by_meal_type[&MealType::Snack], 300.0);
        assert_eq!(summary.remaining_calories, 400.0);
        assert_eq!(summary.meals[0].time, "08:00");
        assert_eq!(summary.meals[3].id, 4);
    }

    #[test]
    fn test_summarize_empty_day_has_every_bucket() {
        let summary = summarize_day(day(1), &[], 1800);
        assert_eq!(summary.meal_count, 0);
        assert_eq!(summary.calories_by_meal_type.len(), 4);
        assert_eq!(summary.remaining_calories, 1800.0);
        assert_eq!(summary.progress(), 0.0);
    }

    #[test]
    fn test_over_goal_goes_negative() {
        let meals = vec![meal(1, day(3), (13, 0), 2500.0, 1.0)];
        let summary = summarize_day(day(3), &meals, 2000);
        assert_eq!(summary.remaining_calories, -500.0);
        assert!((summary.progress() - 1.25).abs() < 1e-9);
    }

    #[test]
    fn test_progress_with_zero_goal() {
        let meals = vec![meal(1, day(3), (13, 0), 500.0, 1.0)];
        let summary = summarize_day(day(3), &meals, 0);
        assert_eq!(summary.progress(), 0.0);
    }

    #[test]
    fn test_calendar_fills_missing_days() {
        let logged = vec![
            CalendarDay {
                date: day(2),
                calories: 1500.0,
                meal_count: 3,
            },
            CalendarDay {
                date: day(29),
                calories: 2500.0,
                meal_count: 4,
            },
        ];
        let month = CalendarMonth::from_logged_days(2024, 2, 2000, &logged).unwrap();

        // 2024 is a leap year.
        assert_eq!(month.days.len(), 29);
        assert_eq!(month.days[0].calories, 0.0);
        assert_eq!(month.days[1].calories, 1500.0);
        assert_eq!(month.logged_days(), 2);
        assert_eq!(month.days_within_goal(), 1);
        assert_eq!(month.average_calories(), 2000.0);
    }

    #[test]
    fn test_calendar_drops_days_outside_month() {
        let logged = vec![CalendarDay {
            date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            calories: 100.0,
            meal_count: 1,
        }];
        let month = CalendarMonth::from_logged_days(2024, 2, 2000, &logged).unwrap();
        assert_eq!(month.logged_days(), 0);
        assert_eq!(month.average_calories(), 0.0);
    }

    #[test]
    fn test_month_bounds() {
        let (start, end) = month_bounds(2023, 12).unwrap();
        assert_eq!(start, NaiveDate::from_ymd_opt(2023, 12, 1).unwrap());
        assert_eq!(end, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert!(month_bounds(2023, 13).is_err());
    }

    #[test]
    fn test_parse_month() {
        assert_eq!(parse_month("2024-07").unwrap(), (2024, 7));
        assert!(parse_month("2024-7x").is_err());
        assert!(parse_month("July").is_err());
    }
}
