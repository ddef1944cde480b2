//! Dashboard queries.

use chrono::{NaiveDate, NaiveTime};
use rusqlite::params;

use super::{format_datetime, Storage};
use crate::error::{Error, Result};
use crate::model::User;
use crate::summary::{month_bounds, summarize_day, CalendarDay, CalendarMonth, DailySummary};

impl Storage {
    /// Totals for `user` on `date`.
    ///
    /// # Errors
    ///
    /// Returns an error if the user has no id or the database operation fails.
    pub fn daily_summary(&self, user: &User, date: NaiveDate) -> Result<DailySummary> {
        let user_id = stored_id(user)?;
        let meals = self.meals_on(user_id, date)?;
        Ok(summarize_day(date, &meals, user.daily_calorie_goal()))
    }

    /// Per-day calories of `user` over a month, every day present.
    ///
    /// # Errors
    ///
    /// Returns an error for an invalid month, a user without an id, or a
    /// failed database operation.
    pub fn calendar(&self, user: &User, year: i32, month: u32) -> Result<CalendarMonth> {
        let user_id = stored_id(user)?;
        let (start, end) = month_bounds(year, month)?;

        let mut stmt = self.conn.prepare(
            r"
            SELECT substr(m.consumed_at, 1, 10) AS day,
                   COALESCE(SUM(n.calories * m.quantity), 0),
                   COUNT(m.id)
            FROM meals m LEFT JOIN nutrition n ON n.meal_id = m.id
            WHERE m.user_id = ?1 AND m.consumed_at >= ?2 AND m.consumed_at < ?3
            GROUP BY day ORDER BY day
            ",
        )?;

        let logged = stmt
            .query_map(
                params![
                    user_id,
                    format_datetime(&start.and_time(NaiveTime::MIN)),
                    format_datetime(&end.and_time(NaiveTime::MIN)),
                ],
                |row| {
                    let day: String = row.get(0)?;
                    let calories: f64 = row.get(1)?;
                    let meal_count: i64 = row.get(2)?;
                    Ok((day, calories, meal_count))
                },
            )?
            .map(|row| {
                let (day, calories, meal_count) = row?;
                let date = NaiveDate::parse_from_str(&day, "%Y-%m-%d").map_err(|e| {
                    Error::internal(format!("bad stored date '{day}': {e}"))
                })?;
                Ok(CalendarDay {
                    date,
                    calories,
                    meal_count: usize::try_from(meal_count).unwrap_or(0),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        CalendarMonth::from_logged_days(year, month, user.daily_calorie_goal(), &logged)
    }
}

fn stored_id(user: &User) -> Result<i64> {
    user.id
        .ok_or_else(|| Error::invalid_input("user profile has not been saved"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Macros, MealType, NewMeal, Nutrition};

    fn setup() -> (Storage, User) {
        let storage = Storage::open_in_memory().unwrap();
        let mut user = storage.active_user().unwrap();
        user.calorie_goal = Some(2000);
        storage.update_user(&user).unwrap();
        (storage, user)
    }

    fn log(storage: &Storage, user: &User, day: u32, hour: u32, calories: f64, quantity: f64) {
        let consumed_at = NaiveDate::from_ymd_opt(2024, 6, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap();
        let mut meal = NewMeal::new(user.id.unwrap(), "meal", consumed_at);
        meal.quantity = quantity;
        meal.nutrition = Nutrition {
            macros: Macros::new(calories, 10.0, 10.0, 10.0),
            ..Nutrition::default()
        };
        storage.save_meal(&meal).unwrap();
    }

    #[test]
    fn test_daily_summary() {
        let (storage, user) = setup();
        log(&storage, &user, 3, 8, 400.0, 1.0);
        log(&storage, &user, 3, 13, 300.0, 2.0);
        log(&storage, &user, 4, 13, 900.0, 1.0);

        let date = NaiveDate::from_ymd_opt(2024, 6, 3).unwrap();
        let summary = storage.daily_summary(&user, date).unwrap();

        assert_eq!(summary.meal_count, 2);
        assert_eq!(summary.totals.calories, 1000.0);
        assert_eq!(summary.calories_by_meal_type[&MealType::Lunch], 600.0);
        assert_eq!(summary.calorie_goal, 2000);
        assert_eq!(summary.remaining_calories, 1000.0);
    }

    #[test]
    fn test_daily_summary_requires_saved_user() {
        let (storage, _) = setup();
        let date = NaiveDate::from_ymd_opt(2024, 6, 3).unwrap();
        assert!(storage.daily_summary(&User::default(), date).is_err());
    }

    #[test]
    fn test_calendar() {
        let (storage, user) = setup();
        log(&storage, &user, 1, 8, 500.0, 1.0);
        log(&storage, &user, 1, 19, 800.0, 1.5);
        log(&storage, &user, 30, 12, 2500.0, 1.0);
        log(&storage, &user, 1, 8, 0.0, 1.0);
        // Outside June.
        let july = NaiveDate::from_ymd_opt(2024, 7, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        storage
            .save_meal(&NewMeal::new(user.id.unwrap(), "late", july))
            .unwrap();

        let month = storage.calendar(&user, 2024, 6).unwrap();

        assert_eq!(month.days.len(), 30);
        assert_eq!(month.days[0].calories, 1700.0);
        assert_eq!(month.days[0].meal_count, 3);
        assert_eq!(month.days[29].calories, 2500.0);
        assert_eq!(month.logged_days(), 2);
        assert_eq!(month.days_within_goal(), 1);
        assert_eq!(month.calorie_goal, 2000);
    }

    #[test]
    fn test_calendar_invalid_month() {
        let (storage, user) = setup();
        assert!(storage.calendar(&user, 2024, 0).is_err());
    }
}
