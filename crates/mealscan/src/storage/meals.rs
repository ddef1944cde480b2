//! Meal, ingredient and nutrition persistence.

use std::path::PathBuf;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rusqlite::{params, Connection};
use tracing::{debug, warn};

use super::{format_datetime, parse_created_at, parse_datetime, Storage};
use crate::error::{Error, Result};
use crate::model::{
    validate_positive, HealthGrade, Ingredient, Macros, Meal, MealDetail, MealType, NewMeal,
    Nutrition,
};

const MEAL_COLUMNS: &str = "id, user_id, name, meal_type, consumed_at, quantity, health_grade, \
                            image_path, image_hash, notes, created_at";

const INGREDIENT_COLUMNS: &str =
    "id, meal_id, name, amount, unit, calories, protein_g, carbs_g, fat_g";

impl Storage {
    /// Save a meal with its ingredients and nutrition row.
    ///
    /// All rows are written in one transaction: either the meal, its N
    /// ingredient rows and its nutrition row are all stored, or nothing is.
    ///
    /// # Errors
    ///
    /// Returns an error if the meal is invalid, the user does not exist, or
    /// the database operation fails.
    pub fn save_meal(&self, meal: &NewMeal) -> Result<MealDetail> {
        meal.validate()?;

        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            r"
            INSERT INTO meals (user_id, name, meal_type, consumed_at, quantity, health_grade,
                               image_path, image_hash, notes, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ",
            params![
                meal.user_id,
                meal.name.trim(),
                meal.meal_type.as_str(),
                format_datetime(&meal.consumed_at),
                meal.quantity,
                meal.health_grade.map(|g| g.to_string()),
                meal.image_path
                    .as_ref()
                    .map(|p| p.to_string_lossy().into_owned()),
                meal.image_hash,
                meal.notes,
                Utc::now().to_rfc3339(),
            ],
        )
        .map_err(|e| map_missing_user(e, meal.user_id))?;
        let meal_id = tx.last_insert_rowid();

        {
            let mut stmt = tx.prepare(
                r"
                INSERT INTO ingredients (meal_id, position, name, amount, unit,
                                         calories, protein_g, carbs_g, fat_g)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                ",
            )?;
            for (position, ingredient) in meal.ingredients.iter().enumerate() {
                let position = i64::try_from(position).unwrap_or(i64::MAX);
                stmt.execute(params![
                    meal_id,
                    position,
                    ingredient.name,
                    ingredient.amount,
                    ingredient.unit,
                    ingredient.macros.calories,
                    ingredient.macros.protein_g,
                    ingredient.macros.carbs_g,
                    ingredient.macros.fat_g,
                ])?;
            }
        }

        write_nutrition(&tx, meal_id, &meal.nutrition)?;
        tx.commit()?;

        debug!(
            "Saved meal {} with {} ingredients",
            meal_id,
            meal.ingredients.len()
        );
        self.get_meal_detail(meal_id)?
            .ok_or_else(|| Error::internal(format!("meal {meal_id} vanished after insert")))
    }

    /// Get a meal row by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get_meal(&self, id: i64) -> Result<Option<Meal>> {
        self.query_optional(
            &format!("SELECT {MEAL_COLUMNS} FROM meals WHERE id = ?1"),
            [id],
            row_to_meal,
        )
    }

    /// Get a meal with its ingredients and nutrition.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get_meal_detail(&self, id: i64) -> Result<Option<MealDetail>> {
        let Some(meal) = self.get_meal(id)? else {
            return Ok(None);
        };
        Ok(Some(self.load_detail(meal)?))
    }

    /// Meals of `user_id` eaten on `date`, with details, in time order.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn meals_on(&self, user_id: i64, date: NaiveDate) -> Result<Vec<MealDetail>> {
        let start = date.and_time(NaiveTime::MIN);
        let end = date
            .succ_opt()
            .ok_or_else(|| Error::invalid_input(format!("date {date} out of range")))?
            .and_time(NaiveTime::MIN);
        self.meals_between(user_id, start, end)
    }

    /// Meals of `user_id` in `[start, end)`, with details, in time order.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn meals_between(
        &self,
        user_id: i64,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<MealDetail>> {
        let mut stmt = self.conn.prepare(&format!(
            r"
            SELECT {MEAL_COLUMNS} FROM meals
            WHERE user_id = ?1 AND consumed_at >= ?2 AND consumed_at < ?3
            ORDER BY consumed_at ASC, id ASC
            "
        ))?;
        let meals = stmt
            .query_map(
                params![user_id, format_datetime(&start), format_datetime(&end)],
                row_to_meal,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        meals
            .into_iter()
            .map(|meal| self.load_detail(meal))
            .collect()
    }

    /// The most recently eaten meals of `user_id`, with their ingredients
    /// and nutrition.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn recent_meals(&self, user_id: i64, limit: usize) -> Result<Vec<MealDetail>> {
        let mut stmt = self.conn.prepare(&format!(
            r"
            SELECT {MEAL_COLUMNS} FROM meals WHERE user_id = ?1
            ORDER BY consumed_at DESC, id DESC LIMIT ?2
            "
        ))?;

        let limit_i64 = i64::try_from(limit).unwrap_or(i64::MAX);
        let meals = stmt
            .query_map(params![user_id, limit_i64], row_to_meal)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        meals
            .into_iter()
            .map(|meal| self.load_detail(meal))
            .collect()
    }

    /// Search meals by name, ingredient name or note.
    ///
    /// Performs a case-insensitive substring search. `%` and `_` in `query`
    /// match themselves.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn search_meals(&self, user_id: i64, query: &str, limit: usize) -> Result<Vec<MealDetail>> {
        let pattern = format!("%{}%", escape_like(query.trim()));
        let mut stmt = self.conn.prepare(&format!(
            r"
            SELECT {MEAL_COLUMNS} FROM meals
            WHERE user_id = ?1 AND (
                name LIKE ?2 ESCAPE '\' OR notes LIKE ?2 ESCAPE '\'
                OR id IN (SELECT meal_id FROM ingredients WHERE name LIKE ?2 ESCAPE '\')
            )
            ORDER BY consumed_at DESC, id DESC LIMIT ?3
            "
        ))?;

        let limit_i64 = i64::try_from(limit).unwrap_or(i64::MAX);
        let meals = stmt
            .query_map(params![user_id, pattern, limit_i64], row_to_meal)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        meals
            .into_iter()
            .map(|meal| self.load_detail(meal))
            .collect()
    }

    /// Find an earlier meal scanned from the same photo.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn find_meal_by_image_hash(&self, hash: &str) -> Result<Option<Meal>> {
        self.query_optional(
            &format!("SELECT {MEAL_COLUMNS} FROM meals WHERE image_hash = ?1 ORDER BY id LIMIT 1"),
            [hash],
            row_to_meal,
        )
    }

    /// Rename a meal.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is empty or the meal does not exist.
    pub fn rename_meal(&self, id: i64, name: &str) -> Result<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::invalid_input("meal name must not be empty"));
        }
        self.update_meal_column(id, "name", name)
    }

    /// Set how many servings were eaten. Displayed macros scale with it.
    ///
    /// # Errors
    ///
    /// Returns an error if the quantity is not positive or the meal does not exist.
    pub fn set_meal_quantity(&self, id: i64, quantity: f64) -> Result<()> {
        validate_positive("quantity", quantity)?;
        self.update_meal_column(id, "quantity", quantity)
    }

    /// Move a meal to another time-of-day bucket.
    ///
    /// # Errors
    ///
    /// Returns an error if the meal does not exist.
    pub fn set_meal_type(&self, id: i64, meal_type: MealType) -> Result<()> {
        self.update_meal_column(id, "meal_type", meal_type.as_str())
    }

    /// Change when a meal was eaten.
    ///
    /// # Errors
    ///
    /// Returns an error if the meal does not exist.
    pub fn set_meal_time(&self, id: i64, consumed_at: NaiveDateTime) -> Result<()> {
        self.update_meal_column(id, "consumed_at", format_datetime(&consumed_at))
    }

    /// Set or clear a meal's note.
    ///
    /// # Errors
    ///
    /// Returns an error if the meal does not exist.
    pub fn set_meal_notes(&self, id: i64, notes: Option<&str>) -> Result<()> {
        let notes = notes.map(str::trim).filter(|n| !n.is_empty());
        self.update_meal_column(id, "notes", notes)
    }

    /// Delete a meal; its ingredients and nutrition row go with it.
    ///
    /// Returns `true` if a meal was deleted, `false` if not found.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn delete_meal(&self, id: i64) -> Result<bool> {
        let affected = self.conn.execute("DELETE FROM meals WHERE id = ?1", [id])?;
        Ok(affected > 0)
    }

    /// Get an ingredient by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get_ingredient(&self, id: i64) -> Result<Option<Ingredient>> {
        self.query_optional(
            &format!("SELECT {INGREDIENT_COLUMNS} FROM ingredients WHERE id = ?1"),
            [id],
            row_to_ingredient,
        )
    }

    /// Change an ingredient's amount, rescaling its macros, and recompute
    /// the meal's nutrition totals from its ingredients.
    ///
    /// # Errors
    ///
    /// Returns an error if the amount is invalid, the ingredient does not
    /// exist, or the database operation fails.
    pub fn update_ingredient_amount(&self, id: i64, amount: f64) -> Result<MealDetail> {
        let ingredient = self
            .get_ingredient(id)?
            .ok_or_else(|| Error::not_found("ingredient", id))?;
        let updated = ingredient.with_amount(amount)?;
        let meal_id = owning_meal(&ingredient, id)?;

        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            r"
            UPDATE ingredients SET amount = ?2, calories = ?3, protein_g = ?4, carbs_g = ?5,
                                   fat_g = ?6
            WHERE id = ?1
            ",
            params![
                id,
                updated.amount,
                updated.macros.calories,
                updated.macros.protein_g,
                updated.macros.carbs_g,
                updated.macros.fat_g,
            ],
        )?;
        recompute_nutrition(&tx, meal_id)?;
        tx.commit()?;

        self.get_meal_detail(meal_id)?
            .ok_or_else(|| Error::not_found("meal", meal_id))
    }

    /// Remove an ingredient and recompute the meal's nutrition totals.
    ///
    /// # Errors
    ///
    /// Returns an error if the ingredient does not exist or the database
    /// operation fails.
    pub fn delete_ingredient(&self, id: i64) -> Result<MealDetail> {
        let ingredient = self
            .get_ingredient(id)?
            .ok_or_else(|| Error::not_found("ingredient", id))?;
        let meal_id = owning_meal(&ingredient, id)?;

        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM ingredients WHERE id = ?1", [id])?;
        recompute_nutrition(&tx, meal_id)?;
        tx.commit()?;

        self.get_meal_detail(meal_id)?
            .ok_or_else(|| Error::not_found("meal", meal_id))
    }

    fn update_meal_column<T: rusqlite::ToSql>(&self, id: i64, column: &str, value: T) -> Result<()> {
        let sql = format!("UPDATE meals SET {column} = ?2 WHERE id = ?1");
        let affected = self.conn.execute(&sql, params![id, value])?;
        if affected == 0 {
            return Err(Error::not_found("meal", id));
        }
        Ok(())
    }

    fn load_detail(&self, meal: Meal) -> Result<MealDetail> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {INGREDIENT_COLUMNS} FROM ingredients WHERE meal_id = ?1 ORDER BY position, id"
        ))?;
        let ingredients = stmt
            .query_map([meal.id], row_to_ingredient)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let nutrition = self.query_optional(
            r"
            SELECT calories, protein_g, carbs_g, fat_g, fiber_g, sugar_g, sodium_mg
            FROM nutrition WHERE meal_id = ?1
            ",
            [meal.id],
            |row| {
                Ok(Nutrition {
                    macros: Macros::new(row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?),
                    fiber_g: row.get(4)?,
                    sugar_g: row.get(5)?,
                    sodium_mg: row.get(6)?,
                })
            },
        )?;

        Ok(MealDetail {
            meal,
            ingredients,
            nutrition,
        })
    }
}

/// Escape `LIKE` wildcards so that `text` matches literally with `ESCAPE '\'`.
fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn owning_meal(ingredient: &Ingredient, id: i64) -> Result<i64> {
    ingredient
        .meal_id
        .ok_or_else(|| Error::internal(format!("ingredient {id} has no meal")))
}

fn write_nutrition(conn: &Connection, meal_id: i64, nutrition: &Nutrition) -> Result<()> {
    conn.execute(
        r"
        INSERT OR REPLACE INTO nutrition (meal_id, calories, protein_g, carbs_g, fat_g,
                                          fiber_g, sugar_g, sodium_mg)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        ",
        params![
            meal_id,
            nutrition.macros.calories,
            nutrition.macros.protein_g,
            nutrition.macros.carbs_g,
            nutrition.macros.fat_g,
            nutrition.fiber_g,
            nutrition.sugar_g,
            nutrition.sodium_mg,
        ],
    )?;
    Ok(())
}

/// Replace the meal's calories and macros with the sum over its
/// ingredients. Fiber, sugar and sodium are not tracked per ingredient and
/// are kept.
fn recompute_nutrition(conn: &Connection, meal_id: i64) -> Result<()> {
    let macros = conn.query_row(
        r"
        SELECT COALESCE(SUM(calories), 0), COALESCE(SUM(protein_g), 0),
               COALESCE(SUM(carbs_g), 0), COALESCE(SUM(fat_g), 0)
        FROM ingredients WHERE meal_id = ?1
        ",
        [meal_id],
        |row| Ok(Macros::new(row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
    )?;

    let affected = conn.execute(
        r"
        UPDATE nutrition SET calories = ?2, protein_g = ?3, carbs_g = ?4, fat_g = ?5
        WHERE meal_id = ?1
        ",
        params![meal_id, macros.calories, macros.protein_g, macros.carbs_g, macros.fat_g],
    )?;
    if affected == 0 {
        write_nutrition(
            conn,
            meal_id,
            &Nutrition {
                macros,
                ..Nutrition::default()
            },
        )?;
    }
    debug!("Recomputed nutrition for meal {}: {:.0} kcal", meal_id, macros.calories);
    Ok(())
}

fn map_missing_user(err: rusqlite::Error, user_id: i64) -> Error {
    match &err {
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            Error::not_found("user", user_id)
        }
        _ => err.into(),
    }
}

fn row_to_meal(row: &rusqlite::Row) -> rusqlite::Result<Meal> {
    let meal_type_str: String = row.get(3)?;
    let consumed_at_str: String = row.get(4)?;
    let grade_str: Option<String> = row.get(6)?;
    let image_path: Option<String> = row.get(7)?;
    let created_at: String = row.get(10)?;

    let consumed_at = parse_datetime(4, &consumed_at_str)?;
    let meal_type = meal_type_str.parse().unwrap_or_else(|_| {
        warn!(
            "Unknown meal type: {}, deriving from time",
            meal_type_str
        );
        MealType::from_time(consumed_at.time())
    });

    Ok(Meal {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        meal_type,
        consumed_at,
        quantity: row.get(5)?,
        health_grade: grade_str.as_deref().and_then(HealthGrade::parse_lenient),
        image_path: image_path.map(PathBuf::from),
        image_hash: row.get(8)?,
        notes: row.get(9)?,
        created_at: parse_created_at(&created_at),
    })
}

fn row_to_ingredient(row: &rusqlite::Row) -> rusqlite::Result<Ingredient> {
    Ok(Ingredient {
        id: Some(row.get(0)?),
        meal_id: Some(row.get(1)?),
        name: row.get(2)?,
        amount: row.get(3)?,
        unit: row.get(4)?,
        macros: Macros::new(row.get(5)?, row.get(6)?, row.get(7)?, row.get(8)?),
    })
}
