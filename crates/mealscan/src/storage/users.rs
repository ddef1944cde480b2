//! User profile persistence.

use rusqlite::params;
use tracing::{debug, info, warn};

use super::{parse_created_at, Storage};
use crate::error::{Error, Result};
use crate::model::User;

const USER_COLUMNS: &str =
    "id, name, sex, age_years, height_cm, weight_kg, activity, goal, calorie_goal, created_at";

impl Storage {
    /// Insert a user profile and return its id.
    ///
    /// # Errors
    ///
    /// Returns an error if the profile is invalid or the insert fails.
    pub fn insert_user(&self, user: &User) -> Result<i64> {
        user.validate()?;
        self.conn.execute(
            r"
            INSERT INTO users (name, sex, age_years, height_cm, weight_kg, activity, goal,
                               calorie_goal, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ",
            params![
                user.name,
                user.sex.as_str(),
                user.age_years,
                user.height_cm,
                user.weight_kg,
                user.activity.as_str(),
                user.goal.as_str(),
                user.calorie_goal,
                user.created_at.to_rfc3339(),
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        debug!("Inserted user with id {}", id);
        Ok(id)
    }

    /// Get a user by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get_user(&self, id: i64) -> Result<Option<User>> {
        self.query_optional(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
            [id],
            row_to_user,
        )
    }

    /// Overwrite a stored profile.
    ///
    /// # Errors
    ///
    /// Returns an error if the profile has no id, is invalid, or does not exist.
    pub fn update_user(&self, user: &User) -> Result<()> {
        let id = user
            .id
            .ok_or_else(|| Error::invalid_input("cannot update a user without an id"))?;
        user.validate()?;
        let affected = self.conn.execute(
            r"
            UPDATE users SET name = ?2, sex = ?3, age_years = ?4, height_cm = ?5,
                             weight_kg = ?6, activity = ?7, goal = ?8, calorie_goal = ?9
            WHERE id = ?1
            ",
            params![
                id,
                user.name,
                user.sex.as_str(),
                user.age_years,
                user.height_cm,
                user.weight_kg,
                user.activity.as_str(),
                user.goal.as_str(),
                user.calorie_goal,
            ],
        )?;
        if affected == 0 {
            return Err(Error::not_found("user", id));
        }
        Ok(())
    }

    /// The profile the app works with: the oldest user, created with
    /// defaults on first use.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn active_user(&self) -> Result<User> {
        let existing = self.query_optional(
            &format!("SELECT {USER_COLUMNS} FROM users ORDER BY id ASC LIMIT 1"),
            [],
            row_to_user,
        )?;
        if let Some(user) = existing {
            return Ok(user);
        }

        let mut user = User::default();
        let id = self.insert_user(&user)?;
        user.id = Some(id);
        info!("Created default profile (id {})", id);
        Ok(user)
    }

    /// Delete a user together with all of their meals.
    ///
    /// Returns `true` if a user was deleted, `false` if not found.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn delete_user(&self, id: i64) -> Result<bool> {
        let affected = self.conn.execute("DELETE FROM users WHERE id = ?1", [id])?;
        Ok(affected > 0)
    }
}

fn row_to_user(row: &rusqlite::Row) -> rusqlite::Result<User> {
    let sex: String = row.get(2)?;
    let activity: String = row.get(6)?;
    let goal: String = row.get(7)?;
    let created_at: String = row.get(9)?;

    Ok(User {
        id: Some(row.get(0)?),
        name: row.get(1)?,
        sex: sex.parse().unwrap_or_else(|_| {
            warn!("Unknown sex '{}', defaulting to unspecified", sex);
            crate::model::Sex::default()
        }),
        age_years: row.get(3)?,
        height_cm: row.get(4)?,
        weight_kg: row.get(5)?,
        activity: activity.parse().unwrap_or_else(|_| {
            warn!("Unknown activity level '{}', defaulting to moderate", activity);
            crate::model::ActivityLevel::default()
        }),
        goal: goal.parse().unwrap_or_else(|_| {
            warn!("Unknown weight goal '{}', defaulting to maintain", goal);
            crate::model::WeightGoal::default()
        }),
        calorie_goal: row.get(8)?,
        created_at: parse_created_at(&created_at),
    })
}
