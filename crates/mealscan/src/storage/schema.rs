//! `SQLite` schema definitions for mealscan.
//!
//! Dates are stored as text: `consumed_at` as local `YYYY-MM-DD HH:MM:SS`
//! so that string order is time order and `substr(consumed_at, 1, 10)` is
//! the day, `created_at` as RFC 3339 UTC.

/// SQL statement to create the users table.
pub const CREATE_USERS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    sex TEXT NOT NULL,
    age_years INTEGER NOT NULL,
    height_cm REAL NOT NULL,
    weight_kg REAL NOT NULL,
    activity TEXT NOT NULL,
    goal TEXT NOT NULL,
    calorie_goal INTEGER,
    created_at TEXT NOT NULL
)
";

/// SQL statement to create the meals table.
pub const CREATE_MEALS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS meals (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    meal_type TEXT NOT NULL,
    consumed_at TEXT NOT NULL,
    quantity REAL NOT NULL DEFAULT 1.0 CHECK (quantity > 0),
    health_grade TEXT,
    image_path TEXT,
    image_hash TEXT,
    created_at TEXT NOT NULL
)
";

/// SQL statement to create the ingredients table.
pub const CREATE_INGREDIENTS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS ingredients (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    meal_id INTEGER NOT NULL REFERENCES meals(id) ON DELETE CASCADE,
    position INTEGER NOT NULL,
    name TEXT NOT NULL,
    amount REAL NOT NULL,
    unit TEXT NOT NULL,
    calories REAL NOT NULL,
    protein_g REAL NOT NULL,
    carbs_g REAL NOT NULL,
    fat_g REAL NOT NULL
)
";

/// SQL statement to create the nutrition table. One row per meal at most.
pub const CREATE_NUTRITION_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS nutrition (
    meal_id INTEGER PRIMARY KEY REFERENCES meals(id) ON DELETE CASCADE,
    calories REAL NOT NULL,
    protein_g REAL NOT NULL,
    carbs_g REAL NOT NULL,
    fat_g REAL NOT NULL,
    fiber_g REAL NOT NULL,
    sugar_g REAL NOT NULL,
    sodium_mg REAL NOT NULL
)
";

/// Day queries filter on user and time.
pub const CREATE_MEALS_USER_TIME_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_meals_user_time ON meals(user_id, consumed_at)
";

/// Lookup for re-scanned photos.
pub const CREATE_MEALS_IMAGE_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_meals_image_hash ON meals(image_hash)
";

/// SQL statement to create an index on `meal_id` for ingredient lookups.
pub const CREATE_INGREDIENTS_MEAL_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_ingredients_meal ON ingredients(meal_id, position)
";

/// SQL statement to create the metadata table for storing key-value pairs.
pub const CREATE_METADATA_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
";

/// All schema creation statements in order.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    CREATE_USERS_TABLE,
    CREATE_MEALS_TABLE,
    CREATE_INGREDIENTS_TABLE,
    CREATE_NUTRITION_TABLE,
    CREATE_MEALS_USER_TIME_INDEX,
    CREATE_MEALS_IMAGE_INDEX,
    CREATE_INGREDIENTS_MEAL_INDEX,
    CREATE_METADATA_TABLE,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_statements_not_empty() {
        assert!(!SCHEMA_STATEMENTS.is_empty());
        for stmt in SCHEMA_STATEMENTS {
            assert!(!stmt.trim().is_empty());
        }
    }

    #[test]
    fn test_child_tables_cascade() {
        assert!(CREATE_MEALS_TABLE.contains("REFERENCES users(id) ON DELETE CASCADE"));
        assert!(CREATE_INGREDIENTS_TABLE.contains("REFERENCES meals(id) ON DELETE CASCADE"));
        assert!(CREATE_NUTRITION_TABLE.contains("REFERENCES meals(id) ON DELETE CASCADE"));
    }

    #[test]
    fn test_nutrition_keyed_by_meal() {
        assert!(CREATE_NUTRITION_TABLE.contains("meal_id INTEGER PRIMARY KEY"));
    }
}
