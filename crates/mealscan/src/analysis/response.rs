//! The JSON document the model is asked to produce, and how it becomes a
//! meal.

use std::sync::OnceLock;

use chrono::NaiveDateTime;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::warn;

use crate::error::{Error, Result};
use crate::model::{HealthGrade, Ingredient, Macros, MealType, NewMeal, Nutrition};

/// Name used when the model does not give one.
const FALLBACK_MEAL_NAME: &str = "Unnamed meal";

/// Unit given to ingredients the model reported without an amount. The
/// ingredient then counts as one serving carrying all of its macros.
const SERVING_UNIT: &str = "serving";

/// Nutrition analysis of one photo.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MealAnalysis {
    /// Name of the dish.
    #[serde(default, alias = "meal_name", alias = "mealName")]
    pub name: String,
    /// Visible ingredients with estimated amounts.
    #[serde(default)]
    pub ingredients: Vec<AnalyzedIngredient>,
    /// Totals for the whole plate.
    #[serde(default)]
    pub nutrition: AnalyzedNutrition,
    /// Letter grade, `A` healthiest.
    #[serde(default, alias = "healthGrade", alias = "grade")]
    pub health_grade: Option<String>,
    /// Set by the model instead of the fields above when it cannot analyze
    /// the photo.
    #[serde(default)]
    pub error: Option<String>,
}

/// One ingredient as reported by the model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalyzedIngredient {
    /// Ingredient name.
    #[serde(default)]
    pub name: String,
    /// Estimated amount in `unit`.
    #[serde(default, alias = "quantity", deserialize_with = "lenient_f64")]
    pub amount: f64,
    /// Unit of `amount`.
    #[serde(default = "default_unit")]
    pub unit: String,
    /// kcal.
    #[serde(default, deserialize_with = "lenient_f64")]
    pub calories: f64,
    /// Grams of protein.
    #[serde(default, deserialize_with = "lenient_f64")]
    pub protein: f64,
    /// Grams of carbohydrates.
    #[serde(default, deserialize_with = "lenient_f64")]
    pub carbs: f64,
    /// Grams of fat.
    #[serde(default, deserialize_with = "lenient_f64")]
    pub fat: f64,
}

/// Plate totals as reported by the model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalyzedNutrition {
    /// kcal.
    #[serde(default, deserialize_with = "lenient_f64")]
    pub calories: f64,
    /// Grams of protein.
    #[serde(default, deserialize_with = "lenient_f64")]
    pub protein: f64,
    /// Grams of carbohydrates.
    #[serde(default, deserialize_with = "lenient_f64")]
    pub carbs: f64,
    /// Grams of fat.
    #[serde(default, deserialize_with = "lenient_f64")]
    pub fat: f64,
    /// Grams of fiber.
    #[serde(default, deserialize_with = "lenient_f64")]
    pub fiber: f64,
    /// Grams of sugar.
    #[serde(default, deserialize_with = "lenient_f64")]
    pub sugar: f64,
    /// Milligrams of sodium.
    #[serde(default, deserialize_with = "lenient_f64")]
    pub sodium: f64,
}

fn default_unit() -> String {
    "g".to_string()
}

/// Accept numbers, numeric strings with a trailing unit (`"12 g"`,
/// `"1,250 kcal"`) and null. Anything unreadable becomes 0; negatives are
/// clamped to 0.
fn lenient_f64<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    let number = match value {
        serde_json::Value::Number(n) => n.as_f64().unwrap_or(0.0),
        serde_json::Value::String(s) => read_number(&s).unwrap_or(0.0),
        serde_json::Value::Null => 0.0,
        other => {
            warn!("Expected a number, got {}; using 0", other);
            0.0
        }
    };
    Ok(if number.is_finite() && number > 0.0 {
        number
    } else {
        0.0
    })
}

/// Read a number at the start of `text`, with optional thousands
/// separators and a unit after it. Text that is not exactly that is logged.
fn read_number(text: &str) -> Option<f64> {
    static NUMBER: OnceLock<Regex> = OnceLock::new();
    static UNIT: OnceLock<Regex> = OnceLock::new();
    let number = NUMBER.get_or_init(|| {
        Regex::new(r"^\s*(\d{1,3}(?:,\d{3})+(?:\.\d+)?|\d*\.?\d+)").expect("valid regex")
    });
    let unit = UNIT.get_or_init(|| Regex::new(r"^\s*[A-Za-z\x{B5}%]*\s*$").expect("valid regex"));

    if text.trim().is_empty() {
        return None;
    }
    let Some(found) = number.captures(text).and_then(|c| c.get(1)) else {
        warn!("Unreadable number '{}'; using 0", text);
        return None;
    };
    let value: f64 = found.as_str().replace(',', "").parse().ok()?;
    if !unit.is_match(&text[found.end()..]) {
        warn!("Read '{}' as {}; the rest was ignored", text, value);
    }
    Some(value)
}

/// Pull the JSON object out of the model's message and parse it.
///
/// Tolerates Markdown code fences and prose around the object. A non-empty
/// `error` field turns into [`Error::AnalysisRejected`].
///
/// # Errors
///
/// Returns an error if no JSON object can be found or parsed, or if the
/// model reported an error.
pub fn parse_analysis(content: &str) -> Result<MealAnalysis> {
    let json = extract_json_object(content)
        .ok_or_else(|| Error::response_parse("no JSON object in model output"))?;
    let analysis: MealAnalysis = serde_json::from_str(json)
        .map_err(|e| Error::response_parse(format!("invalid meal JSON: {e}")))?;

    if let Some(reason) = analysis.error.as_deref().map(str::trim) {
        if !reason.is_empty() {
            return Err(Error::AnalysisRejected {
                reason: reason.to_string(),
            });
        }
    }
    Ok(analysis)
}

fn extract_json_object(content: &str) -> Option<&str> {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    let fence = FENCE.get_or_init(|| {
        Regex::new(r"(?s)```(?:json|JSON)?\s*(.*?)\s*```").expect("valid regex")
    });
    let inner = fence
        .captures(content)
        .and_then(|c| c.get(1))
        .map_or(content, |m| m.as_str());

    let start = inner.find('{')?;
    let end = inner.rfind('}')?;
    (start < end).then(|| &inner[start..=end])
}

impl MealAnalysis {
    /// The parsed health grade, if the model gave a recognizable one.
    #[must_use]
    pub fn grade(&self) -> Option<HealthGrade> {
        let raw = self.health_grade.as_deref()?;
        let grade = HealthGrade::parse_lenient(raw);
        if grade.is_none() {
            warn!("Ignoring unrecognized health grade '{}'", raw);
        }
        grade
    }

    /// Plate totals. When the model left them empty, the ingredient
    /// macros are summed instead.
    #[must_use]
    pub fn total_nutrition(&self) -> Nutrition {
        let reported = Macros::new(
            self.nutrition.calories,
            self.nutrition.protein,
            self.nutrition.carbs,
            self.nutrition.fat,
        );
        let macros = if reported == Macros::default() {
            self.ingredients
                .iter()
                .map(AnalyzedIngredient::macros)
                .sum()
        } else {
            reported
        };
        Nutrition {
            macros,
            fiber_g: self.nutrition.fiber,
            sugar_g: self.nutrition.sugar,
            sodium_mg: self.nutrition.sodium,
        }
    }

    /// Turn the analysis into a one-serving meal for `user_id`.
    ///
    /// The meal type follows `consumed_at` unless `meal_type` is given.
    /// Ingredients without a name are dropped. Ingredients without an
    /// amount become one serving so that they can still be rescaled.
    #[must_use]
    pub fn into_new_meal(
        self,
        user_id: i64,
        consumed_at: NaiveDateTime,
        meal_type: Option<MealType>,
    ) -> NewMeal {
        let name = self.name.trim();
        let name = if name.is_empty() {
            FALLBACK_MEAL_NAME
        } else {
            name
        };
        let mut meal = NewMeal::new(user_id, name, consumed_at);
        if let Some(meal_type) = meal_type {
            meal.meal_type = meal_type;
        }
        meal.health_grade = self.grade();
        meal.nutrition = self.total_nutrition();
        meal.ingredients = self
            .ingredients
            .iter()
            .filter(|i| !i.name.trim().is_empty())
            .map(|i| {
                if i.amount.is_finite() && i.amount > 0.0 {
                    Ingredient::new(i.name.trim(), i.amount, i.unit.trim(), i.macros())
                } else {
                    Ingredient::new(i.name.trim(), 1.0, SERVING_UNIT, i.macros())
                }
            })
            .collect();
        meal
    }
}

impl AnalyzedIngredient {
    fn macros(&self) -> Macros {
        Macros::new(self.calories, self.protein, self.carbs, self.fat)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    const SAMPLE: &str = r#"{
        "name": "Grilled salmon with quinoa",
        "ingredients": [
            {"name": "salmon fillet", "amount": 150, "unit": "g",
             "calories": 312, "protein": 34, "carbs": 0, "fat": 19},
            {"name": "quinoa", "amount": 120, "unit": "g",
             "calories": 144, "protein": 5.3, "carbs": 25.6, "fat": 2.3}
        ],
        "nutrition": {"calories": 456, "protein": 39.3, "carbs": 25.6, "fat": 21.3,
                      "fiber": 3.4, "sugar": 1.1, "sodium": 380},
        "health_grade": "A",
        "error": null
    }"#;

    fn noon() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 3)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_parse_plain_json() {
        let analysis = parse_analysis(SAMPLE).unwrap();
        assert_eq!(analysis.name, "Grilled salmon with quinoa");
        assert_eq!(analysis.ingredients.len(), 2);
        assert_eq!(analysis.ingredients[1].carbs, 25.6);
        assert_eq!(analysis.nutrition.sodium, 380.0);
        assert_eq!(analysis.grade(), Some(HealthGrade::A));
    }

    #[test]
    fn test_parse_fenced_json_with_prose() {
        let content = format!("Here is the analysis:\n```json\n{SAMPLE}\n```\nEnjoy!");
        let analysis = parse_analysis(&content).unwrap();
        assert_eq!(analysis.ingredients.len(), 2);
    }

    #[test]
    fn test_parse_lenient_fields() {
        let content = r#"{
            "meal_name": "Oatmeal",
            "ingredients": [{"name": "oats", "quantity": "40 g", "calories": "150kcal",
                             "protein": null, "carbs": 27, "fat": -3}],
            "healthGrade": "b"
        }"#;
        let analysis = parse_analysis(content).unwrap();
        assert_eq!(analysis.name, "Oatmeal");
        let oats = &analysis.ingredients[0];
        assert_eq!(oats.amount, 40.0);
        assert_eq!(oats.unit, "g");
        assert_eq!(oats.calories, 150.0);
        assert_eq!(oats.protein, 0.0);
        assert_eq!(oats.fat, 0.0);
        assert_eq!(analysis.grade(), Some(HealthGrade::B));
    }

    #[test]
    fn test_model_error_is_rejection() {
        let err = parse_analysis(r#"{"error": "No food detected in the image"}"#).unwrap_err();
        match err {
            Error::AnalysisRejected { reason } => assert_eq!(reason, "No food detected in the image"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_blank_error_is_ignored() {
        let analysis = parse_analysis(r#"{"name": "Apple", "error": "  "}"#).unwrap();
        assert_eq!(analysis.name, "Apple");
    }

    #[test]
    fn test_unparseable_output() {
        let err = parse_analysis("I can't help with that.").unwrap_err();
        assert!(matches!(err, Error::ResponseParse { .. }));

        let err = parse_analysis("{ not json }").unwrap_err();
        assert!(err.to_string().contains("invalid meal JSON"));
    }

    #[test]
    fn test_grade_words_are_not_letters() {
        for word in ["Excellent", "Bad", "Good", "Fair", "7/10"] {
            let content = format!(r#"{{"name": "Soup", "health_grade": "{word}"}}"#);
            assert_eq!(parse_analysis(&content).unwrap().grade(), None, "{word}");
        }
        let analysis = parse_analysis(r#"{"name": "Soup", "grade": "Grade: A"}"#).unwrap();
        assert_eq!(analysis.grade(), Some(HealthGrade::A));
    }

    #[test]
    fn test_numbers_with_separators() {
        let content = r#"{
            "name": "Feast",
            "ingredients": [{"name": "roast", "amount": ".5", "unit": "kg",
                             "calories": "1,250 kcal", "protein": "1,100", "carbs": "12.5g",
                             "fat": "1-2 g"}],
            "nutrition": {"calories": "about 1300", "sodium": "2,400.5 mg"}
        }"#;
        let analysis = parse_analysis(content).unwrap();
        let roast = &analysis.ingredients[0];
        assert_eq!(roast.amount, 0.5);
        assert_eq!(roast.calories, 1250.0);
        assert_eq!(roast.protein, 1100.0);
        assert_eq!(roast.carbs, 12.5);
        assert_eq!(roast.fat, 1.0);
        assert_eq!(analysis.nutrition.calories, 0.0);
        assert_eq!(analysis.nutrition.sodium, 2400.5);
    }

    #[test]
    fn test_total_nutrition_falls_back_to_ingredients() {
        let content = r#"{
            "name": "Snack plate",
            "ingredients": [
                {"name": "cheese", "calories": 110, "protein": 7, "carbs": 0, "fat": 9},
                {"name": "crackers", "calories": 130, "protein": 2, "carbs": 20, "fat": 5}
            ],
            "nutrition": {"fiber": 1}
        }"#;
        let nutrition = parse_analysis(content).unwrap().total_nutrition();
        assert_eq!(nutrition.macros, Macros::new(240.0, 9.0, 20.0, 14.0));
        assert_eq!(nutrition.fiber_g, 1.0);
    }

    #[test]
    fn test_into_new_meal() {
        let meal = parse_analysis(SAMPLE)
            .unwrap()
            .into_new_meal(7, noon(), None);

        assert_eq!(meal.user_id, 7);
        assert_eq!(meal.name, "Grilled salmon with quinoa");
        assert_eq!(meal.meal_type, MealType::Lunch);
        assert_eq!(meal.health_grade, Some(HealthGrade::A));
        assert_eq!(meal.ingredients.len(), 2);
        assert_eq!(meal.ingredients[0].macros.calories, 312.0);
        assert_eq!(meal.nutrition.macros.calories, 456.0);
        assert_eq!(meal.nutrition.sodium_mg, 380.0);
        assert!(meal.validate().is_ok());
    }

    #[test]
    fn test_into_new_meal_overrides_and_fallbacks() {
        let analysis = MealAnalysis {
            ingredients: vec![
                AnalyzedIngredient {
                    name: "  ".to_string(),
                    ..AnalyzedIngredient::default()
                },
                AnalyzedIngredient {
                    name: "banana".to_string(),
                    amount: 120.0,
                    unit: "g".to_string(),
                    calories: 105.0,
                    ..AnalyzedIngredient::default()
                },
            ],
            ..MealAnalysis::default()
        };
        let meal = analysis.into_new_meal(1, noon(), Some(MealType::Snack));

        assert_eq!(meal.name, FALLBACK_MEAL_NAME);
        assert_eq!(meal.meal_type, MealType::Snack);
        assert_eq!(meal.ingredients.len(), 1);
        assert_eq!(meal.nutrition.macros.calories, 105.0);
    }

    #[test]
    fn test_missing_amount_becomes_one_serving() {
        let content = r#"{
            "name": "Curry",
            "ingredients": [{"name": "sauce", "calories": 180, "fat": 12},
                            {"name": "rice", "amount": 0, "unit": "g", "calories": 200}]
        }"#;
        let meal = parse_analysis(content)
            .unwrap()
            .into_new_meal(1, noon(), None);

        for ingredient in &meal.ingredients {
            assert_eq!(ingredient.amount, 1.0);
            assert_eq!(ingredient.unit, SERVING_UNIT);
        }
        assert_eq!(meal.ingredients[0].macros.calories, 180.0);
        assert!(meal.validate().is_ok());

        let doubled = meal.ingredients[0].with_amount(2.0).unwrap();
        assert_eq!(doubled.macros.calories, 360.0);
    }
}
