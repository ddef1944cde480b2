//! Plain-text views for the terminal.

use crate::model::{MealDetail, User};
use crate::storage::StorageStats;
use crate::summary::{CalendarMonth, DailySummary};

const BAR_WIDTH: usize = 30;

/// Detail view of one meal. Values have the meal's quantity applied.
#[must_use]
pub fn meal_detail(detail: &MealDetail) -> String {
    let meal = &detail.meal;
    let nutrition = detail.displayed_nutrition();
    let mut lines = vec![
        format!("{} (#{})", meal.name, meal.id),
        "-".repeat(meal.name.len() + format!(" (#{})", meal.id).len()),
        format!(
            "Eaten:     {} ({})",
            meal.consumed_at.format("%Y-%m-%d %H:%M"),
            meal.meal_type
        ),
        format!("Servings:  {}", trim_number(meal.quantity)),
    ];
    if let Some(grade) = meal.health_grade {
        lines.push(format!("Grade:     {grade}"));
    }
    if let Some(notes) = &meal.notes {
        lines.push(format!("Note:      {notes}"));
    }
    if let Some(path) = &meal.image_path {
        lines.push(format!("Photo:     {}", path.display()));
    }

    lines.push(String::new());
    lines.push("[Nutrition]".to_string());
    lines.push(format!("  Calories:  {:.0} kcal", nutrition.macros.calories));
    lines.push(format!("  Protein:   {:.1} g", nutrition.macros.protein_g));
    lines.push(format!("  Carbs:     {:.1} g", nutrition.macros.carbs_g));
    lines.push(format!("  Fat:       {:.1} g", nutrition.macros.fat_g));
    lines.push(format!("  Fiber:     {:.1} g", nutrition.fiber_g));
    lines.push(format!("  Sugar:     {:.1} g", nutrition.sugar_g));
    lines.push(format!("  Sodium:    {:.0} mg", nutrition.sodium_mg));

    lines.push(String::new());
    lines.push("[Ingredients]".to_string());
    if detail.ingredients.is_empty() {
        lines.push("  (none)".to_string());
    }
    for ingredient in detail.displayed_ingredients() {
        lines.push(format!(
            "  #{:<5} {:<24} {:>8} {:<6} {:>6.0} kcal  P {:.1}  C {:.1}  F {:.1}",
            ingredient.id.unwrap_or_default(),
            ingredient.name,
            trim_number(ingredient.amount),
            ingredient.unit,
            ingredient.macros.calories,
            ingredient.macros.protein_g,
            ingredient.macros.carbs_g,
            ingredient.macros.fat_g,
        ));
    }
    lines.join("\n")
}

/// One line per meal, with calories for the servings eaten.
#[must_use]
pub fn meal_list(meals: &[MealDetail]) -> String {
    if meals.is_empty() {
        return "No meals found.".to_string();
    }
    meals
        .iter()
        .map(|detail| {
            let meal = &detail.meal;
            format!(
                "#{:<5} {}  {:<9} {:>5.0} kcal  {}{}",
                meal.id,
                meal.consumed_at.format("%Y-%m-%d %H:%M"),
                meal.meal_type,
                detail.displayed_nutrition().macros.calories,
                meal.name,
                if (meal.quantity - 1.0).abs() > f64::EPSILON {
                    format!(" x{}", trim_number(meal.quantity))
                } else {
                    String::new()
                }
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Dashboard for one day.
#[must_use]
pub fn daily_summary(summary: &DailySummary) -> String {
    let mut lines = vec![
        format!("{}", summary.date.format("%A, %Y-%m-%d")),
        String::new(),
        format!(
            "Calories:  {:.0} / {} kcal  {}",
            summary.totals.calories,
            summary.calorie_goal,
            progress_bar(summary.progress())
        ),
    ];
    if summary.remaining_calories >= 0.0 {
        lines.push(format!("Remaining: {:.0} kcal", summary.remaining_calories));
    } else {
        lines.push(format!("Over by:   {:.0} kcal", -summary.remaining_calories));
    }
    lines.push(format!(
        "Protein {:.1} g   Carbs {:.1} g   Fat {:.1} g",
        summary.totals.protein_g, summary.totals.carbs_g, summary.totals.fat_g
    ));

    lines.push(String::new());
    for (meal_type, calories) in &summary.calories_by_meal_type {
        lines.push(format!("  {meal_type:<10} {calories:>6.0} kcal"));
    }

    lines.push(String::new());
    if summary.meals.is_empty() {
        lines.push("No meals logged.".to_string());
    }
    for meal in &summary.meals {
        lines.push(format!(
            "  {}  #{:<5} {:<32} {:>6.0} kcal",
            meal.time, meal.id, meal.name, meal.calories
        ));
    }
    lines.join("\n")
}

/// Month history, one row per day.
#[must_use]
pub fn calendar(month: &CalendarMonth) -> String {
    let mut lines = vec![
        format!(
            "{}-{:02}  goal {} kcal/day",
            month.year, month.month, month.calorie_goal
        ),
        String::new(),
    ];
    for day in &month.days {
        if day.meal_count == 0 {
            lines.push(format!("{}  {:>6}", day.date.format("%a %d"), "-"));
            continue;
        }
        let marker = if day.calories <= f64::from(month.calorie_goal) {
            ' '
        } else {
            '!'
        };
        lines.push(format!(
            "{}  {:>6.0}{} {} meal{}",
            day.date.format("%a %d"),
            day.calories,
            marker,
            day.meal_count,
            if day.meal_count == 1 { "" } else { "s" }
        ));
    }
    lines.push(String::new());
    lines.push(format!(
        "Logged {} days, {} within goal, average {:.0} kcal",
        month.logged_days(),
        month.days_within_goal(),
        month.average_calories()
    ));
    lines.join("\n")
}

/// Profile settings.
#[must_use]
pub fn profile(user: &User) -> String {
    let goal_source = if user.calorie_goal.is_some() {
        "fixed"
    } else {
        "computed"
    };
    [
        format!("Name:          {}", user.name),
        format!("Sex:           {}", user.sex),
        format!("Age:           {}", user.age_years),
        format!("Height:        {} cm", trim_number(user.height_cm)),
        format!("Weight:        {} kg", trim_number(user.weight_kg)),
        format!("Activity:      {}", user.activity),
        format!("Goal:          {}", user.goal),
        format!("BMR:           {:.0} kcal", user.basal_metabolic_rate()),
        format!(
            "Daily goal:    {} kcal ({goal_source})",
            user.daily_calorie_goal()
        ),
    ]
    .join("\n")
}

/// Database overview.
#[must_use]
pub fn storage_stats(stats: &StorageStats) -> String {
    let range = match (stats.first_meal_at, stats.last_meal_at) {
        (Some(first), Some(last)) => format!(
            "{} to {}",
            first.format("%Y-%m-%d"),
            last.format("%Y-%m-%d")
        ),
        _ => "-".to_string(),
    };
    [
        format!("Meals:         {}", stats.meals),
        format!("Ingredients:   {}", stats.ingredients),
        format!("Profiles:      {}", stats.users),
        format!("Logged:        {range}"),
        format!("Size:          {} KiB", stats.db_size_bytes / 1024),
    ]
    .join("\n")
}

fn progress_bar(progress: f64) -> String {
    let ratio = progress.clamp(0.0, 1.0);
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    let filled = (ratio * BAR_WIDTH as f64).round() as usize;
    format!(
        "[{}{}] {:.0}%",
        "#".repeat(filled),
        ".".repeat(BAR_WIDTH - filled),
        progress * 100.0
    )
}

/// `2` rather than `2.0`, `1.5` stays `1.5`.
fn trim_number(value: f64) -> String {
    let text = format!("{value:.2}");
    let trimmed = text.trim_end_matches('0').trim_end_matches('.');
    if trimmed.is_empty() {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}
