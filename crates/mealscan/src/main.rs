//! `mealscan` - CLI for the meal scanner
//!
//! This binary scans meal photos and shows the logged nutrition.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use anyhow::Context;
use chrono::{Datelike, Local};
use clap::Parser;

use mealscan::analysis::OpenAiAnalyzer;
use mealscan::cli::{
    render, CalendarCommand, Cli, Command, ConfigCommand, IngredientCommand, MealCommand,
    ProfileCommand, ProfileUpdate, ScanCommand,
};
use mealscan::model::MealDetail;
use mealscan::scanner::{ScanOptions, Scanner};
use mealscan::summary::parse_month;
use mealscan::{init_logging, Config, Error, Storage};

type AppResult = anyhow::Result<()>;

#[tokio::main]
async fn main() -> AppResult {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    // `config` works without a valid configuration
    let command = match cli.command {
        Command::Config(config_cmd) => return handle_config(cli.config, config_cmd),
        other => other,
    };

    let config = Config::load_from(cli.config).context("failed to load configuration")?;
    let storage = Storage::open(config.database_path())?;

    match command {
        Command::Scan(scan_cmd) => handle_scan(&config, &storage, scan_cmd).await,
        Command::Today(flag) => handle_day(&storage, Local::now().date_naive(), flag.json),
        Command::Day(day_cmd) => handle_day(&storage, day_cmd.date, day_cmd.json),
        Command::Calendar(calendar_cmd) => handle_calendar(&storage, &calendar_cmd),
        Command::Meal(meal_cmd) => handle_meal(&storage, meal_cmd),
        Command::Ingredient(ingredient_cmd) => handle_ingredient(&storage, ingredient_cmd),
        Command::Profile(profile_cmd) => handle_profile(&storage, profile_cmd),
        Command::Status(status_cmd) => handle_status(&config, &storage, status_cmd.json),
        Command::Config(_) => Ok(()),
    }
}

async fn handle_scan(config: &Config, storage: &Storage, cmd: ScanCommand) -> AppResult {
    let analyzer = OpenAiAnalyzer::new(&config.api)?;
    let scanner = Scanner::new(storage, analyzer, config);
    let options = ScanOptions {
        consumed_at: cmd.at,
        meal_type: cmd.meal_type.map(Into::into),
    };

    if !cmd.json {
        eprintln!("Analyzing {}...", cmd.image.display());
    }
    let detail = tokio::select! {
        result = scanner.scan(&cmd.image, options) => result?,
        _ = tokio::signal::ctrl_c() => return Err(Error::Cancelled.into()),
    };

    print_meal(&detail, cmd.json)
}

fn handle_day(storage: &Storage, date: chrono::NaiveDate, json: bool) -> AppResult {
    let user = storage.active_user()?;
    let summary = storage.daily_summary(&user, date)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("{}", render::daily_summary(&summary));
    }
    Ok(())
}

fn handle_calendar(storage: &Storage, cmd: &CalendarCommand) -> AppResult {
    let (year, month) = match &cmd.month {
        Some(text) => parse_month(text)?,
        None => {
            let today = Local::now().date_naive();
            (today.year(), today.month())
        }
    };
    let user = storage.active_user()?;
    let history = storage.calendar(&user, year, month)?;
    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&history)?);
    } else {
        println!("{}", render::calendar(&history));
    }
    Ok(())
}

fn handle_meal(storage: &Storage, cmd: MealCommand) -> AppResult {
    match cmd {
        MealCommand::Show { id, json } => {
            let detail = load_meal(storage, id)?;
            print_meal(&detail, json)?;
        }
        MealCommand::List { limit, json } => {
            let user = storage.active_user()?;
            let meals = storage.recent_meals(stored_user_id(&user)?, limit)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&meals)?);
            } else {
                println!("{}", render::meal_list(&meals));
            }
        }
        MealCommand::Search { query, limit, json } => {
            let user = storage.active_user()?;
            let meals = storage.search_meals(stored_user_id(&user)?, &query, limit)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&meals)?);
            } else {
                println!("{}", render::meal_list(&meals));
            }
        }
        MealCommand::Rename { id, name } => {
            storage.rename_meal(id, &name)?;
            println!("Renamed meal {id} to '{}'.", name.trim());
        }
        MealCommand::Quantity { id, servings } => {
            storage.set_meal_quantity(id, servings)?;
            let detail = load_meal(storage, id)?;
            println!(
                "Meal {id} is now {servings} serving(s), {:.0} kcal.",
                detail.displayed_nutrition().macros.calories
            );
        }
        MealCommand::Type { id, meal_type } => {
            let meal_type = meal_type.into();
            storage.set_meal_type(id, meal_type)?;
            println!("Meal {id} is now {meal_type}.");
        }
        MealCommand::Time { id, at } => {
            storage.set_meal_time(id, at)?;
            println!("Meal {id} moved to {}.", at.format("%Y-%m-%d %H:%M"));
        }
        MealCommand::Note { id, text } => {
            storage.set_meal_notes(id, text.as_deref())?;
            println!("Updated note on meal {id}.");
        }
        MealCommand::Delete { id } => {
            if storage.delete_meal(id)? {
                println!("Deleted meal {id}.");
            } else {
                return Err(Error::not_found("meal", id).into());
            }
        }
    }
    Ok(())
}

fn handle_ingredient(storage: &Storage, cmd: IngredientCommand) -> AppResult {
    let detail = match cmd {
        IngredientCommand::Amount { id, amount } => storage.update_ingredient_amount(id, amount)?,
        IngredientCommand::Delete { id } => storage.delete_ingredient(id)?,
    };
    println!("{}", render::meal_detail(&detail));
    Ok(())
}

fn handle_profile(storage: &Storage, cmd: ProfileCommand) -> AppResult {
    let mut user = storage.active_user()?;
    match cmd {
        ProfileCommand::Show { json } => {
            if json {
                let value = serde_json::json!({
                    "profile": user,
                    "basal_metabolic_rate": user.basal_metabolic_rate().round(),
                    "daily_calorie_goal": user.daily_calorie_goal(),
                });
                println!("{}", serde_json::to_string_pretty(&value)?);
            } else {
                println!("{}", render::profile(&user));
            }
        }
        ProfileCommand::Set(update) => {
            apply_profile_update(&mut user, update);
            storage.update_user(&user)?;
            println!("{}", render::profile(&user));
        }
    }
    Ok(())
}

fn apply_profile_update(user: &mut mealscan::model::User, update: ProfileUpdate) {
    if let Some(name) = update.name {
        user.name = name;
    }
    if let Some(sex) = update.sex {
        user.sex = sex.into();
    }
    if let Some(age) = update.age {
        user.age_years = age;
    }
    if let Some(height) = update.height {
        user.height_cm = height;
    }
    if let Some(weight) = update.weight {
        user.weight_kg = weight;
    }
    if let Some(activity) = update.activity {
        user.activity = activity.into();
    }
    if let Some(goal) = update.goal {
        user.goal = goal.into();
    }
    if update.auto_goal {
        user.calorie_goal = None;
    } else if let Some(calorie_goal) = update.calorie_goal {
        user.calorie_goal = Some(calorie_goal);
    }
}

fn handle_status(config: &Config, storage: &Storage, json: bool) -> AppResult {
    let stats = storage.stats()?;
    let user = storage.active_user()?;
    let today = storage.daily_summary(&user, Local::now().date_naive())?;
    let api_key_set = config.api.resolved_api_key().is_some();

    if json {
        let status = serde_json::json!({
            "database_path": storage.path(),
            "image_dir": config.image_dir(),
            "storage": stats,
            "api": {
                "base_url": config.api.base_url,
                "model": config.api.model,
                "api_key_configured": api_key_set,
            },
            "today": {
                "calories": today.totals.calories.round(),
                "calorie_goal": today.calorie_goal,
                "meal_count": today.meal_count,
            },
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        println!("mealscan status");
        println!("---------------");
        println!("Database:      {}", storage.path().display());
        println!("Images:        {}", config.image_dir().display());
        println!("{}", render::storage_stats(&stats));
        println!();
        println!("Model:         {} ({})", config.api.model, config.api.base_url);
        println!(
            "API key:       {}",
            if api_key_set { "configured" } else { "missing" }
        );
        println!();
        println!(
            "Today:         {:.0} / {} kcal in {} meal(s)",
            today.totals.calories, today.calorie_goal, today.meal_count
        );
    }
    Ok(())
}

fn handle_config(config_path: Option<std::path::PathBuf>, cmd: ConfigCommand) -> AppResult {
    match cmd {
        ConfigCommand::Show { json } => {
            let mut config = Config::load_from(config_path)?;
            if config.api.api_key.is_some() {
                config.api.api_key = Some("<redacted>".to_string());
            }
            if json {
                println!("{}", serde_json::to_string_pretty(&config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Storage]");
                println!("  Database path:      {}", config.database_path().display());
                println!("  Image directory:    {}", config.image_dir().display());
                println!();
                println!("[API]");
                println!("  Base URL:           {}", config.api.base_url);
                println!("  Model:              {}", config.api.model);
                println!(
                    "  API key:            {}",
                    if config.api.resolved_api_key().is_some() {
                        "configured"
                    } else {
                        "missing"
                    }
                );
                println!("  Timeout (secs):     {}", config.api.timeout_secs);
                println!("  Max tokens:         {}", config.api.max_tokens);
                println!("  Image detail:       {}", config.api.image_detail);
                println!();
                println!("[Scan]");
                println!("  Keep images:        {}", config.scan.keep_images);
                println!("  Max image bytes:    {}", config.scan.max_image_bytes);
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file
                .or(config_path)
                .unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => println!("Configuration error: {e}"),
            }
        }
    }
    Ok(())
}

fn load_meal(storage: &Storage, id: i64) -> mealscan::Result<MealDetail> {
    storage
        .get_meal_detail(id)?
        .ok_or_else(|| Error::not_found("meal", id))
}

fn stored_user_id(user: &mealscan::model::User) -> mealscan::Result<i64> {
    user.id
        .ok_or_else(|| Error::internal("active user has no id"))
}

fn print_meal(detail: &MealDetail, json: bool) -> AppResult {
    if json {
        let value = serde_json::json!({
            "meal": detail.meal,
            "ingredients": detail.displayed_ingredients(),
            "nutrition": detail.displayed_nutrition(),
            "nutrition_per_serving": detail.nutrition,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        println!("{}", render::meal_detail(detail));
    }
    Ok(())
}
