use anyhow::Result;
use chrono::NaiveDate;
use serde::Serialize;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use platter_core::models::{DayOverview, Meal, MealItem};
use platter_core::service::Planner;

use super::helpers::{no_neg_zero, truncate};

#[derive(Serialize)]
struct PlanOutput<'a> {
    day: &'a DayOverview,
    meals: &'a [Meal],
}

/// Generate one day against the loaded catalog and print it.
pub(crate) fn cmd_plan(planner: &Planner, date: NaiveDate, rest: bool, json: bool) -> Result<()> {
    if rest {
        planner.set_training(date, false);
    }
    let meals = planner.generate_day(date)?;
    let day = planner.get_day(date);

    if json {
        let out = PlanOutput {
            day: &day,
            meals: &meals,
        };
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    let kind = if day.is_training { "training" } else { "rest" };
    println!("=== {date} ({kind} day) ===\n");

    for meal in &meals {
        let label = meal.label.to_uppercase();
        let kcal = no_neg_zero(meal.adjusted_macros.kcal);
        println!("  {label} ({kcal:.0} kcal)");
        print_items(&meal.items);
        println!();
    }

    let t = &day.target;
    let a = &day.adjusted;
    println!(
        "Target:  {:.0} kcal | P:{:.0}g C:{:.0}g F:{:.0}g",
        t.kcal, t.protein, t.carbs, t.fat
    );
    println!(
        "Planned: {:.0} kcal | P:{:.0}g C:{:.0}g F:{:.0}g",
        no_neg_zero(a.kcal),
        no_neg_zero(a.protein),
        no_neg_zero(a.carbs),
        no_neg_zero(a.fat)
    );

    Ok(())
}

fn print_items(items: &[MealItem]) {
    #[derive(Tabled)]
    struct ItemRow {
        #[tabled(rename = "ID")]
        id: i64,
        #[tabled(rename = "Role")]
        role: &'static str,
        #[tabled(rename = "Food")]
        food: String,
        #[tabled(rename = "Grams")]
        grams: String,
        #[tabled(rename = "Kcal")]
        kcal: String,
        #[tabled(rename = "P")]
        protein: String,
        #[tabled(rename = "C")]
        carbs: String,
        #[tabled(rename = "F")]
        fat: String,
    }

    let rows: Vec<ItemRow> = items
        .iter()
        .map(|i| {
            let m = i.food.macros_for(i.adjusted_g);
            ItemRow {
                id: i.id,
                role: i.role.as_str(),
                food: truncate(&i.food.name, 35),
                grams: format!("{:.0}", i.adjusted_g),
                kcal: format!("{:.0}", m.kcal),
                protein: format!("{:.1}", m.protein),
                carbs: format!("{:.1}", m.carbs),
                fat: format!("{:.1}", m.fat),
            }
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(3..8)).with(Alignment::right()))
        .to_string();
    for line in table.lines() {
        println!("    {line}");
    }
}
