use anyhow::Result;
use std::process;

use platter_core::service::Planner;

use super::helpers::print_food_table;

const SEARCH_LIMIT: usize = 50;

pub(crate) fn cmd_foods(planner: &Planner, search: Option<&str>, json: bool) -> Result<()> {
    let foods = match search {
        Some(q) => planner.search_foods(q, SEARCH_LIMIT),
        None => planner.list_foods(),
    };

    if foods.is_empty() {
        if json {
            println!("[]");
        } else {
            eprintln!("No foods found");
        }
        process::exit(2);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&foods)?);
    } else {
        print_food_table(&foods);
    }

    Ok(())
}
