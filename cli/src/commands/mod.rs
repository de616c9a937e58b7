mod foods;
mod helpers;
mod plan;

pub(crate) use foods::cmd_foods;
pub(crate) use helpers::parse_date;
pub(crate) use plan::cmd_plan;
