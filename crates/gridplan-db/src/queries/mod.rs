pub mod month_plans;
