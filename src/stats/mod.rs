pub mod calculators;
pub mod config;
pub mod module_stats;
pub mod print_stats;
