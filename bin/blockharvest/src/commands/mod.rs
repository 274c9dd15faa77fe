pub mod completions_cmd;
pub mod config_cmd;
pub mod doctor;
pub mod scrape;
