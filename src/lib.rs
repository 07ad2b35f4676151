pub mod backtest;
pub mod config;
pub mod dataset;
pub mod estimator;
pub mod export;
pub mod form;
pub mod head_to_head;
pub mod logging;
pub mod memo;
pub mod odds;
pub mod regression;
pub mod season;
pub mod team_stats;
