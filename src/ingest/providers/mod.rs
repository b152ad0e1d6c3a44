pub mod yahoo;
pub mod yahoo_chart;
