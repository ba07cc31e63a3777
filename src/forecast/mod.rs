pub mod engine;
pub mod fallback;
pub mod narrator;

pub use engine::{Forecast, ForecastEngine, ForecastSource};
