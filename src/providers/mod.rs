mod github;

pub use github::CostCalculator;
