mod calculator;
mod client;
mod types;

#[cfg(test)]
mod tests;

pub use calculator::CostCalculator;
