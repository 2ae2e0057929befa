mod aggregate;
mod model;
mod pricing;

pub use aggregate::{aggregate, AggregateResult, Horizon, RunDataSource};
pub use model::{classify_runner_os, AuthoritativeUsage, JobRecord, UsageRecord, WorkflowRun};
pub use pricing::OsClass;
