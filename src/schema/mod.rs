pub mod alias;
pub mod analysis;
pub mod compare;
pub mod dialect;
pub mod differ;
pub mod manager;
pub mod mapping;
pub mod merge;
pub mod planner;
pub mod settings;

pub use alias::{CustomLayout, IndexLayoutStrategy, IndexNames, LayoutRegistry, NoAliasLayout, SimpleLayout};
pub use dialect::{ElasticsearchDialect, Mergeability, UpdateDialect};
pub use differ::{compare_schema, diff};
pub use manager::{BatchOutcome, OperationOutcome, SchemaManager, SchemaTask, SubmissionMode};
pub use merge::load_desired_index;
pub use planner::{ActionPlanner, PlanFailure, SchemaAction, SchemaOperation, SchemaPlan, SchemaState};
