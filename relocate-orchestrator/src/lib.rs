pub mod batch;
pub mod cli;
pub mod coordinator;
pub mod driver;
pub mod gateway;
pub mod inspector;
pub mod logger;
pub mod provider_manager;
pub mod settings;
pub mod state_machine;
pub mod waiter;

pub use batch::MigrationBatch;
pub use coordinator::{BatchCoordinator, MigrationReport, ProgressReporter};
pub use driver::{StepFailure, TransitionDriver};
pub use gateway::RegionGateway;
pub use waiter::{WaitPolicy, Waits};
