pub mod catalog;
pub mod ceilings;
pub mod degradation;
pub mod error;
pub mod facade;
pub mod filter;
pub mod noop;
pub mod ports;
pub mod sequencer;
pub mod state;
pub mod types;

pub use catalog::StrategyCatalog;
pub use ceilings::ResourceCeilingRegistry;
pub use degradation::{ArbitrationLoop, LoopOutcome, degradation_candidate};
pub use error::{
    ArbitrationError, ArbitrationErrorKind, EvaluatorError, EvaluatorErrorKind, SolverError,
};
pub use facade::Arbiter;
pub use filter::{DesireFilter, FilteredDesires};
pub use noop::{BroadcastArbitrationSink, NoopArbitrationSink};
pub use ports::{ArbitrationSink, EvaluatorPort, SolverPort};
pub use sequencer::{ActivationSequencer, BoundCall, SequenceReport};
pub use state::ArbiterState;
pub use types::{
    ActivationEntry, ActivationResult, ArbitrationEvent, CostVector, CycleId, CycleOutcome,
    CycleReport, Desire, DesireId, DroppedDesire, GoalClass, Intention, IntentionEntry,
    RegistrationOutcome, ResourceCeiling, ResourceCeilingSnapshot, ResourceId, Strategy,
    StrategyId, Utility, UtilityMinimums,
};
