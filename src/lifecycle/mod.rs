pub mod cleanup;
pub mod config;
pub mod controller;
pub mod events;
pub mod state;

pub use cleanup::{is_past_ttl, is_stale_single_tab, CleanupReport, CleanupSweeper, SweepScope};
pub use config::EngineConfig;
pub use controller::{CaptureOutcome, SessionEngine, SkipReason};
pub use events::{EngineEvent, LifecycleSignal, TabObservation};
pub use state::EngineState;
