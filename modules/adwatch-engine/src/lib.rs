pub mod analysis;
pub mod fetcher;
pub mod ingest;
pub mod judge;
pub mod monitor;
pub mod orchestrator;
pub mod rac;
pub mod rules;
pub mod tasks;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod traits;
