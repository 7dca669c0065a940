pub mod bootstrap;
pub mod generator;
pub mod orchestrator;
pub mod provision;
pub mod simulators;

pub use bootstrap::Backends;
pub use generator::{DataGenerator, GeneratedInventory};
pub use orchestrator::BookingOrchestrator;
pub use provision::Provisioner;
pub use simulators::{SimulatedAirline, SimulatedPayment};
