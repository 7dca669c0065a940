pub mod error;
pub mod inventory;
pub mod lock;
pub mod payment;
pub mod pricing;
pub mod repository;
pub mod supplier;

pub use error::{BookingError, BookingResult, ErrorCode, StoreError, StoreResult};
pub use inventory::InventoryQueue;
pub use lock::{ExclusionLock, LockCompensation};
pub use payment::PaymentService;
pub use repository::{CatalogWriter, Storage};
pub use supplier::AirlineService;
