// Infrastructure layer (shared components)
pub mod infrastructure;

pub use infrastructure::config;
pub use infrastructure::error;
pub use infrastructure::metrics;
pub use infrastructure::redis;

// Dispatch core
pub mod facade;
pub mod mail;
pub mod router;

// Supporting modules
pub mod telemetry;

pub use facade::NotificationFacade;
pub use mail::{AsyncMailDispatcher, DeliveryHandle, DeliveryOutcome, DeliveryRequest};
pub use router::{Destination, NotificationRouter};
