//! Bridge services
//!
//! Validation and classification of readings, the per-device poller, the
//! getter surface over published state, and the device registry.

pub mod classifier;
pub mod poller;
pub mod publication;
pub mod registry;
pub mod validator;

pub use classifier::{classify, AirQuality, ClassifiedState, Co2Status};
pub use poller::{DevicePoller, PollerPhase, PollerStats};
pub use publication::{Metric, PublicationSurface, Unavailable};
pub use registry::{DeviceRecord, DeviceRegistry, ReconcileOutcome, Reconciled};
pub use validator::{validate, DeviceMetadata, FieldWarning, Measure, ValidatedReading, Validation};
