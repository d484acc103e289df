//! Metering aggregate

pub mod model;
pub mod repository;

pub use model::MeterReading;
pub use repository::MeterReadingRepository;
