pub mod meter;
pub mod tracer;

pub use meter::MeterProviderAssembler;
pub use tracer::TracerProviderAssembler;
