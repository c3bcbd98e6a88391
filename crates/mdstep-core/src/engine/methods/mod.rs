pub mod fire;
pub mod nve;

pub use fire::FireMinimizer;
pub use nve::TwoStepNve;
