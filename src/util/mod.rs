pub mod math;
pub mod scenes;
