pub mod credits;
pub mod translate;
