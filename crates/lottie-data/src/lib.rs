// lottie-data: descriptor structs for already-loaded compositions
pub mod model;
