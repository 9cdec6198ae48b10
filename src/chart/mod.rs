pub mod annotations;
pub mod controller;
pub mod store;
pub mod surface;
