pub mod camera;
pub mod detection;
pub mod errors;
pub mod ledger;
pub mod orientation;
pub mod stream;
