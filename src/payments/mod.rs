pub mod amount;
pub mod error;
pub mod factory;
pub mod provider;
pub mod providers;
pub mod reference;
pub mod types;
pub mod utils;
