pub mod checkout;
pub mod itn_processor;
