pub mod payfast;
