//! Application services. Handlers stay thin; everything with a rule in it lives here.

pub mod admin;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod orders;
pub mod payments;
