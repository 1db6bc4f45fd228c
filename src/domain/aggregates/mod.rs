//! Aggregates module
pub mod product;
pub mod order;
pub mod cart;

pub use product::{Product, ProductError, ProductImage, Variant};
pub use order::{
    Address, ConfirmationSource, Customer, Order, OrderError, OrderItem, OrderStatus, PaymentConfirmation,
    PaymentMethod, PaymentOutcome, PaymentPhase, PaymentStatus, Transition,
};
pub use cart::{AddOutcome, Cart, CartError, CartItem, CartKey};
