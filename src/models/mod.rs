pub mod branch;
pub mod cart;
pub mod delivery;
pub mod money;
pub mod order;
pub mod product;
pub mod user;
pub mod wallet;

use thiserror::Error;

pub use branch::{BranchLinkRequest, BranchStore, CreateLinkRequest, LinkDecision, LinkStatus};
pub use cart::{AddCartItemRequest, Cart, CartError, CartItem, QuoteRequest, UpdateQuantityRequest};
pub use delivery::{
    DeliveryDocuments, DeliveryVerification, ReviewAction, ReviewRequest, VerificationStatus,
};
pub use money::{Money, MoneyError};
pub use order::{Order, OrderAction, OrderItem, OrderStatus, PaymentMethod, PlaceOrderRequest};
pub use product::{CreateProductRequest, Product, UpdateProductRequest};
pub use user::{
    LoginRequest, PublicProfile, RegisterRequest, Role, UpdateProfileRequest, User,
};
pub use wallet::{AmountRequest, TransactionKind, Wallet, WalletError, WalletTransaction};

/// A status change that the record's current state does not allow.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("cannot {action} when status is {from}")]
    NotAllowed { from: &'static str, action: &'static str },
    #[error("a note is required to {0}")]
    NoteRequired(&'static str),
}
