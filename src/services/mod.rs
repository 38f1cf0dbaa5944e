pub mod carts;
pub mod ledger;
