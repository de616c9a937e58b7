pub mod audit;
pub mod catalog;
pub mod error;
pub mod ledger;
pub mod models;
pub mod openfoodfacts;
pub mod pantry;
pub mod rebalance;
pub mod selector;
pub mod service;
pub mod sizer;
#[cfg(test)]
pub(crate) mod testutil;
