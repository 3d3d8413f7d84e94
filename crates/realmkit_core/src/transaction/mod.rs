//! Write transactions.
//!
//! Each store has a single writer slot. [`WriteTransaction`] holds it for
//! its whole lifetime and buffers mutations as pending writes; nothing is
//! visible outside the transaction until [`WriteTransaction::commit`].
//! Dropping an uncommitted transaction cancels it.

mod manager;
mod state;
mod write;

pub(crate) use manager::TransactionManager;
pub use state::{PendingWrite, Transaction, TransactionState};
pub use write::WriteTransaction;
