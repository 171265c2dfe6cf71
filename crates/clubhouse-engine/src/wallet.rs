//! Wallet ledger service.

use clubhouse_core::{
  store::LoyaltyStore,
  wallet::{LedgerEntry, LedgerReceipt, TransactionType, Wallet, WalletTransaction},
};
use rust_decimal::Decimal;
use tracing::debug;
use uuid::Uuid;

use crate::{Engine, Error, Result};

impl<S: LoyaltyStore> Engine<S> {
  pub async fn get_wallet(&self, user_id: Uuid) -> Result<Option<Wallet>> {
    self.store.get_wallet(user_id).await.map_err(Error::store)
  }

  pub async fn get_or_create_wallet(&self, user_id: Uuid) -> Result<Wallet> {
    self
      .store
      .get_or_create_wallet(user_id)
      .await
      .map_err(Error::store)
  }

  /// Credit `amount`, creating the wallet on first use.
  pub async fn credit(
    &self,
    user_id: Uuid,
    amount: Decimal,
    kind: TransactionType,
    description: Option<String>,
  ) -> Result<LedgerReceipt> {
    let mut entry = LedgerEntry::credit(amount, kind);
    entry.description = description;
    self.apply_entry(user_id, entry).await
  }

  /// Debit `amount`. The wallet must exist and hold at least `amount`.
  pub async fn debit(
    &self,
    user_id: Uuid,
    amount: Decimal,
    kind: TransactionType,
    description: Option<String>,
  ) -> Result<LedgerReceipt> {
    let mut entry = LedgerEntry::debit(amount, kind);
    entry.description = description;
    self.apply_entry(user_id, entry).await
  }

  /// Apply an entry and announce it to the wallet owner.
  pub async fn apply_entry(&self, user_id: Uuid, entry: LedgerEntry) -> Result<LedgerReceipt> {
    let receipt = self.apply_with_retry(user_id, entry).await?;
    self
      .notify_wallet_transaction(user_id, &receipt.transaction)
      .await;
    Ok(receipt)
  }

  /// Apply an entry, re-reading the wallet when another writer moved its
  /// version in between.
  pub(crate) async fn apply_with_retry(
    &self,
    user_id: Uuid,
    entry: LedgerEntry,
  ) -> Result<LedgerReceipt> {
    let max_retries = self.config.ledger.max_conflict_retries;
    let mut attempt = 0;
    loop {
      let result = self
        .store
        .apply_ledger_entry(user_id, entry.clone())
        .await
        .map_err(Error::store);
      match result {
        Err(Error::Domain(clubhouse_core::Error::WalletConflict(_))) if attempt < max_retries => {
          attempt += 1;
          debug!(%user_id, attempt, "wallet version moved, retrying");
        }
        Ok(receipt) => {
          debug!(
            %user_id,
            direction = receipt.transaction.direction.as_ref(),
            amount = %receipt.transaction.amount,
            balance = %receipt.wallet.balance,
            "ledger entry applied"
          );
          return Ok(receipt);
        }
        Err(e) => return Err(e),
      }
    }
  }

  pub async fn set_wallet_locked(&self, user_id: Uuid, locked: bool) -> Result<Wallet> {
    self
      .store
      .set_wallet_locked(user_id, locked)
      .await
      .map_err(Error::store)
  }

  /// Ledger rows newest first.
  pub async fn list_transactions(
    &self,
    user_id: Uuid,
    skip: usize,
    take: usize,
  ) -> Result<Vec<WalletTransaction>> {
    self
      .store
      .list_transactions(user_id, skip, take)
      .await
      .map_err(Error::store)
  }
}
