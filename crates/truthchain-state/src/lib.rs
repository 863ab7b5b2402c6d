//! Wallet state: balances, nonces, transfer admission and state-root
//! commitments. One `RwLock` guards the whole table — operations are short
//! enough that finer-grained locking would not pay for itself (`spec.md`
//! §4.4).

use std::collections::HashMap;

use parking_lot::RwLock;

use truthchain_crypto::{address_of, recover_public_key, PublicKey};
use truthchain_telemetry::TRANSFERS_APPLIED;
use truthchain_types::constants::ADDRESS_VERSION;
use truthchain_types::entities::{Address, StateRoot, Transfer, WalletState};
use truthchain_types::errors::TransferError;

/// Authoritative wallet table, guarded by a single read-write lock.
#[derive(Default)]
pub struct StateManager {
    wallets: RwLock<HashMap<Address, WalletState>>,
}

impl StateManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the entire table with the contents of a `StateRoot` snapshot.
    /// Used when a reorg switches to a different local chain.
    pub fn load_from_state_root(&self, snapshot: &StateRoot) {
        let mut wallets = self.wallets.write();
        wallets.clear();
        for wallet in &snapshot.wallets {
            wallets.insert(wallet.address.clone(), wallet.clone());
        }
    }

    pub fn get(&self, address: &Address) -> Option<WalletState> {
        self.wallets.read().get(address).cloned()
    }

    fn wallet_or_default(wallets: &HashMap<Address, WalletState>, address: &Address) -> WalletState {
        wallets
            .get(address)
            .cloned()
            .unwrap_or_else(|| WalletState::new(address.clone()))
    }

    /// Balance minus the total cost of every pending transfer from `addr`,
    /// so admission checks can't be double-spent from the same nonce-space
    /// before a block seals.
    pub fn effective_balance(&self, addr: &Address, pending: &[Transfer]) -> u64 {
        let wallets = self.wallets.read();
        let balance = Self::wallet_or_default(&wallets, addr).balance;
        let committed: u64 = pending
            .iter()
            .filter(|t| &t.from == addr)
            .map(|t| t.total_cost())
            .sum();
        balance.saturating_sub(committed)
    }

    /// Validate and apply a transfer: signature recovery against `from`,
    /// strict nonce monotonicity, and sufficient balance. Debits the
    /// sender the full `amount + gas_fee`; credits only `amount` to the
    /// recipient — the gas fee is burned, it does not move anywhere.
    pub fn apply_transfer(&self, transfer: &Transfer) -> Result<(), TransferError> {
        transfer.validate()?;
        self.verify_transfer_signature(transfer)?;

        let mut wallets = self.wallets.write();
        let sender = Self::wallet_or_default(&wallets, &transfer.from);

        let expected_nonce = sender.nonce + 1;
        if transfer.nonce != expected_nonce {
            return Err(TransferError::InvalidNonce {
                expected: expected_nonce,
                got: transfer.nonce,
            });
        }

        let required = transfer.total_cost();
        if sender.balance < required {
            return Err(TransferError::InsufficientFunds {
                balance: sender.balance,
                required,
            });
        }

        let mut sender = sender;
        sender.balance -= required;
        sender.nonce = transfer.nonce;
        sender.last_tx_time = transfer.timestamp;
        wallets.insert(sender.address.clone(), sender);

        let mut recipient = Self::wallet_or_default(&wallets, &transfer.to);
        recipient.balance += transfer.amount;
        wallets.insert(recipient.address.clone(), recipient);

        TRANSFERS_APPLIED.inc();
        Ok(())
    }

    fn verify_transfer_signature(&self, transfer: &Transfer) -> Result<(), TransferError> {
        use truthchain_types::errors::ValidationError;

        let hash = transfer.hash();
        let recovered: PublicKey = recover_public_key(&hash, &transfer.signature)
            .map_err(|_| ValidationError::InvalidSignature)?;
        let derived_address = address_of(&recovered, ADDRESS_VERSION);
        if derived_address != transfer.from {
            return Err(ValidationError::AddressMismatch.into());
        }
        Ok(())
    }

    /// Credit `amount` to `address` outside of a transfer — used to
    /// reflect uptime-mining emission in the in-memory wallet table to
    /// match `storage.update_balance` (`spec.md` §4.6). Does not touch
    /// nonce or `last_tx_time`.
    pub fn credit(&self, address: &Address, amount: u64) -> WalletState {
        let mut wallets = self.wallets.write();
        let mut wallet = Self::wallet_or_default(&wallets, address);
        wallet.balance += amount;
        wallets.insert(wallet.address.clone(), wallet.clone());
        wallet
    }

    /// Snapshot the current table, stable-sorted and hashed per the
    /// `StateRoot` commitment discipline.
    pub fn state_root(&self, block_index: u64) -> StateRoot {
        let wallets: Vec<WalletState> = self.wallets.read().values().cloned().collect();
        StateRoot::compute(block_index, wallets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use truthchain_crypto::KeyPair;

    fn signed_transfer(
        keypair: &KeyPair,
        to: &Address,
        amount: u64,
        nonce: u64,
        timestamp: i64,
    ) -> Transfer {
        let from = address_of(&keypair.public_key(), ADDRESS_VERSION);
        let mut transfer = Transfer {
            from,
            to: to.clone(),
            amount,
            gas_fee: 1,
            timestamp,
            nonce,
            signature: [0u8; 65],
        };
        let hash = transfer.hash();
        transfer.signature = keypair.sign(&hash);
        transfer
    }

    #[test]
    fn apply_transfer_debits_sender_and_credits_recipient_net_of_fee() {
        let state = StateManager::new();
        let keypair = KeyPair::generate();
        let sender_addr = address_of(&keypair.public_key(), ADDRESS_VERSION);
        let recipient_addr: Address = "recipient".into();

        {
            let mut wallets = state.wallets.write();
            wallets.insert(
                sender_addr.clone(),
                WalletState {
                    address: sender_addr.clone(),
                    balance: 100,
                    nonce: 0,
                    last_tx_time: 0,
                },
            );
        }

        let transfer = signed_transfer(&keypair, &recipient_addr, 30, 1, 1_751_485_700);
        state.apply_transfer(&transfer).unwrap();

        assert_eq!(state.get(&sender_addr).unwrap().balance, 69);
        assert_eq!(state.get(&recipient_addr).unwrap().balance, 30);
    }

    #[test]
    fn apply_transfer_rejects_wrong_nonce() {
        let state = StateManager::new();
        let keypair = KeyPair::generate();
        let sender_addr = address_of(&keypair.public_key(), ADDRESS_VERSION);
        let recipient_addr: Address = "recipient".into();

        {
            let mut wallets = state.wallets.write();
            wallets.insert(
                sender_addr.clone(),
                WalletState {
                    address: sender_addr,
                    balance: 100,
                    nonce: 5,
                    last_tx_time: 0,
                },
            );
        }

        let transfer = signed_transfer(&keypair, &recipient_addr, 10, 1, 1_751_485_700);
        let err = state.apply_transfer(&transfer).unwrap_err();
        assert!(matches!(err, TransferError::InvalidNonce { expected: 6, got: 1 }));
    }

    #[test]
    fn apply_transfer_rejects_insufficient_funds() {
        let state = StateManager::new();
        let keypair = KeyPair::generate();
        let recipient_addr: Address = "recipient".into();

        let transfer = signed_transfer(&keypair, &recipient_addr, 10, 1, 1_751_485_700);
        let err = state.apply_transfer(&transfer).unwrap_err();
        assert!(matches!(err, TransferError::InsufficientFunds { .. }));
    }

    #[test]
    fn apply_transfer_rejects_forged_signature() {
        let state = StateManager::new();
        let keypair = KeyPair::generate();
        let other = KeyPair::generate();
        let sender_addr = address_of(&keypair.public_key(), ADDRESS_VERSION);
        let recipient_addr: Address = "recipient".into();

        {
            let mut wallets = state.wallets.write();
            wallets.insert(
                sender_addr.clone(),
                WalletState {
                    address: sender_addr,
                    balance: 100,
                    nonce: 0,
                    last_tx_time: 0,
                },
            );
        }

        // Signed by the wrong key but claiming to be from `keypair`'s address.
        let mut transfer = signed_transfer(&other, &recipient_addr, 10, 1, 1_751_485_700);
        transfer.from = address_of(&keypair.public_key(), ADDRESS_VERSION);

        let err = state.apply_transfer(&transfer).unwrap_err();
        assert!(matches!(
            err,
            TransferError::Validation(truthchain_types::errors::ValidationError::AddressMismatch)
        ));
    }

    #[test]
    fn effective_balance_subtracts_pending_transfers_from_the_same_sender() {
        let state = StateManager::new();
        let addr: Address = "alice".into();
        {
            let mut wallets = state.wallets.write();
            wallets.insert(
                addr.clone(),
                WalletState {
                    address: addr.clone(),
                    balance: 100,
                    nonce: 0,
                    last_tx_time: 0,
                },
            );
        }

        let pending = vec![Transfer {
            from: addr.clone(),
            to: "bob".into(),
            amount: 20,
            gas_fee: 1,
            timestamp: 1,
            nonce: 1,
            signature: [0u8; 65],
        }];

        assert_eq!(state.effective_balance(&addr, &pending), 79);
    }

    #[test]
    fn state_root_is_order_independent_of_insertion() {
        let a = StateManager::new();
        let b = StateManager::new();

        let wallets = [("alice", 10u64), ("bob", 20), ("carol", 30)];
        for (name, balance) in wallets.iter() {
            a.wallets.write().insert(
                (*name).into(),
                WalletState {
                    address: (*name).into(),
                    balance: *balance,
                    nonce: 0,
                    last_tx_time: 0,
                },
            );
        }
        for (name, balance) in wallets.iter().rev() {
            b.wallets.write().insert(
                (*name).into(),
                WalletState {
                    address: (*name).into(),
                    balance: *balance,
                    nonce: 0,
                    last_tx_time: 0,
                },
            );
        }

        assert_eq!(a.state_root(1).hash, b.state_root(1).hash);
    }

    #[test]
    fn credit_increases_balance_without_touching_nonce() {
        let state = StateManager::new();
        let addr: Address = "alice".into();
        state.credit(&addr, 50);
        state.credit(&addr, 25);
        let wallet = state.get(&addr).unwrap();
        assert_eq!(wallet.balance, 75);
        assert_eq!(wallet.nonce, 0);
    }

    #[test]
    fn load_from_state_root_replaces_the_table() {
        let state = StateManager::new();
        state.wallets.write().insert(
            "stale".into(),
            WalletState {
                address: "stale".into(),
                balance: 999,
                nonce: 0,
                last_tx_time: 0,
            },
        );

        let snapshot = StateRoot::compute(
            5,
            vec![WalletState {
                address: "fresh".into(),
                balance: 1,
                nonce: 0,
                last_tx_time: 0,
            }],
        );
        state.load_from_state_root(&snapshot);

        assert!(state.get(&"stale".into()).is_none());
        assert_eq!(state.get(&"fresh".into()).unwrap().balance, 1);
    }
}
