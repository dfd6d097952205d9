//! Block processing, rollback and confirmation height behaviour of the ledger.

use proptest::prelude::*;

use lattice_ledger::testing::{dev_ledger, test_key, BlockFactory};
use lattice_ledger::LedgerError;
use lattice_store::PendingKey;
use lattice_types::{Amount, ConfirmationHeightInfo, Epoch};

#[test]
fn genesis_is_cemented_on_creation() {
    let ledger = dev_ledger();
    let genesis = ledger.constants().genesis_hash();
    assert!(ledger.block_exists(&genesis));
    assert!(ledger.block_confirmed(&genesis));
    assert_eq!(ledger.cache().block_count(), 1);
    assert_eq!(ledger.cache().cemented_count(), 1);
    assert_eq!(ledger.weight(&ledger.constants().genesis_account()), Amount::MAX);
}

#[test]
fn send_then_open_moves_balance_and_weight() {
    let ledger = dev_ledger();
    let factory = BlockFactory::new(&ledger);
    let genesis = factory.genesis_key();
    let key = test_key(1);

    let send = factory.send(&genesis, key.account, Amount::raw(100));
    let send = ledger.process(send).unwrap();
    assert!(send.is_send());
    assert_eq!(send.height(), 2);
    assert!(ledger
        .pending_get(&PendingKey::new(key.account, send.hash()))
        .is_some());

    let open = ledger.process(factory.receive(&key, send.hash())).unwrap();
    assert!(open.is_receive());
    assert_eq!(open.height(), 1);
    assert_eq!(open.source(), Some(send.hash()));
    assert_eq!(ledger.account_info(&key.account).unwrap().balance, Amount::raw(100));
    assert_eq!(ledger.weight(&key.account), Amount::raw(100));
    assert_eq!(ledger.amount(&open.hash()), Some(Amount::raw(100)));
    assert!(ledger
        .pending_get(&PendingKey::new(key.account, send.hash()))
        .is_none());
    assert_eq!(ledger.block_successor(&ledger.constants().genesis_hash()), Some(send.hash()));
    assert_eq!(ledger.cache().account_count(), 2);
}

#[test]
fn duplicate_block_is_old() {
    let ledger = dev_ledger();
    let factory = BlockFactory::new(&ledger);
    let send = factory.send(&factory.genesis_key(), test_key(1).account, Amount::raw(1));
    ledger.process(send.clone()).unwrap();
    assert!(matches!(ledger.process(send), Err(LedgerError::Old(_))));
}

#[test]
fn competing_successor_is_a_fork() {
    let ledger = dev_ledger();
    let factory = BlockFactory::new(&ledger);
    let genesis = factory.genesis_key();
    let first = factory.send(&genesis, test_key(1).account, Amount::raw(1));
    let second = factory.send(&genesis, test_key(2).account, Amount::raw(1));
    ledger.process(first).unwrap();
    assert!(matches!(ledger.process(second), Err(LedgerError::Fork(_))));
}

#[test]
fn receive_of_wrong_amount_is_rejected() {
    let ledger = dev_ledger();
    let factory = BlockFactory::new(&ledger);
    let key = test_key(1);
    let send = ledger
        .process(factory.send(&factory.genesis_key(), key.account, Amount::raw(10)))
        .unwrap();
    let mut open = factory.receive(&key, send.hash());
    open = lattice_ledger::StateBlockBuilder::new()
        .account(open.account)
        .representative(open.representative)
        .balance(Amount::raw(11))
        .link(open.link)
        .sign(&key);
    assert!(matches!(
        ledger.process(open),
        Err(LedgerError::BalanceMismatch(_))
    ));
}

#[test]
fn epoch_upgrade_requires_next_epoch() {
    let ledger = dev_ledger();
    let factory = BlockFactory::new(&ledger);
    let genesis = ledger.constants().genesis_account();

    let skip = factory.epoch(genesis, Epoch::Epoch2);
    assert!(matches!(
        ledger.process(skip),
        Err(LedgerError::BlockPosition(_))
    ));

    let upgrade = ledger.process(factory.epoch(genesis, Epoch::Epoch1)).unwrap();
    assert!(upgrade.is_epoch());
    assert_eq!(ledger.account_info(&genesis).unwrap().epoch, Epoch::Epoch1);
}

#[test]
fn rollback_of_send_removes_dependent_receive() {
    let ledger = dev_ledger();
    let factory = BlockFactory::new(&ledger);
    let key = test_key(1);
    let send = ledger
        .process(factory.send(&factory.genesis_key(), key.account, Amount::raw(5)))
        .unwrap();
    let open = ledger.process(factory.receive(&key, send.hash())).unwrap();

    let removed = ledger.rollback(&send.hash()).unwrap();
    let hashes: Vec<_> = removed.iter().map(|b| b.hash()).collect();
    assert_eq!(hashes, vec![open.hash(), send.hash()]);
    assert!(!ledger.block_exists(&open.hash()));
    assert!(ledger.account_info(&key.account).is_none());
    assert_eq!(ledger.weight(&key.account), Amount::ZERO);
    assert_eq!(ledger.weight(&ledger.constants().genesis_account()), Amount::MAX);
    assert_eq!(ledger.cache().block_count(), 1);
    assert_eq!(ledger.block_successor(&ledger.constants().genesis_hash()), None);
}

#[test]
fn rollback_of_receive_restores_pending() {
    let ledger = dev_ledger();
    let factory = BlockFactory::new(&ledger);
    let key = test_key(1);
    let send = ledger
        .process(factory.send(&factory.genesis_key(), key.account, Amount::raw(5)))
        .unwrap();
    let open = ledger.process(factory.receive(&key, send.hash())).unwrap();
    ledger.rollback(&open.hash()).unwrap();
    let pending = ledger
        .pending_get(&PendingKey::new(key.account, send.hash()))
        .unwrap();
    assert_eq!(pending.amount, Amount::raw(5));
    assert_eq!(pending.source, ledger.constants().genesis_account());
}

#[test]
fn cemented_blocks_cannot_be_rolled_back() {
    let ledger = dev_ledger();
    let factory = BlockFactory::new(&ledger);
    let genesis = ledger.constants().genesis_account();
    let send = ledger
        .process(factory.send(&factory.genesis_key(), test_key(1).account, Amount::raw(5)))
        .unwrap();
    ledger
        .confirmation_height_put(&genesis, &ConfirmationHeightInfo::new(2, send.hash()))
        .unwrap();
    assert!(matches!(
        ledger.rollback(&send.hash()),
        Err(LedgerError::Cemented(_))
    ));
    assert!(ledger.block_exists(&send.hash()));
}

#[test]
fn confirmation_height_never_decreases_or_overflows() {
    let ledger = dev_ledger();
    let factory = BlockFactory::new(&ledger);
    let genesis = ledger.constants().genesis_account();
    let send = ledger
        .process(factory.send(&factory.genesis_key(), test_key(1).account, Amount::raw(5)))
        .unwrap();

    assert!(matches!(
        ledger.confirmation_height_put(&genesis, &ConfirmationHeightInfo::new(3, send.hash())),
        Err(LedgerError::ConfirmationHeightOverflow { .. })
    ));
    ledger
        .confirmation_height_put(&genesis, &ConfirmationHeightInfo::new(2, send.hash()))
        .unwrap();
    assert_eq!(ledger.cache().cemented_count(), 2);
    assert!(matches!(
        ledger.confirmation_height_put(
            &genesis,
            &ConfirmationHeightInfo::new(1, ledger.constants().genesis_hash())
        ),
        Err(LedgerError::ConfirmationHeightRegression { .. })
    ));
    assert_eq!(ledger.confirmation_height_get(&genesis).height, 2);
}

#[test]
fn dependents_confirmed_tracks_previous_and_source() {
    let ledger = dev_ledger();
    let factory = BlockFactory::new(&ledger);
    let genesis = ledger.constants().genesis_account();
    let key = test_key(1);
    let send = ledger
        .process(factory.send(&factory.genesis_key(), key.account, Amount::raw(5)))
        .unwrap();
    let open = ledger.process(factory.receive(&key, send.hash())).unwrap();

    assert!(ledger.dependents_confirmed(&send));
    assert!(!ledger.dependents_confirmed(&open));
    ledger
        .confirmation_height_put(&genesis, &ConfirmationHeightInfo::new(2, send.hash()))
        .unwrap();
    assert!(ledger.dependents_confirmed(&open));
}

#[test]
fn update_work_keeps_hash() {
    let ledger = dev_ledger();
    let factory = BlockFactory::new(&ledger);
    let send = ledger
        .process(factory.send(&factory.genesis_key(), test_key(1).account, Amount::raw(5)))
        .unwrap();
    let updated = ledger.update_work(&send.hash(), 42).unwrap();
    assert_eq!(updated.hash(), send.hash());
    assert_eq!(ledger.block_get(&send.hash()).unwrap().block.work, 42);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Any sequence of writes leaves the height at the highest accepted one,
    /// and a write is accepted only between the current height and the chain
    /// length.
    #[test]
    fn confirmation_height_tracks_highest_accepted_write(
        writes in prop::collection::vec(0..9u64, 1..24),
    ) {
        let ledger = dev_ledger();
        let factory = BlockFactory::new(&ledger);
        let genesis = factory.genesis_key();
        let mut chain = vec![ledger.constants().genesis_hash()];
        for n in 1..=5u8 {
            let send = ledger
                .process(factory.send(&genesis, test_key(n).account, Amount::raw(1)))
                .unwrap();
            chain.push(send.hash());
        }

        let mut expected = 1;
        for height in writes {
            let frontier = chain[(height.max(1) as usize - 1).min(chain.len() - 1)];
            let result = ledger
                .confirmation_height_put(&genesis.account, &ConfirmationHeightInfo::new(height, frontier));
            let valid = height >= expected && height <= chain.len() as u64;
            prop_assert_eq!(result.is_ok(), valid);
            if valid {
                expected = height;
            }
            prop_assert_eq!(ledger.confirmation_height_get(&genesis.account).height, expected);
        }
    }
}
