//! Quota Ledger Integration Tests
//!
//! Atomic credit/debit under contention against an on-disk database.

use std::thread;

use tempfile::TempDir;
use vidscribe::core::{LedgerError, QuotaLedger, Store};
use vidscribe::domain::{QuotaDefaults, QuotaUpdate};

const USER: &str = "alice@example.com";

fn ledger_on_disk(temp: &TempDir) -> QuotaLedger {
    let store = Store::open(&temp.path().join("state").join("vidscribe.db")).unwrap();
    QuotaLedger::new(store, QuotaDefaults::default())
}

#[test]
fn test_concurrent_debits_never_overdraw() {
    let temp = TempDir::new().unwrap();
    let ledger = ledger_on_disk(&temp);
    assert_eq!(ledger.get(USER).unwrap().video_hours_left, 10);

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let ledger = ledger.clone();
            thread::spawn(move || ledger.debit_video_hours(USER, 1).is_ok())
        })
        .collect();
    let succeeded = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|ok| *ok)
        .count();

    assert_eq!(succeeded, 10);
    assert_eq!(ledger.get(USER).unwrap().video_hours_left, 0);
}

#[test]
fn test_mixed_credits_and_debits_balance() {
    let temp = TempDir::new().unwrap();
    let ledger = ledger_on_disk(&temp);
    ledger
        .set(USER, &QuotaUpdate::new().video_hours_left(100))
        .unwrap();

    let handles: Vec<_> = (0..10)
        .map(|i| {
            let ledger = ledger.clone();
            thread::spawn(move || {
                for _ in 0..10 {
                    if i % 2 == 0 {
                        ledger.credit_video_hours(USER, 2).unwrap();
                    } else {
                        ledger.debit_video_hours(USER, 1).unwrap();
                    }
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    // +2*50 -1*50
    assert_eq!(ledger.get(USER).unwrap().video_hours_left, 150);
}

#[test]
fn test_quota_survives_reopen() {
    let temp = TempDir::new().unwrap();
    {
        let ledger = ledger_on_disk(&temp);
        ledger.debit_video_hours(USER, 4).unwrap();
    }

    let ledger = ledger_on_disk(&temp);
    assert_eq!(ledger.get(USER).unwrap().video_hours_left, 6);
    assert!(matches!(
        ledger.debit_video_hours(USER, 7),
        Err(LedgerError::Exceeded { available: 6, .. })
    ));
}
