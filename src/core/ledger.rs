//! Per-user quota ledger.
//!
//! Every mutation is a single conditional or relative SQL statement run
//! inside an immediate transaction, so concurrent credits and debits never
//! lose updates and balances never go negative.

use std::fmt;

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use thiserror::Error;
use tracing::{debug, info, instrument};

use super::store::{self, Store, StoreError};
use crate::domain::{Quota, QuotaDefaults, QuotaUpdate};

/// Consumable resource tracked by the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Messages,
    VideoHours,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resource::Messages => write!(f, "messages"),
            Resource::VideoHours => write!(f, "video-hours"),
        }
    }
}

/// Errors raised by the ledger
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Not enough {resource}: requested {requested}, available {available}")]
    Exceeded {
        resource: Resource,
        requested: u32,
        available: u32,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Quota bookkeeping over the shared store
#[derive(Clone)]
pub struct QuotaLedger {
    store: Store,
    defaults: QuotaDefaults,
}

impl QuotaLedger {
    pub fn new(store: Store, defaults: QuotaDefaults) -> Self {
        Self { store, defaults }
    }

    /// Current quota; creates the row with defaults on first access and
    /// applies any due reset
    #[instrument(skip(self))]
    pub fn get(&self, user_email: &str) -> Result<Quota, LedgerError> {
        let now = Utc::now();
        self.store
            .transaction(|tx| Ok(self.load_current(tx, user_email, now)?))
    }

    /// Overwrite the given fields
    #[instrument(skip(self))]
    pub fn set(&self, user_email: &str, update: &QuotaUpdate) -> Result<Quota, LedgerError> {
        let now = Utc::now();
        self.store.transaction(|tx| {
            let current = self.load_current(tx, user_email, now)?;
            if update.is_empty() {
                return Ok(current);
            }
            store::update_quota_fields(tx, user_email, update, now)?;
            Ok(self.reload(tx, user_email)?)
        })
    }

    /// Add video-hours back to a user
    #[instrument(skip(self))]
    pub fn credit_video_hours(&self, user_email: &str, hours: u32) -> Result<Quota, LedgerError> {
        self.store
            .transaction(|tx| self.credit_within(tx, user_email, hours))
    }

    /// Take video-hours from a user; fails without side effects when the
    /// balance is short
    #[instrument(skip(self))]
    pub fn debit_video_hours(&self, user_email: &str, hours: u32) -> Result<Quota, LedgerError> {
        self.store
            .transaction(|tx| self.debit_within(tx, user_email, hours))
    }

    /// Spend one chat message
    #[instrument(skip(self))]
    pub fn consume_message(&self, user_email: &str) -> Result<Quota, LedgerError> {
        let now = Utc::now();
        self.store.transaction(|tx| {
            let current = self.load_current(tx, user_email, now)?;
            if store::subtract_message(tx, user_email, now)? == 0 {
                return Err(LedgerError::Exceeded {
                    resource: Resource::Messages,
                    requested: 1,
                    available: current.messages_left,
                });
            }
            Ok(self.reload(tx, user_email)?)
        })
    }

    /// Current quota inside a caller-owned transaction
    pub(crate) fn get_within(&self, conn: &Connection, user_email: &str) -> Result<Quota, LedgerError> {
        Ok(self.load_current(conn, user_email, Utc::now())?)
    }

    /// Credit inside a caller-owned transaction
    pub(crate) fn credit_within(
        &self,
        conn: &Connection,
        user_email: &str,
        hours: u32,
    ) -> Result<Quota, LedgerError> {
        let now = Utc::now();
        let current = self.load_current(conn, user_email, now)?;
        if hours == 0 {
            return Ok(current);
        }

        store::add_video_hours(conn, user_email, hours, now)?;
        info!(user = user_email, hours, "Credited video-hours");
        Ok(self.reload(conn, user_email)?)
    }

    /// Debit inside a caller-owned transaction
    pub(crate) fn debit_within(
        &self,
        conn: &Connection,
        user_email: &str,
        hours: u32,
    ) -> Result<Quota, LedgerError> {
        let now = Utc::now();
        let current = self.load_current(conn, user_email, now)?;
        if hours == 0 {
            return Ok(current);
        }

        if store::subtract_video_hours(conn, user_email, hours, now)? == 0 {
            return Err(LedgerError::Exceeded {
                resource: Resource::VideoHours,
                requested: hours,
                available: current.video_hours_left,
            });
        }

        info!(user = user_email, hours, "Debited video-hours");
        Ok(self.reload(conn, user_email)?)
    }

    fn load_current(
        &self,
        conn: &Connection,
        user_email: &str,
        now: DateTime<Utc>,
    ) -> Result<Quota, StoreError> {
        match store::select_quota(conn, user_email)? {
            None => {
                let quota = Quota::fresh(user_email, &self.defaults, now);
                store::insert_quota(conn, &quota)?;
                debug!(user = user_email, "Created quota with defaults");
                Ok(quota)
            }
            Some(quota) if quota.is_due_for_reset(now) => {
                let update = QuotaUpdate::new()
                    .messages_left(self.defaults.messages)
                    .video_hours_left(self.defaults.video_hours)
                    .reset_at(self.defaults.roll_forward(quota.reset_at, now));
                store::update_quota_fields(conn, user_email, &update, now)?;
                info!(user = user_email, "Quota period reset");
                self.reload(conn, user_email)
            }
            Some(quota) => Ok(quota),
        }
    }

    fn reload(&self, conn: &Connection, user_email: &str) -> Result<Quota, StoreError> {
        store::select_quota(conn, user_email)?
            .ok_or(StoreError::Sqlite(rusqlite::Error::QueryReturnedNoRows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn ledger() -> QuotaLedger {
        QuotaLedger::new(Store::open_in_memory().unwrap(), QuotaDefaults::default())
    }

    #[test]
    fn test_first_access_creates_defaults() {
        let ledger = ledger();
        let quota = ledger.get("a@x.com").unwrap();
        assert_eq!(quota.messages_left, 50);
        assert_eq!(quota.video_hours_left, 10);
    }

    #[test]
    fn test_debit_then_credit() {
        let ledger = ledger();

        let quota = ledger.debit_video_hours("a@x.com", 4).unwrap();
        assert_eq!(quota.video_hours_left, 6);

        let quota = ledger.credit_video_hours("a@x.com", 3).unwrap();
        assert_eq!(quota.video_hours_left, 9);
    }

    #[test]
    fn test_debit_beyond_balance_is_rejected() {
        let ledger = ledger();
        let err = ledger.debit_video_hours("a@x.com", 11).unwrap_err();

        match err {
            LedgerError::Exceeded {
                resource,
                requested,
                available,
            } => {
                assert_eq!(resource, Resource::VideoHours);
                assert_eq!(requested, 11);
                assert_eq!(available, 10);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(ledger.get("a@x.com").unwrap().video_hours_left, 10);
    }

    #[test]
    fn test_set_is_last_write_wins() {
        let ledger = ledger();
        ledger
            .set("a@x.com", &QuotaUpdate::new().video_hours_left(2))
            .unwrap();
        let quota = ledger
            .set("a@x.com", &QuotaUpdate::new().messages_left(7))
            .unwrap();

        assert_eq!(quota.video_hours_left, 2);
        assert_eq!(quota.messages_left, 7);
    }

    #[test]
    fn test_consume_message_stops_at_zero() {
        let ledger = ledger();
        ledger
            .set("a@x.com", &QuotaUpdate::new().messages_left(1))
            .unwrap();

        assert_eq!(ledger.consume_message("a@x.com").unwrap().messages_left, 0);
        assert!(matches!(
            ledger.consume_message("a@x.com"),
            Err(LedgerError::Exceeded {
                resource: Resource::Messages,
                ..
            })
        ));
    }

    #[test]
    fn test_due_reset_restores_defaults() {
        let ledger = ledger();
        let past = Utc::now() - Duration::days(1);
        ledger
            .set(
                "a@x.com",
                &QuotaUpdate::new().video_hours_left(0).reset_at(past),
            )
            .unwrap();

        let quota = ledger.get("a@x.com").unwrap();
        assert_eq!(quota.video_hours_left, 10);
        assert!(quota.reset_at > Utc::now());
    }

    #[test]
    fn test_zero_day_period_keeps_debits() {
        let defaults = QuotaDefaults {
            reset_period_days: 0,
            ..Default::default()
        };
        let ledger = QuotaLedger::new(Store::open_in_memory().unwrap(), defaults);

        ledger.debit_video_hours("a@x.com", 10).unwrap();
        assert_eq!(ledger.get("a@x.com").unwrap().video_hours_left, 0);
        assert!(ledger.debit_video_hours("a@x.com", 1).is_err());
    }

    #[test]
    fn test_concurrent_credits_are_not_lost() {
        let ledger = ledger();
        ledger
            .set("a@x.com", &QuotaUpdate::new().video_hours_left(0))
            .unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let ledger = ledger.clone();
                std::thread::spawn(move || {
                    for _ in 0..5 {
                        ledger.credit_video_hours("a@x.com", 1).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(ledger.get("a@x.com").unwrap().video_hours_left, 40);
    }
}
