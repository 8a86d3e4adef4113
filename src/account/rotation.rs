//! Credential rotation controller
//!
//! A small state machine over the pool. Each credential is in one of
//! three states: untried-this-round, tried-this-round, or disabled
//! (error count at threshold). Selection prefers already-logged-in
//! credentials, then lower error counts. Two failure signals demote a
//! credential (rate-limited, token-expired); the request quota rotates
//! voluntarily without penalty, so healthy credentials are not disabled
//! just because they were used a lot.

use crate::account::{CredentialRecord, CredentialStore, PoolError};
use crate::config::PoolConfig;
use chrono::Utc;
use std::collections::HashSet;

/// Rotation tunables, lifted out of [`PoolConfig`] so tests can build
/// controllers without a full configuration
#[derive(Debug, Clone)]
pub struct RotationPolicy {
    /// Error count at which a credential is disabled
    pub error_threshold: u32,
    /// Seconds since last use before a credential re-qualifies
    pub cooldown_secs: u64,
    /// Successful requests on one credential before voluntary rotation
    pub request_quota: u32,
}

impl From<&PoolConfig> for RotationPolicy {
    fn from(config: &PoolConfig) -> Self {
        Self {
            error_threshold: config.error_threshold,
            cooldown_secs: config.cooldown_secs,
            request_quota: config.request_quota,
        }
    }
}

/// Aggregate pool health, for progress logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    pub total: usize,
    pub available: usize,
    pub logged_in: usize,
    pub tried_this_round: usize,
    pub round: u32,
}

/// Owns the working set of credential records and selects among them
pub struct RotationController {
    records: Vec<CredentialRecord>,
    store: CredentialStore,
    policy: RotationPolicy,
    round: u32,
    tried_this_round: HashSet<String>,
    requests_on_current: u32,
}

impl RotationController {
    /// Builds a controller over explicit records (snapshot already merged)
    pub fn new(
        records: Vec<CredentialRecord>,
        store: CredentialStore,
        policy: RotationPolicy,
    ) -> Self {
        Self {
            records,
            store,
            policy,
            round: 1,
            tried_this_round: HashSet::new(),
            requests_on_current: 0,
        }
    }

    /// Builds a controller from configuration, overlaying any persisted
    /// snapshot state (tokens, counters) onto the configured identities
    pub fn from_config(config: &PoolConfig) -> Result<Self, PoolError> {
        let store = CredentialStore::new(&config.snapshot_path);

        let mut records: Vec<CredentialRecord> = config
            .credentials
            .iter()
            .map(|entry| CredentialRecord::new(entry.handle.clone(), entry.secret.clone()))
            .collect();

        if let Some(saved) = store.load()? {
            for saved_record in saved {
                match records.iter_mut().find(|r| r.handle == saved_record.handle) {
                    Some(record) => {
                        // Configuration wins for the secret; the snapshot
                        // wins for everything it tracked.
                        let secret = record.secret.clone();
                        *record = saved_record;
                        if secret.is_some() {
                            record.secret = secret;
                        }
                    }
                    None => records.push(saved_record),
                }
            }
        }

        tracing::info!(
            "Credential pool loaded: {} identities ({} logged in)",
            records.len(),
            records.iter().filter(|r| r.is_logged_in).count()
        );

        Ok(Self::new(records, store, RotationPolicy::from(config)))
    }

    /// Selects the next usable credential and marks it tried-this-round
    ///
    /// Candidates are the available credentials not yet tried this round,
    /// ordered logged-in first, then by ascending error count. When no
    /// candidate exists a new round is attempted; failing that, the pool
    /// is exhausted.
    pub fn select(&mut self) -> Result<String, PoolError> {
        let now = Utc::now().timestamp();

        if self.pick_candidate().is_none() && !self.begin_new_round(now) {
            return Err(PoolError::Exhausted { round: self.round });
        }

        let index = self
            .pick_candidate()
            .ok_or(PoolError::Exhausted { round: self.round })?;

        let record = &mut self.records[index];
        record.mark_used(now);
        let handle = record.handle.clone();
        self.tried_this_round.insert(handle.clone());
        self.requests_on_current = 0;
        self.persist();

        tracing::info!(round = self.round, handle = %handle, "Selected credential");
        Ok(handle)
    }

    fn pick_candidate(&self) -> Option<usize> {
        let mut candidates: Vec<usize> = self
            .records
            .iter()
            .enumerate()
            .filter(|(_, r)| r.is_available && !self.tried_this_round.contains(&r.handle))
            .map(|(i, _)| i)
            .collect();

        candidates.sort_by_key(|&i| {
            let r = &self.records[i];
            (!r.is_logged_in, r.error_count)
        });
        candidates.first().copied()
    }

    /// Begins a new round if some credential qualifies (no usage history,
    /// or cooldown elapsed). Qualifying credentials get their tried marks
    /// cleared and are explicitly reset.
    fn begin_new_round(&mut self, now: i64) -> bool {
        let qualifying: Vec<String> = self
            .records
            .iter()
            .filter(|r| r.cooldown_elapsed(self.policy.cooldown_secs, now))
            .map(|r| r.handle.clone())
            .collect();

        if qualifying.is_empty() {
            return false;
        }

        self.round += 1;
        for handle in &qualifying {
            self.tried_this_round.remove(handle);
            if let Some(record) = self.records.iter_mut().find(|r| &r.handle == handle) {
                record.reset();
            }
        }
        tracing::info!(
            round = self.round,
            reset = qualifying.len(),
            "Beginning new rotation round"
        );
        true
    }

    /// Demotes `handle` after a server rate-limit signal and selects a
    /// replacement
    pub fn report_rate_limited(&mut self, handle: &str) -> Result<String, PoolError> {
        tracing::warn!(handle, "Credential rate limited; rotating");
        self.demote(handle)?;
        self.select()
    }

    /// Demotes `handle` after a token-expiry signal and selects a
    /// replacement. Same recovery as rate limiting, but logged under a
    /// distinct category for operator visibility.
    pub fn report_token_expired(&mut self, handle: &str) -> Result<String, PoolError> {
        tracing::warn!(handle, "Credential token expired; rotating");
        self.demote(handle)?;
        self.select()
    }

    /// Demotes `handle` after a login failure and selects a replacement
    pub fn report_login_failed(&mut self, handle: &str) -> Result<String, PoolError> {
        tracing::warn!(handle, "Credential login failed; rotating");
        self.demote(handle)?;
        self.select()
    }

    /// Rotates away from `handle` after it served its request quota.
    /// Voluntary: the credential keeps its availability and error count.
    pub fn report_quota_reached(&mut self, handle: &str) -> Result<String, PoolError> {
        let record = self.record_mut(handle)?;
        record.mark_used(Utc::now().timestamp());
        tracing::info!(handle, "Request quota reached; rotating without penalty");
        self.persist();
        self.select()
    }

    /// Records one successful request on `handle`; returns true once the
    /// request quota for the current selection is reached
    pub fn record_use(&mut self, handle: &str) -> Result<bool, PoolError> {
        let now = Utc::now().timestamp();
        let record = self.record_mut(handle)?;
        record.request_count += 1;
        record.mark_used(now);
        self.requests_on_current += 1;
        self.persist();
        Ok(self.requests_on_current >= self.policy.request_quota)
    }

    /// Applies freshly harvested session artifacts to `handle`
    pub fn apply_artifacts(
        &mut self,
        handle: &str,
        artifacts: crate::auth::SessionArtifacts,
    ) -> Result<(), PoolError> {
        self.record_mut(handle)?.apply_artifacts(artifacts);
        self.persist();
        Ok(())
    }

    fn demote(&mut self, handle: &str) -> Result<(), PoolError> {
        let threshold = self.policy.error_threshold;
        let record = self.record_mut(handle)?;
        record.record_error(threshold);
        // Demotion always sidelines the credential for this round; the
        // threshold governs whether a round reset may revive it.
        record.is_available = false;
        self.persist();
        Ok(())
    }

    fn record_mut(&mut self, handle: &str) -> Result<&mut CredentialRecord, PoolError> {
        self.records
            .iter_mut()
            .find(|r| r.handle == handle)
            .ok_or_else(|| PoolError::UnknownHandle(handle.to_string()))
    }

    /// Looks up a record by handle
    pub fn credential(&self, handle: &str) -> Option<&CredentialRecord> {
        self.records.iter().find(|r| r.handle == handle)
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn status(&self) -> PoolStatus {
        PoolStatus {
            total: self.records.len(),
            available: self.records.iter().filter(|r| r.is_available).count(),
            logged_in: self.records.iter().filter(|r| r.is_logged_in).count(),
            tried_this_round: self.tried_this_round.len(),
            round: self.round,
        }
    }

    fn persist(&self) {
        if let Err(e) = self.store.save(&self.records) {
            tracing::warn!("Failed to persist credential snapshot: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_controller(handles: &[&str], policy: RotationPolicy) -> (RotationController, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = CredentialStore::new(dir.path().join("pool.json"));
        let records = handles
            .iter()
            .map(|h| CredentialRecord::new(*h, None))
            .collect();
        (RotationController::new(records, store, policy), dir)
    }

    fn default_policy() -> RotationPolicy {
        RotationPolicy {
            error_threshold: 5,
            cooldown_secs: 300,
            request_quota: 50,
        }
    }

    #[test]
    fn test_no_repeat_within_round() {
        let (mut pool, _dir) = test_controller(&["a", "b", "c"], default_policy());

        let first = pool.select().unwrap();
        let second = pool.select().unwrap();
        let third = pool.select().unwrap();

        let mut picked = vec![first, second, third];
        picked.sort();
        picked.dedup();
        assert_eq!(picked.len(), 3);
    }

    #[test]
    fn test_exhaustion_after_rate_limits() {
        let (mut pool, _dir) = test_controller(&["a", "b", "c"], default_policy());

        // Selection stamps last_used, so no cooldown can elapse here.
        let first = pool.select().unwrap();
        let second = pool.report_rate_limited(&first).unwrap();
        let third = pool.report_rate_limited(&second).unwrap();
        let result = pool.report_rate_limited(&third);

        assert!(matches!(result, Err(PoolError::Exhausted { .. })));
    }

    #[test]
    fn test_logged_in_credentials_preferred() {
        let dir = TempDir::new().unwrap();
        let store = CredentialStore::new(dir.path().join("pool.json"));
        let mut plain = CredentialRecord::new("plain", None);
        plain.error_count = 0;
        let mut session = CredentialRecord::new("session", None);
        session.is_logged_in = true;
        session.error_count = 3;

        let mut pool =
            RotationController::new(vec![plain, session], store, default_policy());
        // Logged-in wins even with a higher error count
        assert_eq!(pool.select().unwrap(), "session");
    }

    #[test]
    fn test_lower_error_count_preferred() {
        let dir = TempDir::new().unwrap();
        let store = CredentialStore::new(dir.path().join("pool.json"));
        let mut worn = CredentialRecord::new("worn", None);
        worn.error_count = 3;
        let fresh = CredentialRecord::new("fresh", None);

        let mut pool = RotationController::new(vec![worn, fresh], store, default_policy());
        assert_eq!(pool.select().unwrap(), "fresh");
    }

    #[test]
    fn test_cooldown_zero_allows_new_round() {
        let mut policy = default_policy();
        policy.cooldown_secs = 0;
        let (mut pool, _dir) = test_controller(&["only"], policy);

        let first = pool.select().unwrap();
        // The sole credential was demoted, but a zero cooldown lets a new
        // round revive it immediately.
        let second = pool.report_rate_limited(&first).unwrap();
        assert_eq!(second, "only");
        assert_eq!(pool.round(), 2);
        assert_eq!(pool.credential("only").unwrap().error_count, 0);
    }

    #[test]
    fn test_quota_rotation_keeps_credential_healthy() {
        let mut policy = default_policy();
        policy.request_quota = 2;
        let (mut pool, _dir) = test_controller(&["a", "b"], policy);

        let first = pool.select().unwrap();
        assert!(!pool.record_use(&first).unwrap());
        assert!(pool.record_use(&first).unwrap());

        let second = pool.report_quota_reached(&first).unwrap();
        assert_ne!(second, first);

        let original = pool.credential(&first).unwrap();
        assert!(original.is_available);
        assert_eq!(original.error_count, 0);
    }

    #[test]
    fn test_demotion_disables_at_threshold() {
        let mut policy = default_policy();
        policy.cooldown_secs = 0;
        policy.error_threshold = 2;
        let (mut pool, _dir) = test_controller(&["a", "b"], policy);

        let first = pool.select().unwrap();
        pool.report_rate_limited(&first).unwrap();
        assert!(!pool.credential(&first).unwrap().is_available);
    }

    #[test]
    fn test_unknown_handle() {
        let (mut pool, _dir) = test_controller(&["a"], default_policy());
        assert!(matches!(
            pool.record_use("missing"),
            Err(PoolError::UnknownHandle(_))
        ));
    }

    #[test]
    fn test_status_counts() {
        let (mut pool, _dir) = test_controller(&["a", "b", "c"], default_policy());
        pool.select().unwrap();

        let status = pool.status();
        assert_eq!(status.total, 3);
        assert_eq!(status.available, 3);
        assert_eq!(status.tried_this_round, 1);
        assert_eq!(status.round, 1);
    }
}
