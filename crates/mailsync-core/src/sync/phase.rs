//! Per-invocation sync state machine.

use std::fmt;

use tracing::{debug, warn};

use crate::account::AccountId;
use crate::error::Error;
use crate::service::FetchStage;

/// Stage of a single `sync_messages` run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    /// Not running.
    Idle,
    /// Opening and authenticating the remote connection.
    Connecting,
    /// Listing remote identifiers.
    Listing,
    /// Fetching and parsing a batch.
    FetchingBatch,
    /// Writing the batch into the cache.
    Merging,
    /// A stage failed; the run returns to `Idle` next.
    Failed,
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Listing => "listing",
            Self::FetchingBatch => "fetching",
            Self::Merging => "merging",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Records and traces the phases of one sync run.
///
/// `Idle -> Connecting -> Listing -> FetchingBatch -> Merging -> Idle` on
/// success, `... -> Failed -> Idle` when any stage errors.
#[derive(Debug, Clone)]
pub struct SyncRun {
    account: AccountId,
    folder: String,
    phase: SyncPhase,
    history: Vec<SyncPhase>,
}

impl SyncRun {
    /// Starts an idle run.
    #[must_use]
    pub fn new(account: AccountId, folder: impl Into<String>) -> Self {
        Self {
            account,
            folder: folder.into(),
            phase: SyncPhase::Idle,
            history: vec![SyncPhase::Idle],
        }
    }

    /// Current phase.
    #[must_use]
    pub const fn phase(&self) -> SyncPhase {
        self.phase
    }

    /// Every phase entered so far, starting with `Idle`.
    #[must_use]
    pub fn history(&self) -> &[SyncPhase] {
        &self.history
    }

    /// Moves to `next`.
    pub fn advance(&mut self, next: SyncPhase) {
        if next == self.phase {
            return;
        }
        debug!(
            account = %self.account,
            folder = %self.folder,
            from = %self.phase,
            to = %next,
            "Sync phase"
        );
        self.phase = next;
        self.history.push(next);
    }

    /// Maps a progress report from the mailbox client onto the run.
    pub fn observe(&mut self, stage: FetchStage) {
        match stage {
            FetchStage::Listing => self.advance(SyncPhase::Listing),
            FetchStage::FetchingBatch { count } => {
                debug!(account = %self.account, folder = %self.folder, count, "Fetching batch");
                self.advance(SyncPhase::FetchingBatch);
            }
        }
    }

    /// Records a failure in the current stage and returns to `Idle`.
    pub fn fail(&mut self, error: &Error) {
        warn!(
            account = %self.account,
            folder = %self.folder,
            stage = %self.phase,
            remediation = ?error.remediation(),
            error = %error,
            "Sync failed"
        );
        self.advance(SyncPhase::Failed);
        self.advance(SyncPhase::Idle);
    }

    /// Ends a successful run.
    pub fn finish(&mut self) {
        self.advance(SyncPhase::Idle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn successful_run_walks_every_stage() {
        let mut run = SyncRun::new(AccountId::new(1), "INBOX");
        run.advance(SyncPhase::Connecting);
        run.observe(FetchStage::Listing);
        run.observe(FetchStage::FetchingBatch { count: 3 });
        run.advance(SyncPhase::Merging);
        run.finish();

        assert_eq!(
            run.history(),
            &[
                SyncPhase::Idle,
                SyncPhase::Connecting,
                SyncPhase::Listing,
                SyncPhase::FetchingBatch,
                SyncPhase::Merging,
                SyncPhase::Idle,
            ]
        );
    }

    #[test]
    fn failure_returns_to_idle() {
        let mut run = SyncRun::new(AccountId::new(1), "INBOX");
        run.advance(SyncPhase::Connecting);
        run.fail(&Error::Configuration("missing".into()));

        assert_eq!(run.phase(), SyncPhase::Idle);
        assert_eq!(
            run.history(),
            &[
                SyncPhase::Idle,
                SyncPhase::Connecting,
                SyncPhase::Failed,
                SyncPhase::Idle
            ]
        );
    }

    #[test]
    fn repeated_phase_is_recorded_once() {
        let mut run = SyncRun::new(AccountId::new(1), "INBOX");
        run.advance(SyncPhase::Connecting);
        run.advance(SyncPhase::Connecting);
        assert_eq!(run.history().len(), 2);
    }
}
