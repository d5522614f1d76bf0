//! Two-phase drop-and-reseed of the playground schema.
//!
//! ```text
//! Idle -> Dropping -> Dropped -> Seeding -> Seeded
//!             |                     |
//!             v                     v
//!         DropFailed            SeedFailed
//! ```
//!
//! Seeding always follows a successful drop. A drop failure stops the run before
//! anything is recreated.

use std::sync::{Mutex, PoisonError};
use std::time::Instant;

use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use sqlsandbox_observability::{record_reset_completed, record_reset_failure, record_reset_phase};

use crate::error::{ResetStage, SandboxError, SandboxResult};
use crate::privilege::CallerIdentity;
use crate::seed::SeedPlan;
use crate::traits::SandboxStore;

/// Where a reset run currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResetPhase {
    /// Nothing started
    Idle,
    /// Dropping playground tables
    Dropping,
    /// Every playground table is gone
    Dropped,
    /// Drop stopped at a failure; nothing was reseeded
    DropFailed,
    /// Seed transaction in flight
    Seeding,
    /// Seed transaction committed
    Seeded,
    /// Seed transaction rolled back
    SeedFailed,
}

impl ResetPhase {
    /// Whether `next` is a legal successor of `self`.
    pub fn can_transition_to(self, next: ResetPhase) -> bool {
        use ResetPhase::*;
        matches!(
            (self, next),
            (Idle, Dropping)
                | (Dropping, Dropped)
                | (Dropping, DropFailed)
                | (Dropped, Seeding)
                | (Seeding, Seeded)
                | (Seeding, SeedFailed)
        )
    }

    /// Whether the run has ended.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ResetPhase::DropFailed | ResetPhase::Seeded | ResetPhase::SeedFailed
        )
    }

    /// Stable lowercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            ResetPhase::Idle => "idle",
            ResetPhase::Dropping => "dropping",
            ResetPhase::Dropped => "dropped",
            ResetPhase::DropFailed => "drop_failed",
            ResetPhase::Seeding => "seeding",
            ResetPhase::Seeded => "seeded",
            ResetPhase::SeedFailed => "seed_failed",
        }
    }
}

/// Single reset attempt; advances only along legal transitions.
#[derive(Debug)]
struct ResetRun {
    id: Uuid,
    phase: ResetPhase,
    history: Vec<ResetPhase>,
}

impl ResetRun {
    fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            phase: ResetPhase::Idle,
            history: vec![ResetPhase::Idle],
        }
    }

    fn advance(&mut self, next: ResetPhase) -> SandboxResult<()> {
        if !self.phase.can_transition_to(next) {
            return Err(SandboxError::internal(format!(
                "illegal reset transition {} -> {}",
                self.phase.as_str(),
                next.as_str()
            )));
        }
        self.phase = next;
        self.history.push(next);
        record_reset_phase(self.id, next.as_str());
        Ok(())
    }
}

/// Restores the playground schema to its seeded state.
pub struct SandboxResetter<S> {
    store: S,
    plan: SeedPlan,
    last_run: Mutex<Vec<ResetPhase>>,
}

impl<S: SandboxStore> SandboxResetter<S> {
    /// Resetter applying `plan` through `store`.
    pub fn new(store: S, plan: SeedPlan) -> Self {
        Self {
            store,
            plan,
            last_run: Mutex::new(vec![ResetPhase::Idle]),
        }
    }

    /// The underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Phases visited by the most recent run, starting with `Idle`.
    pub fn last_run(&self) -> Vec<ResetPhase> {
        self.last_run
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Drops and reseeds the playground schema.
    ///
    /// Requires an admin caller. Not serialized against concurrent statements.
    pub async fn reset(&self, identity: Option<&CallerIdentity>) -> SandboxResult<()> {
        let identity = identity.ok_or(SandboxError::AuthenticationRequired)?;
        if !identity.role.is_privileged() {
            warn!(user = %identity.username, "reset refused for unprivileged caller");
            return Err(SandboxError::AccessDenied);
        }

        let started = Instant::now();
        let mut run = ResetRun::new();
        info!(
            reset_id = %run.id,
            user = %identity.username,
            schema = self.plan.schema(),
            "resetting sandbox"
        );

        let outcome = self.drive(&mut run).await;
        *self.last_run.lock().unwrap_or_else(PoisonError::into_inner) = run.history.clone();

        match &outcome {
            Ok(()) => record_reset_completed(run.id, started.elapsed()),
            Err(err) => {
                let stage = match err {
                    SandboxError::Reset {
                        stage: ResetStage::Drop,
                        ..
                    } => "drop",
                    SandboxError::Reset {
                        stage: ResetStage::Seed,
                        ..
                    } => "seed",
                    _ => "internal",
                };
                record_reset_failure(run.id, stage, &err.log_detail());
            }
        }
        outcome
    }

    async fn drive(&self, run: &mut ResetRun) -> SandboxResult<()> {
        run.advance(ResetPhase::Dropping)?;
        match self.store.drop_schema_tables(self.plan.schema()).await {
            Ok(dropped) => {
                info!(reset_id = %run.id, dropped, "dropped playground tables");
                run.advance(ResetPhase::Dropped)?;
            }
            Err(err) => {
                run.advance(ResetPhase::DropFailed)?;
                return Err(SandboxError::reset(ResetStage::Drop, err.log_detail()));
            }
        }

        run.advance(ResetPhase::Seeding)?;
        match self.store.reseed(&self.plan).await {
            Ok(()) => {
                run.advance(ResetPhase::Seeded)?;
                info!(reset_id = %run.id, "sandbox reseeded");
                Ok(())
            }
            Err(err) => {
                run.advance(ResetPhase::SeedFailed)?;
                Err(SandboxError::reset(ResetStage::Seed, err.log_detail()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::MockSandboxStore;
    use crate::privilege::Privilege;
    use crate::seed::SEED_TABLES;

    fn admin() -> CallerIdentity {
        CallerIdentity::new("teacher", Privilege::Admin)
    }

    fn resetter(store: MockSandboxStore) -> SandboxResetter<MockSandboxStore> {
        SandboxResetter::new(store, SeedPlan::new("playground", "learner"))
    }

    #[test]
    fn only_documented_transitions_are_legal() {
        use ResetPhase::*;
        assert!(Idle.can_transition_to(Dropping));
        assert!(Dropped.can_transition_to(Seeding));
        assert!(!Idle.can_transition_to(Seeding));
        assert!(!DropFailed.can_transition_to(Seeding));
        assert!(!Seeded.can_transition_to(Dropping));
        assert!(DropFailed.is_terminal() && Seeded.is_terminal() && SeedFailed.is_terminal());
        assert!(!Dropped.is_terminal());
    }

    #[tokio::test]
    async fn successful_reset_visits_every_phase() {
        let store = MockSandboxStore::with_tables(&["students", "scratch"]);
        let resetter = resetter(store);
        resetter.reset(Some(&admin())).await.expect("reset");

        use ResetPhase::*;
        assert_eq!(
            resetter.last_run(),
            vec![Idle, Dropping, Dropped, Seeding, Seeded]
        );
        let tables = resetter.store().tables();
        assert_eq!(tables.len(), SEED_TABLES.len());
        assert!(!tables.contains(&"scratch".to_string()));
    }

    #[tokio::test]
    async fn reset_is_idempotent() {
        let resetter = resetter(MockSandboxStore::with_tables(&[]));
        resetter.reset(Some(&admin())).await.expect("first reset");
        let first = resetter.store().tables();
        resetter.reset(Some(&admin())).await.expect("second reset");
        assert_eq!(resetter.store().tables(), first);
        assert_eq!(resetter.store().seed_calls().len(), 2);
    }

    #[tokio::test]
    async fn drop_failure_skips_seeding() {
        let store = MockSandboxStore::with_tables(&["students"]);
        store.fail_drop_with("permission denied for table students");
        let resetter = resetter(store);

        let err = resetter.reset(Some(&admin())).await.unwrap_err();
        assert!(matches!(
            err,
            SandboxError::Reset {
                stage: ResetStage::Drop,
                ..
            }
        ));
        assert_eq!(err.to_string(), "failed to reset sandbox");
        assert!(resetter.store().seed_calls().is_empty());
        assert_eq!(resetter.last_run().last(), Some(&ResetPhase::DropFailed));
    }

    #[tokio::test]
    async fn seed_failure_reports_the_seed_stage() {
        let store = MockSandboxStore::with_tables(&["students"]);
        store.fail_seed_with("duplicate key value");
        let resetter = resetter(store);

        let err = resetter.reset(Some(&admin())).await.unwrap_err();
        assert_eq!(err.to_string(), "sandbox reset incomplete due to seeding error");
        assert!(!err.to_string().contains("duplicate"));
        assert_eq!(resetter.last_run().last(), Some(&ResetPhase::SeedFailed));
    }

    #[tokio::test]
    async fn reset_requires_an_admin_identity() {
        let resetter = resetter(MockSandboxStore::with_tables(&["students"]));
        assert_eq!(
            resetter.reset(None).await.unwrap_err(),
            SandboxError::AuthenticationRequired
        );
        let practice = CallerIdentity::new("learner", Privilege::Practice);
        assert_eq!(
            resetter.reset(Some(&practice)).await.unwrap_err(),
            SandboxError::AccessDenied
        );
        assert_eq!(resetter.store().drop_calls(), 0);
    }
}
