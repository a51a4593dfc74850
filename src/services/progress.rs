// src/services/progress.rs

//! Progress reconciliation.
//!
//! Every update is turned into max / increment / set operators so that two
//! updates to the same (student, course) commute: applying them in either
//! order gives the same record.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    config::{MAX_PERCENT, MAX_TIME_INCREMENT_SECONDS, MIN_PERCENT, TRANSIENT_RETRIES},
    error::AppError,
    models::progress::{
        ProgressKey, ProgressMerge, ProgressRecord, ProgressStatus, ProgressUpdate, ProgressWrite,
        UpsertProgress,
    },
    store::ProgressStore,
};

/// Caps a single time report to bound the effect of one bad client.
pub fn clamp_time_delta(delta: Option<i64>) -> i64 {
    delta.unwrap_or(0).clamp(0, MAX_TIME_INCREMENT_SECONDS)
}

fn clamp_percent(percent: f64) -> f64 {
    percent.clamp(MIN_PERCENT, MAX_PERCENT)
}

/// Decides the write for `key` given what is currently stored.
///
/// Never reads back a value this same update changes: the status is derived
/// from `max(existing, update)` computed here, not from the stored result.
pub fn plan_write(
    key: ProgressKey,
    update: &ProgressUpdate,
    existing: Option<&ProgressRecord>,
    now: DateTime<Utc>,
) -> ProgressWrite {
    match existing {
        None => {
            let percent = clamp_percent(update.percent.unwrap_or(0.0));
            ProgressWrite::Insert(ProgressRecord {
                id: Uuid::new_v4(),
                student_id: key.student_id,
                course_id: key.course_id,
                status: update
                    .status
                    .unwrap_or_else(|| ProgressStatus::from_percent(percent)),
                percent,
                total_time_spent: clamp_time_delta(update.time_delta),
                last_accessed: now,
                created_at: now,
                updated_at: now,
            })
        }
        Some(current) => {
            let percent_floor = update.percent.map(clamp_percent);
            let merged_percent = percent_floor.map_or(current.percent, |p| current.percent.max(p));
            let status = update
                .status
                .unwrap_or_else(|| ProgressStatus::from_percent(merged_percent));

            ProgressWrite::Merge(ProgressMerge {
                percent_floor,
                time_increment: clamp_time_delta(update.time_delta),
                status: (status != current.status).then_some(status),
                last_accessed: now,
            })
        }
    }
}

/// Creates or merges the progress record of a (student, course) pair.
///
/// Returns the stored record and `true` when it was created by this call.
/// A transient store conflict is retried once before being surfaced.
pub async fn upsert_progress<S>(
    store: &S,
    cmd: UpsertProgress,
) -> Result<(ProgressRecord, bool), AppError>
where
    S: ProgressStore + ?Sized,
{
    let UpsertProgress { key, update } = cmd;
    let mut attempt = 0;

    loop {
        let now = Utc::now();
        let plan = |existing: Option<&ProgressRecord>| plan_write(key, &update, existing, now);

        match store.apply_progress(key, &plan).await {
            Ok((record, created)) => {
                tracing::info!(
                    student_id = %key.student_id,
                    course_id = %key.course_id,
                    created,
                    percent = record.percent,
                    total_time_spent = record.total_time_spent,
                    status = %record.status,
                    "Progress reconciled"
                );
                return Ok((record, created));
            }
            Err(e) if e.is_transient() && attempt < TRANSIENT_RETRIES => {
                attempt += 1;
                tracing::warn!(
                    student_id = %key.student_id,
                    course_id = %key.course_id,
                    "Transient store conflict on progress update, retrying ({}): {}",
                    attempt,
                    e
                );
            }
            Err(e) => return Err(e),
        }
    }
}

/// Progress of one student on one course. `None` means no activity yet.
pub async fn find_progress<S>(store: &S, key: ProgressKey) -> Result<Option<ProgressRecord>, AppError>
where
    S: ProgressStore + ?Sized,
{
    store.find_progress(key).await
}

pub async fn list_progress<S>(store: &S, student_id: Uuid) -> Result<Vec<ProgressRecord>, AppError>
where
    S: ProgressStore + ?Sized,
{
    store.list_progress(student_id).await
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    use async_trait::async_trait;

    use super::*;
    use crate::{
        models::{course::Course, user::User},
        store::{MemoryStore, ProgressPlanner},
    };

    fn key() -> ProgressKey {
        ProgressKey {
            student_id: Uuid::new_v4(),
            course_id: Uuid::new_v4(),
        }
    }

    fn update(percent: Option<f64>, delta: Option<i64>) -> ProgressUpdate {
        ProgressUpdate {
            status: None,
            percent,
            time_delta: delta,
        }
    }

    fn store_with_course(key: ProgressKey) -> MemoryStore {
        let store = MemoryStore::new();
        store
            .insert_course(Course {
                id: key.course_id,
                title: "Networks".to_string(),
            })
            .unwrap();
        store
            .insert_user_record(User {
                id: key.student_id,
                ..User::new_student(&format!("{}@example.com", key.student_id), "Student", String::new())
            })
            .unwrap();
        store
    }

    async fn apply(store: &MemoryStore, key: ProgressKey, update: ProgressUpdate) -> ProgressRecord {
        upsert_progress(store, UpsertProgress { key, update }).await.unwrap().0
    }

    #[test]
    fn test_clamp_time_delta() {
        assert_eq!(clamp_time_delta(None), 0);
        assert_eq!(clamp_time_delta(Some(300)), 300);
        assert_eq!(clamp_time_delta(Some(10_000)), 7200);
        assert_eq!(clamp_time_delta(Some(-4)), 0);
    }

    #[test]
    fn test_plan_insert_derives_status() {
        let k = key();
        let now = Utc::now();
        match plan_write(k, &update(Some(40.0), None), None, now) {
            ProgressWrite::Insert(r) => {
                assert_eq!(r.status, ProgressStatus::InProgress);
                assert_eq!(r.percent, 40.0);
                assert_eq!(r.total_time_spent, 0);
                assert_eq!(r.last_accessed, now);
            }
            other => panic!("expected insert, got {:?}", other),
        }
    }

    #[test]
    fn test_plan_merge_skips_unchanged_status() {
        let k = key();
        let now = Utc::now();
        let ProgressWrite::Insert(existing) = plan_write(k, &update(Some(40.0), None), None, now) else {
            panic!("expected insert");
        };
        let ProgressWrite::Merge(merge) = plan_write(k, &update(Some(20.0), Some(300)), Some(&existing), now) else {
            panic!("expected merge");
        };
        assert_eq!(merge.status, None);
        assert_eq!(merge.time_increment, 300);
        assert_eq!(merge.percent_floor, Some(20.0));
    }

    #[test]
    fn test_plan_merge_keeps_explicit_status() {
        let k = key();
        let now = Utc::now();
        let ProgressWrite::Insert(existing) = plan_write(k, &update(Some(100.0), None), None, now) else {
            panic!("expected insert");
        };
        let explicit = ProgressUpdate {
            status: Some(ProgressStatus::InProgress),
            ..Default::default()
        };
        let ProgressWrite::Merge(merge) = plan_write(k, &explicit, Some(&existing), now) else {
            panic!("expected merge");
        };
        assert_eq!(merge.status, Some(ProgressStatus::InProgress));
    }

    #[tokio::test]
    async fn test_first_update_then_lower_percent() {
        let k = key();
        let store = store_with_course(k);

        let first = apply(&store, k, update(Some(40.0), None)).await;
        assert_eq!(first.status, ProgressStatus::InProgress);
        assert_eq!(first.percent, 40.0);
        assert_eq!(first.total_time_spent, 0);

        let second = apply(&store, k, update(Some(20.0), Some(300))).await;
        assert_eq!(second.percent, 40.0);
        assert_eq!(second.total_time_spent, 300);
        assert_eq!(second.status, ProgressStatus::InProgress);
        assert_eq!(second.id, first.id);
        assert!(second.last_accessed >= first.last_accessed);
    }

    #[tokio::test]
    async fn test_full_percent_completes() {
        let k = key();
        let store = store_with_course(k);
        apply(&store, k, update(Some(10.0), None)).await;
        let done = apply(&store, k, update(Some(100.0), None)).await;
        assert_eq!(done.status, ProgressStatus::Completed);
    }

    #[tokio::test]
    async fn test_large_delta_is_clamped() {
        let k = key();
        let store = store_with_course(k);
        let created = apply(&store, k, update(None, Some(10_000))).await;
        assert_eq!(created.total_time_spent, 7200);
        let merged = apply(&store, k, update(None, Some(10_000))).await;
        assert_eq!(merged.total_time_spent, 14_400);
    }

    #[tokio::test]
    async fn test_percent_never_decreases_in_any_order() {
        let orders: [[f64; 4]; 3] = [
            [10.0, 80.0, 30.0, 55.0],
            [80.0, 55.0, 30.0, 10.0],
            [30.0, 10.0, 55.0, 80.0],
        ];
        for order in orders {
            let k = key();
            let store = store_with_course(k);
            let mut last = 0.0;
            for p in order {
                let r = apply(&store, k, update(Some(p), None)).await;
                assert!(r.percent >= last);
                last = r.percent;
            }
            assert_eq!(last, 80.0);
        }
    }

    #[tokio::test]
    async fn test_concurrent_updates_do_not_lose_time() {
        let k = key();
        let store = Arc::new(store_with_course(k));
        apply(&store, k, update(Some(5.0), None)).await;

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move {
                    upsert_progress(
                        store.as_ref(),
                        UpsertProgress {
                            key: k,
                            update: update(Some(i as f64), Some(if i % 2 == 0 { 100 } else { 9000 })),
                        },
                    )
                    .await
                })
            })
            .collect();
        for h in handles {
            h.await.unwrap().unwrap();
        }

        let stored = store.find_progress(k).await.unwrap().unwrap();
        assert_eq!(stored.total_time_spent, 8 * 100 + 8 * 7200);
        assert_eq!(stored.percent, 15.0);
    }

    #[tokio::test]
    async fn test_resend_is_not_idempotent() {
        let k = key();
        let store = store_with_course(k);
        let same = update(Some(50.0), Some(60));
        apply(&store, k, same).await;
        let resent = apply(&store, k, same).await;
        assert_eq!(resent.total_time_spent, 120);
        assert_eq!(resent.percent, 50.0);
    }

    #[tokio::test]
    async fn test_unknown_course_is_not_found() {
        let store = MemoryStore::new();
        let res = upsert_progress(
            &store,
            UpsertProgress {
                key: key(),
                update: update(Some(10.0), None),
            },
        )
        .await;
        assert!(matches!(res, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_unregistered_student_is_not_found() {
        let k = key();
        let store = store_with_course(k);
        let stranger = ProgressKey {
            student_id: Uuid::new_v4(),
            ..k
        };
        let res = upsert_progress(
            &store,
            UpsertProgress {
                key: stranger,
                update: update(Some(10.0), None),
            },
        )
        .await;
        assert!(matches!(res, Err(AppError::NotFound(_))));
        assert!(store.find_progress(stranger).await.unwrap().is_none());
    }

    /// Fails the first `failures` writes with a transient error.
    struct FlakyStore {
        inner: MemoryStore,
        failures: usize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ProgressStore for FlakyStore {
        async fn find_progress(&self, key: ProgressKey) -> Result<Option<ProgressRecord>, AppError> {
            self.inner.find_progress(key).await
        }

        async fn list_progress(&self, student_id: Uuid) -> Result<Vec<ProgressRecord>, AppError> {
            self.inner.list_progress(student_id).await
        }

        async fn apply_progress(
            &self,
            key: ProgressKey,
            plan: ProgressPlanner<'_>,
        ) -> Result<(ProgressRecord, bool), AppError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) < self.failures {
                return Err(AppError::TransientStore("write conflict".to_string()));
            }
            self.inner.apply_progress(key, plan).await
        }
    }

    fn flaky(k: ProgressKey, failures: usize) -> FlakyStore {
        FlakyStore {
            inner: store_with_course(k),
            failures,
            calls: AtomicUsize::new(0),
        }
    }

    #[tokio::test]
    async fn test_transient_conflict_is_retried_once() {
        let k = key();
        let store = flaky(k, 1);
        let (record, created) = upsert_progress(
            &store,
            UpsertProgress {
                key: k,
                update: update(Some(30.0), Some(10)),
            },
        )
        .await
        .unwrap();
        assert!(created);
        assert_eq!(record.total_time_spent, 10);
        assert_eq!(store.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_repeated_conflict_is_surfaced_without_side_effects() {
        let k = key();
        let store = flaky(k, 2);
        let res = upsert_progress(
            &store,
            UpsertProgress {
                key: k,
                update: update(Some(30.0), Some(10)),
            },
        )
        .await;
        assert!(matches!(res, Err(AppError::TransientStore(_))));
        assert!(store.inner.find_progress(k).await.unwrap().is_none());
    }
}
