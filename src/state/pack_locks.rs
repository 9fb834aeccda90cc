use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::quiz_date::QuizDate;

/// One async mutex per quiz date, serializing pack replacements of the same day.
#[derive(Default)]
pub struct PackLocks {
    locks: DashMap<QuizDate, Arc<Mutex<()>>>,
}

impl PackLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `quiz_date`; the guard releases it on drop.
    pub async fn lock(&self, quiz_date: QuizDate) -> OwnedMutexGuard<()> {
        let mutex = self.locks.entry(quiz_date).or_default().clone();
        mutex.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::timeout;

    use super::*;

    #[tokio::test]
    async fn same_date_waits_other_dates_do_not() {
        let locks = PackLocks::new();
        let day = QuizDate::parse("2024-01-07").unwrap();
        let other = QuizDate::parse("2024-01-08").unwrap();

        let held = locks.lock(day).await;
        assert!(
            timeout(Duration::from_millis(50), locks.lock(day))
                .await
                .is_err()
        );
        assert!(
            timeout(Duration::from_millis(50), locks.lock(other))
                .await
                .is_ok()
        );

        drop(held);
        assert!(
            timeout(Duration::from_millis(50), locks.lock(day))
                .await
                .is_ok()
        );
    }
}
