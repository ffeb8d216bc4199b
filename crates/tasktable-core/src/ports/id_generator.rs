//! IdGenerator port - ID 生成の抽象化
//!
//! key に埋め込む不透明な ID (task / invite / notification / history /
//! tenant / intent) をすべてここで発行する。
//!
//! # 実装
//! - **UlidGenerator**: ULID ベース（本番用）

use crate::domain::ids::{
    HistoryId, IntentId, InviteToken, NotificationId, TaskId, TenantId,
};
use crate::ports::Clock;
use std::sync::Mutex;
use std::time::SystemTime;
use ulid::{Generator, Ulid};

/// IdGenerator は衝突しない不透明な ID を生成
///
/// # Thread Safety
/// - `Send + Sync` を要求（複数タスクから共有される）
pub trait IdGenerator: Send + Sync {
    fn tenant_id(&self) -> TenantId;

    fn task_id(&self) -> TaskId;

    fn invite_token(&self) -> InviteToken;

    fn notification_id(&self) -> NotificationId;

    /// 同一プロセス内では発行順に単調増加する
    fn history_id(&self) -> HistoryId;

    fn intent_id(&self) -> IntentId;
}

/// UlidGenerator は Clock ベースの単調増加 ULID 生成器
///
/// 同じミリ秒内に複数発行しても random 部分がインクリメントされるため、
/// FixedClock を使ったテストでも発行順に並ぶ。
pub struct UlidGenerator<C> {
    clock: C,
    generator: Mutex<Generator>,
}

impl<C: Clock> UlidGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self {
            clock,
            generator: Mutex::new(Generator::new()),
        }
    }

    fn next(&self) -> Ulid {
        let now = self.clock.now();
        let at = SystemTime::from(now);
        let generated = match self.generator.lock() {
            Ok(mut generator) => generator.generate_from_datetime(at).ok(),
            Err(_) => None,
        };
        // random 部分が溢れた時だけここに来る
        generated.unwrap_or_else(|| Ulid::from_parts(now.timestamp_millis() as u64, rand::random()))
    }
}

impl<C: Clock> IdGenerator for UlidGenerator<C> {
    fn tenant_id(&self) -> TenantId {
        TenantId::from(self.next())
    }

    fn task_id(&self) -> TaskId {
        TaskId::from(self.next())
    }

    fn invite_token(&self) -> InviteToken {
        InviteToken::from(self.next())
    }

    fn notification_id(&self) -> NotificationId {
        NotificationId::from(self.next())
    }

    fn history_id(&self) -> HistoryId {
        HistoryId::from(self.next())
    }

    fn intent_id(&self) -> IntentId {
        IntentId::from(self.next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{FixedClock, SystemClock};
    use chrono::{TimeZone, Utc};

    #[test]
    fn ulid_generator_generates_unique_ids() {
        let id_gen = UlidGenerator::new(SystemClock);

        let id1 = id_gen.task_id();
        let id2 = id_gen.task_id();
        let id3 = id_gen.task_id();

        assert_ne!(id1, id2);
        assert_ne!(id2, id3);
        assert_ne!(id1, id3);
    }

    #[test]
    fn ids_from_a_fixed_clock_share_timestamp_and_stay_ordered() {
        let fixed_time = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let id_gen = UlidGenerator::new(FixedClock::new(fixed_time));

        let ids: Vec<HistoryId> = (0..50).map(|_| id_gen.history_id()).collect();

        for pair in ids.windows(2) {
            assert!(pair[0] < pair[1]);
            assert!(pair[0].to_string() < pair[1].to_string());
        }
        assert_eq!(ids[0].as_ulid().timestamp_ms(), fixed_time.timestamp_millis() as u64);
    }
}
