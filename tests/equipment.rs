mod common;

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use common::{now, setup, Rigged, CHAT, USER};
use fishinge_economy::{
    equipment,
    models::{RodInstance, RodState},
    payments::{self, PaidCast},
    recovery::{self, RecoveryNotifier},
    CastOutcome,
};
use sqlx::SqliteConnection;

async fn bamboo(conn: &mut SqliteConnection) -> RodInstance {
    equipment::get_rod(conn, USER, "Bamboo Rod")
        .await
        .unwrap()
        .unwrap()
}

async fn damage(conn: &mut SqliteConnection, amount: i64, at: chrono::DateTime<Utc>) {
    let mut rod = bamboo(conn).await;
    rod.apply_damage(amount, at);
    equipment::save_rod(conn, &rod).await.unwrap();
}

#[tokio::test]
async fn recovery_advances_whole_intervals_once() {
    let (mut conn, _, _) = setup().await;
    damage(&mut conn, 40, now()).await;

    let interval = Duration::minutes(10);
    let at = now() + Duration::minutes(25);

    let full = equipment::advance_recovery(&mut conn, at, interval, 30)
        .await
        .unwrap();
    assert!(full.is_empty());
    assert_eq!(bamboo(&mut conn).await.durability(), 66);

    equipment::advance_recovery(&mut conn, at, interval, 30)
        .await
        .unwrap();
    assert_eq!(bamboo(&mut conn).await.durability(), 66);

    equipment::advance_recovery(&mut conn, at + Duration::minutes(5), interval, 30)
        .await
        .unwrap();
    assert_eq!(bamboo(&mut conn).await.durability(), 69);
}

#[tokio::test]
async fn recovered_rods_are_reported_and_leave_recovery() {
    let (mut conn, _, _) = setup().await;
    damage(&mut conn, 10, now()).await;

    let full = equipment::advance_recovery(
        &mut conn,
        now() + Duration::hours(1),
        Duration::minutes(10),
        30,
    )
    .await
    .unwrap();

    assert_eq!(full.len(), 1);
    let rod = bamboo(&mut conn).await;
    assert_eq!(rod.durability(), 100);
    assert_eq!(rod.state(), RodState::Intact);
    assert!(rod.recovery_started_at().is_none());
}

#[derive(Default)]
struct Collect(Mutex<Vec<String>>);

#[async_trait]
impl RecoveryNotifier for Collect {
    async fn rod_recovered(&self, rod: &RodInstance) {
        self.0.lock().unwrap().push(rod.rod_name().to_string());
    }
}

#[tokio::test]
async fn scheduler_tick_notifies_owners() {
    let (mut conn, engine, _) = setup().await;
    damage(&mut conn, 50, Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap()).await;

    let notifier = Collect::default();
    let recovered = recovery::tick(&mut conn, engine.config(), &notifier)
        .await
        .unwrap();

    assert_eq!(recovered, 1);
    assert_eq!(*notifier.0.lock().unwrap(), vec!["Bamboo Rod".to_string()]);
    assert_eq!(bamboo(&mut conn).await.durability(), 100);
}

#[tokio::test]
async fn repair_restores_full_durability() {
    let (mut conn, engine, _) = setup().await;
    damage(&mut conn, 100, now()).await;

    let quote = engine
        .repair_quote(&mut conn, USER, "Bamboo Rod")
        .await
        .unwrap();
    assert_eq!(quote, Some(20));

    let rod = engine
        .repair(&mut conn, USER, "Bamboo Rod", now())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(rod.durability(), 100);
    assert_eq!(rod.last_repair_time(), Some(now()));
    assert_eq!(bamboo(&mut conn).await.state(), RodState::Intact);

    assert!(engine
        .repair(&mut conn, USER, "Golden Rod", now())
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn each_charge_buys_one_guaranteed_cast() {
    let (mut conn, engine, _) = setup().await;

    let paid = engine
        .paid_cast(
            &mut conn,
            "charge-1",
            USER,
            Some(CHAT),
            &mut Rigged::new().guaranteed(500),
            now(),
        )
        .await
        .unwrap();
    let PaidCast::Completed { report, refund_due } = paid else {
        panic!("expected a cast, got {paid:?}");
    };
    assert!(!refund_due);
    assert!(matches!(report.outcome, CastOutcome::Fish(_)));

    let again = engine
        .paid_cast(
            &mut conn,
            "charge-1",
            USER,
            Some(CHAT),
            &mut Rigged::new(),
            now(),
        )
        .await
        .unwrap();
    assert_eq!(again, PaidCast::Duplicate);

    let payment = payments::get(&mut conn, "charge-1").await.unwrap().unwrap();
    assert_eq!(payment.refund_status(), Some(payments::RefundStatus::None));
}

#[tokio::test]
async fn failed_paid_cast_is_refunded_once() {
    let (mut conn, engine, _) = setup().await;

    let paid = engine
        .paid_cast(&mut conn, "charge-2", 1, None, &mut Rigged::new(), now())
        .await
        .unwrap();
    assert!(matches!(paid, PaidCast::Completed { refund_due: true, .. }));

    let payment = payments::get(&mut conn, "charge-2").await.unwrap().unwrap();
    assert_eq!(payment.refund_status(), Some(payments::RefundStatus::Refunded));
    assert!(!payments::mark_refunded(&mut conn, "charge-2").await.unwrap());
}

#[tokio::test]
async fn erroring_paid_cast_refunds_the_charge() {
    let (mut conn, engine, _) = setup().await;
    sqlx::query("UPDATE players SET current_rod = 'Retired Rod' WHERE user_id = ?")
        .bind(USER)
        .execute(&mut conn)
        .await
        .unwrap();

    let result = engine
        .paid_cast(
            &mut conn,
            "charge-3",
            USER,
            Some(CHAT),
            &mut Rigged::new(),
            now(),
        )
        .await;
    assert!(result.is_err());

    let payment = payments::get(&mut conn, "charge-3").await.unwrap().unwrap();
    assert_eq!(payment.refund_status(), Some(payments::RefundStatus::Refunded));

    let again = engine
        .paid_cast(
            &mut conn,
            "charge-3",
            USER,
            Some(CHAT),
            &mut Rigged::new(),
            now(),
        )
        .await
        .unwrap();
    assert_eq!(again, PaidCast::Duplicate);
}
