mod common;

use chrono::Duration;
use common::{now, player, setup, Rigged, CHAT, USER};
use fishinge_economy::{
    cast::{Rejection, Snap},
    catalog::Rarity,
    equipment, ledger, profile,
    shop::{Purchase, Refusal},
    CastMode, CastOutcome,
};

#[tokio::test]
async fn top_roll_is_a_jackpot_in_any_weather() {
    let (mut conn, engine, before) = setup().await;
    common::set_weather(&mut conn, "Pond", "thunderstorm", now()).await;

    let report = engine
        .cast(&mut conn, USER, Some(CHAT), CastMode::Normal, &mut Rigged::new().cast(10_000), now())
        .await
        .unwrap();

    assert_eq!(report.outcome, CastOutcome::Jackpot);
    assert!(ledger::items(&mut conn, USER).await.unwrap().is_empty());

    let after = player(&mut conn).await;
    assert_eq!(after.coins, before.coins);
    assert_eq!(after.xp, before.xp);
    assert_eq!(after.last_fish_time, Some(now()));
}

#[tokio::test]
async fn middling_roll_pulls_trash_and_scratches_the_rod() {
    let (mut conn, engine, before) = setup().await;

    let report = engine
        .cast(&mut conn, USER, Some(CHAT), CastMode::Normal, &mut Rigged::new().cast(5000), now())
        .await
        .unwrap();

    let CastOutcome::Trash(catch) = &report.outcome else {
        panic!("expected trash, got {:?}", report.outcome);
    };
    assert_eq!(catch.species, "Boot");
    assert_eq!(catch.price, 3);

    let state = report.state.unwrap();
    assert_eq!(state.rod.durability, 99);
    assert!(state.rod.recovering);
    assert_eq!(state.xp_gained, 1);
    assert_eq!(state.balance, before.coins + 3);

    let items = ledger::items(&mut conn, USER).await.unwrap();
    assert_eq!(items.len(), 1);
    assert!(items[0].sold);
}

#[tokio::test]
async fn common_catch_is_recorded_unsold_without_xp() {
    let (mut conn, engine, before) = setup().await;

    let report = engine
        .cast(
            &mut conn,
            USER,
            Some(CHAT),
            CastMode::Normal,
            &mut Rigged::new().cast(7000).bait(1),
            now(),
        )
        .await
        .unwrap();

    let catch = report.caught().unwrap();
    assert_eq!(catch.species, "Carp");
    assert_eq!(catch.rarity, Rarity::Common);
    assert!((1.0..=3.0).contains(&catch.weight));

    let state = report.state.as_ref().unwrap();
    assert_eq!(state.rod.durability, 95);
    assert_eq!(state.xp_gained, 0);
    assert_eq!(state.balance, before.coins);

    let unsold = ledger::unsold(&mut conn, USER).await.unwrap();
    assert_eq!(unsold.len(), 1);
    assert_eq!(unsold[0].id, catch.item_id);
}

#[tokio::test]
async fn incompatible_bait_snaps_without_reward() {
    let (mut conn, engine, before) = setup().await;

    // nothing rare at the pond takes worms
    let report = engine
        .cast(
            &mut conn,
            USER,
            Some(CHAT),
            CastMode::Normal,
            &mut Rigged::new().cast(9000).bait(1),
            now(),
        )
        .await
        .unwrap();

    assert_eq!(
        report.outcome,
        CastOutcome::Snap(Snap::BaitMismatch {
            bait: "Worms".to_string()
        })
    );
    assert!(report.is_failure());
    assert_eq!(report.state.unwrap().rod.durability, 100);

    let after = player(&mut conn).await;
    assert_eq!(after.last_fish_time, Some(now()));
    assert_eq!(after.coins, before.coins);
    assert_eq!(after.xp, before.xp);
    assert!(ledger::items(&mut conn, USER).await.unwrap().is_empty());
}

#[tokio::test]
async fn failed_bait_roll_snaps() {
    let (mut conn, engine, _) = setup().await;

    let report = engine
        .cast(
            &mut conn,
            USER,
            Some(CHAT),
            CastMode::Normal,
            &mut Rigged::new().cast(7000).bait(95),
            now(),
        )
        .await
        .unwrap();

    assert!(matches!(
        report.outcome,
        CastOutcome::Snap(Snap::WrongBait { .. })
    ));
}

#[tokio::test]
async fn legendary_too_heavy_for_the_rod_snaps() {
    let (mut conn, engine, _) = setup().await;

    let report = engine
        .cast(&mut conn, USER, Some(CHAT), CastMode::Normal, &mut Rigged::new().cast(9800), now())
        .await
        .unwrap();

    let CastOutcome::Snap(Snap::Oversized {
        species,
        max_weight,
        ..
    }) = &report.outcome
    else {
        panic!("expected an oversized snap, got {:?}", report.outcome);
    };
    assert_eq!(species, "Whale Carp");
    assert_eq!(*max_weight, 20.0);
    assert!(ledger::items(&mut conn, USER).await.unwrap().is_empty());
}

#[tokio::test]
async fn guaranteed_top_roll_lands_an_out_of_season_legendary() {
    let (mut conn, engine, _) = setup().await;

    let report = engine
        .cast(
            &mut conn,
            USER,
            Some(CHAT),
            CastMode::Guaranteed,
            &mut Rigged::new().guaranteed(999),
            now(),
        )
        .await
        .unwrap();

    let catch = report.caught().unwrap();
    assert_eq!(catch.species, "Whale Carp");
    assert_eq!(catch.rarity, Rarity::Legendary);
    assert_eq!(report.state.unwrap().rod.durability, 97);
}

#[tokio::test]
async fn cooldown_blocks_normal_casts_only() {
    let (mut conn, engine, _) = setup().await;

    engine
        .cast(&mut conn, USER, Some(CHAT), CastMode::Normal, &mut Rigged::new().cast(0), now())
        .await
        .unwrap();

    let later = now() + Duration::minutes(4);
    let report = engine
        .cast(&mut conn, USER, Some(CHAT), CastMode::Normal, &mut Rigged::new().cast(0), later)
        .await
        .unwrap();
    assert_eq!(
        report.outcome,
        CastOutcome::Rejected(Rejection::Cooldown {
            remaining: Duration::minutes(6)
        })
    );
    assert_eq!(player(&mut conn).await.last_fish_time, Some(now()));

    let report = engine
        .cast(
            &mut conn,
            USER,
            Some(CHAT),
            CastMode::Guaranteed,
            &mut Rigged::new().guaranteed(0),
            later,
        )
        .await
        .unwrap();
    assert!(matches!(report.outcome, CastOutcome::Trash(_)));

    let report = engine
        .cast(
            &mut conn,
            USER,
            Some(CHAT),
            CastMode::Normal,
            &mut Rigged::new().cast(0),
            later + Duration::minutes(10),
        )
        .await
        .unwrap();
    assert_eq!(report.outcome, CastOutcome::NoBite);
}

#[tokio::test]
async fn broken_rod_is_refused() {
    let (mut conn, engine, _) = setup().await;

    let mut rod = equipment::get_rod(&mut conn, USER, "Bamboo Rod")
        .await
        .unwrap()
        .unwrap();
    rod.apply_damage(500, now());
    assert_eq!(rod.durability(), 0);
    equipment::save_rod(&mut conn, &rod).await.unwrap();

    let report = engine
        .cast(&mut conn, USER, Some(CHAT), CastMode::Normal, &mut Rigged::new().cast(5000), now())
        .await
        .unwrap();
    assert_eq!(
        report.outcome,
        CastOutcome::Rejected(Rejection::RodBroken {
            rod: "Bamboo Rod".to_string()
        })
    );
    assert_eq!(player(&mut conn).await.last_fish_time, None);

    let report = engine
        .cast(
            &mut conn,
            USER,
            Some(CHAT),
            CastMode::Guaranteed,
            &mut Rigged::new().guaranteed(500),
            now(),
        )
        .await
        .unwrap();
    assert_eq!(report.caught().unwrap().species, "Carp");
    let rod = report.state.unwrap().rod;
    assert!(rod.broken);
    assert!(rod.recovering);
}

#[tokio::test]
async fn spent_temporary_rod_falls_back_to_bamboo() {
    let (mut conn, engine, _) = setup().await;

    let purchase = engine
        .buy_rod(&mut conn, USER, Some(CHAT), "Golden Rod", &mut Rigged::new())
        .await
        .unwrap();
    assert!(matches!(purchase, Ok(Purchase::Rod(_))));
    assert_eq!(player(&mut conn).await.current_rod, "Golden Rod");

    let report = engine
        .cast(
            &mut conn,
            USER,
            Some(CHAT),
            CastMode::Normal,
            &mut Rigged::new().cast(7000).bait(1),
            now(),
        )
        .await
        .unwrap();

    assert!(report.caught().is_some());
    let rod = report.state.unwrap().rod;
    assert!(rod.temporary);
    assert!(rod.temporary_broke);
    assert!(!rod.broken);

    assert_eq!(player(&mut conn).await.current_rod, "Bamboo Rod");
    assert!(equipment::get_rod(&mut conn, USER, "Golden Rod")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn empty_location_has_no_content_but_costs_the_turn() {
    let (mut conn, engine, _) = setup().await;
    engine
        .travel(&mut conn, USER, Some(CHAT), "empty bay")
        .await
        .unwrap()
        .unwrap();
    common::set_weather(&mut conn, "Empty Bay", "clear", now()).await;

    let report = engine
        .cast(&mut conn, USER, Some(CHAT), CastMode::Normal, &mut Rigged::new().cast(7000), now())
        .await
        .unwrap();

    assert_eq!(report.outcome, CastOutcome::NoContent);
    assert_eq!(report.state.unwrap().location, "Empty Bay");
    assert_eq!(player(&mut conn).await.last_fish_time, Some(now()));
}

#[tokio::test]
async fn finite_bait_runs_out_and_switches_to_worms() {
    let (mut conn, engine, _) = setup().await;

    engine
        .buy_bait(&mut conn, USER, Some(CHAT), "Corn", 1)
        .await
        .unwrap()
        .unwrap();
    engine
        .equip_bait(&mut conn, USER, Some(CHAT), "Corn")
        .await
        .unwrap()
        .unwrap();

    let report = engine
        .cast(
            &mut conn,
            USER,
            Some(CHAT),
            CastMode::Normal,
            &mut Rigged::new().cast(7000).bait(1),
            now(),
        )
        .await
        .unwrap();
    assert_eq!(report.caught().unwrap().species, "Carp");

    assert_eq!(player(&mut conn).await.current_bait, "Worms");
    assert_eq!(
        fishinge_economy::shop::bait_quantity(&mut conn, USER, "Corn")
            .await
            .unwrap(),
        0
    );

    let refusal = engine
        .equip_bait(&mut conn, USER, Some(CHAT), "Corn")
        .await
        .unwrap();
    assert_eq!(
        refusal,
        Err(Refusal::NotOwned {
            name: "Corn".to_string()
        })
    );
}

#[tokio::test]
async fn unknown_player_is_reported() {
    let (mut conn, engine, _) = setup().await;

    let report = engine
        .cast(&mut conn, 1, None, CastMode::Normal, &mut Rigged::new(), now())
        .await
        .unwrap();

    assert_eq!(report.outcome, CastOutcome::ProfileMissing);
    assert!(report.state.is_none());
    assert!(profile::load(&mut conn, 1, None).await.unwrap().is_none());
}
