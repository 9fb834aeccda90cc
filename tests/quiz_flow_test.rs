mod common;

use std::{
    io::{Cursor, Write},
    time::Duration,
};

use aniguess_back::{
    config::AppConfig,
    dto::{answer::CheckAnswerRequest, item::ItemListQuery, leaderboard::LeaderboardQuery},
    error::ServiceError,
    services::{
        answer_service, batch_service,
        leaderboard_service,
        pack_service::{self, PackSlot, ReplacePackInput},
        stats_service,
    },
    state::SharedState,
};
use zip::{CompressionMethod, ZipWriter, write::FileOptions};

use common::{create_test_state, create_test_state_with, image};

fn pack(date: &str, titles: [&str; 4]) -> ReplacePackInput {
    ReplacePackInput {
        quiz_date: date.into(),
        slots: titles
            .iter()
            .enumerate()
            .map(|(idx, title)| PackSlot {
                image: Some(image(&format!("{:02}.jpg", idx + 1))),
                title: (*title).to_owned(),
                ..PackSlot::default()
            })
            .collect(),
    }
}

fn list_query(date: &str) -> ItemListQuery {
    ItemListQuery {
        date: Some(date.into()),
        page: None,
        limit: None,
    }
}

fn ranking(period: &str) -> LeaderboardQuery {
    LeaderboardQuery {
        limit: None,
        period: Some(period.into()),
        date: None,
    }
}

fn answer(text: &str) -> CheckAnswerRequest {
    CheckAnswerRequest {
        answer: text.into(),
    }
}

async fn titles_for(state: &SharedState, date: &str) -> Vec<String> {
    let mut titles: Vec<String> = pack_service::list_items(state, list_query(date))
        .await
        .unwrap()
        .items
        .into_iter()
        .map(|item| item.title)
        .collect();
    titles.sort();
    titles
}

#[tokio::test]
async fn replaced_pack_is_listed_in_full() {
    let (state, files) = create_test_state().await;

    let created = pack_service::replace_pack(
        &state,
        "admin",
        pack("2024-01-07", ["Naruto", "Bleach", "One Piece", "Monster"]),
    )
    .await
    .unwrap();
    assert_eq!(created.created, 4);
    assert_eq!(files.len(), 4);

    let listed = pack_service::list_items(&state, list_query("2024-01-07"))
        .await
        .unwrap();
    assert_eq!(listed.items.len(), 4);
    assert_eq!(listed.pagination.total, 4);
    assert!(listed.items.iter().all(|item| item.source_id.as_deref() == Some("manual")));
    assert!(listed.items.iter().all(|item| item.anime_id.starts_with("manual-")));

    pack_service::replace_pack(
        &state,
        "admin",
        pack("2024-01-07", ["Akira", "Berserk", "Clannad", "Durarara"]),
    )
    .await
    .unwrap();
    assert_eq!(
        titles_for(&state, "2024-01-07").await,
        ["Akira", "Berserk", "Clannad", "Durarara"]
    );
}

#[tokio::test]
async fn invalid_replacement_leaves_previous_pack() {
    let (state, files) = create_test_state().await;
    pack_service::replace_pack(
        &state,
        "admin",
        pack("2024-01-07", ["Naruto", "Bleach", "One Piece", "Monster"]),
    )
    .await
    .unwrap();

    let mut short = pack("2024-01-07", ["A", "B", "C", "D"]);
    short.slots.pop();
    let err = pack_service::replace_pack(&state, "admin", short).await;
    assert!(matches!(err, Err(ServiceError::InvalidInput(_))));

    let mut untitled = pack("2024-01-07", ["A", "B", "C", "D"]);
    untitled.slots[3].title = "  ".into();
    let err = pack_service::replace_pack(&state, "admin", untitled).await;
    assert!(matches!(err, Err(ServiceError::InvalidInput(_))));

    assert_eq!(
        titles_for(&state, "2024-01-07").await,
        ["Bleach", "Monster", "Naruto", "One Piece"]
    );
    assert_eq!(files.len(), 4);
}

#[tokio::test]
async fn concurrent_correct_answers_credit_once() {
    let (state, _files) = create_test_state().await;
    let created = pack_service::replace_pack(
        &state,
        "admin",
        pack("2024-01-07", ["Naruto", "Bleach", "One Piece", "Monster"]),
    )
    .await
    .unwrap();
    let naruto = created
        .items
        .iter()
        .find(|item| item.title == "Naruto")
        .unwrap()
        .id;

    let attempts = (0..8).map(|_| {
        let state = state.clone();
        tokio::spawn(async move {
            answer_service::check_answer(&state, naruto, "u1", answer("  naruto "))
                .await
                .unwrap()
        })
    });
    for handle in futures::future::join_all(attempts).await {
        let response = handle.unwrap();
        assert!(response.correct);
        assert_eq!(response.title.as_deref(), Some("Naruto"));
    }

    let listed = pack_service::list_items(&state, list_query("2024-01-07"))
        .await
        .unwrap();
    let item = listed.items.iter().find(|item| item.id == naruto).unwrap();
    assert_eq!(item.guessed_by, ["u1"]);
}

#[tokio::test]
async fn wrong_answers_and_unknown_items() {
    let (state, _files) = create_test_state().await;
    let created = pack_service::replace_pack(
        &state,
        "admin",
        pack("2024-01-07", ["Naruto", "Bleach", "One Piece", "Monster"]),
    )
    .await
    .unwrap();

    let response = answer_service::check_answer(&state, created.items[0].id, "u1", answer("Dragon Ball"))
        .await
        .unwrap();
    assert!(!response.correct);
    assert!(response.title.is_none());

    let err = answer_service::check_answer(&state, uuid::Uuid::new_v4(), "u1", answer("Naruto")).await;
    assert!(matches!(err, Err(ServiceError::NotFound(_))));
}

#[tokio::test]
async fn cached_listing_reflects_new_credit() {
    let (state, _files) = create_test_state().await;
    let created = pack_service::replace_pack(
        &state,
        "admin",
        pack("2024-01-07", ["Naruto", "Bleach", "One Piece", "Monster"]),
    )
    .await
    .unwrap();
    let bleach = created
        .items
        .iter()
        .find(|item| item.title == "Bleach")
        .unwrap()
        .id;

    let before = pack_service::list_items(&state, list_query("2024-01-07"))
        .await
        .unwrap();
    assert!(before.items.iter().all(|item| item.guessed_by.is_empty()));

    answer_service::check_answer(&state, bleach, "u2", answer("BLEACH"))
        .await
        .unwrap();

    let after = pack_service::list_items(&state, list_query("2024-01-07"))
        .await
        .unwrap();
    let item = after.items.iter().find(|item| item.id == bleach).unwrap();
    assert_eq!(item.guessed_by, ["u2"]);
}

#[tokio::test]
async fn leaderboard_counts_items_per_day_and_days_otherwise() {
    let (state, _files) = create_test_state().await;
    let day1 = pack_service::replace_pack(&state, "admin", pack("2024-01-06", ["A1", "B1", "C1", "D1"]))
        .await
        .unwrap();
    let day2 = pack_service::replace_pack(&state, "admin", pack("2024-01-07", ["A2", "B2", "C2", "D2"]))
        .await
        .unwrap();

    // u1 guesses three items on 2024-01-07; u2 guesses one item on each day.
    for item in day2.items.iter().filter(|item| item.title != "D2") {
        answer_service::check_answer(&state, item.id, "u1", answer(&item.title))
            .await
            .unwrap();
    }
    for item in [&day1.items[0], &day2.items[3]] {
        answer_service::check_answer(&state, item.id, "u2", answer(&item.title))
            .await
            .unwrap();
    }

    let daily = leaderboard_service::leaderboard(
        &state,
        LeaderboardQuery {
            limit: None,
            period: Some("day".into()),
            date: Some("2024-01-07".into()),
        },
    )
    .await
    .unwrap();
    assert_eq!(daily[0].user_id, "u1");
    assert_eq!(daily[0].count, 3);
    assert_eq!(daily[0].rank, 1);
    assert_eq!(daily[1].user_id, "u2");
    assert_eq!(daily[1].count, 1);

    let all_time = leaderboard_service::leaderboard(
        &state,
        LeaderboardQuery {
            limit: None,
            period: Some("all".into()),
            date: None,
        },
    )
    .await
    .unwrap();
    assert_eq!(all_time[0].user_id, "u2");
    assert_eq!(all_time[0].count, 2);
    assert_eq!(all_time[1].user_id, "u1");
    assert_eq!(all_time[1].count, 1);
}

#[tokio::test]
async fn week_ranking_spans_seven_days_ending_on_the_latest_pack() {
    let (state, _files) = create_test_state().await;
    let outside = pack_service::replace_pack(&state, "admin", pack("2024-01-07", ["A0", "B0", "C0", "D0"]))
        .await
        .unwrap();
    let first_day = pack_service::replace_pack(&state, "admin", pack("2024-01-08", ["A1", "B1", "C1", "D1"]))
        .await
        .unwrap();
    let latest = pack_service::replace_pack(&state, "admin", pack("2024-01-14", ["A7", "B7", "C7", "D7"]))
        .await
        .unwrap();

    // u1: one item seven days before the latest pack and one six days before it.
    // u2: one item six days before, two items on the latest day.
    // u3: only the day just outside the window.
    let credits = [
        ("u1", &outside.items[0]),
        ("u1", &first_day.items[0]),
        ("u2", &first_day.items[1]),
        ("u2", &latest.items[0]),
        ("u2", &latest.items[1]),
        ("u3", &outside.items[1]),
    ];
    for (user, item) in credits {
        answer_service::check_answer(&state, item.id, user, answer(&item.title))
            .await
            .unwrap();
    }

    let weekly = leaderboard_service::leaderboard(&state, ranking("week"))
        .await
        .unwrap();
    let rows: Vec<_> = weekly
        .iter()
        .map(|entry| (entry.user_id.as_str(), entry.count))
        .collect();
    assert_eq!(rows, vec![("u2", 2), ("u1", 1)]);
    assert!(weekly.iter().all(|entry| entry.date.is_none()));

    let all_time = leaderboard_service::leaderboard(&state, ranking("all"))
        .await
        .unwrap();
    let rows: Vec<_> = all_time
        .iter()
        .map(|entry| (entry.user_id.as_str(), entry.count))
        .collect();
    assert_eq!(rows, vec![("u1", 2), ("u2", 2), ("u3", 1)]);
}

#[tokio::test]
async fn rankings_and_stats_follow_new_credits() {
    let (state, _files) = create_test_state().await;
    let created = pack_service::replace_pack(
        &state,
        "admin",
        pack("2024-01-07", ["Naruto", "Bleach", "One Piece", "Monster"]),
    )
    .await
    .unwrap();

    let before = leaderboard_service::leaderboard(&state, ranking("all"))
        .await
        .unwrap();
    assert!(before.is_empty());
    let stats = stats_service::user_stats(&state, "u1").await.unwrap();
    assert_eq!(stats.total_days, 0);
    assert!(stats.per_day_counts.is_empty());

    let first = &created.items[0];
    answer_service::check_answer(&state, first.id, "u1", answer(&first.title))
        .await
        .unwrap();

    let after = leaderboard_service::leaderboard(&state, ranking("all"))
        .await
        .unwrap();
    assert_eq!(after.len(), 1);
    assert_eq!(after[0].user_id, "u1");
    assert_eq!(after[0].count, 1);
    let stats = stats_service::user_stats(&state, "u1").await.unwrap();
    assert_eq!(stats.total_days, 1);
    assert_eq!(stats.per_day_counts.get("2024-01-07"), Some(&1));

    for item in &created.items[1..] {
        answer_service::check_answer(&state, item.id, "u1", answer(&item.title))
            .await
            .unwrap();
    }

    let stats = stats_service::user_stats(&state, "u1").await.unwrap();
    assert_eq!(stats.total_days, 1);
    assert_eq!(stats.per_day_counts.get("2024-01-07"), Some(&4));
    let daily = leaderboard_service::leaderboard(&state, ranking("day"))
        .await
        .unwrap();
    assert_eq!(daily[0].count, 4);
    let all_time = leaderboard_service::leaderboard(&state, ranking("all"))
        .await
        .unwrap();
    assert_eq!(all_time[0].count, 1);
}

fn archive(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, bytes) in files {
        writer.start_file(*name, FileOptions::default()).unwrap();
        writer.write_all(bytes).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

#[tokio::test]
async fn batch_ingestion_skips_rows_without_files() {
    let (state, files) = create_test_state().await;

    let mut manifest = String::from("filename,title,animeId,sourceId,quizDate\n");
    for n in 1..=10 {
        manifest.push_str(&format!("{n:02}.jpg,Title {n},{n},anilist,2024-01-07\n"));
    }
    let mut entries: Vec<(String, Vec<u8>)> = vec![("manifest.csv".into(), manifest.into_bytes())];
    for n in 1..=8 {
        entries.push((format!("images/{n:02}.jpg"), vec![0xFF, 0xD8, n as u8]));
    }
    let borrowed: Vec<(&str, &[u8])> = entries
        .iter()
        .map(|(name, bytes)| (name.as_str(), bytes.as_slice()))
        .collect();
    let bytes = archive(&borrowed);

    let report = batch_service::validate_archive(bytes.clone(), 500).unwrap();
    assert_eq!(report.total, 10);
    assert_eq!(report.ok, 8);
    assert_eq!(report.missing, ["09.jpg", "10.jpg"]);

    let ingested = batch_service::ingest_archive(&state, "admin", bytes, None)
        .await
        .unwrap();
    assert_eq!(ingested.created, 8);
    assert_eq!(ingested.skipped.len(), 2);
    assert!(ingested.failed.is_empty());
    assert_eq!(files.len(), 8);

    let listed = pack_service::list_items(&state, list_query("2024-01-07"))
        .await
        .unwrap();
    assert_eq!(listed.pagination.total, 8);
}

fn stored_archive(files: &[(&str, &[u8])]) -> Vec<u8> {
    let options = FileOptions::default().compression_method(CompressionMethod::Stored);
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, bytes) in files {
        writer.start_file(*name, options).unwrap();
        writer.write_all(bytes).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

const THREE_ROWS: &[u8] = b"filename,title,animeId,quizDate\n\
01.jpg,First,1,2024-01-07\n\
02.jpg,Second,2,2024-01-07\n\
03.jpg,Third,3,2024-01-07\n";

#[tokio::test]
async fn corrupt_entry_fails_its_row_only() {
    let (state, files) = create_test_state().await;
    let mut bytes = stored_archive(&[
        ("manifest.csv", THREE_ROWS),
        ("01.jpg", b"first-image-payload"),
        ("02.jpg", b"second-image-payload"),
        ("03.jpg", b"third-image-payload"),
    ]);
    let marker = b"second-image-payload";
    let at = bytes
        .windows(marker.len())
        .position(|window| window == marker)
        .unwrap();
    bytes[at] ^= 0xFF;

    let report = batch_service::ingest_archive(&state, "admin", bytes, None)
        .await
        .unwrap();

    assert_eq!(report.created, 2);
    assert!(!report.timed_out);
    assert!(report.skipped.is_empty());
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].row, 2);
    assert_eq!(report.failed[0].filename, "02.jpg");
    assert_eq!(files.len(), 2);
    let titles: Vec<_> = report.items.iter().map(|item| item.title.as_str()).collect();
    assert_eq!(titles, ["First", "Third"]);
}

#[tokio::test]
async fn oversized_entry_fails_its_row_before_upload() {
    let (state, files) = create_test_state_with(AppConfig {
        max_image_bytes: 16,
        ..AppConfig::default()
    })
    .await;
    let bytes = archive(&[
        ("manifest.csv", THREE_ROWS),
        ("01.jpg", b"small"),
        ("02.jpg", &[0u8; 4096]),
        ("03.jpg", b"small too"),
    ]);

    let report = batch_service::ingest_archive(&state, "admin", bytes, None)
        .await
        .unwrap();

    assert_eq!(report.created, 2);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].row, 2);
    assert!(report.failed[0].error.contains("exceeds 16 bytes"));
    assert_eq!(files.len(), 2);
}

#[tokio::test]
async fn elapsed_deadline_returns_the_partial_report() {
    let mut config = AppConfig::default();
    config.batch.deadline = Duration::ZERO;
    let (state, _files) = create_test_state_with(config).await;
    let bytes = archive(&[
        ("manifest.csv", THREE_ROWS),
        ("01.jpg", b"one"),
        ("02.jpg", b"two"),
        ("03.jpg", b"three"),
    ]);

    let report = batch_service::ingest_archive(&state, "admin", bytes, None)
        .await
        .unwrap();

    assert!(report.timed_out);
    assert!(report.created < 3);
    assert_eq!(report.created, report.items.len());
}

#[tokio::test]
async fn deleting_an_item_removes_its_files() {
    let (state, files) = create_test_state().await;
    let created = pack_service::replace_pack(
        &state,
        "admin",
        pack("2024-01-07", ["Naruto", "Bleach", "One Piece", "Monster"]),
    )
    .await
    .unwrap();
    let target = &created.items[0];

    pack_service::delete_item(&state, target.id).await.unwrap();
    assert!(!files.contains(&target.image_ref));
    assert_eq!(titles_for(&state, "2024-01-07").await.len(), 3);

    let again = pack_service::delete_item(&state, target.id).await;
    assert!(matches!(again, Err(ServiceError::NotFound(_))));
}
