mod common;

use std::time::Duration;

use aniguess_back::{
    dto::{
        battle::{BattleOutcomeInput, BattleResultsRequest},
        battle_pack::BattlePackRequest,
        history::{GameHistoryQuery, GameResult},
        news::{NewsQuery, NewsRequest},
        score::{ScoreValue, SubmitScoreRequest},
        user::UpsertUserRequest,
    },
    error::ServiceError,
    services::{
        battle_pack_service::{self, BattleAnimeInput},
        battle_service, directory_service, history_service, news_service, score_service,
    },
};
use uuid::Uuid;

use common::{create_test_state, image};

fn news(text: &str) -> NewsRequest {
    NewsRequest { text: text.into() }
}

fn first_page() -> NewsQuery {
    NewsQuery {
        page: None,
        limit: None,
    }
}

fn contender(pack_id: Uuid, title: &str) -> BattleAnimeInput {
    BattleAnimeInput {
        image: Some(image(&format!("{title}.png"))),
        title: title.into(),
        anime_id: format!("mal-{title}"),
        pack_id: pack_id.to_string(),
        source_id: None,
    }
}

async fn pause() {
    // timestamps are stored with millisecond precision
    tokio::time::sleep(Duration::from_millis(5)).await;
}

#[tokio::test]
async fn news_listing_follows_every_mutation() {
    let (state, _files) = create_test_state().await;
    directory_service::upsert_user(
        &state,
        "admin-1",
        UpsertUserRequest {
            username: "Mod".into(),
        },
    )
    .await
    .unwrap();

    let first = news_service::create_news(&state, "admin-1", news("  Season 2 is live  "))
        .await
        .unwrap();
    assert_eq!(first.text, "Season 2 is live");
    assert_eq!(first.author.username, "Mod");

    // warm the cache before the next mutations
    let listed = news_service::list_news(&state, first_page()).await.unwrap();
    assert_eq!(listed.pagination.total, 1);

    pause().await;
    let second = news_service::create_news(&state, "ghost", news("Maintenance tonight"))
        .await
        .unwrap();
    assert_eq!(second.author.username, "Administrator");

    let listed = news_service::list_news(&state, first_page()).await.unwrap();
    let texts: Vec<_> = listed.items.iter().map(|item| item.text.as_str()).collect();
    assert_eq!(texts, vec!["Maintenance tonight", "Season 2 is live"]);

    pause().await;
    news_service::update_news(&state, first.id, news("Season 2 is live, again"))
        .await
        .unwrap();
    let listed = news_service::list_news(&state, first_page()).await.unwrap();
    assert_eq!(listed.items[0].text, "Season 2 is live, again");

    news_service::delete_news(&state, second.id).await.unwrap();
    let listed = news_service::list_news(&state, first_page()).await.unwrap();
    assert_eq!(listed.items.len(), 1);
    assert_eq!(listed.pagination.total_pages, 1);
}

#[tokio::test]
async fn unknown_news_is_not_found() {
    let (state, _files) = create_test_state().await;
    let missing = Uuid::new_v4();

    let err = news_service::update_news(&state, missing, news("x")).await;
    assert!(matches!(err, Err(ServiceError::NotFound(_))));
    let err = news_service::delete_news(&state, missing).await;
    assert!(matches!(err, Err(ServiceError::NotFound(_))));
}

#[tokio::test]
async fn news_pages_are_sized_by_the_clamped_limit() {
    let (state, _files) = create_test_state().await;
    for n in 0..3 {
        news_service::create_news(&state, "admin", news(&format!("post {n}")))
            .await
            .unwrap();
    }

    let page = news_service::list_news(
        &state,
        NewsQuery {
            page: Some(2),
            limit: Some(2),
        },
    )
    .await
    .unwrap();
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.pagination.total_pages, 2);

    let clamped = news_service::list_news(
        &state,
        NewsQuery {
            page: Some(0),
            limit: Some(0),
        },
    )
    .await
    .unwrap();
    assert_eq!(clamped.pagination.page, 1);
    assert_eq!(clamped.pagination.limit, 1);
    assert_eq!(clamped.items.len(), 1);
}

#[tokio::test]
async fn battle_contenders_join_existing_packs_only() {
    let (state, files) = create_test_state().await;
    let pack = battle_pack_service::create_pack(
        &state,
        "admin",
        BattlePackRequest {
            name: "Shonen".into(),
            description: None,
        },
    )
    .await
    .unwrap();

    let packs = battle_pack_service::list_packs(&state).await.unwrap();
    assert_eq!(packs.packs.len(), 1);
    assert_eq!(packs.packs[0].description, "");
    assert!(battle_pack_service::list_anime(&state, pack.id).await.unwrap().anime.is_empty());

    let created = battle_pack_service::create_anime(&state, "admin", contender(pack.id, "Naruto"))
        .await
        .unwrap();
    let image_url = created.image_url.unwrap();
    assert!(files.contains(&image_url));

    let anime = battle_pack_service::list_anime(&state, pack.id).await.unwrap().anime;
    assert_eq!(anime.len(), 1);
    assert_eq!(anime[0].source_id, "manual");
    assert_eq!(anime[0].image, image_url);

    let err = battle_pack_service::create_anime(&state, "admin", contender(Uuid::new_v4(), "Bleach")).await;
    assert!(matches!(err, Err(ServiceError::NotFound(_))));

    let mut no_image = contender(pack.id, "Bleach");
    no_image.image = None;
    let err = battle_pack_service::create_anime(&state, "admin", no_image).await;
    assert!(matches!(err, Err(ServiceError::InvalidInput(_))));

    let mut bad_pack = contender(pack.id, "Bleach");
    bad_pack.pack_id = "not-a-pack".into();
    let err = battle_pack_service::create_anime(&state, "admin", bad_pack).await;
    assert!(matches!(err, Err(ServiceError::InvalidInput(_))));
    assert_eq!(files.len(), 1);
}

#[tokio::test]
async fn game_history_merges_scores_and_battle_days() {
    let (state, _files) = create_test_state().await;

    score_service::submit_score(
        &state,
        "u1",
        SubmitScoreRequest {
            quiz_type: "opening".into(),
            score: ScoreValue::Number(8.0),
            date: "2024-01-06".into(),
        },
    )
    .await
    .unwrap();
    pause().await;
    battle_service::submit_results(
        &state,
        "u1",
        BattleResultsRequest {
            date: "2024-01-07".into(),
            results: vec![
                BattleOutcomeInput {
                    anime_id: "a".into(),
                    wins: 1,
                    losses: 2,
                    points: 3,
                },
                BattleOutcomeInput {
                    anime_id: "b".into(),
                    wins: 0,
                    losses: 1,
                    points: -1,
                },
            ],
        },
    )
    .await
    .unwrap();
    pause().await;
    score_service::submit_score(
        &state,
        "u2",
        SubmitScoreRequest {
            quiz_type: "anime".into(),
            score: ScoreValue::Number(1.0),
            date: "2024-01-07".into(),
        },
    )
    .await
    .unwrap();

    let history = history_service::game_history(&state, "u1", GameHistoryQuery { limit: None })
        .await
        .unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].mode, "Anime battles");
    assert_eq!(history[0].result, GameResult::Loss);
    assert_eq!(history[0].score, 2.0);
    assert_eq!(history[0].date.to_string(), "2024-01-07");
    assert_eq!(history[1].mode, "Guess the opening");
    assert_eq!(history[1].result, GameResult::Win);

    let latest = history_service::game_history(&state, "u1", GameHistoryQuery { limit: Some(1) })
        .await
        .unwrap();
    assert_eq!(latest, history[..1].to_vec());
}
