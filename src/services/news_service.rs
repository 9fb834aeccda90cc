//! Site announcements: paginated, cached listing and admin-only edits.

use std::{collections::HashMap, time::SystemTime};

use tracing::info;
use uuid::Uuid;

use crate::{
    dao::models::NewsEntity,
    dto::{
        format_system_time,
        item::{DeleteResponse, Pagination},
        news::{NewsAuthor, NewsListResponse, NewsQuery, NewsRequest, NewsResponse},
    },
    error::ServiceError,
    state::SharedState,
};

const DEFAULT_NEWS_PAGE_SIZE: i64 = 12;
const MAX_NEWS_PAGE_SIZE: i64 = 50;
/// Display name of authors missing from the user directory.
const UNKNOWN_AUTHOR: &str = "Administrator";

/// Page size of the announcements listing, clamped to 1..=50.
pub fn clamp_news_limit(limit: Option<i64>) -> u32 {
    let limit = limit
        .unwrap_or(DEFAULT_NEWS_PAGE_SIZE)
        .clamp(1, MAX_NEWS_PAGE_SIZE);
    u32::try_from(limit).unwrap_or(1)
}

/// One page of announcements, newest first.
pub async fn list_news(
    state: &SharedState,
    query: NewsQuery,
) -> Result<NewsListResponse, ServiceError> {
    let limit = clamp_news_limit(query.limit);
    let page = u32::try_from(query.page.unwrap_or(1).clamp(1, i64::from(u32::MAX))).unwrap_or(1);
    let key = format!("news:{page}:{limit}");

    state
        .cache()
        .get_or_try_insert_with(&key, state.config().cache.slow, || async {
            let store = state.require_quiz_store().await?;
            let total = store.count_news().await?;
            let offset = u64::from(page - 1) * u64::from(limit);
            let entities = store.list_news(limit, offset).await?;

            let mut author_ids: Vec<String> =
                entities.iter().map(|news| news.author_id.clone()).collect();
            author_ids.sort();
            author_ids.dedup();
            let names = store.user_names(author_ids).await?;

            Ok::<_, ServiceError>(NewsListResponse {
                items: entities
                    .into_iter()
                    .map(|news| to_response(news, &names))
                    .collect(),
                pagination: Pagination {
                    page,
                    limit,
                    total,
                    total_pages: total.div_ceil(u64::from(limit)).max(1),
                },
            })
        })
        .await
}

/// Publish an announcement authored by `author_id`.
pub async fn create_news(
    state: &SharedState,
    author_id: &str,
    request: NewsRequest,
) -> Result<NewsResponse, ServiceError> {
    let store = state.require_quiz_store().await?;
    let news = NewsEntity {
        id: Uuid::new_v4(),
        author_id: author_id.to_owned(),
        text: request.text.trim().to_owned(),
        created_at: SystemTime::now(),
    };
    store.insert_news(news.clone()).await?;

    state.cache().flush();
    info!(news_id = %news.id, author_id, "news published");

    let names = store.user_names(vec![news.author_id.clone()]).await?;
    Ok(to_response(news, &names))
}

/// Rewrite an announcement; the edit also becomes its publication time.
pub async fn update_news(
    state: &SharedState,
    id: Uuid,
    request: NewsRequest,
) -> Result<NewsResponse, ServiceError> {
    let store = state.require_quiz_store().await?;
    let Some(news) = store
        .update_news(id, request.text.trim().to_owned(), SystemTime::now())
        .await?
    else {
        return Err(ServiceError::NotFound(format!("news `{id}` not found")));
    };

    state.cache().flush();
    info!(news_id = %id, "news edited");

    let names = store.user_names(vec![news.author_id.clone()]).await?;
    Ok(to_response(news, &names))
}

/// Delete an announcement.
pub async fn delete_news(state: &SharedState, id: Uuid) -> Result<DeleteResponse, ServiceError> {
    let store = state.require_quiz_store().await?;
    if !store.delete_news(id).await? {
        return Err(ServiceError::NotFound(format!("news `{id}` not found")));
    }

    state.cache().flush();
    info!(news_id = %id, "news deleted");
    Ok(DeleteResponse {
        success: true,
        deleted: id,
    })
}

fn to_response(news: NewsEntity, names: &HashMap<String, String>) -> NewsResponse {
    let username = names
        .get(&news.author_id)
        .cloned()
        .unwrap_or_else(|| UNKNOWN_AUTHOR.to_owned());
    NewsResponse {
        id: news.id,
        text: news.text,
        created_at: format_system_time(news.created_at),
        author: NewsAuthor {
            id: news.author_id,
            username,
        },
    }
}

#[cfg(test)]
mod tests {
    use std::time::UNIX_EPOCH;

    use super::*;

    #[test]
    fn news_limit_defaults_and_clamps() {
        assert_eq!(clamp_news_limit(None), 12);
        assert_eq!(clamp_news_limit(Some(0)), 1);
        assert_eq!(clamp_news_limit(Some(-3)), 1);
        assert_eq!(clamp_news_limit(Some(20)), 20);
        assert_eq!(clamp_news_limit(Some(500)), 50);
    }

    #[test]
    fn unknown_authors_get_a_placeholder_name() {
        let news = NewsEntity {
            id: Uuid::nil(),
            author_id: "admin-1".into(),
            text: "Season 2 packs are live".into(),
            created_at: UNIX_EPOCH,
        };
        let names = HashMap::from([("someone-else".to_owned(), "x".to_owned())]);

        let response = to_response(news, &names);
        assert_eq!(response.author.id, "admin-1");
        assert_eq!(response.author.username, UNKNOWN_AUTHOR);
        assert_eq!(response.created_at, "1970-01-01T00:00:00Z");
    }
}
