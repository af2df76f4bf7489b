use std::collections::HashMap;

use crate::{
    error::{Error, HtmlError},
    pagination::Pagination,
    schema::{AuthorRecipe, Id, RecipeShort, Subscription, UserRow, UserView},
};

use crate::database::error::QueryError;
use sqlx::{Pool, Postgres};

use super::get_user_view;

pub async fn subscribe(user_id: Id, author_id: Id, pool: &Pool<Postgres>) -> Result<(), Error> {
    if user_id == author_id {
        return Err(HtmlError::InvalidRequest.new("You cannot subscribe to yourself"));
    }

    let result = sqlx::query(
        "INSERT INTO subscriptions (user_id, author_id) VALUES ($1, $2) ON CONFLICT DO NOTHING RETURNING *;",
    )
    .bind(user_id)
    .bind(author_id)
    .execute(pool)
    .await
    .map_err(QueryError::from)?;

    if result.rows_affected() == 0 {
        return Err(HtmlError::InvalidRequest.new("You are already subscribed to this author"));
    }

    Ok(())
}

pub async fn unsubscribe(user_id: Id, author_id: Id, pool: &Pool<Postgres>) -> Result<(), Error> {
    if user_id == author_id {
        return Err(HtmlError::InvalidRequest.new("You cannot unsubscribe from yourself"));
    }

    let result = sqlx::query("DELETE FROM subscriptions WHERE user_id = $1 AND author_id = $2")
        .bind(user_id)
        .bind(author_id)
        .execute(pool)
        .await
        .map_err(QueryError::from)?;

    if result.rows_affected() == 0 {
        return Err(HtmlError::InvalidRequest.new("You are not subscribed to this author"));
    }

    Ok(())
}

/// Newest recipes per author, at most `limit` each when given.
pub async fn list_author_recipes(
    author_ids: &[Id],
    limit: Option<i64>,
    pool: &Pool<Postgres>,
) -> Result<HashMap<Id, Vec<RecipeShort>>, Error> {
    let rows: Vec<AuthorRecipe> = sqlx::query_as(
        "
        SELECT e1.author_id, e1.id, e1.name, e1.image, e1.cooking_time
        FROM (
            SELECT r.author_id, r.id, r.name, r.image, r.cooking_time, r.pub_date,
                ROW_NUMBER() OVER (PARTITION BY r.author_id ORDER BY r.pub_date DESC, r.id DESC) AS position
            FROM recipes r
            WHERE r.author_id = ANY($1)
        ) e1
        WHERE $2::BIGINT IS NULL OR e1.position <= $2
        ORDER BY e1.author_id, e1.position
    ",
    )
    .bind(author_ids)
    .bind(limit)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    let mut hashmap: HashMap<Id, Vec<RecipeShort>> = HashMap::new();
    rows.into_iter().for_each(|row| {
        hashmap.entry(row.author_id).or_default().push(row.into());
    });

    Ok(hashmap)
}

pub async fn count_author_recipes(
    author_ids: &[Id],
    pool: &Pool<Postgres>,
) -> Result<HashMap<Id, i64>, Error> {
    let rows: Vec<(Id, i64)> = sqlx::query_as(
        "SELECT author_id, COUNT(*) FROM recipes WHERE author_id = ANY($1) GROUP BY author_id",
    )
    .bind(author_ids)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(rows.into_iter().collect())
}

/// Attaches recipes and recipe counts to the given authors, keeping their order.
pub async fn build_subscriptions(
    authors: Vec<UserView>,
    recipes_limit: Option<i64>,
    media_url: &str,
    pool: &Pool<Postgres>,
) -> Result<Vec<Subscription>, Error> {
    let ids: Vec<Id> = authors.iter().map(|author| author.id).collect();
    let mut recipes = list_author_recipes(&ids, recipes_limit, pool).await?;
    let counts = count_author_recipes(&ids, pool).await?;

    Ok(authors
        .into_iter()
        .map(|author| Subscription {
            recipes: recipes
                .remove(&author.id)
                .unwrap_or_default()
                .into_iter()
                .map(|recipe| recipe.with_media_url(media_url))
                .collect(),
            recipes_count: counts.get(&author.id).copied().unwrap_or(0),
            author,
        })
        .collect())
}

pub async fn fetch_subscriptions(
    user_id: Id,
    pagination: Pagination,
    pool: &Pool<Postgres>,
) -> Result<(Vec<UserView>, i64), Error> {
    let rows: Vec<UserRow> = sqlx::query_as(
        "
        SELECT u.email, u.id, u.username, u.first_name, u.last_name,
            TRUE AS is_subscribed,
            COUNT(*) OVER() AS count
        FROM subscriptions s
        INNER JOIN users u ON u.id = s.author_id
        WHERE s.user_id = $1
        ORDER BY s.id DESC
        LIMIT $2 OFFSET $3
    ",
    )
    .bind(user_id)
    .bind(pagination.limit)
    .bind(pagination.offset())
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    let total_count = rows.first().map(|row| row.count).unwrap_or(0);
    Ok((rows.into_iter().map(UserView::from).collect(), total_count))
}

pub async fn get_subscription(
    user_id: Id,
    author_id: Id,
    recipes_limit: Option<i64>,
    media_url: &str,
    pool: &Pool<Postgres>,
) -> Result<Subscription, Error> {
    let author = get_user_view(author_id, Some(user_id), pool)
        .await?
        .ok_or_else(|| HtmlError::NotFound.default())?;

    build_subscriptions(vec![author], recipes_limit, media_url, pool)
        .await?
        .pop()
        .ok_or_else(|| HtmlError::NotFound.default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::fixtures;

    #[sqlx::test(migrations = "./migrations")]
    async fn subscriptions_are_unique(pool: Pool<Postgres>) {
        let reader = fixtures::user("reader", &pool).await;
        let author = fixtures::user("author", &pool).await;

        subscribe(reader.id, author.id, &pool).await.unwrap();
        let error = subscribe(reader.id, author.id, &pool).await.unwrap_err();
        assert_eq!(error.code, 400);
        assert_eq!(error.info(), "You are already subscribed to this author");

        let error = subscribe(reader.id, reader.id, &pool).await.unwrap_err();
        assert_eq!(error.code, 400);

        unsubscribe(reader.id, author.id, &pool).await.unwrap();
        let error = unsubscribe(reader.id, author.id, &pool).await.unwrap_err();
        assert_eq!(error.info(), "You are not subscribed to this author");
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn recipes_limit_caps_each_author(pool: Pool<Postgres>) {
        let reader = fixtures::user("reader", &pool).await;
        let author = fixtures::user("author", &pool).await;
        let other = fixtures::user("other", &pool).await;
        for name in ["First", "Second", "Third"] {
            fixtures::recipe(author.id, name, &[], &[], &pool).await;
        }
        fixtures::recipe(other.id, "Lonely", &[], &[], &pool).await;

        subscribe(reader.id, author.id, &pool).await.unwrap();
        subscribe(reader.id, other.id, &pool).await.unwrap();

        let recipes = list_author_recipes(&[author.id, other.id], Some(2), &pool)
            .await
            .unwrap();
        let names: Vec<&str> = recipes[&author.id].iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Third", "Second"]);
        assert_eq!(recipes[&other.id].len(), 1);

        let subscription = get_subscription(reader.id, author.id, Some(1), "/media/", &pool)
            .await
            .unwrap();
        assert_eq!(subscription.recipes.len(), 1);
        assert_eq!(subscription.recipes_count, 3);
        assert!(subscription.author.is_subscribed);

        let subscription = get_subscription(reader.id, author.id, None, "/media/", &pool)
            .await
            .unwrap();
        assert_eq!(subscription.recipes.len(), 3);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn subscription_list_is_newest_first(pool: Pool<Postgres>) {
        let reader = fixtures::user("reader", &pool).await;
        let first = fixtures::user("first", &pool).await;
        let second = fixtures::user("second", &pool).await;
        subscribe(reader.id, first.id, &pool).await.unwrap();
        subscribe(reader.id, second.id, &pool).await.unwrap();

        let pagination = Pagination { page: 1, limit: 10 };
        let (authors, count) = fetch_subscriptions(reader.id, pagination, &pool)
            .await
            .unwrap();

        assert_eq!(count, 2);
        let ids: Vec<Id> = authors.iter().map(|author| author.id).collect();
        assert_eq!(ids, vec![second.id, first.id]);
    }
}
