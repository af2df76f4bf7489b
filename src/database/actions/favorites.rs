use crate::{
    error::{Error, HtmlError},
    schema::{Id, RecipeShort},
};

use crate::database::error::QueryError;
use sqlx::{Pool, Postgres};

use super::get_recipe_short;

pub async fn add_to_favorites(
    id: Id,
    user_id: Id,
    pool: &Pool<Postgres>,
) -> Result<RecipeShort, Error> {
    let recipe = get_recipe_short(id, pool)
        .await?
        .ok_or_else(|| HtmlError::NotFound.default())?;

    let result = sqlx::query("INSERT INTO favorites (user_id, recipe_id) VALUES ($1, $2) ON CONFLICT DO NOTHING RETURNING *;")
        .bind(user_id)
        .bind(id)
        .execute(pool)
        .await
        .map_err(QueryError::from)?;

    if result.rows_affected() == 0 {
        return Err(HtmlError::InvalidRequest.new("Recipe is already in favorites"));
    }

    Ok(recipe)
}

pub async fn remove_from_favorites(
    id: Id,
    user_id: Id,
    pool: &Pool<Postgres>,
) -> Result<(), Error> {
    if get_recipe_short(id, pool).await?.is_none() {
        return Err(HtmlError::NotFound.default());
    }

    let result = sqlx::query("DELETE FROM favorites WHERE user_id = $1 AND recipe_id = $2")
        .bind(user_id)
        .bind(id)
        .execute(pool)
        .await
        .map_err(QueryError::from)?;

    if result.rows_affected() == 0 {
        return Err(HtmlError::InvalidRequest.new("Recipe is not in favorites"));
    }

    Ok(())
}
