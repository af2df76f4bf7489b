use std::fmt::Write;

use crate::{
    constants::SHOPPING_LIST_HEADER,
    error::{Error, HtmlError},
    schema::{Id, RecipeShort, ShoppingListItem},
};

use crate::database::error::QueryError;
use sqlx::{Pool, Postgres};

use super::get_recipe_short;

pub async fn add_to_shopping_cart(
    id: Id,
    user_id: Id,
    pool: &Pool<Postgres>,
) -> Result<RecipeShort, Error> {
    let recipe = get_recipe_short(id, pool)
        .await?
        .ok_or_else(|| HtmlError::NotFound.default())?;

    let result = sqlx::query("INSERT INTO shopping_cart (user_id, recipe_id) VALUES ($1, $2) ON CONFLICT DO NOTHING RETURNING *;")
        .bind(user_id)
        .bind(id)
        .execute(pool)
        .await
        .map_err(QueryError::from)?;

    if result.rows_affected() == 0 {
        return Err(HtmlError::InvalidRequest.new("Recipe is already in the shopping cart"));
    }

    Ok(recipe)
}

pub async fn remove_from_shopping_cart(
    id: Id,
    user_id: Id,
    pool: &Pool<Postgres>,
) -> Result<(), Error> {
    if get_recipe_short(id, pool).await?.is_none() {
        return Err(HtmlError::NotFound.default());
    }

    let result = sqlx::query("DELETE FROM shopping_cart WHERE user_id = $1 AND recipe_id = $2")
        .bind(user_id)
        .bind(id)
        .execute(pool)
        .await
        .map_err(QueryError::from)?;

    if result.rows_affected() == 0 {
        return Err(HtmlError::InvalidRequest.new("Recipe is not in the shopping cart"));
    }

    Ok(())
}

/// Ingredients of every recipe in the user's cart, summed per name and unit.
pub async fn fetch_shopping_list(
    user_id: Id,
    pool: &Pool<Postgres>,
) -> Result<Vec<ShoppingListItem>, Error> {
    let rows: Vec<ShoppingListItem> = sqlx::query_as(
        "
        SELECT i.name AS name, i.measurement_unit AS measurement_unit, SUM(ri.amount)::BIGINT AS amount
        FROM shopping_cart c
        INNER JOIN recipe_ingredients ri ON ri.recipe_id = c.recipe_id
        INNER JOIN ingredients i ON i.id = ri.ingredient_id
        WHERE c.user_id = $1
        GROUP BY i.name, i.measurement_unit
        ORDER BY i.name, i.measurement_unit
    ",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(rows)
}

pub fn render_shopping_list(items: &[ShoppingListItem]) -> String {
    let mut text = String::from(SHOPPING_LIST_HEADER);
    text.push('\n');

    for item in items {
        // Writing into a String cannot fail
        let _ = writeln!(
            text,
            "{}: {} {}",
            item.name, item.amount, item.measurement_unit
        );
    }

    text
}
