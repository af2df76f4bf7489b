use crate::{
    authentication::permissions::ActionType,
    error::{Error, HtmlError},
    jwt::SessionData,
    media::absolute_url,
    pagination::Pagination,
    schema::{
        Id, Recipe, RecipeFilter, RecipeForm, RecipePartForm, RecipeRow, RecipeShort,
        RecipeUpdateForm,
    },
};

use crate::database::error::QueryError;
use sqlx::{PgConnection, Pool, Postgres, QueryBuilder};

use super::{list_recipe_parts, list_recipe_tags, list_user_views};

/// Newest first. Favorite and cart filters only apply when a viewer is known.
pub async fn fetch_recipes(
    filter: &RecipeFilter,
    viewer: Option<Id>,
    pagination: Pagination,
    pool: &Pool<Postgres>,
) -> Result<(Vec<RecipeRow>, i64), Error> {
    let mut query: QueryBuilder<Postgres> = QueryBuilder::new(
        "SELECT r.id, r.author_id, r.name, r.image, r.text, r.cooking_time, r.pub_date, ",
    );

    query
        .push("EXISTS(SELECT 1 FROM favorites f WHERE f.recipe_id = r.id AND f.user_id = ")
        .push_bind(viewer)
        .push(") AS is_favorited, ")
        .push("EXISTS(SELECT 1 FROM shopping_cart c WHERE c.recipe_id = r.id AND c.user_id = ")
        .push_bind(viewer)
        .push(") AS is_in_shopping_cart, ")
        .push("COUNT(*) OVER() AS count FROM recipes r WHERE TRUE");

    if let Some(author) = filter.author {
        query.push(" AND r.author_id = ").push_bind(author);
    }

    if !filter.tags.is_empty() {
        query
            .push(" AND EXISTS(SELECT 1 FROM recipe_tags rt INNER JOIN tags t ON t.id = rt.tag_id WHERE rt.recipe_id = r.id AND t.slug = ANY(")
            .push_bind(filter.tags.to_owned())
            .push("))");
    }

    if let Some(viewer) = viewer {
        if filter.is_favorited {
            query
                .push(" AND EXISTS(SELECT 1 FROM favorites f WHERE f.recipe_id = r.id AND f.user_id = ")
                .push_bind(viewer)
                .push(")");
        }
        if filter.is_in_shopping_cart {
            query
                .push(" AND EXISTS(SELECT 1 FROM shopping_cart c WHERE c.recipe_id = r.id AND c.user_id = ")
                .push_bind(viewer)
                .push(")");
        }
    }

    query
        .push(" ORDER BY r.pub_date DESC, r.id DESC LIMIT ")
        .push_bind(pagination.limit)
        .push(" OFFSET ")
        .push_bind(pagination.offset());

    let rows: Vec<RecipeRow> = query
        .build_query_as()
        .fetch_all(pool)
        .await
        .map_err(QueryError::from)?;

    let total_count = rows.first().map(|row| row.count).unwrap_or(0);
    Ok((rows, total_count))
}

pub async fn get_recipe(
    id: Id,
    viewer: Option<Id>,
    pool: &Pool<Postgres>,
) -> Result<Option<RecipeRow>, Error> {
    let row: Option<RecipeRow> = sqlx::query_as(
        "
        SELECT r.id, r.author_id, r.name, r.image, r.text, r.cooking_time, r.pub_date,
            EXISTS(SELECT 1 FROM favorites f WHERE f.recipe_id = r.id AND f.user_id = $2) AS is_favorited,
            EXISTS(SELECT 1 FROM shopping_cart c WHERE c.recipe_id = r.id AND c.user_id = $2) AS is_in_shopping_cart,
            1::BIGINT AS count
        FROM recipes r
        WHERE r.id = $1
    ",
    )
    .bind(id)
    .bind(viewer)
    .fetch_optional(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(row)
}

pub async fn get_recipe_short(id: Id, pool: &Pool<Postgres>) -> Result<Option<RecipeShort>, Error> {
    let row: Option<RecipeShort> =
        sqlx::query_as("SELECT id, name, image, cooking_time FROM recipes WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(QueryError::from)?;

    Ok(row)
}

/// Authors manage their own recipes, admins manage every recipe.
fn may_modify(recipe: &RecipeRow, session: &SessionData) -> bool {
    session.is_admin || recipe.author_id == session.user_id
}

/// Loads a recipe the session is allowed to modify.
pub async fn get_recipe_mut(
    id: Id,
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<RecipeRow, Error> {
    let recipe = get_recipe(id, Some(session.user_id), pool).await?;
    session.authenticate(ActionType::ManageOwnRecipes)?;

    match recipe {
        Some(recipe) if may_modify(&recipe, session) => Ok(recipe),
        Some(_) => Err(HtmlError::Forbidden.default()),
        None => Err(HtmlError::NotFound.default()),
    }
}

/// Expands recipe rows with their tags, ingredients and authors.
pub async fn build_recipes(
    rows: Vec<RecipeRow>,
    viewer: Option<Id>,
    media_url: &str,
    pool: &Pool<Postgres>,
) -> Result<Vec<Recipe>, Error> {
    let ids: Vec<Id> = rows.iter().map(|row| row.id).collect();
    let mut author_ids: Vec<Id> = rows.iter().map(|row| row.author_id).collect();
    author_ids.sort_unstable();
    author_ids.dedup();

    let mut tags = list_recipe_tags(&ids, pool).await?;
    let mut parts = list_recipe_parts(&ids, pool).await?;
    let authors = list_user_views(&author_ids, viewer, pool).await?;

    rows.into_iter()
        .map(|row| {
            let author = authors.get(&row.author_id).cloned().ok_or_else(|| {
                log::error!("Recipe {} has no author {}", row.id, row.author_id);
                HtmlError::InternalServerError.default()
            })?;

            Ok(Recipe {
                id: row.id,
                tags: tags.remove(&row.id).unwrap_or_default(),
                author,
                ingredients: parts.remove(&row.id).unwrap_or_default(),
                is_favorited: row.is_favorited,
                is_in_shopping_cart: row.is_in_shopping_cart,
                name: row.name,
                image: absolute_url(media_url, &row.image),
                text: row.text,
                cooking_time: row.cooking_time,
            })
        })
        .collect()
}

pub async fn build_recipe(
    row: RecipeRow,
    viewer: Option<Id>,
    media_url: &str,
    pool: &Pool<Postgres>,
) -> Result<Recipe, Error> {
    build_recipes(vec![row], viewer, media_url, pool)
        .await?
        .pop()
        .ok_or_else(|| HtmlError::NotFound.default())
}

fn small_int(field: &str, value: i32) -> Result<i16, Error> {
    i16::try_from(value)
        .map_err(|_| HtmlError::InvalidRequest.new(&format!("'{field}' is out of range")))
}

async fn replace_recipe_tags(
    recipe_id: Id,
    tags: &[Id],
    conn: &mut PgConnection,
) -> Result<(), Error> {
    sqlx::query("DELETE FROM recipe_tags WHERE recipe_id = $1")
        .bind(recipe_id)
        .execute(&mut *conn)
        .await
        .map_err(QueryError::from)?;

    if tags.is_empty() {
        return Ok(());
    }

    let mut query_builder: QueryBuilder<Postgres> =
        QueryBuilder::new("INSERT INTO recipe_tags (recipe_id, tag_id) ");

    query_builder.push_values(tags.iter(), |mut b, tag_id| {
        b.push_bind(recipe_id).push_bind(*tag_id);
    });

    query_builder
        .build()
        .execute(&mut *conn)
        .await
        .map_err(QueryError::from)?;

    Ok(())
}

async fn replace_recipe_parts(
    recipe_id: Id,
    parts: &[RecipePartForm],
    conn: &mut PgConnection,
) -> Result<(), Error> {
    let parts = parts
        .iter()
        .map(|part| Ok((part.id, small_int("amount", part.amount)?)))
        .collect::<Result<Vec<(Id, i16)>, Error>>()?;

    sqlx::query("DELETE FROM recipe_ingredients WHERE recipe_id = $1")
        .bind(recipe_id)
        .execute(&mut *conn)
        .await
        .map_err(QueryError::from)?;

    if parts.is_empty() {
        return Ok(());
    }

    let mut query_builder: QueryBuilder<Postgres> =
        QueryBuilder::new("INSERT INTO recipe_ingredients (recipe_id, ingredient_id, amount) ");

    query_builder.push_values(parts.iter(), |mut b, (ingredient_id, amount)| {
        b.push_bind(recipe_id)
            .push_bind(*ingredient_id)
            .push_bind(*amount);
    });

    query_builder
        .build()
        .execute(&mut *conn)
        .await
        .map_err(QueryError::from)?;

    Ok(())
}

/// Writes the recipe with its tags and ingredient amounts in one transaction.
/// `image` is the already stored image's media path.
pub async fn create_recipe(
    author_id: Id,
    form: &RecipeForm,
    image: &str,
    pool: &Pool<Postgres>,
) -> Result<Id, Error> {
    let cooking_time = small_int("cooking_time", form.cooking_time)?;
    let mut tx = pool.begin().await.map_err(QueryError::from)?;

    let recipe: (Id,) = sqlx::query_as(
        "
        INSERT INTO recipes (author_id, name, image, text, cooking_time)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id
    ",
    )
    .bind(author_id)
    .bind(form.name.trim())
    .bind(image)
    .bind(&form.text)
    .bind(cooking_time)
    .fetch_one(&mut *tx)
    .await
    .map_err(QueryError::from)?;

    let recipe_id = recipe.0;

    replace_recipe_tags(recipe_id, &form.tags, &mut tx).await?;
    replace_recipe_parts(recipe_id, &form.ingredients, &mut tx).await?;

    tx.commit().await.map_err(QueryError::from)?;

    log::info!("User {author_id} published recipe {recipe_id}");
    Ok(recipe_id)
}

/// Updates the given fields; given tags or ingredients replace the old sets.
pub async fn update_recipe(
    id: Id,
    form: &RecipeUpdateForm,
    image: Option<&str>,
    pool: &Pool<Postgres>,
) -> Result<(), Error> {
    let cooking_time = form
        .cooking_time
        .map(|value| small_int("cooking_time", value))
        .transpose()?;
    let mut tx = pool.begin().await.map_err(QueryError::from)?;

    sqlx::query(
        "
        UPDATE recipes SET
        name = COALESCE($1, name),
        text = COALESCE($2, text),
        cooking_time = COALESCE($3, cooking_time),
        image = COALESCE($4, image)
        WHERE id = $5
    ",
    )
    .bind(form.name.as_deref().map(str::trim))
    .bind(form.text.as_deref())
    .bind(cooking_time)
    .bind(image)
    .bind(id)
    .execute(&mut *tx)
    .await
    .map_err(QueryError::from)?;

    if let Some(tags) = &form.tags {
        replace_recipe_tags(id, tags, &mut tx).await?;
    }
    if let Some(parts) = &form.ingredients {
        replace_recipe_parts(id, parts, &mut tx).await?;
    }

    tx.commit().await.map_err(QueryError::from)?;

    log::info!("Updated recipe {id}");
    Ok(())
}

pub async fn delete_recipe(id: Id, pool: &Pool<Postgres>) -> Result<(), Error> {
    let result = sqlx::query("DELETE FROM recipes WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .map_err(QueryError::from)?;

    if result.rows_affected() == 0 {
        return Err(HtmlError::NotFound.default());
    }

    log::info!("Deleted recipe {id}");
    Ok(())
}
