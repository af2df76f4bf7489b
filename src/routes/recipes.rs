use warp::{
    http::header::CONTENT_DISPOSITION,
    reject::Rejection,
    reply::{self, Reply},
    Filter,
};

use crate::{
    actions::{
        add_to_favorites, add_to_shopping_cart, build_recipe, build_recipes, create_recipe,
        delete_recipe, ensure_ingredients_exist, ensure_tags_exist, fetch_recipes,
        fetch_shopping_list, get_recipe, get_recipe_mut, remove_from_favorites,
        remove_from_shopping_cart, render_shopping_list, update_recipe,
    },
    constants::SHOPPING_LIST_FILENAME,
    error::{Error, HtmlError},
    form::QueryForm,
    jwt::SessionData,
    media::{delete_image, Base64Image},
    middleware::{with_possible_session, with_session, with_state},
    pagination::{PageContext, PageLocation, Pagination},
    permissions::ActionType,
    schema::{Id, Recipe, RecipeFilter, RecipeForm, RecipePartForm, RecipeUpdateForm},
    state::SharedState,
    validation::validate_recipe_form,
};

use super::{created, json_body, no_content, with_page_location, with_query};

/// Reads the list filters; favorite and cart flags need a logged in user.
fn recipe_filter(form: &QueryForm) -> Result<RecipeFilter, Error> {
    Ok(RecipeFilter {
        author: form.get_number::<Id>("author")?,
        tags: form.get_all("tags"),
        is_favorited: form.get_flag("is_favorited"),
        is_in_shopping_cart: form.get_flag("is_in_shopping_cart"),
    })
}

/// Checks that every referenced tag and ingredient exists.
async fn ensure_references(
    tags: Option<&[Id]>,
    parts: Option<&[RecipePartForm]>,
    state: &SharedState,
) -> Result<(), Error> {
    if let Some(tags) = tags {
        ensure_tags_exist(tags, &state.pool).await?;
    }
    if let Some(parts) = parts {
        let ids: Vec<Id> = parts.iter().map(|part| part.id).collect();
        ensure_ingredients_exist(&ids, &state.pool).await?;
    }
    Ok(())
}

async fn load_recipe(id: Id, viewer: Option<Id>, state: &SharedState) -> Result<Recipe, Error> {
    let row = get_recipe(id, viewer, &state.pool)
        .await?
        .ok_or_else(|| HtmlError::NotFound.default())?;

    build_recipe(row, viewer, &state.config.media_url, &state.pool).await
}

async fn recipe_list(
    session: Option<SessionData>,
    form: QueryForm,
    location: PageLocation,
    state: SharedState,
) -> Result<impl Reply, Rejection> {
    let filter = recipe_filter(&form)?;
    let pagination = Pagination::from_form(&form, state.config.page_size)?;
    let viewer = session.map(|session| session.user_id);

    let (rows, total) = fetch_recipes(&filter, viewer, pagination, &state.pool).await?;
    let recipes = build_recipes(rows, viewer, &state.config.media_url, &state.pool).await?;
    let page = PageContext::from_rows(recipes, total, pagination, &location)?;

    Ok(reply::json(&page))
}

async fn recipe_detail(
    id: Id,
    session: Option<SessionData>,
    state: SharedState,
) -> Result<impl Reply, Rejection> {
    let viewer = session.map(|session| session.user_id);
    let recipe = load_recipe(id, viewer, &state).await?;

    Ok(reply::json(&recipe))
}

async fn recipe_create(
    session: SessionData,
    form: RecipeForm,
    state: SharedState,
) -> Result<impl Reply, Rejection> {
    session.authenticate(ActionType::CreateRecipes)?;
    validate_recipe_form(&form)?;
    let image = Base64Image::try_from(form.image.as_str())?;

    ensure_references(
        Some(form.tags.as_slice()),
        Some(form.ingredients.as_slice()),
        &state,
    )
    .await?;

    let media_root = &state.config.media_root;
    let stored = image.save(media_root).await?;

    let id = match create_recipe(session.user_id, &form, &stored, &state.pool).await {
        Ok(id) => id,
        Err(e) => {
            delete_image(media_root, &stored).await;
            return Err(e.into());
        }
    };

    let recipe = load_recipe(id, Some(session.user_id), &state).await?;
    Ok(created(&recipe))
}

async fn recipe_update(
    id: Id,
    session: SessionData,
    form: RecipeUpdateForm,
    state: SharedState,
) -> Result<impl Reply, Rejection> {
    let current = get_recipe_mut(id, &session, &state.pool).await?;

    validate_recipe_form(&form)?;
    let image = form
        .image
        .as_deref()
        .map(Base64Image::try_from)
        .transpose()?;

    ensure_references(form.tags.as_deref(), form.ingredients.as_deref(), &state).await?;

    let media_root = &state.config.media_root;
    let stored = match &image {
        Some(image) => Some(image.save(media_root).await?),
        None => None,
    };

    if let Err(e) = update_recipe(id, &form, stored.as_deref(), &state.pool).await {
        if let Some(stored) = &stored {
            delete_image(media_root, stored).await;
        }
        return Err(e.into());
    }

    if stored.is_some() {
        delete_image(media_root, &current.image).await;
    }

    let recipe = load_recipe(id, Some(session.user_id), &state).await?;
    Ok(reply::json(&recipe))
}

async fn recipe_delete(
    id: Id,
    session: SessionData,
    state: SharedState,
) -> Result<impl Reply, Rejection> {
    let current = get_recipe_mut(id, &session, &state.pool).await?;

    delete_recipe(id, &state.pool).await?;
    delete_image(&state.config.media_root, &current.image).await;

    Ok(no_content())
}

async fn favorite_add(
    id: Id,
    session: SessionData,
    state: SharedState,
) -> Result<impl Reply, Rejection> {
    session.authenticate(ActionType::ManageOwnFavorites)?;

    let recipe = add_to_favorites(id, session.user_id, &state.pool).await?;
    Ok(created(&recipe.with_media_url(&state.config.media_url)))
}

async fn favorite_remove(
    id: Id,
    session: SessionData,
    state: SharedState,
) -> Result<impl Reply, Rejection> {
    session.authenticate(ActionType::ManageOwnFavorites)?;

    remove_from_favorites(id, session.user_id, &state.pool).await?;
    Ok(no_content())
}

async fn cart_add(
    id: Id,
    session: SessionData,
    state: SharedState,
) -> Result<impl Reply, Rejection> {
    session.authenticate(ActionType::ManageOwnShoppingCart)?;

    let recipe = add_to_shopping_cart(id, session.user_id, &state.pool).await?;
    Ok(created(&recipe.with_media_url(&state.config.media_url)))
}

async fn cart_remove(
    id: Id,
    session: SessionData,
    state: SharedState,
) -> Result<impl Reply, Rejection> {
    session.authenticate(ActionType::ManageOwnShoppingCart)?;

    remove_from_shopping_cart(id, session.user_id, &state.pool).await?;
    Ok(no_content())
}

/// Plain text download of the summed ingredients in the user's cart.
async fn cart_download(session: SessionData, state: SharedState) -> Result<impl Reply, Rejection> {
    session.authenticate(ActionType::ManageOwnShoppingCart)?;

    let items = fetch_shopping_list(session.user_id, &state.pool).await?;
    log::debug!(
        "User {} downloaded a shopping list of {} items",
        session.user_id,
        items.len()
    );

    Ok(reply::with_header(
        render_shopping_list(&items),
        CONTENT_DISPOSITION,
        format!("attachment; filename=\"{SHOPPING_LIST_FILENAME}\""),
    ))
}

pub fn routes(state: SharedState) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let list = warp::path!("api" / "recipes")
        .and(warp::get())
        .and(with_possible_session(state.clone()))
        .and(with_query())
        .and(with_page_location())
        .and(with_state(state.clone()))
        .and_then(recipe_list);

    let create = warp::path!("api" / "recipes")
        .and(warp::post())
        .and(with_session(state.clone()))
        .and(json_body::<RecipeForm>())
        .and(with_state(state.clone()))
        .and_then(recipe_create);

    let download = warp::path!("api" / "recipes" / "download_shopping_cart")
        .and(warp::get())
        .and(with_session(state.clone()))
        .and(with_state(state.clone()))
        .and_then(cart_download);

    let detail = warp::path!("api" / "recipes" / Id)
        .and(warp::get())
        .and(with_possible_session(state.clone()))
        .and(with_state(state.clone()))
        .and_then(recipe_detail);

    let update = warp::path!("api" / "recipes" / Id)
        .and(warp::patch())
        .and(with_session(state.clone()))
        .and(json_body::<RecipeUpdateForm>())
        .and(with_state(state.clone()))
        .and_then(recipe_update);

    let delete = warp::path!("api" / "recipes" / Id)
        .and(warp::delete())
        .and(with_session(state.clone()))
        .and(with_state(state.clone()))
        .and_then(recipe_delete);

    let favorite = warp::path!("api" / "recipes" / Id / "favorite")
        .and(warp::post())
        .and(with_session(state.clone()))
        .and(with_state(state.clone()))
        .and_then(favorite_add)
        .or(warp::path!("api" / "recipes" / Id / "favorite")
            .and(warp::delete())
            .and(with_session(state.clone()))
            .and(with_state(state.clone()))
            .and_then(favorite_remove));

    let cart = warp::path!("api" / "recipes" / Id / "shopping_cart")
        .and(warp::post())
        .and(with_session(state.clone()))
        .and(with_state(state.clone()))
        .and_then(cart_add)
        .or(warp::path!("api" / "recipes" / Id / "shopping_cart")
            .and(warp::delete())
            .and(with_session(state.clone()))
            .and(with_state(state))
            .and_then(cart_remove));

    list.or(create)
        .or(download)
        .or(detail)
        .or(update)
        .or(delete)
        .or(favorite)
        .or(cart)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::{
        routes,
        tests::{body_json, state},
    };

    fn form(query: &[(&str, &str)]) -> QueryForm {
        QueryForm::from_data(
            query
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn list_filters_from_the_query() {
        let filter = recipe_filter(&form(&[
            ("author", "4"),
            ("tags", "lunch"),
            ("tags", "dinner"),
            ("is_favorited", "1"),
            ("is_in_shopping_cart", "0"),
        ]))
        .unwrap();

        assert_eq!(
            filter,
            RecipeFilter {
                author: Some(4),
                tags: vec![String::from("lunch"), String::from("dinner")],
                is_favorited: true,
                is_in_shopping_cart: false,
            }
        );
    }

    #[test]
    fn author_filter_must_be_a_number() {
        let error = recipe_filter(&form(&[("author", "julia")])).unwrap_err();
        assert_eq!(error.code, 400);
    }

    #[tokio::test]
    async fn writes_require_a_token() {
        for (method, path) in [
            ("POST", "/api/recipes/"),
            ("PATCH", "/api/recipes/1/"),
            ("DELETE", "/api/recipes/1/"),
            ("POST", "/api/recipes/1/favorite/"),
            ("DELETE", "/api/recipes/1/favorite/"),
            ("POST", "/api/recipes/1/shopping_cart/"),
            ("DELETE", "/api/recipes/1/shopping_cart/"),
            ("GET", "/api/recipes/download_shopping_cart/"),
        ] {
            let response = warp::test::request()
                .method(method)
                .path(path)
                .json(&serde_json::json!({}))
                .reply(&routes(state()))
                .await;

            assert_eq!(response.status(), 401, "{method} {path}");
        }
    }

    #[tokio::test]
    async fn invalid_tokens_are_rejected() {
        let response = warp::test::request()
            .method("POST")
            .path("/api/recipes/")
            .header("authorization", "Token forged")
            .json(&serde_json::json!({}))
            .reply(&routes(state()))
            .await;

        assert_eq!(response.status(), 401);
        assert_eq!(body_json(response.body())["detail"], "Invalid token.");
    }

    #[tokio::test]
    async fn bad_filters_fail_before_the_query() {
        let response = warp::test::request()
            .path("/api/recipes/?author=julia")
            .reply(&routes(state()))
            .await;

        assert_eq!(response.status(), 400);
        assert_eq!(body_json(response.body())["errors"], "'author' must be a number");
    }

    #[tokio::test]
    async fn pages_too_far_out_are_not_found() {
        let response = warp::test::request()
            .path(&format!("/api/recipes/?page={}", i64::MAX))
            .reply(&routes(state()))
            .await;

        assert_eq!(response.status(), 404);
        assert_eq!(body_json(response.body())["detail"], "Invalid page.");
    }
}
