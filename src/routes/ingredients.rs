use warp::{reject::Rejection, reply::Reply, Filter};

use crate::{
    actions::{get_ingredient, list_ingredients},
    error::HtmlError,
    form::QueryForm,
    middleware::with_state,
    schema::Id,
    state::SharedState,
};

use super::with_query;

/// Unpaginated; `?name=` narrows the list to names starting with it.
async fn ingredient_list(form: QueryForm, state: SharedState) -> Result<impl Reply, Rejection> {
    let ingredients = list_ingredients(form.get_str("name"), &state.pool).await?;
    Ok(warp::reply::json(&ingredients))
}

async fn ingredient_detail(id: Id, state: SharedState) -> Result<impl Reply, Rejection> {
    let ingredient = get_ingredient(id, &state.pool)
        .await?
        .ok_or_else(|| HtmlError::NotFound.default())?;

    Ok(warp::reply::json(&ingredient))
}

pub fn routes(state: SharedState) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let list = warp::path!("api" / "ingredients")
        .and(warp::get())
        .and(with_query())
        .and(with_state(state.clone()))
        .and_then(ingredient_list);

    let detail = warp::path!("api" / "ingredients" / Id)
        .and(warp::get())
        .and(with_state(state))
        .and_then(ingredient_detail);

    list.or(detail)
}

#[cfg(test)]
mod tests {
    use crate::routes::{routes, tests::state};

    #[tokio::test]
    async fn ids_must_be_numbers() {
        let response = warp::test::request()
            .path("/api/ingredients/flour/")
            .reply(&routes(state()))
            .await;

        assert_eq!(response.status(), 404);
    }
}
