use std::fmt::{self, Display};

use warp::reject::Rejection;

use crate::error::{Error, HtmlError};

const CONSTRAINT_MESSAGES: &[(&str, &str)] = &[
    ("unique_user_email", "A user with this email already exists."),
    ("unique_user_email_lower", "A user with this email already exists."),
    ("unique_user_username", "A user with this username already exists."),
    ("unique_follow", "You are already subscribed to this author."),
    ("prevent_self_follow", "You cannot subscribe to yourself."),
    ("unique_tag_name", "A tag with this name already exists."),
    ("unique_tag_slug", "A tag with this slug already exists."),
    ("unique_ingredient_name", "An ingredient with this name already exists."),
    ("unique_recipe_ingredients", "Ingredients must not repeat within a recipe."),
    ("unique_favorites", "Recipe is already in favorites."),
    ("unique_user_shopping_cart", "Recipe is already in the shopping cart."),
    ("recipe_cooking_time_min", "Cooking time must be at least 1 minute."),
    ("recipe_ingredient_amount_min", "Ingredient amount must be at least 1."),
];

pub struct QueryError {
    kind: HtmlError,
    info: String,
}

impl QueryError {
    pub fn new(kind: HtmlError, info: String) -> Self {
        Self { kind, info }
    }

    fn constraint(constraint: Option<&str>, fallback: &str) -> Self {
        let info = constraint
            .and_then(|name| {
                CONSTRAINT_MESSAGES
                    .iter()
                    .find(|(constraint, _)| *constraint == name)
                    .map(|(_, message)| message.to_string())
            })
            .unwrap_or_else(|| fallback.to_string());

        Self::new(HtmlError::InvalidRequest, info)
    }
}

impl From<sqlx::Error> for QueryError {
    fn from(value: sqlx::Error) -> Self {
        match value {
            sqlx::Error::RowNotFound => Self::new(HtmlError::NotFound, String::from("Not found.")),
            sqlx::Error::Database(e) if e.is_unique_violation() => {
                Self::constraint(e.constraint(), "Object already exists.")
            }
            sqlx::Error::Database(e) if e.is_foreign_key_violation() => {
                Self::constraint(e.constraint(), "Referenced object does not exist.")
            }
            sqlx::Error::Database(e) if e.is_check_violation() => {
                Self::constraint(e.constraint(), "Value is out of range.")
            }
            e => {
                log::error!("Database query failed: {e}");
                Self::new(HtmlError::InternalServerError, format!("{e}"))
            }
        }
    }
}

impl From<QueryError> for Error {
    fn from(value: QueryError) -> Self {
        match value.kind {
            // Driver details stay in the log
            HtmlError::InternalServerError => value.kind.default(),
            kind => kind.new(&value.info),
        }
    }
}

pub struct CacheError {
    info: String,
}

impl From<redis::RedisError> for CacheError {
    fn from(value: redis::RedisError) -> Self {
        Self {
            info: format!("{:?} - {:?}", value.code(), value.detail()),
        }
    }
}

impl From<CacheError> for Error {
    fn from(value: CacheError) -> Self {
        log::error!("Session cache failed: {}", value.info);
        HtmlError::InternalServerError.default()
    }
}

#[derive(Debug)]
pub struct TypeError {
    info: String,
}

impl TypeError {
    pub fn new(info: &str) -> Self {
        Self {
            info: info.to_string(),
        }
    }
}

impl From<TypeError> for Error {
    fn from(value: TypeError) -> Self {
        HtmlError::InvalidRequest.new(&value.info)
    }
}

impl Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({})", self.info)
    }
}

impl std::error::Error for TypeError {}

impl From<TypeError> for Rejection {
    fn from(value: TypeError) -> Self {
        warp::reject::custom(Error::from(value))
    }
}
