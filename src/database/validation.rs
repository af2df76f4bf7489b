use std::collections::HashSet;

use crate::{
    constants::{
        PASSWORD_MIN_LENGTH, RECIPE_NAME_MAX_LENGTH, SMALL_INT_MAX, USERNAME_MIN_LENGTH,
        USER_EMAIL_MAX_LENGTH, USER_NAME_MAX_LENGTH,
    },
    error::{Error, HtmlError},
};

use super::schema::{Id, RecipeForm, RecipePartForm, RecipeUpdateForm, UserForm};

fn required(field: &str, value: &str, max_length: usize) -> Result<(), Error> {
    if value.trim().is_empty() {
        return Err(HtmlError::InvalidRequest.new(&format!("'{field}' is required")));
    }
    if value.chars().count() > max_length {
        return Err(HtmlError::InvalidRequest.new(&format!(
            "'{field}' must be at most {max_length} characters"
        )));
    }
    Ok(())
}

pub fn validate_email(email: &str) -> Result<(), Error> {
    required("email", email, USER_EMAIL_MAX_LENGTH)?;

    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };

    match valid {
        true => Ok(()),
        false => Err(HtmlError::InvalidRequest.new("Enter a valid email address")),
    }
}

pub fn validate_username(username: &str) -> Result<(), Error> {
    required("username", username, USER_NAME_MAX_LENGTH)?;

    if username.chars().count() < USERNAME_MIN_LENGTH {
        return Err(HtmlError::InvalidRequest.new(&format!(
            "Username must be at least {USERNAME_MIN_LENGTH} characters long"
        )));
    }
    if !username.chars().all(char::is_alphanumeric) || username.chars().all(char::is_numeric) {
        return Err(HtmlError::InvalidRequest
            .new("Username must consist of letters and digits and not only digits"));
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), Error> {
    if password.chars().count() < PASSWORD_MIN_LENGTH {
        return Err(HtmlError::InvalidRequest.new(&format!(
            "Password must be at least {PASSWORD_MIN_LENGTH} characters long"
        )));
    }
    Ok(())
}

pub fn validate_user_form(form: &UserForm) -> Result<(), Error> {
    validate_email(&form.email)?;
    validate_username(&form.username)?;
    required("first_name", &form.first_name, USER_NAME_MAX_LENGTH)?;
    required("last_name", &form.last_name, USER_NAME_MAX_LENGTH)?;
    validate_password(&form.password)
}

fn validate_positive_small(field: &str, value: i32) -> Result<(), Error> {
    if !(1..=SMALL_INT_MAX).contains(&value) {
        return Err(HtmlError::InvalidRequest.new(&format!(
            "'{field}' must be between 1 and {SMALL_INT_MAX}"
        )));
    }
    Ok(())
}

pub fn validate_recipe_parts(parts: &[RecipePartForm]) -> Result<(), Error> {
    if parts.is_empty() {
        return Err(HtmlError::InvalidRequest.new("A recipe needs at least one ingredient"));
    }

    let mut seen = HashSet::new();
    for part in parts {
        if !seen.insert(part.id) {
            return Err(HtmlError::InvalidRequest
                .new(&format!("Ingredient {} is listed more than once", part.id)));
        }
        validate_positive_small("amount", part.amount)?;
    }
    Ok(())
}

pub fn validate_recipe_tags(tags: &[Id]) -> Result<(), Error> {
    if tags.is_empty() {
        return Err(HtmlError::InvalidRequest.new("A recipe needs at least one tag"));
    }

    let mut seen = HashSet::new();
    if let Some(tag) = tags.iter().find(|tag| !seen.insert(**tag)) {
        return Err(HtmlError::InvalidRequest.new(&format!("Tag {tag} is listed more than once")));
    }
    Ok(())
}

/// Borrowed recipe fields, `None` where a payload leaves a field out.
#[derive(Debug, Default, Clone, Copy)]
pub struct RecipeFields<'a> {
    pub ingredients: Option<&'a [RecipePartForm]>,
    pub tags: Option<&'a [Id]>,
    pub image: Option<&'a str>,
    pub name: Option<&'a str>,
    pub text: Option<&'a str>,
    pub cooking_time: Option<i32>,
}

impl<'a> From<&'a RecipeForm> for RecipeFields<'a> {
    fn from(form: &'a RecipeForm) -> Self {
        Self {
            ingredients: Some(form.ingredients.as_slice()),
            tags: Some(form.tags.as_slice()),
            image: Some(form.image.as_str()),
            name: Some(form.name.as_str()),
            text: Some(form.text.as_str()),
            cooking_time: Some(form.cooking_time),
        }
    }
}

impl<'a> From<&'a RecipeUpdateForm> for RecipeFields<'a> {
    fn from(form: &'a RecipeUpdateForm) -> Self {
        Self {
            ingredients: form.ingredients.as_deref(),
            tags: form.tags.as_deref(),
            image: form.image.as_deref(),
            name: form.name.as_deref(),
            text: form.text.as_deref(),
            cooking_time: form.cooking_time,
        }
    }
}

/// Checks every field present in the form; absent fields are left alone.
pub fn validate_recipe_form<'a>(form: impl Into<RecipeFields<'a>>) -> Result<(), Error> {
    let form = form.into();

    if let Some(name) = form.name {
        required("name", name, RECIPE_NAME_MAX_LENGTH)?;
    }
    if let Some(text) = form.text {
        required("text", text, usize::MAX)?;
    }
    if let Some(cooking_time) = form.cooking_time {
        validate_positive_small("cooking_time", cooking_time)?;
    }
    if let Some(parts) = form.ingredients {
        validate_recipe_parts(parts)?;
    }
    if let Some(tags) = form.tags {
        validate_recipe_tags(tags)?;
    }
    if let Some(image) = form.image {
        if image.trim().is_empty() {
            return Err(HtmlError::InvalidRequest.new("'image' is required"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_form() -> UserForm {
        UserForm {
            email: String::from("cook@example.com"),
            username: String::from("cook42"),
            first_name: String::from("Julia"),
            last_name: String::from("Child"),
            password: String::from("bouillabaisse"),
        }
    }

    fn recipe_form() -> RecipeUpdateForm {
        RecipeUpdateForm {
            ingredients: Some(vec![
                RecipePartForm { id: 1, amount: 10 },
                RecipePartForm { id: 2, amount: 1 },
            ]),
            tags: Some(vec![1, 2]),
            image: Some(String::from("data:image/png;base64,AAAA")),
            name: Some(String::from("Omelette")),
            text: Some(String::from("Whisk and fry.")),
            cooking_time: Some(5),
        }
    }

    #[test]
    fn accepts_valid_user() {
        assert!(validate_user_form(&user_form()).is_ok());
    }

    #[test]
    fn rejects_bad_usernames() {
        for username in ["ab", "12345", "chef!", "two words", ""] {
            let form = UserForm {
                username: username.to_string(),
                ..user_form()
            };
            assert_eq!(validate_user_form(&form).unwrap_err().code, 400, "{username}");
        }
    }

    #[test]
    fn rejects_bad_emails() {
        for email in ["cook", "cook@", "@example.com", "cook@example", "co ok@example.com"] {
            assert!(validate_email(email).is_err(), "{email}");
        }
        assert!(validate_email(&format!("{}@example.com", "a".repeat(150))).is_err());
    }

    #[test]
    fn rejects_short_passwords_and_blank_names() {
        let form = UserForm {
            password: String::from("short"),
            ..user_form()
        };
        assert!(validate_user_form(&form).is_err());

        let form = UserForm {
            first_name: String::from("   "),
            ..user_form()
        };
        assert_eq!(
            validate_user_form(&form).unwrap_err().info(),
            "'first_name' is required"
        );
    }

    #[test]
    fn accepts_valid_recipe_and_empty_update() {
        assert!(validate_recipe_form(&recipe_form()).is_ok());
        assert!(validate_recipe_form(&RecipeUpdateForm::default()).is_ok());
    }

    #[test]
    fn rejects_duplicate_or_empty_ingredients() {
        let form = RecipeUpdateForm {
            ingredients: Some(vec![
                RecipePartForm { id: 1, amount: 1 },
                RecipePartForm { id: 1, amount: 2 },
            ]),
            ..recipe_form()
        };
        assert!(validate_recipe_form(&form).is_err());

        let form = RecipeUpdateForm {
            ingredients: Some(vec![]),
            ..recipe_form()
        };
        assert!(validate_recipe_form(&form).is_err());
    }

    #[test]
    fn rejects_out_of_range_amounts_and_times() {
        let form = RecipeUpdateForm {
            ingredients: Some(vec![RecipePartForm { id: 1, amount: 0 }]),
            ..recipe_form()
        };
        assert!(validate_recipe_form(&form).is_err());

        let form = RecipeUpdateForm {
            cooking_time: Some(0),
            ..recipe_form()
        };
        assert!(validate_recipe_form(&form).is_err());

        let form = RecipeUpdateForm {
            cooking_time: Some(40_000),
            ..recipe_form()
        };
        assert!(validate_recipe_form(&form).is_err());
    }

    #[test]
    fn rejects_duplicate_or_missing_tags() {
        let form = RecipeUpdateForm {
            tags: Some(vec![3, 3]),
            ..recipe_form()
        };
        assert_eq!(
            validate_recipe_form(&form).unwrap_err().info(),
            "Tag 3 is listed more than once"
        );

        let form = RecipeUpdateForm {
            tags: Some(vec![]),
            ..recipe_form()
        };
        assert!(validate_recipe_form(&form).is_err());
    }

    #[test]
    fn rejects_long_names() {
        let form = RecipeUpdateForm {
            name: Some("x".repeat(201)),
            ..recipe_form()
        };
        assert!(validate_recipe_form(&form).is_err());
    }

    #[test]
    fn full_payloads_need_every_field() {
        let form = RecipeForm {
            ingredients: vec![RecipePartForm { id: 1, amount: 10 }],
            tags: vec![1],
            image: String::from("data:image/png;base64,AAAA"),
            name: String::from("Omelette"),
            text: String::from("Whisk and fry."),
            cooking_time: 5,
        };
        assert!(validate_recipe_form(&form).is_ok());

        let form = RecipeForm {
            tags: vec![],
            ..form
        };
        assert_eq!(
            validate_recipe_form(&form).unwrap_err().info(),
            "A recipe needs at least one tag"
        );

        let form = RecipeForm {
            tags: vec![1],
            image: String::from("  "),
            ..form
        };
        assert_eq!(
            validate_recipe_form(&form).unwrap_err().info(),
            "'image' is required"
        );
    }
}
