pub const PAGE_SIZE_MAX: i64 = 100;

pub const USER_EMAIL_MAX_LENGTH: usize = 150;
pub const USER_NAME_MAX_LENGTH: usize = 100;
pub const USERNAME_MIN_LENGTH: usize = 3;
pub const PASSWORD_MIN_LENGTH: usize = 8;

pub const RECIPE_NAME_MAX_LENGTH: usize = 200;
pub const TAG_NAME_MAX_LENGTH: usize = 50;
pub const TAG_SLUG_MAX_LENGTH: usize = 10;
pub const INGREDIENT_NAME_MAX_LENGTH: usize = 100;
pub const MEASUREMENT_UNIT_MAX_LENGTH: usize = 50;

/// Upper bound of a postgres SMALLINT column.
pub const SMALL_INT_MAX: i32 = i16::MAX as i32;

pub const REQUEST_BODY_LIMIT: u64 = 16 * 1024 * 1024;

pub const IMAGE_DIRECTORY: &str = "recipes/images";

pub const IMAGE_EXTENSIONS: &[(&str, &str)] = &[
    ("png", "png"),
    ("jpg", "jpg"),
    ("jpeg", "jpg"),
    ("gif", "gif"),
    ("webp", "webp"),
];

pub const SHOPPING_LIST_HEADER: &str = "Ingredients to buy:";
pub const SHOPPING_LIST_FILENAME: &str = "shopping-list.txt";
