use std::path::Path;

use sqlx::{Pool, Postgres};

use crate::{
    constants::{
        INGREDIENT_NAME_MAX_LENGTH, MEASUREMENT_UNIT_MAX_LENGTH, TAG_NAME_MAX_LENGTH,
        TAG_SLUG_MAX_LENGTH,
    },
    database::{
        actions::{create_ingredient, create_tag},
        error::TypeError,
    },
    error::{Error, HtmlError},
};

/*
Seed data files, one record per line, no header. A quoted field may span lines.

ingredients     name,measurement_unit
                "bread, rye",g
tags            name,color,slug
                Breakfast,#E26C2D,breakfast
*/

/// Splits one CSV line into fields. Fields may be wrapped in double quotes,
/// a doubled quote inside a quoted field stands for a literal quote.
pub fn parse_csv_line(line: &str) -> Result<Vec<String>, TypeError> {
    let mut fields = vec![];
    let mut field = String::new();
    let mut quoted = false;
    let mut chars = line.trim_end_matches(['\r', '\n']).chars().peekable();

    while let Some(c) = chars.next() {
        match (c, quoted) {
            ('"', true) => {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    field.push('"');
                } else {
                    quoted = false;
                }
            }
            ('"', false) if field.is_empty() => quoted = true,
            (',', false) => fields.push(std::mem::take(&mut field)),
            (c, _) => field.push(c),
        }
    }

    if quoted {
        return Err(TypeError::new("Invalid syntax; Unterminated quote"));
    }

    fields.push(field);
    Ok(fields.into_iter().map(|f| f.trim().to_string()).collect())
}

fn check_length(field: &str, value: &str, max: usize) -> Result<(), TypeError> {
    if value.is_empty() {
        return Err(TypeError::new(&format!("Invalid syntax; Empty {field}")));
    }
    if value.chars().count() > max {
        return Err(TypeError::new(&format!(
            "Invalid syntax; {field} is longer than {max} characters"
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
pub struct IngredientRecord {
    pub name: String,
    pub measurement_unit: String,
}

impl TryFrom<&str> for IngredientRecord {
    type Error = TypeError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let mut fields = parse_csv_line(value)?.into_iter();

        let (name, measurement_unit) = match (fields.next(), fields.next(), fields.next()) {
            (Some(name), Some(unit), None) => (name, unit),
            _ => return Err(TypeError::new("Invalid syntax; Expected 2 fields")),
        };

        check_length("name", &name, INGREDIENT_NAME_MAX_LENGTH)?;
        check_length("measurement_unit", &measurement_unit, MEASUREMENT_UNIT_MAX_LENGTH)?;

        Ok(Self {
            name,
            measurement_unit,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TagRecord {
    pub name: String,
    pub color: String,
    pub slug: String,
}

fn is_hex_color(value: &str) -> bool {
    value.len() == 7
        && value.starts_with('#')
        && value[1..].chars().all(|c| c.is_ascii_hexdigit())
}

impl TryFrom<&str> for TagRecord {
    type Error = TypeError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let mut fields = parse_csv_line(value)?.into_iter();

        let (name, color, slug) =
            match (fields.next(), fields.next(), fields.next(), fields.next()) {
                (Some(name), Some(color), Some(slug), None) => (name, color, slug),
                _ => return Err(TypeError::new("Invalid syntax; Expected 3 fields")),
            };

        check_length("name", &name, TAG_NAME_MAX_LENGTH)?;
        check_length("slug", &slug, TAG_SLUG_MAX_LENGTH)?;

        if !is_hex_color(&color) {
            return Err(TypeError::new("Invalid syntax; Invalid color"));
        }
        if !slug
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(TypeError::new("Invalid syntax; Invalid slug"));
        }

        Ok(Self { name, color, slug })
    }
}

/// Splits file content into records, each with the line it starts on.
/// Line breaks inside a quoted field belong to that field.
pub fn split_records(content: &str) -> Vec<(usize, String)> {
    let mut records = vec![];
    let mut record = String::new();
    let mut line = 1;
    let mut start = 1;
    let mut quoted = false;
    let mut field_start = true;
    let mut closed = false;

    for c in content.chars() {
        if c == '\n' && !quoted {
            if !record.trim().is_empty() {
                records.push((start, std::mem::take(&mut record)));
            }
            record.clear();
            line += 1;
            start = line;
            field_start = true;
            closed = false;
            continue;
        }

        match c {
            '"' if quoted => {
                quoted = false;
                closed = true;
            }
            '"' if field_start || closed => {
                quoted = true;
                field_start = false;
                closed = false;
            }
            ',' if !quoted => {
                field_start = true;
                closed = false;
            }
            '\n' => {
                line += 1;
                field_start = false;
            }
            _ => {
                field_start = false;
                closed = false;
            }
        }
        record.push(c);
    }

    if !record.trim().is_empty() {
        records.push((start, record));
    }

    records
}

async fn read_records(path: &Path) -> Result<Vec<(usize, String)>, Error> {
    let content = tokio::fs::read_to_string(path).await.map_err(|e| {
        HtmlError::InternalServerError.new(&format!("Cannot read {}: {e}", path.display()))
    })?;

    Ok(split_records(&content))
}

/// Inserts every ingredient of the file that does not exist yet, returns the
/// number of inserted rows.
pub async fn load_ingredients(path: &Path, pool: &Pool<Postgres>) -> Result<usize, Error> {
    let mut inserted = 0;

    for (line, text) in read_records(path).await? {
        let record = match IngredientRecord::try_from(text.as_str()) {
            Ok(record) => record,
            Err(e) => {
                log::warn!("{}:{line} skipped {e}", path.display());
                continue;
            }
        };

        if create_ingredient(&record.name, &record.measurement_unit, pool).await? {
            inserted += 1;
        } else {
            log::info!("Ingredient {} already exists, skipped", record.name);
        }
    }

    log::info!("Loaded {inserted} ingredients from {}", path.display());
    Ok(inserted)
}

/// Inserts every tag of the file whose name and slug are still free, returns
/// the number of inserted rows.
pub async fn load_tags(path: &Path, pool: &Pool<Postgres>) -> Result<usize, Error> {
    let mut inserted = 0;

    for (line, text) in read_records(path).await? {
        let record = match TagRecord::try_from(text.as_str()) {
            Ok(record) => record,
            Err(e) => {
                log::warn!("{}:{line} skipped {e}", path.display());
                continue;
            }
        };

        if create_tag(&record.name, &record.color, &record.slug, pool).await? {
            inserted += 1;
        } else {
            log::info!("Tag {} already exists, skipped", record.slug);
        }
    }

    log::info!("Loaded {inserted} tags from {}", path.display());
    Ok(inserted)
}
