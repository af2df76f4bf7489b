use serde::{Deserialize, Serialize};

use crate::{
    constants::PAGE_SIZE_MAX,
    error::{Error, HtmlError},
};

use super::form::QueryForm;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
}

impl Pagination {
    pub fn from_form(form: &QueryForm, default_limit: i64) -> Result<Self, Error> {
        let page = form
            .get_number::<i64>("page")
            .map_err(|_| HtmlError::NotFound.new("Invalid page."))?
            .unwrap_or(1);
        if page < 1 {
            return Err(HtmlError::NotFound.new("Invalid page."));
        }

        let limit = form
            .get_number::<i64>("limit")
            .ok()
            .flatten()
            .filter(|limit| *limit > 0)
            .unwrap_or(default_limit)
            .clamp(1, PAGE_SIZE_MAX);

        // The offset has to fit a BIGINT
        if (page - 1).checked_mul(limit).is_none() {
            return Err(HtmlError::NotFound.new("Invalid page."));
        }

        Ok(Self { page, limit })
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.limit
    }
}

/// Where the current page was requested from, used to link its neighbours.
#[derive(Debug, Clone, Default)]
pub struct PageLocation {
    pub scheme: String,
    pub host: Option<String>,
    pub path: String,
    pub query: String,
}

impl PageLocation {
    pub fn page_url(&self, page: i64) -> String {
        let page_segment = format!("page={page}");
        let mut segments: Vec<&str> = self
            .query
            .split('&')
            .filter(|s| !s.is_empty() && *s != "page" && !s.starts_with("page="))
            .collect();
        if page > 1 {
            segments.push(&page_segment);
        }

        let base = match &self.host {
            Some(host) => format!("{}://{}{}", self.scheme, host, self.path),
            None => self.path.to_owned(),
        };

        match segments.is_empty() {
            true => base,
            false => format!("{base}?{}", segments.join("&")),
        }
    }
}

#[derive(Serialize, Deserialize, Debug)]
pub struct PageContext<T> {
    pub count: i64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

impl<T> PageContext<T> {
    pub fn from_rows(
        rows: Vec<T>,
        total_rows: i64,
        pagination: Pagination,
        location: &PageLocation,
    ) -> Result<Self, Error> {
        if rows.is_empty() && pagination.page > 1 {
            return Err(HtmlError::NotFound.new("Invalid page."));
        }

        let page_count = ((total_rows + pagination.limit - 1) / pagination.limit).max(1);

        let next = (pagination.page < page_count).then(|| location.page_url(pagination.page + 1));
        let previous = (pagination.page > 1).then(|| location.page_url(pagination.page - 1));

        Ok(Self {
            count: total_rows,
            next,
            previous,
            results: rows,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn location(query: &str) -> PageLocation {
        PageLocation {
            scheme: String::from("http"),
            host: Some(String::from("foodgram.test")),
            path: String::from("/api/recipes/"),
            query: query.to_string(),
        }
    }

    fn pagination(page: i64, limit: i64) -> Pagination {
        Pagination { page, limit }
    }

    #[test]
    fn first_page_links_only_forward() {
        let page =
            PageContext::from_rows(vec![1, 2], 5, pagination(1, 2), &location("limit=2")).unwrap();

        assert_eq!(page.count, 5);
        assert_eq!(
            page.next.as_deref(),
            Some("http://foodgram.test/api/recipes/?limit=2&page=2")
        );
        assert_eq!(page.previous, None);
    }

    #[test]
    fn last_page_links_only_backward() {
        let page = PageContext::from_rows(vec![5], 5, pagination(3, 2), &location("page=3&limit=2"))
            .unwrap();

        assert_eq!(page.next, None);
        assert_eq!(
            page.previous.as_deref(),
            Some("http://foodgram.test/api/recipes/?limit=2&page=2")
        );
    }

    #[test]
    fn previous_link_to_first_page_drops_page_param() {
        let page =
            PageContext::from_rows(vec![3, 4], 4, pagination(2, 2), &location("page=2")).unwrap();

        assert_eq!(
            page.previous.as_deref(),
            Some("http://foodgram.test/api/recipes/")
        );
        assert_eq!(page.next, None);
    }

    #[test]
    fn empty_first_page_is_valid() {
        let page = PageContext::<i32>::from_rows(vec![], 0, pagination(1, 6), &location(""))
            .unwrap();

        assert_eq!(page.count, 0);
        assert!(page.results.is_empty());
        assert_eq!(page.next, None);
        assert_eq!(page.previous, None);
    }

    #[test]
    fn page_past_the_end_is_not_found() {
        let error = PageContext::<i32>::from_rows(vec![], 0, pagination(4, 6), &location(""))
            .unwrap_err();
        assert_eq!(error.code, 404);
    }

    #[test]
    fn pagination_reads_page_and_limit() {
        let form = QueryForm::from_data(vec![
            (String::from("page"), String::from("3")),
            (String::from("limit"), String::from("500")),
        ]);
        let pagination = Pagination::from_form(&form, 6).unwrap();

        assert_eq!(pagination, Pagination { page: 3, limit: 100 });
        assert_eq!(pagination.offset(), 200);
    }

    #[test]
    fn pagination_defaults_and_rejects_bad_pages() {
        let form = QueryForm::default();
        assert_eq!(
            Pagination::from_form(&form, 6).unwrap(),
            Pagination { page: 1, limit: 6 }
        );

        let form = QueryForm::from_data(vec![(String::from("page"), String::from("zero"))]);
        assert_eq!(Pagination::from_form(&form, 6).unwrap_err().code, 404);

        let form = QueryForm::from_data(vec![(String::from("page"), String::from("0"))]);
        assert_eq!(Pagination::from_form(&form, 6).unwrap_err().code, 404);
    }

    #[test]
    fn pages_beyond_the_offset_range_are_not_found() {
        let form = QueryForm::from_data(vec![
            (String::from("page"), i64::MAX.to_string()),
            (String::from("limit"), String::from("2")),
        ]);
        let error = Pagination::from_form(&form, 6).unwrap_err();
        assert_eq!(error.code, 404);
        assert_eq!(error.info(), "Invalid page.");

        let form = QueryForm::from_data(vec![(String::from("page"), String::from("99999999999999999999"))]);
        assert_eq!(Pagination::from_form(&form, 6).unwrap_err().code, 404);
    }
}
