use habit_types::api::{Page, PageQuery};

use crate::error::ApiError;

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;

/// Slice `items` into the requested page. Asking for a page past the end is a 404.
pub fn paginate<T>(items: Vec<T>, query: &PageQuery, path: &str) -> Result<Page<T>, ApiError> {
    let page_size = match query.page_size {
        Some(0) | None => DEFAULT_PAGE_SIZE,
        Some(size) => size.min(MAX_PAGE_SIZE),
    } as usize;
    let page = query.page.unwrap_or(1) as usize;

    let count = items.len();
    let num_pages = count.div_ceil(page_size).max(1);
    if page == 0 || page > num_pages {
        return Err(ApiError::NotFound);
    }

    let link = |p: usize| format!("{}?page={}&page_size={}", path, p, page_size);
    let next = (page < num_pages).then(|| link(page + 1));
    let previous = (page > 1).then(|| link(page - 1));

    let results = items
        .into_iter()
        .skip((page - 1) * page_size)
        .take(page_size)
        .collect();

    Ok(Page {
        count,
        next,
        previous,
        results,
    })
}
