use serde::Serialize;

/// Pagination state handed to the list templates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageInfo {
    pub number: u64,
    pub num_pages: u64,
    pub total_items: u64,
    pub has_previous: bool,
    pub has_next: bool,
    pub previous_page: u64,
    pub next_page: u64,
    pub pages: Vec<u64>,
}

impl PageInfo {
    /// Build page info for a 1-based `requested` page, clamped into range.
    /// An empty result still has one (empty) page.
    pub fn new(total_items: u64, page_size: u64, requested: u64) -> Self {
        let page_size = page_size.max(1);
        let num_pages = total_items.div_ceil(page_size).max(1);
        let number = requested.clamp(1, num_pages);
        Self {
            number,
            num_pages,
            total_items,
            has_previous: number > 1,
            has_next: number < num_pages,
            previous_page: number.saturating_sub(1).max(1),
            next_page: (number + 1).min(num_pages),
            pages: pages_to_display(num_pages, number),
        }
    }

    /// Zero-based page index for the database paginator.
    pub fn index(&self) -> u64 {
        self.number - 1
    }
}

/// The page numbers shown in the pager strip, at most five.
pub fn pages_to_display(num_pages: u64, current: u64) -> Vec<u64> {
    if num_pages <= 5 {
        return (1..=num_pages).collect();
    }
    if current < 3 {
        vec![1, 2, 3, 4, num_pages]
    } else if current > num_pages - 2 {
        let mut pages = vec![1];
        pages.extend(num_pages - 3..=num_pages);
        pages
    } else {
        vec![1, current - 1, current, current + 1, num_pages]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_few_pages_shows_all() {
        assert_eq!(pages_to_display(1, 1), vec![1]);
        assert_eq!(pages_to_display(5, 3), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_near_start() {
        assert_eq!(pages_to_display(10, 1), vec![1, 2, 3, 4, 10]);
        assert_eq!(pages_to_display(10, 2), vec![1, 2, 3, 4, 10]);
    }

    #[test]
    fn test_near_end() {
        assert_eq!(pages_to_display(10, 9), vec![1, 7, 8, 9, 10]);
        assert_eq!(pages_to_display(10, 10), vec![1, 7, 8, 9, 10]);
    }

    #[test]
    fn test_middle() {
        assert_eq!(pages_to_display(10, 5), vec![1, 4, 5, 6, 10]);
        assert_eq!(pages_to_display(10, 8), vec![1, 7, 8, 9, 10]);
    }

    #[test]
    fn test_page_info_clamps() {
        let info = PageInfo::new(45, 20, 7);
        assert_eq!(info.num_pages, 3);
        assert_eq!(info.number, 3);
        assert!(info.has_previous);
        assert!(!info.has_next);
        assert_eq!(info.index(), 2);

        let empty = PageInfo::new(0, 20, 1);
        assert_eq!(empty.num_pages, 1);
        assert_eq!(empty.pages, vec![1]);
    }
}
