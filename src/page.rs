//! Defines the [`Page`] and [`Category`] types and the [`Site`] table that
//! groups pages into categories.

use std::sync::Arc;

/// A rendered note.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Page {
    pub title: String,
    pub category: String,

    /// The `time:` header line. Kept even when the footer shows the file's
    /// modification time instead.
    pub time: String,

    /// The source path relative to the source directory, without the `.md`
    /// extension and with `/` separators, e.g. `guide/intro`.
    pub link: String,

    /// The rendered HTML body.
    pub content: String,
}

/// A named group of pages, in the order they were added.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Category {
    pub name: String,
    pub pages: Vec<Arc<Page>>,
}

/// Every page of the site plus the category table.
#[derive(Clone, Debug, Default)]
pub struct Site {
    pub pages: Vec<Arc<Page>>,
    pub categories: Vec<Category>,
}

impl Site {
    pub fn new() -> Site {
        Site::default()
    }

    /// Adds `page` to the page list and to the category it names, creating
    /// that category at the end of the table the first time it is seen.
    /// Categories are found by a linear scan, which is fine for a notebook
    /// but not meant for large corpora.
    pub fn add(&mut self, page: Page) {
        let page = Arc::new(page);
        self.pages.push(Arc::clone(&page));
        match self
            .categories
            .iter_mut()
            .find(|category| category.name == page.category)
        {
            Some(category) => category.pages.push(page),
            None => self.categories.push(Category {
                name: page.category.clone(),
                pages: vec![page],
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(link: &str, category: &str) -> Page {
        Page {
            title: link.to_uppercase(),
            category: category.to_owned(),
            time: String::new(),
            link: link.to_owned(),
            content: String::new(),
        }
    }

    fn links(category: &Category) -> Vec<&str> {
        category.pages.iter().map(|p| p.link.as_str()).collect()
    }

    #[test]
    fn test_categories_keep_first_seen_order() {
        let mut site = Site::new();
        let notes = [
            ("a", "Guide"),
            ("b", "Notes"),
            ("c", "Guide"),
            ("d", "Misc"),
            ("e", "Notes"),
        ];
        for (link, category) in notes {
            site.add(page(link, category));
        }

        let names: Vec<&str> = site.categories.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Guide", "Notes", "Misc"]);

        assert_eq!(links(&site.categories[0]), vec!["a", "c"]);
        assert_eq!(links(&site.categories[1]), vec!["b", "e"]);
        assert_eq!(links(&site.categories[2]), vec!["d"]);

        let all: Vec<&str> = site.pages.iter().map(|p| p.link.as_str()).collect();
        assert_eq!(all, vec!["a", "b", "c", "d", "e"]);
    }

    #[test]
    fn test_category_names_are_exact() {
        let mut site = Site::new();
        site.add(page("a", "guide"));
        site.add(page("b", "Guide"));
        assert_eq!(site.categories.len(), 2);
        assert!(Arc::ptr_eq(&site.pages[0], &site.categories[0].pages[0]));
    }
}
