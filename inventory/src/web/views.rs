//! Display-ready shapes for templates. Everything is formatted here so the
//! templates only print strings and test booleans.

use crate::format::{format_currency, format_date, format_timestamp};
use crate::models::{Category, Direction, Movement, Page, Product, User};

pub struct ProductView {
    pub id: i64,
    pub code: String,
    pub name: String,
    pub description: String,
    pub category: String,
    pub quantity: i64,
    pub min_stock: i64,
    pub price: String,
    pub low_stock: bool,
}

impl From<Product> for ProductView {
    fn from(product: Product) -> Self {
        Self {
            low_stock: product.is_low_stock(),
            price: format_currency(product.price),
            category: product.category_name.unwrap_or_default(),
            id: product.id,
            code: product.code,
            name: product.name,
            description: product.description,
            quantity: product.quantity,
            min_stock: product.min_stock,
        }
    }
}

pub struct MovementView {
    pub created_at: String,
    pub product_code: String,
    pub product_name: String,
    pub user_name: String,
    pub is_entry: bool,
    pub direction_label: &'static str,
    pub quantity: i64,
    pub note: String,
}

impl From<Movement> for MovementView {
    fn from(movement: Movement) -> Self {
        Self {
            created_at: format_timestamp(&movement.created_at),
            product_code: movement.product_code,
            product_name: movement.product_name,
            user_name: movement.user_name,
            is_entry: movement.direction == Direction::Entry,
            direction_label: movement.direction.label(),
            quantity: movement.quantity,
            note: movement.note,
        }
    }
}

pub struct UserView {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub role_label: &'static str,
    pub is_admin: bool,
    pub created_at: String,
    pub is_self: bool,
}

impl UserView {
    pub fn new(user: User, viewer_id: i64) -> Self {
        Self {
            role_label: user.role.label(),
            is_admin: user.role == crate::models::Role::Admin,
            created_at: format_date(&user.created_at),
            is_self: user.id == viewer_id,
            id: user.id,
            name: user.name,
            email: user.email,
        }
    }
}

pub struct CategoryView {
    pub name: String,
    pub description: String,
    pub created_at: String,
}

impl From<Category> for CategoryView {
    fn from(category: Category) -> Self {
        Self {
            created_at: format_date(&category.created_at),
            name: category.name,
            description: category.description,
        }
    }
}

/// One `<option>` of a `<select>`
pub struct SelectOption {
    pub value: String,
    pub label: String,
    pub selected: bool,
}

impl SelectOption {
    pub fn new(value: impl Into<String>, label: impl Into<String>, current: &str) -> Self {
        let value = value.into();
        Self {
            selected: value == current,
            label: label.into(),
            value,
        }
    }
}

pub fn category_options(categories: &[Category], current: &str) -> Vec<SelectOption> {
    categories
        .iter()
        .map(|c| SelectOption::new(c.id.to_string(), c.name.clone(), current))
        .collect()
}

/// Category filter options are keyed by name
pub fn category_name_options(categories: &[Category], current: &str) -> Vec<SelectOption> {
    categories
        .iter()
        .map(|c| SelectOption::new(c.name.clone(), c.name.clone(), current))
        .collect()
}

pub fn product_options(products: &[Product], current: &str) -> Vec<SelectOption> {
    products
        .iter()
        .map(|p| {
            SelectOption::new(
                p.id.to_string(),
                format!("{} - {} (Estoque: {})", p.code, p.name, p.quantity),
                current,
            )
        })
        .collect()
}

pub fn direction_options(current: &str) -> Vec<SelectOption> {
    [Direction::Entry, Direction::Exit]
        .into_iter()
        .map(|d| SelectOption::new(d.as_str(), d.label(), current))
        .collect()
}

pub fn role_options(current: &str) -> Vec<SelectOption> {
    [crate::models::Role::Regular, crate::models::Role::Admin]
        .into_iter()
        .map(|r| SelectOption::new(r.as_str(), r.label(), current))
        .collect()
}

/// 1-based page number from a query string value; junk means the first page
pub fn parse_page(raw: Option<&str>) -> i64 {
    raw.and_then(|p| p.trim().parse::<i64>().ok())
        .filter(|p| *p >= 1)
        .unwrap_or(1)
}

/// Previous/next navigation that keeps the active filters
pub struct Pager {
    pub page: i64,
    pub pages: i64,
    pub total: i64,
    pub has_prev: bool,
    pub has_next: bool,
    pub prev_url: String,
    pub next_url: String,
}

impl Pager {
    pub fn new<T>(page: &Page<T>, path: &str, filters: &[(&str, &str)]) -> Self {
        Self {
            page: page.page,
            pages: page.pages(),
            total: page.total,
            has_prev: page.has_prev(),
            has_next: page.has_next(),
            prev_url: page_url(path, filters, page.page.saturating_sub(1)),
            next_url: page_url(path, filters, page.page.saturating_add(1)),
        }
    }
}

fn page_url(path: &str, filters: &[(&str, &str)], page: i64) -> String {
    let page = page.max(1).to_string();
    let mut pairs: Vec<(&str, &str)> = filters.iter().copied().filter(|(_, v)| !v.is_empty()).collect();
    pairs.push(("page", page.as_str()));

    match serde_urlencoded::to_string(&pairs) {
        Ok(query) => format!("{}?{}", path, query),
        Err(_) => path.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_page() {
        assert_eq!(parse_page(None), 1);
        assert_eq!(parse_page(Some("3")), 3);
        assert_eq!(parse_page(Some("0")), 1);
        assert_eq!(parse_page(Some("-2")), 1);
        assert_eq!(parse_page(Some("abc")), 1);
        assert_eq!(parse_page(Some("9223372036854775807")), i64::MAX);
    }

    #[test]
    fn test_pager_on_last_representable_page() {
        let page: Page<i32> = Page { items: vec![], page: i64::MAX, per_page: 10, total: 3 };
        let pager = Pager::new(&page, "/produtos", &[("busca", "")]);
        assert!(pager.has_prev);
        assert!(!pager.has_next);
        assert_eq!(pager.next_url, format!("/produtos?page={}", i64::MAX));
        assert_eq!(pager.prev_url, format!("/produtos?page={}", i64::MAX - 1));
    }

    #[test]
    fn test_pager_keeps_filters() {
        let page = Page { items: vec![(); 10], page: 2, per_page: 10, total: 35 };
        let pager = Pager::new(&page, "/produtos", &[("busca", "papel a4"), ("categoria", "")]);

        assert_eq!(pager.pages, 4);
        assert!(pager.has_prev && pager.has_next);
        assert_eq!(pager.prev_url, "/produtos?busca=papel+a4&page=1");
        assert_eq!(pager.next_url, "/produtos?busca=papel+a4&page=3");
    }

    #[test]
    fn test_select_option_marks_current() {
        let options = direction_options("saida");
        assert!(!options[0].selected);
        assert!(options[1].selected);
        assert_eq!(options[1].label, "Saída");
    }
}
