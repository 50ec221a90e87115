//! HTML helpers shared by the portal adapters.

use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use url::Url;

static FORM: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("form").expect("Invalid form selector"));

static HIDDEN_INPUT: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"input[type="hidden"][name]"#).expect("Invalid hidden input selector")
});

static TITLE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("title").expect("Invalid title selector"));

static BODY_ROWS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("tbody tr").expect("Invalid row selector"));

static ALL_ROWS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("tr").expect("Invalid row selector"));

static CELL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("td").expect("Invalid cell selector"));

/// Parses a static list of selectors.
///
/// Panics on an invalid selector; only call with literals.
pub fn selectors(list: &[&str]) -> Vec<Selector> {
    list.iter()
        .map(|s| Selector::parse(s).expect("Invalid selector literal"))
        .collect()
}

/// Collapses all whitespace runs in an element's text to single spaces.
pub fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Non-empty text lines of an element.
///
/// Text nodes are split on newlines, so both `<br>`-separated and
/// block-separated content yield one entry per visual line.
pub fn element_lines(element: ElementRef<'_>) -> Vec<String> {
    element
        .text()
        .flat_map(str::lines)
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect()
}

/// Text of the first element matching `selector` inside `element`.
pub fn child_text(element: ElementRef<'_>, selector: &Selector) -> Option<String> {
    element.select(selector).next().map(element_text)
}

/// The document `<title>`, or an empty string.
pub fn page_title(document: &Html) -> String {
    document
        .select(&TITLE)
        .next()
        .map(element_text)
        .unwrap_or_default()
}

/// The first non-empty text among elements matching any of `selectors`.
pub fn first_message(document: &Html, selectors: &[Selector]) -> Option<String> {
    selectors
        .iter()
        .flat_map(|selector| document.select(selector))
        .map(element_text)
        .find(|text| !text.is_empty())
}

/// Data rows of a table: `tbody tr` when present, else every `tr` but the
/// header row.
pub fn table_rows(table: ElementRef<'_>) -> Vec<ElementRef<'_>> {
    let rows: Vec<_> = table.select(&BODY_ROWS).collect();
    if !rows.is_empty() {
        return rows;
    }
    table.select(&ALL_ROWS).skip(1).collect()
}

/// The `<td>` cells of a row.
pub fn row_cells(row: ElementRef<'_>) -> Vec<ElementRef<'_>> {
    row.select(&CELL).collect()
}

/// A login form located on a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginForm {
    /// Absolute submit URL.
    pub action: Url,
    /// True when the form submits with GET.
    pub is_get: bool,
    pub username_field: String,
    pub password_field: String,
    /// Hidden inputs (CSRF tokens and the like) to send back unchanged.
    pub hidden: Vec<(String, String)>,
}

impl LoginForm {
    /// Locates the first form containing both a username and a password
    /// input, trying the candidate selectors in order.
    pub fn find(
        document: &Html,
        page_url: &Url,
        username_selectors: &[Selector],
        password_selectors: &[Selector],
    ) -> Option<Self> {
        document.select(&FORM).find_map(|form| {
            let username_field = first_named_input(form, username_selectors)?;
            let password_field = first_named_input(form, password_selectors)?;

            let action = match form.value().attr("action").map(str::trim) {
                Some(action) if !action.is_empty() => page_url.join(action).ok()?,
                _ => page_url.clone(),
            };
            let is_get = form
                .value()
                .attr("method")
                .is_some_and(|m| m.eq_ignore_ascii_case("get"));
            let hidden = form
                .select(&HIDDEN_INPUT)
                .filter_map(|input| {
                    let name = input.value().attr("name")?;
                    let value = input.value().attr("value").unwrap_or_default();
                    Some((name.to_string(), value.to_string()))
                })
                .collect();

            Some(Self {
                action,
                is_get,
                username_field,
                password_field,
                hidden,
            })
        })
    }

    /// Form fields to submit with the given credentials.
    pub fn fields(&self, username: &str, password: &str) -> Vec<(String, String)> {
        let mut fields = self.hidden.clone();
        fields.push((self.username_field.clone(), username.to_string()));
        fields.push((self.password_field.clone(), password.to_string()));
        fields
    }
}

fn first_named_input(form: ElementRef<'_>, selectors: &[Selector]) -> Option<String> {
    selectors.iter().find_map(|selector| {
        form.select(selector)
            .find_map(|input| input.value().attr("name").map(String::from))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOGIN_PAGE: &str = r#"
        <html><head><title>Sign In</title></head><body>
        <form id="search" action="/search"><input name="q"></form>
        <form action="/session" method="post">
            <input type="hidden" name="csrf" value="tok-1">
            <input type="email" name="login_email">
            <input type="password" name="pw">
            <button type="submit">Log On</button>
        </form>
        <div class="alert-danger">   </div>
        <div role="alert">Invalid   username
            or password</div>
        </body></html>"#;

    fn url() -> Url {
        Url::parse("https://portal.test/auth/login").unwrap()
    }

    #[test]
    fn finds_login_form_with_hidden_fields() {
        let document = Html::parse_document(LOGIN_PAGE);
        let form = LoginForm::find(
            &document,
            &url(),
            &selectors(&[r#"input[name="username"]"#, r#"input[type="email"]"#]),
            &selectors(&[r#"input[type="password"]"#]),
        )
        .unwrap();

        assert_eq!(form.action.as_str(), "https://portal.test/session");
        assert!(!form.is_get);
        assert_eq!(form.username_field, "login_email");
        assert_eq!(form.password_field, "pw");
        assert_eq!(
            form.fields("alice", "secret"),
            vec![
                ("csrf".to_string(), "tok-1".to_string()),
                ("login_email".to_string(), "alice".to_string()),
                ("pw".to_string(), "secret".to_string()),
            ]
        );
    }

    #[test]
    fn missing_password_field_means_no_form() {
        let document = Html::parse_document(r#"<form><input name="username"></form>"#);
        assert!(
            LoginForm::find(
                &document,
                &url(),
                &selectors(&[r#"input[name="username"]"#]),
                &selectors(&[r#"input[type="password"]"#]),
            )
            .is_none()
        );
    }

    #[test]
    fn form_without_action_posts_to_page_url() {
        let document = Html::parse_document(
            r#"<form method="GET"><input name="username"><input type="password" name="password"></form>"#,
        );
        let form = LoginForm::find(
            &document,
            &url(),
            &selectors(&[r#"input[name="username"]"#]),
            &selectors(&[r#"input[name="password"]"#]),
        )
        .unwrap();
        assert_eq!(form.action, url());
        assert!(form.is_get);
    }

    #[test]
    fn first_message_skips_blank_banners() {
        let document = Html::parse_document(LOGIN_PAGE);
        let message = first_message(&document, &selectors(&[".alert-danger", r#"[role="alert"]"#]));
        assert_eq!(message.as_deref(), Some("Invalid username or password"));
        assert_eq!(page_title(&document), "Sign In");
    }

    #[test]
    fn rows_skip_thead() {
        let document = Html::parse_document(
            "<table><thead><tr><th>Date</th></tr></thead><tbody><tr><td>a</td></tr><tr><td>b</td></tr></tbody></table>",
        );
        let table = document.select(&Selector::parse("table").unwrap()).next().unwrap();
        let rows = table_rows(table);
        assert_eq!(rows.len(), 2);
        assert_eq!(element_text(row_cells(rows[1])[0]), "b");
    }

    #[test]
    fn element_lines_split_on_breaks_and_blocks() {
        let document = Html::parse_document(
            "<table><tr><td id=\"c\">\n  Mon, 23 Feb 2026<br>\n  8:00 am   EST\n</td></tr></table>",
        );
        let cell = document.select(&Selector::parse("#c").unwrap()).next().unwrap();
        assert_eq!(element_lines(cell), vec!["Mon, 23 Feb 2026", "8:00 am EST"]);

        let document = Html::parse_document(
            "<div id=\"d\"><div>Mon, 23 Feb 2026</div><div>8:00 am EST</div></div>",
        );
        let div = document.select(&Selector::parse("#d").unwrap()).next().unwrap();
        assert_eq!(element_lines(div), vec!["Mon, 23 Feb 2026", "8:00 am EST"]);
    }
}
