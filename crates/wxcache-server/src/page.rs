//! HTML pages served on `/`.

use wxcache_weather::{escape_html, LocationKey};

/// Input form. The field is named `city` but ZIP codes work too.
pub const FORM_PAGE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>Weather lookup</title>
</head>
<body>
<h1>Weather lookup</h1>
<form method="post" action="/">
<label for="city">City or ZIP code</label>
<input id="city" name="city" type="text" maxlength="100" required autofocus>
<button type="submit">Get weather</button>
</form>
</body>
</html>
"#;

/// Result page echoing the submitted location next to the raw payload.
/// Both are escaped; the payload comes from a third party.
pub fn result_page(location: &LocationKey, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>Weather for {location}</title>
</head>
<body>
<h1>Weather for {location}</h1>
<pre>{body}</pre>
<p><a href="/">Look up another location</a></p>
</body>
</html>
"#,
        location = location.display_html(),
        body = escape_html(body),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_form_posts_city_field() {
        assert!(FORM_PAGE.contains(r#"name="city""#));
        assert!(FORM_PAGE.contains(r#"method="post""#));
    }

    #[test]
    fn test_result_page_escapes_location_and_payload() {
        let location = LocationKey::parse("St. John's").unwrap();
        let page = result_page(&location, r#"{"alert":"<b>storm</b>"}"#);

        assert!(page.contains("Weather for St. John&#39;s"));
        assert!(page.contains("&lt;b&gt;storm&lt;/b&gt;"));
        assert!(!page.contains("<b>storm"));
    }
}
