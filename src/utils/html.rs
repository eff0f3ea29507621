use ammonia;

/// Clean HTML content using the ammonia library.
///
/// Whitelist-based: safe tags (like <b>, <p>) survive, dangerous tags (like
/// <script>, <iframe>) and event-handler attributes are stripped. Applied to
/// listing descriptions and bug reports before they are stored, so that any
/// client rendering them is protected against stored XSS.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input)
}
