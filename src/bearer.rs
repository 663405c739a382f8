const BEARER_SCHEME: &str = "bearer ";

pub(crate) trait CaseInsensitiveStrExt {
    fn strip_prefix_ignore_ascii_case<'a>(&'a self, prefix: &str) -> Option<&'a str>;
}

impl CaseInsensitiveStrExt for str {
    fn strip_prefix_ignore_ascii_case<'a>(&'a self, prefix: &str) -> Option<&'a str> {
        // `get` rather than indexing: the cut may land inside a multi-byte character
        let my_prefix = self.get(..prefix.len())?;

        if my_prefix.eq_ignore_ascii_case(prefix) {
            Some(&self[prefix.len()..])
        } else {
            None
        }
    }
}

/// Pull the credential out of an `Authorization` header value of the form `Bearer <token>`.
///
/// The scheme keyword is matched case-insensitively. Any other scheme, or an empty
/// credential, yields `None`: no credential was supplied.
pub fn bearer_token(header_value: &str) -> Option<&str> {
    let token = header_value
        .trim_start()
        .strip_prefix_ignore_ascii_case(BEARER_SCHEME)?
        .trim();

    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}
