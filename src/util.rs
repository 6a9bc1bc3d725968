//! Small free functions shared across modules.

/// The platform occasionally emits post links with an empty host
/// (`https:///some/path`) — a data quirk, not a real redirect target.
/// Substitute the blog's own canonical host in that case.
///
/// This substitution is done by the caller (the blog classifier), never
/// by `FeedFetcher` itself.
pub fn fix_empty_host_url(url: &str, blog_name: &str) -> String {
    const EMPTY_HOST_PREFIX: &str = "https:///";
    if let Some(rest) = url.strip_prefix(EMPTY_HOST_PREFIX) {
        format!("https://{blog_name}.blogspot.com/{rest}")
    } else {
        url.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixes_empty_host_prefix() {
        let fixed = fix_empty_host_url("https:///2020/05/post.html", "foo");
        assert_eq!(fixed, "https://foo.blogspot.com/2020/05/post.html");
    }

    #[test]
    fn leaves_normal_urls_untouched() {
        let url = "https://foo.blogspot.com/2020/05/post.html";
        assert_eq!(fix_empty_host_url(url, "foo"), url);
    }
}
