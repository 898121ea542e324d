//! Utility functions for the proxy pool.

/// Split newline-separated text into candidate proxy strings.
///
/// Blank lines and `#` comments are skipped; everything else is passed on
/// untouched so that validation can report it.
pub(crate) fn parse_proxy_list(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_comments_and_blank_lines() {
        let content = "# office exits\nhttp://a:1\n\n   socks5://u:p@b:2  \n#http://c:3\ngarbage\n";
        assert_eq!(
            parse_proxy_list(content),
            vec!["http://a:1", "socks5://u:p@b:2", "garbage"]
        );
    }
}
