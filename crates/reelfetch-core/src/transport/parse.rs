//! Response header parsing.

/// Content-Length of the final response in `lines`.
///
/// With redirects libcurl reports every hop's headers; a status line starts a
/// new block, so only the last response's value counts.
pub fn parse_content_length(lines: &[String]) -> Option<u64> {
    let mut length = None;
    for line in lines {
        let line = line.trim();
        if line.starts_with("HTTP/") {
            length = None;
            continue;
        }
        if let Some((name, value)) = line.split_once(':') {
            if name.trim().eq_ignore_ascii_case("content-length") {
                length = value.trim().parse::<u64>().ok();
            }
        }
    }
    length
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn content_length_found() {
        let l = lines(&["HTTP/1.1 200 OK", "Content-Length: 12345", "Accept-Ranges: bytes", ""]);
        assert_eq!(parse_content_length(&l), Some(12345));
    }

    #[test]
    fn content_length_case_insensitive() {
        let l = lines(&["HTTP/2 200", "content-length: 7"]);
        assert_eq!(parse_content_length(&l), Some(7));
    }

    #[test]
    fn last_response_wins_after_redirect() {
        let l = lines(&[
            "HTTP/1.1 302 Found",
            "Content-Length: 0",
            "Location: /real",
            "",
            "HTTP/1.1 200 OK",
            "Content-Length: 4096",
        ]);
        assert_eq!(parse_content_length(&l), Some(4096));
    }

    #[test]
    fn missing_or_garbage_is_none() {
        assert_eq!(parse_content_length(&lines(&["HTTP/1.1 200 OK"])), None);
        assert_eq!(
            parse_content_length(&lines(&["HTTP/1.1 200 OK", "Content-Length: lots"])),
            None
        );
        // Redirect hop had a length, final response did not.
        let l = lines(&["HTTP/1.1 301 Moved", "Content-Length: 10", "", "HTTP/1.1 200 OK"]);
        assert_eq!(parse_content_length(&l), None);
    }
}
