/******************************************************************************
 * Copyright ContinuousC. Licensed under the "Elastic License 2.0".           *
 ******************************************************************************/

use std::ops::Range;

use url::{ParseError, Url};

/// Replace the host in `url` with `host`, leaving every other byte of the
/// url untouched.
///
/// XAPI urls carry no credentials or path, but both are preserved if
/// present. IPv6 addresses are bracketed.
pub fn swap_host(url: &str, host: &str) -> Result<String, ParseError> {
    Url::parse(url)?;
    let span = host_span(url).ok_or(ParseError::EmptyHost)?;
    let host = if host.contains(':') && !host.starts_with('[') {
        format!("[{host}]")
    } else {
        host.to_string()
    };
    Ok(format!("{}{}{}", &url[..span.start], host, &url[span.end..]))
}

/// Byte range of the host within the authority of `url`.
fn host_span(url: &str) -> Option<Range<usize>> {
    let start = url.find("://")? + 3;
    let authority_len = url[start..]
        .find(|c: char| matches!(c, '/' | '?' | '#'))
        .unwrap_or(url.len() - start);
    let authority = &url[start..start + authority_len];

    let host_start = authority.rfind('@').map(|i| i + 1).unwrap_or(0);
    let host_port = &authority[host_start..];
    let host_len = if host_port.starts_with('[') {
        host_port.find(']')? + 1
    } else {
        host_port.find(':').unwrap_or(host_port.len())
    };

    (host_len > 0)
        .then(|| start + host_start..start + host_start + host_len)
}
