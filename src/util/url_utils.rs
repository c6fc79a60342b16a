/// Host (with port, if any) of a `scheme://host[:port]/path` URL, without userinfo.
pub fn extract_host(url: &str) -> Option<&str> {
    let rest = url.split_once("://").map(|(_, r)| r).unwrap_or(url);
    let authority = rest.split(['/', '?', '#']).next()?;
    let host = authority.rsplit_once('@').map(|(_, h)| h).unwrap_or(authority);
    if host.is_empty() { None } else { Some(host) }
}
