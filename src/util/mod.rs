pub mod url_utils;

/// Mask credentials in a connection URL before it is logged.
/// Examples:
/// - "ws://user:secret@127.0.0.1:3001" -> "ws://user:****@127.0.0.1:3001"
/// - "ws://localhost:3001/?access_token=abc&x=1" -> "ws://localhost:3001/?access_token=****&x=1"
pub fn mask_url_credentials(url: &str) -> String {
	let masked = match url.find("://") {
		Some(scheme_end) => {
			let (scheme_part, rest) = url.split_at(scheme_end + 3);
			let authority_end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
			match rest[..authority_end].rfind('@') {
				Some(at_pos) => {
					let (userinfo, remainder) = rest.split_at(at_pos);
					format!("{}{}{}", scheme_part, mask_userinfo(userinfo), remainder)
				}
				None => url.to_string(),
			}
		}
		None => url.to_string(),
	};

	mask_access_token(&masked)
}

fn mask_userinfo(userinfo: &str) -> String {
	if userinfo.is_empty() {
		return String::new();
	}

	if let Some(colon_pos) = userinfo.find(':') {
		let username = &userinfo[..colon_pos];
		if username.is_empty() {
			return ":****".to_string();
		}
		format!("{}:****", username)
	} else {
		"****".to_string()
	}
}

fn mask_access_token(url: &str) -> String {
	let Some((base, query)) = url.split_once('?') else {
		return url.to_string();
	};
	let pairs: Vec<String> = query
		.split('&')
		.map(|pair| match pair.split_once('=') {
			Some((key, _)) if key == "access_token" => format!("{}=****", key),
			_ => pair.to_string(),
		})
		.collect();
	format!("{}?{}", base, pairs.join("&"))
}
