//! Bunker pairing URIs: `bunker://` and `nostrconnect://` parse/emit.
//!
//! Strip the scheme prefix, split on the first `?`, validate the host segment
//! as a hex pubkey, then rewrite the query remainder onto `http://localhost/?…`
//! so the `url` crate's query-pair parser can be reused unmodified.

use url::Url;

use crate::error::Error;
use crate::permissions::is_known_permission;

const MAX_URI_LEN: usize = 8192;
const INJECTION_CHARS: [char; 4] = ['<', '>', '"', '\''];

#[derive(Debug, Clone)]
pub struct BunkerUri {
    pub signer_pubkey: String,
    pub relays: Vec<String>,
    pub secret: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NostrConnectUri {
    pub client_pubkey: String,
    pub relays: Vec<String>,
    pub secret: String,
    pub perms: Vec<String>,
    pub name: Option<String>,
    pub url: Option<String>,
    pub image: Option<String>,
}

pub fn parse_bunker_uri(uri: &str) -> Result<BunkerUri, Error> {
    let (pubkey_part, query) = split_scheme(uri, "bunker://")?;
    let signer_pubkey = validate_pubkey_segment(pubkey_part)?;
    let params = parse_query(query)?;

    let relays = collect_relays(&params);
    let secret = find_param(&params, "secret")
        .map(|s| validate_secret(&s))
        .transpose()?;

    Ok(BunkerUri {
        signer_pubkey,
        relays,
        secret,
    })
}

pub fn parse_nostrconnect_uri(uri: &str) -> Result<NostrConnectUri, Error> {
    let (pubkey_part, query) = split_scheme(uri, "nostrconnect://")?;
    let client_pubkey = validate_pubkey_segment(pubkey_part)?;
    let params = parse_query(query)?;

    let relays = collect_relays(&params);
    let secret = find_param(&params, "secret")
        .map(|s| validate_secret(&s))
        .transpose()?
        .ok_or(Error::InvalidConnectionString)?;

    let perms = find_param(&params, "perms")
        .map(|csv| {
            csv.split(',')
                .map(str::trim)
                .filter(|p| is_known_permission(p))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    let name = find_param(&params, "name").map(|s| sanitize_metadata(&s));
    let url = find_param(&params, "url")
        .map(|s| sanitize_metadata(&s))
        .filter(|s| Url::parse(s).is_ok());
    let image = find_param(&params, "image")
        .map(|s| sanitize_metadata(&s))
        .filter(|s| Url::parse(s).is_ok());

    Ok(NostrConnectUri {
        client_pubkey,
        relays,
        secret,
        perms,
        name,
        url,
        image,
    })
}

/// Builds the `bunker://` URI a bunker hands to a prospective client,
/// mirroring the teacher's own `get_bunker_url` (`signer/nip46/mod.rs`),
/// generalized from its single-relay wasm form to the full relay list and
/// routed through the `url` crate's percent-encoding instead of
/// `js_sys::encode_uri_component`.
pub fn emit_bunker_uri(signer_pubkey: &str, relays: &[String], secret: Option<&str>) -> String {
    let mut out = format!("bunker://{signer_pubkey}?");
    let mut first = true;
    for relay in relays {
        if !first {
            out.push('&');
        }
        first = false;
        out.push_str("relay=");
        out.push_str(&url_encode(relay));
    }
    if let Some(secret) = secret {
        if !first {
            out.push('&');
        }
        out.push_str("secret=");
        out.push_str(&url_encode(secret));
    }
    out
}

/// Builds the `nostrconnect://` URI a client hands to a bunker out of band,
/// grounded on the same teacher pattern (`signer/nip46/mod.rs`) applied to
/// the richer `nostrconnect` parameter set this crate parses.
pub fn emit_nostrconnect_uri(uri: &NostrConnectUri) -> String {
    let mut out = format!("nostrconnect://{}?", uri.client_pubkey);
    let mut first = true;
    for relay in &uri.relays {
        if !first {
            out.push('&');
        }
        first = false;
        out.push_str("relay=");
        out.push_str(&url_encode(relay));
    }
    if !first {
        out.push('&');
    }
    out.push_str("secret=");
    out.push_str(&url_encode(&uri.secret));

    if !uri.perms.is_empty() {
        out.push_str("&perms=");
        out.push_str(&url_encode(&uri.perms.join(",")));
    }
    if let Some(name) = &uri.name {
        out.push_str("&name=");
        out.push_str(&url_encode(name));
    }
    if let Some(u) = &uri.url {
        out.push_str("&url=");
        out.push_str(&url_encode(u));
    }
    if let Some(image) = &uri.image {
        out.push_str("&image=");
        out.push_str(&url_encode(image));
    }
    out
}

fn url_encode(raw: &str) -> String {
    url::form_urlencoded::byte_serialize(raw.as_bytes()).collect()
}

fn split_scheme<'a>(uri: &'a str, scheme: &str) -> Result<(&'a str, &'a str), Error> {
    if uri.len() > MAX_URI_LEN {
        return Err(Error::InvalidConnectionString);
    }
    if uri.contains(&INJECTION_CHARS[..]) {
        return Err(Error::InvalidConnectionString);
    }
    let rest = uri
        .strip_prefix(scheme)
        .ok_or(Error::InvalidConnectionString)?;
    let mut parts = rest.splitn(2, '?');
    let pubkey_part = parts.next().ok_or(Error::InvalidConnectionString)?;
    let query = parts.next().ok_or(Error::InvalidConnectionString)?;
    Ok((pubkey_part, query))
}

/// Pairing-URI host segments are validated against the lighter
/// `is_valid_public_key_format` check (hex + range), not the full
/// curve-membership check `parse_public_key_hex` performs — per spec, a
/// pairing string's pubkey syntax is checked here, and curve membership is
/// re-checked wherever the key is actually used for ECDH.
fn validate_pubkey_segment(segment: &str) -> Result<String, Error> {
    let host = segment
        .split(&['/', '#'][..])
        .next()
        .unwrap_or(segment);
    if nip44::parse_public_key_format_hex(host).is_err() {
        return Err(Error::InvalidConnectionString);
    }
    Ok(host.to_lowercase())
}

fn parse_query(query: &str) -> Result<Url, Error> {
    Url::parse(&format!("http://localhost/?{query}")).map_err(|_| Error::InvalidConnectionString)
}

fn collect_relays(params: &Url) -> Vec<String> {
    params
        .query_pairs()
        .filter_map(|(k, v)| (k == "relay").then(|| v.into_owned()))
        .filter(|r| is_valid_relay_url(r))
        .collect()
}

fn find_param(params: &Url, key: &str) -> Option<String> {
    params
        .query_pairs()
        .find_map(|(k, v)| (k == key).then(|| v.into_owned()))
}

fn is_valid_relay_url(relay: &str) -> bool {
    match Url::parse(relay) {
        Ok(u) => matches!(u.scheme(), "ws" | "wss") && u.host().is_some(),
        Err(_) => false,
    }
}

fn validate_secret(secret: &str) -> Result<String, Error> {
    if secret.len() < 8 || secret.len() > 128 {
        return Err(Error::InvalidConnectionString);
    }
    Ok(secret.to_string())
}

fn sanitize_metadata(raw: &str) -> String {
    let stripped: String = raw
        .chars()
        .filter(|c| !matches!(c, '<' | '>' | '"' | '\'' | '&'))
        .collect();
    stripped.chars().take(1000).collect()
}
