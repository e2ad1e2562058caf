//! Signature Version 4 request signing.
//!
//! A request is reduced to its canonical form, hashed into a string to sign
//! and then MACed with a key derived from the secret and the credential
//! scope. See <https://docs.aws.amazon.com/IAM/latest/UserGuide/reference_sigv-create-signed-request.html>.
//!
//! The payload hash covers the exact bytes given to
//! [`SigV4Signer::sign_request`]; those bytes must go on the wire unchanged.

use chrono::{DateTime, NaiveDateTime, Utc};
use hmac::{Hmac, Mac};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";
const TERMINATOR: &str = "aws4_request";
const AMZ_DATE: &str = "%Y%m%dT%H%M%SZ";
const SHORT_DATE: &str = "%Y%m%d";

/// RFC 3986 unreserved characters stay literal, everything else is escaped.
const UNRESERVED: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// `sha256("")`, the payload hash of a bodiless request.
pub const EMPTY_PAYLOAD_HASH: &str =
    "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

#[derive(Clone)]
pub struct SigV4Signer {
    access_key_id: String,
    secret_access_key: String,
    session_token: Option<String>,
    region: String,
    service: String,
}

impl fmt::Debug for SigV4Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigV4Signer")
            .field("access_key_id", &self.access_key_id)
            .field("region", &self.region)
            .field("service", &self.service)
            .finish_non_exhaustive()
    }
}

/// Outcome of signing: the request exactly as it must be sent.
#[derive(Debug, Clone, PartialEq)]
pub struct SignedRequest {
    pub method: String,
    /// Full URL including any query string.
    pub url: String,
    /// Lower-case header names, `authorization` included.
    pub headers: BTreeMap<String, String>,
    pub body: Vec<u8>,
}

impl SignedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

/// `<date>/<region>/<service>/aws4_request`
struct Scope<'a> {
    date: String,
    region: &'a str,
    service: &'a str,
}

impl Scope<'_> {
    fn signing_key(&self, secret: &str) -> Vec<u8> {
        let seed = format!("AWS4{}", secret).into_bytes();
        [
            self.date.as_str(),
            self.region,
            self.service,
            TERMINATOR,
        ]
        .iter()
        .fold(seed, |key, part| hmac(&key, part.as_bytes()))
    }
}

impl fmt::Display for Scope<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            self.date, self.region, self.service, TERMINATOR
        )
    }
}

/// Normalised view of a request; its `Display` output is what gets hashed.
struct CanonicalRequest<'a> {
    method: String,
    path: String,
    query: String,
    headers: &'a BTreeMap<String, String>,
    payload_hash: String,
}

impl<'a> CanonicalRequest<'a> {
    fn new(method: &str, url: &str, headers: &'a BTreeMap<String, String>, body: &[u8]) -> Self {
        let (path, query) = match url::Url::parse(url) {
            Ok(parsed) => {
                let mut pairs: Vec<(String, String)> = parsed
                    .query_pairs()
                    .map(|(k, v)| (uri_encode(&k), uri_encode(&v)))
                    .collect();
                pairs.sort();
                let query = pairs
                    .into_iter()
                    .map(|(k, v)| format!("{}={}", k, v))
                    .collect::<Vec<_>>()
                    .join("&");
                (encode_path(parsed.path()), query)
            }
            Err(_) => ("/".to_string(), String::new()),
        };
        Self {
            method: method.to_ascii_uppercase(),
            path,
            query,
            headers,
            payload_hash: sha256_hex_bytes(body),
        }
    }

    fn signed_headers(&self) -> String {
        self.headers.keys().cloned().collect::<Vec<_>>().join(";")
    }

    fn string_to_sign(&self, amz_date: &str, scope: &Scope<'_>) -> String {
        let digest = sha256_hex_bytes(self.to_string().as_bytes());
        format!("{}\n{}\n{}\n{}", ALGORITHM, amz_date, scope, digest)
    }
}

impl fmt::Display for CanonicalRequest<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.method)?;
        writeln!(f, "{}", self.path)?;
        writeln!(f, "{}", self.query)?;
        for (name, value) in self.headers {
            let value = value.split_whitespace().collect::<Vec<_>>().join(" ");
            writeln!(f, "{}:{}", name, value)?;
        }
        writeln!(f)?;
        writeln!(f, "{}", self.signed_headers())?;
        write!(f, "{}", self.payload_hash)
    }
}

impl SigV4Signer {
    pub fn new(
        access_key_id: &str,
        secret_access_key: &str,
        session_token: Option<&str>,
        region: &str,
        service: &str,
    ) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            session_token: session_token.map(Into::into),
            region: region.into(),
            service: service.into(),
        }
    }

    /// Sign `body` for `method url`. `headers` should carry `host`; header
    /// names are lower-cased in the result.
    pub fn sign_request(
        &self,
        method: &str,
        url: &str,
        headers: &BTreeMap<String, String>,
        body: &[u8],
        timestamp: DateTime<Utc>,
    ) -> SignedRequest {
        let amz_date = timestamp.format(AMZ_DATE).to_string();
        let scope = self.scope(timestamp.format(SHORT_DATE).to_string());

        let mut sent: BTreeMap<String, String> = headers
            .iter()
            .map(|(name, value)| (name.to_ascii_lowercase(), value.clone()))
            .collect();
        sent.insert("x-amz-date".into(), amz_date.clone());
        sent.insert("x-amz-content-sha256".into(), sha256_hex_bytes(body));
        if let Some(token) = &self.session_token {
            sent.insert("x-amz-security-token".into(), token.clone());
        }

        let canonical = CanonicalRequest::new(method, url, &sent, body);
        let signature = self.signature(&canonical, &amz_date, &scope);
        let authorization = format!(
            "{} Credential={}/{}, SignedHeaders={}, Signature={}",
            ALGORITHM,
            self.access_key_id,
            scope,
            canonical.signed_headers(),
            signature
        );
        sent.insert("authorization".into(), authorization);

        SignedRequest {
            method: method.to_string(),
            url: url.to_string(),
            headers: sent,
            body: body.to_vec(),
        }
    }

    /// Check `request` as the receiving service would, recomputing the
    /// payload hash from the carried body and the signature from the
    /// request's own date and signed-header list.
    pub fn verify(&self, request: &SignedRequest) -> bool {
        self.verify_inner(request).unwrap_or(false)
    }

    fn verify_inner(&self, request: &SignedRequest) -> Option<bool> {
        let auth = Authorization::parse(request.header("authorization")?)?;
        let amz_date = request.header("x-amz-date")?;
        let when = NaiveDateTime::parse_from_str(amz_date, AMZ_DATE).ok()?;
        let scope = self.scope(when.format(SHORT_DATE).to_string());

        if auth.access_key_id != self.access_key_id || auth.scope != scope.to_string() {
            return Some(false);
        }

        let covered = auth
            .signed_headers
            .iter()
            .map(|name| Some((name.to_string(), request.header(name)?.to_string())))
            .collect::<Option<BTreeMap<_, _>>>()?;

        let canonical = CanonicalRequest::new(&request.method, &request.url, &covered, &request.body);
        let expected = self.signature(&canonical, amz_date, &scope);
        Some(constant_time_eq(expected.as_bytes(), auth.signature.as_bytes()))
    }

    fn scope(&self, date: String) -> Scope<'_> {
        Scope {
            date,
            region: &self.region,
            service: &self.service,
        }
    }

    fn signature(&self, canonical: &CanonicalRequest<'_>, amz_date: &str, scope: &Scope<'_>) -> String {
        let key = scope.signing_key(&self.secret_access_key);
        hex::encode(hmac(&key, canonical.string_to_sign(amz_date, scope).as_bytes()))
    }
}

/// Fields of an `AWS4-HMAC-SHA256 Credential=..., SignedHeaders=..., Signature=...` value.
#[derive(Debug, PartialEq)]
struct Authorization<'a> {
    access_key_id: &'a str,
    scope: &'a str,
    signed_headers: Vec<&'a str>,
    signature: &'a str,
}

impl<'a> Authorization<'a> {
    fn parse(value: &'a str) -> Option<Self> {
        let fields: BTreeMap<&str, &str> = value
            .strip_prefix(ALGORITHM)?
            .split(',')
            .map(|field| field.trim().split_once('='))
            .collect::<Option<_>>()?;
        let (access_key_id, scope) = fields.get("Credential").copied()?.split_once('/')?;
        Some(Self {
            access_key_id,
            scope,
            signed_headers: fields.get("SignedHeaders").copied()?.split(';').collect(),
            signature: fields.get("Signature").copied()?,
        })
    }
}

fn hmac(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mac = match HmacSha256::new_from_slice(key) {
        Ok(mac) => mac,
        Err(_) => unreachable!("HMAC accepts keys of any length"),
    };
    mac.chain_update(data).finalize().into_bytes().to_vec()
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

fn encode_path(path: &str) -> String {
    if path.is_empty() {
        return "/".to_string();
    }
    path.split('/').map(uri_encode).collect::<Vec<_>>().join("/")
}

/// Hex SHA-256 of `data`.
pub fn sha256_hex_bytes(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Percent-encode everything outside `A-Z a-z 0-9 - _ . ~`.
pub fn uri_encode(input: &str) -> String {
    utf8_percent_encode(input, UNRESERVED).to_string()
}

/// `k=v&...` in key order, both sides encoded.
pub fn build_query_string(params: &BTreeMap<String, String>) -> String {
    let mut out = String::new();
    for (key, value) in params {
        if !out.is_empty() {
            out.push('&');
        }
        out.push_str(&uri_encode(key));
        out.push('=');
        out.push_str(&uri_encode(value));
    }
    out
}
