//! AWS Signature Version 4 request signing.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::config::Credentials;

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";

/// The parts of an HTTP request covered by the signature.
pub(crate) struct CanonicalRequest<'a> {
    pub method: &'a str,
    pub path: &'a str,
    /// Already-canonical query string (sorted, encoded), or empty.
    pub query: &'a str,
    pub headers: Vec<(String, String)>,
    pub payload: &'a [u8],
}

impl CanonicalRequest<'_> {
    fn sorted_headers(&self) -> Vec<(String, String)> {
        let mut headers: Vec<(String, String)> = self
            .headers
            .iter()
            .map(|(name, value)| (name.to_ascii_lowercase(), collapse_whitespace(value)))
            .collect();
        headers.sort_by(|a, b| a.0.cmp(&b.0));
        headers
    }

    pub fn signed_headers(&self) -> String {
        self.sorted_headers()
            .into_iter()
            .map(|(name, _)| name)
            .collect::<Vec<_>>()
            .join(";")
    }

    pub fn canonical_string(&self) -> String {
        let canonical_headers: String = self
            .sorted_headers()
            .into_iter()
            .map(|(name, value)| format!("{name}:{value}\n"))
            .collect();
        let path = if self.path.is_empty() { "/" } else { self.path };
        format!(
            "{}\n{}\n{}\n{}\n{}\n{}",
            self.method,
            path,
            self.query,
            canonical_headers,
            self.signed_headers(),
            hex::encode(Sha256::digest(self.payload))
        )
    }
}

pub(crate) struct Signer<'a> {
    pub credentials: &'a Credentials,
    pub region: &'a str,
    pub service: &'a str,
}

impl Signer<'_> {
    /// Value of the `Authorization` header for `request` signed at `now`.
    ///
    /// `request.headers` must already contain `x-amz-date` (and the session
    /// token header, when one is in use).
    pub fn authorization(&self, request: &CanonicalRequest<'_>, now: DateTime<Utc>) -> String {
        let date = now.format("%Y%m%d").to_string();
        let scope = format!("{date}/{}/{}/aws4_request", self.region, self.service);
        let string_to_sign = format!(
            "{ALGORITHM}\n{}\n{scope}\n{}",
            amz_date(now),
            hex::encode(Sha256::digest(request.canonical_string().as_bytes()))
        );
        let key = self.signing_key(&date);
        let signature = hex::encode(hmac(&key, string_to_sign.as_bytes()));
        format!(
            "{ALGORITHM} Credential={}/{scope}, SignedHeaders={}, Signature={signature}",
            self.credentials.access_key_id(),
            request.signed_headers()
        )
    }

    fn signing_key(&self, date: &str) -> [u8; 32] {
        let secret = Zeroizing::new(format!("AWS4{}", self.credentials.secret_access_key()));
        let k_date = hmac(secret.as_bytes(), date.as_bytes());
        let k_region = hmac(&k_date, self.region.as_bytes());
        let k_service = hmac(&k_region, self.service.as_bytes());
        hmac(&k_service, b"aws4_request")
    }
}

/// `X-Amz-Date` header value.
pub(crate) fn amz_date(now: DateTime<Utc>) -> String {
    now.format("%Y%m%dT%H%M%SZ").to_string()
}

fn hmac(key: &[u8], data: &[u8]) -> [u8; 32] {
    let mut mac = match HmacSha256::new_from_slice(key) {
        Ok(mac) => mac,
        Err(_) => unreachable!("hmac accepts keys of any length"),
    };
    mac.update(data);
    mac.finalize().into_bytes().into()
}

fn collapse_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const EXAMPLE_SECRET: &str = "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY";

    fn example_credentials() -> Credentials {
        Credentials::new("AKIDEXAMPLE", EXAMPLE_SECRET, None)
    }

    #[test]
    fn derives_documented_signing_key() {
        let creds = example_credentials();
        let signer = Signer {
            credentials: &creds,
            region: "us-east-1",
            service: "iam",
        };
        assert_eq!(
            hex::encode(signer.signing_key("20120215")),
            "f4780e2d9f65fa895f9c67b32ce1baf0b0d8a43505a000a1a9e090d414db404d"
        );
    }

    #[test]
    fn signs_documented_list_users_request() {
        let creds = example_credentials();
        let signer = Signer {
            credentials: &creds,
            region: "us-east-1",
            service: "iam",
        };
        let request = CanonicalRequest {
            method: "GET",
            path: "/",
            query: "Action=ListUsers&Version=2010-05-08",
            headers: vec![
                (
                    "Content-Type".to_string(),
                    "application/x-www-form-urlencoded; charset=utf-8".to_string(),
                ),
                ("Host".to_string(), "iam.amazonaws.com".to_string()),
                ("X-Amz-Date".to_string(), "20150830T123600Z".to_string()),
            ],
            payload: b"",
        };
        assert_eq!(
            hex::encode(Sha256::digest(request.canonical_string().as_bytes())),
            "f536975d06c0309214f805bb90ccff089219ecd68b2577efef23edd43b7e1a59"
        );

        let now = Utc.with_ymd_and_hms(2015, 8, 30, 12, 36, 0).unwrap();
        assert_eq!(
            signer.authorization(&request, now),
            "AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20150830/us-east-1/iam/aws4_request, \
             SignedHeaders=content-type;host;x-amz-date, \
             Signature=5d672d79c15b13162d9279b0855cfba6789a8edb4c82c400e06b5924a6f2b5d7"
        );
    }

    #[test]
    fn header_names_are_lowercased_and_sorted() {
        let request = CanonicalRequest {
            method: "POST",
            path: "",
            query: "",
            headers: vec![
                ("X-Amz-Target".to_string(), "Svc.Op".to_string()),
                ("Host".to_string(), "example.com".to_string()),
            ],
            payload: b"{}",
        };
        assert_eq!(request.signed_headers(), "host;x-amz-target");
        assert!(request
            .canonical_string()
            .starts_with("POST\n/\n\nhost:example.com\nx-amz-target:Svc.Op\n"));
    }

    #[test]
    fn amz_date_format() {
        let now = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(amz_date(now), "20240102T030405Z");
    }
}
