use std::fs;
use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use log::{info, warn};
use reqwest::blocking::multipart;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::config::{Config, constants};
use crate::error::UploadError;

type HmacSha256 = Hmac<Sha256>;

const S3_ACL: &str = "public-read";
const S3_CACHE_CONTROL: &str = "max-age=300";
const S3_CONTENT_TYPE: &str = "image/jpeg";

/// URL policy for objects uploaded to S3.
///
/// The static public link requires the bucket to allow public reads; the
/// presigned link works on private buckets but expires. Some gateways follow
/// redirects badly, so neither policy is hard-coded — it is configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum S3UrlMode {
    /// Return `<base_url>/<key>`, valid as long as the object is public.
    Public,
    /// Return a SigV4 presigned GET URL with a fixed expiry.
    Presigned,
}

/// Image hosting provider selected by configuration.
///
/// Each variant accepts a local file path and returns a publicly fetchable
/// URL or an error; the caller degrades every error to "no image". Only one
/// provider is used per event — there is no cross-provider fallback.
#[derive(Debug)]
pub enum SnapshotHost {
    /// No provider configured; uploads always fail soft.
    None,

    /// Cloudinary unsigned upload using a named preset.
    Cloudinary {
        cloud_name: String,
        upload_preset: String,
    },

    /// Generic image host taking a multipart POST and answering with
    /// `{"data": {"img_url": ...}}`.
    HttpPost { endpoint: String },

    /// Amazon S3 via Signature V4.
    S3(S3Host),
}

impl SnapshotHost {
    /// Build the provider selected by `UPLOAD_PROVIDER`. Unknown or absent
    /// values select the no-op variant.
    pub fn from_config(config: &Config) -> SnapshotHost {
        match config.upload_provider.as_str() {
            "cloudinary" => SnapshotHost::Cloudinary {
                cloud_name: config.cloudinary_cloud_name.clone(),
                upload_preset: config.cloudinary_upload_preset.clone(),
            },
            "http_post" => SnapshotHost::HttpPost {
                endpoint: config.imghost_upload_url.clone(),
            },
            "aws_s3" => SnapshotHost::S3(S3Host {
                bucket: config.s3_bucket.clone(),
                region: config.s3_region.clone(),
                key_prefix: config.s3_key_prefix.clone(),
                base_url: config.s3_base_url.clone(),
                url_mode: config.s3_url_mode,
                presign_expiry_secs: config.s3_presign_expiry_secs,
                access_key_id: config.aws_access_key_id.clone(),
                secret_access_key: config.aws_secret_access_key.clone(),
            }),
            "" | "none" => SnapshotHost::None,
            other => {
                warn!(
                    "Unknown upload provider '{}', snapshots will not be hosted",
                    other
                );
                SnapshotHost::None
            }
        }
    }

    pub fn is_configured(&self) -> bool {
        !matches!(self, SnapshotHost::None)
    }

    /// Upload a local image file and return its public URL.
    ///
    /// `suggested_filename` lets providers with a key namespace (S3) name
    /// the object after the print job; an empty suggestion falls back to a
    /// random key.
    ///
    /// # Errors
    ///
    /// `UploadError::NotConfigured` for the no-op variant; request, status
    /// or response errors otherwise. Never panics; no retries.
    pub fn upload(
        &self,
        snapshot_path: &Path,
        suggested_filename: &str,
    ) -> Result<String, UploadError> {
        match self {
            SnapshotHost::None => Err(UploadError::NotConfigured),
            SnapshotHost::Cloudinary {
                cloud_name,
                upload_preset,
            } => upload_cloudinary(cloud_name, upload_preset, snapshot_path),
            SnapshotHost::HttpPost { endpoint } => upload_http_post(endpoint, snapshot_path),
            SnapshotHost::S3(host) => host.upload(snapshot_path, suggested_filename),
        }
    }
}

/// Build a provider key suggestion from the job name, e.g.
/// `benchy.gco_20260806-101500.jpg`.
pub fn suggested_filename(job_name: &str, now: DateTime<Utc>) -> String {
    format!("{}_{}.jpg", job_name, now.format("%Y%m%d-%H%M%S"))
}

/// Restrict characters used in a filename.
pub fn scrub_filename(filename: &str) -> String {
    filename
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn http_client() -> Result<reqwest::blocking::Client, UploadError> {
    reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(constants::HTTP_TIMEOUT_SECONDS))
        .build()
        .map_err(|e| UploadError::RequestFailed {
            reason: e.to_string(),
        })
}

fn read_snapshot(path: &Path) -> Result<Vec<u8>, UploadError> {
    fs::read(path).map_err(|e| UploadError::ReadFailed {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}

fn upload_cloudinary(
    cloud_name: &str,
    upload_preset: &str,
    path: &Path,
) -> Result<String, UploadError> {
    let data = read_snapshot(path)?;
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("snapshot.jpg")
        .to_string();

    let part = multipart::Part::bytes(data)
        .file_name(file_name)
        .mime_str("image/jpeg")
        .map_err(|e| UploadError::RequestFailed {
            reason: e.to_string(),
        })?;
    let form = multipart::Form::new()
        .text("upload_preset", upload_preset.to_string())
        .part("file", part);

    let url = format!(
        "{}/{}/image/upload",
        constants::CLOUDINARY_API_BASE,
        cloud_name
    );
    let response = http_client()?
        .post(&url)
        .multipart(form)
        .send()
        .map_err(|e| UploadError::RequestFailed {
            reason: e.to_string(),
        })?;

    let status = response.status();
    if !status.is_success() {
        return Err(UploadError::BadStatus {
            status: status.as_u16(),
            body: response.text().unwrap_or_default(),
        });
    }

    let body: serde_json::Value =
        response.json().map_err(|e| UploadError::MalformedResponse {
            reason: e.to_string(),
        })?;
    let url = body
        .get("secure_url")
        .or_else(|| body.get("url"))
        .and_then(|v| v.as_str())
        .ok_or_else(|| UploadError::MalformedResponse {
            reason: "response has no url field".to_string(),
        })?;

    info!("Snapshot uploaded to cloudinary: {}", url);
    Ok(url.to_string())
}

fn upload_http_post(endpoint: &str, path: &Path) -> Result<String, UploadError> {
    if endpoint.is_empty() {
        return Err(UploadError::RequestFailed {
            reason: "image host endpoint is not configured".to_string(),
        });
    }

    let data = read_snapshot(path)?;
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("snapshot.jpg")
        .to_string();

    let part = multipart::Part::bytes(data)
        .file_name(file_name)
        .mime_str("image/jpeg")
        .map_err(|e| UploadError::RequestFailed {
            reason: e.to_string(),
        })?;
    let form = multipart::Form::new().part("upload", part);

    let response = http_client()?
        .post(endpoint)
        .multipart(form)
        .send()
        .map_err(|e| UploadError::RequestFailed {
            reason: e.to_string(),
        })?;

    let status = response.status();
    if !status.is_success() {
        return Err(UploadError::BadStatus {
            status: status.as_u16(),
            body: response.text().unwrap_or_default(),
        });
    }

    let body: serde_json::Value =
        response.json().map_err(|e| UploadError::MalformedResponse {
            reason: e.to_string(),
        })?;
    let url = body
        .pointer("/data/img_url")
        .and_then(|v| v.as_str())
        .ok_or_else(|| UploadError::MalformedResponse {
            reason: "response has no data.img_url field".to_string(),
        })?;

    info!("Snapshot uploaded to {}", url);
    Ok(url.to_string())
}

/// S3 uploader state: bucket coordinates, key naming and URL policy.
#[derive(Debug)]
pub struct S3Host {
    bucket: String,
    region: String,
    key_prefix: String,
    base_url: String,
    url_mode: S3UrlMode,
    presign_expiry_secs: u64,
    access_key_id: String,
    secret_access_key: String,
}

impl S3Host {
    fn upload(&self, path: &Path, suggested_filename: &str) -> Result<String, UploadError> {
        if self.bucket.is_empty() || self.access_key_id.is_empty() {
            return Err(UploadError::RequestFailed {
                reason: "S3 bucket or credentials are not configured".to_string(),
            });
        }

        let key = self.object_key(suggested_filename);
        let data = read_snapshot(path)?;
        let now = Utc::now();
        self.put_object(&key, data, now)?;

        let url = match self.url_mode {
            S3UrlMode::Public => self.public_url(&key),
            S3UrlMode::Presigned => self.presigned_get_url(&key, now),
        };
        info!("Snapshot uploaded to s3: {}", url);
        Ok(url)
    }

    /// Destination key: configured prefix plus the scrubbed suggestion, or a
    /// random name when the caller had nothing to suggest.
    fn object_key(&self, suggested_filename: &str) -> String {
        let name = if suggested_filename.is_empty() {
            format!("{}.jpg", Uuid::new_v4())
        } else {
            scrub_filename(suggested_filename)
        };
        format!("{}{}", self.key_prefix, name)
    }

    fn endpoint_host(&self) -> String {
        format!("{}.s3.{}.amazonaws.com", self.bucket, self.region)
    }

    fn put_object(&self, key: &str, data: Vec<u8>, now: DateTime<Utc>) -> Result<(), UploadError> {
        let host = self.endpoint_host();
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
        let date = now.format("%Y%m%d").to_string();
        let scope = format!("{}/{}/s3/aws4_request", date, self.region);
        let payload_hash = hex::encode(Sha256::digest(&data));
        let canonical_uri = format!("/{}", uri_encode(key, false));

        let canonical_headers = format!(
            "cache-control:{}\ncontent-type:{}\nhost:{}\nx-amz-acl:{}\nx-amz-content-sha256:{}\nx-amz-date:{}\n",
            S3_CACHE_CONTROL, S3_CONTENT_TYPE, host, S3_ACL, payload_hash, amz_date
        );
        let signed_headers = "cache-control;content-type;host;x-amz-acl;x-amz-content-sha256;x-amz-date";
        let canonical_request = format!(
            "PUT\n{}\n\n{}\n{}\n{}",
            canonical_uri, canonical_headers, signed_headers, payload_hash
        );

        let string_to_sign = format!(
            "AWS4-HMAC-SHA256\n{}\n{}\n{}",
            amz_date,
            scope,
            hex::encode(Sha256::digest(canonical_request.as_bytes()))
        );
        let signature = hex::encode(hmac_sha256(
            &self.signing_key(&date),
            string_to_sign.as_bytes(),
        ));
        let authorization = format!(
            "AWS4-HMAC-SHA256 Credential={}/{}, SignedHeaders={}, Signature={}",
            self.access_key_id, scope, signed_headers, signature
        );

        let url = format!("https://{}{}", host, canonical_uri);
        let response = http_client()?
            .put(&url)
            .header("Authorization", authorization)
            .header("Cache-Control", S3_CACHE_CONTROL)
            .header("Content-Type", S3_CONTENT_TYPE)
            .header("x-amz-acl", S3_ACL)
            .header("x-amz-content-sha256", payload_hash)
            .header("x-amz-date", amz_date)
            .body(data)
            .send()
            .map_err(|e| UploadError::RequestFailed {
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(UploadError::BadStatus {
                status: status.as_u16(),
                body: response.text().unwrap_or_default(),
            });
        }
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        let base = if self.base_url.is_empty() {
            format!("https://{}", self.endpoint_host())
        } else {
            self.base_url.trim_end_matches('/').to_string()
        };
        format!("{}/{}", base, uri_encode(key, false))
    }

    fn presigned_get_url(&self, key: &str, now: DateTime<Utc>) -> String {
        let host = self.endpoint_host();
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
        let date = now.format("%Y%m%d").to_string();
        let scope = format!("{}/{}/s3/aws4_request", date, self.region);
        let credential = format!("{}/{}", self.access_key_id, scope);

        // Parameter names are already in canonical (sorted) order.
        let query_pairs = [
            ("X-Amz-Algorithm", "AWS4-HMAC-SHA256".to_string()),
            ("X-Amz-Credential", credential),
            ("X-Amz-Date", amz_date.clone()),
            ("X-Amz-Expires", self.presign_expiry_secs.to_string()),
            ("X-Amz-SignedHeaders", "host".to_string()),
        ];
        let canonical_query = query_pairs
            .iter()
            .map(|(name, value)| format!("{}={}", uri_encode(name, true), uri_encode(value, true)))
            .collect::<Vec<_>>()
            .join("&");

        let canonical_request = format!(
            "GET\n/{}\n{}\nhost:{}\n\nhost\nUNSIGNED-PAYLOAD",
            uri_encode(key, false),
            canonical_query,
            host
        );
        let string_to_sign = format!(
            "AWS4-HMAC-SHA256\n{}\n{}\n{}",
            amz_date,
            scope,
            hex::encode(Sha256::digest(canonical_request.as_bytes()))
        );
        let signature = hex::encode(hmac_sha256(
            &self.signing_key(&date),
            string_to_sign.as_bytes(),
        ));

        format!(
            "https://{}/{}?{}&X-Amz-Signature={}",
            host,
            uri_encode(key, false),
            canonical_query,
            signature
        )
    }

    fn signing_key(&self, date: &str) -> Vec<u8> {
        let k_date = hmac_sha256(
            format!("AWS4{}", self.secret_access_key).as_bytes(),
            date.as_bytes(),
        );
        let k_region = hmac_sha256(&k_date, self.region.as_bytes());
        let k_service = hmac_sha256(&k_region, b"s3");
        hmac_sha256(&k_service, b"aws4_request")
    }
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take a key of any size");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

/// AWS-style URI encoding: unreserved characters pass through, everything
/// else becomes uppercase percent escapes. Key paths keep their slashes.
fn uri_encode(input: &str, encode_slash: bool) -> String {
    let mut out = String::with_capacity(input.len());
    for byte in input.as_bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                out.push(*byte as char)
            }
            b'/' if !encode_slash => out.push('/'),
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn s3_host(url_mode: S3UrlMode, base_url: &str) -> S3Host {
        S3Host {
            bucket: "prints".to_string(),
            region: "us-east-1".to_string(),
            key_prefix: "snapshots/".to_string(),
            base_url: base_url.to_string(),
            url_mode,
            presign_expiry_secs: 900,
            access_key_id: "AKIDEXAMPLE".to_string(),
            secret_access_key: "secret".to_string(),
        }
    }

    #[test]
    fn scrub_replaces_unsafe_characters() {
        assert_eq!(scrub_filename("part one?.gco"), "part_one_.gco");
        assert_eq!(scrub_filename("benchy_v2.jpg"), "benchy_v2.jpg");
        assert_eq!(scrub_filename("a/b\\c.jpg"), "a_b_c.jpg");
    }

    #[test]
    fn suggested_filename_includes_job_and_timestamp() {
        let now = Utc.with_ymd_and_hms(2026, 8, 6, 10, 15, 0).unwrap();
        assert_eq!(
            suggested_filename("benchy.gco", now),
            "benchy.gco_20260806-101500.jpg"
        );
    }

    #[test]
    fn object_key_uses_prefix_and_suggestion() {
        let host = s3_host(S3UrlMode::Public, "");
        assert_eq!(
            host.object_key("benchy.gco_20260806-101500.jpg"),
            "snapshots/benchy.gco_20260806-101500.jpg"
        );
        // scrubbed on the way in
        assert_eq!(host.object_key("two words.jpg"), "snapshots/two_words.jpg");
    }

    #[test]
    fn object_key_falls_back_to_random_name() {
        let host = s3_host(S3UrlMode::Public, "");
        let key = host.object_key("");
        assert!(key.starts_with("snapshots/"));
        assert!(key.ends_with(".jpg"));
        assert_ne!(key, host.object_key(""));
    }

    #[test]
    fn public_url_derives_bucket_endpoint() {
        let host = s3_host(S3UrlMode::Public, "");
        assert_eq!(
            host.public_url("snapshots/benchy.jpg"),
            "https://prints.s3.us-east-1.amazonaws.com/snapshots/benchy.jpg"
        );
    }

    #[test]
    fn public_url_honors_configured_base() {
        let host = s3_host(S3UrlMode::Public, "https://cdn.example.com/");
        assert_eq!(
            host.public_url("snapshots/benchy.jpg"),
            "https://cdn.example.com/snapshots/benchy.jpg"
        );
    }

    #[test]
    fn presigned_url_carries_signature_parameters() {
        let host = s3_host(S3UrlMode::Presigned, "");
        let now = Utc.with_ymd_and_hms(2026, 8, 6, 10, 15, 0).unwrap();
        let url = host.presigned_get_url("snapshots/benchy.jpg", now);
        assert!(url.starts_with("https://prints.s3.us-east-1.amazonaws.com/snapshots/benchy.jpg?"));
        assert!(url.contains("X-Amz-Algorithm=AWS4-HMAC-SHA256"));
        assert!(url.contains("X-Amz-Date=20260806T101500Z"));
        assert!(url.contains("X-Amz-Expires=900"));
        assert!(url.contains("X-Amz-SignedHeaders=host"));
        assert!(url.contains("&X-Amz-Signature="));
        // same inputs, same signature
        assert_eq!(url, host.presigned_get_url("snapshots/benchy.jpg", now));
    }

    #[test]
    fn uri_encode_handles_reserved_characters() {
        assert_eq!(uri_encode("a b", true), "a%20b");
        assert_eq!(uri_encode("a/b", false), "a/b");
        assert_eq!(uri_encode("a/b", true), "a%2Fb");
        assert_eq!(uri_encode("safe-._~", true), "safe-._~");
    }

    #[test]
    fn unknown_provider_selects_noop_host() {
        let host = SnapshotHost::None;
        assert!(!host.is_configured());
        match host.upload(Path::new("/tmp/x.jpg"), "x.jpg") {
            Err(UploadError::NotConfigured) => {}
            other => panic!("expected NotConfigured, got {:?}", other),
        }
    }
}
