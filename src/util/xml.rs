use bytes::Bytes;
use quick_xml::{Reader, events::Event};
use serde::de::DeserializeOwned;

use crate::{
    error::{Error, Result},
    types::{self, PartRecord},
};

const S3_XMLNS: &str = "http://s3.amazonaws.com/doc/2006-03-01/";

fn decode<T: DeserializeOwned>(body: &str, what: &str) -> Result<T> {
    quick_xml::de::from_str::<T>(body)
        .map_err(|e| Error::decode(format!("failed to parse {what} XML response"), Some(Box::new(e))))
}

/// Local name of the document's root element.
pub(crate) fn root_element(body: &str) -> Option<String> {
    let mut reader = Reader::from_str(body);
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                return Some(String::from_utf8_lossy(e.local_name().as_ref()).into_owned());
            }
            Ok(Event::Eof) | Err(_) => return None,
            Ok(_) => {}
        }
    }
}

/// Parses an `<Error>` document; `None` when the body is empty or is some
/// other document.
pub(crate) fn parse_error(body: &str) -> Option<types::XmlError> {
    if root_element(body).as_deref() != Some("Error") {
        return None;
    }
    quick_xml::de::from_str::<types::XmlError>(body).ok()
}

/// Region named by a `GetBucketLocation` response. An empty constraint means
/// `us-east-1`, which is reported as `None`.
pub(crate) fn parse_location_constraint(body: &str) -> Result<Option<String>> {
    if body.trim().is_empty() {
        return Ok(None);
    }
    let parsed: types::XmlLocationConstraint = decode(body, "GetBucketLocation")?;
    Ok(parsed
        .region
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty()))
}

pub(crate) fn parse_initiate_multipart_upload(
    body: &str,
) -> Result<types::InitiateMultipartUploadOutput> {
    let parsed: types::XmlInitiateMultipartUploadResult = decode(body, "InitiateMultipartUpload")?;
    Ok(parsed.into())
}

/// A completion request can fail after the service has already sent `200 OK`;
/// the failure then arrives as an `<Error>` body.
pub(crate) fn parse_complete_multipart_upload(
    body: &str,
) -> Result<types::CompleteMultipartUploadOutput> {
    if let Some(err) = parse_error(body) {
        return Err(Error::consistency(format!(
            "multipart completion failed: {} ({})",
            err.code.as_deref().unwrap_or("UnknownError"),
            err.message.as_deref().unwrap_or("no message"),
        )));
    }
    let parsed: types::XmlCompleteMultipartUploadResult = decode(body, "CompleteMultipartUpload")?;
    Ok(parsed.into())
}

pub(crate) fn parse_list_parts(body: &str) -> Result<types::ListPartsOutput> {
    let parsed: types::XmlListPartsResult = decode(body, "ListParts")?;
    Ok(parsed.into())
}

pub(crate) fn parse_list_multipart_uploads(body: &str) -> Result<types::ListMultipartUploadsOutput> {
    let parsed: types::XmlListMultipartUploadsResult = decode(body, "ListMultipartUploads")?;
    Ok(parsed.into())
}

pub(crate) fn parse_list_objects_v2(body: &str) -> Result<types::ListObjectsV2Output> {
    let parsed: types::XmlListBucketResult = decode(body, "ListObjectsV2")?;
    Ok(parsed.into())
}

/// Like completion, a copy can fail after `200 OK` with an `<Error>` body.
pub(crate) fn parse_copy_object(body: &str) -> Result<types::CopyObjectOutput> {
    if let Some(err) = parse_error(body) {
        return Err(Error::Protocol {
            status: http::StatusCode::OK,
            code: err.code.unwrap_or_else(|| "UnknownError".to_string()),
            message: err.message,
            request_id: err.request_id,
            host_id: err.host_id,
            region: err.region,
            body_snippet: None,
        });
    }
    let parsed: types::XmlCopyObjectResult = decode(body, "CopyObject")?;
    Ok(parsed.into())
}

pub(crate) fn parse_list_buckets(body: &str) -> Result<Vec<types::Bucket>> {
    let parsed: types::XmlListAllMyBucketsResult = decode(body, "ListBuckets")?;
    Ok(parsed.into())
}

pub(crate) fn encode_create_bucket_configuration(region: &str) -> Result<Bytes> {
    #[derive(serde::Serialize)]
    #[serde(rename = "CreateBucketConfiguration")]
    struct Body<'a> {
        #[serde(rename = "@xmlns")]
        xmlns: &'static str,
        #[serde(rename = "LocationConstraint")]
        location_constraint: &'a str,
    }

    let xml = quick_xml::se::to_string(&Body {
        xmlns: S3_XMLNS,
        location_constraint: region,
    })
    .map_err(|e| Error::decode("failed to encode CreateBucketConfiguration XML", Some(Box::new(e))))?;
    Ok(Bytes::from(xml))
}

/// Manifest for completion; `parts` must already be in ascending order.
pub(crate) fn encode_complete_multipart_upload(parts: &[PartRecord]) -> Result<Bytes> {
    #[derive(serde::Serialize)]
    #[serde(rename = "CompleteMultipartUpload")]
    struct Body<'a> {
        #[serde(rename = "@xmlns")]
        xmlns: &'static str,
        #[serde(rename = "Part")]
        parts: Vec<Part<'a>>,
    }

    #[derive(serde::Serialize)]
    struct Part<'a> {
        #[serde(rename = "PartNumber")]
        number: u32,
        #[serde(rename = "ETag")]
        etag: &'a str,
    }

    if parts.is_empty() {
        return Err(Error::validation(
            "multipart completion requires at least one part",
        ));
    }

    let xml = quick_xml::se::to_string(&Body {
        xmlns: S3_XMLNS,
        parts: parts
            .iter()
            .map(|p| Part {
                number: p.number,
                etag: &p.etag,
            })
            .collect(),
    })
    .map_err(|e| Error::decode("failed to encode CompleteMultipartUpload XML", Some(Box::new(e))))?;
    Ok(Bytes::from(xml))
}
