use anyhow::Result;
use bytes::Bytes;
use futures_util::stream;
use http::{header::CONTENT_TYPE, HeaderMap, StatusCode};

use body_data::{BodyDecoder, DecodedBody, Error, FileDescriptor, Limits, Part, Subscriber};

const HELLO_WORLD_MD5: &str = "5eb63bbbe01eeed093cb22bb8f5acdc3";

fn typed_headers(content_type: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, content_type.parse().unwrap());
    headers
}

fn multipart_headers() -> HeaderMap {
    typed_headers("multipart/form-data; boundary=AaB03x")
}

fn binary_headers(file_name: Option<&str>) -> HeaderMap {
    let mut headers = typed_headers("application/octet-stream");
    if let Some(name) = file_name {
        headers.insert("x-file-name", name.parse().unwrap());
    }
    headers.insert("x-mime-type", "application/x-thing".parse().unwrap());
    headers
}

fn sample_multipart() -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(b"--AaB03x\r\n");
    body.extend_from_slice(b"Content-Disposition: form-data; name=\"a\"\r\n\r\n");
    body.extend_from_slice(b"1\r\n");
    body.extend_from_slice(b"--AaB03x\r\n");
    body.extend_from_slice(
        b"Content-Disposition: form-data; name=\"upload\"; filename=\"hello.txt\"\r\n",
    );
    body.extend_from_slice(b"Content-Type: text/plain\r\n\r\n");
    body.extend_from_slice(b"hello world\r\n");
    body.extend_from_slice(b"--AaB03x--\r\n");
    body
}

fn decode_chunked(
    headers: &HeaderMap,
    body: &[u8],
    size: usize,
    limits: Limits,
) -> Result<DecodedBody, Error> {
    let mut decoder = BodyDecoder::new(headers, limits);
    for chunk in body.chunks(size) {
        decoder.feed(Bytes::copy_from_slice(chunk), &mut ());
    }
    decoder.finish(&mut ())
}

#[tokio::test]
async fn multipart_field_and_file() -> Result<()> {
    let chunks: Vec<Result<Bytes, std::io::Error>> = vec![Ok(Bytes::from(sample_multipart()))];
    let parsed = BodyDecoder::decode(
        &multipart_headers(),
        stream::iter(chunks),
        Limits::default(),
        &mut (),
    )
    .await?;

    assert_eq!(parsed.fields["a"], "1");

    let file = &parsed.files["upload"];
    assert_eq!(file.content_hash, HELLO_WORLD_MD5);
    assert_eq!(file.field_name, "upload");
    assert_eq!(file.file_name.as_deref(), Some("hello.txt"));
    assert_eq!(file.content_type, "text/plain");
    assert_eq!(file.headers["content-type"], "text/plain");
    assert_eq!(file.saved_path, None);
    Ok(())
}

#[test]
fn split_chunks_decode_identically() -> Result<()> {
    let payload = sample_multipart();
    let whole = decode_chunked(
        &multipart_headers(),
        &payload,
        payload.len(),
        Limits::default(),
    )?;

    // every split point, including ones bisecting the boundary marker
    for size in 1..=17 {
        let parsed = decode_chunked(&multipart_headers(), &payload, size, Limits::default())?;
        assert_eq!(parsed.fields, whole.fields, "chunk size {size}");
        assert_eq!(
            parsed.files["upload"].content_hash, whole.files["upload"].content_hash,
            "chunk size {size}"
        );
    }
    Ok(())
}

#[test]
fn signals_preserve_wire_order() -> Result<()> {
    #[derive(Default)]
    struct Log(Vec<String>);

    impl Subscriber for Log {
        fn part_started(&mut self, part: &mut Part) -> Result<(), Error> {
            self.0.push(format!("start {}", part.name()));
            Ok(())
        }

        fn field_decoded(&mut self, name: &str, value: &str) {
            self.0.push(format!("field {name}={value}"));
        }

        fn part_ended(&mut self, name: &str, file: &FileDescriptor) {
            self.0.push(format!("file {name} {}", file.content_hash));
        }
    }

    let mut log = Log::default();
    let mut decoder = BodyDecoder::new(&multipart_headers(), Limits::default());
    for chunk in sample_multipart().chunks(5) {
        decoder.feed(Bytes::copy_from_slice(chunk), &mut log);
    }
    decoder.finish(&mut log)?;

    assert_eq!(
        log.0,
        vec![
            "start a".to_owned(),
            "field a=1".to_owned(),
            "start upload".to_owned(),
            format!("file upload {HELLO_WORLD_MD5}"),
        ]
    );
    Ok(())
}

#[test]
fn oversized_part_header_block() {
    let limits = Limits::default().max_header_size(16);
    let err = decode_chunked(&multipart_headers(), &sample_multipart(), 7, limits).unwrap_err();
    assert!(matches!(err, Error::HeaderTooLarge(16)));
    assert_eq!(
        err.status(),
        Some(StatusCode::REQUEST_HEADER_FIELDS_TOO_LARGE)
    );
}

#[test]
fn multipart_over_request_cap() {
    let limits = Limits::default().max_request_size(10);
    let err = decode_chunked(&multipart_headers(), &sample_multipart(), 4096, limits).unwrap_err();
    assert!(matches!(err, Error::PayloadTooLarge(10)));
}

#[test]
fn missing_boundary_is_bad_request() {
    let err = decode_chunked(
        &typed_headers("multipart/form-data"),
        b"",
        1,
        Limits::default(),
    )
    .unwrap_err();
    assert!(matches!(err, Error::BadRequest(_)));
    assert_eq!(err.status(), Some(StatusCode::BAD_REQUEST));
}

#[test]
fn unterminated_part_is_bad_request() {
    let mut payload = sample_multipart();
    // drop the closing `--AaB03x--\r\n`
    payload.truncate(payload.len() - 12);
    let err = decode_chunked(&multipart_headers(), &payload, 4096, Limits::default()).unwrap_err();
    assert!(matches!(err, Error::BadRequest(_)));
}

#[tokio::test]
async fn urlencoded_form() -> Result<()> {
    let chunks: Vec<Result<Bytes, std::io::Error>> = vec![
        Ok(Bytes::from_static(b"a=1&b=hel")),
        Ok(Bytes::from_static(b"lo%20world")),
    ];
    let parsed = BodyDecoder::decode(
        &typed_headers("application/x-www-form-urlencoded"),
        stream::iter(chunks),
        Limits::default(),
        &mut (),
    )
    .await?;

    assert_eq!(parsed.fields["a"], "1");
    assert_eq!(parsed.fields["b"], "hello world");
    assert!(parsed.files.is_empty());
    Ok(())
}

#[tokio::test]
async fn json_object() -> Result<()> {
    let chunks: Vec<Result<Bytes, std::io::Error>> =
        vec![Ok(Bytes::from_static(br#"{"a":"1","count":2}"#))];
    let parsed = BodyDecoder::decode(
        &typed_headers("application/json"),
        stream::iter(chunks),
        Limits::default(),
        &mut (),
    )
    .await?;

    assert_eq!(parsed.fields["a"], "1");
    assert_eq!(parsed.fields["count"], "2");
    assert_eq!(parsed.json.unwrap()["count"], 2);
    Ok(())
}

#[test]
fn malformed_json_is_bad_request() {
    let err = decode_chunked(
        &typed_headers("application/json"),
        b"{\"a\":",
        4096,
        Limits::default(),
    )
    .unwrap_err();
    assert!(matches!(err, Error::BadRequest(_)));
    assert_eq!(err.status(), Some(StatusCode::BAD_REQUEST));
}

#[test]
fn buffered_body_over_cap_drains_to_end() {
    let limits = Limits::default().max_buffer_size(8);
    let err = decode_chunked(
        &typed_headers("application/x-www-form-urlencoded"),
        b"a=1&b=12345678901234567890",
        3,
        limits,
    )
    .unwrap_err();
    assert!(matches!(err, Error::PayloadTooLarge(8)));
    assert_eq!(err.status(), Some(StatusCode::PAYLOAD_TOO_LARGE));
}

#[tokio::test]
async fn binary_upload() -> Result<()> {
    let chunks: Vec<Result<Bytes, std::io::Error>> = vec![
        Ok(Bytes::from_static(b"hello ")),
        Ok(Bytes::from_static(b"world")),
    ];
    let parsed = BodyDecoder::decode(
        &binary_headers(Some("data.bin")),
        stream::iter(chunks),
        Limits::default(),
        &mut (),
    )
    .await?;

    let file = &parsed.files[""];
    assert_eq!(file.content_hash, HELLO_WORLD_MD5);
    assert_eq!(file.file_name.as_deref(), Some("data.bin"));
    assert_eq!(file.content_type, "application/x-thing");
    Ok(())
}

#[test]
fn binary_over_request_cap() {
    let limits = Limits::default().max_request_size(100);
    let payload = vec![0u8; 101];
    let err = decode_chunked(&binary_headers(Some("big.bin")), &payload, 50, limits).unwrap_err();
    assert!(matches!(err, Error::PayloadTooLarge(100)));
    assert_eq!(err.status(), Some(StatusCode::PAYLOAD_TOO_LARGE));
}

#[test]
fn unsupported_media_type() {
    let err = decode_chunked(&typed_headers("text/plain"), b"x", 1, Limits::default()).unwrap_err();
    assert!(matches!(err, Error::UnsupportedMediaType(_)));
    assert_eq!(err.status(), Some(StatusCode::UNSUPPORTED_MEDIA_TYPE));

    let err = decode_chunked(&HeaderMap::new(), b"x", 1, Limits::default()).unwrap_err();
    assert!(matches!(err, Error::UnsupportedMediaType(_)));
}

#[tokio::test]
async fn transport_error_is_terminal() {
    let chunks: Vec<Result<Bytes, std::io::Error>> = vec![
        Ok(Bytes::from_static(b"a=1")),
        Err(std::io::Error::new(std::io::ErrorKind::Other, "reset")),
    ];
    let err = BodyDecoder::decode(
        &typed_headers("application/x-www-form-urlencoded"),
        stream::iter(chunks),
        Limits::default(),
        &mut (),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, Error::BoxError(_)));
    assert_eq!(err.status(), None);
}
