//! Server request transformation and argument disentanglement.
//!
//! # Responsibilities
//! - Everything the generic request transform does, plus splitting the
//!   merged argument tree back into query params, parsed body, uploaded
//!   files, and cookies
//! - The reverse transform, rebuilding a unified request from the
//!   structured fields
//!
//! # Design Decisions
//! - Query classification trusts the merged tree: a key named by the query
//!   string takes its *value* from the tree, never from re-parsing the
//!   query string
//! - Upload detection is the weak shape heuristic from
//!   [`UploadDescriptor::matches`]; false positives are accepted
//! - Residual body data on a non-body-carrying method is discarded, with a
//!   warning
//! - Uploaded files are reinjected on the way back only when every entity
//!   exposes its temporary location; otherwise the transform fails instead
//!   of silently dropping them

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use http::Method;
use serde_json::{Map, Value};

use crate::error::BridgeResult;
use crate::model::args;
use crate::model::factory::{StreamFactory, UploadFactory};
use crate::model::structured::StructuredRequest;
use crate::model::unified::UnifiedRequest;
use crate::model::upload::{self, UploadDescriptor, UploadNode};
use crate::transform::request::RequestTransformer;
use crate::transform::uri;

/// Transformer for server-flavored requests. Delegates the shared message
/// copy to an embedded [`RequestTransformer`].
pub struct ServerRequestTransformer {
    request: RequestTransformer,
    uploads: Arc<dyn UploadFactory>,
}

/// Partitions of a merged argument tree after disentanglement.
struct DisentangledArguments {
    query: Map<String, Value>,
    body: Map<String, Value>,
    /// Raw descriptor nodes keyed by their dotted path in the tree.
    files: Vec<(String, Map<String, Value>)>,
    cookies: BTreeMap<String, String>,
}

impl ServerRequestTransformer {
    pub fn new(streams: Arc<dyn StreamFactory>, uploads: Arc<dyn UploadFactory>) -> Self {
        Self {
            request: RequestTransformer::new(streams),
            uploads,
        }
    }

    /// Transform a unified request into a structured server request.
    ///
    /// Consumes the body and the merged argument tree of `request`; neither
    /// must be reused by the caller.
    pub fn to_structured(&self, request: &mut UnifiedRequest) -> BridgeResult<StructuredRequest> {
        let structured = self.request.to_structured(request)?;
        let parts = disentangle(request);

        let mut files: BTreeMap<String, UploadNode> = BTreeMap::new();
        for (path, node) in parts.files {
            let descriptor = UploadDescriptor::from_map(&path, &node)?;
            let entity = self.uploads.from_descriptor(&descriptor)?;
            upload::insert_at_path(&mut files, &path, entity);
        }

        let mut structured = structured
            .with_query_params(parts.query)
            .with_uploaded_files(files)
            .with_cookie_params(parts.cookies)
            .with_server_params(request.server_params.clone());

        if is_body_carrying(&request.method) {
            structured = structured.with_parsed_body(parts.body);
        } else if !parts.body.is_empty() {
            tracing::warn!(
                method = %request.method,
                residual_keys = parts.body.len(),
                "discarding residual body arguments for a method that carries no body"
            );
        }

        Ok(structured)
    }

    /// Transform a structured server request back into a unified request.
    ///
    /// The parsed body becomes the unified constructor's argument input; the
    /// constructor re-merges query arguments itself. Uploaded files are
    /// reinjected from their temporary locations, or the transform fails
    /// with [`UploadRoundTripUnsupported`] when an entity hides its
    /// location.
    ///
    /// [`UploadRoundTripUnsupported`]: crate::error::TransformError::UploadRoundTripUnsupported
    pub fn to_unified(&self, request: StructuredRequest) -> BridgeResult<UnifiedRequest> {
        let unified_uri = uri::to_unified(request.uri())?;
        let mut arguments = request.parsed_body().clone();
        for (path, descriptor) in upload::descriptors_from_tree(request.uploaded_files())? {
            args::set_by_dotted_path(&mut arguments, &path, Value::Object(descriptor.to_map()));
        }

        let version = format!("HTTP/{}", request.protocol_version());
        let server_params: HashMap<String, String> = request.server_params().clone();

        let mut request = request;
        let content = request.body_mut().contents();

        let mut unified = UnifiedRequest::create(
            unified_uri,
            request.method().clone(),
            arguments,
            server_params,
        );
        unified.set_content(content);
        unified.version = version;
        for name in request.headers().keys() {
            for value in request.headers().get_all(name) {
                unified.headers.append(name.clone(), value.clone());
            }
        }

        Ok(unified)
    }
}

/// Split the merged argument tree of a unified request into query, body,
/// file, and cookie partitions. Consumes the tree destructively.
fn disentangle(request: &mut UnifiedRequest) -> DisentangledArguments {
    let mut remaining = request.take_arguments();

    let mut query = Map::new();
    if let Some(query_string) = request.uri.query() {
        for name in args::top_level_keys(query_string) {
            // Query keys absent from the merged tree are simply absent here.
            if let Some(value) = remaining.shift_remove(&name) {
                tracing::trace!(key = %name, "argument classified as query parameter");
                query.insert(name, value);
            }
        }
    }

    let mut files = Vec::new();
    collect_uploaded_files(&mut remaining, "", &mut files);

    let cookies = request
        .cookies
        .iter()
        .map(|cookie| (cookie.name.clone(), cookie.value.clone()))
        .collect();

    DisentangledArguments {
        query,
        body: remaining,
        files,
        cookies,
    }
}

/// Depth-first sweep moving upload-descriptor leaves out of the tree.
/// Matched nodes are removed and not descended into; both maps and
/// sequences are traversed.
fn collect_uploaded_files(
    arguments: &mut Map<String, Value>,
    current_path: &str,
    files: &mut Vec<(String, Map<String, Value>)>,
) {
    let keys: Vec<String> = arguments.keys().cloned().collect();
    for key in keys {
        let path = if current_path.is_empty() {
            key.clone()
        } else {
            format!("{current_path}.{key}")
        };

        let is_descriptor = matches!(
            arguments.get(&key),
            Some(Value::Object(node)) if UploadDescriptor::matches(node)
        );
        if is_descriptor {
            if let Some(Value::Object(node)) = arguments.shift_remove(&key) {
                tracing::trace!(path = %path, "argument classified as uploaded file");
                files.push((path, node));
            }
            continue;
        }
        match arguments.get_mut(&key) {
            Some(Value::Object(child)) => collect_uploaded_files(child, &path, files),
            Some(Value::Array(items)) => collect_from_sequence(items, &path, files),
            _ => {}
        }
    }
}

/// Sequence counterpart of the sweep. Extracted elements are removed from
/// the sequence; paths carry the element's original position (`files.0`).
fn collect_from_sequence(
    items: &mut Vec<Value>,
    current_path: &str,
    files: &mut Vec<(String, Map<String, Value>)>,
) {
    let mut index = 0;
    let mut position = 0;
    while index < items.len() {
        let path = format!("{current_path}.{position}");
        position += 1;

        let is_descriptor = matches!(
            &items[index],
            Value::Object(node) if UploadDescriptor::matches(node)
        );
        if is_descriptor {
            if let Value::Object(node) = items.remove(index) {
                tracing::trace!(path = %path, "argument classified as uploaded file");
                files.push((path, node));
            }
            continue;
        }
        match &mut items[index] {
            Value::Object(child) => collect_uploaded_files(child, &path, files),
            Value::Array(nested) => collect_from_sequence(nested, &path, files),
            _ => {}
        }
        index += 1;
    }
}

/// Whether `parsed_body` may be populated for this method.
fn is_body_carrying(method: &Method) -> bool {
    *method == Method::POST || *method == Method::PUT || *method == Method::PATCH
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::factory::{InMemoryStreams, TempFileUploads};
    use crate::model::unified::Cookie;
    use serde_json::json;
    use url::Url;

    fn transformer() -> ServerRequestTransformer {
        ServerRequestTransformer::new(Arc::new(InMemoryStreams), Arc::new(TempFileUploads))
    }

    fn as_map(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other:?}"),
        }
    }

    fn post_request(uri: &str, arguments: Value) -> UnifiedRequest {
        UnifiedRequest::create(
            uri.parse::<Url>().unwrap(),
            Method::POST,
            as_map(arguments),
            HashMap::new(),
        )
    }

    #[test]
    fn test_query_values_come_from_merged_tree() {
        // `foo` appears both in the query string and the merged tree; the
        // tree value wins, it is never re-parsed from the query string.
        let mut unified = post_request(
            "http://localhost/index.html?foo=bar",
            json!({"foo": "from-tree", "coffee": "1"}),
        );

        let structured = transformer().to_structured(&mut unified).unwrap();

        assert_eq!(
            Value::Object(structured.query_params().clone()),
            json!({"foo": "from-tree"})
        );
        assert_eq!(
            Value::Object(structured.parsed_body().clone()),
            json!({"coffee": "1"})
        );
    }

    #[test]
    fn test_query_keys_missing_from_tree_are_skipped() {
        let mut unified = UnifiedRequest::new(
            "http://localhost/?ghost=1".parse().unwrap(),
            Method::GET,
        );
        // Simulate an upstream that dropped the argument after the merge.
        unified.take_arguments();

        let structured = transformer().to_structured(&mut unified).unwrap();
        assert!(structured.query_params().is_empty());
    }

    #[test]
    fn test_method_gating() {
        let arguments = json!({"coffee": "1"});

        let mut get = UnifiedRequest::create(
            "http://localhost/".parse().unwrap(),
            Method::GET,
            as_map(arguments.clone()),
            HashMap::new(),
        );
        let structured = transformer().to_structured(&mut get).unwrap();
        assert!(structured.parsed_body().is_empty());

        let mut post = post_request("http://localhost/", arguments);
        let structured = transformer().to_structured(&mut post).unwrap();
        assert_eq!(
            Value::Object(structured.parsed_body().clone()),
            json!({"coffee": "1"})
        );
    }

    #[test]
    fn test_nested_upload_extraction() {
        let mut unified = post_request(
            "http://localhost/",
            json!({
                "avatar": {
                    "file": {"tmp_name": "/tmp/upload-9f3k", "name": "me.png", "size": 42}
                },
                "coffee": "1"
            }),
        );

        let structured = transformer().to_structured(&mut unified).unwrap();

        let avatar = structured
            .uploaded_files()
            .get("avatar")
            .and_then(UploadNode::as_group)
            .unwrap();
        let file = avatar.get("file").and_then(UploadNode::as_file).unwrap();
        assert_eq!(file.client_filename(), "me.png");
        assert_eq!(file.size(), Some(42));

        // removed from the body partition; the emptied parent map remains
        assert_eq!(
            Value::Object(structured.parsed_body().clone()),
            json!({"avatar": {}, "coffee": "1"})
        );
    }

    #[test]
    fn test_descriptor_container_is_not_a_descriptor() {
        let mut unified = post_request(
            "http://localhost/",
            json!({
                "uploads": {
                    "tmp_name": "decoy",
                    "name": "decoy",
                    "first": {"tmp_name": "/tmp/a", "name": "a.png"}
                }
            }),
        );

        let structured = transformer().to_structured(&mut unified).unwrap();

        // only the inner flat leaf is extracted
        let uploads = structured
            .uploaded_files()
            .get("uploads")
            .and_then(UploadNode::as_group)
            .unwrap();
        assert!(uploads.get("first").and_then(UploadNode::as_file).is_some());
        assert_eq!(
            Value::Object(structured.parsed_body().clone()),
            json!({"uploads": {"tmp_name": "decoy", "name": "decoy"}})
        );
    }

    #[test]
    fn test_sequence_valued_field_stays_user_data() {
        // `tags` makes the node ordinary form data, not upload metadata;
        // everything survives in the body partition untouched.
        let mut unified = post_request(
            "http://localhost/",
            json!({
                "field": {"tmp_name": "x", "name": "y", "tags": ["a", "b"]}
            }),
        );

        let structured = transformer().to_structured(&mut unified).unwrap();

        assert!(structured.uploaded_files().is_empty());
        assert_eq!(
            Value::Object(structured.parsed_body().clone()),
            json!({"field": {"tmp_name": "x", "name": "y", "tags": ["a", "b"]}})
        );
    }

    #[test]
    fn test_null_descriptor_fields_stay_user_data() {
        let mut unified = post_request(
            "http://localhost/",
            json!({
                "field": {"tmp_name": null, "name": "y"}
            }),
        );

        let structured = transformer().to_structured(&mut unified).unwrap();

        assert!(structured.uploaded_files().is_empty());
        assert_eq!(
            Value::Object(structured.parsed_body().clone()),
            json!({"field": {"tmp_name": null, "name": "y"}})
        );
    }

    #[test]
    fn test_sequence_of_descriptors_is_extracted() {
        let mut unified = post_request(
            "http://localhost/",
            json!({
                "attachments": [
                    {"tmp_name": "/tmp/upload-9f3k", "name": "a.png"},
                    {"tmp_name": "/tmp/upload-7c2m", "name": "b.png"}
                ],
                "coffee": "1"
            }),
        );

        let structured = transformer().to_structured(&mut unified).unwrap();

        let attachments = structured
            .uploaded_files()
            .get("attachments")
            .and_then(UploadNode::as_sequence)
            .unwrap();
        assert_eq!(attachments.len(), 2);
        assert_eq!(
            attachments[0].as_file().unwrap().client_filename(),
            "a.png"
        );
        assert_eq!(
            attachments[1].as_file().unwrap().client_filename(),
            "b.png"
        );

        // removed from the body partition; the emptied sequence remains
        assert_eq!(
            Value::Object(structured.parsed_body().clone()),
            json!({"attachments": [], "coffee": "1"})
        );
    }

    #[test]
    fn test_round_trip_reinjects_sequence_uploads() {
        let mut unified = post_request(
            "http://localhost/",
            json!({
                "attachments": [
                    {"tmp_name": "/tmp/upload-9f3k", "name": "a.png"},
                    {"tmp_name": "/tmp/upload-7c2m", "name": "b.png"}
                ]
            }),
        );

        let tf = transformer();
        let structured = tf.to_structured(&mut unified).unwrap();
        let recovered = tf.to_unified(structured).unwrap();

        assert_eq!(
            recovered.arguments().get("attachments"),
            Some(&json!([
                {"tmp_name": "/tmp/upload-9f3k", "name": "a.png"},
                {"tmp_name": "/tmp/upload-7c2m", "name": "b.png"}
            ]))
        );
    }

    #[test]
    fn test_cookie_list_becomes_flat_map() {
        let mut unified = UnifiedRequest::new("http://localhost/".parse().unwrap(), Method::GET);
        unified.cookies.push(Cookie::new("session", "abc123"));

        let structured = transformer().to_structured(&mut unified).unwrap();
        assert_eq!(
            structured.cookie_params().get("session").map(String::as_str),
            Some("abc123")
        );
    }

    #[test]
    fn test_server_params_pass_through() {
        let mut params = HashMap::new();
        params.insert("REMOTE_ADDR".to_string(), "127.0.0.1".to_string());
        let mut unified = UnifiedRequest::create(
            "http://localhost/".parse().unwrap(),
            Method::GET,
            Map::new(),
            params.clone(),
        );

        let structured = transformer().to_structured(&mut unified).unwrap();
        assert_eq!(structured.server_params(), &params);
    }

    #[test]
    fn test_argument_partition_is_complete() {
        let mut unified = post_request(
            "http://localhost/?a=1&b=2",
            json!({"a": "1", "b": "2", "c": "3", "d": {"e": "4"}}),
        );

        let structured = transformer().to_structured(&mut unified).unwrap();

        assert_eq!(
            Value::Object(structured.query_params().clone()),
            json!({"a": "1", "b": "2"})
        );
        assert_eq!(
            Value::Object(structured.parsed_body().clone()),
            json!({"c": "3", "d": {"e": "4"}})
        );
        assert!(structured.uploaded_files().is_empty());
        // the source tree was consumed destructively
        assert!(unified.arguments().is_empty());
    }

    #[test]
    fn test_round_trip_reinjects_uploads() {
        let mut unified = post_request(
            "http://localhost/",
            json!({
                "avatar": {"tmp_name": "/tmp/upload-9f3k", "name": "me.png", "size": 42}
            }),
        );

        let tf = transformer();
        let structured = tf.to_structured(&mut unified).unwrap();
        let recovered = tf.to_unified(structured).unwrap();

        assert_eq!(
            recovered.arguments().get("avatar"),
            Some(&json!({"tmp_name": "/tmp/upload-9f3k", "name": "me.png", "size": 42}))
        );
    }

    #[test]
    fn test_structured_to_unified_rebuilds_message() {
        let mut source = post_request(
            "http://localhost/index.html?foo=bar",
            json!({"coffee": "1"}),
        );
        source.set_content("coffee=1");

        let tf = transformer();
        let structured = tf.to_structured(&mut source).unwrap();
        let mut recovered = tf.to_unified(structured).unwrap();

        assert_eq!(recovered.method, Method::POST);
        assert_eq!(recovered.version, "HTTP/1.1");
        assert_eq!(
            recovered.uri.to_string(),
            "http://localhost/index.html?foo=bar"
        );
        // the constructor re-merged the query argument with the parsed body
        assert_eq!(
            Value::Object(recovered.arguments().clone()),
            json!({"foo": "bar", "coffee": "1"})
        );
        assert_eq!(recovered.body_mut().take_content(), "coffee=1");
    }
}
