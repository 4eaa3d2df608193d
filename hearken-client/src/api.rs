//! Endpoint catalogue.
//!
//! Maps cache keys onto the GET requests that fill them, and each mutation
//! onto its request. The [`ApiFetcher`] plugs the catalogue into the query
//! cache.

use crate::pipeline::RequestPipeline;
use crate::transport::{ApiRequest, MultipartFile};
use async_trait::async_trait;
use hearken_cache::{CacheKey, DirectoryKind, QueryFetcher, Resource};
use hearken_core::{
    EntityIdType, InputId, InputStatus, InputUpdate, InquiryDraft, InquiryId, NewInput, NewReply,
    RevealResponse, SyncError, SyncResult, TopicId, TopicStatusChange, TopicUpdate,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

/// Multipart field carrying an uploaded file.
pub const FILE_FIELD: &str = "file";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignInResponse {
    pub token: String,
    pub user: hearken_core::User,
}

/// Outcome of a bulk CSV import as reported by the server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CsvImportSummary {
    #[serde(default)]
    pub imported: u64,
    #[serde(default)]
    pub skipped: u64,
    #[serde(default)]
    pub errors: Vec<String>,
}

// ============================================================================
// QUERIES
// ============================================================================

/// GET request that fills `key`.
pub fn query_request(key: &CacheKey) -> SyncResult<ApiRequest> {
    let path = match key.resource() {
        Resource::InputsList => "/inputs".to_string(),
        Resource::MyInputs => "/inputs/me".to_string(),
        Resource::InputStats => "/inputs/stats".to_string(),
        Resource::InputDetail => format!("/inputs/{}", require_id(key)?),
        Resource::InputReplies => format!("/inputs/{}/replies", require_id(key)?),
        Resource::InquiriesList => "/inquiries".to_string(),
        Resource::InquiryDetail => format!("/inquiries/{}", require_id(key)?),
        Resource::TopicsList => "/topics".to_string(),
        Resource::TopicDetail => format!("/topics/{}", require_id(key)?),
        resource => match directory_kind(resource) {
            Some((kind, false)) => format!("/{}", kind.path_segment()),
            Some((kind, true)) => format!("/{}/{}", kind.path_segment(), require_id(key)?),
            None => {
                return Err(SyncError::Unknown(format!(
                    "no endpoint for resource {}",
                    resource
                )))
            }
        },
    };
    Ok(ApiRequest::get(path).with_filters(key.filters()))
}

fn require_id(key: &CacheKey) -> SyncResult<Uuid> {
    key.id()
        .ok_or_else(|| SyncError::Unknown(format!("{} requires an identifier", key.resource())))
}

/// Directory kind of `resource`, and whether it is the detail view.
fn directory_kind(resource: Resource) -> Option<(DirectoryKind, bool)> {
    DirectoryKind::ALL.into_iter().find_map(|kind| {
        if kind.list_resource() == resource {
            Some((kind, false))
        } else if kind.detail_resource() == resource {
            Some((kind, true))
        } else {
            None
        }
    })
}

/// Feeds cache misses through the request pipeline.
#[derive(Debug, Clone)]
pub struct ApiFetcher {
    pipeline: Arc<RequestPipeline>,
}

impl ApiFetcher {
    pub fn new(pipeline: Arc<RequestPipeline>) -> Self {
        Self { pipeline }
    }
}

#[async_trait]
impl QueryFetcher for ApiFetcher {
    async fn fetch(&self, key: &CacheKey) -> SyncResult<Value> {
        let request = query_request(key)?;
        self.pipeline.execute(request).await?.into_json()
    }
}

// ============================================================================
// MUTATIONS
// ============================================================================

fn body<T: Serialize>(value: &T) -> SyncResult<Value> {
    Ok(serde_json::to_value(value)?)
}

pub fn sign_in(request: &SignInRequest) -> SyncResult<ApiRequest> {
    Ok(ApiRequest::post("/auth/login")
        .with_json(body(request)?)
        .without_session())
}

pub fn submit_input(draft: &NewInput) -> SyncResult<ApiRequest> {
    Ok(ApiRequest::post("/inputs").with_json(body(draft)?))
}

pub fn update_input(id: InputId, update: &InputUpdate) -> SyncResult<ApiRequest> {
    Ok(ApiRequest::patch(format!("/inputs/{}", id)).with_json(body(update)?))
}

pub fn delete_input(id: InputId) -> ApiRequest {
    ApiRequest::delete(format!("/inputs/{}", id))
}

pub fn set_input_status(id: InputId, status: InputStatus) -> ApiRequest {
    ApiRequest::patch(format!("/inputs/{}/status", id)).with_json(json!({ "status": status }))
}

pub fn link_input_to_topic(input_id: InputId, topic_id: TopicId) -> ApiRequest {
    ApiRequest::post(format!("/topics/{}/inputs", topic_id))
        .with_json(json!({ "inputIds": [input_id] }))
}

pub fn request_reveal(id: InputId) -> ApiRequest {
    ApiRequest::post(format!("/inputs/{}/reveal-request", id))
}

pub fn respond_to_reveal(id: InputId, response: &RevealResponse) -> SyncResult<ApiRequest> {
    Ok(ApiRequest::post(format!("/inputs/{}/reveal-response", id)).with_json(body(response)?))
}

pub fn create_reply(input_id: InputId, reply: &NewReply) -> SyncResult<ApiRequest> {
    Ok(ApiRequest::post(format!("/inputs/{}/replies", input_id)).with_json(body(reply)?))
}

/// Multipart upload with a single `file` field. The bytes are forwarded
/// untouched.
pub fn import_inputs_csv(file_name: impl Into<String>, bytes: Vec<u8>) -> ApiRequest {
    ApiRequest::post("/inputs/import").with_file(MultipartFile {
        field: FILE_FIELD.to_string(),
        file_name: file_name.into(),
        mime_type: "text/csv".to_string(),
        bytes,
    })
}

pub fn create_inquiry(draft: &InquiryDraft) -> SyncResult<ApiRequest> {
    Ok(ApiRequest::post("/inquiries").with_json(body(draft)?))
}

pub fn update_inquiry(id: InquiryId, draft: &InquiryDraft) -> SyncResult<ApiRequest> {
    Ok(ApiRequest::patch(format!("/inquiries/{}", id)).with_json(body(draft)?))
}

pub fn send_inquiry(id: InquiryId) -> ApiRequest {
    ApiRequest::post(format!("/inquiries/{}/send", id))
}

pub fn close_inquiry(id: InquiryId) -> ApiRequest {
    ApiRequest::post(format!("/inquiries/{}/close", id))
}

pub fn delete_inquiry(id: InquiryId) -> ApiRequest {
    ApiRequest::delete(format!("/inquiries/{}", id))
}

pub fn update_topic(id: TopicId, update: &TopicUpdate) -> SyncResult<ApiRequest> {
    Ok(ApiRequest::patch(format!("/topics/{}", id)).with_json(body(update)?))
}

pub fn change_topic_status(id: TopicId, change: &TopicStatusChange) -> SyncResult<ApiRequest> {
    Ok(ApiRequest::patch(format!("/topics/{}/status", id)).with_json(body(change)?))
}

pub fn archive_topic(id: TopicId) -> ApiRequest {
    ApiRequest::post(format!("/topics/{}/archive", id))
}

pub fn regenerate_summary(id: TopicId) -> ApiRequest {
    ApiRequest::post(format!("/topics/{}/summary", id))
}

pub fn create_directory<T: Serialize>(kind: DirectoryKind, draft: &T) -> SyncResult<ApiRequest> {
    Ok(ApiRequest::post(format!("/{}", kind.path_segment())).with_json(body(draft)?))
}

pub fn update_directory<T: Serialize>(
    kind: DirectoryKind,
    id: impl EntityIdType,
    draft: &T,
) -> SyncResult<ApiRequest> {
    Ok(
        ApiRequest::patch(format!("/{}/{}", kind.path_segment(), id.as_uuid()))
            .with_json(body(draft)?),
    )
}

pub fn delete_directory(kind: DirectoryKind, id: impl EntityIdType) -> ApiRequest {
    ApiRequest::delete(format!("/{}/{}", kind.path_segment(), id.as_uuid()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{Method, RequestBody};
    use hearken_core::{DepartmentId, DirectoryFilters, InputFilters};

    #[test]
    fn test_every_resource_has_an_endpoint() {
        for resource in Resource::ALL {
            let key = if resource.is_instance() {
                hearken_cache::key_for(resource, Some(Uuid::now_v7()), None)
            } else {
                CacheKey::bare(resource)
            };
            let request = query_request(&key).unwrap();
            assert_eq!(request.method, Method::Get);
            assert!(request.path.starts_with('/'), "{}", request.path);
        }
    }

    #[test]
    fn test_instance_key_without_id_is_an_error() {
        let key = CacheKey::bare(Resource::InputDetail);
        assert!(query_request(&key).is_err());
    }

    #[test]
    fn test_directory_paths() {
        let id = DepartmentId::now_v7();
        let detail = CacheKey::instance(Resource::DepartmentDetail, id);
        assert_eq!(
            query_request(&detail).unwrap().path,
            format!("/departments/{}", id)
        );
        let list = CacheKey::list(Resource::ThemesList, &DirectoryFilters::default());
        assert_eq!(query_request(&list).unwrap().path, "/themes");
    }

    #[test]
    fn test_list_filters_travel_as_query() {
        let key = CacheKey::list(
            Resource::InputsList,
            &InputFilters {
                search: Some("  parking ".to_string()),
                ..Default::default()
            },
        );
        let request = query_request(&key).unwrap();
        assert!(request
            .query
            .contains(&("search".to_string(), "parking".to_string())));
    }

    #[test]
    fn test_csv_import_is_single_file_part() {
        let request = import_inputs_csv("spring.csv", b"body\nhello\n".to_vec());
        assert_eq!(request.method, Method::Post);
        match request.body {
            RequestBody::Multipart(file) => {
                assert_eq!(file.field, "file");
                assert_eq!(file.file_name, "spring.csv");
                assert_eq!(file.bytes, b"body\nhello\n");
            }
            other => panic!("expected multipart body, got {:?}", other),
        }
    }
}
