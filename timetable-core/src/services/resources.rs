//! CRUD wrappers for the admin-managed resources.

use serde_json::Value as JsonValue;

use super::{call_json, ServiceError};
use crate::http::{ApiClient, ApiRequest};

/// A resource managed under `/<plural>/admin/<verb>-<singular>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Course,
    Instructor,
    Room,
}

impl Resource {
    /// Name used in endpoint verbs, e.g. `add-course`.
    pub fn singular(&self) -> &'static str {
        match self {
            Self::Course => "course",
            Self::Instructor => "instructor",
            Self::Room => "room",
        }
    }

    /// Leading path segment, e.g. `/courses`.
    pub fn plural(&self) -> &'static str {
        match self {
            Self::Course => "courses",
            Self::Instructor => "instructors",
            Self::Room => "rooms",
        }
    }

    fn endpoint(&self, verb: &str) -> String {
        format!("/{}/admin/{}-{}", self.plural(), verb, self.singular())
    }

    fn endpoint_for(&self, verb: &str, id: &str) -> String {
        format!("{}/{}", self.endpoint(verb), id)
    }
}

/// Create, read, update and delete one kind of [`Resource`].
pub struct ResourceService<'a> {
    client: &'a ApiClient,
    resource: Resource,
}

impl<'a> ResourceService<'a> {
    /// Service for any resource kind.
    pub fn new(client: &'a ApiClient, resource: Resource) -> Self {
        Self { client, resource }
    }

    /// Shorthand for `new(client, Resource::Course)`.
    pub fn courses(client: &'a ApiClient) -> Self {
        Self::new(client, Resource::Course)
    }

    pub fn instructors(client: &'a ApiClient) -> Self {
        Self::new(client, Resource::Instructor)
    }

    pub fn rooms(client: &'a ApiClient) -> Self {
        Self::new(client, Resource::Room)
    }

    /// Which resource this service manages.
    pub fn resource(&self) -> Resource {
        self.resource
    }

    /// `POST /<plural>/admin/add-<singular>` with `data` as the body.
    pub async fn create(&self, data: JsonValue) -> Result<JsonValue, ServiceError> {
        let request = ApiRequest::post(self.resource.endpoint("add")).with_json(data);
        let fallback = format!("Failed to create {}.", self.resource.singular());
        call_json(self.client, request, "create", &fallback).await
    }

    /// Fetch one record by id.
    pub async fn get(&self, id: &str) -> Result<JsonValue, ServiceError> {
        let request = ApiRequest::get(self.resource.endpoint_for("get", id));
        let fallback = format!("Failed to get {}.", self.resource.singular());
        call_json(self.client, request, "get", &fallback).await
    }

    /// Fetch every record.
    pub async fn list(&self) -> Result<JsonValue, ServiceError> {
        let request = ApiRequest::get(self.resource.endpoint("get-all"));
        let fallback = format!("Failed to get {}.", self.resource.plural());
        call_json(self.client, request, "list", &fallback).await
    }

    /// `PATCH` the record with a partial body.
    pub async fn update(&self, id: &str, data: JsonValue) -> Result<JsonValue, ServiceError> {
        let request = ApiRequest::patch(self.resource.endpoint_for("update", id)).with_json(data);
        let fallback = format!("Failed to update {}.", self.resource.singular());
        call_json(self.client, request, "update", &fallback).await
    }

    /// Delete one record by id, returning the backend's reply.
    pub async fn delete(&self, id: &str) -> Result<JsonValue, ServiceError> {
        let request = ApiRequest::delete(self.resource.endpoint_for("delete", id));
        let fallback = format!("Failed to delete {}.", self.resource.singular());
        call_json(self.client, request, "delete", &fallback).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{MemoryStore, StateStore, ACCESS_TOKEN_KEY};
    use crate::config::Settings;
    use crate::http::mock::{MockTransport, BASE_URL};
    use crate::http::HttpMethod;
    use serde_json::json;
    use std::sync::Arc;
    use tokio_test::{assert_err, assert_ok};

    fn setup() -> (Arc<MockTransport>, ApiClient) {
        let transport = Arc::new(MockTransport::new());
        let store = Arc::new(MemoryStore::new());
        store.set(ACCESS_TOKEN_KEY, "T1").unwrap();
        let settings = Settings {
            base_url: BASE_URL.to_string(),
            ..Settings::default()
        };
        let client = ApiClient::new(settings, transport.clone(), store);
        (transport, client)
    }

    #[test]
    fn test_endpoint_paths() {
        assert_eq!(Resource::Course.endpoint("add"), "/courses/admin/add-course");
        assert_eq!(
            Resource::Instructor.endpoint("get-all"),
            "/instructors/admin/get-all-instructor"
        );
        assert_eq!(
            Resource::Room.endpoint_for("delete", "r7"),
            "/rooms/admin/delete-room/r7"
        );
    }

    #[tokio::test]
    async fn test_create_course_posts_payload() {
        let (transport, client) = setup();
        transport.on_json(
            HttpMethod::Post,
            "/courses/admin/add-course",
            201,
            json!({"data": {"_id": "c1", "courseCode": "CS-301"}}),
        );

        let created = ResourceService::courses(&client)
            .create(json!({"courseCode": "CS-301", "creditHours": 3}))
            .await
            .unwrap();

        assert_eq!(created["data"]["_id"], "c1");
        let calls = transport.calls(HttpMethod::Post, "/courses/admin/add-course");
        assert_eq!(calls[0].request.body, Some(json!({"courseCode": "CS-301", "creditHours": 3})));
        assert_eq!(calls[0].authorization(), Some("Bearer T1"));
    }

    #[tokio::test]
    async fn test_update_and_delete_use_id_in_path() {
        let (transport, client) = setup();
        transport.on_json(HttpMethod::Patch, "/rooms/admin/update-room/r1", 200, json!({"data": {}}));
        transport.on_json(HttpMethod::Delete, "/rooms/admin/delete-room/r1", 200, json!({"message": "Room deleted"}));
        let rooms = ResourceService::rooms(&client);

        assert_ok!(rooms.update("r1", json!({"capacity": 60})).await);
        let deleted = assert_ok!(rooms.delete("r1").await);

        assert_eq!(deleted["message"], "Room deleted");
        assert_eq!(transport.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_failure_uses_server_message_then_fallback() {
        let (transport, client) = setup();
        transport.on_json(
            HttpMethod::Get,
            "/instructors/admin/get-instructor/i9",
            404,
            json!({"message": "Instructor not found"}),
        );
        transport.on_json(HttpMethod::Get, "/instructors/admin/get-all-instructor", 500, json!({}));
        let instructors = ResourceService::instructors(&client);

        let err = assert_err!(instructors.get("i9").await);
        assert_eq!(err.to_string(), "Instructor not found");

        let err = assert_err!(instructors.list().await);
        assert_eq!(err.to_string(), "Failed to get instructors.");
        assert!(!err.requires_login());
    }

    #[tokio::test]
    async fn test_refresh_failure_surfaces_as_login_required() {
        let (transport, client) = setup();
        transport.on_protected(HttpMethod::Get, "/courses/admin/get-all-course", "T2");
        transport.on_json(
            HttpMethod::Post,
            "/api/v1/users/refresh-token",
            401,
            json!({"message": "Refresh token missing"}),
        );

        let err = ResourceService::courses(&client).list().await.unwrap_err();

        assert!(err.requires_login());
        assert_eq!(err.message(), "Refresh token missing");
    }
}
