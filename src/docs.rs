use std::sync::Arc;

use axum::{routing::get, Json, Router};
use serde_json::{json, Value};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::authz::{PermissionFlags, Screen};
use crate::models::{permission, user};
use crate::routes::{auth, health, permissoes};

#[derive(OpenApi)]
#[openapi(
	paths(
		health::health,
		auth::login,
		auth::me,
		permissoes::list_users,
		permissoes::get_user_permissions,
		permissoes::update_user_permissions,
		permissoes::apply_user_template,
		permissoes::list_screens,
		permissoes::get_template,
		permissoes::list_access_types,
		permissoes::list_access_levels,
		permissoes::sync_permissions
	),
	components(
		schemas(
			health::HealthResponse,
			auth::MeResponse,
			user::User,
			user::UserSummary,
			user::AccessLevel,
			user::AccessType,
			user::UserStatus,
			user::LoginRequest,
			user::AuthResponse,
			permission::UserPermission,
			permission::PermissionSource,
			permission::EffectivePermission,
			permission::ResolvedPermissions,
			permission::UserPermissionsResponse,
			permission::PermissionUpdate,
			permission::UpdatePermissionsRequest,
			permission::SyncResponse,
			permission::TemplateEntry,
			permission::TemplateResponse,
			permission::OptionEntry,
			permissoes::Pagination,
			permissoes::UserListResponse,
			PermissionFlags,
			Screen
		)
	),
	tags(
		(name = "Health", description = "Liveness and database reachability"),
		(name = "Auth", description = "Authentication endpoints"),
		(name = "Permissoes", description = "Per-user screen permissions")
	)
)]
pub struct ApiDoc;

/// Every response body is wrapped as `{ success, data, message }`; the
/// schemas above describe `data`.
pub fn build_openapi(port: u16) -> anyhow::Result<utoipa::openapi::OpenApi> {
	let mut doc = serde_json::to_value(ApiDoc::openapi())?;

	ensure_security_components(&mut doc);
	ensure_servers(&mut doc, port);

	Ok(serde_json::from_value(doc)?)
}

pub fn swagger_routes(doc: utoipa::openapi::OpenApi) -> Router {
	let swagger_config = utoipa_swagger_ui::Config::new(["/api-docs/openapi.json"])
		.try_it_out_enabled(true)
		.persist_authorization(true);

	let doc = Arc::new(doc);
	let json_route = get(move || {
		let doc = Arc::clone(&doc);
		async move { Json((*doc).clone()) }
	});

	Router::new()
		.route("/api-docs/openapi.json", json_route)
		.merge(SwaggerUi::new("/docs").config(swagger_config))
}

fn ensure_security_components(doc: &mut Value) {
	let Some(root) = doc.as_object_mut() else {
		return;
	};

	let components = root.entry("components").or_insert_with(|| json!({}));
	if let Some(components) = components.as_object_mut() {
		let schemes = components.entry("securitySchemes").or_insert_with(|| json!({}));
		if let Some(schemes) = schemes.as_object_mut() {
			schemes.entry("bearerAuth").or_insert_with(|| {
				json!({
					"type": "http",
					"scheme": "bearer",
					"bearerFormat": "JWT"
				})
			});
		}
	}
}

fn ensure_servers(doc: &mut Value, port: u16) {
	let Some(root) = doc.as_object_mut() else {
		return;
	};

	let has_servers = root
		.get("servers")
		.and_then(Value::as_array)
		.map(|servers| !servers.is_empty())
		.unwrap_or(false);

	if !has_servers {
		root.insert(
			"servers".to_string(),
			json!([{ "url": format!("http://localhost:{port}"), "description": "Local server" }]),
		);
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn bearer_scheme_is_added_once() {
		let mut doc = json!({ "components": { "schemas": {} } });
		ensure_security_components(&mut doc);
		ensure_security_components(&mut doc);

		let schemes = doc["components"]["securitySchemes"].as_object().unwrap();
		assert_eq!(schemes.len(), 1);
		assert_eq!(schemes["bearerAuth"]["scheme"], "bearer");
	}

	#[test]
	fn existing_servers_are_kept() {
		let mut doc = json!({ "servers": [{ "url": "https://erp.example" }] });
		ensure_servers(&mut doc, 8000);
		assert_eq!(doc["servers"][0]["url"], "https://erp.example");

		let mut empty = json!({});
		ensure_servers(&mut empty, 9000);
		assert_eq!(empty["servers"][0]["url"], "http://localhost:9000");
	}
}
