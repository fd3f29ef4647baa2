mod common;

use anyhow::Result;
use axum::http::StatusCode;
use serde_json::{json, Value};

use common::{setup, TestApp};
use permissoes::models::user::{AccessLevel, AccessType};

async fn admin(t: &TestApp) -> Result<String> {
    let id = t
        .create_user("Admin", "admin@foods.com.br", AccessType::Administrador, AccessLevel::III)
        .await?;
    t.token_for(id)
}

fn grant_view(screen_key: &str) -> Value {
    json!({
        "screen_key": screen_key,
        "can_view": true,
        "can_create": false,
        "can_edit": false,
        "can_delete": false
    })
}

#[tokio::test]
async fn administrator_resolves_every_screen_fully() -> Result<()> {
    let t = setup().await?;
    let id = t
        .create_user("Admin", "admin@foods.com.br", AccessType::Administrador, AccessLevel::I)
        .await?;
    let token = t.token_for(id)?;

    // A stored deny must not matter for administrators
    sqlx::query(
        "INSERT INTO usuario_permissoes (user_id, screen_key, can_view, can_create, can_edit, can_delete, updated_at) \
         VALUES (?, 'fornecedores', 0, 0, 0, 0, CURRENT_TIMESTAMP)",
    )
    .bind(id)
    .execute(&t.pool)
    .await?;

    let (status, body) = t
        .request("GET", &format!("/permissoes/usuarios/{}", id), Some(&token), None)
        .await?;
    assert_eq!(status, StatusCode::OK, "{}", body);

    let permissions = body["data"]["permissions"].as_object().expect("permission map");
    assert_eq!(permissions.len(), 18);
    for (screen, entry) in permissions {
        for flag in ["can_view", "can_create", "can_edit", "can_delete"] {
            assert_eq!(entry[flag], true, "{} on {} should be granted", flag, screen);
        }
        assert_eq!(entry["source"], "administrador");
    }

    Ok(())
}

#[tokio::test]
async fn fornecedores_update_replaces_the_default() -> Result<()> {
    let t = setup().await?;
    let token = admin(&t).await?;
    let x = t
        .create_user("Carla", "carla@foods.com.br", AccessType::Gerente, AccessLevel::II)
        .await?;
    let uri = format!("/permissoes/usuarios/{}", x);

    let (status, before) = t.request("GET", &uri, Some(&token), None).await?;
    assert_eq!(status, StatusCode::OK);
    let fornecedores = &before["data"]["permissions"]["fornecedores"];
    assert_eq!(fornecedores["can_view"], true);
    assert_eq!(fornecedores["can_create"], false);
    assert_eq!(fornecedores["source"], "default");

    let (status, updated) = t
        .request(
            "PUT",
            &uri,
            Some(&token),
            Some(json!({
                "screen_key": "fornecedores",
                "can_view": true,
                "can_create": true,
                "can_edit": false,
                "can_delete": false
            })),
        )
        .await?;
    assert_eq!(status, StatusCode::OK, "{}", updated);
    assert_eq!(updated["success"], true);
    let fornecedores = &updated["data"]["permissions"]["fornecedores"];
    assert_eq!(fornecedores["can_create"], true);
    assert_eq!(fornecedores["can_edit"], false);
    assert_eq!(fornecedores["source"], "explicit");

    // The user's own view refreshes too
    let own_token = t.token_for(x)?;
    let (_, me) = t.request("GET", "/auth/me", Some(&own_token), None).await?;
    assert_eq!(me["data"]["permissions"]["permissions"]["fornecedores"]["can_create"], true);

    Ok(())
}

#[tokio::test]
async fn restrictive_row_wins_over_default() -> Result<()> {
    let t = setup().await?;
    let token = admin(&t).await?;
    let x = t
        .create_user("Rui", "rui@foods.com.br", AccessType::Supervisor, AccessLevel::I)
        .await?;

    let (status, body) = t
        .request(
            "PUT",
            &format!("/permissoes/usuarios/{}", x),
            Some(&token),
            Some(json!({
                "screen_key": "rotas",
                "can_view": false,
                "can_create": false,
                "can_edit": false,
                "can_delete": false
            })),
        )
        .await?;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["permissions"]["rotas"]["can_view"], false);
    assert_eq!(body["data"]["permissions"]["rotas"]["source"], "explicit");
    // untouched screens keep their defaults
    assert_eq!(body["data"]["permissions"]["marcas"]["can_view"], true);

    Ok(())
}

#[tokio::test]
async fn grid_update_writes_every_row() -> Result<()> {
    let t = setup().await?;
    let token = admin(&t).await?;
    let x = t
        .create_user("Ana", "ana@foods.com.br", AccessType::Coordenador, AccessLevel::III)
        .await?;

    let (status, body) = t
        .request(
            "PUT",
            &format!("/permissoes/usuarios/{}", x),
            Some(&token),
            Some(json!({ "permissoes": [
                { "screen_key": "produtos", "can_view": true, "can_create": true, "can_edit": true, "can_delete": true },
                { "screen_key": "cotacao", "can_view": false, "can_create": false, "can_edit": false, "can_delete": false }
            ] })),
        )
        .await?;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["permissions"]["produtos"]["can_delete"], true);
    assert_eq!(body["data"]["permissions"]["cotacao"]["can_view"], false);
    assert_eq!(t.permission_rows(x).await?, 2);

    Ok(())
}

#[tokio::test]
async fn unknown_screen_is_rejected_without_writing() -> Result<()> {
    let t = setup().await?;
    let token = admin(&t).await?;
    let x = t
        .create_user("Bia", "bia@foods.com.br", AccessType::Gerente, AccessLevel::II)
        .await?;
    let uri = format!("/permissoes/usuarios/{}", x);

    let (status, body) = t
        .request("PUT", &uri, Some(&token), Some(grant_view("nao_existe")))
        .await?;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "validation_error");
    assert_eq!(t.permission_rows(x).await?, 0);

    // One bad key in a grid aborts the whole batch
    let (status, _) = t
        .request(
            "PUT",
            &uri,
            Some(&token),
            Some(json!({ "permissoes": [grant_view("rotas"), grant_view("nao_existe")] })),
        )
        .await?;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(t.permission_rows(x).await?, 0);

    Ok(())
}

#[tokio::test]
async fn unknown_user_is_not_found() -> Result<()> {
    let t = setup().await?;
    let token = admin(&t).await?;

    let (status, body) = t.request("GET", "/permissoes/usuarios/9999", Some(&token), None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");

    let (status, _) = t
        .request(
            "PUT",
            "/permissoes/usuarios/9999",
            Some(&token),
            Some(grant_view("fornecedores")),
        )
        .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    Ok(())
}

#[tokio::test]
async fn guard_follows_permissoes_screen_rights() -> Result<()> {
    let t = setup().await?;
    let admin_token = admin(&t).await?;
    let x = t
        .create_user("Leo", "leo@foods.com.br", AccessType::Gerente, AccessLevel::III)
        .await?;
    let token = t.token_for(x)?;

    // permissoes defaults to no access
    let (status, body) = t.request("GET", "/permissoes/telas", Some(&token), None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");

    let (status, _) = t
        .request(
            "PUT",
            &format!("/permissoes/usuarios/{}", x),
            Some(&admin_token),
            Some(grant_view("permissoes")),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);

    let (status, screens) = t.request("GET", "/permissoes/telas", Some(&token), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(screens["data"].as_array().map(Vec::len), Some(18));

    // viewing does not grant editing
    let (status, _) = t.request("POST", "/permissoes/sincronizar", Some(&token), None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    Ok(())
}

#[tokio::test]
async fn demoted_administrator_loses_rights_at_once() -> Result<()> {
    let t = setup().await?;
    let id = t
        .create_user("Bia", "bia@foods.com.br", AccessType::Administrador, AccessLevel::III)
        .await?;
    let token = t.token_for(id)?;

    let (status, me) = t.request("GET", "/auth/me", Some(&token), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["data"]["permissions"]["permissions"]["permissoes"]["can_edit"], true);

    // profile edits land in usuarios without going through this service
    sqlx::query("UPDATE usuarios SET access_type = 'gerente' WHERE id = ?")
        .bind(id)
        .execute(&t.pool)
        .await?;

    let (status, me) = t.request("GET", "/auth/me", Some(&token), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["data"]["user"]["access_type"], "gerente");
    assert_eq!(me["data"]["permissions"]["access_type"], "gerente");
    assert_eq!(me["data"]["permissions"]["permissions"]["permissoes"]["can_edit"], false);
    assert_eq!(me["data"]["permissions"]["permissions"]["permissoes"]["source"], "default");

    let (status, _) = t.request("POST", "/permissoes/sincronizar", Some(&token), None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    Ok(())
}

#[tokio::test]
async fn malformed_update_names_the_field_and_writes_nothing() -> Result<()> {
    let t = setup().await?;
    let token = admin(&t).await?;
    let x = t
        .create_user("Caio", "caio@foods.com.br", AccessType::Supervisor, AccessLevel::II)
        .await?;
    let uri = format!("/permissoes/usuarios/{}", x);

    // a missing flag is not read as a revoke
    let (status, body) = t
        .request(
            "PUT",
            &uri,
            Some(&token),
            Some(json!({ "screen_key": "rotas", "can_view": true, "can_create": true, "can_edit": true })),
        )
        .await?;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{}", body);
    assert!(body["message"].as_str().unwrap_or_default().contains("can_delete"), "{}", body);

    let mut bad = grant_view("rotas");
    bad["can_view"] = json!("yes");
    let (status, body) = t.request("PUT", &uri, Some(&token), Some(bad)).await?;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["message"].as_str().unwrap_or_default().contains("can_view"), "{}", body);

    let mut bad = grant_view("marcas");
    bad["can_edit"] = json!(1);
    let (status, body) = t
        .request("PUT", &uri, Some(&token), Some(json!({ "permissoes": [grant_view("rotas"), bad] })))
        .await?;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(
        body["message"].as_str().unwrap_or_default().contains("permissoes[1].can_edit"),
        "{}",
        body
    );

    assert_eq!(t.permission_rows(x).await?, 0);

    Ok(())
}

#[tokio::test]
async fn huge_page_number_returns_an_empty_page() -> Result<()> {
    let t = setup().await?;
    let token = admin(&t).await?;

    let (status, body) = t
        .request("GET", "/permissoes/usuarios?page=9223372036854775807", Some(&token), None)
        .await?;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["items"].as_array().map(Vec::len), Some(0));
    assert_eq!(body["data"]["pagination"]["total"], 1);

    Ok(())
}

#[tokio::test]
async fn user_listing_counts_granted_screens_and_paginates() -> Result<()> {
    let t = setup().await?;
    let token = admin(&t).await?;
    let x = t
        .create_user("Bruno", "bruno@foods.com.br", AccessType::Gerente, AccessLevel::II)
        .await?;
    t.create_user("Carlos", "carlos@foods.com.br", AccessType::Supervisor, AccessLevel::I)
        .await?;

    t.request(
        "PUT",
        &format!("/permissoes/usuarios/{}", x),
        Some(&token),
        Some(json!({ "permissoes": [
            grant_view("rotas"),
            { "screen_key": "marcas", "can_view": false, "can_create": false, "can_edit": false, "can_delete": false }
        ] })),
    )
    .await?;

    let (status, body) = t
        .request("GET", "/permissoes/usuarios?search=bru", Some(&token), None)
        .await?;
    assert_eq!(status, StatusCode::OK, "{}", body);
    let items = body["data"]["items"].as_array().expect("items");
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["id"], x);
    // the all-false row does not count
    assert_eq!(items[0]["permissions_count"], 1);

    let (_, page) = t
        .request("GET", "/permissoes/usuarios?page=2&limit=2", Some(&token), None)
        .await?;
    let pagination = &page["data"]["pagination"];
    assert_eq!(pagination["total"], 3);
    assert_eq!(pagination["pages"], 2);
    assert_eq!(page["data"]["items"].as_array().map(Vec::len), Some(1));

    Ok(())
}

#[tokio::test]
async fn reference_lists_and_templates() -> Result<()> {
    let t = setup().await?;
    let token = admin(&t).await?;

    let (_, types) = t.request("GET", "/permissoes/tipos-acesso", Some(&token), None).await?;
    assert_eq!(types["data"].as_array().map(Vec::len), Some(5));

    let (_, levels) = t.request("GET", "/permissoes/niveis-acesso", Some(&token), None).await?;
    assert_eq!(levels["data"][0]["value"], "I");

    let (status, template) = t
        .request("GET", "/permissoes/padrao/coordenador/III", Some(&token), None)
        .await?;
    assert_eq!(status, StatusCode::OK, "{}", template);
    let grid = template["data"]["permissions"].as_array().expect("grid");
    assert_eq!(grid.len(), 18);
    let usuarios = grid.iter().find(|e| e["screen_key"] == "usuarios").expect("usuarios row");
    assert_eq!(usuarios["can_edit"], true);
    assert_eq!(usuarios["can_delete"], false);

    let (status, _) = t
        .request("GET", "/permissoes/padrao/estagiario/I", Some(&token), None)
        .await?;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    Ok(())
}
