use crate::{
    controller::{
        command_controller, configuration_controller, health_check_controller, oauth_controller,
    },
    params, AppState,
};
use axum::{
    routing::{get, post},
    Router,
};

use utoipa::OpenApi;
use utoipa_rapidoc::RapiDoc;

// This is the global definition of our OpenAPI spec. To be a part
// of the rendered spec, a path and schema must be listed here.
#[derive(OpenApi)]
#[openapi(
        info(
            title = "MS Teams Meetings API"
        ),
        paths(
            command_controller::execute,
            configuration_controller::changed,
            health_check_controller::health_check,
            oauth_controller::complete,
        ),
        components(
            schemas(
                params::command::CommandParams,
                params::command::CommandResponse,
            )
        ),
        tags(
            (name = "mstmeetings", description = "Microsoft Teams meetings for team chat")
        )
    )]
struct ApiDoc;

pub fn define_routes(app_state: AppState) -> Router {
    Router::new()
        .merge(health_routes())
        .merge(command_routes(app_state.clone()))
        .merge(configuration_routes(app_state.clone()))
        .merge(oauth_routes(app_state))
        .merge(RapiDoc::with_openapi("/api-docs/openapi2.json", ApiDoc::openapi()).path("/rapidoc"))
}

fn health_routes() -> Router {
    Router::new().route("/health", get(health_check_controller::health_check))
}

fn command_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/commands", post(command_controller::execute))
        .with_state(app_state)
}

/// Called by the host whenever an administrator saves the plugin settings
fn configuration_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/configuration", post(configuration_controller::changed))
        .with_state(app_state)
}

/// Redirect target registered with Microsoft
fn oauth_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/oauth2/complete", get(oauth_controller::complete))
        .with_state(app_state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{app_state, app_state_with, valid_config};
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
        response::Response,
    };
    use domain::host::memory::MemoryHost;
    use meeting_auth::credentials::KvStore;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    async fn body_text(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (_host, state) = app_state().await;
        let app = define_routes(state);

        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "healthy");
    }

    #[tokio::test]
    async fn test_help_command() {
        let (host, state) = app_state().await;
        let app = define_routes(state);

        let response = app
            .oneshot(post_json(
                "/commands",
                json!({"user_id": "u1", "channel_id": "c1", "action": "help"}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(body["text"], domain::command::HELP_TEXT);
        assert_eq!(host.ephemeral_posts().await.len(), 1);
    }

    #[tokio::test]
    async fn test_connect_command_returns_authorization_link() {
        let (host, state) = app_state().await;
        let app = define_routes(state);

        let response = app
            .oneshot(post_json(
                "/commands",
                json!({"user_id": "u1", "channel_id": "c1", "action": "connect"}),
            ))
            .await
            .unwrap();

        let body: Value = serde_json::from_str(&body_text(response).await).unwrap();
        let text = body["text"].as_str().unwrap();
        assert!(text.starts_with(domain::error::NOT_CONNECTED_MESSAGE));
        assert!(text.contains("/oauth2/v2.0/authorize?"));
        assert!(host.get("mstmeetingsuserstate_u1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_malformed_command_is_rejected() {
        let (_host, state) = app_state().await;
        let app = define_routes(state);

        let response = app
            .oneshot(post_json("/commands", json!({"action": "help"})))
            .await
            .unwrap();

        assert!(response.status().is_client_error());
    }

    #[tokio::test]
    async fn test_configuration_change_accepts_valid_settings() {
        let (host, state) = app_state().await;
        host.set_plugin_config(valid_config()).await;
        let app = define_routes(state.clone());

        let response = app
            .oneshot(post_json("/configuration", json!({})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(*state.configuration.snapshot(), valid_config());
    }

    #[tokio::test]
    async fn test_configuration_change_reports_invalid_settings() {
        let (host, state) = app_state().await;
        let mut config = valid_config();
        config.oauth2_client_secret.clear();
        host.set_plugin_config(config.clone()).await;
        let app = define_routes(state.clone());

        let response = app
            .oneshot(post_json("/configuration", json!({})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(
            state.configuration.snapshot().oauth2_client_id,
            config.oauth2_client_id
        );
    }

    #[tokio::test]
    async fn test_oauth_complete_with_unknown_state() {
        let (_host, state) = app_state().await;
        let app = define_routes(state);

        let request = Request::builder()
            .uri(format!("/oauth2/complete?code=abc&state={}_u1", "0".repeat(64)))
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_oauth_complete_without_code() {
        let (_host, state) = app_state().await;
        let app = define_routes(state);

        let request = Request::builder()
            .uri("/oauth2/complete?state=abc_u1")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_oauth_complete_connects_user() {
        let mut server = mockito::Server::new_async().await;
        let _token = server
            .mock("POST", "/contoso/oauth2/v2.0/token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"access_token":"access-1","token_type":"Bearer","expires_in":3600,"refresh_token":"refresh-1"}"#,
            )
            .create_async()
            .await;

        let host = Arc::new(MemoryHost::new());
        let state = app_state_with(&host, &server.url()).await;
        let url = state
            .meetings
            .authenticator()
            .issue_state("u1", "c1", true)
            .await
            .unwrap();
        let oauth_state = url
            .split("state=")
            .nth(1)
            .and_then(|rest| rest.split('&').next())
            .unwrap()
            .to_string();
        let app = define_routes(state);

        let request = Request::builder()
            .uri(format!("/oauth2/complete?code=code-1&state={}", oauth_state))
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("Completed connecting"));
        assert_eq!(
            host.kv_keys().await,
            vec!["tbyrid_r1".to_string(), "token_u1".to_string()]
        );
        assert_eq!(host.ephemeral_posts().await.len(), 1);

        // The state is single use.
        let replay = Request::builder()
            .uri(format!("/oauth2/complete?code=code-1&state={}", oauth_state))
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(replay).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
