//! HTTP endpoint tests for the policy API
//!
//! The router runs against an in-memory store and a stub generator that
//! quotes the top retrieved unit, so responses are deterministic.

mod http_endpoint_tests {
    //! HTTP endpoint integration tests using axum-test

    use std::sync::Arc;

    use anyhow::anyhow;
    use async_trait::async_trait;
    use axum_test::TestServer;
    use grounding_engine::{
        DocumentStore, EngineConfig, GenerationRequest, Generator, InMemoryDocumentStore,
    };
    use policy_types::{Citation, Claim};
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};

    use crate::build_router;
    use crate::state::AppState;

    struct QuoteGenerator;

    #[async_trait]
    impl Generator for QuoteGenerator {
        async fn generate(&self, request: &GenerationRequest) -> anyhow::Result<Vec<Claim>> {
            Ok(request
                .units
                .iter()
                .take(1)
                .map(|u| Claim::new(u.text.clone(), vec![Citation::new(u.unit_id.clone(), u.page_number)]))
                .collect())
        }
    }

    struct DownGenerator;

    #[async_trait]
    impl Generator for DownGenerator {
        async fn generate(&self, _request: &GenerationRequest) -> anyhow::Result<Vec<Claim>> {
            Err(anyhow!("upstream timeout"))
        }
    }

    fn create_test_server_with(generator: Arc<dyn Generator>) -> TestServer {
        let store: Arc<dyn DocumentStore> = Arc::new(InMemoryDocumentStore::new());
        let state = AppState::with_collaborators(EngineConfig::default(), store, generator).unwrap();
        TestServer::new(build_router(Arc::new(state))).unwrap()
    }

    fn create_test_server() -> TestServer {
        create_test_server_with(Arc::new(QuoteGenerator))
    }

    fn policy_body() -> Value {
        json!({
            "source_name": "acme-gold.pdf",
            "pages": [
                {"page_number": 1, "text": "Acme Gold PPO Plan. The plan type is a PPO with a national provider network."},
                {"page_number": 2, "text": "The annual deductible is $500 per person. Specialist visits have a $40 copay."},
                {"page_number": 3, "text": "Prior authorization is required for MRI imaging. Cosmetic surgery is not covered."}
            ]
        })
    }

    async fn ingest(server: &TestServer) -> String {
        let response = server.post("/api/documents").json(&policy_body()).await;
        response.assert_status_ok();
        let json = response.json::<Value>();
        json["doc_id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_health_returns_200() {
        let server = create_test_server();
        let response = server.get("/health").await;
        response.assert_status_ok();

        let json = response.json::<Value>();
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["service"], "policy-api");
    }

    #[tokio::test]
    async fn test_ingest_then_list_and_chunks() {
        let server = create_test_server();
        let doc_id = ingest(&server).await;

        let json = server.get("/api/documents").await.json::<Value>();
        assert_eq!(json["count"], 1);
        assert_eq!(json["documents"][0], doc_id.as_str());

        let response = server.get(&format!("/api/documents/{}/chunks", doc_id)).await;
        response.assert_status_ok();
        let json = response.json::<Value>();
        assert_eq!(json["count"], 3);
        assert_eq!(json["chunks"][1]["unit_id"], "c_2_0");
        assert_eq!(json["chunks"][1]["page_number"], 2);
    }

    #[tokio::test]
    async fn test_empty_document_is_400() {
        let server = create_test_server();
        let response = server.post("/api/documents").json(&json!({"pages": []})).await;
        response.assert_status_bad_request();

        let json = response.json::<Value>();
        assert_eq!(json["success"], false);
        assert_eq!(json["code"], "NO_PAGES");
    }

    #[tokio::test]
    async fn test_unknown_document_is_404() {
        let server = create_test_server();
        let response = server
            .post("/api/documents/does-not-exist/qa")
            .json(&json!({"question": "What is my deductible?"}))
            .await;
        response.assert_status_not_found();
        assert_eq!(response.json::<Value>()["code"], "DOCUMENT_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_qa_returns_grounded_envelope() {
        let server = create_test_server();
        let doc_id = ingest(&server).await;

        let response = server
            .post(&format!("/api/documents/{}/qa", doc_id))
            .json(&json!({"question": "What is the copay for a specialist?"}))
            .await;
        response.assert_status_ok();

        let json = response.json::<Value>();
        assert_eq!(json["envelope"]["answer_type"], "normal");
        assert_eq!(json["envelope"]["citations"][0]["unit_id"], "c_2_0");
        assert!(json["answer"].as_str().unwrap().contains("(p. 2)"));
        assert!(json["disclaimer"].as_str().unwrap().contains("informational"));
    }

    #[tokio::test]
    async fn test_generation_failure_is_502() {
        let server = create_test_server_with(Arc::new(DownGenerator));
        let doc_id = ingest(&server).await;

        let response = server
            .post(&format!("/api/documents/{}/qa", doc_id))
            .json(&json!({"question": "What is the copay for a specialist?"}))
            .await;
        response.assert_status(axum::http::StatusCode::BAD_GATEWAY);
        assert_eq!(response.json::<Value>()["code"], "GENERATION_FAILED");
    }

    #[tokio::test]
    async fn test_summary_and_evaluation_round() {
        let server = create_test_server();
        let doc_id = ingest(&server).await;

        // Nothing stored yet
        server
            .get(&format!("/api/documents/{}/summary", doc_id))
            .await
            .assert_status_not_found();

        let response = server
            .post(&format!("/api/documents/{}/summary", doc_id))
            .json(&json!({"detail": "standard"}))
            .await;
        response.assert_status_ok();
        let summary = response.json::<Value>();
        assert_eq!(summary["sections"].as_array().unwrap().len(), 6);
        assert_eq!(summary["metadata"]["source_name"], "acme-gold.pdf");

        let stored = server.get(&format!("/api/documents/{}/summary", doc_id)).await;
        stored.assert_status_ok();
        assert_eq!(stored.json::<Value>(), summary);

        let response = server.post(&format!("/api/documents/{}/evaluation", doc_id)).await;
        response.assert_status_ok();
        let report = response.json::<Value>();
        assert_eq!(report["faithfulness_score"], 1.0);

        let stored = server.get(&format!("/api/documents/{}/evaluation", doc_id)).await;
        stored.assert_status_ok();
        assert_eq!(stored.json::<Value>(), report);
    }

    #[tokio::test]
    async fn test_delete_removes_document() {
        let server = create_test_server();
        let doc_id = ingest(&server).await;

        server
            .delete(&format!("/api/documents/{}", doc_id))
            .await
            .assert_status_ok();
        server
            .get(&format!("/api/documents/{}/chunks", doc_id))
            .await
            .assert_status_not_found();
        server
            .delete(&format!("/api/documents/{}", doc_id))
            .await
            .assert_status_not_found();
    }
}
