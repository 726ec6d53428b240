use newsbot::llm::ollama::OllamaBackend;
use newsbot::llm::{GenerateRequest, LlmBackend};

#[tokio::test]
async fn test_generate_with_mock() {
    let mut server = mockito::Server::new_async().await;

    let mock = server
        .mock("POST", "/api/generate")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{
                "model": "llama3.2",
                "response": "  Markets closed higher today.  ",
                "done": true
            }"#,
        )
        .create_async()
        .await;

    let backend = OllamaBackend::new(server.url());

    let result = backend
        .generate(GenerateRequest {
            model: "llama3.2".to_string(),
            prompt: "Summarize the markets".to_string(),
            timeout_seconds: Some(10),
        })
        .await;

    assert!(result.is_ok());
    assert_eq!(result.unwrap(), "Markets closed higher today.");

    mock.assert_async().await;
}

#[tokio::test]
async fn test_generate_error_handling() {
    let mut server = mockito::Server::new_async().await;

    let mock = server
        .mock("POST", "/api/generate")
        .with_status(500)
        .with_header("content-type", "application/json")
        .with_body(r#"{"error": "model not loaded"}"#)
        .create_async()
        .await;

    let backend = OllamaBackend::new(server.url());

    let result = backend
        .generate(GenerateRequest {
            model: "llama3.2".to_string(),
            prompt: "Test".to_string(),
            timeout_seconds: None,
        })
        .await;

    assert!(result.is_err());
    assert!(result.unwrap_err().to_string().contains("500"));

    mock.assert_async().await;
}

#[tokio::test]
async fn test_generate_timeout() {
    let mut server = mockito::Server::new_async().await;

    let _mock = server
        .mock("POST", "/api/generate")
        .with_status(200)
        .with_chunked_body(|w| {
            std::thread::sleep(std::time::Duration::from_secs(3));
            w.write_all(b"too late")
        })
        .create_async()
        .await;

    let backend = OllamaBackend::new(server.url());

    let result = backend
        .generate(GenerateRequest {
            model: "llama3.2".to_string(),
            prompt: "Test".to_string(),
            timeout_seconds: Some(1),
        })
        .await;

    assert!(result.is_err());
    assert!(result.unwrap_err().to_string().contains("timed out"));
}

#[tokio::test]
async fn test_list_models_with_mock() {
    let mut server = mockito::Server::new_async().await;

    let mock = server
        .mock("GET", "/api/tags")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{
                "models": [
                    {"name": "llama3.2", "size": 2019393189},
                    {"name": "mistral", "size": 4109016640}
                ]
            }"#,
        )
        .create_async()
        .await;

    let backend = OllamaBackend::new(server.url());

    let models = backend.list_models().await.unwrap();
    assert_eq!(models, vec!["llama3.2".to_string(), "mistral".to_string()]);

    mock.assert_async().await;
}

#[tokio::test]
async fn test_list_models_empty_response() {
    let mut server = mockito::Server::new_async().await;

    let mock = server
        .mock("GET", "/api/tags")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{}"#)
        .create_async()
        .await;

    let backend = OllamaBackend::new(server.url());

    let models = backend.list_models().await.unwrap();
    assert!(models.is_empty());

    mock.assert_async().await;
}
