//! End-to-end test against a running step-preview server.
//!
//! Requires the server (and a working renderer, or a fake one on PATH as
//! CONVERTER_CMD) to be running. Run with:
//!
//!     cargo test --test e2e_test -- --ignored --nocapture
//!
//! Set API_BASE_URL to override the default (http://localhost:3345).

use std::time::Duration;

use base64::Engine;
use serde::Deserialize;
use tokio::time::sleep;

fn get_base_url() -> String {
    std::env::var("API_BASE_URL").unwrap_or_else(|_| "http://localhost:3345".to_string())
}

#[derive(Debug, Deserialize)]
struct Accepted {
    job_id: String,
    status: String,
}

#[derive(Debug, Deserialize)]
struct Finished {
    status: String,
    #[serde(default)]
    image: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[tokio::test]
#[ignore] // Requires a running server
async fn test_e2e_health_check() {
    let base_url = get_base_url();
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/health", base_url))
        .send()
        .await
        .expect("Health check failed");

    assert!(
        response.status().is_success(),
        "Health check returned non-success status: {}",
        response.status()
    );
}

#[tokio::test]
#[ignore] // Requires a running server and renderer
async fn test_e2e_step_conversion_round_trip() {
    let base_url = get_base_url();
    let client = reqwest::Client::new();

    // 1. Submit a minimal STEP payload
    let payload = "ISO-10303-21;\nHEADER;\nENDSEC;\nDATA;\nENDSEC;\nEND-ISO-10303-21;";
    let response = client
        .post(format!("{}/convert?width=640&height=480", base_url))
        .body(payload)
        .send()
        .await
        .expect("Submission failed");

    assert_eq!(response.status().as_u16(), 202);
    let accepted: Accepted = response.json().await.expect("Bad submission body");
    assert_eq!(accepted.status, "pending");
    println!("submitted job {}", accepted.job_id);

    // 2. Poll until terminal (conversion may legitimately take a while)
    for attempt in 0..120 {
        let response = client
            .get(format!(
                "{}/convert?item_id={}",
                base_url, accepted.job_id
            ))
            .send()
            .await
            .expect("Poll failed");

        match response.status().as_u16() {
            202 => {
                if attempt % 10 == 0 {
                    println!("  ... still in progress (attempt {attempt})");
                }
                sleep(Duration::from_millis(500)).await;
            }
            200 => {
                let finished: Finished = response.json().await.expect("Bad result body");
                assert_eq!(finished.status, "succeeded");
                let image = base64::engine::general_purpose::STANDARD
                    .decode(finished.image.expect("missing image"))
                    .expect("image is not valid base64");
                assert!(!image.is_empty());

                // 3. The id is consumed: polling again reports unknown
                let gone = client
                    .get(format!(
                        "{}/convert?item_id={}",
                        base_url, accepted.job_id
                    ))
                    .send()
                    .await
                    .expect("Second poll failed");
                assert_eq!(gone.status().as_u16(), 404);
                return;
            }
            code => {
                let finished: Finished = response.json().await.expect("Bad error body");
                panic!(
                    "job ended with status {code}: {:?}",
                    finished.error.unwrap_or_default()
                );
            }
        }
    }

    panic!("job did not complete within 60 seconds");
}

#[tokio::test]
#[ignore] // Requires a running server
async fn test_e2e_rejects_bad_signature() {
    let base_url = get_base_url();
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/convert", base_url))
        .body("definitely not a step file")
        .send()
        .await
        .expect("Submission failed");

    assert_eq!(response.status().as_u16(), 400);
}
