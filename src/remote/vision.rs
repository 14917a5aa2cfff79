//! Vision analysis client

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::AnalysisConfig;
use crate::device::CapturedFrame;
use crate::remote::{SceneAnalysis, VisionAnalyzer};
use crate::{Error, Result};

/// Response envelope from the vision endpoint
#[derive(Debug, Deserialize)]
struct AnalyzeResponse {
    analysis: SceneAnalysis,
}

/// Client for the `/vision/analyze` endpoint
pub struct VisionClient {
    client: reqwest::Client,
    base_url: String,
}

impl VisionClient {
    /// Create a client against the given base URL
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl VisionAnalyzer for VisionClient {
    async fn analyze(
        &self,
        frame: CapturedFrame,
        analysis: &AnalysisConfig,
    ) -> Result<SceneAnalysis> {
        tracing::debug!(
            frame_bytes = frame.data.len(),
            width = frame.width,
            height = frame.height,
            "submitting frame for analysis"
        );

        let focus_areas = serde_json::to_string(&analysis.focus_areas)?;
        let form = reqwest::multipart::Form::new()
            .part(
                "image",
                reqwest::multipart::Part::bytes(frame.data)
                    .file_name(frame.format.file_name())
                    .mime_str(frame.format.mime())
                    .map_err(|e| Error::Vision(e.to_string()))?,
            )
            .text("analysisType", analysis.analysis_type.clone())
            .text("focusAreas", focus_areas);

        let response = self
            .client
            .post(format!("{}/vision/analyze", self.base_url))
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "vision request failed");
                e
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "vision API error");
            return Err(Error::Vision(format!("vision API error {status}: {body}")));
        }

        let result: AnalyzeResponse = response.json().await.map_err(|e| {
            tracing::error!(error = %e, "failed to parse vision response");
            e
        })?;

        tracing::debug!(summary = %result.analysis.summary, "frame analyzed");
        Ok(result.analysis)
    }
}
