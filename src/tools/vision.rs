use std::path::Path;

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};

use super::{Param, Tool, ToolArgs, ToolError, Workspace, required_str};
use crate::llm::{ChatMessage, ContentPart, ImageUrl, LlmClient};

pub struct AnalyzeImage {
    client: LlmClient,
    workspace: Workspace,
}

impl AnalyzeImage {
    pub fn new(client: LlmClient, workspace: Workspace) -> Self {
        Self { client, workspace }
    }
}

fn mime_type(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        "bmp" => Some("image/bmp"),
        _ => None,
    }
}

pub(crate) fn data_uri(path: &Path, bytes: &[u8]) -> Result<String, ToolError> {
    let mime = mime_type(path).ok_or_else(|| {
        ToolError::Vision(format!("unsupported image format: {}", path.display()))
    })?;
    Ok(format!("data:{mime};base64,{}", BASE64.encode(bytes)))
}

#[async_trait]
impl Tool for AnalyzeImage {
    fn name(&self) -> &'static str {
        "analyze_image"
    }

    fn description(&self) -> &'static str {
        "Analyzes an image and answers a question about it. Use this to understand UI mockups, diagrams, or other visual information."
    }

    fn params(&self) -> &'static [Param] {
        &[
            Param {
                name: "image_path",
                description: "Path of the image file",
            },
            Param {
                name: "prompt",
                description: "Question to answer about the image",
            },
        ]
    }

    async fn call(&self, args: &ToolArgs) -> Result<String, ToolError> {
        let image_path = required_str(args, "image_path")?;
        let prompt = required_str(args, "prompt")?;
        tracing::info!(%image_path, "analyzing image");

        let path = self.workspace.resolve(image_path);
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| ToolError::Vision(e.to_string()))?;
        let url = data_uri(&path, &bytes)?;

        let message = ChatMessage::user_parts(vec![
            ContentPart::Text {
                text: prompt.to_string(),
            },
            ContentPart::ImageUrl {
                image_url: ImageUrl { url },
            },
        ]);
        Ok(self.client.chat_text(&[message]).await?)
    }
}
