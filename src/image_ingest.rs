//! Image Ingestion (spec §1, §2 SPEC_FULL supplement): the multipart
//! upload collaborator. Parses `model`, `messages` (a JSON string),
//! `stream`, and `files[]` into the same normalized message list the
//! standard JSON chat-completion path consumes, so one pipeline serves
//! both entry points.

use axum::extract::Multipart;
use base64::Engine;

use crate::error::AppError;
use crate::openai::{ChatMessage, ContentPart, ImageUrl, MessageContent};

pub struct IngestedRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub stream: bool,
}

pub async fn ingest(
    mut multipart: Multipart,
    max_upload_bytes: usize,
    allowed_mime: &[String],
) -> Result<IngestedRequest, AppError> {
    let mut model: Option<String> = None;
    let mut messages: Option<Vec<ChatMessage>> = None;
    let mut stream = false;
    let mut images: Vec<(String, Vec<u8>)> = Vec::new();
    let mut total_bytes: usize = 0;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::InvalidRequest(format!("malformed multipart body: {e}")))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "model" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::InvalidRequest(e.to_string()))?;
                model = Some(text);
            }
            "messages" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::InvalidRequest(e.to_string()))?;
                let parsed: Vec<ChatMessage> = serde_json::from_str(&text)
                    .map_err(|e| AppError::InvalidRequest(format!("invalid messages JSON: {e}")))?;
                messages = Some(parsed);
            }
            "stream" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::InvalidRequest(e.to_string()))?;
                stream = text.trim().eq_ignore_ascii_case("true") || text.trim() == "1";
            }
            "files" | "files[]" => {
                let content_type = field.content_type().unwrap_or("application/octet-stream").to_string();
                if !allowed_mime.iter().any(|mime| mime == &content_type) {
                    return Err(AppError::UnsupportedMediaType(content_type));
                }
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::InvalidRequest(e.to_string()))?;
                total_bytes += bytes.len();
                if total_bytes > max_upload_bytes {
                    return Err(AppError::UploadTooLarge);
                }
                images.push((content_type, bytes.to_vec()));
            }
            _ => {
                // Unknown fields are ignored — forward compatible with
                // clients that send extra metadata.
            }
        }
    }

    let model = model.ok_or_else(|| AppError::InvalidRequest("missing `model` field".to_string()))?;
    let mut messages = messages.ok_or_else(|| AppError::InvalidRequest("missing `messages` field".to_string()))?;

    if !images.is_empty() {
        let parts: Vec<ContentPart> = images
            .into_iter()
            .map(|(mime, bytes)| ContentPart::ImageUrl {
                image_url: ImageUrl {
                    url: format!("data:{mime};base64,{}", base64::engine::general_purpose::STANDARD.encode(bytes)),
                },
            })
            .collect();
        attach_images(&mut messages, parts);
    }

    Ok(IngestedRequest { model, messages, stream })
}

fn attach_images(messages: &mut Vec<ChatMessage>, images: Vec<ContentPart>) {
    if let Some(last) = messages.last_mut() {
        if last.role == "user" {
            let mut parts = match &last.content {
                MessageContent::Text(text) if !text.is_empty() => vec![ContentPart::Text { text: text.clone() }],
                MessageContent::Text(_) => Vec::new(),
                MessageContent::Parts(parts) => parts.clone(),
            };
            parts.extend(images);
            last.content = MessageContent::Parts(parts);
            return;
        }
    }
    messages.push(ChatMessage {
        role: "user".to_string(),
        content: MessageContent::Parts(images),
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attaching_images_to_a_plain_text_user_message_converts_it_to_parts() {
        let mut messages = vec![ChatMessage {
            role: "user".to_string(),
            content: MessageContent::Text("describe this".to_string()),
        }];
        attach_images(
            &mut messages,
            vec![ContentPart::ImageUrl {
                image_url: ImageUrl {
                    url: "data:image/png;base64,AAAA".to_string(),
                },
            }],
        );
        match &messages[0].content {
            MessageContent::Parts(parts) => {
                assert_eq!(parts.len(), 2);
            }
            MessageContent::Text(_) => panic!("expected parts after attaching images"),
        }
    }
}
