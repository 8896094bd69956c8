//! Attachment pre-processing: synthesizing text/URL/image messages ahead of
//! the final user turn, and compacting consecutive same-role messages.

use crate::protocol::{Attachment, ProtocolMessage, QueryRequest, Role};

const TEXT_ATTACHMENT_TEMPLATE: &str = "Your response must be in the language of the relevant queries related to the document.\nBelow is the content of {name}:\n\n{content}";

const URL_ATTACHMENT_TEMPLATE: &str = "Assume you can access the external URL {name}. Your response must be in the language of the relevant queries related to the URL.\nUse the URL's content below to respond to the queries:\n\n{content}";

const IMAGE_VISION_ATTACHMENT_TEMPLATE: &str = "I have uploaded an image ({name}). Assume that you can see the attached image. First, read the image analysis:\n\n<image_analysis>{content}</image_analysis>\n\nUse any relevant parts to inform your response. Do NOT reference the image analysis in your response. Respond in the same language as my next message. ";

fn render(template: &str, name: &str, content: &str) -> String {
    template.replace("{name}", name).replace("{content}", content)
}

enum AttachmentKind {
    Text,
    Url,
    Image,
    Skip,
}

fn classify(content_type: &str) -> AttachmentKind {
    if content_type == "text/html" {
        AttachmentKind::Url
    } else if content_type.starts_with("text/") || content_type == "application/pdf" {
        AttachmentKind::Text
    } else if content_type.starts_with("image/") {
        AttachmentKind::Image
    } else {
        AttachmentKind::Skip
    }
}

/// Split an image attachment's `parsed_content` on the first `***`
/// delimiter into `(filename, description)`. Falls back to the attachment's
/// own name and the full parsed content when the delimiter is absent.
fn split_image_parsed_content<'a>(attachment: &'a Attachment, parsed: &'a str) -> (&'a str, &'a str) {
    match parsed.split_once("***") {
        Some((name, description)) => (name, description),
        None => (attachment.name.as_str(), parsed),
    }
}

/// Rewrite `request` by inserting synthesized messages for every attachment
/// on the last message that carries non-empty `parsed_content`. Text/URL
/// attachments come first (in attachment order), then image attachments,
/// then the original last message, unmodified.
pub fn insert_attachment_messages(request: &QueryRequest) -> QueryRequest {
    let mut request = request.clone();
    let Some(last) = request.query.last().cloned() else {
        return request;
    };
    if last.attachments.is_empty() {
        return request;
    }

    let mut text_and_url = Vec::new();
    let mut images = Vec::new();

    for attachment in &last.attachments {
        let Some(parsed) = attachment.parsed_content.as_deref() else {
            continue;
        };
        if parsed.is_empty() {
            continue;
        }
        match classify(&attachment.content_type) {
            AttachmentKind::Text => {
                let rendered = render(TEXT_ATTACHMENT_TEMPLATE, &attachment.name, parsed);
                text_and_url.push(ProtocolMessage::new(Role::User, rendered));
            }
            AttachmentKind::Url => {
                let rendered = render(URL_ATTACHMENT_TEMPLATE, &attachment.name, parsed);
                text_and_url.push(ProtocolMessage::new(Role::User, rendered));
            }
            AttachmentKind::Image => {
                let (name, description) = split_image_parsed_content(attachment, parsed);
                let rendered = render(IMAGE_VISION_ATTACHMENT_TEMPLATE, name, description);
                images.push(ProtocolMessage::new(Role::User, rendered));
            }
            AttachmentKind::Skip => {}
        }
    }

    if text_and_url.is_empty() && images.is_empty() {
        return request;
    }

    let insert_at = request.query.len() - 1;
    let mut rewritten = request.query[..insert_at].to_vec();
    rewritten.extend(text_and_url);
    rewritten.extend(images);
    rewritten.push(last);
    request.query = rewritten;
    request
}

/// Legacy path: fold each attachment's rendered template directly into the
/// last message's own content instead of inserting sibling messages.
/// Deprecated; kept only for bots pinned to the old behavior via config.
pub fn concatenate_attachment_text(request: &QueryRequest) -> QueryRequest {
    let mut request = request.clone();
    let Some(last) = request.query.last().cloned() else {
        return request;
    };
    if last.attachments.is_empty() {
        return request;
    }

    let mut prefix = String::new();
    for attachment in &last.attachments {
        let Some(parsed) = attachment.parsed_content.as_deref() else {
            continue;
        };
        if parsed.is_empty() {
            continue;
        }
        let rendered = match classify(&attachment.content_type) {
            AttachmentKind::Text => render(TEXT_ATTACHMENT_TEMPLATE, &attachment.name, parsed),
            AttachmentKind::Url => render(URL_ATTACHMENT_TEMPLATE, &attachment.name, parsed),
            AttachmentKind::Image => {
                let (name, description) = split_image_parsed_content(attachment, parsed);
                render(IMAGE_VISION_ATTACHMENT_TEMPLATE, name, description)
            }
            AttachmentKind::Skip => continue,
        };
        prefix.push_str(&rendered);
        prefix.push_str("\n\n");
    }
    if prefix.is_empty() {
        return request;
    }

    let mut merged = last.clone();
    merged.content = format!("{prefix}{}", last.content);
    let insert_at = request.query.len() - 1;
    let mut rewritten = request.query[..insert_at].to_vec();
    rewritten.push(merged);
    request.query = rewritten;
    request
}

/// Merge consecutive same-role messages: concatenate contents with a blank
/// line, and union attachments by URL (earliest occurrence wins). Applying
/// this twice is a no-op.
pub fn compact_role_alternation(messages: &[ProtocolMessage]) -> Vec<ProtocolMessage> {
    let mut out: Vec<ProtocolMessage> = Vec::with_capacity(messages.len());
    for message in messages {
        match out.last_mut() {
            Some(prev) if prev.role == message.role => {
                prev.content = format!("{}\n\n{}", prev.content, message.content);
                let mut seen: Vec<&str> = prev.attachments.iter().map(|a| a.url.as_str()).collect();
                for attachment in &message.attachments {
                    if !seen.contains(&attachment.url.as_str()) {
                        seen.push(&attachment.url);
                        prev.attachments.push(attachment.clone());
                    }
                }
            }
            _ => out.push(message.clone()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attachment(content_type: &str, name: &str, parsed: &str) -> Attachment {
        Attachment {
            url: format!("https://x/{name}"),
            content_type: content_type.to_string(),
            name: name.to_string(),
            inline_ref: None,
            parsed_content: Some(parsed.to_string()),
        }
    }

    #[test]
    fn text_attachment_inserts_message_before_original() {
        let mut request = QueryRequest::from_messages(vec![ProtocolMessage::new(Role::User, "summarize")]);
        request.query[0].attachments = vec![attachment("text/plain", "doc.txt", "contents here")];
        let rewritten = insert_attachment_messages(&request);
        assert_eq!(rewritten.query.len(), 2);
        assert!(rewritten.query[0].content.contains("doc.txt"));
        assert_eq!(rewritten.query[1].content, "summarize");
    }

    #[test]
    fn image_messages_come_after_text_and_url_messages() {
        let mut request = QueryRequest::from_messages(vec![ProtocolMessage::new(Role::User, "look")]);
        request.query[0].attachments = vec![
            attachment("image/png", "pic.png", "pic.png***a cat"),
            attachment("text/plain", "doc.txt", "body"),
        ];
        let rewritten = insert_attachment_messages(&request);
        assert_eq!(rewritten.query.len(), 3);
        assert!(rewritten.query[0].content.contains("doc.txt"));
        assert!(rewritten.query[1].content.contains("image_analysis"));
        assert_eq!(rewritten.query[2].content, "look");
    }

    #[test]
    fn image_without_delimiter_uses_attachment_name() {
        let attachment_value = attachment("image/jpeg", "photo.jpg", "a sunset");
        let (name, desc) = split_image_parsed_content(&attachment_value, "a sunset");
        assert_eq!(name, "photo.jpg");
        assert_eq!(desc, "a sunset");
    }

    #[test]
    fn empty_parsed_content_is_skipped() {
        let mut request = QueryRequest::from_messages(vec![ProtocolMessage::new(Role::User, "hi")]);
        request.query[0].attachments = vec![attachment("text/plain", "doc.txt", "")];
        let rewritten = insert_attachment_messages(&request);
        assert_eq!(rewritten.query.len(), 1);
    }

    #[test]
    fn role_alternation_merges_consecutive_same_role() {
        let messages = vec![
            ProtocolMessage::new(Role::User, "a"),
            ProtocolMessage::new(Role::User, "b"),
            ProtocolMessage::new(Role::Bot, "c"),
        ];
        let compacted = compact_role_alternation(&messages);
        assert_eq!(compacted.len(), 2);
        assert_eq!(compacted[0].content, "a\n\nb");
    }

    #[test]
    fn role_alternation_is_idempotent() {
        let messages = vec![
            ProtocolMessage::new(Role::User, "a"),
            ProtocolMessage::new(Role::User, "b"),
        ];
        let once = compact_role_alternation(&messages);
        let twice = compact_role_alternation(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn role_alternation_unions_attachments_by_url() {
        let mut first = ProtocolMessage::new(Role::User, "a");
        first.attachments = vec![attachment("text/plain", "one.txt", "x")];
        let mut second = ProtocolMessage::new(Role::User, "b");
        second.attachments = vec![
            attachment("text/plain", "one.txt", "x"),
            attachment("text/plain", "two.txt", "y"),
        ];
        let compacted = compact_role_alternation(&[first, second]);
        assert_eq!(compacted[0].attachments.len(), 2);
    }
}
