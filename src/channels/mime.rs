//! MIME message assembly for outgoing campaign email

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, Utc};
use std::path::Path;

const LINE_WIDTH: usize = 76;

/// A file attached to an email
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// Name shown to the recipient
    pub filename: String,
    /// MIME content type
    pub content_type: String,
    /// Raw file contents
    pub data: Vec<u8>,
}

impl Attachment {
    /// Read an attachment from disk, guessing its content type from the extension
    pub async fn from_path(path: &Path) -> std::io::Result<Self> {
        let data = tokio::fs::read(path).await?;
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("attachment")
            .to_string();
        Ok(Self {
            filename,
            content_type: guess_content_type(path).to_string(),
            data,
        })
    }
}

/// An outgoing email ready to be serialized for DATA
#[derive(Debug, Clone)]
pub struct EmailMessage<'a> {
    pub from_name: &'a str,
    pub from_address: &'a str,
    pub to: &'a str,
    pub subject: &'a str,
    pub text_body: &'a str,
    pub html_body: Option<&'a str>,
    pub attachments: &'a [Attachment],
    pub date: DateTime<Utc>,
    pub message_id: String,
}

impl EmailMessage<'_> {
    /// Serialize to an RFC 5322 message with CRLF line endings
    ///
    /// Layout: a bare text part, `multipart/alternative` when an HTML body is
    /// present, wrapped in `multipart/mixed` when there are attachments.
    pub fn render(&self) -> String {
        let mut out = String::with_capacity(self.text_body.len() * 2 + 1024);
        push_header(
            &mut out,
            "From",
            &format!("{} <{}>", encode_display_name(self.from_name), self.from_address),
        );
        push_header(&mut out, "To", self.to);
        push_header(&mut out, "Subject", &encode_header_word(self.subject));
        push_header(&mut out, "Date", &self.date.to_rfc2822());
        push_header(&mut out, "Message-ID", &self.message_id);
        push_header(&mut out, "MIME-Version", "1.0");

        if self.attachments.is_empty() {
            out.push_str(&self.body_part());
            return out;
        }

        let boundary = boundary("mixed");
        push_header(
            &mut out,
            "Content-Type",
            &format!("multipart/mixed; boundary=\"{boundary}\""),
        );
        out.push_str("\r\n");
        out.push_str(&format!("--{boundary}\r\n"));
        out.push_str(&self.body_part());
        out.push_str("\r\n");
        for attachment in self.attachments {
            out.push_str(&format!("--{boundary}\r\n"));
            out.push_str(&attachment_part(attachment));
            out.push_str("\r\n");
        }
        out.push_str(&format!("--{boundary}--\r\n"));
        out
    }

    /// Headers plus content of the text (or text+HTML) portion
    fn body_part(&self) -> String {
        match self.html_body {
            None => text_part("text/plain", self.text_body),
            Some(html) => {
                let boundary = boundary("alt");
                let mut part = String::new();
                push_header(
                    &mut part,
                    "Content-Type",
                    &format!("multipart/alternative; boundary=\"{boundary}\""),
                );
                part.push_str("\r\n");
                part.push_str(&format!("--{boundary}\r\n"));
                part.push_str(&text_part("text/plain", self.text_body));
                part.push_str(&format!("\r\n--{boundary}\r\n"));
                part.push_str(&text_part("text/html", html));
                part.push_str(&format!("\r\n--{boundary}--\r\n"));
                part
            }
        }
    }
}

fn push_header(out: &mut String, name: &str, value: &str) {
    out.push_str(name);
    out.push_str(": ");
    out.push_str(value);
    out.push_str("\r\n");
}

fn boundary(kind: &str) -> String {
    format!("=_{kind}_{}", uuid::Uuid::new_v4().simple())
}

fn text_part(content_type: &str, body: &str) -> String {
    let body = normalize_newlines(body);
    if body.is_ascii() {
        format!("Content-Type: {content_type}; charset=utf-8\r\nContent-Transfer-Encoding: 7bit\r\n\r\n{body}")
    } else {
        format!(
            "Content-Type: {content_type}; charset=utf-8\r\nContent-Transfer-Encoding: base64\r\n\r\n{}",
            wrap_base64(body.as_bytes())
        )
    }
}

fn attachment_part(attachment: &Attachment) -> String {
    let name = attachment.filename.replace('"', "");
    format!(
        "Content-Type: {}; name=\"{name}\"\r\nContent-Transfer-Encoding: base64\r\nContent-Disposition: attachment; filename=\"{name}\"\r\n\r\n{}",
        attachment.content_type,
        wrap_base64(&attachment.data)
    )
}

/// Base64 with CRLF breaks every 76 columns
pub(crate) fn wrap_base64(data: &[u8]) -> String {
    let encoded = BASE64.encode(data);
    let mut out = String::with_capacity(encoded.len() + encoded.len() / LINE_WIDTH * 2);
    for (i, chunk) in encoded.as_bytes().chunks(LINE_WIDTH).enumerate() {
        if i > 0 {
            out.push_str("\r\n");
        }
        // base64 output is ASCII
        out.push_str(std::str::from_utf8(chunk).unwrap_or_default());
    }
    out
}

/// RFC 2047 encoded-word for non-ASCII header text
pub(crate) fn encode_header_word(value: &str) -> String {
    let value = value.replace(['\r', '\n'], " ");
    if value.is_ascii() {
        value
    } else {
        format!("=?utf-8?B?{}?=", BASE64.encode(value.as_bytes()))
    }
}

fn encode_display_name(name: &str) -> String {
    let name = name.replace(['\r', '\n'], " ");
    if name.is_ascii() {
        format!("\"{}\"", name.replace('"', "'"))
    } else {
        encode_header_word(&name)
    }
}

fn normalize_newlines(body: &str) -> String {
    body.replace("\r\n", "\n").replace('\n', "\r\n")
}

fn guess_content_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "txt" => "text/plain",
        "csv" => "text/csv",
        "html" | "htm" => "text/html",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "zip" => "application/zip",
        _ => "application/octet-stream",
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn message<'a>(html: Option<&'a str>, attachments: &'a [Attachment]) -> EmailMessage<'a> {
        EmailMessage {
            from_name: "Campaign Central",
            from_address: "outreach@example.com",
            to: "vendor@example.com",
            subject: "Quarterly survey",
            text_body: "Hello\nWorld",
            html_body: html,
            attachments,
            date: Utc::now(),
            message_id: "<id@example.com>".to_string(),
        }
    }

    #[test]
    fn plain_message_has_single_text_part() {
        let rendered = message(None, &[]).render();
        assert!(rendered.contains("From: \"Campaign Central\" <outreach@example.com>\r\n"));
        assert!(rendered.contains("Subject: Quarterly survey\r\n"));
        assert!(rendered.contains("Content-Type: text/plain; charset=utf-8\r\n"));
        assert!(rendered.ends_with("Hello\r\nWorld"));
        assert!(!rendered.contains("multipart"));
    }

    #[test]
    fn html_body_produces_alternative_parts() {
        let rendered = message(Some("<p>Hello</p>"), &[]).render();
        assert!(rendered.contains("multipart/alternative"));
        assert!(rendered.contains("Content-Type: text/html; charset=utf-8"));
        assert!(!rendered.contains("multipart/mixed"));
    }

    #[test]
    fn attachments_wrap_body_in_mixed_part() {
        let attachments = [Attachment {
            filename: "rfq.pdf".into(),
            content_type: "application/pdf".into(),
            data: vec![0u8; 200],
        }];
        let rendered = message(Some("<p>Hi</p>"), &attachments).render();
        assert!(rendered.contains("multipart/mixed"));
        assert!(rendered.contains("multipart/alternative"));
        assert!(rendered.contains("Content-Disposition: attachment; filename=\"rfq.pdf\""));
        assert!(rendered.trim_end().ends_with("--"));
    }

    #[test]
    fn base64_lines_are_76_columns() {
        let wrapped = wrap_base64(&[7u8; 300]);
        let lines: Vec<_> = wrapped.split("\r\n").collect();
        assert!(lines.len() > 1);
        assert!(lines[..lines.len() - 1].iter().all(|l| l.len() == 76));
        assert!(lines.last().unwrap().len() <= 76);
    }

    #[test]
    fn non_ascii_subject_is_encoded() {
        assert_eq!(encode_header_word("Plain"), "Plain");
        let encoded = encode_header_word("Namaste \u{0928}\u{092e}");
        assert!(encoded.starts_with("=?utf-8?B?") && encoded.ends_with("?="));
    }

    #[test]
    fn content_type_follows_extension() {
        assert_eq!(guess_content_type(Path::new("a/B.PDF")), "application/pdf");
        assert_eq!(guess_content_type(Path::new("noext")), "application/octet-stream");
    }

    #[tokio::test]
    async fn attachment_reads_file_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("terms.txt");
        tokio::fs::write(&path, b"net 30").await.unwrap();
        let attachment = Attachment::from_path(&path).await.unwrap();
        assert_eq!(attachment.filename, "terms.txt");
        assert_eq!(attachment.content_type, "text/plain");
        assert_eq!(attachment.data, b"net 30");
    }
}
