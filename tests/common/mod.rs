#![allow(dead_code)]

use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, Stream, dictionary};
use pdfqa::config::{Config, EmbeddingProvider};
use std::path::Path;

/// Build an in-memory PDF with one page per entry; `None` produces a page without text.
pub fn pdf_with_pages(pages: &[Option<&str>]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::new();
    for page in pages {
        let operations = match page {
            Some(text) => vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![72.into(), 720.into()]),
                Operation::new("Tj", vec![Object::string_literal(*text)]),
                Operation::new("ET", vec![]),
            ],
            None => Vec::new(),
        };
        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            content.encode().expect("encode content"),
        ));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("serialize pdf");
    bytes
}

/// Configuration rooted in `root` talking to a Gemini API at `base_url`.
pub fn config(root: &Path, base_url: &str) -> Config {
    Config {
        google_api_key: Some("test-key".into()),
        gemini_api_base_url: base_url.to_string(),
        embedding_provider: EmbeddingProvider::Gemini,
        embedding_model: "models/embedding-001".into(),
        embedding_dimension: 3,
        chat_model: "gemini-2.0-flash".into(),
        chat_temperature: 0.3,
        text_splitter_chunk_size: 10_000,
        text_splitter_chunk_overlap: 2_000,
        embedding_batch_size: 10,
        embedding_batch_delay_ms: 0,
        search_top_k: 4,
        upload_dir: root.join("uploads"),
        vector_store_dir: root.join("vector_store").join("index"),
        static_dir: root.join("static"),
        max_upload_mb: 20,
        max_request_mb: 25,
        server_port: None,
    }
}

pub const BOUNDARY: &str = "pdfqa-integration-boundary";

/// Encode `files` as repeated `files` parts of a multipart body.
pub fn multipart_files(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, bytes) in files {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"files\"; filename=\"{name}\"\r\nContent-Type: application/pdf\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}
