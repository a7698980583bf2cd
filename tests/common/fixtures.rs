//! Documents and image bytes used by the end-to-end tests

use std::path::Path;

/// A publishable note with one embedded image, a cover, and two topics
pub const ARTICLE: &str = r#"---
tags:
  - zhihu
  - rust
title: Borrowing without tears
topics:
  - Rust
  - 编程
cover: "[[cover.png]]"
---

# Borrowing

A reference must never outlive its referent.
The checker proves it at compile time.

![[diagram.png|Lifetimes of two borrows]]

Inline math $a^2$ works too.
"#;

/// PNG-signed bytes; `seed` varies the content hash
pub fn png(seed: u8) -> Vec<u8> {
    let mut bytes = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
    bytes.extend_from_slice(&[0, 0, 0, 13, b'I', b'H', b'D', b'R']);
    bytes.extend(std::iter::repeat_n(seed, 64));
    bytes
}

/// MD5 hex of `bytes`
pub fn md5_hex(bytes: &[u8]) -> String {
    format!("{:x}", md5::compute(bytes))
}

/// Write `bytes` to `vault/name`, creating directories as needed
pub fn write_vault_file(vault: &Path, name: &str, bytes: &[u8]) {
    let path = vault.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("Failed to create vault directory");
    }
    std::fs::write(path, bytes).expect("Failed to write vault file");
}

/// Populate a vault with [`ARTICLE`] and its two images
pub fn write_article_vault(vault: &Path) -> (Vec<u8>, Vec<u8>) {
    let cover = png(1);
    let diagram = png(2);
    write_vault_file(vault, "notes/borrowing.md", ARTICLE.as_bytes());
    write_vault_file(vault, "attachments/cover.png", &cover);
    write_vault_file(vault, "attachments/diagram.png", &diagram);
    (cover, diagram)
}
