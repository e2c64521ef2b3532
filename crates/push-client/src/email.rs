//! 邮箱哈希
//!
//! 只上传哈希值，不上传邮箱原文。

use md5::Md5;
use push_shared::error::{PushError, Result};
use sha1::{Digest, Sha1};

use crate::backend::EmailHashes;

/// 规范化邮箱：去掉首尾空白并转为小写
pub fn normalize_email(email: &str) -> Result<String> {
    let normalized = email.trim().to_lowercase();
    let valid = match normalized.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && !domain.is_empty() && !domain.contains('@')
        }
        None => false,
    };
    if !valid || normalized.chars().any(char::is_whitespace) {
        return Err(PushError::malformed(format!("无效的邮箱地址: {email}")));
    }
    Ok(normalized)
}

/// 计算规范化后邮箱的 MD5 与 SHA-1（小写十六进制）
pub fn hash_email(email: &str) -> Result<EmailHashes> {
    let normalized = normalize_email(email)?;
    Ok(EmailHashes {
        md5: format!("{:x}", Md5::digest(normalized.as_bytes())),
        sha1: format!("{:x}", Sha1::digest(normalized.as_bytes())),
    })
}
