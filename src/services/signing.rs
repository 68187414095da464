//! 随机令牌与会话 cookie 签名

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// 令牌随机字节数
const TOKEN_BYTES: usize = 32;

/// 生成 URL 安全的随机令牌（32 字节熵）
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// 生成签名密钥
pub fn generate_secret_key() -> Vec<u8> {
    let mut key = vec![0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut key);
    key
}

fn signature(key: &[u8], value: &str) -> String {
    let mut mac =
        <HmacSha256 as Mac>::new_from_slice(key).expect("HMAC accepts keys of any length");
    mac.update(value.as_bytes());
    format!("{:x}", mac.finalize().into_bytes())
}

/// 生成 `<token>.<hex hmac>` 形式的 cookie 值
pub fn sign(key: &[u8], token: &str) -> String {
    format!("{}.{}", token, signature(key, token))
}

/// 校验 cookie 值，签名正确时返回其中的令牌
pub fn verify(key: &[u8], signed: &str) -> Option<String> {
    let (token, provided) = signed.rsplit_once('.')?;
    if token.is_empty() {
        return None;
    }
    let expected = signature(key, token);
    constant_time_eq(expected.as_bytes(), provided.as_bytes()).then(|| token.to_string())
}

/// 常量时间比较
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
