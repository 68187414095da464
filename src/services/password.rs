//! 管理员密码哈希
//!
//! 存储格式 `pbkdf2:sha256:<iterations>$<salt>$<hex>`，与面板安装脚本生成的哈希兼容。
//! 校验时也接受安装脚本的 `scrypt:<n>:<r>:<p>$<salt>$<hex>` 格式，
//! 以及早期版本的无盐 SHA-256 十六进制摘要，但这两种都不再生成

use rand::distributions::Alphanumeric;
use rand::Rng;
use sha2::{Digest, Sha256};

use super::signing::constant_time_eq;

/// 新哈希使用的迭代次数
pub const DEFAULT_ITERATIONS: u32 = 600_000;

const SALT_LEN: usize = 16;

/// PBKDF2-SHA256 输出长度
const PBKDF2_LEN: usize = 32;

/// scrypt 输出长度
const SCRYPT_LEN: usize = 64;

/// scrypt 参数上限，防止配置中的哈希耗尽内存
const SCRYPT_MAX_LOG_N: u32 = 20;
const SCRYPT_MAX_RP: u32 = 64;

/// 生成加盐哈希
pub fn hash_password(password: &str) -> String {
    hash_password_with(password, DEFAULT_ITERATIONS)
}

/// 指定迭代次数生成加盐哈希
pub fn hash_password_with(password: &str, iterations: u32) -> String {
    let salt: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SALT_LEN)
        .map(char::from)
        .collect();
    let digest = pbkdf2_sha256(password.as_bytes(), salt.as_bytes(), iterations);
    format!("pbkdf2:sha256:{}${}${}", iterations, salt, hex(&digest))
}

/// 校验密码；格式无法识别时返回 false
pub fn verify_password(password: &str, stored: &str) -> bool {
    let stored = stored.trim();

    if let Some((method, rest)) = stored.split_once('$') {
        let Some((salt, expected)) = rest.split_once('$') else {
            return false;
        };
        let actual = match HashMethod::parse(method) {
            Some(HashMethod::Pbkdf2 { iterations }) => {
                pbkdf2_sha256(password.as_bytes(), salt.as_bytes(), iterations).to_vec()
            }
            Some(HashMethod::Scrypt { log_n, r, p }) => {
                match scrypt_digest(password.as_bytes(), salt.as_bytes(), log_n, r, p) {
                    Some(digest) => digest,
                    None => return false,
                }
            }
            None => {
                tracing::warn!(method = %method, "Unsupported password hash method");
                return false;
            }
        };
        return constant_time_eq(hex(&actual).as_bytes(), expected.as_bytes());
    }

    if stored.len() == 64 && stored.chars().all(|c| c.is_ascii_hexdigit()) {
        let digest = hex(&Sha256::digest(password.as_bytes()));
        return constant_time_eq(digest.as_bytes(), stored.to_ascii_lowercase().as_bytes());
    }

    false
}

/// 哈希方法前缀
#[derive(Debug, PartialEq)]
enum HashMethod {
    Pbkdf2 { iterations: u32 },
    Scrypt { log_n: u8, r: u32, p: u32 },
}

impl HashMethod {
    /// 解析 `pbkdf2:sha256[:iterations]` 或 `scrypt[:n:r:p]`
    fn parse(method: &str) -> Option<Self> {
        let mut parts = method.split(':');
        let parsed = match parts.next()? {
            "pbkdf2" => {
                if parts.next()? != "sha256" {
                    return None;
                }
                let iterations = match parts.next() {
                    Some(n) => n.parse().ok().filter(|n| *n > 0)?,
                    None => DEFAULT_ITERATIONS,
                };
                Self::Pbkdf2 { iterations }
            }
            "scrypt" => {
                let (n, r, p) = match parts.next() {
                    Some(n) => (
                        n.parse::<u64>().ok()?,
                        parts.next()?.parse::<u32>().ok()?,
                        parts.next()?.parse::<u32>().ok()?,
                    ),
                    None => (32768, 8, 1),
                };
                if !n.is_power_of_two() || n < 2 {
                    return None;
                }
                let log_n = n.trailing_zeros();
                if log_n > SCRYPT_MAX_LOG_N || r == 0 || p == 0 || r.saturating_mul(p) > SCRYPT_MAX_RP {
                    return None;
                }
                Self::Scrypt {
                    log_n: log_n as u8,
                    r,
                    p,
                }
            }
            _ => return None,
        };
        parts.next().is_none().then_some(parsed)
    }
}

/// PBKDF2-HMAC-SHA256，输出 32 字节
fn pbkdf2_sha256(password: &[u8], salt: &[u8], iterations: u32) -> [u8; PBKDF2_LEN] {
    let mut out = [0u8; PBKDF2_LEN];
    pbkdf2::pbkdf2_hmac::<Sha256>(password, salt, iterations, &mut out);
    out
}

/// scrypt，输出 64 字节；参数不被接受时返回 None
fn scrypt_digest(password: &[u8], salt: &[u8], log_n: u8, r: u32, p: u32) -> Option<Vec<u8>> {
    let params = match scrypt::Params::new(log_n, r, p, SCRYPT_LEN) {
        Ok(params) => params,
        Err(e) => {
            tracing::warn!(error = %e, "Rejected scrypt parameters");
            return None;
        }
    };
    let mut out = vec![0u8; SCRYPT_LEN];
    scrypt::scrypt(password, salt, &params, &mut out).ok()?;
    Some(out)
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
