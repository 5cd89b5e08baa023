use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use memo_api::security::{AuthError, Result};
use qrcode::render::svg;
use qrcode::QrCode;
use sha2::{Digest, Sha256};
use std::time::{SystemTime, UNIX_EPOCH};
use totp_lite::{totp_custom, Sha512};

/// TOTP时间步长（秒）
pub const TOTP_STEP: u64 = 30;
/// TOTP代码位数
pub const TOTP_DIGITS: u32 = 6;

/// TOTP认证服务trait
///
/// 算法参数（SHA-512、6位、30秒步长）在注册与验证之间必须保持
/// 一致，否则认证器生成的代码永远对不上。
pub trait TotpAuthService: Send + Sync {
    /// 按当前时间验证TOTP代码，仅精确匹配当前时间步
    fn validate_totp(&self, raw_secret: &str, code: &str) -> bool;

    /// 按指定时间戳验证TOTP代码（测试用注入时间）
    fn validate_totp_at(&self, raw_secret: &str, code: &str, timestamp: u64) -> bool;

    /// 生成TOTP密钥（256位随机，Base32编码）
    fn generate_totp_secret(&self) -> String;

    /// 生成标准认证器应用可识别的配对URI
    fn provisioning_uri(&self, raw_secret: &str, account: &str) -> String;

    /// 将配对URI渲染为可扫描的SVG二维码
    fn provisioning_qr_svg(&self, uri: &str) -> Result<String>;

    /// 加密密钥（存储用）
    fn encrypt_secret(&self, raw_secret: &str) -> Result<String>;

    /// 解密密钥
    fn decrypt_secret(&self, encrypted_secret: &str) -> Result<String>;
}

/// 默认TOTP认证服务实现
///
/// 密钥静态加密：AES-256-GCM，密钥从配置的加密口令经SHA-256派生，
/// 存储格式为Hex编码的 nonce(12字节) + ciphertext。
pub struct DefaultTotpAuthService {
    cipher: Aes256Gcm,
    issuer: String,
}

impl DefaultTotpAuthService {
    pub fn new(encryption_key: &str, issuer: String) -> Self {
        // 从encryption_key派生AES-256密钥（32字节）
        let mut hasher = Sha256::new();
        hasher.update(encryption_key.as_bytes());
        let key_bytes = hasher.finalize();

        let cipher = Aes256Gcm::new_from_slice(&key_bytes)
            .expect("SHA-256 digest is always a valid AES-256 key");

        Self { cipher, issuer }
    }

    fn now() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }

    /// AES-GCM加密实现
    fn encrypt_internal(&self, data: &str) -> Result<String> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

        let ciphertext = self
            .cipher
            .encrypt(&nonce, data.as_bytes())
            .map_err(|e| AuthError::Internal(format!("Encryption failed: {}", e)))?;

        // nonce(12字节) + ciphertext
        let mut encrypted_data = Vec::with_capacity(12 + ciphertext.len());
        encrypted_data.extend_from_slice(&nonce);
        encrypted_data.extend_from_slice(&ciphertext);

        Ok(hex::encode(encrypted_data))
    }

    /// AES-GCM解密实现
    fn decrypt_internal(&self, encrypted: &str) -> Result<String> {
        let encrypted_data = hex::decode(encrypted)
            .map_err(|e| AuthError::Internal(format!("Invalid hex encoding: {}", e)))?;

        if encrypted_data.len() < 12 {
            return Err(AuthError::Internal("Encrypted data too short".to_string()));
        }

        let nonce = Nonce::from_slice(&encrypted_data[..12]);
        let ciphertext = &encrypted_data[12..];

        let plaintext = self
            .cipher
            .decrypt(nonce, ciphertext)
            .map_err(|e| AuthError::Internal(format!("Decryption failed: {}", e)))?;

        String::from_utf8(plaintext)
            .map_err(|e| AuthError::Internal(format!("Invalid UTF-8: {}", e)))
    }
}

impl TotpAuthService for DefaultTotpAuthService {
    fn validate_totp(&self, raw_secret: &str, code: &str) -> bool {
        self.validate_totp_at(raw_secret, code, Self::now())
    }

    fn validate_totp_at(&self, raw_secret: &str, code: &str, timestamp: u64) -> bool {
        let secret_bytes =
            match base32::decode(base32::Alphabet::RFC4648 { padding: false }, raw_secret) {
                Some(bytes) => bytes,
                None => return false,
            };

        // 仅当前时间步，不加额外容差窗口
        let expected = totp_custom::<Sha512>(TOTP_STEP, TOTP_DIGITS, &secret_bytes, timestamp);
        expected == code.trim()
    }

    fn generate_totp_secret(&self) -> String {
        // 256位随机密钥，Base32编码
        use rand::Rng;
        let mut rng = rand::thread_rng();
        let mut secret = vec![0u8; 32];
        rng.fill(&mut secret[..]);

        base32::encode(base32::Alphabet::RFC4648 { padding: false }, &secret)
    }

    fn provisioning_uri(&self, raw_secret: &str, account: &str) -> String {
        format!(
            "otpauth://totp/{}:{}?secret={}&issuer={}&algorithm=SHA512&digits={}&period={}",
            urlencoding::encode(&self.issuer),
            urlencoding::encode(account),
            raw_secret,
            urlencoding::encode(&self.issuer),
            TOTP_DIGITS,
            TOTP_STEP,
        )
    }

    fn provisioning_qr_svg(&self, uri: &str) -> Result<String> {
        let code = QrCode::new(uri.as_bytes())
            .map_err(|e| AuthError::Internal(format!("QR encode error: {}", e)))?;

        let image = code
            .render::<svg::Color>()
            .min_dimensions(200, 200)
            .build();

        Ok(image)
    }

    fn encrypt_secret(&self, raw_secret: &str) -> Result<String> {
        self.encrypt_internal(raw_secret)
    }

    fn decrypt_secret(&self, encrypted_secret: &str) -> Result<String> {
        self.decrypt_internal(encrypted_secret)
    }
}
