// スキーマチェックサム計算サービス
//
// SDLテキストのSHA-256ハッシュを計算します。
// 前後の空白と改行コードの違いはチェックサムに影響しません。

use sha2::{Digest, Sha256};

/// スキーマチェックサムサービス
#[derive(Debug, Clone, Default)]
pub struct SchemaChecksumService {}

impl SchemaChecksumService {
    /// 新しいSchemaChecksumServiceを作成
    pub fn new() -> Self {
        Self {}
    }

    /// SDLテキストのチェックサムを計算
    ///
    /// # Returns
    ///
    /// SHA-256ハッシュ（64文字の16進数文字列）
    pub fn calculate_checksum(&self, sdl: &str) -> String {
        let normalized = self.normalize(sdl);

        let mut hasher = Sha256::new();
        hasher.update(normalized.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// 2つのSDLテキストのチェックサムが一致するかどうか
    pub fn compare_checksums(&self, left: &str, right: &str) -> bool {
        self.calculate_checksum(left) == self.calculate_checksum(right)
    }

    fn normalize(&self, sdl: &str) -> String {
        sdl.replace("\r\n", "\n").trim().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_is_hex_sha256() {
        let service = SchemaChecksumService::new();
        let checksum = service.calculate_checksum("CREATE TABLE t (id int);");
        assert_eq!(checksum.len(), 64);
        assert!(checksum.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_checksum_ignores_surrounding_whitespace_and_line_endings() {
        let service = SchemaChecksumService::new();
        assert!(service.compare_checksums(
            "CREATE TABLE t (\r\n  id int\r\n);\n",
            "  CREATE TABLE t (\n  id int\n);"
        ));
    }

    #[test]
    fn test_checksum_detects_changes() {
        let service = SchemaChecksumService::new();
        assert!(!service.compare_checksums(
            "CREATE TABLE t (id int);",
            "CREATE TABLE t (id bigint);"
        ));
    }

    #[test]
    fn test_empty_sdl_checksum() {
        let service = SchemaChecksumService::new();
        assert_eq!(
            service.calculate_checksum("   "),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
