/*!
 * CRC32C checksums in the wire encoding object stores expect
 */

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

/// CRC32C of `data`, as big-endian bytes encoded in standard base64
pub fn crc32c_base64(data: &[u8]) -> String {
    encode_crc32c(crc32c::crc32c(data))
}

/// Encode a raw CRC32C value the way S3 and GCS headers carry it
pub fn encode_crc32c(value: u32) -> String {
    STANDARD.encode(value.to_be_bytes())
}
