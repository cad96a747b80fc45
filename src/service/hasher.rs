use sha2::{Digest, Sha256};
use std::io::{self, Read};

const READ_BUFFER_SIZE: usize = 64 * 1024;

/// 内容哈希 - SHA-256，只看原始字节，与文件名/MIME 无关
pub struct ContentHasher;

impl ContentHasher {
    /// 计算字节内容的 SHA-256，返回 64 位小写十六进制
    pub fn hash(bytes: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        hex::encode(hasher.finalize())
    }

    /// 流式计算摘要，同时统计字节数；读取错误交由调用方处理
    pub fn hash_reader<R: Read>(mut reader: R) -> io::Result<(String, u64)> {
        let mut hasher = Sha256::new();
        let mut buffer = vec![0u8; READ_BUFFER_SIZE];
        let mut size: u64 = 0;

        loop {
            let read = match reader.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            hasher.update(&buffer[..read]);
            size += read as u64;
        }

        Ok((hex::encode(hasher.finalize()), size))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn hash_is_64_char_lowercase_hex() {
        let hash = ContentHasher::hash(b"invoice.pdf bytes");
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn known_digest_of_empty_input() {
        assert_eq!(
            ContentHasher::hash(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn different_bytes_give_different_digest() {
        assert_ne!(ContentHasher::hash(b"abc"), ContentHasher::hash(b"abd"));
    }

    #[test]
    fn reader_matches_slice_and_counts_size() {
        let data = vec![7u8; READ_BUFFER_SIZE * 2 + 13];
        let (digest, size) = ContentHasher::hash_reader(data.as_slice()).unwrap();
        assert_eq!(digest, ContentHasher::hash(&data));
        assert_eq!(size, data.len() as u64);
    }

    #[test]
    fn reader_error_is_returned() {
        struct Broken;
        impl Read for Broken {
            fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
                Err(io::Error::new(io::ErrorKind::UnexpectedEof, "truncated upload"))
            }
        }
        assert!(ContentHasher::hash_reader(Broken).is_err());
    }

    proptest! {
        #[test]
        fn prop_hash_is_deterministic(bytes in prop::collection::vec(any::<u8>(), 0..4096)) {
            prop_assert_eq!(ContentHasher::hash(&bytes), ContentHasher::hash(&bytes));
        }
    }
}
