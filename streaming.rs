//! Chunked AES-256-GCM over arbitrary readers and writers.
//!
//! This module provides [`StreamCipher`], which seals a plaintext stream into
//! the genc chunk format and opens it again, one 1 MiB block at a time.
//!
//! Every chunk is sealed independently under a fresh random 96-bit nonce with
//! no associated data, so each frame is self-describing.

use crate::error::{GencError, Result};
use crate::format::{read_header, ChunkHeader, Header, CHUNK_HEADER_LEN, CHUNK_SIZE, NONCE_LEN};
use crate::kdf::{derive_key, generate_salt, DerivedKey};
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use rand_core::{OsRng, RngCore};
use std::io::{self, Read, Write};
use tracing::{trace, warn};

/// What to do when a container ends partway through a chunk
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TruncationPolicy {
    /// Stop at the last complete chunk and report success
    #[default]
    Tolerate,
    /// Fail with [`GencError::Truncated`]
    Strict,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamStats {
    /// Plaintext bytes processed
    pub bytes: u64,
    pub chunks: u64,
    /// Trailing partial chunk was dropped (decryption only)
    pub truncated: bool,
}

pub struct StreamCipher {
    cipher: Aes256Gcm,
}

impl StreamCipher {
    pub fn new(key: &DerivedKey) -> Result<Self> {
        let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
            .map_err(|e| GencError::CipherInit(e.to_string()))?;
        Ok(Self { cipher })
    }

    /// Writes `header`, then one frame per plaintext block read from `reader`.
    /// Blocks are [`CHUNK_SIZE`] bytes except possibly the last.
    pub fn encrypt_stream<R, W>(
        &self,
        header: &Header,
        reader: &mut R,
        writer: &mut W,
    ) -> Result<StreamStats>
    where
        R: Read,
        W: Write,
    {
        writer
            .write_all(&header.encode())
            .map_err(GencError::HeaderWrite)?;

        let mut buffer = vec![0u8; CHUNK_SIZE];
        let mut stats = StreamStats::default();

        loop {
            let n = read_full(reader, &mut buffer).map_err(GencError::Read)?;
            if n == 0 {
                break;
            }

            let mut nonce = [0u8; NONCE_LEN];
            OsRng
                .try_fill_bytes(&mut nonce)
                .map_err(GencError::NonceGeneration)?;

            // Seal only fails when the plaintext exceeds GCM's length limit
            let ciphertext = self
                .cipher
                .encrypt(Nonce::from_slice(&nonce), &buffer[..n])
                .map_err(|_| GencError::ChunkTooLarge { len: n })?;

            let len = u32::try_from(ciphertext.len()).map_err(|_| GencError::ChunkTooLarge {
                len: ciphertext.len(),
            })?;

            writer
                .write_all(&ChunkHeader::new(nonce, len).encode())
                .map_err(GencError::Write)?;
            writer.write_all(&ciphertext).map_err(GencError::Write)?;

            trace!(chunk = stats.chunks, plaintext = n, ciphertext = len, "chunk sealed");
            stats.bytes += n as u64;
            stats.chunks += 1;

            if n < buffer.len() {
                break; // EOF
            }
        }

        writer.flush().map_err(GencError::Write)?;
        Ok(stats)
    }

    /// Opens frames from `reader` (positioned just past the header) and writes
    /// the plaintext to `writer` in order.
    pub fn decrypt_stream<R, W>(
        &self,
        reader: &mut R,
        writer: &mut W,
        policy: TruncationPolicy,
    ) -> Result<StreamStats>
    where
        R: Read,
        W: Write,
    {
        let mut stats = StreamStats::default();
        let mut frame = [0u8; CHUNK_HEADER_LEN];
        let mut ciphertext = Vec::new();

        loop {
            let n = read_full(reader, &mut frame).map_err(GencError::Read)?;
            if n == 0 {
                break; // clean end at a chunk boundary
            }
            if n < CHUNK_HEADER_LEN {
                truncated(policy, &mut stats)?;
                break;
            }

            let chunk = ChunkHeader::decode(&frame)?;

            // take() keeps a bogus length from forcing a huge allocation
            ciphertext.clear();
            let got = reader
                .by_ref()
                .take(u64::from(chunk.len))
                .read_to_end(&mut ciphertext)
                .map_err(GencError::Read)?;
            if got < chunk.len as usize {
                truncated(policy, &mut stats)?;
                break;
            }

            let plaintext = self
                .cipher
                .decrypt(Nonce::from_slice(&chunk.nonce), ciphertext.as_slice())
                .map_err(|_| GencError::AuthenticationFailed {
                    chunk: stats.chunks,
                })?;

            writer.write_all(&plaintext).map_err(GencError::Write)?;

            trace!(chunk = stats.chunks, plaintext = plaintext.len(), "chunk opened");
            stats.bytes += plaintext.len() as u64;
            stats.chunks += 1;
        }

        writer.flush().map_err(GencError::Write)?;
        Ok(stats)
    }
}

fn truncated(policy: TruncationPolicy, stats: &mut StreamStats) -> Result<()> {
    match policy {
        TruncationPolicy::Strict => Err(GencError::Truncated {
            chunk: stats.chunks,
        }),
        TruncationPolicy::Tolerate => {
            warn!(
                complete_chunks = stats.chunks,
                "container ends mid-chunk, ignoring trailing bytes"
            );
            stats.truncated = true;
            Ok(())
        }
    }
}

/// Like `read_exact`, but a short count at EOF is returned instead of failing.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Encrypt `reader` into a complete container on `writer` under a fresh salt.
pub fn encrypt_reader<R, W>(
    passphrase: &str,
    reader: &mut R,
    writer: &mut W,
) -> Result<StreamStats>
where
    R: Read,
    W: Write,
{
    let header = Header::new(generate_salt()?);
    let key = derive_key(passphrase.as_bytes(), &header.salt)?;
    StreamCipher::new(&key)?.encrypt_stream(&header, reader, writer)
}

/// Read a container's header, rederive its key, and decrypt the chunks.
pub fn decrypt_reader<R, W>(
    passphrase: &str,
    reader: &mut R,
    writer: &mut W,
    policy: TruncationPolicy,
) -> Result<StreamStats>
where
    R: Read,
    W: Write,
{
    let header = read_header(reader)?;
    let key = derive_key(passphrase.as_bytes(), &header.salt)?;
    StreamCipher::new(&key)?.decrypt_stream(reader, writer, policy)
}
