//! Random-access I/O over an encrypted backing file.
//!
//! Every operation names an explicit logical offset; there is no cursor.
//! Reads spanning several blocks authenticate every block before any
//! plaintext is released. Writes that cover only part of a block go through
//! read-modify-write, so the untouched remainder of the block is preserved
//! rather than replaced with padding. Truncation shrinks to a re-encrypted
//! partial final block, and extension materializes explicit zero blocks so
//! no logical range is ever backed by undefined content.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::PathBuf;

use tracing::{debug, trace};

use super::content::{
    BLOCK_SIZE, BlockLayout, ContentCipher, ContentError, FILE_HEADER_LEN, FILE_ID_LEN,
    MAX_IO_SIZE, new_file_header, parse_file_header,
};

/// An open encrypted file plus the state needed to address its blocks.
///
/// The file ID from the content header is cached after the first access so
/// per-call work is just block cipher operations. A single instance is not
/// safe for concurrent use; callers serialize access per handle.
pub(crate) struct EncryptedFile {
    file: File,
    logical_path: PathBuf,
    file_id: Option<[u8; FILE_ID_LEN]>,
    writable: bool,
}

impl EncryptedFile {
    pub fn new(file: File, logical_path: PathBuf, writable: bool) -> Self {
        Self {
            file,
            logical_path,
            file_id: None,
            writable,
        }
    }

    pub fn is_writable(&self) -> bool {
        self.writable
    }

    pub fn logical_path(&self) -> &PathBuf {
        &self.logical_path
    }

    fn io_err(&self, source: std::io::Error) -> ContentError {
        ContentError::Io {
            source,
            path: self.logical_path.clone(),
        }
    }

    /// Current logical size, derived from the backing file's length.
    pub fn plain_len(&mut self, layout: &BlockLayout) -> Result<u64, ContentError> {
        let meta = self.file.metadata().map_err(|e| self.io_err(e))?;
        Ok(layout.plain_size(meta.len()))
    }

    /// Read the cached file ID, loading the content header on first use.
    /// `Ok(None)` means the file is empty (no header yet).
    fn load_file_id(&mut self) -> Result<Option<[u8; FILE_ID_LEN]>, ContentError> {
        if let Some(id) = self.file_id {
            return Ok(Some(id));
        }
        self.file
            .seek(SeekFrom::Start(0))
            .map_err(|e| self.io_err(e))?;
        let mut buf = [0u8; FILE_HEADER_LEN];
        let n = read_up_to(&mut self.file, &mut buf).map_err(|e| self.io_err(e))?;
        if n == 0 {
            return Ok(None);
        }
        let id = parse_file_header(&buf[..n])?;
        self.file_id = Some(id);
        Ok(Some(id))
    }

    /// Like [`load_file_id`](Self::load_file_id), but creates a fresh
    /// content header when the file is still empty.
    fn ensure_file_id(&mut self) -> Result<[u8; FILE_ID_LEN], ContentError> {
        if let Some(id) = self.load_file_id()? {
            return Ok(id);
        }
        let (header, id) = new_file_header();
        self.file
            .seek(SeekFrom::Start(0))
            .map_err(|e| self.io_err(e))?;
        self.file.write_all(&header).map_err(|e| self.io_err(e))?;
        trace!(path = %self.logical_path.display(), "content header created");
        self.file_id = Some(id);
        Ok(id)
    }

    /// Decrypt a single block; short or empty if the block extends past EOF.
    fn read_block(
        &mut self,
        cipher: &ContentCipher,
        layout: &BlockLayout,
        block_no: u64,
    ) -> Result<Vec<u8>, ContentError> {
        let Some(file_id) = self.load_file_id()? else {
            return Ok(Vec::new());
        };
        self.file
            .seek(SeekFrom::Start(layout.cipher_off_of_block(block_no)))
            .map_err(|e| self.io_err(e))?;
        let mut stored = vec![0u8; layout.cipher_block_size()];
        let n = read_up_to(&mut self.file, &mut stored).map_err(|e| self.io_err(e))?;
        if n == 0 {
            return Ok(Vec::new());
        }
        cipher.decrypt_block(block_no, &file_id, &stored[..n])
    }

    /// Read up to `length` bytes at `offset`.
    ///
    /// Returns fewer bytes at end of file, and caps a single call at
    /// [`MAX_IO_SIZE`]. Nothing is returned unless every covering block
    /// authenticated.
    pub fn read_at(
        &mut self,
        cipher: &ContentCipher,
        layout: &BlockLayout,
        offset: u64,
        length: usize,
    ) -> Result<Vec<u8>, ContentError> {
        let length = length.min(MAX_IO_SIZE);
        if length == 0 {
            return Ok(Vec::new());
        }
        let Some(file_id) = self.load_file_id()? else {
            return Ok(Vec::new());
        };

        let first_block = layout.block_of_plain_off(offset);
        let last_block = layout.block_of_plain_off(offset.saturating_add(length as u64 - 1));
        let block_count = (last_block - first_block + 1) as usize;

        self.file
            .seek(SeekFrom::Start(layout.cipher_off_of_block(first_block)))
            .map_err(|e| self.io_err(e))?;
        let mut stored = vec![0u8; block_count * layout.cipher_block_size()];
        let n = read_up_to(&mut self.file, &mut stored).map_err(|e| self.io_err(e))?;
        if n == 0 {
            return Ok(Vec::new());
        }
        stored.truncate(n);

        // Authenticate everything before releasing any plaintext.
        let mut plain = Vec::with_capacity(block_count * BLOCK_SIZE);
        for (i, chunk) in stored.chunks(layout.cipher_block_size()).enumerate() {
            let block = cipher.decrypt_block(first_block + i as u64, &file_id, chunk)?;
            plain.extend_from_slice(&block);
        }

        let skip = (offset - layout.plain_off_of_block(first_block)) as usize;
        if skip >= plain.len() {
            return Ok(Vec::new());
        }
        let end = plain.len().min(skip + length);
        Ok(plain[skip..end].to_vec())
    }

    /// Write `data` at `offset`, read-modify-writing partial blocks.
    ///
    /// A positioned write past the current end first materializes the gap
    /// as zero blocks. Always writes the full buffer.
    pub fn write_at(
        &mut self,
        cipher: &ContentCipher,
        layout: &BlockLayout,
        offset: u64,
        data: &[u8],
    ) -> Result<usize, ContentError> {
        if data.is_empty() {
            return Ok(0);
        }
        let current = self.plain_len(layout)?;
        if offset > current {
            self.grow_to(cipher, layout, current, offset)?;
        }
        let mut written = 0u64;
        for chunk in data.chunks(MAX_IO_SIZE) {
            self.write_span(cipher, layout, offset + written, chunk)?;
            written += chunk.len() as u64;
        }
        debug!(
            path = %self.logical_path.display(),
            offset,
            len = data.len(),
            "write complete"
        );
        Ok(data.len())
    }

    /// Encrypt and store one bounded span (at most [`MAX_IO_SIZE`] bytes).
    fn write_span(
        &mut self,
        cipher: &ContentCipher,
        layout: &BlockLayout,
        offset: u64,
        data: &[u8],
    ) -> Result<(), ContentError> {
        let file_id = self.ensure_file_id()?;
        let first_block = layout.block_of_plain_off(offset);

        let mut ciphertext = Vec::new();
        let mut block_no = first_block;
        let mut pos = 0usize;
        while pos < data.len() {
            let skip = (offset + pos as u64 - layout.plain_off_of_block(block_no)) as usize;
            let take = (BLOCK_SIZE - skip).min(data.len() - pos);
            let segment = &data[pos..pos + take];

            if skip == 0 && take == BLOCK_SIZE {
                ciphertext.extend(cipher.encrypt_block(block_no, &file_id, segment)?);
            } else {
                // Partial block: merge into the existing plaintext so the
                // unwritten remainder survives.
                let mut block = self.read_block(cipher, layout, block_no)?;
                if block.len() < skip + take {
                    block.resize(skip + take, 0);
                }
                block[skip..skip + take].copy_from_slice(segment);
                ciphertext.extend(cipher.encrypt_block(block_no, &file_id, &block)?);
            }
            block_no += 1;
            pos += take;
        }

        self.file
            .seek(SeekFrom::Start(layout.cipher_off_of_block(first_block)))
            .map_err(|e| self.io_err(e))?;
        self.file
            .write_all(&ciphertext)
            .map_err(|e| self.io_err(e))
    }

    /// Extend the logical file from `current` to `new_len` with explicit
    /// zero blocks.
    fn grow_to(
        &mut self,
        cipher: &ContentCipher,
        layout: &BlockLayout,
        current: u64,
        new_len: u64,
    ) -> Result<(), ContentError> {
        debug_assert!(new_len > current);
        self.ensure_file_id()?;
        let zeros = vec![0u8; MAX_IO_SIZE.min((new_len - current) as usize)];
        let mut pos = current;
        while pos < new_len {
            let n = zeros.len().min((new_len - pos) as usize);
            self.write_span(cipher, layout, pos, &zeros[..n])?;
            pos += n as u64;
        }
        Ok(())
    }

    /// Set the logical length.
    pub fn truncate(
        &mut self,
        cipher: &ContentCipher,
        layout: &BlockLayout,
        new_len: u64,
    ) -> Result<(), ContentError> {
        let current = self.plain_len(layout)?;
        if new_len == current {
            return Ok(());
        }
        if new_len == 0 {
            // Dropping the content header as well: the next write draws a
            // fresh file ID.
            self.file.set_len(0).map_err(|e| self.io_err(e))?;
            self.file_id = None;
            return Ok(());
        }
        if new_len > current {
            return self.grow_to(cipher, layout, current, new_len);
        }

        // Shrink: cut at the block boundary, then re-encrypt the kept part
        // of the final block.
        let boundary_block = layout.block_of_plain_off(new_len);
        let kept = (new_len - layout.plain_off_of_block(boundary_block)) as usize;
        if kept == 0 {
            self.file
                .set_len(layout.cipher_off_of_block(boundary_block))
                .map_err(|e| self.io_err(e))?;
            return Ok(());
        }
        let tail = self.read_at(
            cipher,
            layout,
            layout.plain_off_of_block(boundary_block),
            kept,
        )?;
        self.file
            .set_len(layout.cipher_off_of_block(boundary_block))
            .map_err(|e| self.io_err(e))?;
        self.write_span(
            cipher,
            layout,
            layout.plain_off_of_block(boundary_block),
            &tail,
        )
    }
}

/// Read into `buf` until it is full or EOF; returns the bytes read.
fn read_up_to(file: &mut File, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match file.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::RootKey;
    use crate::header::CipherSuite;
    use std::fs::OpenOptions;
    use tempfile::TempDir;

    fn fixture(suite: CipherSuite) -> (TempDir, EncryptedFile, ContentCipher, BlockLayout) {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("blob");
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .unwrap();
        let key = RootKey::random().derive_master_key().unwrap();
        let cipher = ContentCipher::new(suite, &key);
        let layout = BlockLayout::new(suite);
        (tmp, EncryptedFile::new(file, path, true), cipher, layout)
    }

    #[test]
    fn empty_file_reads_empty() {
        let (_tmp, mut f, cipher, layout) = fixture(CipherSuite::Aes256Gcm);
        assert_eq!(f.plain_len(&layout).unwrap(), 0);
        assert!(f.read_at(&cipher, &layout, 0, 100).unwrap().is_empty());
        assert!(f.read_at(&cipher, &layout, 10_000, 100).unwrap().is_empty());
    }

    #[test]
    fn small_write_round_trip() {
        let (_tmp, mut f, cipher, layout) = fixture(CipherSuite::Aes256Gcm);
        assert_eq!(f.write_at(&cipher, &layout, 0, b"hello").unwrap(), 5);
        assert_eq!(f.plain_len(&layout).unwrap(), 5);
        assert_eq!(f.read_at(&cipher, &layout, 0, 5).unwrap(), b"hello");
        // Over-read stops at EOF.
        assert_eq!(f.read_at(&cipher, &layout, 0, 100).unwrap(), b"hello");
        assert_eq!(f.read_at(&cipher, &layout, 1, 3).unwrap(), b"ell");
    }

    #[test]
    fn multi_block_write_round_trip() {
        let (_tmp, mut f, cipher, layout) = fixture(CipherSuite::XChaCha20Poly1305);
        let data: Vec<u8> = (0..3 * BLOCK_SIZE + 511).map(|i| (i % 251) as u8).collect();
        f.write_at(&cipher, &layout, 0, &data).unwrap();
        assert_eq!(f.plain_len(&layout).unwrap(), data.len() as u64);
        assert_eq!(f.read_at(&cipher, &layout, 0, data.len()).unwrap(), data);
    }

    #[test]
    fn partial_block_overwrite_preserves_rest() {
        let (_tmp, mut f, cipher, layout) = fixture(CipherSuite::Aes256Gcm);
        let base = vec![0xAAu8; 2 * BLOCK_SIZE];
        f.write_at(&cipher, &layout, 0, &base).unwrap();

        // Overwrite a span straddling the block boundary.
        let patch = vec![0xBBu8; 100];
        f.write_at(&cipher, &layout, BLOCK_SIZE as u64 - 50, &patch)
            .unwrap();

        let all = f.read_at(&cipher, &layout, 0, 2 * BLOCK_SIZE).unwrap();
        assert_eq!(all.len(), 2 * BLOCK_SIZE);
        assert!(all[..BLOCK_SIZE - 50].iter().all(|&b| b == 0xAA));
        assert!(
            all[BLOCK_SIZE - 50..BLOCK_SIZE + 50]
                .iter()
                .all(|&b| b == 0xBB)
        );
        assert!(all[BLOCK_SIZE + 50..].iter().all(|&b| b == 0xAA));
    }

    #[test]
    fn write_past_eof_materializes_zeros() {
        let (_tmp, mut f, cipher, layout) = fixture(CipherSuite::Aes256Gcm);
        f.write_at(&cipher, &layout, 0, b"head").unwrap();
        let far = 2 * BLOCK_SIZE as u64 + 100;
        f.write_at(&cipher, &layout, far, b"tail").unwrap();

        assert_eq!(f.plain_len(&layout).unwrap(), far + 4);
        let gap = f.read_at(&cipher, &layout, 4, (far - 4) as usize).unwrap();
        assert_eq!(gap.len(), (far - 4) as usize);
        assert!(gap.iter().all(|&b| b == 0));
        assert_eq!(f.read_at(&cipher, &layout, far, 4).unwrap(), b"tail");
    }

    #[test]
    fn truncate_shrink_and_grow() {
        let (_tmp, mut f, cipher, layout) = fixture(CipherSuite::Aes256Gcm);
        let data: Vec<u8> = (0..2 * BLOCK_SIZE).map(|i| (i % 256) as u8).collect();
        f.write_at(&cipher, &layout, 0, &data).unwrap();

        // Shrink into the middle of the first block.
        f.truncate(&cipher, &layout, 100).unwrap();
        assert_eq!(f.plain_len(&layout).unwrap(), 100);
        assert_eq!(f.read_at(&cipher, &layout, 0, 200).unwrap(), &data[..100]);

        // Grow back out: the re-extended range is zeros.
        f.truncate(&cipher, &layout, BLOCK_SIZE as u64 + 10).unwrap();
        assert_eq!(f.plain_len(&layout).unwrap(), BLOCK_SIZE as u64 + 10);
        let all = f.read_at(&cipher, &layout, 0, BLOCK_SIZE + 10).unwrap();
        assert_eq!(&all[..100], &data[..100]);
        assert!(all[100..].iter().all(|&b| b == 0));
    }

    #[test]
    fn truncate_to_zero_then_rewrite() {
        let (_tmp, mut f, cipher, layout) = fixture(CipherSuite::Aes256Gcm);
        f.write_at(&cipher, &layout, 0, b"before").unwrap();
        f.truncate(&cipher, &layout, 0).unwrap();
        assert_eq!(f.plain_len(&layout).unwrap(), 0);
        f.write_at(&cipher, &layout, 0, b"after").unwrap();
        assert_eq!(f.read_at(&cipher, &layout, 0, 100).unwrap(), b"after");
    }

    #[test]
    fn truncate_to_current_length_is_noop() {
        let (_tmp, mut f, cipher, layout) = fixture(CipherSuite::Aes256Gcm);
        f.write_at(&cipher, &layout, 0, b"stable").unwrap();
        f.truncate(&cipher, &layout, 6).unwrap();
        assert_eq!(f.read_at(&cipher, &layout, 0, 6).unwrap(), b"stable");
    }

    #[test]
    fn zero_length_io_is_a_noop() {
        let (_tmp, mut f, cipher, layout) = fixture(CipherSuite::Aes256Gcm);
        assert_eq!(f.write_at(&cipher, &layout, 0, b"").unwrap(), 0);
        assert_eq!(f.plain_len(&layout).unwrap(), 0);
        assert!(f.read_at(&cipher, &layout, 0, 0).unwrap().is_empty());
    }

    #[test]
    fn tampered_block_fails_entire_read() {
        let (_tmp, mut f, cipher, layout) = fixture(CipherSuite::Aes256Gcm);
        let data = vec![0x5Au8; 2 * BLOCK_SIZE];
        f.write_at(&cipher, &layout, 0, &data).unwrap();

        // Flip one bit inside the second block's ciphertext.
        let backing = f.logical_path().clone();
        let mut raw = std::fs::read(&backing).unwrap();
        let victim = layout.cipher_off_of_block(1) as usize + 40;
        raw[victim] ^= 0x01;
        std::fs::write(&backing, &raw).unwrap();

        // Reopen to drop any cached state.
        let file = OpenOptions::new().read(true).open(&backing).unwrap();
        let mut reopened = EncryptedFile::new(file, backing, false);
        let err = reopened
            .read_at(&cipher, &layout, 0, 2 * BLOCK_SIZE)
            .unwrap_err();
        assert!(matches!(err, ContentError::IntegrityViolation { block: 1 }));

        // The first block alone still reads fine.
        assert_eq!(
            reopened.read_at(&cipher, &layout, 0, BLOCK_SIZE).unwrap(),
            &data[..BLOCK_SIZE]
        );
    }
}
