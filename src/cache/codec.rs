// Copyright 2024 Saptak Santra
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Framed binary codec
//!
//! Layout: `[8-byte magic "GRAVIXBN"][u32 version][payload...]`, little endian.
//! Payload fields are encoded with `speedy`: primitives are copied as-is,
//! strings, vectors and maps carry a `u32` length prefix followed by their
//! elements, and derived or hand-written `Writable` impls recurse into
//! their fields. Records that need a custom layout implement [`BinaryRecord`].

use crate::error::{AssetError, Result};
use speedy::{Endianness, Readable, Writable};
use std::path::Path;

/// Magic tag at the start of every binary file
pub const BINARY_MAGIC: [u8; 8] = *b"GRAVIXBN";

/// Size of the `[magic][version]` header
pub const HEADER_SIZE: usize = BINARY_MAGIC.len() + std::mem::size_of::<u32>();

const ENDIANNESS: Endianness = Endianness::LittleEndian;

/// A value with its own field-by-field binary layout
pub trait BinaryRecord: Sized {
    /// Append this record's fields to the writer
    fn write_record(&self, writer: &mut BinaryWriter) -> Result<()>;

    /// Read the fields back in the order `write_record` wrote them
    fn read_record(reader: &mut BinaryReader) -> Result<Self>;
}

/// Builds a framed binary buffer
#[derive(Debug, Clone)]
pub struct BinaryWriter {
    buffer: Vec<u8>,
}

impl BinaryWriter {
    /// Start a buffer with the magic tag and `version`
    pub fn new(version: u32) -> Self {
        let mut buffer = Vec::with_capacity(256);
        buffer.extend_from_slice(&BINARY_MAGIC);
        buffer.extend_from_slice(&version.to_le_bytes());
        Self { buffer }
    }

    /// Append a value
    pub fn write<T>(&mut self, value: &T) -> Result<()>
    where
        T: Writable<Endianness>,
    {
        let bytes = value
            .write_to_vec_with_ctx(ENDIANNESS)
            .map_err(|e| AssetError::SerializationError(e.to_string()))?;
        self.buffer.extend_from_slice(&bytes);
        Ok(())
    }

    /// Append a record through its own layout
    pub fn write_record<R: BinaryRecord>(&mut self, record: &R) -> Result<()> {
        record.write_record(self)
    }

    /// Append raw bytes without a length prefix
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buffer
    }

    /// Write the buffer to `path`, creating parent directories
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, &self.buffer).map_err(|e| {
            AssetError::IoError(format!("Failed to write {}: {e}", path.display()))
        })
    }
}

/// Reads a framed binary buffer written by [`BinaryWriter`]
#[derive(Debug, Clone)]
pub struct BinaryReader {
    buffer: Vec<u8>,
    offset: usize,
    version: u32,
}

impl BinaryReader {
    /// Validate the header of `buffer` against `expected_version`.
    ///
    /// Fails before any payload field is read when the magic tag or the
    /// version does not match exactly.
    pub fn from_bytes(buffer: Vec<u8>, expected_version: u32) -> Result<Self> {
        if buffer.len() < HEADER_SIZE {
            return Err(AssetError::UnexpectedEof {
                offset: 0,
                needed: HEADER_SIZE,
            });
        }

        if buffer[..BINARY_MAGIC.len()] != BINARY_MAGIC {
            tracing::debug!("binary header rejected: bad magic");
            return Err(AssetError::InvalidMagic);
        }

        let mut version_bytes = [0u8; 4];
        version_bytes.copy_from_slice(&buffer[BINARY_MAGIC.len()..HEADER_SIZE]);
        let version = u32::from_le_bytes(version_bytes);
        if version != expected_version {
            tracing::debug!(expected_version, version, "binary header rejected: version");
            return Err(AssetError::VersionMismatch {
                expected: expected_version,
                found: version,
            });
        }

        Ok(Self {
            buffer,
            offset: HEADER_SIZE,
            version,
        })
    }

    /// Read and validate a file
    pub fn from_file(path: impl AsRef<Path>, expected_version: u32) -> Result<Self> {
        let path = path.as_ref();
        let buffer = std::fs::read(path).map_err(|e| {
            AssetError::IoError(format!("Failed to open {} for reading: {e}", path.display()))
        })?;
        Self::from_bytes(buffer, expected_version)
    }

    /// Read the next value
    pub fn read<T>(&mut self) -> Result<T>
    where
        T: for<'a> Readable<'a, Endianness>,
    {
        let (value, consumed) =
            T::read_with_length_from_buffer_with_ctx(ENDIANNESS, &self.buffer[self.offset..]);
        let value = value.map_err(|e| {
            AssetError::DeserializationError(format!("at offset {}: {e}", self.offset))
        })?;
        self.offset += consumed;
        Ok(value)
    }

    /// Read the next record through its own layout
    pub fn read_record<R: BinaryRecord>(&mut self) -> Result<R> {
        R::read_record(self)
    }

    /// Read `len` raw bytes
    pub fn read_bytes(&mut self, len: usize) -> Result<&[u8]> {
        if self.remaining() < len {
            return Err(AssetError::UnexpectedEof {
                offset: self.offset,
                needed: len,
            });
        }
        let start = self.offset;
        self.offset += len;
        Ok(&self.buffer[start..self.offset])
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Bytes left after the read cursor
    pub fn remaining(&self) -> usize {
        self.buffer.len() - self.offset
    }
}
