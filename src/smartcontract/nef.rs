//! NEF container serialization/deserialization.
//!
//! Binary format:
//! - Magic: "NEF3" (u32, little-endian)
//! - Compiler: 64 bytes, zero padded
//! - Source: var-length string
//! - Reserved: u8 (0)
//! - Method tokens: var-length count + tokens
//! - Reserved: u16 (0)
//! - Script: var-length bytes
//! - Checksum: u32, first four bytes of the double SHA-256 of everything above

use std::io::{self, Cursor, Read, Write};

use crate::crypto::hash::{HASH160_LEN, checksum};
use crate::smartcontract::CallFlags;

/// Magic number of NEF files ("NEF3").
pub const MAGIC: u32 = 0x3346_454E;

/// Size of the fixed compiler field.
pub const COMPILER_FIELD_SIZE: usize = 64;

/// Maximum length of the source field.
pub const MAX_SOURCE_SIZE: usize = 256;

#[derive(Debug, thiserror::Error)]
pub enum NefError {
    #[error("invalid magic number")]
    InvalidMagic,
    #[error("unexpected end of file")]
    UnexpectedEof,
    #[error("invalid checksum: expected {expected:#010x}, got {found:#010x}")]
    InvalidChecksum { expected: u32, found: u32 },
    #[error("reserved field is not zero")]
    Reserved,
    #[error("invalid call flags in method token: {0:#04x}")]
    InvalidCallFlags(u8),
    #[error("field too long: {0}")]
    TooLong(&'static str),
    #[error("invalid UTF-8 string")]
    InvalidUtf8,
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// A statically resolved call target referenced by `CALLT`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodToken {
    pub hash: [u8; HASH160_LEN],
    pub method: String,
    pub params_count: u16,
    pub has_return: bool,
    pub call_flags: CallFlags,
}

/// A compiled contract ready for deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Nef {
    pub compiler: String,
    pub source: String,
    pub tokens: Vec<MethodToken>,
    pub script: Vec<u8>,
    pub checksum: u32,
}

impl Nef {
    pub fn new(
        compiler: &str,
        source: &str,
        tokens: Vec<MethodToken>,
        script: Vec<u8>,
    ) -> Result<Self, NefError> {
        let mut nef = Self {
            compiler: compiler.to_string(),
            source: source.to_string(),
            tokens,
            script,
            checksum: 0,
        };
        nef.checksum = nef.compute_checksum()?;
        Ok(nef)
    }

    pub fn compute_checksum(&self) -> Result<u32, NefError> {
        let mut buf = Vec::new();
        self.write_header(&mut buf)?;
        Ok(u32::from_le_bytes(checksum(&buf)))
    }

    /// Serialize to bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, NefError> {
        let mut buf = Vec::new();
        self.write_header(&mut buf)?;
        buf.write_all(&self.checksum.to_le_bytes())?;
        Ok(buf)
    }

    /// Deserialize from bytes, verifying the checksum.
    pub fn from_bytes(data: &[u8]) -> Result<Nef, NefError> {
        let mut r = Cursor::new(data);
        if read_u32(&mut r)? != MAGIC {
            return Err(NefError::InvalidMagic);
        }

        let mut compiler = [0u8; COMPILER_FIELD_SIZE];
        r.read_exact(&mut compiler).map_err(|_| NefError::UnexpectedEof)?;
        let end = compiler.iter().position(|b| *b == 0).unwrap_or(COMPILER_FIELD_SIZE);
        let compiler = String::from_utf8(compiler[..end].to_vec()).map_err(|_| NefError::InvalidUtf8)?;

        let source = read_string(&mut r)?;
        if read_u8(&mut r)? != 0 {
            return Err(NefError::Reserved);
        }

        let count = read_var_uint(&mut r)? as usize;
        let mut tokens = Vec::with_capacity(count.min(128));
        for _ in 0..count {
            tokens.push(read_token(&mut r)?);
        }

        let mut reserved = [0u8; 2];
        r.read_exact(&mut reserved).map_err(|_| NefError::UnexpectedEof)?;
        if reserved != [0, 0] {
            return Err(NefError::Reserved);
        }

        let script = read_var_bytes(&mut r)?;
        let checksum = read_u32(&mut r)?;

        let nef = Nef {
            compiler,
            source,
            tokens,
            script,
            checksum,
        };
        let expected = nef.compute_checksum()?;
        if expected != checksum {
            return Err(NefError::InvalidChecksum {
                expected,
                found: checksum,
            });
        }
        Ok(nef)
    }

    fn write_header<W: Write>(&self, w: &mut W) -> Result<(), NefError> {
        w.write_all(&MAGIC.to_le_bytes())?;

        let compiler = self.compiler.as_bytes();
        if compiler.len() > COMPILER_FIELD_SIZE {
            return Err(NefError::TooLong("compiler"));
        }
        let mut field = [0u8; COMPILER_FIELD_SIZE];
        field[..compiler.len()].copy_from_slice(compiler);
        w.write_all(&field)?;

        if self.source.len() > MAX_SOURCE_SIZE {
            return Err(NefError::TooLong("source"));
        }
        write_var_bytes(w, self.source.as_bytes())?;
        w.write_all(&[0u8])?;

        write_var_uint(w, self.tokens.len() as u64)?;
        for token in &self.tokens {
            write_token(w, token)?;
        }
        w.write_all(&[0u8, 0u8])?;

        write_var_bytes(w, &self.script)?;
        Ok(())
    }
}

fn write_token<W: Write>(w: &mut W, token: &MethodToken) -> io::Result<()> {
    w.write_all(&token.hash)?;
    write_var_bytes(w, token.method.as_bytes())?;
    w.write_all(&token.params_count.to_le_bytes())?;
    w.write_all(&[token.has_return as u8, token.call_flags.bits()])
}

fn read_token<R: Read>(r: &mut R) -> Result<MethodToken, NefError> {
    let mut hash = [0u8; HASH160_LEN];
    r.read_exact(&mut hash).map_err(|_| NefError::UnexpectedEof)?;
    let method = read_string(r)?;
    let mut params = [0u8; 2];
    r.read_exact(&mut params).map_err(|_| NefError::UnexpectedEof)?;
    let has_return = read_u8(r)? != 0;
    let flags = read_u8(r)?;
    let call_flags = CallFlags::from_bits(flags as i64).ok_or(NefError::InvalidCallFlags(flags))?;
    Ok(MethodToken {
        hash,
        method,
        params_count: u16::from_le_bytes(params),
        has_return,
        call_flags,
    })
}

pub fn write_var_uint<W: Write>(w: &mut W, n: u64) -> io::Result<()> {
    if n < 0xFD {
        w.write_all(&[n as u8])
    } else if n <= 0xFFFF {
        w.write_all(&[0xFD])?;
        w.write_all(&(n as u16).to_le_bytes())
    } else if n <= 0xFFFF_FFFF {
        w.write_all(&[0xFE])?;
        w.write_all(&(n as u32).to_le_bytes())
    } else {
        w.write_all(&[0xFF])?;
        w.write_all(&n.to_le_bytes())
    }
}

fn write_var_bytes<W: Write>(w: &mut W, data: &[u8]) -> io::Result<()> {
    write_var_uint(w, data.len() as u64)?;
    w.write_all(data)
}

fn read_u8<R: Read>(r: &mut R) -> Result<u8, NefError> {
    let mut buf = [0u8; 1];
    r.read_exact(&mut buf).map_err(|_| NefError::UnexpectedEof)?;
    Ok(buf[0])
}

fn read_u32<R: Read>(r: &mut R) -> Result<u32, NefError> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf).map_err(|_| NefError::UnexpectedEof)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_var_uint<R: Read>(r: &mut R) -> Result<u64, NefError> {
    let prefix = read_u8(r)?;
    let n = match prefix {
        0xFD => {
            let mut buf = [0u8; 2];
            r.read_exact(&mut buf).map_err(|_| NefError::UnexpectedEof)?;
            u16::from_le_bytes(buf) as u64
        }
        0xFE => read_u32(r)? as u64,
        0xFF => {
            let mut buf = [0u8; 8];
            r.read_exact(&mut buf).map_err(|_| NefError::UnexpectedEof)?;
            u64::from_le_bytes(buf)
        }
        n => n as u64,
    };
    Ok(n)
}

fn read_var_bytes<R: Read>(r: &mut R) -> Result<Vec<u8>, NefError> {
    let len = read_var_uint(r)? as usize;
    let mut buf = Vec::new();
    r.take(len as u64).read_to_end(&mut buf)?;
    if buf.len() != len {
        return Err(NefError::UnexpectedEof);
    }
    Ok(buf)
}

fn read_string<R: Read>(r: &mut R) -> Result<String, NefError> {
    String::from_utf8(read_var_bytes(r)?).map_err(|_| NefError::InvalidUtf8)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Nef {
        Nef::new(
            "nefc-0.1.0",
            "",
            vec![MethodToken {
                hash: [9u8; 20],
                method: "append".to_string(),
                params_count: 2,
                has_return: true,
                call_flags: CallFlags::ALL,
            }],
            vec![0x11, 0x40],
        )
        .unwrap()
    }

    #[test]
    fn test_roundtrip_with_tokens() {
        let nef = sample();
        let bytes = nef.to_bytes().unwrap();
        let restored = Nef::from_bytes(&bytes).unwrap();
        assert_eq!(restored, nef);
        assert_eq!(restored.tokens[0].method, "append");
    }

    #[test]
    fn test_invalid_magic() {
        let mut bytes = sample().to_bytes().unwrap();
        bytes[0] = b'X';
        assert!(matches!(Nef::from_bytes(&bytes), Err(NefError::InvalidMagic)));
    }

    #[test]
    fn test_corrupted_script_fails_checksum() {
        let mut bytes = sample().to_bytes().unwrap();
        let script_pos = bytes.len() - 4 - 2;
        bytes[script_pos] ^= 0xff;
        assert!(matches!(
            Nef::from_bytes(&bytes),
            Err(NefError::InvalidChecksum { .. })
        ));
    }

    #[test]
    fn test_truncated() {
        let bytes = sample().to_bytes().unwrap();
        assert!(matches!(
            Nef::from_bytes(&bytes[..10]),
            Err(NefError::UnexpectedEof)
        ));
    }

    #[test]
    fn test_var_uint_prefixes() {
        let mut buf = Vec::new();
        write_var_uint(&mut buf, 0xFC).unwrap();
        assert_eq!(buf, vec![0xFC]);
        buf.clear();
        write_var_uint(&mut buf, 0x1234).unwrap();
        assert_eq!(buf, vec![0xFD, 0x34, 0x12]);
    }
}
