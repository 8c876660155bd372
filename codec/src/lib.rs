use anyhow::Result;
use primitive_types::{H160, H256, U256};
use std::convert::TryInto;

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum CodecError {
    #[error("invalid length {got}, expected {expected}")]
    InvalidLength { expected: usize, got: usize },
}

pub trait Encoder: Sized {
    fn encode(&self) -> Result<Vec<u8>>;
}

pub trait Decoder: Sized {
    fn decode(buf: &[u8]) -> Result<Self>;
}

pub trait Codec: Encoder + Decoder {}

impl<T> Codec for T where T: Encoder + Decoder {}

/// Implements `Encoder`/`Decoder` for a type through its RLP representation.
#[macro_export]
macro_rules! impl_rlp_codec {
    ($type : ty) => {
        impl $crate::Encoder for $type {
            fn encode(&self) -> anyhow::Result<Vec<u8>> {
                Ok(rlp::encode(self).to_vec())
            }
        }
        impl $crate::Decoder for $type {
            fn decode(buf: &[u8]) -> anyhow::Result<Self> {
                rlp::decode(buf).map_err(|e| e.into())
            }
        }
    };
}

macro_rules! impl_codec_primitives {
    ($type : ty => $path : path) => {
        impl Encoder for $type {
            fn encode(&self) -> Result<Vec<u8>> {
                Ok(self.to_be_bytes().to_vec())
            }
        }

        impl Decoder for $type {
            fn decode(buf: &[u8]) -> Result<$type> {
                Ok($path(buf.try_into()?))
            }
        }
    };
}

impl_codec_primitives!(u8 => u8::from_be_bytes);
impl_codec_primitives!(u16 => u16::from_be_bytes);
impl_codec_primitives!(u32 => u32::from_be_bytes);
impl_codec_primitives!(u64 => u64::from_be_bytes);

fn check_len(buf: &[u8], expected: usize) -> Result<()> {
    if buf.len() != expected {
        return Err(CodecError::InvalidLength {
            expected,
            got: buf.len(),
        }
        .into());
    }
    Ok(())
}

impl Encoder for H160 {
    fn encode(&self) -> Result<Vec<u8>> {
        Ok(self.as_bytes().to_vec())
    }
}

impl Decoder for H160 {
    fn decode(buf: &[u8]) -> Result<Self> {
        check_len(buf, 20)?;
        Ok(H160::from_slice(buf))
    }
}

impl Encoder for H256 {
    fn encode(&self) -> Result<Vec<u8>> {
        Ok(self.as_bytes().to_vec())
    }
}

impl Decoder for H256 {
    fn decode(buf: &[u8]) -> Result<Self> {
        check_len(buf, 32)?;
        Ok(H256::from_slice(buf))
    }
}

// Fixed 32 byte big endian so keys sort numerically.
impl Encoder for U256 {
    fn encode(&self) -> Result<Vec<u8>> {
        let mut out = [0_u8; 32];
        self.to_big_endian(&mut out);
        Ok(out.to_vec())
    }
}

impl Decoder for U256 {
    fn decode(buf: &[u8]) -> Result<Self> {
        check_len(buf, 32)?;
        Ok(U256::from_big_endian(buf))
    }
}

impl Encoder for String {
    fn encode(&self) -> Result<Vec<u8>> {
        Ok(self.as_bytes().to_vec())
    }
}

impl Decoder for String {
    fn decode(buf: &[u8]) -> Result<Self> {
        Ok(String::from_utf8(buf.to_vec())?)
    }
}

impl Encoder for Vec<u8> {
    fn encode(&self) -> Result<Vec<u8>> {
        Ok(self.clone())
    }
}

impl Decoder for Vec<u8> {
    fn decode(buf: &[u8]) -> Result<Self> {
        Ok(buf.to_vec())
    }
}
