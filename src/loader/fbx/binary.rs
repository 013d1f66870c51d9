//! Binary FBX record parsing
//!
//! A binary FBX file is a 27-byte header followed by nested node records.
//! Each record holds a name, a list of typed properties and child records;
//! a record of all-zero header fields closes a child list.

use std::io::Read;

use thiserror::Error;

const MAGIC: &[u8] = b"Kaydara FBX Binary  \0";
const HEADER_LEN: usize = 27;

/// Versions from 7500 on use 64-bit record header fields
const WIDE_HEADER_VERSION: u32 = 7500;

/// Deepest record nesting accepted; exporters stay well below this
const MAX_DEPTH: usize = 64;

#[derive(Error, Debug)]
pub enum FbxParseError {
    #[error("ASCII FBX is not supported, export as binary")]
    Ascii,

    #[error("not an FBX file")]
    BadMagic,

    #[error("unexpected end of data at offset {0}")]
    UnexpectedEof(usize),

    #[error("record at offset {offset} ends at {end}, outside the file")]
    BadRecord { offset: usize, end: u64 },

    #[error("unknown property type {code:#04x} at offset {offset}")]
    UnknownProperty { code: u8, offset: usize },

    #[error("array property at offset {offset} uses unknown encoding {encoding}")]
    UnknownEncoding { offset: usize, encoding: u32 },

    #[error("record at offset {offset} is nested deeper than {MAX_DEPTH} levels")]
    TooDeep { offset: usize },

    #[error("array property at offset {offset} holds too few bytes")]
    ShortArray { offset: usize },

    #[error("failed to inflate array at offset {offset}: {source}")]
    Inflate {
        offset: usize,
        #[source]
        source: std::io::Error,
    },
}

/// A typed record property
#[derive(Debug, Clone, PartialEq)]
pub enum Property {
    Bool(bool),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    BoolArray(Vec<bool>),
    I32Array(Vec<i32>),
    I64Array(Vec<i64>),
    F32Array(Vec<f32>),
    F64Array(Vec<f64>),
    String(String),
    Raw(Vec<u8>),
}

impl Property {
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Self::I16(v) => Some(v.into()),
            Self::I32(v) => Some(v.into()),
            Self::I64(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Self::F32(v) => Some(v.into()),
            Self::F64(v) => Some(v),
            Self::I16(v) => Some(v.into()),
            Self::I32(v) => Some(v.into()),
            Self::I64(v) => Some(v as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Any float array widened to f64
    pub fn to_f64_vec(&self) -> Option<Vec<f64>> {
        match self {
            Self::F64Array(v) => Some(v.clone()),
            Self::F32Array(v) => Some(v.iter().map(|&x| x.into()).collect()),
            _ => None,
        }
    }

    /// Any float array narrowed to f32
    pub fn to_f32_vec(&self) -> Option<Vec<f32>> {
        match self {
            Self::F32Array(v) => Some(v.clone()),
            Self::F64Array(v) => Some(v.iter().map(|&x| x as f32).collect()),
            _ => None,
        }
    }

    pub fn as_i32_array(&self) -> Option<&[i32]> {
        match self {
            Self::I32Array(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_i64_array(&self) -> Option<&[i64]> {
        match self {
            Self::I64Array(v) => Some(v),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct FbxNode {
    pub name: String,
    pub properties: Vec<Property>,
    pub children: Vec<FbxNode>,
}

impl FbxNode {
    pub fn new(name: impl Into<String>, properties: Vec<Property>) -> Self {
        Self {
            name: name.into(),
            properties,
            children: Vec::new(),
        }
    }

    pub fn with_children(mut self, children: Vec<FbxNode>) -> Self {
        self.children = children;
        self
    }

    /// First child record called `name`
    pub fn child(&self, name: &str) -> Option<&FbxNode> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a FbxNode> {
        self.children.iter().filter(move |c| c.name == name)
    }

    pub fn property(&self, index: usize) -> Option<&Property> {
        self.properties.get(index)
    }

    /// First property of the child record called `name`
    pub fn child_value(&self, name: &str) -> Option<&Property> {
        self.child(name)?.property(0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FbxDocument {
    pub version: u32,
    pub nodes: Vec<FbxNode>,
}

impl FbxDocument {
    /// First top-level record called `name`
    pub fn node(&self, name: &str) -> Option<&FbxNode> {
        self.nodes.iter().find(|n| n.name == name)
    }
}

/// Parse a binary FBX file
pub fn parse(data: &[u8]) -> Result<FbxDocument, FbxParseError> {
    if !data.starts_with(MAGIC) {
        let head = &data[..data.len().min(1024)];
        if head.starts_with(b"; FBX") || contains(head, b"FBXHeaderExtension") {
            return Err(FbxParseError::Ascii);
        }
        return Err(FbxParseError::BadMagic);
    }

    let mut reader = Reader {
        data,
        pos: MAGIC.len() + 2,
        wide: false,
    };
    let version = reader.u32()?;
    reader.wide = version >= WIDE_HEADER_VERSION;
    debug_assert_eq!(reader.pos, HEADER_LEN);

    let mut nodes = Vec::new();
    while reader.remaining() >= reader.record_header_len() {
        match reader.node(0)? {
            Some(node) => nodes.push(node),
            None => break,
        }
    }

    Ok(FbxDocument { version, nodes })
}

/// Split an object name of the form `Name\0\x01Class` and return `Name`
pub fn object_name(raw: &str) -> &str {
    raw.split_once("\u{0}\u{1}").map_or(raw, |(name, _)| name)
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
    wide: bool,
}

impl<'a> Reader<'a> {
    fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    fn record_header_len(&self) -> usize {
        if self.wide {
            25
        } else {
            13
        }
    }

    fn bytes(&mut self, len: usize) -> Result<&'a [u8], FbxParseError> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.data.len())
            .ok_or(FbxParseError::UnexpectedEof(self.pos))?;
        let bytes = &self.data[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], FbxParseError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.bytes(N)?);
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8, FbxParseError> {
        Ok(self.array::<1>()?[0])
    }

    fn u32(&mut self) -> Result<u32, FbxParseError> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    fn offset(&mut self) -> Result<u64, FbxParseError> {
        if self.wide {
            Ok(u64::from_le_bytes(self.array()?))
        } else {
            Ok(self.u32()?.into())
        }
    }

    fn node(&mut self, depth: usize) -> Result<Option<FbxNode>, FbxParseError> {
        let start = self.pos;
        if depth > MAX_DEPTH {
            return Err(FbxParseError::TooDeep { offset: start });
        }
        let end_offset = self.offset()?;
        let property_count = self.offset()?;
        let property_list_len = self.offset()?;
        let name_len = self.u8()?;

        if end_offset == 0 {
            return Ok(None);
        }
        let end = usize::try_from(end_offset)
            .ok()
            .filter(|&end| end > start && end <= self.data.len())
            .ok_or(FbxParseError::BadRecord {
                offset: start,
                end: end_offset,
            })?;

        let name = String::from_utf8_lossy(self.bytes(name_len.into())?).into_owned();

        let properties_start = self.pos;
        let mut properties = Vec::new();
        for _ in 0..property_count {
            properties.push(self.property()?);
        }
        self.pos = properties_start
            .checked_add(property_list_len as usize)
            .filter(|&pos| pos <= end)
            .ok_or(FbxParseError::BadRecord {
                offset: start,
                end: end_offset,
            })?;

        let mut children = Vec::new();
        while self.pos < end {
            match self.node(depth + 1)? {
                Some(child) => children.push(child),
                None => break,
            }
        }
        self.pos = end;

        Ok(Some(FbxNode {
            name,
            properties,
            children,
        }))
    }

    fn property(&mut self) -> Result<Property, FbxParseError> {
        let offset = self.pos;
        let code = self.u8()?;
        let property = match code {
            b'C' => Property::Bool(self.u8()? != 0),
            b'Y' => Property::I16(i16::from_le_bytes(self.array()?)),
            b'I' => Property::I32(i32::from_le_bytes(self.array()?)),
            b'L' => Property::I64(i64::from_le_bytes(self.array()?)),
            b'F' => Property::F32(f32::from_le_bytes(self.array()?)),
            b'D' => Property::F64(f64::from_le_bytes(self.array()?)),
            b'b' => Property::BoolArray(self.array_property(1, |b| b[0] != 0)?),
            b'i' => Property::I32Array(self.array_property(4, |b| {
                i32::from_le_bytes([b[0], b[1], b[2], b[3]])
            })?),
            b'f' => Property::F32Array(self.array_property(4, |b| {
                f32::from_le_bytes([b[0], b[1], b[2], b[3]])
            })?),
            b'l' => Property::I64Array(self.array_property(8, |b| {
                i64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]])
            })?),
            b'd' => Property::F64Array(self.array_property(8, |b| {
                f64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]])
            })?),
            b'S' => {
                let len = self.u32()? as usize;
                Property::String(String::from_utf8_lossy(self.bytes(len)?).into_owned())
            }
            b'R' => {
                let len = self.u32()? as usize;
                Property::Raw(self.bytes(len)?.to_vec())
            }
            code => return Err(FbxParseError::UnknownProperty { code, offset }),
        };
        Ok(property)
    }

    fn array_property<T>(
        &mut self,
        element_size: usize,
        element: impl Fn(&[u8]) -> T,
    ) -> Result<Vec<T>, FbxParseError> {
        let offset = self.pos;
        let len = self.u32()? as usize;
        let encoding = self.u32()?;
        let stored_len = self.u32()? as usize;
        let stored = self.bytes(stored_len)?;

        let expected = len
            .checked_mul(element_size)
            .ok_or(FbxParseError::ShortArray { offset })?;
        // The declared length is untrusted: output only grows as data inflates
        let inflated;
        let raw = match encoding {
            0 => stored,
            1 => {
                let mut buf = Vec::new();
                flate2::read::ZlibDecoder::new(stored)
                    .take(expected as u64)
                    .read_to_end(&mut buf)
                    .map_err(|source| FbxParseError::Inflate { offset, source })?;
                inflated = buf;
                &inflated[..]
            }
            encoding => return Err(FbxParseError::UnknownEncoding { offset, encoding }),
        };
        if raw.len() < expected {
            return Err(FbxParseError::ShortArray { offset });
        }

        Ok(raw[..expected].chunks_exact(element_size).map(element).collect())
    }
}
