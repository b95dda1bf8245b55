// ABI word codec for event-log payloads
//
// Supports the subset the host and handler events use: `uint64`, `string`,
// `bytes` and (possibly nested, possibly dynamic) tuples of those.

use crate::error::CodecError;

const WORD: usize = 32;

/// Static description of an ABI parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamType {
    Uint64,
    String,
    Bytes,
    Tuple(Vec<ParamType>),
}

impl ParamType {
    pub fn is_dynamic(&self) -> bool {
        match self {
            ParamType::Uint64 => false,
            ParamType::String | ParamType::Bytes => true,
            ParamType::Tuple(components) => components.iter().any(ParamType::is_dynamic),
        }
    }

    /// Size of the in-place encoding of a static type
    fn static_size(&self) -> usize {
        match self {
            ParamType::Tuple(components) => components.iter().map(ParamType::head_size).sum(),
            _ => WORD,
        }
    }

    fn head_size(&self) -> usize {
        if self.is_dynamic() {
            WORD
        } else {
            self.static_size()
        }
    }

    /// Canonical type string used in event signatures
    pub fn canonical(&self) -> String {
        match self {
            ParamType::Uint64 => "uint64".to_string(),
            ParamType::String => "string".to_string(),
            ParamType::Bytes => "bytes".to_string(),
            ParamType::Tuple(components) => {
                let inner: Vec<String> = components.iter().map(ParamType::canonical).collect();
                format!("({})", inner.join(","))
            }
        }
    }
}

/// A decoded ABI value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Uint(u64),
    String(String),
    Bytes(Vec<u8>),
    Tuple(Vec<Token>),
}

impl Token {
    fn is_dynamic(&self) -> bool {
        match self {
            Token::Uint(_) => false,
            Token::String(_) | Token::Bytes(_) => true,
            Token::Tuple(items) => items.iter().any(Token::is_dynamic),
        }
    }

    pub fn into_string(self) -> Option<String> {
        match self {
            Token::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn into_bytes(self) -> Option<Vec<u8>> {
        match self {
            Token::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn into_uint(self) -> Option<u64> {
        match self {
            Token::Uint(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_tuple(self) -> Option<Vec<Token>> {
        match self {
            Token::Tuple(items) => Some(items),
            _ => None,
        }
    }
}

/// Encode a list of top-level values, as found in a log's data field
pub fn encode(tokens: &[Token]) -> Vec<u8> {
    encode_tuple(tokens)
}

fn encode_tuple(tokens: &[Token]) -> Vec<u8> {
    let head_size: usize = tokens
        .iter()
        .map(|t| if t.is_dynamic() { WORD } else { static_len(t) })
        .sum();

    let mut head = Vec::with_capacity(head_size);
    let mut tail = Vec::new();
    for token in tokens {
        if token.is_dynamic() {
            head.extend_from_slice(&uint_word((head_size + tail.len()) as u64));
            tail.extend(encode_token(token));
        } else {
            head.extend(encode_token(token));
        }
    }
    head.extend(tail);
    head
}

fn static_len(token: &Token) -> usize {
    match token {
        Token::Tuple(items) => items.iter().map(static_len).sum(),
        _ => WORD,
    }
}

fn encode_token(token: &Token) -> Vec<u8> {
    match token {
        Token::Uint(v) => uint_word(*v).to_vec(),
        Token::String(s) => encode_bytes(s.as_bytes()),
        Token::Bytes(b) => encode_bytes(b),
        Token::Tuple(items) => encode_tuple(items),
    }
}

fn encode_bytes(data: &[u8]) -> Vec<u8> {
    let padded = data.len().div_ceil(WORD) * WORD;
    let mut out = Vec::with_capacity(WORD + padded);
    out.extend_from_slice(&uint_word(data.len() as u64));
    out.extend_from_slice(data);
    out.resize(WORD + padded, 0);
    out
}

fn uint_word(v: u64) -> [u8; WORD] {
    let mut word = [0u8; WORD];
    word[WORD - 8..].copy_from_slice(&v.to_be_bytes());
    word
}

/// Decode `data` as a tuple of `types`
pub fn decode(types: &[ParamType], data: &[u8]) -> Result<Vec<Token>, CodecError> {
    decode_tuple(types, data)
}

fn decode_tuple(types: &[ParamType], data: &[u8]) -> Result<Vec<Token>, CodecError> {
    let mut tokens = Vec::with_capacity(types.len());
    let mut head = 0usize;
    for ty in types {
        if ty.is_dynamic() {
            let offset = read_usize(data, head)?;
            let tail = data
                .get(offset..)
                .ok_or_else(|| abi_error(format!("offset {} out of bounds", offset)))?;
            tokens.push(decode_dynamic(ty, tail)?);
            head += WORD;
        } else {
            let slot = data
                .get(head..)
                .ok_or_else(|| abi_error(format!("head {} out of bounds", head)))?;
            tokens.push(decode_static(ty, slot)?);
            head += ty.static_size();
        }
    }
    Ok(tokens)
}

fn decode_dynamic(ty: &ParamType, data: &[u8]) -> Result<Token, CodecError> {
    match ty {
        ParamType::String => {
            let raw = read_length_prefixed(data)?;
            String::from_utf8(raw)
                .map(Token::String)
                .map_err(|e| abi_error(format!("invalid utf-8 string: {}", e)))
        }
        ParamType::Bytes => read_length_prefixed(data).map(Token::Bytes),
        ParamType::Tuple(components) => decode_tuple(components, data).map(Token::Tuple),
        ParamType::Uint64 => decode_static(ty, data),
    }
}

fn decode_static(ty: &ParamType, data: &[u8]) -> Result<Token, CodecError> {
    match ty {
        ParamType::Uint64 => read_u64(data, 0).map(Token::Uint),
        ParamType::Tuple(components) => decode_tuple(components, data).map(Token::Tuple),
        _ => Err(abi_error(format!("{} is not a static type", ty.canonical()))),
    }
}

fn read_length_prefixed(data: &[u8]) -> Result<Vec<u8>, CodecError> {
    let len = read_usize(data, 0)?;
    WORD.checked_add(len)
        .and_then(|end| data.get(WORD..end))
        .map(|b| b.to_vec())
        .ok_or_else(|| abi_error(format!("length {} exceeds payload", len)))
}

fn read_u64(data: &[u8], at: usize) -> Result<u64, CodecError> {
    let word = data
        .get(at..at + WORD)
        .ok_or_else(|| abi_error(format!("word at {} out of bounds", at)))?;
    if word[..WORD - 8].iter().any(|b| *b != 0) {
        return Err(abi_error("value does not fit in 64 bits"));
    }
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&word[WORD - 8..]);
    Ok(u64::from_be_bytes(buf))
}

fn read_usize(data: &[u8], at: usize) -> Result<usize, CodecError> {
    let v = read_u64(data, at)?;
    usize::try_from(v).map_err(|_| abi_error(format!("offset {} too large", v)))
}

fn abi_error(msg: impl Into<String>) -> CodecError {
    CodecError::Abi(msg.into())
}
