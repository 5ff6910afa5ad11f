//! The delta codec backing [`crate::SqliteStore::encode_delta`] /
//! `apply_delta`: express one artifact's content as copy/insert
//! operations against a source artifact's content.
//!
//! Wire format: a sequence of operations, each a one-byte tag followed
//! by its operands, all integers big-endian `u32`:
//!
//! - `C` `offset` `len` — copy `len` bytes from the source starting at
//!   `offset`
//! - `I` `len` `<len bytes>` — insert these literal bytes
//!
//! The target length is simply the sum of the operations' lengths; there
//! is no separate length prefix.

use std::collections::HashMap;

const ANCHOR_LEN: usize = 16;
const COPY: u8 = b'C';
const INSERT: u8 = b'I';

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DeltaError {
    #[error("truncated delta stream")]
    Truncated,
    #[error("unknown delta opcode: {0}")]
    BadOpcode(u8),
    #[error("copy range out of bounds: offset {offset} len {len} source len {source_len}")]
    OutOfBounds {
        offset: usize,
        len: usize,
        source_len: usize,
    },
}

/// Encode `target` as a diff against `src`. Falls back to a single
/// insert of the whole target when no worthwhile match is found —
/// always correct, just not always smaller than `target` itself (the
/// caller decides whether the delta is worth sending).
pub fn encode(src: &[u8], target: &[u8]) -> Vec<u8> {
    let mut index: HashMap<&[u8], usize> = HashMap::new();
    if src.len() >= ANCHOR_LEN {
        for start in 0..=(src.len() - ANCHOR_LEN) {
            index.entry(&src[start..start + ANCHOR_LEN]).or_insert(start);
        }
    }

    let mut out = Vec::new();
    let mut literal_start = 0usize;
    let mut pos = 0usize;

    while pos < target.len() {
        let have_anchor = pos + ANCHOR_LEN <= target.len();
        let found = if have_anchor {
            index.get(&target[pos..pos + ANCHOR_LEN]).copied()
        } else {
            None
        };

        match found {
            Some(src_start) => {
                let mut src_end = src_start + ANCHOR_LEN;
                let mut tgt_end = pos + ANCHOR_LEN;
                while src_end < src.len() && tgt_end < target.len() && src[src_end] == target[tgt_end] {
                    src_end += 1;
                    tgt_end += 1;
                }
                if literal_start < pos {
                    push_insert(&mut out, &target[literal_start..pos]);
                }
                push_copy(&mut out, src_start as u32, (tgt_end - pos) as u32);
                pos = tgt_end;
                literal_start = pos;
            }
            None => pos += 1,
        }
    }
    if literal_start < target.len() {
        push_insert(&mut out, &target[literal_start..]);
    }
    out
}

fn push_copy(out: &mut Vec<u8>, offset: u32, len: u32) {
    out.push(COPY);
    out.extend_from_slice(&offset.to_be_bytes());
    out.extend_from_slice(&len.to_be_bytes());
}

fn push_insert(out: &mut Vec<u8>, bytes: &[u8]) {
    out.push(INSERT);
    out.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
    out.extend_from_slice(bytes);
}

/// Reconstruct the target content by replaying `delta` against `src`.
pub fn apply(src: &[u8], delta: &[u8]) -> Result<Vec<u8>, DeltaError> {
    let mut out = Vec::new();
    let mut cursor = 0usize;
    while cursor < delta.len() {
        let tag = delta[cursor];
        cursor += 1;
        match tag {
            COPY => {
                let offset = read_u32(delta, &mut cursor)? as usize;
                let len = read_u32(delta, &mut cursor)? as usize;
                let end = offset.checked_add(len).ok_or(DeltaError::OutOfBounds {
                    offset,
                    len,
                    source_len: src.len(),
                })?;
                if end > src.len() {
                    return Err(DeltaError::OutOfBounds {
                        offset,
                        len,
                        source_len: src.len(),
                    });
                }
                out.extend_from_slice(&src[offset..end]);
            }
            INSERT => {
                let len = read_u32(delta, &mut cursor)? as usize;
                if cursor + len > delta.len() {
                    return Err(DeltaError::Truncated);
                }
                out.extend_from_slice(&delta[cursor..cursor + len]);
                cursor += len;
            }
            other => return Err(DeltaError::BadOpcode(other)),
        }
    }
    Ok(out)
}

fn read_u32(buf: &[u8], cursor: &mut usize) -> Result<u32, DeltaError> {
    if *cursor + 4 > buf.len() {
        return Err(DeltaError::Truncated);
    }
    let bytes: [u8; 4] = buf[*cursor..*cursor + 4].try_into().unwrap();
    *cursor += 4;
    Ok(u32::from_be_bytes(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_similar_content() {
        let src = b"the quick brown fox jumps over the lazy dog, again and again".to_vec();
        let target = b"the quick brown fox leaps over the lazy dog, again and again!".to_vec();
        let delta = encode(&src, &target);
        assert_eq!(apply(&src, &delta).unwrap(), target);
    }

    #[test]
    fn round_trips_identical_content_as_one_copy() {
        let src = b"identical payload of reasonable length for anchoring".to_vec();
        let delta = encode(&src, &src);
        assert_eq!(apply(&src, &delta).unwrap(), src);
    }

    #[test]
    fn round_trips_unrelated_content_via_pure_insert() {
        let src = b"aaaaaaaaaaaaaaaaaaaaaaaa".to_vec();
        let target = b"zzzzzzzzzzzzzzzzzzzzzzzzzzz".to_vec();
        let delta = encode(&src, &target);
        assert_eq!(apply(&src, &delta).unwrap(), target);
    }

    #[test]
    fn empty_source_produces_pure_insert() {
        let target = b"brand new content".to_vec();
        let delta = encode(&[], &target);
        assert_eq!(apply(&[], &delta).unwrap(), target);
    }

    #[test]
    fn rejects_copy_past_source_end() {
        let bad = {
            let mut d = Vec::new();
            push_copy(&mut d, 0, 100);
            d
        };
        assert!(matches!(apply(b"short", &bad), Err(DeltaError::OutOfBounds { .. })));
    }

    #[test]
    fn rejects_truncated_insert() {
        let bad = {
            let mut d = vec![INSERT];
            d.extend_from_slice(&10u32.to_be_bytes());
            d.extend_from_slice(b"short");
            d
        };
        assert_eq!(apply(b"", &bad), Err(DeltaError::Truncated));
    }
}
